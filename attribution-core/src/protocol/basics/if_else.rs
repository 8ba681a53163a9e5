use crate::{
    error::{Error, LengthError},
    protocol::engine::SecureEngine,
    secret_sharing::BitDecomposed,
};

/// Returns `true_values[i]` where `conditions[i]` is set, else `false_values[i]`, lane by lane.
///
/// Computed as `false ^ (condition & (true ^ false))`, one AND per value, all in one batch.
///
/// ## Errors
/// If the slices have different lengths or the multiplication fails.
pub async fn select<E: SecureEngine>(
    engine: &E,
    conditions: &[E::Bit],
    true_values: &[E::Bit],
    false_values: &[E::Bit],
) -> Result<Vec<E::Bit>, Error> {
    LengthError::check(conditions.len(), true_values.len())?;
    LengthError::check(conditions.len(), false_values.len())?;

    let differences = true_values
        .iter()
        .zip(false_values)
        .map(|(t, f)| engine.xor(t, f))
        .collect::<Vec<_>>();
    let chosen = engine.multiply(conditions, &differences).await?;

    Ok(false_values
        .iter()
        .zip(chosen)
        .map(|(f, c)| engine.xor(f, &c))
        .collect())
}

/// [`select`] for bit-decomposed integers: every bit of `true_values[i]` and `false_values[i]`
/// is chosen by `conditions[i]`. All bits of all values go through a single multiplication batch.
///
/// ## Errors
/// If the slices have different lengths, or two paired integers have different widths.
pub async fn select_bits<E: SecureEngine>(
    engine: &E,
    conditions: &[E::Bit],
    true_values: &[BitDecomposed<E::Bit>],
    false_values: &[BitDecomposed<E::Bit>],
) -> Result<Vec<BitDecomposed<E::Bit>>, Error> {
    LengthError::check(conditions.len(), true_values.len())?;
    LengthError::check(conditions.len(), false_values.len())?;

    let mut flat_conditions = Vec::new();
    let mut flat_true = Vec::new();
    let mut flat_false = Vec::new();
    for ((condition, t), f) in conditions.iter().zip(true_values).zip(false_values) {
        LengthError::check(t.len(), f.len())?;
        flat_conditions.extend(std::iter::repeat_n(condition.clone(), t.len()));
        flat_true.extend(t.iter().cloned());
        flat_false.extend(f.iter().cloned());
    }

    let mut selected = select(engine, &flat_conditions, &flat_true, &flat_false)
        .await?
        .into_iter();
    Ok(true_values
        .iter()
        .map(|t| selected.by_ref().take(t.len()).collect())
        .collect())
}
