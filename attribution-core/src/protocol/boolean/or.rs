use crate::{
    error::{Error, LengthError},
    protocol::engine::SecureEngine,
};

/// Lane-wise OR of `a[i]` and `b[i]`, computed as `a ^ b ^ (a & b)` with one multiplication
/// batch.
///
/// ## Errors
/// If `a` and `b` have different lengths or the multiplication fails.
pub async fn or<E: SecureEngine>(
    engine: &E,
    a: &[E::Bit],
    b: &[E::Bit],
) -> Result<Vec<E::Bit>, Error> {
    LengthError::check(a.len(), b.len())?;
    let ab = engine.multiply(a, b).await?;
    Ok(a.iter()
        .zip(b)
        .zip(ab)
        .map(|((a, b), ab)| engine.xor(&engine.xor(a, b), &ab))
        .collect())
}

#[cfg(all(test, unit_test))]
mod tests {
    use bitvec::{bitvec, order::Lsb0};

    use super::or;
    use crate::{helpers::Role, protocol::engine::PlaintextEngine};

    #[tokio::test]
    async fn truth_table() {
        let engine = PlaintextEngine::standalone(Role::Publisher);
        let a = bitvec![u8, Lsb0; 0, 0, 1, 1];
        let b = bitvec![u8, Lsb0; 0, 1, 0, 1];
        assert_eq!(
            vec![bitvec![u8, Lsb0; 0, 1, 1, 1]],
            or(&engine, &[a], &[b]).await.unwrap()
        );
    }
}
