//! Bitwise subtraction and comparison protocols
//!
//! Every function takes `n` pairs `(x[i], y[i])` and evaluates all of them in lockstep: bit `k`
//! of every pair goes into the same multiplication batch, so the number of AND rounds equals the
//! width of `x` no matter how many pairs there are. All `x[i]` must have the same width. A `y[i]`
//! narrower than `x[i]` is zero-extended; a wider one is rejected.

use crate::{
    error::{Error, LengthError},
    protocol::engine::SecureEngine,
    secret_sharing::{BitDecomposed, Lanes},
};

/// Outputs `x[i] >= y[i]` for every pair.
///
/// ## Errors
/// Propagates errors from [`subtract`].
pub async fn compare_geq<E: SecureEngine>(
    engine: &E,
    x: &[BitDecomposed<E::Bit>],
    y: &[BitDecomposed<E::Bit>],
) -> Result<Vec<E::Bit>, Error> {
    // carry starts at 1 for x>=y, the difference is dropped
    Ok(subtract(engine, x, y, true).await?.1)
}

/// Outputs `x[i] > y[i]` for every pair.
///
/// ## Errors
/// Propagates errors from [`subtract`].
pub async fn compare_gt<E: SecureEngine>(
    engine: &E,
    x: &[BitDecomposed<E::Bit>],
    y: &[BitDecomposed<E::Bit>],
) -> Result<Vec<E::Bit>, Error> {
    Ok(subtract(engine, x, y, false).await?.1)
}

/// Non-saturated subtraction `x[i] - y[i]` with carry-in `carry_in`, returning the differences
/// (same width as `x`) and the carry-out of every pair. With `carry_in = true` the result is the
/// two's complement difference and the carry-out is `x[i] >= y[i]`; with `carry_in = false` the
/// carry-out is `x[i] > y[i]`.
///
/// Implements the one-AND bit subtractor of `https://encrypto.de/papers/KSS09.pdf`, section 3.1:
/// `d_i = x_i ⊕ !(y_i ⊕ c_i)` and `c_(i+1) = c_i ⊕ ((x_i ⊕ c_i) ∧ !(y_i ⊕ c_i))`.
///
/// ## Errors
/// If `x` and `y` differ in length, the `x` values differ in width, or some `y[i]` is wider than
/// `x[i]`. Propagates errors from multiply.
///
/// ## Panics
/// If `x` values have zero width.
pub async fn subtract<E: SecureEngine>(
    engine: &E,
    x: &[BitDecomposed<E::Bit>],
    y: &[BitDecomposed<E::Bit>],
    carry_in: bool,
) -> Result<(Vec<BitDecomposed<E::Bit>>, Vec<E::Bit>), Error> {
    LengthError::check(x.len(), y.len())?;
    let Some(first) = x.first() else {
        return Ok((Vec::new(), Vec::new()));
    };
    let width = first.len();
    assert!(width > 0, "cannot subtract zero-width integers");
    for (xi, yi) in x.iter().zip(y) {
        LengthError::check(width, xi.len())?;
        if yi.len() > width {
            return Err(LengthError {
                expected: width,
                actual: yi.len(),
            }
            .into());
        }
    }

    let lanes = x.iter().map(|xi| engine.lanes(&xi[0])).collect::<Vec<_>>();
    let mut carries = lanes
        .iter()
        .map(|&l| engine.constant(Lanes::repeat(carry_in, l)))
        .collect::<Vec<_>>();
    let mut differences = vec![BitDecomposed::default(); x.len()];

    for k in 0..width {
        let mut masked_x = Vec::with_capacity(x.len());
        let mut masked_not_y = Vec::with_capacity(x.len());
        for (i, (xi, yi)) in x.iter().zip(y).enumerate() {
            let yk = match yi.get(k) {
                Some(bit) => bit.clone(),
                None => engine.constant(Lanes::repeat(false, lanes[i])),
            };
            let not_yc = engine.not(&engine.xor(&yk, &carries[i]));
            differences[i].push(engine.xor(&xi[k], &not_yc));
            masked_x.push(engine.xor(&xi[k], &carries[i]));
            masked_not_y.push(not_yc);
        }
        let products = engine.multiply(&masked_x, &masked_not_y).await?;
        for (carry, product) in carries.iter_mut().zip(products) {
            *carry = engine.xor(carry, &product);
        }
    }

    Ok((differences, carries))
}

/// Outputs `x[i] == values[i]` for public `values`, AND-reducing the per-bit equalities as a
/// balanced tree: `log2(width)` rounds for all pairs together.
///
/// ## Errors
/// If the slices differ in length, `values[i]` does not fit into the width of `x[i]`, or the
/// multiplication fails.
///
/// ## Panics
/// If some `x[i]` has zero width.
pub async fn equals_known<E: SecureEngine>(
    engine: &E,
    x: &[BitDecomposed<E::Bit>],
    values: &[u64],
) -> Result<Vec<E::Bit>, Error> {
    LengthError::check(x.len(), values.len())?;
    let mut terms = x
        .iter()
        .zip(values)
        .map(|(xi, &value)| {
            assert!(!xi.is_empty(), "cannot compare zero-width integers");
            if xi.len() < 64 && value >> xi.len() != 0 {
                return Err(Error::FieldValueTruncation {
                    value: u128::from(value),
                    bits: xi.len(),
                });
            }
            Ok(xi
                .iter()
                .enumerate()
                .map(|(k, bit)| {
                    if (value >> k) & 1 == 1 {
                        bit.clone()
                    } else {
                        engine.not(bit)
                    }
                })
                .collect::<Vec<_>>())
        })
        .collect::<Result<Vec<_>, _>>()?;

    while terms.iter().any(|t| t.len() > 1) {
        let mut left = Vec::new();
        let mut right = Vec::new();
        for term in &terms {
            for pair in term.chunks_exact(2) {
                left.push(pair[0].clone());
                right.push(pair[1].clone());
            }
        }
        let mut products = engine.multiply(&left, &right).await?.into_iter();
        for term in &mut terms {
            let odd = (term.len() % 2 == 1).then(|| term[term.len() - 1].clone());
            let mut next = products.by_ref().take(term.len() / 2).collect::<Vec<_>>();
            next.extend(odd);
            *term = next;
        }
    }

    Ok(terms.into_iter().map(|mut t| t.remove(0)).collect())
}
