use bitvec::{order::Lsb0, vec::BitVec};
use rand::{CryptoRng, RngCore};

use crate::{error::Error, secret_sharing::BitDecomposed};

/// One bit per batch lane.
pub type Lanes = BitVec<u8, Lsb0>;

/// ## Panics
/// If `a` and `b` have different lane counts.
#[must_use]
pub fn xor_lanes(a: &Lanes, b: &Lanes) -> Lanes {
    assert_eq!(a.len(), b.len(), "lane count mismatch");
    a.iter().by_vals().zip(b.iter().by_vals()).map(|(a, b)| a ^ b).collect()
}

/// ## Panics
/// If `a` and `b` have different lane counts.
#[must_use]
pub fn and_lanes(a: &Lanes, b: &Lanes) -> Lanes {
    assert_eq!(a.len(), b.len(), "lane count mismatch");
    a.iter().by_vals().zip(b.iter().by_vals()).map(|(a, b)| a & b).collect()
}

#[must_use]
pub fn not_lanes(a: &Lanes) -> Lanes {
    a.iter().by_vals().map(|a| !a).collect()
}

pub fn random_lanes<R: RngCore + CryptoRng>(rng: &mut R, lanes: usize) -> Lanes {
    let mut bytes = vec![0_u8; lanes.div_ceil(8)];
    rng.fill_bytes(&mut bytes);
    let mut bits = Lanes::from_vec(bytes);
    bits.truncate(lanes);
    bits
}

/// Concatenates lane vectors into a byte buffer suitable for the wire.
#[must_use]
pub fn pack(values: &[Lanes]) -> Vec<u8> {
    let mut all = Lanes::with_capacity(values.iter().map(Lanes::len).sum());
    for value in values {
        all.extend_from_bitslice(value);
    }
    all.into_vec()
}

/// Inverse of [`pack`] for `count` vectors of `lanes` bits each. Returns `None` if `bytes` has
/// the wrong size. Padding bits are ignored, so callers that need the exact shape must agree on
/// the bit count separately.
#[must_use]
pub fn unpack(bytes: &[u8], count: usize, lanes: usize) -> Option<Vec<Lanes>> {
    let total = count * lanes;
    if bytes.len() != total.div_ceil(8) {
        return None;
    }
    let all = Lanes::from_slice(bytes);
    Some(
        (0..count)
            .map(|i| all[i * lanes..(i + 1) * lanes].to_bitvec())
            .collect(),
    )
}

/// Transposes per-lane integers into `bits` bit planes, least significant first.
///
/// ## Errors
/// If any value does not fit into `bits` bits.
pub fn into_bit_planes<I>(values: I, bits: usize) -> Result<BitDecomposed<Lanes>, Error>
where
    I: IntoIterator<Item = u64>,
    I::IntoIter: Clone,
{
    let values = values.into_iter();
    if let Some(value) = values
        .clone()
        .find(|v| bits < 64 && (v >> bits) != 0)
    {
        return Err(Error::FieldValueTruncation {
            value: u128::from(value),
            bits,
        });
    }

    Ok(BitDecomposed::new((0..bits).map(|i| {
        values
            .clone()
            .map(|v| i < 64 && (v >> i) & 1 == 1)
            .collect::<Lanes>()
    })))
}

/// Inverse of [`into_bit_planes`].
///
/// ## Panics
/// If planes have different lane counts or there are more than 64 planes.
#[must_use]
pub fn from_bit_planes(planes: &[Lanes]) -> Vec<u64> {
    assert!(planes.len() <= 64);
    let lanes = planes.first().map_or(0, Lanes::len);
    (0..lanes)
        .map(|lane| {
            planes.iter().enumerate().fold(0_u64, |acc, (i, plane)| {
                assert_eq!(lanes, plane.len(), "lane count mismatch");
                acc | (u64::from(plane[lane]) << i)
            })
        })
        .collect()
}

#[cfg(all(test, unit_test))]
mod tests {
    use bitvec::{bitvec, order::Lsb0};

    use super::{from_bit_planes, into_bit_planes, pack, unpack, xor_lanes};
    use crate::{error::Error, secret_sharing::Lanes};

    #[test]
    fn bit_planes() {
        let planes = into_bit_planes([5_u64, 2, 7], 3).unwrap();
        assert_eq!(3, planes.len());
        assert_eq!(bitvec![u8, Lsb0; 1, 0, 1], planes[0]);
        assert_eq!(bitvec![u8, Lsb0; 0, 1, 1], planes[1]);
        assert_eq!(bitvec![u8, Lsb0; 1, 0, 1], planes[2]);
        assert_eq!(vec![5, 2, 7], from_bit_planes(&planes));
    }

    #[test]
    fn truncation() {
        assert!(matches!(
            into_bit_planes([8_u64], 3),
            Err(Error::FieldValueTruncation { value: 8, bits: 3 })
        ));
        assert!(into_bit_planes([u64::MAX], 64).is_ok());
    }

    #[test]
    fn wire_format() {
        let values = vec![
            bitvec![u8, Lsb0; 1, 0, 1],
            bitvec![u8, Lsb0; 0, 0, 1],
            bitvec![u8, Lsb0; 1, 1, 1],
        ];
        let bytes = pack(&values);
        assert_eq!(2, bytes.len());
        assert_eq!(Some(values), unpack(&bytes, 3, 3));
        // the byte count alone does not pin down the shape
        assert_eq!(3, unpack(&bytes, 3, 4).unwrap().len());
        assert_eq!(None, unpack(&bytes, 3, 6));
        assert_eq!(None, unpack(&bytes, 1, 3));
    }

    #[test]
    fn xor() {
        let a: Lanes = bitvec![u8, Lsb0; 1, 0, 1, 0];
        let b: Lanes = bitvec![u8, Lsb0; 1, 1, 0, 0];
        assert_eq!(bitvec![u8, Lsb0; 0, 1, 1, 0], xor_lanes(&a, &b));
    }
}
