use std::ops::{Deref, DerefMut};

use crate::error::Error;

/// Bit decomposition of an integer, least significant bit first. `S` is the per-bit
/// representation: plaintext lanes, an XOR share or a circuit wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitDecomposed<S> {
    bits: Vec<S>,
}

impl<S> Default for BitDecomposed<S> {
    fn default() -> Self {
        Self { bits: Vec::new() }
    }
}

impl<S> BitDecomposed<S> {
    pub const MAX: usize = 256;

    /// Create a new value from an iterator.
    /// # Panics
    /// If the iterator produces more than `Self::MAX` items.
    pub fn new<I: IntoIterator<Item = S>>(bits: I) -> Self {
        let bits = bits.into_iter().collect::<Vec<_>>();
        assert!(bits.len() <= Self::MAX);
        Self { bits }
    }

    /// Decompose `count` values from context, using a counter from `[0, count)`.
    /// # Panics
    /// If `count` is greater than `Self::MAX`.
    pub fn decompose<F>(count: usize, f: F) -> Self
    where
        F: FnMut(usize) -> S,
    {
        assert!(count <= Self::MAX);
        Self {
            bits: (0..count).map(f).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Appends `value` as the new most significant bit.
    ///
    /// # Panics
    /// If this value already holds `Self::MAX` bits.
    pub fn push(&mut self, value: S) {
        assert!(self.len() < Self::MAX);
        self.bits.push(value);
    }

    #[must_use]
    pub fn split_at(mut self, idx: usize) -> (BitDecomposed<S>, BitDecomposed<S>) {
        let right = self.bits.split_off(idx);
        (self, BitDecomposed { bits: right })
    }
}

impl<S> TryFrom<Vec<S>> for BitDecomposed<S> {
    type Error = Error;
    fn try_from(bits: Vec<S>) -> Result<Self, Self::Error> {
        if bits.len() <= Self::MAX {
            Ok(Self { bits })
        } else {
            Err(Error::FieldValueTruncation {
                value: u128::try_from(bits.len()).unwrap_or(u128::MAX),
                bits: Self::MAX,
            })
        }
    }
}

impl<S> Deref for BitDecomposed<S> {
    type Target = [S];
    fn deref(&self) -> &Self::Target {
        &self.bits
    }
}

impl<S> DerefMut for BitDecomposed<S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.bits
    }
}

impl<S> IntoIterator for BitDecomposed<S> {
    type Item = S;
    type IntoIter = <Vec<S> as IntoIterator>::IntoIter;
    fn into_iter(self) -> Self::IntoIter {
        self.bits.into_iter()
    }
}

impl<S> FromIterator<S> for BitDecomposed<S> {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

#[cfg(all(test, unit_test))]
mod tests {
    use super::BitDecomposed;

    #[test]
    fn split_and_push() {
        let mut value = BitDecomposed::decompose(4, |i| i);
        value.push(4);
        assert_eq!(5, value.len());
        let (low, high) = value.split_at(3);
        assert_eq!(&[0, 1, 2], &*low);
        assert_eq!(&[3, 4], &*high);
    }

    #[test]
    fn too_wide() {
        assert!(BitDecomposed::try_from(vec![false; BitDecomposed::<bool>::MAX + 1]).is_err());
    }
}
