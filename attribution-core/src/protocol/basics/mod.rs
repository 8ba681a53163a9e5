mod if_else;

pub use if_else::{select, select_bits};

use crate::{
    protocol::engine::SecureEngine,
    secret_sharing::{BitDecomposed, Lanes},
};

/// Public `value` as `bits` bit planes of `lanes` lanes each, least significant bit first.
///
/// ## Panics
/// If `bits` is greater than 64.
pub fn known_value_bits<E: SecureEngine>(
    engine: &E,
    value: u64,
    bits: usize,
    lanes: usize,
) -> BitDecomposed<E::Bit> {
    assert!(bits <= 64, "{bits} bits do not fit into u64");
    BitDecomposed::decompose(bits, |i| {
        engine.constant(Lanes::repeat((value >> i) & 1 == 1, lanes))
    })
}
