//! Lane vectors and their bit decompositions.
//!
//! Every secret value handled by the attribution protocol is a vector of bits, one per batch lane.
//! Single-row execution is the special case of one lane. Integers are stored as
//! [`BitDecomposed`] bit planes, least significant plane first.

mod decomposed;
mod lanes;

pub use decomposed::BitDecomposed;
pub use lanes::{
    Lanes, and_lanes, from_bit_planes, into_bit_planes, not_lanes, pack, random_lanes, unpack,
    xor_lanes,
};
