use thiserror::Error;

use crate::helpers::{OpTag, Role};

/// An error raised by the channel connecting the two parties.
#[derive(Error, Debug)]
pub enum Error {
    #[error("peer has disconnected")]
    PeerDisconnected,
    #[error("{from:?} cannot send messages to itself")]
    SelfAddressed { from: Role },
    #[error("payload for {tag} has {actual} bytes, expected {expected}")]
    PayloadLength {
        tag: OpTag,
        expected: usize,
        actual: usize,
    },
}
