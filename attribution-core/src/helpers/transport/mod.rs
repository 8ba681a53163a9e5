#[cfg(feature = "in-memory-infra")]
mod in_memory;

use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(feature = "in-memory-infra")]
pub use in_memory::InMemoryTransport;

use crate::helpers::{Error, Role};

/// Kind of secure operation a message belongs to. Both parties must issue the same kinds in
/// the same order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    KeyExchange,
    Share,
    ExchangeShares,
    Multiply,
    Open,
}

impl Operation {
    #[must_use]
    pub fn as_static_str(&self) -> &'static str {
        match self {
            Operation::KeyExchange => "key_exchange",
            Operation::Share => "share",
            Operation::ExchangeShares => "exchange_shares",
            Operation::Multiply => "multiply",
            Operation::Open => "open",
        }
    }
}

/// Position of a message inside the operation sequence of a session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OpTag {
    pub seq: u64,
    pub op: Operation,
    /// Exact payload size in bits. Two shapes may pack into the same number of bytes.
    pub bits: u64,
}

impl Display for OpTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}#{} ({} bits)",
            self.op.as_static_str(),
            self.seq,
            self.bits
        )
    }
}

#[derive(Clone, Debug)]
pub struct Message {
    pub tag: OpTag,
    pub payload: Bytes,
}

impl Message {
    #[must_use]
    pub fn new<B: Into<Bytes>>(tag: OpTag, payload: B) -> Self {
        Self {
            tag,
            payload: payload.into(),
        }
    }
}

/// Point-to-point channel between the two parties. Messages between a given pair of parties are
/// delivered in the order they were sent.
#[async_trait]
pub trait Transport: Send + Sync {
    fn identity(&self) -> Role;

    /// Sends a message to the given party.
    ///
    /// ## Errors
    /// If the peer is gone or `to` is this party.
    async fn send(&self, to: Role, message: Message) -> Result<(), Error>;

    /// Awaits the next message from the given party.
    ///
    /// ## Errors
    /// If the peer is gone or `from` is this party.
    async fn receive(&self, from: Role) -> Result<Message, Error>;
}
