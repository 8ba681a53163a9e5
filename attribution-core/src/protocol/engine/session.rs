use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use bytes::Bytes;

use crate::{
    error::{Error, LengthError},
    helpers::{self, Message, OpTag, Operation, Role, Transport},
    secret_sharing::{Lanes, pack, unpack},
    telemetry::EngineStats,
};

/// Ordered message stream between this party and its peer.
///
/// Every message is tagged with the next sequence number, the operation that produced it and the
/// exact number of payload bits. Both parties advance the counter for every message in either
/// direction, so a receiver can tell immediately when the peer is executing a different
/// operation than it is, or the same operation on a different shape.
pub(crate) struct Session {
    role: Role,
    transport: Arc<dyn Transport>,
    seq: AtomicU64,
    stats: Mutex<EngineStats>,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            role: transport.identity(),
            transport,
            seq: AtomicU64::new(0),
            stats: Mutex::new(EngineStats::default()),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn stats(&self) -> EngineStats {
        *self.stats.lock().unwrap()
    }

    pub fn record_and_gates(&self, gates: usize, rounds: u64) {
        let mut stats = self.stats.lock().unwrap();
        stats.and_gates += gates as u64;
        stats.rounds += rounds;
    }

    fn next_tag(&self, op: Operation, bits: usize) -> OpTag {
        OpTag {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            op,
            bits: bits as u64,
        }
    }

    async fn send_tagged(&self, tag: OpTag, payload: Vec<u8>) -> Result<(), Error> {
        {
            let mut stats = self.stats.lock().unwrap();
            stats.messages_sent += 1;
            stats.bytes_sent += payload.len() as u64;
        }
        tracing::trace!("{:?} sends {tag} ({} bytes)", self.role, payload.len());
        self.transport
            .send(self.role.peer(), Message::new(tag, payload))
            .await?;
        Ok(())
    }

    async fn receive_tagged(&self, expected: OpTag) -> Result<Bytes, Error> {
        let expected_len = usize::try_from(expected.bits)
            .expect("bit count came from a usize")
            .div_ceil(8);
        let message = self.transport.receive(self.role.peer()).await?;
        if message.tag != expected {
            return Err(Error::ProtocolDesynchronization {
                expected,
                actual: message.tag,
            });
        }
        if message.payload.len() != expected_len {
            return Err(helpers::Error::PayloadLength {
                tag: expected,
                expected: expected_len,
                actual: message.payload.len(),
            }
            .into());
        }
        Ok(message.payload)
    }

    /// One-directional message to the peer carrying `bits` bits. The peer must call
    /// [`Self::receive`] for the same operation and bit count at the same position.
    pub async fn send(&self, op: Operation, payload: Vec<u8>, bits: usize) -> Result<(), Error> {
        let tag = self.next_tag(op, bits);
        self.send_tagged(tag, payload).await
    }

    /// Counterpart of [`Self::send`].
    pub async fn receive(&self, op: Operation, bits: usize) -> Result<Bytes, Error> {
        let tag = self.next_tag(op, bits);
        self.receive_tagged(tag).await
    }

    /// Both parties send `bits` bits and receive the peer's payload under the same tag.
    pub async fn exchange(
        &self,
        op: Operation,
        payload: Vec<u8>,
        bits: usize,
    ) -> Result<Bytes, Error> {
        let tag = self.next_tag(op, bits);
        self.send_tagged(tag, payload).await?;
        self.receive_tagged(tag).await
    }

    pub async fn send_lanes(&self, op: Operation, values: &[Lanes]) -> Result<(), Error> {
        let bits = values.iter().map(Lanes::len).sum();
        self.send(op, pack(values), bits).await
    }

    /// Receives `count` vectors of `lanes` bits each.
    pub async fn receive_lanes(
        &self,
        op: Operation,
        count: usize,
        lanes: usize,
    ) -> Result<Vec<Lanes>, Error> {
        let payload = self.receive(op, count * lanes).await?;
        unpack_exact(&payload, count, lanes)
    }

    /// Sends `values`, all of `lanes` bits, and receives as many vectors of the same width.
    pub async fn exchange_lanes(
        &self,
        op: Operation,
        values: &[Lanes],
        lanes: usize,
    ) -> Result<Vec<Lanes>, Error> {
        let payload = self
            .exchange(op, pack(values), values.len() * lanes)
            .await?;
        unpack_exact(&payload, values.len(), lanes)
    }
}

fn unpack_exact(payload: &[u8], count: usize, lanes: usize) -> Result<Vec<Lanes>, Error> {
    unpack(payload, count, lanes).ok_or(Error::Length(LengthError {
        expected: count * lanes,
        actual: payload.len() * 8,
    }))
}
