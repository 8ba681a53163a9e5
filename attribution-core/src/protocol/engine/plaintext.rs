use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
    error::{Error, LengthError},
    helpers::{Operation, Role, Transport},
    protocol::engine::{EngineSetup, SecureEngine, Session, check_share_input, uniform_lanes},
    secret_sharing::{Lanes, and_lanes, not_lanes, xor_lanes},
    telemetry::EngineStats,
};

/// Engine that computes on values in the clear.
///
/// A standalone engine plays both parties inside one process: every input must be supplied to it
/// and every value can be opened. A networked engine runs next to a peer and forwards the owner's
/// inputs to it, so both parties end up computing on the same values. Either way the sequence of
/// operations and the gate counts are the same as for the two-party backends.
pub struct PlaintextEngine {
    role: Role,
    session: Option<Session>,
    gates: Mutex<EngineStats>,
}

impl PlaintextEngine {
    #[must_use]
    pub fn standalone(role: Role) -> Self {
        Self {
            role,
            session: None,
            gates: Mutex::new(EngineStats::default()),
        }
    }

    #[must_use]
    pub fn networked(transport: Arc<dyn Transport>) -> Self {
        let session = Session::new(transport);
        Self {
            role: session.role(),
            session: Some(session),
            gates: Mutex::new(EngineStats::default()),
        }
    }
}

#[async_trait]
impl EngineSetup for PlaintextEngine {
    async fn setup(transport: Arc<dyn Transport>) -> Result<Self, Error> {
        Ok(Self::networked(transport))
    }
}

#[async_trait]
impl SecureEngine for PlaintextEngine {
    type Bit = Lanes;

    fn role(&self) -> Role {
        self.role
    }

    fn lanes(&self, bit: &Self::Bit) -> usize {
        bit.len()
    }

    fn constant(&self, value: Lanes) -> Self::Bit {
        value
    }

    fn xor(&self, a: &Self::Bit, b: &Self::Bit) -> Self::Bit {
        xor_lanes(a, b)
    }

    fn not(&self, a: &Self::Bit) -> Self::Bit {
        not_lanes(a)
    }

    async fn share(
        &self,
        owner: Role,
        values: &[Lanes],
        count: usize,
        lanes: usize,
    ) -> Result<Vec<Self::Bit>, Error> {
        let Some(session) = &self.session else {
            check_share_input(values, count, lanes)?;
            return Ok(values.to_vec());
        };

        if owner == self.role {
            check_share_input(values, count, lanes)?;
            session.send_lanes(Operation::Share, values).await?;
            Ok(values.to_vec())
        } else {
            session.receive_lanes(Operation::Share, count, lanes).await
        }
    }

    async fn from_xor_shares(&self, shares: &[Lanes]) -> Result<Vec<Self::Bit>, Error> {
        let Some(session) = &self.session else {
            return Err(Error::Unsupported(
                "a standalone plaintext engine has no peer to combine XOR shares with".into(),
            ));
        };
        let lanes = uniform_lanes(shares)?.unwrap_or(0);
        let peer = session
            .exchange_lanes(Operation::ExchangeShares, shares, lanes)
            .await?;

        Ok(shares
            .iter()
            .zip(peer)
            .map(|(mine, theirs)| xor_lanes(mine, &theirs))
            .collect())
    }

    async fn multiply(&self, x: &[Self::Bit], y: &[Self::Bit]) -> Result<Vec<Self::Bit>, Error> {
        LengthError::check(x.len(), y.len())?;
        let lanes = uniform_lanes(x.iter().chain(y))?.unwrap_or(0);
        if !x.is_empty() {
            let mut gates = self.gates.lock().unwrap();
            gates.and_gates += (x.len() * lanes) as u64;
            gates.rounds += 1;
        }
        Ok(x.iter().zip(y).map(|(x, y)| and_lanes(x, y)).collect())
    }

    async fn open_to_party(
        &self,
        values: &[Self::Bit],
        party: Role,
    ) -> Result<Option<Vec<Lanes>>, Error> {
        Ok((self.session.is_none() || party == self.role).then(|| values.to_vec()))
    }

    async fn extract_shares(&self, values: &[Self::Bit]) -> Result<Vec<Lanes>, Error> {
        Ok(match (&self.session, self.role) {
            (None, _) | (Some(_), Role::Publisher) => values.to_vec(),
            (Some(_), Role::Partner) => values
                .iter()
                .map(|v| Lanes::repeat(false, v.len()))
                .collect(),
        })
    }

    fn stats(&self) -> EngineStats {
        let gates = *self.gates.lock().unwrap();
        let traffic = self
            .session
            .as_ref()
            .map(Session::stats)
            .unwrap_or_default();
        EngineStats {
            and_gates: gates.and_gates,
            rounds: gates.rounds,
            messages_sent: traffic.messages_sent,
            bytes_sent: traffic.bytes_sent,
        }
    }
}
