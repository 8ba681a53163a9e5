use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::Error,
    helpers::{Operation, Role, Transport},
    protocol::{
        engine::{EngineSetup, SecureEngine, Session, beaver, check_share_input, uniform_lanes},
        prss::InsecureDealer,
    },
    secret_sharing::{Lanes, not_lanes, random_lanes, xor_lanes},
    telemetry::EngineStats,
};

/// This party's XOR share of a secret bit vector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XorShare(Lanes);

impl XorShare {
    #[must_use]
    pub fn as_lanes(&self) -> &Lanes {
        &self.0
    }
}

/// Two-party XOR-sharing engine that evaluates every AND batch as soon as it is issued.
pub struct EagerEngine {
    session: Session,
    dealer: InsecureDealer,
}

#[async_trait]
impl EngineSetup for EagerEngine {
    async fn setup(transport: Arc<dyn Transport>) -> Result<Self, Error> {
        let session = Session::new(transport);
        let dealer = InsecureDealer::setup(&session).await?;
        Ok(Self { session, dealer })
    }
}

/// Public constant as a share: the publisher holds the value, the partner holds zeros.
pub(super) fn constant_share(role: Role, value: Lanes) -> Lanes {
    match role {
        Role::Publisher => value,
        Role::Partner => Lanes::repeat(false, value.len()),
    }
}

/// The owner masks its values with fresh randomness and sends the mask to the peer.
pub(super) async fn share_input(
    session: &Session,
    owner: Role,
    values: &[Lanes],
    count: usize,
    lanes: usize,
) -> Result<Vec<Lanes>, Error> {
    if owner == session.role() {
        check_share_input(values, count, lanes)?;
        let masks = {
            let mut rng = rand::thread_rng();
            (0..count)
                .map(|_| random_lanes(&mut rng, lanes))
                .collect::<Vec<_>>()
        };
        session.send_lanes(Operation::Share, &masks).await?;
        Ok(values
            .iter()
            .zip(&masks)
            .map(|(value, mask)| xor_lanes(value, mask))
            .collect())
    } else {
        session.receive_lanes(Operation::Share, count, lanes).await
    }
}

/// Sends this party's shares to `party`, or receives the peer's shares and reconstructs.
pub(super) async fn open_shares(
    session: &Session,
    shares: &[Lanes],
    party: Role,
) -> Result<Option<Vec<Lanes>>, Error> {
    let lanes = uniform_lanes(shares)?.unwrap_or(0);
    if party == session.role() {
        let peer = session
            .receive_lanes(Operation::Open, shares.len(), lanes)
            .await?;
        Ok(Some(
            shares
                .iter()
                .zip(peer)
                .map(|(mine, theirs)| xor_lanes(mine, &theirs))
                .collect(),
        ))
    } else {
        session.send_lanes(Operation::Open, shares).await?;
        Ok(None)
    }
}

#[async_trait]
impl SecureEngine for EagerEngine {
    type Bit = XorShare;

    fn role(&self) -> Role {
        self.session.role()
    }

    fn lanes(&self, bit: &Self::Bit) -> usize {
        bit.0.len()
    }

    fn constant(&self, value: Lanes) -> Self::Bit {
        XorShare(constant_share(self.role(), value))
    }

    fn xor(&self, a: &Self::Bit, b: &Self::Bit) -> Self::Bit {
        XorShare(xor_lanes(&a.0, &b.0))
    }

    fn not(&self, a: &Self::Bit) -> Self::Bit {
        match self.role() {
            Role::Publisher => XorShare(not_lanes(&a.0)),
            Role::Partner => a.clone(),
        }
    }

    async fn share(
        &self,
        owner: Role,
        values: &[Lanes],
        count: usize,
        lanes: usize,
    ) -> Result<Vec<Self::Bit>, Error> {
        Ok(share_input(&self.session, owner, values, count, lanes)
            .await?
            .into_iter()
            .map(XorShare)
            .collect())
    }

    async fn from_xor_shares(&self, shares: &[Lanes]) -> Result<Vec<Self::Bit>, Error> {
        uniform_lanes(shares)?;
        Ok(shares.iter().cloned().map(XorShare).collect())
    }

    #[tracing::instrument(level = "trace", skip_all, fields(role = ?self.role(), count = x.len()))]
    async fn multiply(&self, x: &[Self::Bit], y: &[Self::Bit]) -> Result<Vec<Self::Bit>, Error> {
        let x = x.iter().map(|v| v.0.clone()).collect::<Vec<_>>();
        let y = y.iter().map(|v| v.0.clone()).collect::<Vec<_>>();
        Ok(beaver::multiply(&self.session, &self.dealer, &x, &y)
            .await?
            .into_iter()
            .map(XorShare)
            .collect())
    }

    async fn open_to_party(
        &self,
        values: &[Self::Bit],
        party: Role,
    ) -> Result<Option<Vec<Lanes>>, Error> {
        let shares = values.iter().map(|v| v.0.clone()).collect::<Vec<_>>();
        open_shares(&self.session, &shares, party).await
    }

    async fn extract_shares(&self, values: &[Self::Bit]) -> Result<Vec<Lanes>, Error> {
        Ok(values.iter().map(|v| v.0.clone()).collect())
    }

    fn stats(&self) -> EngineStats {
        self.session.stats()
    }
}

#[cfg(all(test, unit_test))]
mod tests {
    use bitvec::{bitvec, order::Lsb0};

    use super::EagerEngine;
    use crate::{
        error::Error,
        helpers::Role,
        protocol::engine::SecureEngine,
        secret_sharing::{Lanes, xor_lanes},
        test_fixture::TestWorld,
    };

    #[tokio::test]
    async fn shares_hide_input() {
        let [publisher, partner] = TestWorld::default()
            .run(|engine: EagerEngine, role| async move {
                let input = if role == Role::Partner {
                    vec![Lanes::repeat(true, 64)]
                } else {
                    Vec::new()
                };
                let shared = engine.share(Role::Partner, &input, 1, 64).await.unwrap();
                shared[0].as_lanes().clone()
            })
            .await;
        assert_ne!(Lanes::repeat(true, 64), partner);
        assert_eq!(Lanes::repeat(true, 64), xor_lanes(&publisher, &partner));
    }

    #[tokio::test]
    async fn and_not_xor() {
        let [publisher, partner] = TestWorld::default()
            .run(|engine: EagerEngine, role| async move {
                let input = if role == Role::Publisher {
                    vec![bitvec![u8, Lsb0; 1, 1, 0, 0], bitvec![u8, Lsb0; 1, 0, 1, 0]]
                } else {
                    Vec::new()
                };
                let v = engine.share(Role::Publisher, &input, 2, 4).await.unwrap();
                let and = engine.multiply(&v[..1], &v[1..]).await.unwrap();
                let nand = engine.not(&and[0]);
                let xor = engine.xor(&v[0], &v[1]);
                let opened = engine
                    .open_to_party(&[nand, xor], Role::Partner)
                    .await
                    .unwrap();
                (opened, engine.stats())
            })
            .await;
        assert_eq!(None, publisher.0);
        assert_eq!(
            Some(vec![bitvec![u8, Lsb0; 0, 1, 1, 1], bitvec![u8, Lsb0; 0, 1, 1, 0]]),
            partner.0
        );
        assert_eq!(4, publisher.1.and_gates);
        assert_eq!(1, partner.1.rounds);
        assert!(publisher.1.same_work(&partner.1));
    }

    #[tokio::test]
    async fn lane_mismatch_is_detected_before_sending() {
        let [publisher, partner] = TestWorld::default()
            .run(|engine: EagerEngine, _role| async move {
                let a = engine.constant(Lanes::repeat(true, 2));
                let b = engine.constant(Lanes::repeat(true, 3));
                let result = engine.multiply(&[a], &[b]).await;
                (matches!(result, Err(Error::LaneMismatch { .. })), engine.stats())
            })
            .await;
        assert!(publisher.0 && partner.0);
        // key exchange only
        assert_eq!(1, publisher.1.messages_sent);
    }
}
