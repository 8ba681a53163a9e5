//! Correlated randomness shared by the two parties.
//!
//! Both parties run an x25519 key exchange over their channel and expand the shared secret into
//! AES-based generators. Beaver triples are drawn from the `beaver-triples` generator.

mod crypto;

use std::sync::atomic::{AtomicU64, Ordering};

pub use crypto::{Generator, GeneratorFactory, KeyExchange};
use x25519_dalek::PublicKey;

use crate::{
    error::Error,
    helpers::{Operation, Role},
    protocol::engine::Session,
    secret_sharing::{Lanes, and_lanes, xor_lanes},
};

/// One party's shares of a batch of Beaver triples `c = a & b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripleShares {
    pub a: Lanes,
    pub b: Lanes,
    pub c: Lanes,
}

/// Dealer of Beaver triples derived from a generator known to both parties.
///
/// Both parties can compute the complete triples, not just their own shares, so the peer learns
/// nothing it could not already compute only as long as it follows the protocol. This is the
/// test-grade ("insecure") tuple generation; a production deployment replaces it with an
/// OT-based dealer behind the same interface.
#[derive(Debug)]
pub struct InsecureDealer {
    role: Role,
    generator: Generator,
    next_block: AtomicU64,
}

impl InsecureDealer {
    const CONTEXT: &'static [u8] = b"beaver-triples";

    #[must_use]
    pub fn new(role: Role, factory: &GeneratorFactory) -> Self {
        Self {
            role,
            generator: factory.generator(Self::CONTEXT),
            next_block: AtomicU64::new(0),
        }
    }

    /// Runs the key exchange with the peer and builds the dealer from the shared secret.
    ///
    /// ## Errors
    /// If the channel fails, the peer is out of sync or sends a malformed key.
    pub(crate) async fn setup(session: &Session) -> Result<Self, Error> {
        let exchange = KeyExchange::new(&mut rand::thread_rng());
        let peer_key = session
            .exchange(
                Operation::KeyExchange,
                exchange.public_key().as_bytes().to_vec(),
                256,
            )
            .await?;
        let mut key = [0_u8; 32];
        key.copy_from_slice(&peer_key);
        let factory = exchange.key_exchange(&PublicKey::from(key));

        tracing::debug!("{:?} established triple generator", session.role());
        Ok(Self::new(session.role(), &factory))
    }

    fn random_bits(&self, count: usize) -> Lanes {
        let blocks = u64::try_from(count.div_ceil(128)).expect("block count fits into u64");
        let start = self.next_block.fetch_add(blocks, Ordering::Relaxed);
        let mut bits = Lanes::with_capacity(count);
        for block in start..start + blocks {
            bits.extend_from_raw_slice(&self.generator.generate(u128::from(block)).to_le_bytes());
        }
        bits.truncate(count);
        bits
    }

    /// Draws `count` triples and returns this party's shares. Both parties must request the same
    /// counts in the same order.
    pub fn triples(&self, count: usize) -> TripleShares {
        let a = [self.random_bits(count), self.random_bits(count)];
        let b = [self.random_bits(count), self.random_bits(count)];
        let c0 = self.random_bits(count);

        match self.role {
            Role::Publisher => TripleShares {
                a: a[0].clone(),
                b: b[0].clone(),
                c: c0,
            },
            Role::Partner => {
                let product = and_lanes(&xor_lanes(&a[0], &a[1]), &xor_lanes(&b[0], &b[1]));
                TripleShares {
                    a: a[1].clone(),
                    b: b[1].clone(),
                    c: xor_lanes(&product, &c0),
                }
            }
        }
    }
}

#[cfg(all(test, unit_test))]
mod tests {
    use rand::thread_rng;

    use super::{InsecureDealer, KeyExchange};
    use crate::{
        helpers::Role,
        secret_sharing::{and_lanes, xor_lanes},
    };

    fn dealers() -> [InsecureDealer; 2] {
        let mut rng = thread_rng();
        let publisher = KeyExchange::new(&mut rng);
        let partner = KeyExchange::new(&mut rng);
        let (publisher_pk, partner_pk) = (publisher.public_key(), partner.public_key());
        [
            InsecureDealer::new(Role::Publisher, &publisher.key_exchange(&partner_pk)),
            InsecureDealer::new(Role::Partner, &partner.key_exchange(&publisher_pk)),
        ]
    }

    #[test]
    fn triples_are_valid() {
        let [publisher, partner] = dealers();
        for count in [1, 7, 128, 300] {
            let p = publisher.triples(count);
            let q = partner.triples(count);
            assert_eq!(count, p.a.len());
            let a = xor_lanes(&p.a, &q.a);
            let b = xor_lanes(&p.b, &q.b);
            let c = xor_lanes(&p.c, &q.c);
            assert_eq!(and_lanes(&a, &b), c);
        }
    }

    #[test]
    fn triples_are_fresh() {
        let [publisher, _] = dealers();
        assert_ne!(publisher.triples(256), publisher.triples(256));
    }
}
