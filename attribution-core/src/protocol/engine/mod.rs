//! Secure-value engines.
//!
//! [`SecureEngine`] is the capability the attribution protocol is written against: secret bits
//! with one value per batch lane, XOR and NOT (local), AND (interactive), input sharing and
//! opening. Three backends implement it:
//!
//! * [`PlaintextEngine`] keeps values in the clear. It is the reference every other backend must
//!   agree with bit for bit.
//! * [`EagerEngine`] XOR-shares every value between the two parties and evaluates each AND batch
//!   as soon as it is issued, one round per batch.
//! * [`LazyEngine`] XOR-shares values too, but records XOR/NOT/AND gates as a circuit and only
//!   evaluates it when a value is opened or extracted, packing all AND gates of the same
//!   multiplicative depth into one round.
//!
//! The sequence of operations issued against an engine must depend on public information only.
//! Every message carries a sequence number and an operation tag, and any disagreement between
//! parties surfaces as [`Error::ProtocolDesynchronization`].

mod beaver;
mod eager;
mod lazy;
mod plaintext;
mod session;

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
pub use eager::{EagerEngine, XorShare};
pub use lazy::{LazyEngine, Wire};
pub use plaintext::PlaintextEngine;
use serde::{Deserialize, Serialize};
pub(crate) use session::Session;

use crate::{
    error::{Error, LengthError},
    helpers::{Role, Transport},
    secret_sharing::Lanes,
    telemetry::EngineStats,
};

/// Capability interface over secret-shared bit vectors.
///
/// All values passed to a single call must have the same number of lanes. `xor` and `not` are
/// local and panic on lane mismatch; everything that talks to the peer validates its inputs and
/// returns an error before sending anything.
#[async_trait]
pub trait SecureEngine: Send + Sync {
    /// A secret bit per lane.
    type Bit: Clone + Debug + Send + Sync + 'static;

    fn role(&self) -> Role;

    fn lanes(&self, bit: &Self::Bit) -> usize;

    /// A public value known to both parties.
    fn constant(&self, value: Lanes) -> Self::Bit;

    fn xor(&self, a: &Self::Bit, b: &Self::Bit) -> Self::Bit;

    fn not(&self, a: &Self::Bit) -> Self::Bit;

    /// Secret-shares `count` values of `lanes` lanes each, owned by `owner`. The owner passes the
    /// values, the other party passes an empty slice.
    ///
    /// ## Errors
    /// If the owner does not supply exactly `count` values of `lanes` lanes, or the channel fails.
    async fn share(
        &self,
        owner: Role,
        values: &[Lanes],
        count: usize,
        lanes: usize,
    ) -> Result<Vec<Self::Bit>, Error>;

    /// Installs values that are already XOR-shared between the parties: each party passes its
    /// own share.
    ///
    /// ## Errors
    /// If the backend needs to exchange shares and the channel fails.
    async fn from_xor_shares(&self, shares: &[Lanes]) -> Result<Vec<Self::Bit>, Error>;

    /// Elementwise AND of `x` and `y`.
    ///
    /// ## Errors
    /// If `x` and `y` have different lengths or lane counts, or the channel fails.
    async fn multiply(&self, x: &[Self::Bit], y: &[Self::Bit]) -> Result<Vec<Self::Bit>, Error>;

    /// Reveals `values` to `party`. Only that party gets `Some`.
    ///
    /// ## Errors
    /// If the channel fails or the peer is out of sync.
    async fn open_to_party(
        &self,
        values: &[Self::Bit],
        party: Role,
    ) -> Result<Option<Vec<Lanes>>, Error>;

    /// Returns this party's XOR shares of `values`, ready to be combined with the peer's shares
    /// outside of the protocol.
    ///
    /// ## Errors
    /// If pending work needs the channel and it fails.
    async fn extract_shares(&self, values: &[Self::Bit]) -> Result<Vec<Lanes>, Error>;

    fn stats(&self) -> EngineStats;
}

/// Construction of a two-party engine on top of a channel.
#[async_trait]
pub trait EngineSetup: SecureEngine + Sized {
    /// ## Errors
    /// If the initial handshake with the peer fails.
    async fn setup(transport: Arc<dyn Transport>) -> Result<Self, Error>;
}

/// Which backend a party runs. Both parties must agree on it out of band.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Plaintext,
    #[default]
    Eager,
    Lazy,
}

/// Returns the lane count shared by all `values`, or `None` if there are none.
///
/// ## Errors
/// If two values have different lane counts.
pub(crate) fn uniform_lanes<'a, I>(values: I) -> Result<Option<usize>, Error>
where
    I: IntoIterator<Item = &'a Lanes>,
{
    let mut lanes = None;
    for value in values {
        match lanes {
            None => lanes = Some(value.len()),
            Some(expected) if expected != value.len() => {
                return Err(Error::LaneMismatch {
                    expected,
                    actual: value.len(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(lanes)
}

/// Validates the owner's input to [`SecureEngine::share`].
pub(crate) fn check_share_input(values: &[Lanes], count: usize, lanes: usize) -> Result<(), Error> {
    LengthError::check(count, values.len())?;
    match uniform_lanes(values)? {
        Some(actual) if actual != lanes => Err(Error::LaneMismatch {
            expected: lanes,
            actual,
        }),
        _ => Ok(()),
    }
}
