use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::telemetry::metrics::{AND_GATES, BYTES_SENT, MESSAGES_SENT, ROUNDS};

/// Counters describing the work a secure engine has done during one session. Every counter
/// depends only on public sizes, so both parties must end up with the same values, and two runs
/// with the same shape must too.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// AND gates evaluated, one per lane.
    pub and_gates: u64,
    /// Interactive rounds (message exchanges) used by AND evaluation.
    pub rounds: u64,
    pub messages_sent: u64,
    pub bytes_sent: u64,
}

impl EngineStats {
    /// Communication counters are symmetric for exchanges, but opening a value to one party is
    /// not. This compares what must match between parties.
    #[must_use]
    pub fn same_work(&self, other: &Self) -> bool {
        self.and_gates == other.and_gates && self.rounds == other.rounds
    }
}

impl Display for EngineStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{AND_GATES:<24}{}", self.and_gates)?;
        writeln!(f, "{ROUNDS:<24}{}", self.rounds)?;
        writeln!(f, "{MESSAGES_SENT:<24}{}", self.messages_sent)?;
        writeln!(f, "{BYTES_SENT:<24}{}", self.bytes_sent)
    }
}
