//! Helpers for tests: a two-party world over in-memory channels, random inputs split into each
//! party's encoding, and an in-the-clear reference implementation to check results against.

mod event_gen;
pub mod logging;
mod reference;
#[cfg(feature = "in-memory-infra")]
mod world;

pub use event_gen::{Config as EventGeneratorConfig, EventGenerator, split_input};
pub use reference::attribute_in_the_clear;
#[cfg(feature = "in-memory-infra")]
pub use world::{TestWorld, TestWorldConfig};

use crate::protocol::attribution::AttributionOutputMetrics;

/// Combines both parties' XOR shares of the attribution results.
///
/// ## Panics
/// If the two outputs do not have the same rules and shapes.
#[must_use]
pub fn reveal_xored_result(
    publisher: &AttributionOutputMetrics,
    partner: &AttributionOutputMetrics,
) -> AttributionOutputMetrics {
    assert_eq!(
        publisher.rule_to_results.keys().collect::<Vec<_>>(),
        partner.rule_to_results.keys().collect::<Vec<_>>()
    );
    let rule_to_results = publisher
        .rule_to_results
        .iter()
        .map(|(rule, rows)| {
            let other = &partner.rule_to_results[rule];
            assert_eq!(rows.len(), other.len());
            let rows = rows
                .iter()
                .zip(other)
                .map(|(a, b)| {
                    assert_eq!(a.len(), b.len());
                    a.iter().zip(b).map(|(a, b)| a ^ b).collect()
                })
                .collect();
            (rule.clone(), rows)
        })
        .collect();
    AttributionOutputMetrics { rule_to_results }
}
