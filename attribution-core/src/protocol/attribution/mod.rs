//! Conversion attribution over secret-shared inputs.
//!
//! Each party runs [`compute_attributions`] with its own records and the public run parameters.
//! The pipeline shares the inputs, parses the rules, computes thresholds once per touchpoint and
//! then runs [`compute_attributions_helper`] for every rule. The result holds this party's XOR
//! shares of the credit matrices, to be combined with the peer's shares by whoever is entitled
//! to see them.

pub mod engine;
pub mod input;
pub mod rule;
pub mod threshold;

use std::{collections::BTreeMap, sync::Arc};

pub use engine::compute_attributions_helper;
pub use input::{
    Conversion, ConversionBatch, ID_BITS, InputEncryption, PrivateConversion, PrivateTouchpoint,
    TS_BITS, Touchpoint, TouchpointBatch, privately_share_conversion_batches,
    privately_share_conversions, privately_share_touchpoint_batches, privately_share_touchpoints,
};
pub use rule::{AttributionRule, share_attribution_rules};
use serde::{Deserialize, Serialize};
pub use threshold::privately_share_thresholds;

use crate::{
    config::AttributionConfig,
    error::{Error, LengthError},
    helpers::{Role, Transport},
    protocol::engine::{
        EagerEngine, EngineKind, EngineSetup, LazyEngine, PlaintextEngine, SecureEngine,
    },
};

/// Public dimensions of a run. Both parties must use the same shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub rows: usize,
    /// Touchpoints per row.
    pub touchpoints: usize,
    /// Conversions per row.
    pub conversions: usize,
}

/// Everything one party brings to a run. Records this party does not hold under `encryption`
/// are left empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionInputMetrics {
    pub role: Role,
    pub rules: Vec<String>,
    pub shape: InputShape,
    #[serde(default)]
    pub encryption: InputEncryption,
    #[serde(default)]
    pub touchpoints: Vec<Vec<Touchpoint>>,
    #[serde(default)]
    pub conversions: Vec<Vec<Conversion>>,
}

impl AttributionInputMetrics {
    /// ## Errors
    /// If `json` is not a valid input document.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    fn validate(&self) -> Result<(), Error> {
        let InputShape {
            rows,
            touchpoints,
            conversions,
        } = self.shape;
        if self.encryption.holds_touchpoints(self.role) || !self.touchpoints.is_empty() {
            check_rows("touchpoints", &self.touchpoints, rows, touchpoints)?;
        }
        if self.encryption.holds_conversions(self.role) || !self.conversions.is_empty() {
            check_rows("conversions", &self.conversions, rows, conversions)?;
        }
        Ok(())
    }
}

fn check_rows<T>(
    what: &'static str,
    records: &[Vec<T>],
    rows: usize,
    per_row: usize,
) -> Result<(), Error> {
    if records.is_empty() {
        return if rows > 0 && per_row > 0 {
            Err(Error::MissingInput(what))
        } else {
            Ok(())
        };
    }
    LengthError::check(rows, records.len())?;
    for row in records {
        LengthError::check(per_row, row.len())?;
    }
    Ok(())
}

/// This party's share of the attribution results: for every rule, for every row, the XOR share
/// of the credit matrix indexed `c * touchpoints + t`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionOutputMetrics {
    pub rule_to_results: BTreeMap<String, Vec<Vec<bool>>>,
}

impl AttributionOutputMetrics {
    /// ## Errors
    /// If serialization fails.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Where a computed result bit goes in the output.
struct Placement {
    rule: usize,
    first_row: usize,
    lanes: usize,
    offset: usize,
}

/// Runs the whole pipeline for the local party and returns its shares of the results.
///
/// With `batch_size == 1` every row is processed on its own with single-lane values. Otherwise
/// rows are packed into lanes, `batch_size` rows per batch and fewer in the last one. Nothing is
/// returned until every row of every rule is computed.
///
/// ## Errors
/// If a rule name is unknown, `batch_size` is zero, or this party's records do not match the
/// shape. These are detected before anything is sent to the peer. Engine errors are propagated
/// and abort the run.
#[tracing::instrument(level = "info", skip_all, fields(
    role = ?engine.role(),
    rows = input.shape.rows,
    batch_size = batch_size,
))]
pub async fn compute_attributions<E: SecureEngine>(
    engine: &E,
    input: &AttributionInputMetrics,
    batch_size: usize,
) -> Result<AttributionOutputMetrics, Error> {
    if input.role != engine.role() {
        return Err(Error::Unsupported(format!(
            "input for {:?} cannot run on the {:?} engine",
            input.role,
            engine.role()
        )));
    }
    if batch_size == 0 {
        return Err(Error::Unsupported("batch size must be positive".into()));
    }
    let rules = share_attribution_rules(input.role, &input.rules)?;
    input.validate()?;

    let InputShape {
        rows,
        touchpoints: tp_count,
        conversions: conv_count,
    } = input.shape;
    let mut pending = Vec::new();
    let mut placements = Vec::new();
    let mut place = |rule, first_row, lanes, bits: Vec<E::Bit>| {
        placements.push(Placement {
            rule,
            first_row,
            lanes,
            offset: pending.len(),
        });
        pending.extend(bits);
    };

    if batch_size == 1 {
        let touchpoints = privately_share_touchpoints(
            engine,
            &input.touchpoints,
            rows,
            tp_count,
            input.encryption,
        )
        .await?;
        let conversions = privately_share_conversions(
            engine,
            &input.conversions,
            rows,
            conv_count,
            input.encryption,
        )
        .await?;

        for (row, (tps, convs)) in touchpoints.iter().zip(&conversions).enumerate() {
            let plaintext = input.touchpoints.get(row).map_or_else(Vec::new, |records| {
                records.iter().map(|&tp| std::iter::once(tp).collect()).collect()
            });
            for (r, rule) in rules.iter().enumerate() {
                let thresholds =
                    privately_share_thresholds(engine, &plaintext, tps, rule, input.encryption)
                        .await?;
                let credit =
                    compute_attributions_helper(engine, tps, convs, rule, &thresholds, 1).await?;
                place(r, row, 1, credit);
            }
        }
    } else {
        for first_row in (0..rows).step_by(batch_size) {
            let lanes = batch_size.min(rows - first_row);
            let batch_rows = first_row..first_row + lanes;
            let tp_columns = if input.touchpoints.is_empty() {
                Vec::new()
            } else {
                (0..tp_count)
                    .map(|t| {
                        input.touchpoints[batch_rows.clone()]
                            .iter()
                            .map(|row| row[t])
                            .collect::<TouchpointBatch>()
                    })
                    .collect::<Vec<_>>()
            };
            let conv_columns = if input.conversions.is_empty() {
                Vec::new()
            } else {
                (0..conv_count)
                    .map(|c| {
                        input.conversions[batch_rows.clone()]
                            .iter()
                            .map(|row| row[c])
                            .collect::<ConversionBatch>()
                    })
                    .collect::<Vec<_>>()
            };

            let touchpoints = privately_share_touchpoint_batches(
                engine,
                &tp_columns,
                tp_count,
                lanes,
                input.encryption,
            )
            .await?;
            let conversions = privately_share_conversion_batches(
                engine,
                &conv_columns,
                conv_count,
                lanes,
                input.encryption,
            )
            .await?;

            for (r, rule) in rules.iter().enumerate() {
                let thresholds = privately_share_thresholds(
                    engine,
                    &tp_columns,
                    &touchpoints,
                    rule,
                    input.encryption,
                )
                .await?;
                let credit = compute_attributions_helper(
                    engine,
                    &touchpoints,
                    &conversions,
                    rule,
                    &thresholds,
                    lanes,
                )
                .await?;
                place(r, first_row, lanes, credit);
            }
        }
    }

    let shares = engine.extract_shares(&pending).await?;
    let cells = tp_count * conv_count;
    let mut per_rule = vec![vec![Vec::new(); rows]; rules.len()];
    for placement in placements {
        let results = &mut per_rule[placement.rule];
        let bits = &shares[placement.offset..placement.offset + cells];
        for lane in 0..placement.lanes {
            results[placement.first_row + lane] = bits.iter().map(|bit| bit[lane]).collect();
        }
    }
    let rule_to_results = rules
        .iter()
        .map(|rule| rule.name().to_string())
        .zip(per_rule)
        .collect::<BTreeMap<_, _>>();

    tracing::info!(
        "{:?} attributed {rows} rows for {} rules",
        engine.role(),
        rules.len()
    );
    Ok(AttributionOutputMetrics { rule_to_results })
}

/// Sets up the configured engine over `transport` and runs [`compute_attributions`]. Logging is
/// installed according to `config.verbosity` unless the process already has a subscriber.
///
/// ## Errors
/// If the input encoding differs from the configured one, or the run fails.
pub async fn run(
    config: &AttributionConfig,
    transport: Arc<dyn Transport>,
    input: &AttributionInputMetrics,
) -> Result<AttributionOutputMetrics, Error> {
    if config.input_encryption != input.encryption {
        return Err(Error::Unsupported(format!(
            "input is encoded as {:?}, but the run is configured for {:?}",
            input.encryption, config.input_encryption
        )));
    }
    config.verbosity.setup_logging();
    match config.engine {
        EngineKind::Plaintext => {
            run_with::<PlaintextEngine>(transport, input, config.batch_size).await
        }
        EngineKind::Eager => run_with::<EagerEngine>(transport, input, config.batch_size).await,
        EngineKind::Lazy => run_with::<LazyEngine>(transport, input, config.batch_size).await,
    }
}

async fn run_with<E: EngineSetup>(
    transport: Arc<dyn Transport>,
    input: &AttributionInputMetrics,
    batch_size: usize,
) -> Result<AttributionOutputMetrics, Error> {
    let engine = E::setup(transport).await?;
    let output = compute_attributions(&engine, input, batch_size).await?;
    tracing::info!("{:?} engine stats:\n{}", engine.role(), engine.stats());
    Ok(output)
}
