use rand::Rng;

use crate::{
    helpers::Role,
    protocol::attribution::{
        AttributionInputMetrics, Conversion, InputEncryption, InputShape, Touchpoint,
    },
};

#[derive(Debug, Clone)]
pub struct Config {
    pub shape: InputShape,
    /// Timestamps are drawn from `[0, max_timestamp]`. The default spans a little over a week,
    /// so every catalog window both includes and excludes some pairs.
    pub max_timestamp: u32,
    pub click_probability: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shape: InputShape {
                rows: 4,
                touchpoints: 4,
                conversions: 3,
            },
            max_timestamp: 700_000,
            click_probability: 0.5,
        }
    }
}

/// Generates random plaintext rows. Timestamps cluster so that ties and near-misses on the
/// window bounds come up regularly.
pub struct EventGenerator<R: Rng> {
    config: Config,
    rng: R,
}

impl<R: Rng> EventGenerator<R> {
    pub fn with_config(rng: R, config: Config) -> Self {
        Self { config, rng }
    }

    fn timestamp(&mut self) -> u32 {
        const DAY: u32 = 86_400;
        match self.rng.gen_range(0..4) {
            // land on a day boundary, give or take a second
            0 => {
                let days = self.rng.gen_range(0..=self.config.max_timestamp / DAY);
                (days * DAY).saturating_add(self.rng.gen_range(0..=2)).saturating_sub(1)
            }
            // small values collide often
            1 => self.rng.gen_range(0..8),
            _ => self.rng.gen_range(0..=self.config.max_timestamp),
        }
    }

    /// Returns `(touchpoints, conversions)` for every row.
    pub fn generate(&mut self) -> (Vec<Vec<Touchpoint>>, Vec<Vec<Conversion>>) {
        let InputShape {
            rows,
            touchpoints,
            conversions,
        } = self.config.shape;
        let mut all_touchpoints = Vec::with_capacity(rows);
        let mut all_conversions = Vec::with_capacity(rows);
        for _ in 0..rows {
            all_touchpoints.push(
                (0..touchpoints)
                    .map(|i| Touchpoint {
                        id: i as u64,
                        is_click: self.rng.gen_bool(self.config.click_probability),
                        ts: self.timestamp(),
                    })
                    .collect(),
            );
            all_conversions.push(
                (0..conversions)
                    .map(|_| Conversion {
                        ts: self.timestamp(),
                    })
                    .collect(),
            );
        }
        (all_touchpoints, all_conversions)
    }
}

fn mask_touchpoint<R: Rng>(rng: &mut R, tp: Touchpoint) -> (Touchpoint, Touchpoint) {
    let mask = Touchpoint {
        id: rng.r#gen(),
        is_click: rng.r#gen(),
        ts: rng.r#gen(),
    };
    let masked = Touchpoint {
        id: tp.id ^ mask.id,
        is_click: tp.is_click ^ mask.is_click,
        ts: tp.ts ^ mask.ts,
    };
    (masked, mask)
}

fn mask_conversion<R: Rng>(rng: &mut R, conversion: Conversion) -> (Conversion, Conversion) {
    let mask = Conversion { ts: rng.r#gen() };
    (
        Conversion {
            ts: conversion.ts ^ mask.ts,
        },
        mask,
    )
}

/// Splits plaintext rows into the inputs each party brings under `encryption`, indexed by
/// [`Role`].
pub fn split_input<R: Rng>(
    rng: &mut R,
    rules: &[&str],
    touchpoints: &[Vec<Touchpoint>],
    conversions: &[Vec<Conversion>],
    encryption: InputEncryption,
) -> [AttributionInputMetrics; 2] {
    let shape = InputShape {
        rows: touchpoints.len(),
        touchpoints: touchpoints.first().map_or(0, Vec::len),
        conversions: conversions.first().map_or(0, Vec::len),
    };
    let empty = |role| AttributionInputMetrics {
        role,
        rules: rules.iter().map(ToString::to_string).collect(),
        shape,
        encryption,
        touchpoints: Vec::new(),
        conversions: Vec::new(),
    };
    let [mut publisher, mut partner] = [empty(Role::Publisher), empty(Role::Partner)];

    match encryption {
        InputEncryption::Plaintext => {
            publisher.touchpoints = touchpoints.to_vec();
            partner.conversions = conversions.to_vec();
        }
        InputEncryption::PartnerXor | InputEncryption::Xor => {
            (publisher.touchpoints, partner.touchpoints) = touchpoints
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|&tp| mask_touchpoint(rng, tp))
                        .unzip::<_, _, Vec<_>, Vec<_>>()
                })
                .unzip();
            if encryption == InputEncryption::Xor {
                (publisher.conversions, partner.conversions) = conversions
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|&c| mask_conversion(rng, c))
                            .unzip::<_, _, Vec<_>, Vec<_>>()
                    })
                    .unzip();
            } else {
                partner.conversions = conversions.to_vec();
            }
        }
    }

    [publisher, partner]
}
