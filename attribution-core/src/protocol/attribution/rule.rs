use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    str::FromStr,
};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::{error::Error, helpers::Role};

pub const LAST_CLICK_1D: &str = "last_click_1d";
pub const LAST_TOUCH_1D: &str = "last_touch_1d";
pub const LAST_CLICK_28D: &str = "last_click_28d";
pub const LAST_TOUCH_28D: &str = "last_touch_28d";
pub const LAST_CLICK_2_7D: &str = "last_click_2_7d";
pub const LAST_TOUCH_2_7D: &str = "last_touch_2_7d";

const DAY: u32 = 86_400;

static CATALOG: Lazy<HashMap<&'static str, AttributionRule>> = Lazy::new(|| {
    [
        AttributionRule::new(LAST_CLICK_1D, true, 0, DAY),
        AttributionRule::new(LAST_TOUCH_1D, false, 0, DAY),
        AttributionRule::new(LAST_CLICK_28D, true, 0, 28 * DAY),
        AttributionRule::new(LAST_TOUCH_28D, false, 0, 28 * DAY),
        AttributionRule::new(LAST_CLICK_2_7D, true, 2 * DAY, 7 * DAY),
        AttributionRule::new(LAST_TOUCH_2_7D, false, 2 * DAY, 7 * DAY),
    ]
    .into_iter()
    .map(|rule| (rule.name, rule))
    .collect()
});

/// Public attribution policy: which touchpoints may be credited and how long after a touchpoint
/// a conversion may happen. Among eligible touchpoints the most recent one wins, and a click wins
/// over an impression.
///
/// The window applies to `conversion.ts - touchpoint.ts`, both bounds inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub struct AttributionRule {
    name: &'static str,
    pub requires_click: bool,
    pub window_lower_bound: u32,
    pub window_upper_bound: u32,
}

impl AttributionRule {
    const fn new(
        name: &'static str,
        requires_click: bool,
        window_lower_bound: u32,
        window_upper_bound: u32,
    ) -> Self {
        Self {
            name,
            requires_click,
            window_lower_bound,
            window_upper_bound,
        }
    }

    /// Looks up a rule in the catalog.
    ///
    /// ## Errors
    /// If `name` is not a known rule.
    pub fn from_name(name: &str) -> Result<Self, Error> {
        CATALOG
            .get(name)
            .copied()
            .ok_or_else(|| Error::InvalidRuleName(name.to_string()))
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// All rules in the catalog, sorted by name.
    #[must_use]
    pub fn all() -> Vec<AttributionRule> {
        let mut rules = CATALOG.values().copied().collect::<Vec<_>>();
        rules.sort_by_key(AttributionRule::name);
        rules
    }
}

impl Display for AttributionRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

impl FromStr for AttributionRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl From<AttributionRule> for &'static str {
    fn from(rule: AttributionRule) -> Self {
        rule.name
    }
}

impl TryFrom<String> for AttributionRule {
    type Error = Error;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::from_name(&name)
    }
}

/// Parses rule names in order, failing on the first unknown one. Rules are public, so nothing is
/// exchanged with the peer.
///
/// ## Errors
/// If any name is not a known rule.
pub fn share_attribution_rules<S: AsRef<str>>(
    role: Role,
    names: &[S],
) -> Result<Vec<AttributionRule>, Error> {
    let rules = names
        .iter()
        .map(|name| AttributionRule::from_name(name.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!("{role:?} uses attribution rules {rules:?}");
    Ok(rules)
}
