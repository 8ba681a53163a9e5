use crate::protocol::attribution::{AttributionRule, Conversion, Touchpoint};

/// Computes the credit matrix of one row in the clear, indexed `c * touchpoints.len() + t`.
#[must_use]
pub fn attribute_in_the_clear(
    touchpoints: &[Touchpoint],
    conversions: &[Conversion],
    rule: &AttributionRule,
) -> Vec<bool> {
    let mut result = vec![false; touchpoints.len() * conversions.len()];
    for (c, conversion) in conversions.iter().enumerate() {
        let winner = touchpoints
            .iter()
            .enumerate()
            .filter(|(_, tp)| {
                (tp.is_click || !rule.requires_click)
                    && conversion.ts.checked_sub(tp.ts).is_some_and(|diff| {
                        (rule.window_lower_bound..=rule.window_upper_bound).contains(&diff)
                    })
            })
            // max_by_key keeps the last maximum, so scan backwards to prefer the lowest index
            .rev()
            .max_by_key(|(_, tp)| (tp.is_click, tp.ts));
        if let Some((t, _)) = winner {
            result[c * touchpoints.len() + t] = true;
        }
    }
    result
}
