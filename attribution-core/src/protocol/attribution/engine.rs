use crate::{
    error::{Error, LengthError},
    protocol::{
        attribution::{
            input::{PrivateConversion, PrivateTouchpoint, TS_BITS},
            rule::AttributionRule,
        },
        basics::{known_value_bits, select_bits},
        boolean::{compare_gt, equals_known, or, subtract},
        engine::SecureEngine,
    },
    secret_sharing::{BitDecomposed, Lanes},
};

/// Number of bits needed to index `count` touchpoints.
fn index_bits(count: usize) -> usize {
    let max = u64::try_from(count.saturating_sub(1)).unwrap_or(u64::MAX);
    usize::try_from(u64::BITS - max.leading_zeros())
        .unwrap_or(64)
        .max(1)
}

fn check_lanes<E: SecureEngine>(engine: &E, bit: &E::Bit, lanes: usize) -> Result<(), Error> {
    let actual = engine.lanes(bit);
    if actual == lanes {
        Ok(())
    } else {
        Err(Error::LaneMismatch {
            expected: lanes,
            actual,
        })
    }
}

/// Validates shapes before anything is sent to the peer.
fn check_shapes<E: SecureEngine>(
    engine: &E,
    touchpoints: &[PrivateTouchpoint<E::Bit>],
    conversions: &[PrivateConversion<E::Bit>],
    thresholds: &[E::Bit],
    lanes: usize,
) -> Result<(), Error> {
    LengthError::check(touchpoints.len(), thresholds.len())?;
    for (tp, threshold) in touchpoints.iter().zip(thresholds) {
        LengthError::check(TS_BITS, tp.ts.len())?;
        check_lanes(engine, &tp.is_click, lanes)?;
        check_lanes(engine, threshold, lanes)?;
        for bit in tp.ts.iter() {
            check_lanes(engine, bit, lanes)?;
        }
    }
    for conversion in conversions {
        LengthError::check(TS_BITS, conversion.ts.len())?;
        for bit in conversion.ts.iter() {
            check_lanes(engine, bit, lanes)?;
        }
    }
    Ok(())
}

/// Decides, for every conversion, which touchpoint (if any) gets the credit under `rule`.
///
/// The result is indexed `c * touchpoints.len() + t` and holds `true` exactly for the credited
/// touchpoint of every conversion. A touchpoint is eligible for a conversion if it passes its
/// threshold and `conversion.ts - touchpoint.ts` is non-negative and inside the rule window.
/// Eligible touchpoints are ranked by `(is_click, ts)`, so a click beats an impression and the
/// more recent touchpoint beats an older one of the same kind. Among touchpoints with the same
/// rank the one with the lowest index wins.
///
/// Every step runs for all conversion and touchpoint pairs at once, and for all `lanes` lanes.
/// The sequence of operations depends only on the number of touchpoints and conversions.
///
/// ## Errors
/// If `thresholds` does not have one entry per touchpoint, a timestamp is not [`TS_BITS`] wide,
/// or some value does not have `lanes` lanes. These are detected before any secure operation.
/// Propagates engine errors.
#[tracing::instrument(level = "debug", skip_all, fields(
    role = ?engine.role(),
    rule = %rule,
    touchpoints = touchpoints.len(),
    conversions = conversions.len(),
    lanes = lanes,
))]
pub async fn compute_attributions_helper<E: SecureEngine>(
    engine: &E,
    touchpoints: &[PrivateTouchpoint<E::Bit>],
    conversions: &[PrivateConversion<E::Bit>],
    rule: &AttributionRule,
    thresholds: &[E::Bit],
    lanes: usize,
) -> Result<Vec<E::Bit>, Error> {
    check_shapes(engine, touchpoints, conversions, thresholds, lanes)?;
    let tp_count = touchpoints.len();
    if tp_count == 0 || conversions.is_empty() {
        return Ok(Vec::new());
    }
    let pairs = || {
        conversions
            .iter()
            .flat_map(|c| touchpoints.iter().zip(thresholds).map(move |t| (c, t)))
    };

    // conv.ts - tp.ts, with carry-out conv.ts >= tp.ts
    let (differences, not_before) = subtract(
        engine,
        &pairs().map(|(c, _)| c.ts.clone()).collect::<Vec<_>>(),
        &pairs().map(|(_, (t, _))| t.ts.clone()).collect::<Vec<_>>(),
        true,
    )
    .await?;

    // lower <= difference and difference <= upper, both as one batch
    let lower = known_value_bits(engine, u64::from(rule.window_lower_bound), TS_BITS, lanes);
    let upper = known_value_bits(engine, u64::from(rule.window_upper_bound), TS_BITS, lanes);
    let pair_count = differences.len();
    let mut x = differences.clone();
    x.extend(std::iter::repeat_n(upper, pair_count));
    let mut y = vec![lower; pair_count];
    y.extend(differences);
    let (_, in_window) = subtract(engine, &x, &y, true).await?;
    let (above_lower, below_upper) = in_window.split_at(pair_count);

    // eligible = not_before & above_lower & below_upper & threshold
    let pair_thresholds = pairs().map(|(_, (_, th))| th.clone()).collect::<Vec<_>>();
    let mut left = not_before;
    left.extend(below_upper.iter().cloned());
    let mut right = above_lower.to_vec();
    right.extend(pair_thresholds);
    let halves = engine.multiply(&left, &right).await?;
    let (timing, filtered) = halves.split_at(pair_count);
    let eligible = engine.multiply(timing, filtered).await?;

    let width = index_bits(tp_count);
    let keys = touchpoints
        .iter()
        .map(|tp| {
            let mut key = tp.ts.clone();
            key.push(tp.is_click.clone());
            key
        })
        .collect::<Vec<_>>();
    let indices = (0..tp_count)
        .map(|t| known_value_bits(engine, t as u64, width, lanes))
        .collect::<Vec<_>>();

    let mut found = vec![engine.constant(Lanes::repeat(false, lanes)); conversions.len()];
    let mut best_key = vec![known_value_bits(engine, 0, TS_BITS + 1, lanes); conversions.len()];
    let mut best_index = vec![known_value_bits(engine, 0, width, lanes); conversions.len()];

    for t in 0..tp_count {
        let candidates = vec![keys[t].clone(); conversions.len()];
        let more_recent = compare_gt(engine, &candidates, &best_key).await?;
        let eligible_t = (0..conversions.len())
            .map(|c| eligible[c * tp_count + t].clone())
            .collect::<Vec<_>>();

        // better = eligible & !(found & !more_recent)
        let not_more_recent = more_recent
            .iter()
            .map(|b| engine.not(b))
            .collect::<Vec<_>>();
        let beaten = engine.multiply(&found, &not_more_recent).await?;
        let not_beaten = beaten.iter().map(|b| engine.not(b)).collect::<Vec<_>>();
        let better = engine.multiply(&eligible_t, &not_beaten).await?;
        found = or(engine, &found, &eligible_t).await?;

        let current = best_key
            .iter()
            .zip(&best_index)
            .map(|(key, index)| key.iter().chain(index.iter()).cloned().collect())
            .collect::<Vec<BitDecomposed<_>>>();
        let candidate = keys[t].iter().chain(indices[t].iter()).cloned().collect();
        let updated = select_bits(
            engine,
            &better,
            &vec![candidate; conversions.len()],
            &current,
        )
        .await?;
        for (c, value) in updated.into_iter().enumerate() {
            let (key, index) = value.split_at(TS_BITS + 1);
            best_key[c] = key;
            best_index[c] = index;
        }
    }

    let winners = equals_known(
        engine,
        &pairs()
            .enumerate()
            .map(|(i, _)| best_index[i / tp_count].clone())
            .collect::<Vec<_>>(),
        &(0..pair_count)
            .map(|i| (i % tp_count) as u64)
            .collect::<Vec<_>>(),
    )
    .await?;

    let credited = engine.multiply(&eligible, &winners).await?;
    tracing::debug!("{:?} computed {} attribution results", engine.role(), credited.len());
    Ok(credited)
}

#[cfg(all(test, unit_test))]
mod tests {
    use super::{compute_attributions_helper, index_bits};
    use crate::{
        error::Error,
        helpers::Role,
        protocol::{
            attribution::{
                input::{
                    Conversion, InputEncryption, Touchpoint, privately_share_conversions,
                    privately_share_touchpoints,
                },
                rule::{AttributionRule, LAST_CLICK_1D, LAST_TOUCH_1D},
                threshold::privately_share_thresholds,
            },
            engine::{PlaintextEngine, SecureEngine},
        },
        secret_sharing::Lanes,
    };

    async fn attribute(
        touchpoints: Vec<Touchpoint>,
        conversions: Vec<Conversion>,
        rule: &str,
    ) -> Vec<bool> {
        let engine = PlaintextEngine::standalone(Role::Publisher);
        let rule = AttributionRule::from_name(rule).unwrap();
        let (t, c) = (touchpoints.len(), conversions.len());
        let private_tp = privately_share_touchpoints(
            &engine,
            &[touchpoints.clone()],
            1,
            t,
            InputEncryption::Plaintext,
        )
        .await
        .unwrap()
        .remove(0);
        let private_conv = privately_share_conversions(
            &engine,
            &[conversions],
            1,
            c,
            InputEncryption::Plaintext,
        )
        .await
        .unwrap()
        .remove(0);
        let columns = touchpoints
            .iter()
            .map(|&tp| std::iter::once(tp).collect())
            .collect::<Vec<_>>();
        let thresholds = privately_share_thresholds(
            &engine,
            &columns,
            &private_tp,
            &rule,
            InputEncryption::Plaintext,
        )
        .await
        .unwrap();
        compute_attributions_helper(&engine, &private_tp, &private_conv, &rule, &thresholds, 1)
            .await
            .unwrap()
            .into_iter()
            .map(|bit| bit[0])
            .collect()
    }

    fn tp(is_click: bool, ts: u32) -> Touchpoint {
        Touchpoint { id: 0, is_click, ts }
    }

    fn conv(ts: u32) -> Conversion {
        Conversion { ts }
    }

    #[tokio::test]
    async fn last_click_and_last_touch() {
        let touchpoints = vec![tp(false, 125), tp(true, 100), tp(true, 200)];
        let conversions = vec![conv(50), conv(150), conv(87_000)];
        let expected = vec![
            false, false, false, // conv 50
            false, true, false, // conv 150
            false, false, false, // conv 87000
        ];
        for rule in [LAST_CLICK_1D, LAST_TOUCH_1D] {
            assert_eq!(
                expected,
                attribute(touchpoints.clone(), conversions.clone(), rule).await,
                "{rule}"
            );
        }
    }

    #[tokio::test]
    async fn most_recent_wins() {
        let result = attribute(
            vec![tp(false, 10), tp(false, 30), tp(false, 20)],
            vec![conv(40), conv(25)],
            LAST_TOUCH_1D,
        )
        .await;
        assert_eq!(vec![false, true, false, false, false, true], result);
    }

    #[tokio::test]
    async fn lowest_index_wins_ties() {
        let result = attribute(
            vec![tp(true, 10), tp(true, 10), tp(true, 10)],
            vec![conv(10)],
            LAST_CLICK_1D,
        )
        .await;
        assert_eq!(vec![true, false, false], result);
    }

    #[tokio::test]
    async fn window_bounds_are_inclusive() {
        let result = attribute(
            vec![tp(true, 0), tp(true, 1)],
            vec![conv(86_400), conv(172_800), conv(86_401)],
            "last_click_2_7d",
        )
        .await;
        assert_eq!(vec![false, false, true, false, false, false], result);
        let result = attribute(vec![tp(true, 0)], vec![conv(86_400)], LAST_CLICK_1D).await;
        assert_eq!(vec![true], result);
    }

    #[tokio::test]
    async fn thresholds_must_match_touchpoints() {
        let engine = PlaintextEngine::standalone(Role::Publisher);
        let rule = AttributionRule::from_name(LAST_CLICK_1D).unwrap();
        let touchpoints = privately_share_touchpoints(
            &engine,
            &[vec![tp(true, 1)]],
            1,
            1,
            InputEncryption::Plaintext,
        )
        .await
        .unwrap()
        .remove(0);
        let result = compute_attributions_helper(&engine, &touchpoints, &[], &rule, &[], 1).await;
        assert!(matches!(result, Err(Error::Length(_))));

        let wide = engine.constant(Lanes::repeat(true, 2));
        let result =
            compute_attributions_helper(&engine, &touchpoints, &[], &rule, &[wide], 1).await;
        assert!(matches!(
            result,
            Err(Error::LaneMismatch {
                expected: 1,
                actual: 2
            })
        ));
        assert_eq!(0, engine.stats().and_gates);
    }

    #[test]
    fn index_width() {
        assert_eq!(1, index_bits(1));
        assert_eq!(1, index_bits(2));
        assert_eq!(2, index_bits(3));
        assert_eq!(2, index_bits(4));
        assert_eq!(3, index_bits(5));
    }
}
