use attribution_core::{
    AttributionConfig, Error,
    protocol::{
        EagerEngine, EngineKind, LazyEngine, SecureEngine,
        attribution::{
            AttributionInputMetrics, AttributionOutputMetrics, AttributionRule, Conversion,
            InputEncryption, InputShape, Touchpoint, compute_attributions, run,
        },
    },
    telemetry::EngineStats,
    test_fixture::{
        EventGenerator, EventGeneratorConfig, TestWorld, TestWorldConfig, attribute_in_the_clear,
        reveal_xored_result, split_input,
    },
};
use rand::{SeedableRng, rngs::StdRng};

const ALL_RULES: [&str; 6] = [
    "last_click_1d",
    "last_touch_1d",
    "last_click_28d",
    "last_touch_28d",
    "last_click_2_7d",
    "last_touch_2_7d",
];

fn tp(is_click: bool, ts: u32) -> Touchpoint {
    Touchpoint { id: 0, is_click, ts }
}

fn conv(ts: u32) -> Conversion {
    Conversion { ts }
}

async fn attribute(
    config: AttributionConfig,
    inputs: [AttributionInputMetrics; 2],
) -> [Result<AttributionOutputMetrics, Error>; 2] {
    TestWorld::new_with(TestWorldConfig::from(&config))
        .run_with_transport(move |transport, role| {
            let config = config.clone();
            let input = inputs[role].clone();
            async move { run(&config, transport, &input).await }
        })
        .await
}

/// Runs both parties on `touchpoints` and `conversions` and reveals the credit matrices.
async fn attribute_revealed(
    engine: EngineKind,
    encryption: InputEncryption,
    batch_size: usize,
    rules: &[&str],
    touchpoints: &[Vec<Touchpoint>],
    conversions: &[Vec<Conversion>],
) -> AttributionOutputMetrics {
    let mut rng = StdRng::seed_from_u64(7);
    let inputs = split_input(&mut rng, rules, touchpoints, conversions, encryption);
    let config = AttributionConfig {
        batch_size,
        input_encryption: encryption,
        engine,
        ..AttributionConfig::default()
    };
    let [publisher, partner] = attribute(config, inputs).await;
    reveal_xored_result(&publisher.unwrap(), &partner.unwrap())
}

fn in_the_clear(
    rules: &[&str],
    touchpoints: &[Vec<Touchpoint>],
    conversions: &[Vec<Conversion>],
) -> AttributionOutputMetrics {
    AttributionOutputMetrics {
        rule_to_results: rules
            .iter()
            .map(|&name| {
                let rule = AttributionRule::from_name(name).unwrap();
                let rows = touchpoints
                    .iter()
                    .zip(conversions)
                    .map(|(t, c)| attribute_in_the_clear(t, c, &rule))
                    .collect();
                (name.to_string(), rows)
            })
            .collect(),
    }
}

#[tokio::test]
async fn example_matrix() {
    let touchpoints = vec![vec![tp(false, 125), tp(true, 100), tp(true, 200)]];
    let conversions = vec![vec![conv(50), conv(150), conv(87_000)]];
    let expected = vec![vec![
        false, false, false, // 50
        false, true, false, // 150
        false, false, false, // 87000
    ]];

    for engine in [EngineKind::Plaintext, EngineKind::Eager, EngineKind::Lazy] {
        let output = attribute_revealed(
            engine,
            InputEncryption::Plaintext,
            1,
            &["last_click_1d", "last_touch_1d"],
            &touchpoints,
            &conversions,
        )
        .await;
        assert_eq!(expected, output.rule_to_results["last_click_1d"], "{engine:?}");
        assert_eq!(expected, output.rule_to_results["last_touch_1d"], "{engine:?}");
    }
}

#[tokio::test]
async fn impressions_are_never_credited_by_click_rules() {
    let touchpoints = vec![vec![tp(false, 10), tp(false, 20)]];
    let conversions = vec![vec![conv(30), conv(100_000)]];
    let output = attribute_revealed(
        EngineKind::Eager,
        InputEncryption::Xor,
        1,
        &["last_click_1d", "last_click_28d", "last_touch_1d"],
        &touchpoints,
        &conversions,
    )
    .await;
    assert_eq!(vec![vec![false; 4]], output.rule_to_results["last_click_1d"]);
    assert_eq!(vec![vec![false; 4]], output.rule_to_results["last_click_28d"]);
    assert_eq!(
        vec![vec![false, true, false, false]],
        output.rule_to_results["last_touch_1d"]
    );
}

#[tokio::test]
async fn conversions_before_touchpoints_are_not_credited() {
    let output = attribute_revealed(
        EngineKind::Lazy,
        InputEncryption::PartnerXor,
        1,
        &ALL_RULES[..1],
        &[vec![tp(true, 100)]],
        &[vec![conv(50)]],
    )
    .await;
    assert_eq!(vec![vec![false]], output.rule_to_results["last_click_1d"]);
}

#[tokio::test]
async fn at_most_one_touchpoint_per_conversion() {
    let mut generator = EventGenerator::with_config(
        StdRng::seed_from_u64(11),
        EventGeneratorConfig {
            shape: InputShape {
                rows: 6,
                touchpoints: 5,
                conversions: 3,
            },
            max_timestamp: 200_000,
            click_probability: 0.7,
        },
    );
    let (touchpoints, conversions) = generator.generate();
    let output = attribute_revealed(
        EngineKind::Eager,
        InputEncryption::Plaintext,
        4,
        &ALL_RULES,
        &touchpoints,
        &conversions,
    )
    .await;
    for rows in output.rule_to_results.values() {
        for row in rows {
            for credits in row.chunks(5) {
                assert!(credits.iter().filter(|&&c| c).count() <= 1, "{row:?}");
            }
        }
    }
}

#[tokio::test]
async fn batches_match_single_rows() {
    let row_touchpoints = vec![tp(false, 125), tp(true, 100), tp(true, 200)];
    let row_conversions = vec![conv(50), conv(150), conv(87_000)];
    let touchpoints = vec![row_touchpoints; 5];
    let conversions = vec![row_conversions; 5];

    let single = attribute_revealed(
        EngineKind::Lazy,
        InputEncryption::Xor,
        1,
        &ALL_RULES,
        &touchpoints,
        &conversions,
    )
    .await;
    for batch_size in [2, 5, 16] {
        let batched = attribute_revealed(
            EngineKind::Lazy,
            InputEncryption::Xor,
            batch_size,
            &ALL_RULES,
            &touchpoints,
            &conversions,
        )
        .await;
        assert_eq!(single, batched, "batch_size = {batch_size}");
    }
}

#[tokio::test]
async fn backends_and_encodings_agree() {
    let mut generator = EventGenerator::with_config(
        StdRng::seed_from_u64(3),
        EventGeneratorConfig::default(),
    );
    let (touchpoints, conversions) = generator.generate();
    let expected = in_the_clear(&ALL_RULES, &touchpoints, &conversions);

    for engine in [EngineKind::Plaintext, EngineKind::Eager, EngineKind::Lazy] {
        for encryption in [
            InputEncryption::Plaintext,
            InputEncryption::PartnerXor,
            InputEncryption::Xor,
        ] {
            for batch_size in [1, 3] {
                let output = attribute_revealed(
                    engine,
                    encryption,
                    batch_size,
                    &ALL_RULES,
                    &touchpoints,
                    &conversions,
                )
                .await;
                assert_eq!(
                    expected, output,
                    "{engine:?}, {encryption:?}, batch_size = {batch_size}"
                );
            }
        }
    }
}

#[tokio::test]
async fn random_rows_match_reference() {
    for seed in 0..4 {
        let mut generator = EventGenerator::with_config(
            StdRng::seed_from_u64(seed),
            EventGeneratorConfig {
                shape: InputShape {
                    rows: 8,
                    touchpoints: 4,
                    conversions: 2,
                },
                ..EventGeneratorConfig::default()
            },
        );
        let (touchpoints, conversions) = generator.generate();
        let output = attribute_revealed(
            EngineKind::Eager,
            InputEncryption::Xor,
            8,
            &ALL_RULES,
            &touchpoints,
            &conversions,
        )
        .await;
        assert_eq!(
            in_the_clear(&ALL_RULES, &touchpoints, &conversions),
            output,
            "seed = {seed}"
        );
    }
}

async fn eager_stats(seed: u64, shape: InputShape) -> [EngineStats; 2] {
    let mut generator = EventGenerator::with_config(
        StdRng::seed_from_u64(seed),
        EventGeneratorConfig {
            shape,
            ..EventGeneratorConfig::default()
        },
    );
    let (touchpoints, conversions) = generator.generate();
    let mut rng = StdRng::seed_from_u64(seed);
    let inputs = split_input(
        &mut rng,
        &["last_click_1d", "last_touch_2_7d"],
        &touchpoints,
        &conversions,
        InputEncryption::PartnerXor,
    );
    TestWorld::default()
        .run(move |engine: EagerEngine, role| {
            let input = inputs[role].clone();
            async move {
                compute_attributions(&engine, &input, 2).await.unwrap();
                engine.stats()
            }
        })
        .await
}

#[tokio::test]
async fn work_depends_only_on_shape() {
    let shape = InputShape {
        rows: 3,
        touchpoints: 3,
        conversions: 2,
    };
    let [publisher, partner] = eager_stats(1, shape).await;
    assert!(publisher.same_work(&partner), "{publisher}\n{partner}");
    assert!(publisher.and_gates > 0);

    let other = eager_stats(2, shape).await;
    assert_eq!([publisher, partner], other);
}

#[tokio::test]
async fn mismatched_rules_desynchronize() {
    // Only the click rule shares thresholds, so the two parties issue different operations.
    let touchpoints = vec![vec![tp(true, 1)]];
    let conversions = vec![vec![conv(2)]];
    let mut rng = StdRng::seed_from_u64(0);
    let [publisher, mut partner] = split_input(
        &mut rng,
        &["last_click_1d"],
        &touchpoints,
        &conversions,
        InputEncryption::Plaintext,
    );
    partner.rules = vec!["last_touch_1d".to_string()];

    let [publisher, partner] = TestWorld::default()
        .run(move |engine: LazyEngine, role| {
            let input = [publisher.clone(), partner.clone()][role].clone();
            async move { compute_attributions(&engine, &input, 1).await }
        })
        .await;
    let errors = [publisher.unwrap_err(), partner.unwrap_err()];
    assert!(errors.iter().all(Error::is_fatal), "{errors:?}");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, Error::ProtocolDesynchronization { .. })),
        "{errors:?}"
    );
}

#[tokio::test]
async fn configuration_must_match_input() {
    let mut rng = StdRng::seed_from_u64(0);
    let inputs = split_input(
        &mut rng,
        &ALL_RULES[..1],
        &[vec![tp(true, 1)]],
        &[vec![conv(2)]],
        InputEncryption::Xor,
    );
    let config = AttributionConfig {
        engine: EngineKind::Plaintext,
        ..AttributionConfig::default()
    };
    let results = attribute(config, inputs).await;
    for result in results {
        assert!(matches!(result, Err(Error::Unsupported(_))));
    }
}
