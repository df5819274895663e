use super::*;

fn processor() -> FixtureProcessor {
    FixtureProcessor::new(&AppConfig::default())
}

fn event_at(timestamp_ms: u64) -> DetectionEvent {
    DetectionEvent {
        timestamp_ms,
        level_db: -11.0,
        spike_strength: 35.0,
        oscillation_score: 50.0,
        baseline_db: -61.0,
    }
}

#[test]
fn catalog_discovers_checked_in_fixtures() {
    let fixtures = FixtureCatalog::default().discover().unwrap();
    let names: Vec<&str> = fixtures.iter().map(|f| f.name.as_str()).collect();
    assert!(names.contains(&"single_strike"), "found {:?}", names);
    assert!(names.contains(&"room_tone"));

    let strike = fixtures.iter().find(|f| f.name == "single_strike").unwrap();
    assert!(strike.expect_path.is_some());
}

#[test]
fn unknown_fixture_is_an_error() {
    let err = FixtureCatalog::default()
        .load("does_not_exist", None)
        .err()
        .unwrap();
    assert!(err.to_string().contains("does_not_exist"));
}

#[test]
fn single_strike_replays_one_detection() {
    let data = FixtureCatalog::default().load("single_strike", None).unwrap();
    assert_eq!(data.sample_rate, 16_000);

    let report = processor().run(&data);
    assert_eq!(report.tick_count, 40);
    assert_eq!(report.detection_count, 1);
    assert_eq!(report.detections[0].timestamp_ms, 1050);

    let expectations = data.expectations.as_ref().unwrap();
    assert!(expectations.verify(&report.detections).is_ok());
}

#[test]
fn tick_levels_follow_block_rms() {
    let data = FixtureCatalog::default().load("steady_shout", None).unwrap();
    let levels = processor().tick_levels(&data);
    assert_eq!(levels.len(), 40);
    assert!((levels[0] - (-63.03)).abs() < 0.05, "quiet level {}", levels[0]);
    assert!((levels[20] - (-9.03)).abs() < 0.05, "loud level {}", levels[20]);
}

#[test]
fn steady_shout_needs_frequency_gate_disabled() {
    let data = FixtureCatalog::default().load("steady_shout", None).unwrap();
    assert_eq!(processor().run(&data).detection_count, 0);

    let report = processor().with_frequency_gating(false).run(&data);
    assert_eq!(report.detection_count, 1);
    assert_eq!(report.detections[0].timestamp_ms, 1050);
}

#[test]
fn verify_reports_offset_missing_and_extra() {
    let expectations: FixtureExpectations = serde_json::from_str(
        r#"{ "detections": [ { "offset_ms": 400 }, { "offset_ms": 2000, "tolerance_ms": 10 } ] }"#,
    )
    .unwrap();
    assert_eq!(expectations.detections[0].tolerance_ms, 50.0);

    let diff = expectations.verify(&[event_at(1050)]).unwrap_err();
    assert_eq!(diff.failures.len(), 2);
    assert_eq!(diff.failures[0].delta_ms, Some(650.0));
    assert!(diff.failures[1].actual.is_none());

    let none_expected = FixtureExpectations {
        fixture: None,
        notes: None,
        detections: Vec::new(),
    };
    let diff = none_expected.verify(&[event_at(10)]).unwrap_err();
    assert!(diff.failures[0].expected.is_none());
    let json = diff.to_json();
    assert_eq!(json["failures"][0]["actual"]["timestamp_ms"], 10);
}
