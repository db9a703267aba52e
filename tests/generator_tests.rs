use chrono::NaiveDateTime;
use pressure_graph::generator::{
    DataPoint, RAMP_DURATION_MS, gap_intervals, generate, generate_with_rng, push_drift_hold,
    push_ramp, push_stable_hold,
};
use pressure_graph::settings::{PressureStage, TestSettings, offset_millis, resolve_date_time};
use pressure_graph::{GraphData, GraphError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// Helper to build an instant on the test day
fn at(time: &str) -> NaiveDateTime {
    resolve_date_time("2025-10-31", time).expect("valid test time")
}

fn hours_since(graph: &GraphData, point: &DataPoint) -> f64 {
    (point.time - graph.start_date_time).num_milliseconds() as f64 / 3_600_000.0
}

// Checks the invariants every generated series must satisfy
fn assert_profile_invariants(graph: &GraphData) {
    assert!(!graph.points.is_empty());
    let first = graph.points.first().unwrap();
    let last = graph.points.last().unwrap();
    assert_eq!(first.pressure, 0.0);
    assert_eq!(first.time, graph.start_date_time);
    assert_eq!(last.pressure, 0.0);
    assert_eq!(last.time, graph.end_date_time);
    assert!(
        graph
            .points
            .iter()
            .all(|p| p.time >= graph.start_date_time && p.time <= graph.end_date_time),
        "points must stay inside the test window"
    );
    for pair in graph.points.windows(2) {
        assert!(
            pair[0].time < pair[1].time,
            "times must be strictly increasing: {} then {}",
            pair[0].time,
            pair[1].time
        );
    }
    assert!(graph.points.iter().all(|p| p.pressure >= 0.0));
}

fn scenario_a() -> TestSettings {
    TestSettings::new(at("10:00:00"), at("14:00:00"), 50.0, 60.0)
}

#[test]
fn test_plain_profile_scenario() {
    let graph = generate(&scenario_a()).unwrap();

    assert!(graph.points.len() >= 30, "got {} points", graph.points.len());
    assert_profile_invariants(&graph);
    assert!(
        graph
            .points
            .iter()
            .any(|p| p.pressure >= 45.0 && p.pressure <= 55.0)
    );
    assert_eq!(graph.start_date_time, at("10:00:00"));
    assert_eq!(graph.end_date_time, at("14:00:00"));
    println!("✓ Plain profile has {} points", graph.points.len());
}

#[test]
fn test_working_pressure_is_reached() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let graph = generate_with_rng(&scenario_a(), &mut rng).unwrap();

    assert!(
        graph
            .points
            .iter()
            .any(|p| (p.pressure - 50.0).abs() < 5.0)
    );
    // The rise ends exactly at working pressure, 30 seconds after the start.
    let rise_end = offset_millis(at("10:00:00"), RAMP_DURATION_MS as f64);
    let point = graph.points.iter().find(|p| p.time == rise_end).unwrap();
    assert_eq!(point.pressure, 50.0);
}

#[test]
fn test_stage_pressure_appears_during_stage() {
    let settings = TestSettings::new(at("08:00:00"), at("14:00:00"), 50.0, 60.0)
        .with_stage(PressureStage::new("s1", 2.0, 30.0).with_pressure(60.0));
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let graph = generate_with_rng(&settings, &mut rng).unwrap();

    assert_profile_invariants(&graph);
    let in_stage: Vec<&DataPoint> = graph
        .points
        .iter()
        .filter(|p| {
            let h = hours_since(&graph, p);
            (2.0..=2.5).contains(&h)
        })
        .collect();
    assert!(!in_stage.is_empty());
    assert!(in_stage.iter().all(|p| (p.pressure - 60.0).abs() <= 0.25));

    // Nothing near 60 outside the stage window (working pressure is 50).
    assert!(
        graph
            .points
            .iter()
            .filter(|p| (p.pressure - 60.0).abs() < 1.0)
            .all(|p| {
                let h = hours_since(&graph, p);
                h > 2.0 - 0.01 && h < 2.5 + 0.01
            })
    );
}

#[test]
fn test_stages_are_processed_in_time_order() {
    let settings = TestSettings::new(at("08:00:00"), at("16:00:00"), 50.0, 60.0)
        .with_stage(PressureStage::new("late", 5.0, 30.0).with_pressure(70.0))
        .with_stage(PressureStage::new("early", 2.0, 30.0).with_pressure(60.0));
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let graph = generate_with_rng(&settings, &mut rng).unwrap();

    assert_profile_invariants(&graph);
    let first_60 = graph
        .points
        .iter()
        .position(|p| (p.pressure - 60.0).abs() <= 0.25)
        .unwrap();
    let first_70 = graph
        .points
        .iter()
        .position(|p| (p.pressure - 70.0).abs() <= 0.25)
        .unwrap();
    assert!(first_60 < first_70);
    assert!((hours_since(&graph, &graph.points[first_60]) - 2.0).abs() < 0.01);
    assert!((hours_since(&graph, &graph.points[first_70]) - 5.0).abs() < 0.01);
}

#[test]
fn test_stage_permutation_gives_same_profile() {
    let a = PressureStage::new("a", 1.5, 20.0).with_pressure(55.0);
    let b = PressureStage::new("b", 3.0, 40.0)
        .with_pressure(65.0)
        .with_target_pressure(10.0);
    let c = PressureStage::new("c", 5.0, 15.0).with_hold_drift(3.0);

    let base = TestSettings::new(at("08:00:00"), at("15:00:00"), 50.0, 30.0);
    let ordered = base
        .clone()
        .with_stage(a.clone())
        .with_stage(b.clone())
        .with_stage(c.clone());
    let shuffled = base.with_stage(c).with_stage(a).with_stage(b);

    let g1 = generate_with_rng(&ordered, &mut ChaCha8Rng::seed_from_u64(99)).unwrap();
    let g2 = generate_with_rng(&shuffled, &mut ChaCha8Rng::seed_from_u64(99)).unwrap();
    assert_eq!(g1, g2);
}

#[test]
fn test_seeded_generation_is_reproducible() {
    let settings = scenario_a();
    let g1 = generate_with_rng(&settings, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
    let g2 = generate_with_rng(&settings, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
    assert_eq!(g1, g2);
}

#[test]
fn test_invalid_time_range_is_an_error() {
    let equal = TestSettings::new(at("10:00:00"), at("10:00:00"), 50.0, 60.0);
    let reversed = TestSettings::new(at("12:00:00"), at("10:00:00"), 50.0, 60.0);

    for settings in [&equal, &reversed] {
        for _ in 0..3 {
            match generate(settings) {
                Err(GraphError::InvalidTimeRange { start, end }) => {
                    assert_eq!(start, settings.start_date_time);
                    assert_eq!(end, settings.end_date_time);
                }
                other => panic!("expected InvalidTimeRange, got {:?}", other),
            }
        }
    }
    println!("✓ Empty and reversed ranges are rejected");
}

#[test]
fn test_hold_drift_declines_before_stage() {
    // First stage settles at 20, the second drifts the gap down by 5.
    let settings = TestSettings::new(at("08:00:00"), at("16:00:00"), 50.0, 30.0)
        .with_stage(
            PressureStage::new("settle", 1.0, 30.0)
                .with_pressure(60.0)
                .with_target_pressure(20.0),
        )
        .with_stage(
            PressureStage::new("drift", 5.0, 30.0)
                .with_pressure(60.0)
                .with_hold_drift(-5.0),
        );
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let graph = generate_with_rng(&settings, &mut rng).unwrap();
    assert_profile_invariants(&graph);

    // Gap runs from the end of the first drop to the start of the next rise.
    let gap: Vec<&DataPoint> = graph
        .points
        .iter()
        .filter(|p| p.time >= at("09:30:30") && p.time <= at("12:59:30"))
        .collect();
    assert_eq!(gap.len(), 11);

    let first = gap.first().unwrap().pressure;
    let last = gap.last().unwrap().pressure;
    assert_eq!(first, 20.0);
    assert!((last - 15.0).abs() <= 0.25, "end of gap {}", last);
    for pair in gap.windows(2) {
        // Each step declines by 0.5 nominal; noise is at most ±0.25 per sample.
        assert!(pair[1].pressure < pair[0].pressure + 0.01);
    }
    println!("✓ Pre-stage hold declines from {:.2} to {:.2}", first, last);
}

#[test]
fn test_flat_hold_without_drift() {
    let settings = TestSettings::new(at("08:00:00"), at("16:00:00"), 50.0, 30.0)
        .with_stage(
            PressureStage::new("settle", 1.0, 30.0)
                .with_pressure(60.0)
                .with_target_pressure(20.0),
        )
        .with_stage(PressureStage::new("flat", 5.0, 30.0).with_pressure(60.0));
    let graph = generate_with_rng(&settings, &mut ChaCha8Rng::seed_from_u64(8)).unwrap();

    assert!(
        graph
            .points
            .iter()
            .filter(|p| p.time >= at("09:30:30") && p.time <= at("12:59:30"))
            .all(|p| (p.pressure - 20.0).abs() <= 0.25)
    );
}

#[test]
fn test_residual_pressure_is_released_at_end() {
    let settings = TestSettings::new(at("08:00:00"), at("12:00:00"), 50.0, 30.0).with_stage(
        PressureStage::new("s1", 2.0, 30.0)
            .with_pressure(60.0)
            .with_target_pressure(25.0),
    );
    let graph = generate_with_rng(&settings, &mut ChaCha8Rng::seed_from_u64(13)).unwrap();
    assert_profile_invariants(&graph);

    let drop_start = offset_millis(at("12:00:00"), -(RAMP_DURATION_MS as f64));
    let held = graph.points.iter().find(|p| p.time == drop_start).unwrap();
    assert!((held.pressure - 25.0).abs() <= 0.25);

    // Final ramp noise is at most ±0.25 around the linear path.
    for p in graph.points.iter().filter(|p| p.time > drop_start) {
        let fraction = (p.time - drop_start).num_milliseconds() as f64 / RAMP_DURATION_MS as f64;
        let nominal = 25.0 * (1.0 - fraction);
        assert!((p.pressure - nominal).abs() <= 0.25 + 1e-9);
    }
}

#[test]
fn test_drift_bounds_shape_stage_hold() {
    let mut stage = PressureStage::new("bounded", 2.0, 60.0).with_pressure(60.0);
    stage.min_pressure = Some(56.0);
    let settings = TestSettings::new(at("08:00:00"), at("12:00:00"), 50.0, 30.0).with_stage(stage);
    let graph = generate_with_rng(&settings, &mut ChaCha8Rng::seed_from_u64(21)).unwrap();

    // Stage hold drifts from 60 at 10:00 to the 56 bound at 11:00.
    let start_point = graph.points.iter().find(|p| p.time == at("10:00:00")).unwrap();
    assert_eq!(start_point.pressure, 60.0);
    let mid_point = graph.points.iter().find(|p| p.time == at("10:32:00")).unwrap();
    assert!((mid_point.pressure - 57.866).abs() <= 0.26);
    let end_point = graph.points.iter().find(|p| p.time == at("11:00:00")).unwrap();
    assert!((end_point.pressure - 56.0).abs() <= 0.25);
}

#[test]
fn test_ramp_endpoints_are_exact_and_interior_is_noisy() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let mut points = Vec::new();
    push_ramp(&mut points, &mut rng, at("10:00:00"), 0.0, 50.0, 1.0);

    assert_eq!(points.len(), 6);
    assert_eq!(points[0].pressure, 0.0);
    assert_eq!(points[5].pressure, 50.0);
    assert_eq!(points[0].time, at("10:00:00"));
    assert_eq!(points[5].time, at("10:00:30"));
    for (i, p) in points.iter().enumerate() {
        let nominal = 10.0 * i as f64;
        assert!((p.pressure - nominal).abs() <= 1.0);
    }
}

#[test]
fn test_ramp_never_goes_negative() {
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    for _ in 0..50 {
        let mut points = Vec::new();
        push_ramp(&mut points, &mut rng, at("10:00:00"), 0.5, 0.0, 1.0);
        assert!(points.iter().all(|p| p.pressure >= 0.0));
    }
}

#[test]
fn test_hold_generators_sample_count_and_spacing() {
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let mut stable = Vec::new();
    push_stable_hold(&mut stable, &mut rng, at("10:00:00"), at("11:00:00"), 30.0, 20);
    assert_eq!(stable.len(), 21);
    assert_eq!(stable[0].time, at("10:00:00"));
    assert_eq!(stable[1].time, at("10:03:00"));
    assert_eq!(stable[20].time, at("11:00:00"));
    assert!(stable.iter().all(|p| (p.pressure - 30.0).abs() <= 0.25));

    let mut zero = Vec::new();
    push_stable_hold(&mut zero, &mut rng, at("10:00:00"), at("11:00:00"), 0.0, 10);
    assert!(zero.iter().all(|p| p.pressure == 0.0));

    let mut drift = Vec::new();
    push_drift_hold(&mut drift, &mut rng, at("10:00:00"), at("11:00:00"), 40.0, 30.0, 10);
    assert_eq!(drift.len(), 11);
    for (i, p) in drift.iter().enumerate() {
        let nominal = 40.0 - i as f64;
        assert!((p.pressure - nominal).abs() <= 0.25);
    }
}

#[test]
fn test_gap_intervals_scale_with_duration() {
    assert_eq!(gap_intervals(90_000), 10);
    assert_eq!(gap_intervals(3 * 3_600_000), 10);
    assert_eq!(gap_intervals(5 * 3_600_000 + 1), 10);
    assert_eq!(gap_intervals(6 * 3_600_000), 12);
    assert_eq!(gap_intervals(24 * 3_600_000), 48);
}

#[test]
fn test_invariants_hold_for_many_seeds() {
    let settings = TestSettings::new(at("06:00:00"), at("20:00:00"), 40.0, 45.0)
        .with_stage(
            PressureStage::new("a", 2.0, 60.0)
                .with_pressure(0.6)
                .with_target_pressure(0.2),
        )
        .with_stage(PressureStage::new("b", 6.0, 30.0).with_hold_drift(-1.0))
        .with_stage(PressureStage::new("c", 6.0, 10.0).with_pressure(45.0));

    for seed in 0..25 {
        let graph = generate_with_rng(&settings, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
        assert_profile_invariants(&graph);
    }
}

// Settings whose phases touch or cross the end of the test window
fn boundary_settings() -> Vec<(&'static str, TestSettings)> {
    let window = || TestSettings::new(at("10:00:00"), at("14:00:00"), 50.0, 60.0);
    vec![
        (
            "stage hold ends at the test end",
            window().with_stage(
                PressureStage::new("last", 3.5, 30.0)
                    .with_pressure(60.0)
                    .with_target_pressure(20.0),
            ),
        ),
        (
            "residual pressure with under a minute left",
            window().with_stage(
                PressureStage::new("late", 3.5, 29.5)
                    .with_pressure(60.0)
                    .with_target_pressure(20.0),
            ),
        ),
        (
            "stage runs past the test end",
            window().with_stage(PressureStage::new("over", 3.9, 45.0).with_pressure(70.0)),
        ),
        (
            "initial hold longer than the window",
            TestSettings::new(at("10:00:00"), at("14:00:00"), 50.0, 600.0),
        ),
    ]
}

#[test]
fn test_phases_are_cut_at_the_test_end() {
    for (name, settings) in boundary_settings() {
        for seed in 0..10 {
            let graph =
                generate_with_rng(&settings, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
            assert_profile_invariants(&graph);
        }
        println!("✓ {} stays inside the window", name);
    }
}

#[test]
fn test_stage_ending_at_test_end_still_finishes_at_zero() {
    let (_, settings) = boundary_settings().remove(0);
    let graph = generate_with_rng(&settings, &mut ChaCha8Rng::seed_from_u64(17)).unwrap();

    let last = graph.points.last().unwrap();
    assert_eq!(last.time, at("14:00:00"));
    assert_eq!(last.pressure, 0.0);
    // The stage hold itself is still drawn up to just before the end.
    assert!(
        graph
            .points
            .iter()
            .any(|p| p.time >= at("13:30:00") && (p.pressure - 60.0).abs() <= 0.25)
    );
}

#[test]
fn test_unrepresentable_durations_are_errors() {
    let huge_hold = TestSettings::new(at("10:00:00"), at("14:00:00"), 50.0, 1e15);
    assert!(matches!(
        generate(&huge_hold),
        Err(GraphError::OutOfRange(_))
    ));

    let huge_stage = scenario_a().with_stage(PressureStage::new("forever", 2.0, 1e15));
    assert!(matches!(
        generate(&huge_stage),
        Err(GraphError::OutOfRange(_))
    ));

    let far_stage = scenario_a().with_stage(PressureStage::new("far", 1e13, 30.0));
    assert!(matches!(
        generate(&far_stage),
        Err(GraphError::OutOfRange(_))
    ));
}
