use std::path::PathBuf;

use regionplan::{
    estimate, HidingRegime, ParallelStrategy, RegionDistances, ScenarioConfig, StrategyToggles,
    TrainingConfig,
};

fn scenario(model_size_b: f64, gpus_per_region: Vec<u32>) -> ScenarioConfig {
    ScenarioConfig::new(TrainingConfig::from_regions(
        model_size_b,
        gpus_per_region,
        256,
        20.0,
        100.0,
    ))
}

fn scenario_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(name)
}

#[test]
fn test_small_model_single_region_plan() {
    let report = estimate(&scenario(7.0, vec![16])).unwrap();
    assert_eq!(report.strategy, ParallelStrategy { dp: 16, pp: 1, tp: 1 });
}

#[test]
fn test_medium_model_two_region_plan() {
    let report = estimate(&scenario(70.0, vec![32, 32])).unwrap();
    assert_eq!(report.strategy, ParallelStrategy { dp: 4, pp: 2, tp: 8 });
}

#[test]
fn test_one_billion_allreduce_from_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("allreduce.yaml");
    std::fs::write(
        &path,
        r#"
training:
  model_size_b: 1
  total_gpus: 8
  region_count: 1
  gpus_per_region: [8]
  batch_size: 8
  network_latency_ms: 1
  network_bandwidth_gbps: 100
toggles:
  data_compression: false
primitive:
  type: allreduce
"#,
    )
    .unwrap();

    let s = ScenarioConfig::from_yaml(&path).unwrap();
    assert!(s.toggles.gradient_accumulation);
    assert_eq!(s.primitive.chunk_size_mb, 256);

    let comm = estimate(&s).unwrap().communication;
    assert!((comm.dp_gb - 6.519).abs() < 1e-3);
    assert_eq!(comm.factors.compression_ratio, 1.0);
    assert_eq!(comm.factors.primitive_efficiency, 1.0);
}

#[test]
fn test_single_region_factors_are_exactly_one() {
    let s = scenario(13.0, vec![16]);
    let factors = estimate(&s).unwrap().communication.factors;
    assert_eq!(factors.distance_factor, 1.0);
    assert_eq!(factors.cross_region_overhead, 0.0);
    assert_eq!(factors.region_communication_factor, 1.0);
}

#[test]
fn test_distance_to_missing_region_is_rejected() {
    let mut s = scenario(13.0, vec![16]);
    s.region_distances_km = RegionDistances::new().with(1, 2, 4000.0).unwrap();
    let err = estimate(&s).unwrap_err();
    assert_eq!(err.field(), Some("region_distances_km"));
}

#[test]
fn test_product_invariant_through_engine() {
    for gpus in [1u32, 3, 8, 17, 64, 100] {
        for size in [1.0, 30.0, 200.0] {
            let report = estimate(&scenario(size, vec![gpus])).unwrap();
            assert!(report.strategy.world_size() <= gpus as u64);
        }
    }
}

#[test]
fn test_repeated_calls_are_identical() {
    let s = ScenarioConfig::from_yaml(scenario_path("four_region_175b.yaml")).unwrap();
    let first = estimate(&s).unwrap();
    let second = estimate(&s).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_distance_never_lowers_cost() {
    let mut previous: Option<(f64, f64)> = None;
    for km in [0.0, 100.0, 1000.0, 2500.0, 8000.0, 20000.0] {
        let mut s = scenario(70.0, vec![16, 16, 16]);
        s.region_distances_km = RegionDistances::new()
            .with(1, 2, 1000.0)
            .unwrap()
            .with(1, 3, 1500.0)
            .unwrap()
            .with(2, 3, km)
            .unwrap();
        let comm = estimate(&s).unwrap().communication;
        let current = (comm.factors.region_communication_factor, comm.time_ms);
        if let Some((factor, time)) = previous {
            assert!(current.0 >= factor);
            assert!(current.1 >= time);
        }
        previous = Some(current);
    }
}

#[test]
fn test_disabled_toggles() {
    let mut s = scenario(70.0, vec![16, 16, 16]);
    s.toggles = StrategyToggles::none();
    let report = estimate(&s).unwrap();
    let comm = &report.communication;
    assert_eq!(comm.factors.compression_ratio, 1.0);
    assert_eq!(comm.factors.prediction_efficiency, 0.0);
    assert_eq!(comm.time_ms, comm.raw_time_ms);
    assert_eq!(report.round.gradient_accumulation_factor, 1);
    assert_eq!(report.round.async_overlap_factor, 0.6);
}

#[test]
fn test_single_gpu_without_latency_is_compute_bound() {
    let mut s = scenario(405.0, vec![1]);
    s.training.network_latency_ms = 0.0;
    let report = estimate(&s).unwrap();
    assert_eq!(report.strategy, ParallelStrategy::default());
    assert_eq!(report.communication.total_gb, 0.0);
    assert_eq!(report.communication.time_ms, 0.0);
    assert_eq!(report.classification.regime, HidingRegime::ComputeBound);
    assert_eq!(report.classification.compute_to_communication_ratio, None);
}

#[test]
fn test_bundled_scenarios_load() {
    for name in ["two_region_70b.yaml", "single_region_7b.yaml", "four_region_175b.yaml"] {
        let s = ScenarioConfig::from_yaml(scenario_path(name)).unwrap();
        assert!(estimate(&s).is_ok(), "{} failed", name);
    }
}

#[test]
fn test_yaml_file_with_symmetric_distance_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scenario.yaml");
    std::fs::write(
        &path,
        r#"
training:
  model_size_b: 13
  total_gpus: 24
  region_count: 3
  gpus_per_region: [8, 8, 8]
  batch_size: 96
  network_latency_ms: 12
  network_bandwidth_gbps: 25
region_distances_km:
  "1-2": 700
  "2-1": 700
  "3-1": 2100
"#,
    )
    .unwrap();

    let s = ScenarioConfig::from_yaml(&path).unwrap();
    assert_eq!(s.region_distances_km.len(), 2);
    assert_eq!(s.region_distances_km.get(1, 3), Some(2100.0));

    let report = estimate(&s).unwrap();
    // average of 700 and 2100 km
    assert!((report.communication.factors.distance_factor - 1.07).abs() < 1e-9);
    assert_eq!(report.communication.factors.compression_ratio, 0.3);
}

#[test]
fn test_report_json_contract() {
    let report = estimate(&scenario(70.0, vec![32, 32])).unwrap();
    let value = serde_json::to_value(&report).unwrap();

    for key in ["dp", "pp", "tp"] {
        assert!(value["strategy"][key].is_u64(), "strategy.{}", key);
    }
    for key in ["dpGB", "tpGB", "ppGB", "totalGB", "timeMs"] {
        assert!(value["communication"][key].is_f64(), "communication.{}", key);
    }
    for key in [
        "primitiveEfficiency",
        "chunkingEfficiency",
        "distanceFactor",
        "regionCommunicationFactor",
        "compressionRatio",
        "predictionEfficiency",
    ] {
        assert!(value["communication"]["factors"][key].is_f64(), "factors.{}", key);
    }
    assert!(value["compute"]["timeMs"].is_f64());
    for key in ["estimatedMs", "effectiveMs", "timePerBatchMs"] {
        assert!(value["round"][key].is_f64(), "round.{}", key);
    }
    assert!(value["classification"]["regime"].is_string());
    assert!(value["classification"]["hidingBandLowPct"].is_u64());
    assert!(value["classification"]["hidingBandHighPct"].is_u64());
}
