//! Per-round communication volume and time
//!
//! Volumes are modelled per parallel axis from the fp32 parameter footprint,
//! then scaled by compression, the cross-region factor and chunking
//! efficiency. Time is volume over bandwidth plus latency, reduced by
//! predictive communication when enabled.

use serde::{Deserialize, Serialize};

use super::region::{RegionDistanceModel, RegionDistances};
use super::strategy::ParallelStrategy;
use crate::config::{PrimitiveConfig, PrimitiveType, StrategyToggles, TrainingConfig};

const BYTES_PER_PARAM: f64 = 4.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Activations are modelled as half the parameter footprint
const ACTIVATION_TO_PARAM_RATIO: f64 = 0.5;

const BROADCAST_EFFICIENCY: f64 = 0.7;

/// Chunk size (MB) at which chunking stops paying off
const OPTIMAL_CHUNK_MB: f64 = 256.0;

/// FP16 mixed-precision compression
const COMPRESSION_RATIO: f64 = 0.5;
/// Compression assumed once more than two regions take part
const MULTI_REGION_COMPRESSION_RATIO: f64 = 0.3;

/// Waiting time removed by predictive communication
const PREDICTION_EFFICIENCY: f64 = 0.2;

/// Intermediate factors behind a communication estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationFactors {
    pub primitive_efficiency: f64,
    pub chunking_efficiency: f64,
    pub distance_factor: f64,
    pub cross_region_overhead: f64,
    pub region_communication_factor: f64,
    pub compression_ratio: f64,
    pub prediction_efficiency: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationEstimate {
    #[serde(rename = "paramGB")]
    pub parameter_size_gb: f64,
    #[serde(rename = "dpGB")]
    pub dp_gb: f64,
    #[serde(rename = "tpGB")]
    pub tp_gb: f64,
    #[serde(rename = "ppGB")]
    pub pp_gb: f64,
    /// Compressed, region-scaled, chunked volume per round
    #[serde(rename = "totalGB")]
    pub total_gb: f64,
    #[serde(rename = "bandwidthGBps")]
    pub bandwidth_gb_per_sec: f64,
    /// Configured latency plus average distance-induced latency
    pub base_latency_ms: f64,
    /// Time before predictive communication is applied
    pub raw_time_ms: f64,
    pub time_ms: f64,
    pub factors: CommunicationFactors,
}

/// Parameter footprint in GB at 4 bytes per parameter
pub fn parameter_size_gb(model_size_b: f64) -> f64 {
    model_size_b * 1e9 * BYTES_PER_PARAM / BYTES_PER_GB
}

/// Relative cost of the collective compared to plain all-reduce
pub fn primitive_efficiency(primitive: PrimitiveType, total_gpus: u32) -> f64 {
    match primitive {
        PrimitiveType::RingAllreduce => {
            let peers = (total_gpus as f64 - 1.0).max(1.0);
            1.0 / (1.0 + 0.1 * peers.ln())
        }
        PrimitiveType::Allreduce => 1.0,
        PrimitiveType::Broadcast => BROADCAST_EFFICIENCY,
    }
}

/// Efficiency of splitting payloads into `chunk_size_mb` pieces, capped at 1
pub fn chunking_efficiency(chunk_size_mb: u32) -> f64 {
    let chunk = chunk_size_mb.max(1) as f64;
    (0.8 + 0.2 * (OPTIMAL_CHUNK_MB / chunk)).min(1.0)
}

pub fn compression_ratio(toggles: &StrategyToggles, region_count: u32) -> f64 {
    if !toggles.data_compression {
        1.0
    } else if region_count > 2 {
        MULTI_REGION_COMPRESSION_RATIO
    } else {
        COMPRESSION_RATIO
    }
}

pub fn prediction_efficiency(toggles: &StrategyToggles) -> f64 {
    if toggles.predictive_communication {
        PREDICTION_EFFICIENCY
    } else {
        0.0
    }
}

/// Raw per-axis volumes (GB/round) before compression and region scaling
pub fn axis_volumes_gb(param_gb: f64, strategy: &ParallelStrategy, efficiency: f64) -> (f64, f64, f64) {
    let dp = strategy.dp as f64;
    let tp = strategy.tp as f64;
    let pp = strategy.pp as f64;

    // Gradient all-reduce moves 2(K-1)/K of the parameters
    let dp_gb = param_gb * 2.0 * (dp - 1.0) / dp * efficiency;
    // 1D tensor parallel all-gather / reduce-scatter
    let tp_gb = param_gb / tp * (tp - 1.0) * efficiency;
    // Stage boundaries carry activations plus gradients
    let activation_gb = param_gb * ACTIVATION_TO_PARAM_RATIO;
    let pp_gb = (activation_gb + param_gb) * (pp - 1.0) / pp * efficiency;

    (dp_gb, tp_gb, pp_gb)
}

pub fn estimate_communication(
    training: &TrainingConfig,
    distances: &RegionDistances,
    strategy: &ParallelStrategy,
    toggles: &StrategyToggles,
    primitive: &PrimitiveConfig,
) -> CommunicationEstimate {
    if primitive.primitive_type == PrimitiveType::Broadcast && strategy.dp > 1 {
        log::warn!(
            "Broadcast only covers one-way traffic; gradient sync across DP={} still needs a reduction",
            strategy.dp
        );
    }

    let region = RegionDistanceModel::new(distances, training.region_count);
    let parameter_size_gb = parameter_size_gb(training.model_size_b);
    let primitive_efficiency = primitive_efficiency(primitive.primitive_type, training.total_gpus);
    let chunking_efficiency = chunking_efficiency(primitive.chunk_size_mb);
    let compression_ratio = compression_ratio(toggles, training.region_count);
    let prediction_efficiency = prediction_efficiency(toggles);

    let (dp_gb, tp_gb, pp_gb) = axis_volumes_gb(parameter_size_gb, strategy, primitive_efficiency);

    let total_gb = (dp_gb + tp_gb + pp_gb)
        * compression_ratio
        * region.region_communication_factor
        * chunking_efficiency;

    let bandwidth_gb_per_sec = training.network_bandwidth_gbps / 8.0;
    let base_latency_ms = training.network_latency_ms + region.distance_latency_ms;
    let raw_time_ms = (total_gb / bandwidth_gb_per_sec) * 1000.0 + base_latency_ms;
    let time_ms = raw_time_ms * (1.0 - prediction_efficiency);

    log::debug!(
        "comm volumes dp={:.3}GB tp={:.3}GB pp={:.3}GB total={:.3}GB (e={:.3}, c={}, r={:.3}, k={:.3})",
        dp_gb,
        tp_gb,
        pp_gb,
        total_gb,
        primitive_efficiency,
        compression_ratio,
        region.region_communication_factor,
        chunking_efficiency
    );

    CommunicationEstimate {
        parameter_size_gb,
        dp_gb,
        tp_gb,
        pp_gb,
        total_gb,
        bandwidth_gb_per_sec,
        base_latency_ms,
        raw_time_ms,
        time_ms,
        factors: CommunicationFactors {
            primitive_efficiency,
            chunking_efficiency,
            distance_factor: region.distance_factor,
            cross_region_overhead: region.cross_region_overhead,
            region_communication_factor: region.region_communication_factor,
            compression_ratio,
            prediction_efficiency,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_parameter_size() {
        assert!(close(parameter_size_gb(1.0), 3.7253, 1e-4));
    }

    #[test]
    fn test_primitive_efficiency() {
        assert_eq!(primitive_efficiency(PrimitiveType::Allreduce, 64), 1.0);
        assert_eq!(primitive_efficiency(PrimitiveType::Broadcast, 64), 0.7);
        assert_eq!(primitive_efficiency(PrimitiveType::RingAllreduce, 1), 1.0);
        assert_eq!(primitive_efficiency(PrimitiveType::RingAllreduce, 2), 1.0);
        let e = primitive_efficiency(PrimitiveType::RingAllreduce, 65);
        assert!(close(e, 1.0 / (1.0 + 0.1 * 64f64.ln()), 1e-12));
    }

    #[test]
    fn test_chunking_efficiency_peaks_at_optimum() {
        assert_eq!(chunking_efficiency(256), 1.0);
        assert!(close(chunking_efficiency(1024), 0.85, 1e-12));
        assert_eq!(chunking_efficiency(64), 1.0);
        assert_eq!(chunking_efficiency(0), 1.0);
    }

    #[test]
    fn test_compression_ratio() {
        let on = StrategyToggles::default();
        let off = StrategyToggles { data_compression: false, ..on };
        assert_eq!(compression_ratio(&off, 5), 1.0);
        assert_eq!(compression_ratio(&on, 2), 0.5);
        assert_eq!(compression_ratio(&on, 3), 0.3);
    }

    #[test]
    fn test_single_axis_has_no_volume_elsewhere() {
        let strategy = ParallelStrategy::new(8, 1, 1);
        let (dp, tp, pp) = axis_volumes_gb(parameter_size_gb(1.0), &strategy, 1.0);
        assert!(close(dp, 3.7253 * 2.0 * 7.0 / 8.0, 1e-3));
        assert_eq!(tp, 0.0);
        assert_eq!(pp, 0.0);
    }

    #[test]
    fn test_pipeline_volume_includes_activations() {
        let strategy = ParallelStrategy::new(1, 4, 1);
        let param = parameter_size_gb(10.0);
        let (_, _, pp) = axis_volumes_gb(param, &strategy, 1.0);
        assert!(close(pp, 1.5 * param * 0.75, 1e-9));
    }

    #[test]
    fn test_prediction_disabled_keeps_raw_time() {
        let training = TrainingConfig::from_regions(13.0, vec![8, 8], 64, 15.0, 100.0);
        let distances = RegionDistances::new().with(1, 2, 2000.0).unwrap();
        let toggles = StrategyToggles {
            predictive_communication: false,
            ..StrategyToggles::default()
        };
        let est = estimate_communication(
            &training,
            &distances,
            &ParallelStrategy::new(2, 1, 8),
            &toggles,
            &PrimitiveConfig::default(),
        );
        assert_eq!(est.factors.prediction_efficiency, 0.0);
        assert_eq!(est.time_ms, est.raw_time_ms);
        // 15 ms configured + 10 ms for 2000 km
        assert!(close(est.base_latency_ms, 25.0, 1e-9));
    }

    #[test]
    fn test_prediction_trims_twenty_percent() {
        let training = TrainingConfig::from_regions(13.0, vec![16], 64, 5.0, 100.0);
        let est = estimate_communication(
            &training,
            &RegionDistances::new(),
            &ParallelStrategy::new(2, 1, 8),
            &StrategyToggles::default(),
            &PrimitiveConfig::default(),
        );
        assert!(close(est.time_ms, est.raw_time_ms * 0.8, 1e-9));
    }
}
