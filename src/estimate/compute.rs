//! First-order compute time model
//!
//! Capacity-planning approximation: 2 FLOPs per parameter per sample at a
//! fixed per-GPU throughput. Not calibrated against hardware.

use serde::{Deserialize, Serialize};

/// Assumed sustained throughput per GPU (FP16)
pub const DEFAULT_TFLOPS_PER_GPU: f64 = 10.0;

/// Forward plus backward, per parameter per sample
const FLOPS_PER_PARAM: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeEstimate {
    pub total_flops: f64,
    pub time_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComputeCostModel {
    pub tflops_per_gpu: f64,
}

impl Default for ComputeCostModel {
    fn default() -> Self {
        Self {
            tflops_per_gpu: DEFAULT_TFLOPS_PER_GPU,
        }
    }
}

impl ComputeCostModel {
    pub fn with_tflops(tflops_per_gpu: f64) -> Self {
        Self { tflops_per_gpu }
    }

    pub fn estimate(&self, model_size_b: f64, batch_size: u32, total_gpus: u32) -> ComputeEstimate {
        let total_flops = model_size_b * 1e9 * FLOPS_PER_PARAM * batch_size as f64;
        let cluster_flops = self.tflops_per_gpu * 1e12 * total_gpus.max(1) as f64;
        let time_ms = total_flops / cluster_flops * 1000.0;
        ComputeEstimate { total_flops, time_ms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_time() {
        // 7e9 * 2 * 32 = 4.48e11 FLOP over 8 * 10 TFLOPS = 5.6 ms
        let est = ComputeCostModel::default().estimate(7.0, 32, 8);
        assert!((est.total_flops - 4.48e11).abs() < 1.0);
        assert!((est.time_ms - 5.6).abs() < 1e-9);
    }

    #[test]
    fn test_scales_inversely_with_gpus() {
        let model = ComputeCostModel::default();
        let one = model.estimate(1.0, 16, 4).time_ms;
        let two = model.estimate(1.0, 16, 8).time_ms;
        assert!((one / two - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_custom_throughput() {
        let fast = ComputeCostModel::with_tflops(100.0).estimate(7.0, 32, 8);
        assert!((fast.time_ms - 0.56).abs() < 1e-9);
    }
}
