//! Tiered data/pipeline/tensor parallelism planner
//!
//! Picks (dp, pp, tp) from model size, GPU count and region count with a
//! fixed heuristic, then shrinks the split until it fits on the cluster.

use serde::{Deserialize, Serialize};

/// Models up to this size (billions) favour pure data parallelism
const SMALL_MODEL_B: f64 = 7.0;
/// Models up to this size (billions) mix all three axes
const MEDIUM_MODEL_B: f64 = 70.0;

const SMALL_MAX_DP: u32 = 16;
const MEDIUM_MAX_TP: u32 = 8;
const LARGE_MAX_TP: u32 = 16;

/// Parallel degrees along each axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParallelStrategy {
    pub dp: u32,
    pub pp: u32,
    pub tp: u32,
}

impl Default for ParallelStrategy {
    fn default() -> Self {
        Self { dp: 1, pp: 1, tp: 1 }
    }
}

impl ParallelStrategy {
    pub fn new(dp: u32, pp: u32, tp: u32) -> Self {
        Self {
            dp: dp.max(1),
            pp: pp.max(1),
            tp: tp.max(1),
        }
    }

    /// Number of GPUs the split occupies (dp * pp * tp)
    pub fn world_size(&self) -> u64 {
        self.dp as u64 * self.pp as u64 * self.tp as u64
    }

    /// Shrink the split until it fits on `total_gpus`
    ///
    /// Decrements dp first, then pp, then tp. Each step strictly lowers the
    /// product, so the loop ends at 1/1/1 at the latest.
    pub fn fit_to(mut self, total_gpus: u32) -> Self {
        let total = total_gpus.max(1) as u64;
        while self.world_size() > total {
            if self.dp > 1 {
                self.dp -= 1;
            } else if self.pp > 1 {
                self.pp -= 1;
            } else if self.tp > 1 {
                self.tp -= 1;
            } else {
                break;
            }
        }
        self
    }
}

impl std::fmt::Display for ParallelStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DP={}, PP={}, TP={}", self.dp, self.pp, self.tp)
    }
}

/// Recommend a parallel split for the given model and cluster
pub fn plan_strategy(model_size_b: f64, total_gpus: u32, region_count: u32) -> ParallelStrategy {
    let gpus = total_gpus.max(1);
    let regions = region_count.max(1);

    let (dp, pp, tp) = if model_size_b <= SMALL_MODEL_B {
        let dp = gpus.min(SMALL_MAX_DP);
        let tp = (gpus / dp).max(1);
        (dp, 1, tp)
    } else if model_size_b <= MEDIUM_MODEL_B {
        let tp = gpus.min(MEDIUM_MAX_TP);
        let dp = (gpus / tp.saturating_mul(regions)).max(1);
        let pp = (gpus / (tp * dp)).max(1);
        (dp, pp, tp)
    } else {
        let tp = gpus.min(LARGE_MAX_TP);
        let pp = (gpus / tp).max(1);
        let dp = (gpus / (tp * pp)).max(1);
        (dp, pp, tp)
    };

    let strategy = ParallelStrategy { dp, pp, tp }.fit_to(gpus);
    log::info!(
        "Planned {} for {}B params on {} GPUs across {} region(s)",
        strategy,
        model_size_b,
        gpus,
        regions
    );
    strategy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_model_prefers_data_parallel() {
        let s = plan_strategy(7.0, 16, 1);
        assert_eq!(s, ParallelStrategy { dp: 16, pp: 1, tp: 1 });
    }

    #[test]
    fn test_small_model_spills_into_tensor_parallel() {
        let s = plan_strategy(1.0, 64, 1);
        assert_eq!(s, ParallelStrategy { dp: 16, pp: 1, tp: 4 });
    }

    #[test]
    fn test_medium_model_two_regions() {
        let s = plan_strategy(70.0, 64, 2);
        assert_eq!(s, ParallelStrategy { dp: 4, pp: 2, tp: 8 });
        assert_eq!(s.world_size(), 64);
    }

    #[test]
    fn test_large_model_uses_pipeline() {
        let s = plan_strategy(175.0, 128, 4);
        assert_eq!(s, ParallelStrategy { dp: 1, pp: 8, tp: 16 });
    }

    #[test]
    fn test_single_gpu_is_degenerate() {
        for size in [1.0, 13.0, 405.0] {
            assert_eq!(plan_strategy(size, 1, 1), ParallelStrategy::default());
        }
    }

    #[test]
    fn test_medium_model_with_many_regions_fits() {
        // dp collapses to 1 when regions outnumber GPU groups
        let s = plan_strategy(30.0, 12, 4);
        assert_eq!(s, ParallelStrategy { dp: 1, pp: 1, tp: 8 });
    }

    #[test]
    fn test_fit_to_decrements_dp_then_pp_then_tp() {
        let s = ParallelStrategy::new(4, 4, 4).fit_to(16);
        assert_eq!(s, ParallelStrategy { dp: 1, pp: 4, tp: 4 });

        let s = ParallelStrategy::new(1, 4, 4).fit_to(6);
        assert_eq!(s, ParallelStrategy { dp: 1, pp: 1, tp: 4 });

        let s = ParallelStrategy::new(3, 3, 3).fit_to(1);
        assert_eq!(s, ParallelStrategy::default());
    }

    #[test]
    fn test_product_never_exceeds_gpus() {
        for gpus in 1..=96u32 {
            for regions in 1..=4u32 {
                for size in [0.5, 7.0, 8.0, 70.0, 71.0, 400.0] {
                    let s = plan_strategy(size, gpus, regions);
                    assert!(s.dp >= 1 && s.pp >= 1 && s.tp >= 1);
                    assert!(s.world_size() <= gpus as u64, "{} on {} GPUs", s, gpus);
                }
            }
        }
    }
}
