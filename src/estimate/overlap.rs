//! Communication/compute overlap and hiding-regime classification

use serde::{Deserialize, Serialize};

use crate::config::StrategyToggles;

const ASYNC_OVERLAP_FACTOR: f64 = 0.8;
const SYNC_OVERLAP_FACTOR: f64 = 0.6;

const MIN_ACCUMULATION: u32 = 2;
const MAX_ACCUMULATION: u32 = 32;

/// Compute/communication ratio below which communication dominates
const COMMUNICATION_BOUND_RATIO: f64 = 0.5;
/// Compute/communication ratio above which compute dominates
const COMPUTE_BOUND_RATIO: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundEstimate {
    pub compute_time_ms: f64,
    pub communication_time_ms: f64,
    pub overlap_potential_ms: f64,
    #[serde(rename = "estimatedMs")]
    pub estimated_round_time_ms: f64,
    pub effective_compute_time_ms: f64,
    #[serde(rename = "effectiveMs")]
    pub effective_round_time_ms: f64,
    pub time_per_batch_ms: f64,
    /// Samples per optimizer step once accumulation is applied
    pub actual_batch_size: u64,
    pub gradient_accumulation_factor: u32,
    pub async_overlap_factor: f64,
    pub parallel_efficiency_pct: f64,
    pub communication_ratio_pct: f64,
}

/// Which side of the round dominates, and so how much can be hidden
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HidingRegime {
    /// Compute is under half of communication time
    CommunicationBound,
    Balanced,
    /// Compute is over twice the communication time
    ComputeBound,
}

impl HidingRegime {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < COMMUNICATION_BOUND_RATIO {
            HidingRegime::CommunicationBound
        } else if ratio <= COMPUTE_BOUND_RATIO {
            HidingRegime::Balanced
        } else {
            HidingRegime::ComputeBound
        }
    }

    /// Advisory band of communication overhead that can be hidden, in percent
    pub fn hiding_band_pct(&self) -> (u8, u8) {
        match self {
            HidingRegime::CommunicationBound => (30, 50),
            HidingRegime::Balanced => (60, 80),
            HidingRegime::ComputeBound => (90, 100),
        }
    }

    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            HidingRegime::CommunicationBound => &[
                "Accumulate gradients over 8-32 micro-batches (e.g. gradient_accumulation_steps=16) to cut synchronization frequency",
                "Compress traffic: FP16/BF16 gradients halve volume, Top-K sparsification (60-90%) or INT8 quantization for cross-region links",
                "Send next-iteration parameters early with a 2-3 step prediction window",
                "Use non-blocking collectives on dedicated communication threads (about one per two GPUs)",
                "Keep fast intra-region links (NVLink) for local traffic and compress only inter-region hops",
                "Place communication-heavy layers inside a single region",
            ],
            HidingRegime::Balanced => &[
                "Overlap communication with compute using separate CUDA streams and event synchronization",
                "Accumulate gradients over 4-8 micro-batches",
                "Use FP16 gradients with moderate sparsification (40-70%)",
                "Prefetch critical data with a 1-2 step prediction window",
                "Compress inter-region traffic while keeping intra-region links uncompressed",
            ],
            HidingRegime::ComputeBound => &[
                "Fully overlap communication behind compute with stream-level scheduling",
                "Pipeline communication in stages across the compute window",
                "Run collectives asynchronously on independent threads with non-blocking APIs",
                "Enable topology-aware routing in NCCL or Gloo",
            ],
        }
    }
}

impl std::fmt::Display for HidingRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HidingRegime::CommunicationBound => write!(f, "communication-bound"),
            HidingRegime::Balanced => write!(f, "balanced"),
            HidingRegime::ComputeBound => write!(f, "compute-bound"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub regime: HidingRegime,
    /// compute / communication; `None` when communication time is zero
    pub compute_to_communication_ratio: Option<f64>,
    pub hiding_band_low_pct: u8,
    pub hiding_band_high_pct: u8,
    pub suggestions: Vec<String>,
}

/// Classify a round by its compute-to-communication ratio
pub fn classify(compute_time_ms: f64, communication_time_ms: f64) -> Classification {
    let (regime, ratio) = if communication_time_ms > 0.0 {
        let ratio = compute_time_ms / communication_time_ms;
        (HidingRegime::from_ratio(ratio), Some(ratio))
    } else {
        (HidingRegime::ComputeBound, None)
    };
    let (low, high) = regime.hiding_band_pct();

    Classification {
        regime,
        compute_to_communication_ratio: ratio,
        hiding_band_low_pct: low,
        hiding_band_high_pct: high,
        suggestions: regime.suggestions().iter().map(|s| s.to_string()).collect(),
    }
}

/// Accumulation steps: floor(sqrt(size * regions)) clamped to [2, 32]
pub fn gradient_accumulation_factor(toggles: &StrategyToggles, model_size_b: f64, region_count: u32) -> u32 {
    if !toggles.gradient_accumulation {
        return 1;
    }
    let steps = (model_size_b * region_count as f64).sqrt().floor();
    (steps as u32).clamp(MIN_ACCUMULATION, MAX_ACCUMULATION)
}

pub fn async_overlap_factor(toggles: &StrategyToggles) -> f64 {
    if toggles.async_communication {
        ASYNC_OVERLAP_FACTOR
    } else {
        SYNC_OVERLAP_FACTOR
    }
}

fn share_pct(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        (part / total * 100.0).min(100.0)
    } else {
        0.0
    }
}

/// Combine communication and compute time into round-time estimates
pub fn analyze_round(
    toggles: &StrategyToggles,
    overlap_coefficient: f64,
    model_size_b: f64,
    region_count: u32,
    batch_size: u32,
    communication_time_ms: f64,
    compute_time_ms: f64,
) -> RoundEstimate {
    let async_overlap_factor = async_overlap_factor(toggles);
    let overlap_potential_ms =
        communication_time_ms.min(compute_time_ms) * async_overlap_factor * overlap_coefficient;
    let estimated_round_time_ms = communication_time_ms + compute_time_ms - overlap_potential_ms;

    let g = gradient_accumulation_factor(toggles, model_size_b, region_count);
    let effective_compute_time_ms = compute_time_ms * g as f64;
    // Communication happens once per accumulated step
    let effective_round_time_ms = effective_compute_time_ms + communication_time_ms
        - communication_time_ms.min(effective_compute_time_ms) * async_overlap_factor;
    let time_per_batch_ms = effective_round_time_ms / g as f64;

    let busy = communication_time_ms + compute_time_ms;

    RoundEstimate {
        compute_time_ms,
        communication_time_ms,
        overlap_potential_ms,
        estimated_round_time_ms,
        effective_compute_time_ms,
        effective_round_time_ms,
        time_per_batch_ms,
        actual_batch_size: batch_size as u64 * g as u64,
        gradient_accumulation_factor: g,
        async_overlap_factor,
        parallel_efficiency_pct: share_pct(compute_time_ms, busy),
        communication_ratio_pct: share_pct(communication_time_ms, busy),
    }
}
