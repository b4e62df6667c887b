//! Cross-region training estimation engine
//!
//! Turns a [`ScenarioConfig`] into an [`EstimateReport`]: a recommended
//! parallel split plus first-order communication, compute and overlap
//! estimates.
//!
//! # Architecture
//!
//! Leaf-first, each stage feeding the next:
//!
//! - `region` - average inter-region distance into volume and latency penalties
//! - `strategy` - tiered dp/pp/tp planner
//! - `communication` - per-axis volume and wall-clock communication time
//! - `compute` - FLOP-based compute time
//! - `overlap` - round time, gradient accumulation and hiding regime
//!
//! The engine holds no state: calling [`estimate`] twice with the same
//! scenario yields identical reports, and it is safe to call from any thread.
//!
//! # Usage
//!
//! ```ignore
//! let scenario = ScenarioConfig::from_yaml("scenarios/two_region_70b.yaml")?;
//! let report = estimate(&scenario)?;
//! println!("{} -> {:.1} ms/round", report.strategy, report.round.estimated_round_time_ms);
//! ```

pub mod communication;
pub mod compute;
pub mod overlap;
pub mod region;
pub mod strategy;

use serde::{Deserialize, Serialize};

use crate::config::ScenarioConfig;
use crate::error::Result;

// Re-exports for convenience
pub use communication::{estimate_communication, CommunicationEstimate, CommunicationFactors};
pub use compute::{ComputeCostModel, ComputeEstimate};
pub use overlap::{analyze_round, classify, Classification, HidingRegime, RoundEstimate};
pub use region::{RegionDistanceModel, RegionDistances};
pub use strategy::{plan_strategy, ParallelStrategy};

/// Full result of one estimation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateReport {
    pub strategy: ParallelStrategy,
    pub communication: CommunicationEstimate,
    pub compute: ComputeEstimate,
    pub round: RoundEstimate,
    pub classification: Classification,
}

/// Plan a strategy for the scenario and estimate it
pub fn estimate(scenario: &ScenarioConfig) -> Result<EstimateReport> {
    estimate_with(scenario, None, &ComputeCostModel::default())
}

/// Estimate a caller-supplied strategy, shrunk to fit the cluster if needed
pub fn estimate_with_strategy(
    scenario: &ScenarioConfig,
    strategy: ParallelStrategy,
) -> Result<EstimateReport> {
    estimate_with(scenario, Some(strategy), &ComputeCostModel::default())
}

/// Estimate with an optional fixed strategy and a custom compute model
///
/// Without a strategy the planner picks one. A supplied strategy that does
/// not fit on the cluster is shrunk with [`ParallelStrategy::fit_to`].
pub fn estimate_with(
    scenario: &ScenarioConfig,
    strategy: Option<ParallelStrategy>,
    compute_model: &ComputeCostModel,
) -> Result<EstimateReport> {
    scenario.validate()?;
    let training = &scenario.training;

    let strategy = match strategy {
        Some(requested) => {
            let fitted = requested.fit_to(training.total_gpus);
            if fitted != requested {
                log::warn!(
                    "Requested {} exceeds {} GPUs, using {}",
                    requested,
                    training.total_gpus,
                    fitted
                );
            }
            fitted
        }
        None => plan_strategy(training.model_size_b, training.total_gpus, training.region_count),
    };

    Ok(run(scenario, strategy, compute_model))
}

fn run(
    scenario: &ScenarioConfig,
    strategy: ParallelStrategy,
    compute_model: &ComputeCostModel,
) -> EstimateReport {
    let training = &scenario.training;

    let communication = estimate_communication(
        training,
        &scenario.region_distances_km,
        &strategy,
        &scenario.toggles,
        &scenario.primitive,
    );
    let compute = compute_model.estimate(training.model_size_b, training.batch_size, training.total_gpus);
    let round = analyze_round(
        &scenario.toggles,
        scenario.primitive.overlap_coefficient,
        training.model_size_b,
        training.region_count,
        training.batch_size,
        communication.time_ms,
        compute.time_ms,
    );
    let classification = classify(compute.time_ms, communication.time_ms);

    log::debug!(
        "round: comm={:.2}ms compute={:.2}ms estimated={:.2}ms regime={}",
        communication.time_ms,
        compute.time_ms,
        round.estimated_round_time_ms,
        classification.regime
    );

    EstimateReport {
        strategy,
        communication,
        compute,
        round,
        classification,
    }
}
