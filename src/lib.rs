//! regionplan: parallelism planning and communication cost estimation for
//! LLM training spread across geographic regions.
//!
//! The [`mod@estimate`] module holds the engine; [`config`] the scenario types;
//! [`deepspeed`] renders launch artifacts for a planned strategy.

pub mod config;
pub mod deepspeed;
pub mod error;
pub mod estimate;

pub use config::{PrimitiveConfig, PrimitiveType, ScenarioConfig, StrategyToggles, TrainingConfig};
pub use error::{EstimateError, Result};
pub use estimate::{
    estimate, estimate_with, estimate_with_strategy, ComputeCostModel, EstimateReport, HidingRegime,
    ParallelStrategy, RegionDistances,
};
