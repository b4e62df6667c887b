//! CLI subcommands for regionplan
//!
//! - `estimate` - Plan a strategy and estimate a training round (default workflow)
//! - `plan` - Only run the parallel strategy planner
//! - `deepspeed` - Render DeepSpeed config and launcher for the planned strategy

pub mod deepspeed;
pub mod estimate;
pub mod plan;
pub mod scenario;

pub use deepspeed::{run_deepspeed, DeepSpeedArgs};
pub use estimate::{run_estimate, EstimateArgs};
pub use plan::{run_plan, PlanArgs};
