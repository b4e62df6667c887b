//! Plan command implementation
//!
//! Runs only the parallel strategy planner; no scenario file needed.

use anyhow::Result;
use clap::Args;

use regionplan::estimate::plan_strategy;

/// Plan command arguments
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Model size (billions of parameters)
    #[arg(short = 'm', long = "model-size")]
    pub model_size_b: f64,

    /// Total number of GPUs
    #[arg(short = 'g', long)]
    pub gpus: u32,

    /// Number of regions
    #[arg(short = 'r', long, default_value = "1")]
    pub regions: u32,

    /// Output only JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run_plan(args: PlanArgs) -> Result<()> {
    if !args.model_size_b.is_finite() || args.model_size_b <= 0.0 {
        anyhow::bail!("--model-size must be positive, got {}", args.model_size_b);
    }
    if args.gpus == 0 {
        anyhow::bail!("--gpus must be at least 1");
    }
    if args.regions == 0 {
        anyhow::bail!("--regions must be at least 1");
    }

    let strategy = plan_strategy(args.model_size_b, args.gpus, args.regions);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&strategy)?);
    } else {
        println!(
            "Recommended strategy for {}B on {} GPUs ({} region(s)): {}",
            args.model_size_b, args.gpus, args.regions, strategy
        );
        if strategy.world_size() < args.gpus as u64 {
            println!(
                "  Note: split occupies {} of {} GPUs",
                strategy.world_size(),
                args.gpus
            );
        }
    }

    Ok(())
}
