mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{run_deepspeed, run_estimate, run_plan, DeepSpeedArgs, EstimateArgs, PlanArgs};

/// regionplan: parallelism planning and communication estimates for cross-region LLM training
#[derive(Parser, Debug)]
#[command(name = "regionplan")]
#[command(about = "Plan DP/PP/TP and estimate cross-region training rounds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plan a strategy and estimate communication, compute, and overlap
    Estimate(EstimateArgs),
    /// Recommend a DP/PP/TP split only
    Plan(PlanArgs),
    /// Render DeepSpeed config and launch script for the planned strategy
    Deepspeed(DeepSpeedArgs),
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging (RUST_LOG=debug shows intermediate factors)
    env_logger::init();

    match cli.command {
        Command::Estimate(args) => run_estimate(args),
        Command::Plan(args) => run_plan(args),
        Command::Deepspeed(args) => run_deepspeed(args),
    }
}
