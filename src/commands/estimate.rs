//! Estimate command implementation
//!
//! Plans a strategy (or takes one from the command line), runs the cost
//! models, and prints a report or JSON.

use anyhow::{Context, Result};
use clap::Args;
use std::fs;

use regionplan::config::ScenarioConfig;
use regionplan::{estimate_with, ComputeCostModel, EstimateReport, ParallelStrategy};

use super::scenario::ScenarioArgs;

/// Estimate command arguments
#[derive(Args, Debug)]
pub struct EstimateArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,

    /// Evaluate a fixed strategy "dp,pp,tp" instead of the planner's choice
    #[arg(long)]
    pub strategy: Option<String>,

    /// Assumed sustained TFLOPS per GPU
    #[arg(long = "tflops-per-gpu", default_value_t = regionplan::estimate::compute::DEFAULT_TFLOPS_PER_GPU)]
    pub tflops_per_gpu: f64,

    /// Output only JSON (no report text)
    #[arg(long)]
    pub json: bool,

    /// Also write the JSON report to this file
    #[arg(short = 'o', long)]
    pub output: Option<String>,
}

/// Parse "dp,pp,tp"
pub fn parse_strategy(s: &str) -> Result<ParallelStrategy> {
    let parts: Vec<u32> = s
        .split(',')
        .map(|p| {
            p.trim()
                .parse::<u32>()
                .with_context(|| format!("Invalid degree '{}' in --strategy", p.trim()))
        })
        .collect::<Result<_>>()?;
    match parts.as_slice() {
        [dp, pp, tp] if *dp > 0 && *pp > 0 && *tp > 0 => Ok(ParallelStrategy::new(*dp, *pp, *tp)),
        _ => anyhow::bail!("--strategy expects three positive degrees dp,pp,tp, got '{}'", s),
    }
}

pub fn run_estimate(args: EstimateArgs) -> Result<()> {
    if !args.tflops_per_gpu.is_finite() || args.tflops_per_gpu <= 0.0 {
        anyhow::bail!("--tflops-per-gpu must be positive, got {}", args.tflops_per_gpu);
    }

    let scenario = args.scenario.load(args.json)?;
    let strategy = args.strategy.as_deref().map(parse_strategy).transpose()?;
    let compute_model = ComputeCostModel::with_tflops(args.tflops_per_gpu);

    let report = estimate_with(&scenario, strategy, &compute_model)?;
    let json = serde_json::to_string_pretty(&report)?;

    if let Some(ref path) = args.output {
        fs::write(path, &json).with_context(|| format!("Failed to write report to {}", path))?;
    }

    if args.json {
        println!("{}", json);
    } else {
        print_report(&scenario, &report);
        if let Some(ref path) = args.output {
            println!("Report saved to: {}", path);
        }
    }

    Ok(())
}

fn print_report(scenario: &ScenarioConfig, report: &EstimateReport) {
    let training = &scenario.training;
    let comm = &report.communication;
    let factors = &comm.factors;
    let round = &report.round;
    let class = &report.classification;

    println!("\n============================================================");
    println!("🌐 CROSS-REGION TRAINING ESTIMATE");
    println!("============================================================\n");

    println!("📋 Configuration:");
    println!(
        "  Model: {}B parameters | Batch Size: {}",
        training.model_size_b, training.batch_size
    );
    println!(
        "  GPUs: {} across {} region(s) {:?}",
        training.total_gpus, training.region_count, training.gpus_per_region
    );
    println!(
        "  Network: {} Gbps, {} ms base latency",
        training.network_bandwidth_gbps, training.network_latency_ms
    );
    println!(
        "  Primitive: {} | Chunk: {} MB | Overlap Coefficient: {:.2}",
        scenario.primitive.primitive_type,
        scenario.primitive.chunk_size_mb,
        scenario.primitive.overlap_coefficient
    );
    println!("");

    println!("🧩 Parallel Strategy:");
    println!(
        "  Data Parallel (DP): {} | Pipeline Parallel (PP): {} | Tensor Parallel (TP): {}",
        report.strategy.dp, report.strategy.pp, report.strategy.tp
    );
    println!("  GPUs used: {} of {}", report.strategy.world_size(), training.total_gpus);
    println!("");

    println!("📡 Communication per Round:");
    println!("  Parameter size: {:.2} GB", comm.parameter_size_gb);
    println!(
        "  DP: {:.2} GB | TP: {:.2} GB | PP: {:.2} GB",
        comm.dp_gb, comm.tp_gb, comm.pp_gb
    );
    println!("  Total (compressed, region-scaled): {:.2} GB", comm.total_gb);
    println!(
        "  Time: {:.2} ms (raw {:.2} ms, latency {:.2} ms, {:.2} GB/s)",
        comm.time_ms, comm.raw_time_ms, comm.base_latency_ms, comm.bandwidth_gb_per_sec
    );
    println!(
        "  Factors: primitive {:.3}, chunking {:.3}, distance {:.3}, cross-region {:.3}",
        factors.primitive_efficiency,
        factors.chunking_efficiency,
        factors.distance_factor,
        factors.region_communication_factor
    );
    println!(
        "  Compression ratio: {:.0}% | Prediction efficiency: {:.0}%",
        factors.compression_ratio * 100.0,
        factors.prediction_efficiency * 100.0
    );
    println!("");

    println!("⏱️  Round Time:");
    println!("  Compute: {:.2} ms", report.compute.time_ms);
    println!(
        "  Estimated round: {:.2} ms (overlap hides {:.2} ms)",
        round.estimated_round_time_ms, round.overlap_potential_ms
    );
    println!(
        "  Gradient accumulation: x{} -> effective round {:.2} ms, {:.2} ms per batch, {} samples/step",
        round.gradient_accumulation_factor,
        round.effective_round_time_ms,
        round.time_per_batch_ms,
        round.actual_batch_size
    );
    println!(
        "  Parallel efficiency: {:.1}% | Communication ratio: {:.1}% | Async overlap: {:.0}%",
        round.parallel_efficiency_pct,
        round.communication_ratio_pct,
        round.async_overlap_factor * 100.0
    );
    println!("");

    println!("🫥 Communication Hiding:");
    match class.compute_to_communication_ratio {
        Some(ratio) => println!("  Compute:communication ratio {:.2}:1 ({})", ratio, class.regime),
        None => println!("  No communication time ({})", class.regime),
    }
    if class.hiding_band_high_pct >= 100 {
        println!("  Expected hiding: over {}%", class.hiding_band_low_pct);
    } else {
        println!(
            "  Expected hiding: {}-{}%",
            class.hiding_band_low_pct, class.hiding_band_high_pct
        );
    }
    for suggestion in &class.suggestions {
        println!("  - {}", suggestion);
    }
    println!("");
}
