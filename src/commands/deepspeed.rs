//! DeepSpeed command implementation
//!
//! Renders ds_config.json and run_training.sh for the planned strategy,
//! either to stdout or into a deployment directory.

use anyhow::{Context, Result};
use clap::Args;

use regionplan::deepspeed::{DeepSpeedBundle, DeploymentRequest, TrainingScriptRequest};
use regionplan::estimate;

use super::scenario::ScenarioArgs;

/// DeepSpeed command arguments
#[derive(Args, Debug)]
pub struct DeepSpeedArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,

    /// Write the bundle into this directory instead of printing it
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<String>,

    /// Print the deployment and training-script service payloads as JSON
    #[arg(long)]
    pub request: bool,
}

pub fn run_deepspeed(args: DeepSpeedArgs) -> Result<()> {
    // Payload mode prints JSON only, so keep override echoes out of stdout
    let scenario = args.scenario.load(args.request)?;
    let report = estimate(&scenario)?;

    if args.request {
        let payload = serde_json::json!({
            "deploy": DeploymentRequest::from_report(&scenario, &report),
            "generate_training_script": TrainingScriptRequest::from_report(&scenario, &report),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let bundle = DeepSpeedBundle::new(&scenario, &report.strategy);

    match args.output_dir {
        Some(ref dir) => {
            let (config_path, script_path) = bundle
                .write_to(dir)
                .with_context(|| format!("Failed to write DeepSpeed bundle to {}", dir))?;
            println!("Strategy: {}", report.strategy);
            println!("DeepSpeed config: {}", config_path.display());
            println!("Launch script:    {}", script_path.display());
        }
        None => {
            println!("# DeepSpeed config (ds_config.json)");
            println!("{}", bundle.config.to_json_pretty()?);
            println!();
            println!("# Launch script (run_training.sh)");
            print!("{}", bundle.script);
        }
    }

    Ok(())
}
