//! Scenario loading with command-line overrides, shared by subcommands

use anyhow::{Context, Result};
use clap::Args;

use regionplan::config::{PrimitiveType, ScenarioConfig};

/// Scenario file and per-field overrides
#[derive(Args, Debug, Clone)]
pub struct ScenarioArgs {
    /// Path to the scenario YAML file
    #[arg(short = 'f', long = "config", default_value = "scenarios/two_region_70b.yaml")]
    pub config_file: String,

    /// Override model size (billions of parameters)
    #[arg(long = "model-size")]
    pub model_size_b: Option<f64>,

    /// Override GPUs per region, comma-separated (e.g. "32,32"); also sets region and GPU counts
    #[arg(long = "gpus-per-region")]
    pub gpus_per_region: Option<String>,

    /// Override global batch size
    #[arg(long = "batch-size")]
    pub batch_size: Option<u32>,

    /// Override base network latency in ms
    #[arg(long = "latency-ms")]
    pub latency_ms: Option<f64>,

    /// Override network bandwidth in Gbps
    #[arg(long = "bandwidth-gbps")]
    pub bandwidth_gbps: Option<f64>,

    /// Set a region distance, repeatable (e.g. --distance 1-2=1200)
    #[arg(long = "distance")]
    pub distances: Vec<String>,

    /// Communication primitive: ring_allreduce, allreduce, or broadcast
    #[arg(long = "primitive")]
    pub primitive: Option<String>,

    /// Override communication chunk size in MB
    #[arg(long = "chunk-size-mb")]
    pub chunk_size_mb: Option<u32>,

    /// Override overlap coefficient in [0, 1]
    #[arg(long = "overlap-coefficient")]
    pub overlap_coefficient: Option<f64>,

    /// Disable gradient accumulation
    #[arg(long = "no-grad-accum")]
    pub no_gradient_accumulation: bool,

    /// Disable data compression
    #[arg(long = "no-compression")]
    pub no_compression: bool,

    /// Disable predictive communication
    #[arg(long = "no-prediction")]
    pub no_prediction: bool,

    /// Disable asynchronous communication
    #[arg(long = "no-async")]
    pub no_async: bool,
}

/// Parse GPU counts from comma-separated string (e.g., "8,8,16")
fn parse_gpus_per_region(s: &str) -> Result<Vec<u32>> {
    s.split(',')
        .map(|n| {
            n.trim()
                .parse::<u32>()
                .with_context(|| format!("Invalid GPU count '{}' in --gpus-per-region", n.trim()))
        })
        .collect()
}

/// Parse "i-j=km"
fn parse_distance(s: &str) -> Result<(String, f64)> {
    let (pair, km) = s
        .split_once('=')
        .with_context(|| format!("Expected --distance i-j=km, got '{}'", s))?;
    let km = km
        .trim()
        .parse::<f64>()
        .with_context(|| format!("Invalid distance '{}' in --distance {}", km.trim(), s))?;
    Ok((pair.trim().to_string(), km))
}

impl ScenarioArgs {
    /// Load the YAML scenario, apply overrides, and validate the result
    ///
    /// Overrides are echoed unless `quiet` is set.
    pub fn load(&self, quiet: bool) -> Result<ScenarioConfig> {
        let mut scenario = ScenarioConfig::from_yaml(&self.config_file)
            .with_context(|| format!("Failed to load scenario {}", self.config_file))?;

        let note = |name: &str, new: String, old: String| {
            if !quiet {
                println!("CLI override: {} = {} (was {})", name, new, old);
            }
        };

        let training = &mut scenario.training;
        if let Some(size) = self.model_size_b {
            note("model_size_b", size.to_string(), training.model_size_b.to_string());
            training.model_size_b = size;
        }
        if let Some(ref gpus) = self.gpus_per_region {
            let gpus = parse_gpus_per_region(gpus)?;
            note(
                "gpus_per_region",
                format!("{:?}", gpus),
                format!("{:?}", training.gpus_per_region),
            );
            training.set_gpus_per_region(gpus)?;
        }
        if let Some(batch) = self.batch_size {
            note("batch_size", batch.to_string(), training.batch_size.to_string());
            training.batch_size = batch;
        }
        if let Some(latency) = self.latency_ms {
            note("network_latency_ms", latency.to_string(), training.network_latency_ms.to_string());
            training.network_latency_ms = latency;
        }
        if let Some(bandwidth) = self.bandwidth_gbps {
            note(
                "network_bandwidth_gbps",
                bandwidth.to_string(),
                training.network_bandwidth_gbps.to_string(),
            );
            training.network_bandwidth_gbps = bandwidth;
        }

        for raw in &self.distances {
            let (key, km) = parse_distance(raw)?;
            let (a, b) = regionplan::RegionDistances::parse_key(&key)?;
            let old = scenario
                .region_distances_km
                .get(a, b)
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unset".to_string());
            note(&format!("distance {}-{}", a, b), km.to_string(), old);
            scenario.region_distances_km.set(a, b, km)?;
        }

        if let Some(ref primitive) = self.primitive {
            let parsed: PrimitiveType = primitive.parse().map_err(anyhow::Error::msg)?;
            note(
                "primitive_type",
                parsed.to_string(),
                scenario.primitive.primitive_type.to_string(),
            );
            scenario.primitive.primitive_type = parsed;
        }
        if let Some(chunk) = self.chunk_size_mb {
            note("chunk_size_mb", chunk.to_string(), scenario.primitive.chunk_size_mb.to_string());
            scenario.primitive.chunk_size_mb = chunk;
        }
        if let Some(coefficient) = self.overlap_coefficient {
            note(
                "overlap_coefficient",
                coefficient.to_string(),
                scenario.primitive.overlap_coefficient.to_string(),
            );
            scenario.primitive.overlap_coefficient = coefficient;
        }

        let toggles = &mut scenario.toggles;
        if self.no_gradient_accumulation {
            toggles.gradient_accumulation = false;
        }
        if self.no_compression {
            toggles.data_compression = false;
        }
        if self.no_prediction {
            toggles.predictive_communication = false;
        }
        if self.no_async {
            toggles.async_communication = false;
        }

        scenario.validate().context("Scenario is invalid after applying overrides")?;
        Ok(scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        scenario: ScenarioArgs,
    }

    const TWO_REGIONS: &str = r#"
training:
  model_size_b: 13
  total_gpus: 16
  region_count: 2
  gpus_per_region: [8, 8]
  batch_size: 64
  network_latency_ms: 10
  network_bandwidth_gbps: 50
region_distances_km:
  "1-2": 1200
"#;

    fn load_with(dir: &tempfile::TempDir, extra: &[&str]) -> Result<ScenarioConfig> {
        let path = dir.path().join("scenario.yaml");
        std::fs::write(&path, TWO_REGIONS)?;
        let path = path.to_string_lossy().into_owned();
        let mut argv = vec!["regionplan", "-f", path.as_str()];
        argv.extend_from_slice(extra);
        TestCli::try_parse_from(argv)?.scenario.load(true)
    }

    #[test]
    fn test_parse_gpus_per_region() {
        assert_eq!(parse_gpus_per_region("8, 8,16").unwrap(), vec![8, 8, 16]);
        assert!(parse_gpus_per_region("8,x").is_err());
    }

    #[test]
    fn test_parse_distance() {
        assert_eq!(parse_distance("1-2=1200").unwrap(), ("1-2".to_string(), 1200.0));
        assert!(parse_distance("1-2").is_err());
        assert!(parse_distance("1-2=far").is_err());
    }

    #[test]
    fn test_load_without_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let scenario = load_with(&dir, &[]).unwrap();
        assert_eq!(scenario.training.total_gpus, 16);
        assert_eq!(scenario.region_distances_km.get(1, 2), Some(1200.0));
        assert!(scenario.toggles.data_compression);
    }

    #[test]
    fn test_overrides_recompute_counts_and_fold_distances() {
        let dir = tempfile::tempdir().unwrap();
        let scenario = load_with(
            &dir,
            &[
                "--gpus-per-region",
                "8,8,16",
                "--distance",
                "2-1=900",
                "--distance",
                "3-1=4000",
                "--distance",
                "2-3=3500",
                "--no-compression",
                "--primitive",
                "broadcast",
            ],
        )
        .unwrap();

        assert_eq!(scenario.training.total_gpus, 32);
        assert_eq!(scenario.training.region_count, 3);
        assert_eq!(scenario.training.gpus_per_region, vec![8, 8, 16]);

        let pairs: Vec<_> = scenario.region_distances_km.iter().collect();
        assert_eq!(pairs, vec![(1, 2, 900.0), (1, 3, 4000.0), (2, 3, 3500.0)]);

        assert!(!scenario.toggles.data_compression);
        assert!(scenario.toggles.async_communication);
        assert_eq!(scenario.primitive.primitive_type, PrimitiveType::Broadcast);
    }

    #[test]
    fn test_override_breaking_validation_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_with(&dir, &["--overlap-coefficient", "1.5"]).is_err());
        // distance to a region that does not exist after the override
        assert!(load_with(&dir, &["--distance", "1-3=500"]).is_err());
        assert!(load_with(&dir, &["--gpus-per-region", "4294967295,1"]).is_err());
    }
}
