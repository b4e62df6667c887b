use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{EstimateError, Result};
use crate::estimate::region::RegionDistances;

// Default value functions for serde
fn default_enabled() -> bool { true }
fn default_chunk_size_mb() -> u32 { 256 }
fn default_overlap_coefficient() -> f64 { 0.7 }

/// A complete estimation request: cluster shape, network, and knobs
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ScenarioConfig {
    pub training: TrainingConfig,

    /// Pairwise inter-region distances, keyed "i-j" with 1-based region ids
    #[serde(default)]
    pub region_distances_km: RegionDistances,

    #[serde(default)]
    pub toggles: StrategyToggles,

    #[serde(default)]
    pub primitive: PrimitiveConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TrainingConfig {
    /// Model size in billions of parameters
    pub model_size_b: f64,
    pub total_gpus: u32,
    pub region_count: u32,
    pub gpus_per_region: Vec<u32>,
    pub batch_size: u32,
    pub network_latency_ms: f64,
    pub network_bandwidth_gbps: f64,
}

impl TrainingConfig {
    /// Build a config whose GPU and region counts are derived from `gpus_per_region`
    pub fn from_regions(
        model_size_b: f64,
        gpus_per_region: Vec<u32>,
        batch_size: u32,
        network_latency_ms: f64,
        network_bandwidth_gbps: f64,
    ) -> Self {
        // An overflowing sum saturates; validate then reports gpus_per_region
        let total_gpus = sum_gpus(&gpus_per_region).unwrap_or(u32::MAX);
        Self {
            model_size_b,
            total_gpus,
            region_count: gpus_per_region.len() as u32,
            gpus_per_region,
            batch_size,
            network_latency_ms,
            network_bandwidth_gbps,
        }
    }

    /// Replace the per-region GPU layout and recompute the derived counts
    pub fn set_gpus_per_region(&mut self, gpus_per_region: Vec<u32>) -> Result<()> {
        self.total_gpus = sum_gpus(&gpus_per_region).ok_or_else(|| {
            EstimateError::invalid("gpus_per_region", "total GPU count does not fit in u32")
        })?;
        self.region_count = gpus_per_region.len() as u32;
        self.gpus_per_region = gpus_per_region;
        Ok(())
    }

    /// Validate field constraints, naming the first offending field
    pub fn validate(&self) -> Result<()> {
        if !self.model_size_b.is_finite() || self.model_size_b <= 0.0 {
            return Err(EstimateError::invalid(
                "model_size_b",
                format!("must be a positive number, got {}", self.model_size_b),
            ));
        }
        if self.total_gpus == 0 {
            return Err(EstimateError::invalid("total_gpus", "must be at least 1"));
        }
        if self.region_count == 0 {
            return Err(EstimateError::invalid("region_count", "must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(EstimateError::invalid("batch_size", "must be at least 1"));
        }
        if !self.network_bandwidth_gbps.is_finite() || self.network_bandwidth_gbps <= 0.0 {
            return Err(EstimateError::invalid(
                "network_bandwidth_gbps",
                format!("must be a positive number, got {}", self.network_bandwidth_gbps),
            ));
        }
        if !self.network_latency_ms.is_finite() || self.network_latency_ms < 0.0 {
            return Err(EstimateError::invalid(
                "network_latency_ms",
                format!("must be non-negative, got {}", self.network_latency_ms),
            ));
        }

        if self.gpus_per_region.len() != self.region_count as usize {
            return Err(EstimateError::invalid(
                "gpus_per_region",
                format!(
                    "has {} entries but region_count is {}",
                    self.gpus_per_region.len(),
                    self.region_count
                ),
            ));
        }
        if let Some(idx) = self.gpus_per_region.iter().position(|&g| g == 0) {
            return Err(EstimateError::invalid(
                "gpus_per_region",
                format!("region {} has no GPUs", idx + 1),
            ));
        }
        let sum: u64 = self.gpus_per_region.iter().map(|&g| g as u64).sum();
        if sum != self.total_gpus as u64 {
            return Err(EstimateError::invalid(
                "gpus_per_region",
                format!("sums to {} but total_gpus is {}", sum, self.total_gpus),
            ));
        }

        Ok(())
    }
}

fn sum_gpus(gpus_per_region: &[u32]) -> Option<u32> {
    gpus_per_region
        .iter()
        .try_fold(0u32, |total, &g| total.checked_add(g))
}

/// Communication-hiding strategies; each defaults to enabled when absent
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct StrategyToggles {
    #[serde(default = "default_enabled")]
    pub gradient_accumulation: bool,
    #[serde(default = "default_enabled")]
    pub data_compression: bool,
    #[serde(default = "default_enabled")]
    pub predictive_communication: bool,
    #[serde(default = "default_enabled")]
    pub async_communication: bool,
}

impl Default for StrategyToggles {
    fn default() -> Self {
        Self {
            gradient_accumulation: true,
            data_compression: true,
            predictive_communication: true,
            async_communication: true,
        }
    }
}

impl StrategyToggles {
    /// All strategies disabled (plain synchronous training)
    pub fn none() -> Self {
        Self {
            gradient_accumulation: false,
            data_compression: false,
            predictive_communication: false,
            async_communication: false,
        }
    }
}

/// Collective used for cross-region traffic
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    /// Ring all-reduce, overhead shrinks logarithmically with GPU count
    #[default]
    RingAllreduce,
    /// Plain all-reduce, the baseline
    Allreduce,
    /// One-to-many broadcast; only valid for one-way traffic
    Broadcast,
}

impl std::str::FromStr for PrimitiveType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ring_allreduce" | "ring-allreduce" | "ring" => Ok(PrimitiveType::RingAllreduce),
            "allreduce" | "all_reduce" | "all-reduce" => Ok(PrimitiveType::Allreduce),
            "broadcast" | "bcast" => Ok(PrimitiveType::Broadcast),
            _ => Err(format!(
                "Unknown primitive type: {}. Valid options: ring_allreduce, allreduce, broadcast",
                s
            )),
        }
    }
}

impl std::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrimitiveType::RingAllreduce => write!(f, "Ring-AllReduce"),
            PrimitiveType::Allreduce => write!(f, "AllReduce"),
            PrimitiveType::Broadcast => write!(f, "Broadcast"),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct PrimitiveConfig {
    #[serde(default, alias = "type")]
    pub primitive_type: PrimitiveType,

    /// Payload chunk size in MB (256 is the assumed optimum)
    #[serde(default = "default_chunk_size_mb")]
    pub chunk_size_mb: u32,

    /// Fraction of overlappable time actually overlapped, in [0, 1]
    #[serde(default = "default_overlap_coefficient")]
    pub overlap_coefficient: f64,
}

impl Default for PrimitiveConfig {
    fn default() -> Self {
        Self {
            primitive_type: PrimitiveType::default(),
            chunk_size_mb: default_chunk_size_mb(),
            overlap_coefficient: default_overlap_coefficient(),
        }
    }
}

impl PrimitiveConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size_mb == 0 {
            return Err(EstimateError::invalid("chunk_size_mb", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.overlap_coefficient) {
            return Err(EstimateError::invalid(
                "overlap_coefficient",
                format!("must be within [0, 1], got {}", self.overlap_coefficient),
            ));
        }
        Ok(())
    }
}

impl ScenarioConfig {
    pub fn new(training: TrainingConfig) -> Self {
        Self {
            training,
            region_distances_km: RegionDistances::default(),
            toggles: StrategyToggles::default(),
            primitive: PrimitiveConfig::default(),
        }
    }

    /// Load a scenario from a YAML file
    ///
    /// # Example
    /// ```no_run
    /// # use regionplan::config::ScenarioConfig;
    /// let scenario = ScenarioConfig::from_yaml("scenarios/two_region_70b.yaml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    ///
    /// # Errors
    /// - File not found
    /// - Invalid YAML syntax or missing required fields
    /// - Any field failing [`ScenarioConfig::validate`]
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate a scenario from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Err(EstimateError::Config("scenario is empty".to_string()));
        }
        let config: ScenarioConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section; rejects before any computation runs
    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        self.region_distances_km
            .validate(self.training.region_count)?;
        self.primitive.validate()?;
        Ok(())
    }
}
