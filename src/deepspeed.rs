//! DeepSpeed launch artifacts and deployment service payloads
//!
//! Renders `ds_config.json` and a `run_training.sh` launcher for a planned
//! strategy. The request/response records mirror the external deployment
//! and training-script services; regionplan only fills them in and never
//! sends them anywhere.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ScenarioConfig;
use crate::error::Result;
use crate::estimate::{EstimateReport, ParallelStrategy};

pub const CONFIG_FILE_NAME: &str = "ds_config.json";
pub const SCRIPT_FILE_NAME: &str = "run_training.sh";

const BUCKET_SIZE: u64 = 100_000_000;
const PARAM_PERSISTENCE_THRESHOLD: u64 = 10_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepSpeedConfig {
    pub train_batch_size: u32,
    pub train_micro_batch_size_per_gpu: u32,
    pub gradient_accumulation_steps: u32,
    pub optimizer: OptimizerSection,
    pub gradient_clipping: f64,
    pub zero_optimization: ZeroSection,
    pub fp16: Fp16Section,
    pub wall_clock_breakdown: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSection {
    #[serde(rename = "type")]
    pub kind: String,
    pub params: AdamWParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdamWParams {
    pub lr: f64,
    pub betas: [f64; 2],
    pub weight_decay: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffloadTarget {
    pub device: String,
    pub pin_memory: bool,
}

impl OffloadTarget {
    fn cpu() -> Self {
        Self {
            device: "cpu".to_string(),
            pin_memory: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZeroSection {
    pub stage: u8,
    pub offload_optimizer: OffloadTarget,
    pub offload_param: OffloadTarget,
    pub overlap_comm: bool,
    pub contiguous_gradients: bool,
    pub reduce_bucket_size: u64,
    pub stage3_prefetch_bucket_size: u64,
    pub stage3_param_persistence_threshold: u64,
    pub stage3_max_live_parameters: u64,
    pub stage3_max_reuse_distance: u64,
    pub stage3_gather_16bit_weights_on_model_save: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fp16Section {
    pub enabled: bool,
    /// 0 selects dynamic loss scaling
    pub loss_scale: u32,
    pub loss_scale_window: u32,
    pub hysteresis: u32,
    pub min_loss_scale: u32,
}

impl DeepSpeedConfig {
    /// ZeRO-3 with CPU offload and fp16, sized for `batch_size` across `total_gpus`
    pub fn for_plan(batch_size: u32, total_gpus: u32) -> Self {
        let micro_batch = batch_size / total_gpus.max(1);
        if micro_batch == 0 {
            log::warn!(
                "batch_size {} is smaller than {} GPUs; micro-batch per GPU rounds down to 0",
                batch_size,
                total_gpus
            );
        }

        Self {
            train_batch_size: batch_size,
            train_micro_batch_size_per_gpu: micro_batch,
            gradient_accumulation_steps: 1,
            optimizer: OptimizerSection {
                kind: "AdamW".to_string(),
                params: AdamWParams {
                    lr: 1e-4,
                    betas: [0.9, 0.95],
                    weight_decay: 0.01,
                },
            },
            gradient_clipping: 1.0,
            zero_optimization: ZeroSection {
                stage: 3,
                offload_optimizer: OffloadTarget::cpu(),
                offload_param: OffloadTarget::cpu(),
                overlap_comm: true,
                contiguous_gradients: true,
                reduce_bucket_size: BUCKET_SIZE,
                stage3_prefetch_bucket_size: BUCKET_SIZE,
                stage3_param_persistence_threshold: PARAM_PERSISTENCE_THRESHOLD,
                stage3_max_live_parameters: BUCKET_SIZE,
                stage3_max_reuse_distance: BUCKET_SIZE,
                stage3_gather_16bit_weights_on_model_save: true,
            },
            fp16: Fp16Section {
                enabled: true,
                loss_scale: 0,
                loss_scale_window: 1000,
                hysteresis: 2,
                min_loss_scale: 1,
            },
            wall_clock_breakdown: false,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Render the bash launcher for a planned strategy
pub fn launch_script(model_size_b: f64, total_gpus: u32, regions: u32, strategy: &ParallelStrategy) -> String {
    format!(
        r#"#!/bin/bash

# NCCL / DeepSpeed environment for cross-region training
export NCCL_DEBUG=INFO
export NCCL_SOCKET_IFNAME=eth0
export NCCL_COMPRESSION=1
export DEEPSPEED_REGION_AWARE=1

# Replace master_node_ip with the address of the rank-0 node
deepspeed --num_gpus={gpus} \
  --num_nodes={regions} \
  --master_addr=master_node_ip \
  --master_port=8888 \
  train.py \
  --model_size={size}B \
  --data_parallel_size={dp} \
  --pipeline_parallel_size={pp} \
  --tensor_parallel_size={tp} \
  --deepspeed \
  --deepspeed_config={config}
"#,
        gpus = total_gpus,
        regions = regions,
        size = model_size_b,
        dp = strategy.dp,
        pp = strategy.pp,
        tp = strategy.tp,
        config = CONFIG_FILE_NAME,
    )
}

/// DeepSpeed config plus launcher for one scenario
#[derive(Debug, Clone, PartialEq)]
pub struct DeepSpeedBundle {
    pub config: DeepSpeedConfig,
    pub script: String,
}

impl DeepSpeedBundle {
    pub fn new(scenario: &ScenarioConfig, strategy: &ParallelStrategy) -> Self {
        let training = &scenario.training;
        Self {
            config: DeepSpeedConfig::for_plan(training.batch_size, training.total_gpus),
            script: launch_script(
                training.model_size_b,
                training.total_gpus,
                training.region_count,
                strategy,
            ),
        }
    }

    /// Write `ds_config.json` and `run_training.sh` into `dir`, creating it if needed
    pub fn write_to<P: AsRef<Path>>(&self, dir: P) -> Result<(PathBuf, PathBuf)> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let config_path = dir.join(CONFIG_FILE_NAME);
        fs::write(&config_path, self.config.to_json_pretty()?)?;

        let script_path = dir.join(SCRIPT_FILE_NAME);
        fs::write(&script_path, &self.script)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755))?;
        }

        log::info!("Wrote DeepSpeed bundle to {}", dir.display());
        Ok((config_path, script_path))
    }
}

/// Payload accepted by the deployment service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRequest {
    pub regions: u32,
    pub gpus_per_region: Vec<u32>,
    pub model_size: f64,
    pub batch_size: u32,
    pub dp: u32,
    pub pp: u32,
    pub tp: u32,
}

impl DeploymentRequest {
    pub fn from_report(scenario: &ScenarioConfig, report: &EstimateReport) -> Self {
        let training = &scenario.training;
        Self {
            regions: training.region_count,
            gpus_per_region: training.gpus_per_region.clone(),
            model_size: training.model_size_b,
            batch_size: training.batch_size,
            dp: report.strategy.dp,
            pp: report.strategy.pp,
            tp: report.strategy.tp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Payload accepted by the training-script generation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingScriptRequest {
    pub model_size: f64,
    pub dp: u32,
    pub pp: u32,
    pub tp: u32,
}

impl TrainingScriptRequest {
    pub fn from_report(scenario: &ScenarioConfig, report: &EstimateReport) -> Self {
        Self {
            model_size: scenario.training.model_size_b,
            dp: report.strategy.dp,
            pp: report.strategy.pp,
            tp: report.strategy.tp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingScriptResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
