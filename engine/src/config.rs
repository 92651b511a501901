//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;
use serde_env_field::EnvField;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Arguments {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to configuration file",
        default_value = "engine/config.yaml"
    )]
    pub config_file: String,

    #[arg(
        short = 'e',
        long = "env",
        help = "Path to environment file",
        default_value = "engine/.env"
    )]
    pub env_file: Option<String>,

    #[arg(short = 's', long = "seed", help = "Seed for every random draw")]
    pub seed: Option<u64>,

    #[arg(
        short = 't',
        long = "turns",
        help = "Number of turns to simulate",
        default_value_t = 6
    )]
    pub turns: u32,

    #[arg(
        long = "failure-rate",
        help = "Probability that the scripted generator fails a call",
        default_value_t = 0.3
    )]
    pub failure_rate: f32,

    #[arg(
        long = "latency-ms",
        help = "Latency of the scripted generator in milliseconds",
        default_value_t = 400
    )]
    pub latency_ms: u64,

    #[arg(
        long = "offline",
        help = "Skip the generator entirely and speak from the rule-based tiers"
    )]
    pub offline: bool,
}

impl Default for Arguments {
    fn default() -> Self {
        Self {
            config_file: "config.yaml".to_string(),
            env_file: Some(".env".to_string()),
            seed: None,
            turns: 6,
            failure_rate: 0.3,
            latency_ms: 400,
            offline: false,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to open config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub engine: EngineSettings,
    pub hesitation: HesitationConfig,
    pub cache: CacheConfig,
    pub timeouts: TimeoutConfig,
    pub adaptation: AdaptationConfig,
    pub history: HistoryConfig,
    pub memory: MemoryConfig,
    pub strings: StringsConfig,
}

impl Configuration {
    pub fn load(path: &str) -> Result<Configuration, ConfigError> {
        let conf: Configuration = serde_yaml::from_reader(std::fs::File::open(path)?)?;
        conf.validate()?;
        Ok(conf)
    }

    /// Reject option combinations the engine cannot honor
    pub fn validate(&self) -> Result<(), ConfigError> {
        let h = &self.hesitation;
        if !(h.min_dwell_time > 0.0 && h.min_dwell_time <= h.max_dwell_time) {
            return Err(ConfigError::Invalid(format!(
                "dwell range {}..{} is empty",
                h.min_dwell_time, h.max_dwell_time
            )));
        }
        if self.cache.per_key_cap == 0 || self.cache.global_cap < self.cache.per_key_cap {
            return Err(ConfigError::Invalid(format!(
                "cache caps per_key={} global={} are inconsistent",
                self.cache.per_key_cap, self.cache.global_cap
            )));
        }
        if !(0.0..=1.0).contains(&self.adaptation.rate) || self.adaptation.threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "adaptation threshold={} rate={} out of range",
                self.adaptation.threshold, self.adaptation.rate
            )));
        }
        if self.memory.encryption_key.is_empty() {
            return Err(ConfigError::Invalid(
                "memory encryption key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Feature switches for the engine as a whole
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Seed for the engine's random source; drawn from the OS when unset
    pub seed: Option<u64>,
    /// When disabled, every request goes straight to the rule-based tier
    pub enable_generation: bool,
    pub enable_cache: bool,
    pub enable_pre_warming: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            seed: None,
            enable_generation: true,
            enable_cache: true,
            enable_pre_warming: false,
        }
    }
}

/// Timing and pacing of hesitation sequences, in seconds and steps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HesitationConfig {
    pub min_dwell_time: f32,
    pub max_dwell_time: f32,
    pub base_visit_steps: usize,
    pub max_extra_steps: usize,
}

impl Default for HesitationConfig {
    fn default() -> Self {
        Self {
            min_dwell_time: 0.3,
            max_dwell_time: 1.2,
            base_visit_steps: 4,
            max_extra_steps: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub per_key_cap: usize,
    pub global_cap: usize,
    /// Pause between pre-warm generator calls
    pub pre_warm_delay_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            per_key_cap: 5,
            global_cap: 100,
            pre_warm_delay_ms: 500,
        }
    }
}

/// Per call-site budgets, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub dialogue_ms: u64,
    pub decision_ms: u64,
    pub speech_ms: u64,
    pub enhancement_ms: u64,
    /// How long a caller waits on background pre-generation before giving up
    pub pre_generation_wait_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            dialogue_ms: 2000,
            decision_ms: 3000,
            speech_ms: 5000,
            enhancement_ms: 10000,
            pre_generation_wait_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationConfig {
    pub threshold: f32,
    pub rate: f32,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            threshold: 0.2,
            rate: 0.15,
        }
    }
}

/// Ring-buffer capacities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_dialogue_history: usize,
    pub max_decision_history: usize,
    pub max_adaptation_notes: usize,
    pub max_behavior_history: usize,
    pub max_session_history: usize,
    /// Entries in the prompt's recent-conversation digest
    pub max_prompt_history: usize,
    /// Entries in the emotional transition log
    pub max_transition_history: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_dialogue_history: 6,
            max_decision_history: 10,
            max_adaptation_notes: 10,
            max_behavior_history: 10,
            max_session_history: 5,
            max_prompt_history: 5,
            max_transition_history: 5,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Key for the at-rest XOR obfuscation of stored memory
    pub encryption_key: EnvField<MemoryKey>,
    /// JSON file backing the key-value store; empty keeps memory in-process
    pub store_path: EnvField<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryKey(String);

impl MemoryKey {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for MemoryKey {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl Default for MemoryKey {
    fn default() -> Self {
        Self("dealer_personality_2026".to_string())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StringsConfig {
    /// YAML string table layered over the built-in literals; empty uses built-ins only
    pub table_path: EnvField<String>,
}
