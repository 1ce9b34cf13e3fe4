//! Search parameters, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is valid:
//!
//! ```toml
//! seed = 7
//! time_limit_secs = 120
//!
//! [annealing]
//! alpha = 0.9995
//!
//! [pails]
//! max_no_progress = 300
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Seed for every random choice; a fixed seed makes a run reproducible.
    pub seed: u64,
    pub time_limit_secs: f64,
    pub hill_climb: HillClimbConfig,
    pub annealing: AnnealingConfig,
    pub pails: PailsConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            seed: 42,
            time_limit_secs: 60.0,
            hill_climb: HillClimbConfig::default(),
            annealing: AnnealingConfig::default(),
            pails: PailsConfig::default(),
        }
    }
}

impl SearchConfig {
    pub fn from_toml_str(text: &str) -> Result<SearchConfig> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<SearchConfig> {
        SearchConfig::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_secs_f64(self.time_limit_secs.max(0.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HillClimbConfig {
    pub sample_size: usize,
    // every n-th room enters the candidate set
    pub room_stride: usize,
    pub worsening_limit: f64,
    pub worsening_probability: f64,
    pub log_every: u64,
}

impl Default for HillClimbConfig {
    fn default() -> Self {
        HillClimbConfig {
            sample_size: 10,
            room_stride: 2,
            worsening_limit: 500.0,
            worsening_probability: 0.3,
            log_every: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnealingConfig {
    pub initial_temperature: f64,
    pub final_temperature: f64,
    /// Geometric cooling factor applied once per iteration.
    pub alpha: f64,
    /// Chance that an optional patient's reassignment becomes a removal.
    pub remove_probability: f64,
    pub log_every: u64,
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        AnnealingConfig {
            initial_temperature: 5000.0,
            final_temperature: 0.1,
            alpha: 0.9999,
            remove_probability: 0.1,
            log_every: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PailsConfig {
    /// Starting distance of `p` from 1.
    pub initial_decrement: f64,
    pub decay_factor: f64,
    pub update_every: u64,
    /// `p` above this counts as converged and is reset.
    pub saturation: f64,
    pub max_no_progress: u64,
    pub revert_threshold: u64,
    pub purge_after: u64,
    pub log_every: u64,
    pub max_samples: usize,
    pub deterministic_span: usize,
}

impl Default for PailsConfig {
    fn default() -> Self {
        PailsConfig {
            initial_decrement: 0.3,
            decay_factor: 0.9,
            update_every: 1,
            saturation: 0.99,
            max_no_progress: 200,
            revert_threshold: 10,
            purge_after: 500,
            log_every: 500,
            max_samples: 120,
            deterministic_span: 50,
        }
    }
}
