//! Synchronizer configuration
//!
//! Every field has a serde default, so a partial JSON document (or `{}`) yields a
//! usable configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::types::{Result, SyncError};

/// Tunables for trigger synthesis, alignment and event building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Channel labels recognised as a trigger row (case-insensitive)
    #[serde(default = "default_trigger_labels")]
    pub trigger_labels: Vec<String>,

    /// Label given to a trigger row appended by the synthesizer
    #[serde(default = "default_trigger_label")]
    pub trigger_label: String,

    /// Code marking the last sample of a trial
    #[serde(default = "default_boundary_code")]
    pub boundary_code: f64,

    /// Code stamped at time zero of a trial with no epoch info entry
    #[serde(default = "default_trial_code")]
    pub default_trial_code: f64,

    /// Offsets with a magnitude at or above this are discarded
    #[serde(default = "default_max_offset")]
    pub max_offset_samples: i64,

    /// Largest alignment table the sequence matcher will allocate
    #[serde(default = "default_max_alignment_cells")]
    pub max_alignment_cells: usize,

    /// Subtract the median of a pre-existing trigger row
    #[serde(default = "default_true")]
    pub remove_trigger_baseline: bool,
}

fn default_trigger_labels() -> Vec<String> {
    ["TRIGGER", "TRIG", "STATUS", "STI 014"]
        .iter()
        .map(|label| label.to_string())
        .collect()
}

fn default_trigger_label() -> String {
    "TRIGGER".to_string()
}

fn default_boundary_code() -> f64 {
    -99.0
}

fn default_trial_code() -> f64 {
    10.0
}

fn default_max_offset() -> i64 {
    100
}

fn default_max_alignment_cells() -> usize {
    64_000_000
}

fn default_true() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            trigger_labels: default_trigger_labels(),
            trigger_label: default_trigger_label(),
            boundary_code: default_boundary_code(),
            default_trial_code: default_trial_code(),
            max_offset_samples: default_max_offset(),
            max_alignment_cells: default_max_alignment_cells(),
            remove_trigger_baseline: default_true(),
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the offset bound
    pub fn with_max_offset(mut self, samples: i64) -> Self {
        self.max_offset_samples = samples;
        self
    }

    /// Set the boundary sentinel code
    pub fn with_boundary_code(mut self, code: f64) -> Self {
        self.boundary_code = code;
        self
    }

    /// Replace the labels recognised as trigger channels
    pub fn with_trigger_labels(mut self, labels: Vec<String>) -> Self {
        self.trigger_labels = labels;
        self
    }

    /// Set the alignment table size limit
    pub fn with_max_alignment_cells(mut self, cells: usize) -> Self {
        self.max_alignment_cells = cells;
        self
    }

    /// Whether `label` names a trigger channel.
    pub fn is_trigger_label(&self, label: &str) -> bool {
        let label = label.trim();
        self.trigger_labels
            .iter()
            .any(|candidate| candidate.trim().eq_ignore_ascii_case(label))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_offset_samples <= 0 {
            return Err(SyncError::Config(format!(
                "max_offset_samples must be positive, got {}",
                self.max_offset_samples
            )));
        }
        if self.max_alignment_cells == 0 {
            return Err(SyncError::Config(
                "max_alignment_cells must be positive".to_string(),
            ));
        }
        if !self.boundary_code.is_finite() || self.boundary_code == 0.0 {
            return Err(SyncError::Config(format!(
                "boundary_code must be a finite nonzero code, got {}",
                self.boundary_code
            )));
        }
        if !self.default_trial_code.is_finite() || self.default_trial_code == 0.0 {
            return Err(SyncError::Config(format!(
                "default_trial_code must be a finite nonzero code, got {}",
                self.default_trial_code
            )));
        }
        if self.trigger_label.trim().is_empty() {
            return Err(SyncError::Config(
                "trigger_label must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SyncConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded sync config from {:?}", path.as_ref());
        Self::from_json_str(&data)
    }
}
