//! TOML configuration of a model's time grid and parameter defaults.
//!
//! ```toml
//! stop_period = 2050
//!
//! [time]
//! kind = "uniform"
//! first = 2020
//! step = 1
//! last = 2100
//!
//! [defaults]
//! climate_sensitivity = 3.0
//! ```
//!
//! Components and their bindings are still declared in code;
//! see [`ModelBuilder::from_config`](crate::model::ModelBuilder::from_config).

use crate::errors::{TempoError, TempoResult};
use crate::model::RunContext;
use crate::timestep::{FloatValue, Period, TimeGrid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

fn default_step() -> Period {
    1
}

/// Time grid as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum TimeGridConfig {
    /// Every `step` periods from `first` up to and including `last`
    Uniform {
        first: Period,
        #[serde(default = "default_step")]
        step: Period,
        last: Period,
    },
    Labels {
        labels: Vec<Period>,
    },
}

impl TimeGridConfig {
    pub fn to_grid(&self) -> TempoResult<TimeGrid> {
        match self {
            TimeGridConfig::Uniform { first, step, last } => {
                TimeGrid::from_range(*first, *last, *step)
            }
            TimeGridConfig::Labels { labels } => TimeGrid::from_labels(labels.clone()),
        }
    }
}

/// Top-level model configuration parsed from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Last period to solve. Runs cover the whole grid if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_period: Option<Period>,
    pub time: TimeGridConfig,
    /// Values for otherwise unbound parameters, keyed by parameter name
    #[serde(default)]
    pub defaults: BTreeMap<String, FloatValue>,
}

impl ModelConfig {
    /// Parses a configuration from a TOML string.
    ///
    /// The time grid is validated as part of parsing.
    pub fn from_toml_str(s: &str) -> TempoResult<Self> {
        let config: ModelConfig =
            toml::from_str(s).map_err(|e| TempoError::Config(e.to_string()))?;
        config
            .time
            .to_grid()
            .map_err(|e| TempoError::Config(format!("[time]: {e}")))?;
        Ok(config)
    }

    /// Parses a configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> TempoResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            TempoError::Config(format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> TempoResult<String> {
        toml::to_string(self).map_err(|e| TempoError::Config(e.to_string()))
    }

    /// A run context that stops at the configured period.
    pub fn run_context(&self) -> RunContext {
        let context = RunContext::new();
        match self.stop_period {
            Some(period) => context.with_stop_period(period),
            None => context,
        }
    }
}
