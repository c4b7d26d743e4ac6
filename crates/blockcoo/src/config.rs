//! Experiment configuration.
//!
//! Every config is a plain serde struct with defaults and a `validate()`
//! method. [`ExperimentConfig`] groups them for one run and can be loaded
//! from / saved to JSON.
//!
//! # Example
//!
//! ```
//! use blockcoo::config::ExperimentConfig;
//!
//! let cfg = ExperimentConfig::default();
//! cfg.validate().unwrap();
//! assert_eq!(cfg.prune.block_size, 16);
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::operations::{NormOrder, SpmmMode};

/// Parameters of magnitude pruning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruneConfig {
    /// Side length of each square block. Default: **16**.
    pub block_size: usize,
    /// Fraction of elements kept, in `(0, 1]`. Default: **0.1**.
    pub density: f64,
    /// Norm used to rank blocks. Default: spectral (`"2"`).
    pub ord: NormOrder,
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            block_size: 16,
            density: 0.1,
            ord: NormOrder::Spectral,
        }
    }
}

impl PruneConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 {
            return Err(ConfigError::invalid("block_size", "must be > 0"));
        }
        if !(self.density > 0.0 && self.density <= 1.0) {
            return Err(ConfigError::invalid(
                "density",
                format!("must be in (0, 1], got {}", self.density),
            ));
        }
        Ok(())
    }
}

/// Batching of a character language-model corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharBatchConfig {
    /// Sequences per batch. Default: **32**.
    pub batch_size: usize,
    /// Tokens per sequence. Default: **256**.
    pub sequence_length: usize,
    /// Leading tokens of each sequence shared with the previous window and
    /// masked out of the loss. Default: **64**.
    pub overlap_length: usize,
    /// Draw window starts at random from this seed instead of walking the
    /// corpus once. Default: `None`.
    pub seed: Option<u64>,
}

impl Default for CharBatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            sequence_length: 256,
            overlap_length: 64,
            seed: None,
        }
    }
}

impl CharBatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be > 0"));
        }
        if self.sequence_length == 0 {
            return Err(ConfigError::invalid("sequence_length", "must be > 0"));
        }
        if self.overlap_length >= self.sequence_length {
            return Err(ConfigError::invalid(
                "overlap_length",
                format!(
                    "must be < sequence_length ({}), got {}",
                    self.sequence_length, self.overlap_length
                ),
            ));
        }
        Ok(())
    }

    /// Distance between consecutive window starts.
    pub fn shift(&self) -> usize {
        self.sequence_length - self.overlap_length
    }
}

/// Binary Criteo click-log dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriteoConfig {
    /// Path of the binary data file.
    pub data_file: PathBuf,
    /// Samples per stored batch. Default: **1**.
    pub batch_size: usize,
    /// Categorical ids are taken modulo this value when positive.
    /// Default: **-1** (disabled).
    pub max_ind_range: i64,
}

impl Default for CriteoConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("train_data.bin"),
            batch_size: 1,
            max_ind_range: -1,
        }
    }
}

impl CriteoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be > 0"));
        }
        if self.data_file.as_os_str().is_empty() {
            return Err(ConfigError::invalid("data_file", "must not be empty"));
        }
        Ok(())
    }
}

/// Configuration of one experiment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Run name reported to the metrics sink. Default: **"blockcoo"**.
    pub project: String,
    /// Multiply operand order. Default: `sparse_dense`.
    pub mode: SpmmMode,
    pub prune: PruneConfig,
    pub char_batch: Option<CharBatchConfig>,
    pub criteo: Option<CriteoConfig>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            project: "blockcoo".to_string(),
            mode: SpmmMode::SparseDense,
            prune: PruneConfig::default(),
            char_batch: None,
            criteo: None,
        }
    }
}

impl ExperimentConfig {
    /// Load and validate a config from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileRead`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not valid JSON for this schema, and
    /// [`ConfigError::InvalidValue`] if validation fails.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: ExperimentConfig = serde_json::from_str(&contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write the config as pretty-printed JSON, creating parent directories.
    pub fn to_json_file(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::FileRead {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project.trim().is_empty() {
            return Err(ConfigError::invalid("project", "must not be empty"));
        }
        self.prune.validate()?;
        if let Some(char_batch) = &self.char_batch {
            char_batch.validate()?;
        }
        if let Some(criteo) = &self.criteo {
            criteo.validate()?;
        }
        Ok(())
    }

    /// Flatten into a single argument map: top-level scalars plus the fields
    /// of every present sub-config, later sections overriding earlier keys.
    pub fn to_args(&self) -> Result<Map<String, Value>, ConfigError> {
        let mut args = Map::new();
        let mut sections = Vec::new();
        if let Value::Object(top) = serde_json::to_value(self)? {
            for (key, value) in top {
                match value {
                    Value::Object(section) => sections.push(section),
                    Value::Null => {}
                    other => {
                        args.insert(key, other);
                    }
                }
            }
        }
        for section in sections {
            args.extend(section);
        }
        Ok(args)
    }
}
