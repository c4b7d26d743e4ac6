//! Error types for blockcoo.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error returned by an accelerator backend.
pub type AcceleratorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by block-sparse and dense tensor operations.
#[derive(Debug, Error)]
pub enum SparseError {
    /// Malformed block or tile dimensions.
    #[error("shape error: {message}")]
    Shape { message: String },

    /// Rank of the block-index axes differs from the rank of the value axes.
    #[error("block COO requires sparse_dim ({sparse_dim}) == dense_dim ({dense_dim})")]
    ShapeMismatch { sparse_dim: usize, dense_dim: usize },

    /// The operand is not a two-dimensional block-COO matrix.
    #[error("expected a 2D block COO operand, got sparse_dim {sparse_dim}, dense_dim {dense_dim}")]
    Layout { sparse_dim: usize, dense_dim: usize },

    /// Operand sizes are incompatible for multiplication.
    #[error(
        "block sparse input size ({blocks} blocks * {block_size}) does not match dense input size ({actual})"
    )]
    DimensionMismatch {
        blocks: usize,
        block_size: usize,
        actual: usize,
    },

    /// Unknown multiplication mode.
    #[error("expected mode either 'sparse_dense' or 'dense_sparse', got '{mode}'")]
    InvalidMode { mode: String },

    /// An argument is outside its valid domain.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Data length does not match the requested shape.
    #[error("data length mismatch: expected {expected} elements, got {actual}")]
    DataLength { expected: usize, actual: usize },

    /// A block coordinate lies outside the block grid.
    #[error("block {block:?} out of range for block grid {grid:?}")]
    BlockOutOfRange { block: Vec<usize>, grid: Vec<usize> },

    /// Invalid axis permutation.
    #[error("invalid permutation {perm:?} for tensor with {ndim} dimensions")]
    InvalidPermutation { perm: Vec<usize>, ndim: usize },

    /// An accelerator returned a result of the wrong shape.
    #[error("accelerator returned shape {actual:?}, expected {expected:?}")]
    OutputShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A matrix decomposition needed for a norm failed.
    #[error("decomposition error: {message}")]
    Decomposition { message: String },

    /// Failure inside the accelerator, passed through unchanged.
    #[error(transparent)]
    Accelerator(AcceleratorError),
}

impl SparseError {
    pub(crate) fn shape(message: impl Into<String>) -> Self {
        Self::Shape {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

/// Result alias for sparse operations.
pub type SparseResult<T> = Result<T, SparseError>;

/// Errors raised while loading or batching datasets.
#[derive(Debug, Error)]
pub enum DataError {
    /// Underlying I/O failure.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Vocabulary file is not valid JSON or not a list of characters.
    #[error("invalid vocabulary in {path:?}: {message}")]
    InvalidVocab { path: PathBuf, message: String },

    /// Text contains a character missing from the vocabulary.
    #[error("character {0:?} is not in the vocabulary")]
    UnknownCharacter(char),

    /// Token id outside the vocabulary.
    #[error("token id {id} out of range for vocabulary of size {size}")]
    UnknownToken { id: i64, size: usize },

    /// Batch index beyond the end of the dataset.
    #[error("index {index} is out of bounds for dataset of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Invalid batching or dataset configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Tensor construction failed while assembling a batch.
    #[error(transparent)]
    Tensor(#[from] SparseError),
}

/// Errors raised by configuration validation and loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field holds a value outside its valid range.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// Configuration file could not be read.
    #[error("cannot read config file {path:?}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON for the expected schema.
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors raised by the experiment logger and its sinks.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A record was logged at a step lower than an earlier record.
    #[error("step {step} is lower than the previous step {previous}")]
    StepRegression { step: u64, previous: u64 },

    /// The record is not shaped as expected (e.g. not a JSON object).
    #[error("malformed metrics record: {0}")]
    MalformedRecord(String),

    /// The sink failed to persist a record.
    #[error("metrics sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The sink failed to serialize a record.
    #[error("metrics serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_message() {
        let err = SparseError::DimensionMismatch {
            blocks: 6,
            block_size: 2,
            actual: 10,
        };
        assert_eq!(
            err.to_string(),
            "block sparse input size (6 blocks * 2) does not match dense input size (10)"
        );
    }

    #[test]
    fn test_accelerator_error_is_transparent() {
        let inner: AcceleratorError = "device lost".into();
        let err = SparseError::Accelerator(inner);
        assert_eq!(err.to_string(), "device lost");
    }

    #[test]
    fn test_config_error_into_data_error() {
        let err: DataError = ConfigError::invalid("batch_size", "must be > 0").into();
        assert!(matches!(err, DataError::Config(_)));
    }
}
