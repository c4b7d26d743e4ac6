//! blockcoo - block-COO sparse matrices for block-sparse neural network layers
//!
//! A block-sparse matrix stores only its non-zero square tiles, each tagged
//! with its `(block_row, block_col)` coordinate. This crate provides the
//! storage, dense conversion, transpose, magnitude pruning and a sparse-dense
//! multiply that runs on a pluggable accelerator or on a software
//! gather-multiply-scatter kernel.
//!
//! # Architecture
//!
//! ```text
//! Level 1: High-level API (linear, operations modules)
//!     → StaticSparseLinear, SpmmEngine, magnitude_prune
//!
//! Level 2: Kernels (operations module)
//!     → block_coo_spmm_gs, block_coo_transpose, block_coo_to_dense
//!
//! Level 3: Backend implementation (backend module)
//!     → faer GEMM / SVD
//!     → SparseAccelerator (hardware boundary), ReferenceAccelerator
//! ```
//!
//! # Example
//!
//! ```
//! use blockcoo::{BlockSparseMatrix, DenseTensor, SpmmMode, block_coo_spmm_gs};
//!
//! // 4x4 matrix with identity tiles at block (0, 0) and (1, 1)
//! let s = BlockSparseMatrix::new(
//!     2, 2, 2,
//!     &[0, 1],
//!     &[0, 1],
//!     vec![1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0],
//! )
//! .unwrap();
//!
//! let d: DenseTensor<f64> = DenseTensor::ones(&[4, 3]);
//! let y = block_coo_spmm_gs(s.as_tensor(), &d, SpmmMode::SparseDense).unwrap();
//! assert_eq!(y.shape(), &[4, 3]);
//! assert!(y.data().iter().all(|&v| v == 1.0));
//! ```

pub mod backend;
pub mod config;
pub mod data;
pub mod error;
pub mod linear;
pub mod metrics;
pub mod operations;
pub mod random;
pub mod scalar;
pub mod sparse;
pub mod tensor;

pub use backend::{CustomOpRequest, ReferenceAccelerator, SparseAccelerator};
pub use error::{ConfigError, DataError, MetricsError, SparseError, SparseResult};
pub use operations::{
    NormOrder, SpmmEngine, SpmmMode, block_coo_spmm, block_coo_spmm_gs, block_coo_to_dense,
    block_coo_transpose, magnitude_prune,
};
pub use scalar::Scalar;
pub use sparse::{Block, BlockCooTensor, BlockSparseMatrix};
pub use tensor::{DenseMatrix, DenseTensor};
