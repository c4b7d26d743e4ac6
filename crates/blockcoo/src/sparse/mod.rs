//! Block-COO sparse storage.
//!
//! [`BlockCooTensor`] is the general form (any number of block axes and tile
//! axes); [`BlockSparseMatrix`] is the two-axis case with square tiles that
//! the multiply and pruning kernels work on.

mod block;
mod coo;
mod matrix;

pub use block::Block;
pub use coo::BlockCooTensor;
pub use matrix::BlockSparseMatrix;
