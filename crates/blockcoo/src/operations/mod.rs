//! Operations on block-COO and dense tensors.
//!
//! Each operation allocates its output and returns a new value; inputs are
//! never modified.
//!
//! ```text
//! dense ──magnitude_prune──► BlockSparseMatrix ──block_coo_transpose──► (transposed)
//!                                   │
//!                                   ├──block_coo_to_dense──► dense
//!                                   └──block_coo_spmm──────► dense
//!                                         ├─ accelerator_spmm   (device available)
//!                                         └─ block_coo_spmm_gs  (software)
//! ```

mod convert;
mod norm;
mod permutedims;
mod prune;
mod spmm;
mod transpose;

pub use convert::{block_coo_to_dense, dense_to_block_coo};
pub use norm::{NormOrder, matrix_norm};
pub use permutedims::{permutedims, permutedims_into};
pub use prune::{block_norms, magnitude_prune, magnitude_prune_with};
pub use spmm::{SpmmEngine, SpmmMode, block_coo_spmm, block_coo_spmm_gs};
pub use transpose::block_coo_transpose;
