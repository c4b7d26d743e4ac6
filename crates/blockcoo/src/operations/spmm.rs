//! Block-sparse × dense multiplication.
//!
//! ```text
//! block_coo_spmm(sparse, dense, mode, accelerator)
//!     → accelerator present and available: accelerator_spmm
//!     → otherwise:                         block_coo_spmm_gs
//!
//! block_coo_spmm_gs(sparse, dense, DenseSparse)
//!     → (block_coo_spmm_gs(sparseᵀ, denseᵀ, SparseDense))ᵀ
//! ```

use std::fmt;
use std::str::FromStr;

use faer::linalg::matmul::matmul;
use faer::{Accum, Par};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::{AsFaerMat, SparseAccelerator, accelerator_spmm, tile_as_faer_mat};
use crate::error::{SparseError, SparseResult};
use crate::scalar::Scalar;
use crate::sparse::{BlockCooTensor, BlockSparseMatrix};
use crate::tensor::DenseTensor;

use super::transpose::block_coo_transpose;

/// Operand order of a block-sparse multiply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpmmMode {
    /// `sparse @ dense`
    #[default]
    SparseDense,
    /// `dense @ sparse`
    DenseSparse,
}

impl SpmmMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpmmMode::SparseDense => "sparse_dense",
            SpmmMode::DenseSparse => "dense_sparse",
        }
    }

    /// Output shape for a `(R*B, C*B)` sparse operand and a dense operand.
    pub(crate) fn output_shape(
        &self,
        sparse_shape: (usize, usize),
        dense_shape: &[usize],
    ) -> [usize; 2] {
        match self {
            SpmmMode::SparseDense => [sparse_shape.0, dense_shape[1]],
            SpmmMode::DenseSparse => [dense_shape[0], sparse_shape.1],
        }
    }
}

impl fmt::Display for SpmmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpmmMode {
    type Err = SparseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sparse_dense" => Ok(SpmmMode::SparseDense),
            "dense_sparse" => Ok(SpmmMode::DenseSparse),
            other => Err(SparseError::InvalidMode {
                mode: other.to_string(),
            }),
        }
    }
}

/// Software block-sparse multiply by gather, multiply and scatter.
///
/// For `SparseDense`, each stored block `(r, c)` gathers rows
/// `c*B_in..(c+1)*B_in` of `dense`, multiplies them by its tile and adds the
/// product into rows `r*B_out..(r+1)*B_out` of a zero accumulator. Blocks
/// sharing a row sum. `DenseSparse` is computed as
/// `(sparseᵀ @ denseᵀ)ᵀ`, which needs square tiles.
///
/// # Errors
///
/// - `SparseError::Layout` unless `sparse` has two block axes and two tile
///   axes.
/// - `SparseError::InvalidArgument` if `dense` is not rank 2.
/// - `SparseError::DimensionMismatch` if the inner sizes differ.
/// - `SparseError::Shape` for `DenseSparse` with non-square tiles.
///
/// # Example
///
/// ```
/// use blockcoo::DenseTensor;
/// use blockcoo::operations::{SpmmMode, block_coo_spmm_gs};
/// use blockcoo::sparse::BlockSparseMatrix;
///
/// let s = BlockSparseMatrix::new(
///     2, 1, 2,
///     &[0, 1],
///     &[0, 0],
///     vec![1.0, 0.0, 0.0, 1.0, 2.0, 0.0, 0.0, 2.0],
/// )
/// .unwrap();
/// let d = DenseTensor::ones(&[2, 1]);
///
/// let y = block_coo_spmm_gs(s.as_tensor(), &d, SpmmMode::SparseDense).unwrap();
/// assert_eq!(y.to_row_major(), vec![1.0, 1.0, 2.0, 2.0]);
/// ```
pub fn block_coo_spmm_gs<ElT: Scalar>(
    sparse: &BlockCooTensor<ElT>,
    dense: &DenseTensor<ElT>,
    mode: SpmmMode,
) -> SparseResult<DenseTensor<ElT>> {
    if sparse.sparse_dim() != 2 || sparse.dense_dim() != 2 {
        return Err(SparseError::Layout {
            sparse_dim: sparse.sparse_dim(),
            dense_dim: sparse.dense_dim(),
        });
    }
    dense.require_matrix("block_coo_spmm_gs")?;

    match mode {
        SpmmMode::SparseDense => gather_multiply_scatter(sparse, dense),
        SpmmMode::DenseSparse => {
            let sparse_t = block_coo_transpose(sparse)?;
            let dense_t = dense.transpose()?;
            gather_multiply_scatter(&sparse_t, &dense_t)?.transpose()
        }
    }
}

fn gather_multiply_scatter<ElT: Scalar>(
    sparse: &BlockCooTensor<ElT>,
    dense: &DenseTensor<ElT>,
) -> SparseResult<DenseTensor<ElT>> {
    let (blocks_out, blocks_in) = (sparse.grid()[0], sparse.grid()[1]);
    let (block_size_out, block_size_in) = (sparse.block_shape()[0], sparse.block_shape()[1]);
    let (elements_in, batch) = (dense.shape()[0], dense.shape()[1]);
    if elements_in != blocks_in * block_size_in {
        return Err(SparseError::DimensionMismatch {
            blocks: blocks_in,
            block_size: block_size_in,
            actual: elements_in,
        });
    }
    let elements_out = blocks_out * block_size_out;

    debug!(
        grid = ?sparse.grid(),
        block_shape = ?sparse.block_shape(),
        nnz_blocks = sparse.nnz_blocks(),
        batch,
        "gather-multiply-scatter spmm"
    );

    let mut out = DenseTensor::zeros(&[elements_out, batch]);
    if elements_out == 0 || batch == 0 {
        return Ok(out);
    }

    let rhs = dense.as_faer_mat(elements_in, batch);
    let mut acc = out.as_faer_mat_mut(elements_out, batch);
    for (block, tile) in sparse.iter_tiles() {
        let gathered = rhs.subrows(block[1] * block_size_in, block_size_in);
        let tile = tile_as_faer_mat(tile, block_size_out, block_size_in);
        // Scatter-accumulate into the block's output rows
        matmul(
            acc.as_mut().subrows_mut(block[0] * block_size_out, block_size_out),
            Accum::Add,
            tile,
            gathered,
            ElT::one(),
            Par::Seq,
        );
    }
    Ok(out)
}

/// Multiply with the accelerator when one is given and available, otherwise
/// with [`block_coo_spmm_gs`].
///
/// Accelerator failures are returned as-is; there is no fallback after a
/// failed dispatch.
pub fn block_coo_spmm<ElT: Scalar>(
    sparse: &BlockCooTensor<ElT>,
    dense: &DenseTensor<ElT>,
    mode: SpmmMode,
    accelerator: Option<&dyn SparseAccelerator<ElT>>,
) -> SparseResult<DenseTensor<ElT>> {
    match accelerator {
        Some(accel) if accel.is_available() => accelerator_spmm(accel, sparse, dense, mode),
        Some(accel) => {
            warn!(
                accelerator = accel.name(),
                "accelerator unavailable, using gather-multiply-scatter"
            );
            block_coo_spmm_gs(sparse, dense, mode)
        }
        None => block_coo_spmm_gs(sparse, dense, mode),
    }
}

/// Owns an optional accelerator and routes multiplies through
/// [`block_coo_spmm`].
///
/// # Example
///
/// ```
/// use blockcoo::DenseTensor;
/// use blockcoo::backend::ReferenceAccelerator;
/// use blockcoo::operations::{SpmmEngine, SpmmMode};
/// use blockcoo::sparse::BlockSparseMatrix;
///
/// let s = BlockSparseMatrix::new(1, 1, 2, &[0], &[0], vec![1.0, 0.0, 0.0, 1.0]).unwrap();
/// let d = DenseTensor::from_row_major(&[1.0, 2.0], &[2, 1]).unwrap();
///
/// let fallback = SpmmEngine::new();
/// let accelerated = SpmmEngine::with_accelerator(Box::new(ReferenceAccelerator::new()));
/// assert_eq!(
///     fallback.multiply(&s, &d, SpmmMode::SparseDense).unwrap(),
///     accelerated.multiply(&s, &d, SpmmMode::SparseDense).unwrap(),
/// );
/// ```
pub struct SpmmEngine<ElT: Scalar> {
    accelerator: Option<Box<dyn SparseAccelerator<ElT>>>,
}

impl<ElT: Scalar> SpmmEngine<ElT> {
    /// Engine that always uses the software path.
    pub fn new() -> Self {
        Self { accelerator: None }
    }

    pub fn with_accelerator(accelerator: Box<dyn SparseAccelerator<ElT>>) -> Self {
        Self {
            accelerator: Some(accelerator),
        }
    }

    /// Whether multiplies currently go to an accelerator.
    pub fn uses_accelerator(&self) -> bool {
        self.accelerator.as_ref().is_some_and(|a| a.is_available())
    }

    pub fn multiply(
        &self,
        sparse: &BlockSparseMatrix<ElT>,
        dense: &DenseTensor<ElT>,
        mode: SpmmMode,
    ) -> SparseResult<DenseTensor<ElT>> {
        block_coo_spmm(sparse.as_tensor(), dense, mode, self.accelerator.as_deref())
    }
}

impl<ElT: Scalar> Default for SpmmEngine<ElT> {
    fn default() -> Self {
        Self::new()
    }
}

impl<ElT: Scalar> fmt::Debug for SpmmEngine<ElT> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpmmEngine")
            .field("accelerator", &self.accelerator.as_ref().map(|a| a.name()))
            .finish()
    }
}
