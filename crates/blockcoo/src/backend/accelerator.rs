//! Accelerator boundary for block-sparse multiplies.
//!
//! A hardware sparse-dense multiply is reached through a custom operator: a
//! named op plus an attribute set describing the sparse operand, applied to
//! one dense input. [`CustomOpRequest`] is that attribute set,
//! [`SparseAccelerator`] is the device that executes it.
//!
//! ```text
//! accelerator_spmm(accel, sparse, dense, mode)
//!     → CustomOpRequest::static_sparse: validate, build attributes
//!     → accel.execute(request, dense)      (errors pass through unchanged)
//!     → check output shape
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};

use faer::linalg::matmul::matmul;
use faer::{Accum, Mat, Par};
use tracing::debug;

use crate::backend::AsFaerMat;
use crate::error::{AcceleratorError, SparseError, SparseResult};
use crate::operations::SpmmMode;
use crate::scalar::Scalar;
use crate::sparse::BlockCooTensor;
use crate::tensor::DenseTensor;

/// Operator name of the static sparse matmul.
pub const STATIC_SPARSE_OP: &str = "StaticSparseMatmul";
/// Operator name of the dynamic sparse matmul.
pub const DYNAMIC_SPARSE_OP: &str = "StaticDynSparse";
/// Custom operator domain.
pub const CUSTOM_OP_DOMAIN: &str = "ai.graphcore";
/// Custom operator domain version.
pub const CUSTOM_OP_VERSION: u32 = 1;

/// Unit of the `rows` / `cols` attributes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexUnit {
    /// Index of the first element of the block (`block * block_size`).
    Element,
    /// Block index.
    Block,
}

/// Attributes of one custom sparse-matmul operator call.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomOpRequest<ElT: Scalar> {
    pub name: &'static str,
    pub domain: &'static str,
    pub version: u32,
    pub mode: SpmmMode,
    /// Dense row count of the sparse operand.
    pub n_rows: usize,
    /// Dense column count of the sparse operand.
    pub n_cols: usize,
    pub block_size: usize,
    pub index_unit: IndexUnit,
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
    /// Tile values, each tile flattened row-major, in block order.
    pub values: Vec<ElT>,
    /// Shape the result must have.
    pub output_shape: [usize; 2],
}

impl<ElT: Scalar> CustomOpRequest<ElT> {
    /// Request for the static sparse matmul, with element indices.
    ///
    /// # Errors
    ///
    /// - `SparseError::Layout` unless `sparse` has two block axes and two
    ///   tile axes.
    /// - `SparseError::Shape` for non-square tiles.
    /// - `SparseError::InvalidArgument` if `dense` is not rank 2.
    /// - `SparseError::DimensionMismatch` if the inner sizes differ.
    pub fn static_sparse(
        sparse: &BlockCooTensor<ElT>,
        dense: &DenseTensor<ElT>,
        mode: SpmmMode,
    ) -> SparseResult<Self> {
        let block_size = validate_operands(sparse, dense, "static sparse matmul")?;
        let (block_rows, block_cols) = (sparse.grid()[0], sparse.grid()[1]);
        let (n_rows, n_cols) = (block_rows * block_size, block_cols * block_size);

        let (blocks_in, elements_in, actual) = match mode {
            SpmmMode::SparseDense => (block_cols, n_cols, dense.shape()[0]),
            SpmmMode::DenseSparse => (block_rows, n_rows, dense.shape()[1]),
        };
        if actual != elements_in {
            return Err(SparseError::DimensionMismatch {
                blocks: blocks_in,
                block_size,
                actual,
            });
        }

        Ok(Self {
            name: STATIC_SPARSE_OP,
            domain: CUSTOM_OP_DOMAIN,
            version: CUSTOM_OP_VERSION,
            mode,
            n_rows,
            n_cols,
            block_size,
            index_unit: IndexUnit::Element,
            rows: sparse.indices(0).iter().map(|&r| r * block_size).collect(),
            cols: sparse.indices(1).iter().map(|&c| c * block_size).collect(),
            values: row_major_tiles(sparse),
            output_shape: mode.output_shape((n_rows, n_cols), dense.shape()),
        })
    }

    /// Request for the dynamic sparse matmul: `sparse @ dense` only, with
    /// block indices.
    ///
    /// # Errors
    ///
    /// As [`CustomOpRequest::static_sparse`]; the size check requires
    /// `dense` rows to equal `n_cols`.
    pub fn dynamic_sparse(
        sparse: &BlockCooTensor<ElT>,
        dense: &DenseTensor<ElT>,
    ) -> SparseResult<Self> {
        let block_size = validate_operands(sparse, dense, "dynamic sparse matmul")?;
        let (block_rows, block_cols) = (sparse.grid()[0], sparse.grid()[1]);
        let (n_rows, n_cols) = (block_rows * block_size, block_cols * block_size);
        if dense.shape()[0] != n_cols {
            return Err(SparseError::DimensionMismatch {
                blocks: block_cols,
                block_size,
                actual: dense.shape()[0],
            });
        }

        Ok(Self {
            name: DYNAMIC_SPARSE_OP,
            domain: CUSTOM_OP_DOMAIN,
            version: CUSTOM_OP_VERSION,
            mode: SpmmMode::SparseDense,
            n_rows,
            n_cols,
            block_size,
            index_unit: IndexUnit::Block,
            rows: sparse.indices(0),
            cols: sparse.indices(1),
            values: row_major_tiles(sparse),
            output_shape: [n_rows, dense.shape()[1]],
        })
    }

    #[inline]
    pub fn nnz_blocks(&self) -> usize {
        self.rows.len()
    }

    /// Block coordinates `(row, col)` of the `k`-th block.
    pub fn block_coords(&self, k: usize) -> (usize, usize) {
        match self.index_unit {
            IndexUnit::Element => (self.rows[k] / self.block_size, self.cols[k] / self.block_size),
            IndexUnit::Block => (self.rows[k], self.cols[k]),
        }
    }

    /// Row-major values of the `k`-th tile.
    pub fn tile(&self, k: usize) -> &[ElT] {
        let len = self.block_size * self.block_size;
        &self.values[k * len..(k + 1) * len]
    }
}

/// Shared precondition checks; returns the block size.
fn validate_operands<ElT: Scalar>(
    sparse: &BlockCooTensor<ElT>,
    dense: &DenseTensor<ElT>,
    op: &str,
) -> SparseResult<usize> {
    if sparse.sparse_dim() != 2 || sparse.dense_dim() != 2 {
        return Err(SparseError::Layout {
            sparse_dim: sparse.sparse_dim(),
            dense_dim: sparse.dense_dim(),
        });
    }
    let (bs_row, bs_col) = (sparse.block_shape()[0], sparse.block_shape()[1]);
    if bs_row != bs_col {
        return Err(SparseError::shape(format!(
            "{} requires square blocks i.e. shape (*, *, B, B), actual: {:?}",
            op,
            sparse.shape()
        )));
    }
    dense.require_matrix(op)?;
    Ok(bs_row)
}

/// Flatten every column-major tile to row-major order.
fn row_major_tiles<ElT: Scalar>(sparse: &BlockCooTensor<ElT>) -> Vec<ElT> {
    let bs = sparse.block_shape()[0];
    let mut values = Vec::with_capacity(sparse.values().len());
    for (_, tile) in sparse.iter_tiles() {
        for i in 0..bs {
            values.extend((0..bs).map(|j| tile[i + j * bs]));
        }
    }
    values
}

/// A device able to run the custom sparse-matmul operator.
///
/// Implementations wrap a vendor runtime; the crate only defines the
/// request contract. Results must have `request.output_shape`.
pub trait SparseAccelerator<ElT: Scalar>: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        "accelerator"
    }

    /// Whether the device can take work right now.
    fn is_available(&self) -> bool;

    /// Run the operator on `dense`.
    fn execute(
        &self,
        request: &CustomOpRequest<ElT>,
        dense: &DenseTensor<ElT>,
    ) -> Result<DenseTensor<ElT>, AcceleratorError>;
}

/// Validate, dispatch the static sparse matmul to `accel`, and check the
/// result shape.
///
/// # Errors
///
/// The validation errors of [`CustomOpRequest::static_sparse`],
/// `SparseError::Accelerator` carrying the device error unchanged, and
/// `SparseError::OutputShape` if the device returns the wrong shape.
pub fn accelerator_spmm<ElT: Scalar, A: SparseAccelerator<ElT> + ?Sized>(
    accel: &A,
    sparse: &BlockCooTensor<ElT>,
    dense: &DenseTensor<ElT>,
    mode: SpmmMode,
) -> SparseResult<DenseTensor<ElT>> {
    let request = CustomOpRequest::static_sparse(sparse, dense, mode)?;
    dispatch(accel, &request, dense)
}

/// Validate and dispatch the dynamic sparse matmul (`sparse @ dense`).
pub fn dynamic_spmm<ElT: Scalar, A: SparseAccelerator<ElT> + ?Sized>(
    accel: &A,
    sparse: &BlockCooTensor<ElT>,
    dense: &DenseTensor<ElT>,
) -> SparseResult<DenseTensor<ElT>> {
    let request = CustomOpRequest::dynamic_sparse(sparse, dense)?;
    dispatch(accel, &request, dense)
}

fn dispatch<ElT: Scalar, A: SparseAccelerator<ElT> + ?Sized>(
    accel: &A,
    request: &CustomOpRequest<ElT>,
    dense: &DenseTensor<ElT>,
) -> SparseResult<DenseTensor<ElT>> {
    debug!(
        accelerator = accel.name(),
        op = request.name,
        mode = %request.mode,
        n_rows = request.n_rows,
        n_cols = request.n_cols,
        block_size = request.block_size,
        nnz_blocks = request.nnz_blocks(),
        "dispatching custom op"
    );
    let out = accel.execute(request, dense).map_err(SparseError::Accelerator)?;
    if out.shape() != request.output_shape {
        return Err(SparseError::OutputShape {
            expected: request.output_shape.to_vec(),
            actual: out.shape().to_vec(),
        });
    }
    Ok(out)
}

/// Software implementation of the custom-op contract.
///
/// Computes the product from the request attributes alone, so it checks the
/// request encoding as well as the arithmetic. Counts executed requests.
#[derive(Debug)]
pub struct ReferenceAccelerator {
    available: bool,
    calls: AtomicUsize,
}

impl ReferenceAccelerator {
    pub fn new() -> Self {
        Self {
            available: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// An accelerator that reports itself unavailable.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of requests executed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Default for ReferenceAccelerator {
    fn default() -> Self {
        Self::new()
    }
}

impl<ElT: Scalar> SparseAccelerator<ElT> for ReferenceAccelerator {
    fn name(&self) -> &str {
        "reference"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn execute(
        &self,
        request: &CustomOpRequest<ElT>,
        dense: &DenseTensor<ElT>,
    ) -> Result<DenseTensor<ElT>, AcceleratorError> {
        if !self.available {
            return Err("reference accelerator is not available".into());
        }
        let bs = request.block_size;
        if request.values.len() != request.nnz_blocks() * bs * bs
            || request.cols.len() != request.rows.len()
        {
            return Err(format!(
                "malformed request: {} rows, {} cols, {} values for block size {}",
                request.rows.len(),
                request.cols.len(),
                request.values.len(),
                bs
            )
            .into());
        }
        self.calls.fetch_add(1, Ordering::Relaxed);

        let [out_rows, out_cols] = request.output_shape;
        let mut out = DenseTensor::zeros(&[out_rows, out_cols]);
        if out.is_empty() {
            return Ok(out);
        }
        let (d_rows, d_cols) = (dense.shape()[0], dense.shape()[1]);
        let rhs = dense.as_faer_mat(d_rows, d_cols);
        let mut acc = out.as_faer_mat_mut(out_rows, out_cols);
        for k in 0..request.nnz_blocks() {
            let (r, c) = request.block_coords(k);
            let values = request.tile(k);
            let tile = Mat::from_fn(bs, bs, |i, j| values[i * bs + j]);
            match request.mode {
                SpmmMode::SparseDense => matmul(
                    acc.as_mut().subrows_mut(r * bs, bs),
                    Accum::Add,
                    tile.as_ref(),
                    rhs.subrows(c * bs, bs),
                    ElT::one(),
                    Par::Seq,
                ),
                SpmmMode::DenseSparse => matmul(
                    acc.as_mut().subcols_mut(c * bs, bs),
                    Accum::Add,
                    rhs.subcols(r * bs, bs),
                    tile.as_ref(),
                    ElT::one(),
                    Par::Seq,
                ),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::{Block, BlockSparseMatrix};

    fn sample() -> BlockSparseMatrix<f64> {
        // Tile at (1, 0) is [[1, 2], [3, 4]]
        BlockSparseMatrix::new(2, 3, 2, &[1], &[0], vec![1.0, 3.0, 2.0, 4.0]).unwrap()
    }

    #[test]
    fn test_static_request_attributes() {
        let s = sample();
        let d = DenseTensor::zeros(&[6, 5]);
        let req = CustomOpRequest::static_sparse(s.as_tensor(), &d, SpmmMode::SparseDense).unwrap();
        assert_eq!(req.name, "StaticSparseMatmul");
        assert_eq!(req.domain, "ai.graphcore");
        assert_eq!(req.version, 1);
        assert_eq!((req.n_rows, req.n_cols, req.block_size), (4, 6, 2));
        assert_eq!(req.rows, vec![2]);
        assert_eq!(req.cols, vec![0]);
        assert_eq!(req.values, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(req.output_shape, [4, 5]);
        assert_eq!(req.block_coords(0), (1, 0));
    }

    #[test]
    fn test_dense_sparse_request_shape() {
        let s = sample();
        let d = DenseTensor::zeros(&[7, 4]);
        let req = CustomOpRequest::static_sparse(s.as_tensor(), &d, SpmmMode::DenseSparse).unwrap();
        assert_eq!(req.output_shape, [7, 6]);

        let bad = DenseTensor::zeros(&[7, 6]);
        assert!(matches!(
            CustomOpRequest::static_sparse(s.as_tensor(), &bad, SpmmMode::DenseSparse),
            Err(SparseError::DimensionMismatch {
                blocks: 2,
                block_size: 2,
                actual: 6
            })
        ));
    }

    #[test]
    fn test_dynamic_request_uses_block_indices() {
        let s = sample();
        let d = DenseTensor::zeros(&[6, 1]);
        let req = CustomOpRequest::dynamic_sparse(s.as_tensor(), &d).unwrap();
        assert_eq!(req.name, "StaticDynSparse");
        assert_eq!(req.index_unit, IndexUnit::Block);
        assert_eq!(req.rows, vec![1]);
        assert_eq!(req.output_shape, [4, 1]);
        let short = DenseTensor::zeros(&[4, 1]);
        assert!(CustomOpRequest::dynamic_sparse(s.as_tensor(), &short).is_err());
    }

    #[test]
    fn test_validation_order() {
        let rect = BlockCooTensor::<f64>::empty(vec![2, 2], vec![3, 5]);
        let d = DenseTensor::zeros(&[3]);
        // Non-square blocks are reported before the dense operand rank
        assert!(matches!(
            CustomOpRequest::static_sparse(&rect, &d, SpmmMode::SparseDense),
            Err(SparseError::Shape { .. })
        ));

        let hybrid = BlockCooTensor::<f64>::empty(vec![2], vec![2, 2]);
        assert!(matches!(
            CustomOpRequest::static_sparse(&hybrid, &d, SpmmMode::SparseDense),
            Err(SparseError::Layout { .. })
        ));

        let s = sample();
        assert!(matches!(
            CustomOpRequest::static_sparse(s.as_tensor(), &d, SpmmMode::SparseDense),
            Err(SparseError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_reference_sparse_dense() {
        let s = sample();
        let d = DenseTensor::<f64>::from_fn(&[6, 2], |ix| (ix[0] * 2 + ix[1]) as f64);
        let accel = ReferenceAccelerator::new();
        let y = accelerator_spmm(&accel, s.as_tensor(), &d, SpmmMode::SparseDense).unwrap();
        let expected = s.to_dense().unwrap().matmul(&d).unwrap();
        assert!(y.approx_eq(&expected, 1e-12, 0.0));
        assert_eq!(accel.calls(), 1);
    }

    #[test]
    fn test_reference_dense_sparse() {
        let t = BlockCooTensor::new(
            vec![2, 3],
            vec![2, 2],
            vec![Block::new(&[0, 2]), Block::new(&[1, 1])],
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
        )
        .unwrap();
        let d = DenseTensor::<f64>::from_fn(&[3, 4], |ix| (ix[0] + 3 * ix[1]) as f64);
        let y =
            accelerator_spmm(&ReferenceAccelerator::new(), &t, &d, SpmmMode::DenseSparse).unwrap();
        let expected = d.matmul(&t.to_dense().unwrap()).unwrap();
        assert!(y.approx_eq(&expected, 1e-12, 0.0));
    }

    struct WrongShape;

    impl SparseAccelerator<f64> for WrongShape {
        fn is_available(&self) -> bool {
            true
        }

        fn execute(
            &self,
            _request: &CustomOpRequest<f64>,
            _dense: &DenseTensor<f64>,
        ) -> Result<DenseTensor<f64>, AcceleratorError> {
            Ok(DenseTensor::zeros(&[1, 1]))
        }
    }

    #[test]
    fn test_output_shape_checked() {
        let s = sample();
        let d = DenseTensor::zeros(&[6, 3]);
        assert!(matches!(
            accelerator_spmm(&WrongShape, s.as_tensor(), &d, SpmmMode::SparseDense),
            Err(SparseError::OutputShape { .. })
        ));
    }

    #[test]
    fn test_unavailable_reference_fails() {
        let s = sample();
        let d = DenseTensor::zeros(&[6, 1]);
        let accel = ReferenceAccelerator::unavailable();
        let err =
            accelerator_spmm(&accel, s.as_tensor(), &d, SpmmMode::SparseDense).unwrap_err();
        assert!(matches!(err, SparseError::Accelerator(_)));
        assert_eq!(err.to_string(), "reference accelerator is not available");
    }
}
