//! Convenience wrappers over block-sparse multiplication.

use std::ops::Mul;
use std::sync::Arc;

use crate::config::PruneConfig;
use crate::error::SparseResult;
use crate::operations::{SpmmEngine, SpmmMode, magnitude_prune_with};
use crate::scalar::Scalar;
use crate::sparse::BlockSparseMatrix;
use crate::tensor::DenseTensor;

/// A block-sparse matrix bound to an [`SpmmEngine`].
///
/// `matmul` computes `self @ rhs`, `rmatmul` computes `lhs @ self`.
/// `&matrix * &dense` is the same as `matrix.matmul(&dense)`.
///
/// # Example
///
/// ```
/// use blockcoo::DenseTensor;
/// use blockcoo::linear::StaticSparseMatrix;
/// use blockcoo::sparse::BlockSparseMatrix;
///
/// let s = BlockSparseMatrix::new(1, 2, 1, &[0], &[1], vec![3.0]).unwrap();
/// let m = StaticSparseMatrix::new(s);
///
/// let x = DenseTensor::from_row_major(&[1.0, 2.0], &[2, 1]).unwrap();
/// assert_eq!((&m * &x).unwrap().data(), &[6.0]);
///
/// let lhs = DenseTensor::from_row_major(&[5.0], &[1, 1]).unwrap();
/// assert_eq!(m.rmatmul(&lhs).unwrap().to_row_major(), vec![0.0, 15.0]);
/// ```
#[derive(Debug, Clone)]
pub struct StaticSparseMatrix<ElT: Scalar> {
    matrix: BlockSparseMatrix<ElT>,
    engine: Arc<SpmmEngine<ElT>>,
}

impl<ElT: Scalar> StaticSparseMatrix<ElT> {
    /// Wrap `matrix` with a software-only engine.
    pub fn new(matrix: BlockSparseMatrix<ElT>) -> Self {
        Self::with_engine(matrix, Arc::new(SpmmEngine::new()))
    }

    pub fn with_engine(matrix: BlockSparseMatrix<ElT>, engine: Arc<SpmmEngine<ElT>>) -> Self {
        Self { matrix, engine }
    }

    #[inline]
    pub fn matrix(&self) -> &BlockSparseMatrix<ElT> {
        &self.matrix
    }

    #[inline]
    pub fn engine(&self) -> &Arc<SpmmEngine<ElT>> {
        &self.engine
    }

    /// Dense shape `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        self.matrix.dense_shape()
    }

    /// `self @ rhs`
    pub fn matmul(&self, rhs: &DenseTensor<ElT>) -> SparseResult<DenseTensor<ElT>> {
        self.engine.multiply(&self.matrix, rhs, SpmmMode::SparseDense)
    }

    /// `lhs @ self`
    pub fn rmatmul(&self, lhs: &DenseTensor<ElT>) -> SparseResult<DenseTensor<ElT>> {
        self.engine.multiply(&self.matrix, lhs, SpmmMode::DenseSparse)
    }
}

impl<ElT: Scalar> Mul<&DenseTensor<ElT>> for &StaticSparseMatrix<ElT> {
    type Output = SparseResult<DenseTensor<ElT>>;

    fn mul(self, rhs: &DenseTensor<ElT>) -> Self::Output {
        self.matmul(rhs)
    }
}

/// A linear layer with a frozen block-sparse weight of shape
/// `(out_features, in_features)` and no bias.
#[derive(Debug, Clone)]
pub struct StaticSparseLinear<ElT: Scalar> {
    weight: StaticSparseMatrix<ElT>,
}

impl<ElT: Scalar> StaticSparseLinear<ElT> {
    pub fn new(weight: StaticSparseMatrix<ElT>) -> Self {
        Self { weight }
    }

    /// Prune a dense `(out_features, in_features)` weight and wrap it.
    pub fn from_dense(
        weight: &DenseTensor<ElT>,
        config: &PruneConfig,
        engine: Arc<SpmmEngine<ElT>>,
    ) -> SparseResult<Self> {
        let sparse = magnitude_prune_with(weight, config)?;
        Ok(Self::new(StaticSparseMatrix::with_engine(sparse, engine)))
    }

    #[inline]
    pub fn weight(&self) -> &StaticSparseMatrix<ElT> {
        &self.weight
    }

    pub fn in_features(&self) -> usize {
        self.weight.shape().1
    }

    pub fn out_features(&self) -> usize {
        self.weight.shape().0
    }

    /// `(W @ xᵀ)ᵀ` for `x` of shape `(batch, in_features)`.
    ///
    /// # Errors
    ///
    /// Returns `SparseError::InvalidArgument` if `x` is not rank 2 and
    /// `SparseError::DimensionMismatch` if its width is not `in_features`.
    pub fn forward(&self, x: &DenseTensor<ElT>) -> SparseResult<DenseTensor<ElT>> {
        x.require_matrix("StaticSparseLinear::forward")?;
        self.weight.matmul(&x.transpose()?)?.transpose()
    }
}
