//! Random dense tensors and random block-sparse patterns.

use rand::Rng;
use rand::distr::{Distribution, StandardUniform};
use rand::seq::index;
use rand_distr::StandardNormal;

use crate::error::{SparseError, SparseResult};
use crate::scalar::Scalar;
use crate::sparse::BlockSparseMatrix;
use crate::tensor::DenseTensor;

/// Scalars that can be drawn from the uniform and standard normal
/// distributions.
pub trait RandomScalar: Scalar {
    /// Sample from the uniform distribution on `[0, 1)`.
    fn sample_uniform<R: Rng + ?Sized>(rng: &mut R) -> Self;

    /// Sample from the standard normal distribution.
    fn sample_normal<R: Rng + ?Sized>(rng: &mut R) -> Self;
}

impl RandomScalar for f64 {
    fn sample_uniform<R: Rng + ?Sized>(rng: &mut R) -> Self {
        StandardUniform.sample(rng)
    }

    fn sample_normal<R: Rng + ?Sized>(rng: &mut R) -> Self {
        StandardNormal.sample(rng)
    }
}

impl RandomScalar for f32 {
    fn sample_uniform<R: Rng + ?Sized>(rng: &mut R) -> Self {
        StandardUniform.sample(rng)
    }

    fn sample_normal<R: Rng + ?Sized>(rng: &mut R) -> Self {
        StandardNormal.sample(rng)
    }
}

impl<ElT: RandomScalar> DenseTensor<ElT> {
    /// Create a tensor with uniform random values in `[0, 1)`.
    pub fn random(shape: &[usize]) -> Self {
        Self::random_with_rng(shape, &mut rand::rng())
    }

    /// Create a tensor with uniform random values using a specific RNG.
    ///
    /// # Example
    ///
    /// ```
    /// use blockcoo::DenseTensor;
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    ///
    /// let mut rng = StdRng::seed_from_u64(42);
    /// let t1: DenseTensor<f64> = DenseTensor::random_with_rng(&[2, 3], &mut rng);
    ///
    /// let mut rng = StdRng::seed_from_u64(42);
    /// let t2: DenseTensor<f64> = DenseTensor::random_with_rng(&[2, 3], &mut rng);
    ///
    /// assert_eq!(t1.data(), t2.data());
    /// ```
    pub fn random_with_rng<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Self {
        Self::from_fn(shape, |_| ElT::sample_uniform(rng))
    }

    /// Create a tensor with standard normal random values.
    pub fn randn(shape: &[usize]) -> Self {
        Self::randn_with_rng(shape, &mut rand::rng())
    }

    /// Create a tensor with standard normal random values using a specific RNG.
    pub fn randn_with_rng<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Self {
        Self::from_fn(shape, |_| ElT::sample_normal(rng))
    }
}

/// A block-sparse matrix with `nnz_blocks` distinct blocks chosen uniformly
/// from the grid and standard normal tile values.
///
/// # Errors
///
/// Returns `SparseError::InvalidArgument` if `nnz_blocks` exceeds the number
/// of grid blocks or `block_size == 0`.
///
/// # Example
///
/// ```
/// use blockcoo::random::random_block_sparse;
/// use rand::SeedableRng;
/// use rand::rngs::StdRng;
///
/// let mut rng = StdRng::seed_from_u64(7);
/// let s = random_block_sparse::<f32, _>(4, 6, 8, 5, &mut rng).unwrap();
/// assert_eq!(s.nnz_blocks(), 5);
/// assert_eq!(s.dense_shape(), (32, 48));
/// ```
pub fn random_block_sparse<ElT: RandomScalar, R: Rng + ?Sized>(
    block_rows: usize,
    block_cols: usize,
    block_size: usize,
    nnz_blocks: usize,
    rng: &mut R,
) -> SparseResult<BlockSparseMatrix<ElT>> {
    let total = block_rows * block_cols;
    if nnz_blocks > total {
        return Err(SparseError::invalid_argument(format!(
            "cannot place {} blocks in a {}x{} grid",
            nnz_blocks, block_rows, block_cols
        )));
    }
    let positions = index::sample(rng, total, nnz_blocks).into_vec();
    let rows: Vec<usize> = positions.iter().map(|&p| p / block_cols).collect();
    let cols: Vec<usize> = positions.iter().map(|&p| p % block_cols).collect();
    let values = (0..nnz_blocks * block_size * block_size)
        .map(|_| ElT::sample_normal(rng))
        .collect();
    BlockSparseMatrix::new(block_rows, block_cols, block_size, &rows, &cols, values)
}
