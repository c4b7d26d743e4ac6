//! Magnitude pruning of dense matrices into block-sparse form.
//!
//! ```text
//! magnitude_prune(matrix, block_size, density, ord)
//!     → validate density, rank and divisibility
//!     → block_norms: one matrix norm per tile, row-major block order
//!     → stable sort by descending norm, keep the first floor(density * blocks)
//!     → BlockSparseMatrix with the original tiles (coalesced)
//! ```

use tracing::debug;

use crate::backend::tile_as_faer_mat;
use crate::config::PruneConfig;
use crate::error::{SparseError, SparseResult};
use crate::scalar::Scalar;
use crate::sparse::BlockSparseMatrix;
use crate::tensor::DenseTensor;

use super::convert::{block_grid, extract_tile};
use super::norm::{NormOrder, matrix_norm};

/// Norm of every `block_size × block_size` tile, in row-major block order.
///
/// # Errors
///
/// Same validation as [`magnitude_prune`] minus the density check.
pub fn block_norms<ElT: Scalar>(
    matrix: &DenseTensor<ElT>,
    block_size: usize,
    ord: NormOrder,
) -> SparseResult<Vec<f64>> {
    let (block_rows, block_cols) = block_grid(matrix, block_size)?;
    let mut norms = Vec::with_capacity(block_rows * block_cols);
    for r in 0..block_rows {
        for c in 0..block_cols {
            let tile = extract_tile(matrix, r, c, block_size);
            norms.push(matrix_norm(tile_as_faer_mat(&tile, block_size, block_size), ord)?);
        }
    }
    Ok(norms)
}

/// Keep the `floor(density * len / block_size²)` tiles of largest norm.
///
/// Equal norms are ranked by ascending row-major block position, so the
/// selection is deterministic. The returned matrix holds the selected tiles
/// unchanged at their original block coordinates.
///
/// # Errors
///
/// - `SparseError::InvalidArgument` if `density` is outside `(0, 1]`,
///   `block_size == 0`, `matrix` is not rank 2, or `matrix` holds a NaN or
///   infinite value. The last check runs before any norm is taken, so every
///   [`NormOrder`] rejects such input the same way.
/// - `SparseError::Shape` if a dimension is not a multiple of `block_size`.
///
/// # Example
///
/// ```
/// use blockcoo::DenseTensor;
/// use blockcoo::operations::{NormOrder, magnitude_prune};
///
/// let m = DenseTensor::from_row_major(
///     &[
///         1.0, 1.0, 0.1, 0.1,
///         1.0, 1.0, 0.1, 0.1,
///         0.5, 0.5, 9.0, 0.0,
///         0.5, 0.5, 0.0, 9.0,
///     ],
///     &[4, 4],
/// )
/// .unwrap();
///
/// let s = magnitude_prune(&m, 2, 0.5, NormOrder::Frobenius).unwrap();
/// assert_eq!(s.nnz_blocks(), 2);
/// assert_eq!(s.row_indices(), vec![0, 1]);
/// assert_eq!(s.col_indices(), vec![0, 1]);
/// ```
pub fn magnitude_prune<ElT: Scalar>(
    matrix: &DenseTensor<ElT>,
    block_size: usize,
    density: f64,
    ord: NormOrder,
) -> SparseResult<BlockSparseMatrix<ElT>> {
    if !(density > 0.0 && density <= 1.0) {
        return Err(SparseError::invalid_argument(format!(
            "density must be in (0, 1], got {}",
            density
        )));
    }
    let (block_rows, block_cols) = block_grid(matrix, block_size)?;
    if matrix.data().iter().any(|v| !v.to_f64().is_finite()) {
        return Err(SparseError::invalid_argument("matrix contains NaN or infinite values"));
    }
    let norms = block_norms(matrix, block_size, ord)?;

    let target =
        ((density * matrix.len() as f64) / (block_size * block_size) as f64).floor() as usize;
    let target = target.min(norms.len());

    let mut order: Vec<usize> = (0..norms.len()).collect();
    order.sort_by(|&a, &b| norms[b].total_cmp(&norms[a]));
    order.truncate(target);

    debug!(
        shape = ?matrix.shape(),
        block_size,
        density,
        ord = %ord,
        nnz_blocks = target,
        "magnitude prune"
    );

    let mut rows = Vec::with_capacity(target);
    let mut cols = Vec::with_capacity(target);
    let mut values = Vec::with_capacity(target * block_size * block_size);
    for flat in order {
        let (r, c) = (flat / block_cols, flat % block_cols);
        rows.push(r);
        cols.push(c);
        values.extend(extract_tile(matrix, r, c, block_size));
    }

    BlockSparseMatrix::new(block_rows, block_cols, block_size, &rows, &cols, values)
}

/// [`magnitude_prune`] with parameters from a validated [`PruneConfig`].
pub fn magnitude_prune_with<ElT: Scalar>(
    matrix: &DenseTensor<ElT>,
    config: &PruneConfig,
) -> SparseResult<BlockSparseMatrix<ElT>> {
    magnitude_prune(matrix, config.block_size, config.density, config.ord)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graded(n: usize) -> DenseTensor<f64> {
        // Block (r, c) of a 2x2 tiling is filled with r * grid + c + 1
        let grid = n / 2;
        DenseTensor::from_fn(&[n, n], |ix| ((ix[0] / 2) * grid + ix[1] / 2 + 1) as f64)
    }

    #[test]
    fn test_full_density_is_lossless() {
        let m = graded(6);
        let s = magnitude_prune(&m, 2, 1.0, NormOrder::Spectral).unwrap();
        assert_eq!(s.nnz_blocks(), 9);
        assert_eq!(s.to_dense().unwrap(), m);
    }

    #[test]
    fn test_selects_largest_blocks() {
        let m = graded(6);
        let s = magnitude_prune(&m, 2, 0.4, NormOrder::Frobenius).unwrap();
        // floor(0.4 * 36 / 4) = 3 blocks: values 9, 8, 7
        assert_eq!(s.nnz_blocks(), 3);
        assert_eq!(s.row_indices(), vec![2, 2, 2]);
        assert_eq!(s.col_indices(), vec![0, 1, 2]);
    }

    #[test]
    fn test_ties_prefer_lower_position() {
        let m = DenseTensor::<f64>::ones(&[4, 4]);
        let s = magnitude_prune(&m, 2, 0.5, NormOrder::MaxRowSum).unwrap();
        assert_eq!(s.row_indices(), vec![0, 0]);
        assert_eq!(s.col_indices(), vec![0, 1]);
    }

    #[test]
    fn test_small_density_rounds_down() {
        let m = graded(4);
        let s = magnitude_prune(&m, 2, 0.2, NormOrder::Spectral).unwrap();
        assert_eq!(s.nnz_blocks(), 0);
        assert_eq!(s.to_dense().unwrap(), DenseTensor::zeros(&[4, 4]));
    }

    #[test]
    fn test_invalid_density() {
        let m = graded(4);
        for density in [0.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                magnitude_prune(&m, 2, density, NormOrder::Spectral),
                Err(SparseError::InvalidArgument { .. })
            ));
        }
    }

    #[test]
    fn test_indivisible_shape() {
        let m = DenseTensor::<f64>::ones(&[4, 6]);
        assert!(matches!(
            magnitude_prune(&m, 4, 0.5, NormOrder::Spectral),
            Err(SparseError::Shape { .. })
        ));
    }

    #[test]
    fn test_block_norms_row_major() {
        let m = graded(4);
        let norms = block_norms(&m, 2, NormOrder::MaxColumnSum).unwrap();
        assert_eq!(norms, vec![2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_prune_with_config() {
        let config = PruneConfig {
            block_size: 2,
            density: 0.25,
            ord: NormOrder::Frobenius,
        };
        let s = magnitude_prune_with(&graded(4), &config).unwrap();
        assert_eq!(s.nnz_blocks(), 1);
        assert_eq!((s.row_indices()[0], s.col_indices()[0]), (1, 1));
    }
}
