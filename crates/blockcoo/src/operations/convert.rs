//! Conversion between block-COO and dense storage.

use crate::error::{SparseError, SparseResult};
use crate::scalar::Scalar;
use crate::sparse::{BlockCooTensor, BlockSparseMatrix};
use crate::tensor::{DenseTensor, cartesian_to_linear, linear_to_cartesian_into};

/// Expand a block-COO tensor into a dense tensor.
///
/// Tiles are scattered into a dense `grid ++ block_shape` tensor (zeros at
/// unlisted blocks), each block axis is interleaved with its tile axis, and
/// the result is reshaped to `grid[d] * block_shape[d]` per axis. Element
/// `block[d] * block_shape[d] + offset[d]` of axis `d` comes from `offset[d]`
/// of block `block[d]`.
///
/// # Errors
///
/// Returns `SparseError::ShapeMismatch` if the number of block axes differs
/// from the number of tile axes.
///
/// # Example
///
/// ```
/// use blockcoo::operations::block_coo_to_dense;
/// use blockcoo::sparse::{Block, BlockCooTensor};
///
/// let t = BlockCooTensor::new(
///     vec![2, 2],
///     vec![1, 2],
///     vec![Block::new(&[1, 0])],
///     vec![3.0, 4.0],
/// )
/// .unwrap();
/// let dense = block_coo_to_dense(&t).unwrap();
///
/// assert_eq!(dense.shape(), &[2, 4]);
/// assert_eq!(dense.to_row_major(), vec![0.0, 0.0, 0.0, 0.0, 3.0, 4.0, 0.0, 0.0]);
/// ```
pub fn block_coo_to_dense<ElT: Scalar>(
    tensor: &BlockCooTensor<ElT>,
) -> SparseResult<DenseTensor<ElT>> {
    let rank = tensor.sparse_dim();
    if rank != tensor.dense_dim() {
        return Err(SparseError::ShapeMismatch {
            sparse_dim: tensor.sparse_dim(),
            dense_dim: tensor.dense_dim(),
        });
    }

    let mut full = DenseTensor::zeros(&tensor.shape());
    let strides = full.strides().to_vec();
    let mut index = vec![0usize; 2 * rank];
    for (block, tile) in tensor.iter_tiles() {
        index[..rank].copy_from_slice(block.coords());
        for (offset, &value) in tile.iter().enumerate() {
            linear_to_cartesian_into(offset, tensor.block_shape(), &mut index[rank..]);
            full.data_mut()[cartesian_to_linear(&index, &strides)] = value;
        }
    }

    // Column-major merge puts the faster (tile) axis first in each pair.
    let perm: Vec<usize> = (0..rank).flat_map(|d| [rank + d, d]).collect();
    let dense_shape: Vec<usize> = tensor
        .grid()
        .iter()
        .zip(tensor.block_shape())
        .map(|(&g, &b)| g * b)
        .collect();
    full.permutedims(&perm)?.reshape(&dense_shape)
}

/// Split a dense matrix into `block_size × block_size` tiles, keeping every
/// tile with at least one non-zero entry.
///
/// # Errors
///
/// - `SparseError::InvalidArgument` for a non-matrix operand or
///   `block_size == 0`.
/// - `SparseError::Shape` if a dimension is not a multiple of `block_size`.
pub fn dense_to_block_coo<ElT: Scalar>(
    dense: &DenseTensor<ElT>,
    block_size: usize,
) -> SparseResult<BlockSparseMatrix<ElT>> {
    let (block_rows, block_cols) = block_grid(dense, block_size)?;

    let mut rows = Vec::new();
    let mut cols = Vec::new();
    let mut values = Vec::new();
    for r in 0..block_rows {
        for c in 0..block_cols {
            let tile = extract_tile(dense, r, c, block_size);
            if tile.iter().any(|&v| v != ElT::zero()) {
                rows.push(r);
                cols.push(c);
                values.extend(tile);
            }
        }
    }
    BlockSparseMatrix::new(block_rows, block_cols, block_size, &rows, &cols, values)
}

/// Validate a dense matrix against `block_size` and return its block grid.
pub(crate) fn block_grid<ElT: Scalar>(
    dense: &DenseTensor<ElT>,
    block_size: usize,
) -> SparseResult<(usize, usize)> {
    dense.require_matrix("block partitioning")?;
    if block_size == 0 {
        return Err(SparseError::invalid_argument("block_size must be positive"));
    }
    let (rows, cols) = (dense.shape()[0], dense.shape()[1]);
    if rows % block_size != 0 || cols % block_size != 0 {
        return Err(SparseError::shape(format!(
            "matrix shape ({}, {}) is not divisible by block size {}",
            rows, cols, block_size
        )));
    }
    Ok((rows / block_size, cols / block_size))
}

/// Copy block `(r, c)` of a dense matrix as a column-major tile.
pub(crate) fn extract_tile<ElT: Scalar>(
    dense: &DenseTensor<ElT>,
    r: usize,
    c: usize,
    block_size: usize,
) -> Vec<ElT> {
    let nrows = dense.shape()[0];
    let data = dense.data();
    let mut tile = Vec::with_capacity(block_size * block_size);
    for j in 0..block_size {
        let start = (c * block_size + j) * nrows + r * block_size;
        tile.extend_from_slice(&data[start..start + block_size]);
    }
    tile
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::Block;

    #[test]
    fn test_to_dense_identity_blocks() {
        let s = BlockSparseMatrix::new(
            2,
            1,
            2,
            &[0, 1],
            &[0, 0],
            vec![1.0, 0.0, 0.0, 1.0, 2.0, 0.0, 0.0, 2.0],
        )
        .unwrap();
        let dense = block_coo_to_dense(s.as_tensor()).unwrap();
        assert_eq!(dense.shape(), &[4, 2]);
        assert_eq!(
            dense.to_row_major(),
            vec![1.0, 0.0, 0.0, 1.0, 2.0, 0.0, 0.0, 2.0]
        );
    }

    #[test]
    fn test_to_dense_offsets() {
        // 3x2 grid of 2x2 tiles, one block at (2, 1)
        let tile = vec![1.0, 2.0, 3.0, 4.0];
        let t =
            BlockCooTensor::new(vec![3, 2], vec![2, 2], vec![Block::new(&[2, 1])], tile).unwrap();
        let dense = block_coo_to_dense(&t).unwrap();
        assert_eq!(dense.shape(), &[6, 4]);
        assert_eq!(dense.get(&[4, 2]), Some(&1.0));
        assert_eq!(dense.get(&[5, 2]), Some(&2.0));
        assert_eq!(dense.get(&[4, 3]), Some(&3.0));
        assert_eq!(dense.get(&[5, 3]), Some(&4.0));
        let nonzero = dense.data().iter().filter(|&&v| v != 0.0).count();
        assert_eq!(nonzero, 4);
    }

    #[test]
    fn test_to_dense_rank_three() {
        let t = BlockCooTensor::new(
            vec![2, 1, 2],
            vec![1, 2, 1],
            vec![Block::new(&[1, 0, 1])],
            vec![8.0, 9.0],
        )
        .unwrap();
        let dense = block_coo_to_dense(&t).unwrap();
        assert_eq!(dense.shape(), &[2, 2, 2]);
        assert_eq!(dense.get(&[1, 0, 1]), Some(&8.0));
        assert_eq!(dense.get(&[1, 1, 1]), Some(&9.0));
    }

    #[test]
    fn test_to_dense_shape_mismatch() {
        let t = BlockCooTensor::<f64>::empty(vec![2, 2], vec![4]);
        assert!(matches!(
            block_coo_to_dense(&t),
            Err(SparseError::ShapeMismatch {
                sparse_dim: 2,
                dense_dim: 1
            })
        ));
    }

    #[test]
    fn test_dense_to_block_coo_drops_zero_blocks() {
        let mut dense = DenseTensor::<f64>::zeros(&[4, 4]);
        dense.set(&[0, 3], 1.0).unwrap();
        dense.set(&[3, 0], 2.0).unwrap();
        let s = dense_to_block_coo(&dense, 2).unwrap();
        assert_eq!(s.row_indices(), vec![0, 1]);
        assert_eq!(s.col_indices(), vec![1, 0]);
        assert_eq!(s.to_dense().unwrap(), dense);
    }

    #[test]
    fn test_block_grid_errors() {
        let dense = DenseTensor::<f64>::zeros(&[4, 6]);
        assert!(matches!(block_grid(&dense, 4), Err(SparseError::Shape { .. })));
        assert!(matches!(
            block_grid(&dense, 0),
            Err(SparseError::InvalidArgument { .. })
        ));
        assert_eq!(block_grid(&dense, 2).unwrap(), (2, 3));
    }

    #[test]
    fn test_extract_tile() {
        let dense = DenseTensor::<f64>::from_fn(&[4, 4], |ix| (ix[0] * 10 + ix[1]) as f64);
        assert_eq!(extract_tile(&dense, 1, 0, 2), vec![20.0, 30.0, 21.0, 31.0]);
    }
}
