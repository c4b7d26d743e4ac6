//! Block transpose.

use crate::error::{SparseError, SparseResult};
use crate::scalar::Scalar;
use crate::sparse::BlockCooTensor;

/// Transpose a block-COO matrix.
///
/// Block `(r, c)` with tile `T` becomes block `(c, r)` with tile `Tᵀ` in a
/// `(C, R)` grid. The result is re-coalesced, since swapping coordinates
/// changes the canonical order.
///
/// # Errors
///
/// Returns `SparseError::Shape` unless the tensor has two block axes, two
/// tile axes and square tiles.
///
/// # Example
///
/// ```
/// use blockcoo::operations::block_coo_transpose;
/// use blockcoo::sparse::{Block, BlockCooTensor};
///
/// let t = BlockCooTensor::new(
///     vec![2, 3],
///     vec![2, 2],
///     vec![Block::new(&[0, 2])],
///     vec![1.0, 2.0, 3.0, 4.0],
/// )
/// .unwrap();
/// let tt = block_coo_transpose(&t).unwrap();
///
/// assert_eq!(tt.grid(), &[3, 2]);
/// assert_eq!(tt.blocks()[0], Block::new(&[2, 0]));
/// assert_eq!(tt.tile(0), &[1.0, 3.0, 2.0, 4.0]);
/// ```
pub fn block_coo_transpose<ElT: Scalar>(
    tensor: &BlockCooTensor<ElT>,
) -> SparseResult<BlockCooTensor<ElT>> {
    if tensor.sparse_dim() != 2 || tensor.dense_dim() != 2 {
        return Err(SparseError::shape(format!(
            "block transpose needs 2 block axes and 2 tile axes, got shape {:?}",
            tensor.shape()
        )));
    }
    let (rows, cols) = (tensor.block_shape()[0], tensor.block_shape()[1]);
    if rows != cols {
        return Err(SparseError::shape(format!(
            "block transpose needs square tiles, got {}x{}",
            rows, cols
        )));
    }

    let mut blocks = Vec::with_capacity(tensor.nnz_blocks());
    let mut values = Vec::with_capacity(tensor.values().len());
    for (block, tile) in tensor.iter_tiles() {
        blocks.push(block.permute(&[1, 0]));
        // Column-major (i, j) -> (j, i)
        for i in 0..rows {
            for j in 0..cols {
                values.push(tile[i + j * rows]);
            }
        }
    }

    let grid = vec![tensor.grid()[1], tensor.grid()[0]];
    BlockCooTensor::new(grid, vec![cols, rows], blocks, values)
}
