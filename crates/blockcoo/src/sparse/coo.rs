//! Hybrid block-COO tensor.

use crate::error::{SparseError, SparseResult};
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

use super::block::Block;

/// A coalesced block-COO tensor.
///
/// The tensor has `sparse_dim` block axes (the block grid) and `dense_dim`
/// value axes (the shape of every stored tile). Only listed blocks are
/// stored; every other block is implicitly zero.
///
/// Tiles are stored back to back in one flat buffer, tile `k` belonging to
/// `blocks()[k]`, each tile column-major over `block_shape`. Blocks are kept
/// in lexicographic order without duplicates.
///
/// # Example
///
/// ```
/// use blockcoo::sparse::{Block, BlockCooTensor};
///
/// // 2x3 grid of 2x2 tiles, blocks (1, 2) and (0, 0)
/// let t = BlockCooTensor::new(
///     vec![2, 3],
///     vec![2, 2],
///     vec![Block::new(&[1, 2]), Block::new(&[0, 0])],
///     vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0],
/// )
/// .unwrap();
///
/// assert_eq!(t.shape(), vec![2, 3, 2, 2]);
/// assert_eq!(t.nnz_blocks(), 2);
/// // Coalesced: (0, 0) now comes first
/// assert_eq!(t.blocks()[0], Block::new(&[0, 0]));
/// assert_eq!(t.tile(0), &[2.0, 2.0, 2.0, 2.0]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct BlockCooTensor<ElT: Scalar> {
    grid: Vec<usize>,
    block_shape: Vec<usize>,
    blocks: Vec<Block>,
    values: Vec<ElT>,
}

impl<ElT: Scalar> BlockCooTensor<ElT> {
    /// Build a tensor from block coordinates and their tiles, coalescing.
    ///
    /// Duplicate coordinates are merged by summing their tiles.
    ///
    /// # Errors
    ///
    /// - `SparseError::BlockOutOfRange` if a coordinate has the wrong rank or
    ///   lies outside `grid`.
    /// - `SparseError::DataLength` if `values` does not hold one tile per block.
    pub fn new(
        grid: Vec<usize>,
        block_shape: Vec<usize>,
        blocks: Vec<Block>,
        values: Vec<ElT>,
    ) -> SparseResult<Self> {
        for block in &blocks {
            if !block.is_within(&grid) {
                return Err(SparseError::BlockOutOfRange {
                    block: block.coords().to_vec(),
                    grid,
                });
            }
        }
        let tile_len: usize = block_shape.iter().product();
        let expected = blocks.len() * tile_len;
        if values.len() != expected {
            return Err(SparseError::DataLength {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self::coalesce(grid, block_shape, blocks, values))
    }

    /// Build a tensor from per-axis index lists, `indices[axis][k]` being the
    /// coordinate of block `k` along sparse axis `axis`.
    ///
    /// # Errors
    ///
    /// Returns `SparseError::InvalidArgument` if the index lists have unequal
    /// lengths or their count differs from the grid rank, plus the errors of
    /// [`BlockCooTensor::new`].
    pub fn from_indices(
        grid: Vec<usize>,
        block_shape: Vec<usize>,
        indices: &[Vec<usize>],
        values: Vec<ElT>,
    ) -> SparseResult<Self> {
        if indices.len() != grid.len() {
            return Err(SparseError::invalid_argument(format!(
                "expected {} index lists, got {}",
                grid.len(),
                indices.len()
            )));
        }
        let nnz = indices.first().map_or(0, Vec::len);
        if indices.iter().any(|axis| axis.len() != nnz) {
            return Err(SparseError::invalid_argument(
                "index lists must all have the same length",
            ));
        }
        let blocks = (0..nnz)
            .map(|k| Block::new(&indices.iter().map(|axis| axis[k]).collect::<Vec<_>>()))
            .collect();
        Self::new(grid, block_shape, blocks, values)
    }

    /// Build a tensor from one dense tile per block.
    ///
    /// # Errors
    ///
    /// Returns `SparseError::Shape` if tiles differ in shape or their count
    /// differs from the block count.
    pub fn from_tiles(
        grid: Vec<usize>,
        blocks: Vec<Block>,
        tiles: &[DenseTensor<ElT>],
    ) -> SparseResult<Self> {
        if tiles.len() != blocks.len() {
            return Err(SparseError::shape(format!(
                "got {} tiles for {} blocks",
                tiles.len(),
                blocks.len()
            )));
        }
        let block_shape = match tiles.first() {
            Some(tile) => tile.shape().to_vec(),
            None => {
                return Err(SparseError::shape(
                    "cannot infer the tile shape without tiles; use BlockCooTensor::empty",
                ));
            }
        };
        let mut values = Vec::with_capacity(tiles.len() * tiles[0].len());
        for tile in tiles {
            if tile.shape() != block_shape.as_slice() {
                return Err(SparseError::shape(format!(
                    "all tiles must have shape {:?}, got {:?}",
                    block_shape,
                    tile.shape()
                )));
            }
            values.extend_from_slice(tile.data());
        }
        Self::new(grid, block_shape, blocks, values)
    }

    /// A tensor with no stored blocks.
    pub fn empty(grid: Vec<usize>, block_shape: Vec<usize>) -> Self {
        Self {
            grid,
            block_shape,
            blocks: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Sort blocks into canonical order and sum duplicate coordinates.
    fn coalesce(
        grid: Vec<usize>,
        block_shape: Vec<usize>,
        blocks: Vec<Block>,
        values: Vec<ElT>,
    ) -> Self {
        let tile_len: usize = block_shape.iter().product();
        let mut order: Vec<usize> = (0..blocks.len()).collect();
        order.sort_by(|&a, &b| blocks[a].cmp(&blocks[b]));

        let mut merged_blocks: Vec<Block> = Vec::with_capacity(blocks.len());
        let mut merged_values: Vec<ElT> = Vec::with_capacity(values.len());
        for k in order {
            let tile = &values[k * tile_len..(k + 1) * tile_len];
            if merged_blocks.last() == Some(&blocks[k]) {
                let start = merged_values.len() - tile_len;
                for (acc, &v) in merged_values[start..].iter_mut().zip(tile) {
                    *acc += v;
                }
            } else {
                merged_blocks.push(blocks[k].clone());
                merged_values.extend_from_slice(tile);
            }
        }

        Self {
            grid,
            block_shape,
            blocks: merged_blocks,
            values: merged_values,
        }
    }

    /// Number of blocks along each sparse axis.
    #[inline]
    pub fn grid(&self) -> &[usize] {
        &self.grid
    }

    /// Shape of every stored tile.
    #[inline]
    pub fn block_shape(&self) -> &[usize] {
        &self.block_shape
    }

    /// Number of block-index axes.
    #[inline]
    pub fn sparse_dim(&self) -> usize {
        self.grid.len()
    }

    /// Number of per-tile value axes.
    #[inline]
    pub fn dense_dim(&self) -> usize {
        self.block_shape.len()
    }

    /// Logical shape: the grid followed by the tile shape.
    pub fn shape(&self) -> Vec<usize> {
        self.grid.iter().chain(&self.block_shape).copied().collect()
    }

    /// Number of elements in one tile.
    #[inline]
    pub fn tile_len(&self) -> usize {
        self.block_shape.iter().product()
    }

    /// Number of stored blocks.
    #[inline]
    pub fn nnz_blocks(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Flat value buffer, one column-major tile per block.
    #[inline]
    pub fn values(&self) -> &[ElT] {
        &self.values
    }

    /// Coordinates of every block along one sparse axis.
    ///
    /// # Panics
    ///
    /// Panics if `axis >= sparse_dim()`.
    pub fn indices(&self, axis: usize) -> Vec<usize> {
        assert!(axis < self.sparse_dim(), "axis {} out of range", axis);
        self.blocks.iter().map(|b| b[axis]).collect()
    }

    /// Tile data of the `k`-th stored block.
    ///
    /// # Panics
    ///
    /// Panics if `k >= nnz_blocks()`.
    #[inline]
    pub fn tile(&self, k: usize) -> &[ElT] {
        let len = self.tile_len();
        &self.values[k * len..(k + 1) * len]
    }

    /// Tile of the `k`-th stored block as a dense tensor (copies).
    pub fn tile_tensor(&self, k: usize) -> SparseResult<DenseTensor<ElT>> {
        DenseTensor::from_vec(self.tile(k).to_vec(), &self.block_shape)
    }

    /// Position of `block` among the stored blocks, if present.
    pub fn find(&self, block: &Block) -> Option<usize> {
        self.blocks.binary_search(block).ok()
    }

    /// Tile of `block`, or `None` if the block is structurally zero.
    pub fn blockview(&self, block: &Block) -> Option<&[ElT]> {
        self.find(block).map(|k| self.tile(k))
    }

    /// Iterate over stored blocks with their tiles, in canonical order.
    pub fn iter_tiles(&self) -> impl Iterator<Item = (&Block, &[ElT])> {
        let len = self.tile_len();
        self.blocks
            .iter()
            .enumerate()
            .map(move |(k, block)| (block, &self.values[k * len..(k + 1) * len]))
    }

    /// Fraction of grid blocks that are stored.
    pub fn block_density(&self) -> f64 {
        let total: usize = self.grid.iter().product();
        if total == 0 {
            0.0
        } else {
            self.nnz_blocks() as f64 / total as f64
        }
    }

    /// Convert to a dense tensor, see [`crate::operations::block_coo_to_dense`].
    pub fn to_dense(&self) -> SparseResult<DenseTensor<ElT>> {
        crate::operations::block_coo_to_dense(self)
    }

    /// Matrix transpose, see [`crate::operations::block_coo_transpose`].
    pub fn transpose(&self) -> SparseResult<Self> {
        crate::operations::block_coo_transpose(self)
    }
}

impl<ElT: Scalar> std::fmt::Display for BlockCooTensor<ElT> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BlockCooTensor(shape={:?}, nnz_blocks={})",
            self.shape(),
            self.nnz_blocks()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(value: f64) -> Vec<f64> {
        vec![value; 4]
    }

    #[test]
    fn test_new_coalesces_order() {
        let blocks = vec![Block::new(&[1, 1]), Block::new(&[0, 1]), Block::new(&[1, 0])];
        let values = [tile(3.0), tile(1.0), tile(2.0)].concat();
        let t = BlockCooTensor::new(vec![2, 2], vec![2, 2], blocks, values).unwrap();

        assert_eq!(t.indices(0), vec![0, 1, 1]);
        assert_eq!(t.indices(1), vec![1, 0, 1]);
        assert_eq!(t.tile(0), tile(1.0).as_slice());
        assert_eq!(t.tile(1), tile(2.0).as_slice());
        assert_eq!(t.tile(2), tile(3.0).as_slice());
    }

    #[test]
    fn test_new_sums_duplicates() {
        let blocks = vec![Block::new(&[0, 1]), Block::new(&[0, 1])];
        let values = [tile(1.5), tile(2.0)].concat();
        let t = BlockCooTensor::new(vec![1, 2], vec![2, 2], blocks, values).unwrap();

        assert_eq!(t.nnz_blocks(), 1);
        assert_eq!(t.tile(0), tile(3.5).as_slice());
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        let err = BlockCooTensor::new(vec![2, 2], vec![1, 1], vec![Block::new(&[2, 0])], vec![1.0])
            .unwrap_err();
        assert!(matches!(err, SparseError::BlockOutOfRange { .. }));
    }

    #[test]
    fn test_new_rejects_wrong_value_count() {
        let err = BlockCooTensor::new(
            vec![2, 2],
            vec![2, 2],
            vec![Block::new(&[0, 0])],
            vec![1.0; 3],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SparseError::DataLength {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_from_indices() {
        let t = BlockCooTensor::from_indices(
            vec![3, 2],
            vec![1, 1],
            &[vec![2, 0], vec![1, 1]],
            vec![5.0, 7.0],
        )
        .unwrap();
        assert_eq!(t.blocks(), &[Block::new(&[0, 1]), Block::new(&[2, 1])]);
        assert_eq!(t.values(), &[7.0, 5.0]);
    }

    #[test]
    fn test_from_indices_ragged() {
        let err = BlockCooTensor::<f64>::from_indices(
            vec![3, 2],
            vec![1, 1],
            &[vec![0, 1], vec![0]],
            vec![1.0, 2.0],
        )
        .unwrap_err();
        assert!(matches!(err, SparseError::InvalidArgument { .. }));
    }

    #[test]
    fn test_from_tiles_shape_check() {
        let tiles = vec![DenseTensor::<f64>::ones(&[2, 2]), DenseTensor::ones(&[2, 3])];
        let blocks = vec![Block::new(&[0, 0]), Block::new(&[1, 1])];
        let err = BlockCooTensor::from_tiles(vec![2, 2], blocks, &tiles).unwrap_err();
        assert!(matches!(err, SparseError::Shape { .. }));
    }

    #[test]
    fn test_blockview_and_density() {
        let t = BlockCooTensor::new(vec![2, 2], vec![2, 2], vec![Block::new(&[1, 0])], tile(4.0))
            .unwrap();
        assert_eq!(t.blockview(&Block::new(&[1, 0])), Some(tile(4.0).as_slice()));
        assert_eq!(t.blockview(&Block::new(&[0, 0])), None);
        assert_eq!(t.block_density(), 0.25);
        assert_eq!(t.to_string(), "BlockCooTensor(shape=[2, 2, 2, 2], nnz_blocks=1)");
    }

    #[test]
    fn test_empty() {
        let t = BlockCooTensor::<f32>::empty(vec![3, 3], vec![4, 4]);
        assert_eq!(t.nnz_blocks(), 0);
        assert_eq!(t.shape(), vec![3, 3, 4, 4]);
        assert_eq!(t.iter_tiles().count(), 0);
    }
}
