//! Block-sparse matrices with square tiles.

use faer::MatRef;

use crate::backend::tile_as_faer_mat;
use crate::error::{SparseError, SparseResult};
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

use super::block::Block;
use super::coo::BlockCooTensor;

/// A block-COO matrix: two block axes and square `block_size × block_size`
/// tiles.
///
/// Logical shape is `(block_rows * block_size, block_cols * block_size)`.
/// Blocks are coalesced: sorted by `(row, col)` with no duplicates. The
/// matrix is immutable; operations return new matrices.
///
/// # Example
///
/// ```
/// use blockcoo::sparse::BlockSparseMatrix;
///
/// // 2x1 block grid, identity at (0, 0) and 2*identity at (1, 0)
/// let s = BlockSparseMatrix::new(
///     2,
///     1,
///     2,
///     &[0, 1],
///     &[0, 0],
///     vec![1.0, 0.0, 0.0, 1.0, 2.0, 0.0, 0.0, 2.0],
/// )
/// .unwrap();
///
/// assert_eq!(s.dense_shape(), (4, 2));
/// assert_eq!(s.nnz_blocks(), 2);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct BlockSparseMatrix<ElT: Scalar> {
    inner: BlockCooTensor<ElT>,
}

impl<ElT: Scalar> BlockSparseMatrix<ElT> {
    /// Build a matrix from block index lists and tile values.
    ///
    /// `values` holds one column-major `block_size × block_size` tile per
    /// block, in index order. Duplicate `(row, col)` pairs are summed.
    ///
    /// # Errors
    ///
    /// - `SparseError::InvalidArgument` if `block_size == 0` or the index
    ///   lists differ in length.
    /// - `SparseError::BlockOutOfRange` / `SparseError::DataLength` from
    ///   [`BlockCooTensor::new`].
    pub fn new(
        block_rows: usize,
        block_cols: usize,
        block_size: usize,
        row_indices: &[usize],
        col_indices: &[usize],
        values: Vec<ElT>,
    ) -> SparseResult<Self> {
        if block_size == 0 {
            return Err(SparseError::invalid_argument("block_size must be positive"));
        }
        if row_indices.len() != col_indices.len() {
            return Err(SparseError::invalid_argument(format!(
                "row and column index lists differ in length: {} vs {}",
                row_indices.len(),
                col_indices.len()
            )));
        }
        let blocks = row_indices
            .iter()
            .zip(col_indices)
            .map(|(&r, &c)| Block::new(&[r, c]))
            .collect();
        let inner = BlockCooTensor::new(
            vec![block_rows, block_cols],
            vec![block_size, block_size],
            blocks,
            values,
        )?;
        Ok(Self { inner })
    }

    /// Build a matrix from `(row, col)` coordinates and dense tiles.
    ///
    /// # Errors
    ///
    /// Returns `SparseError::Shape` if a tile is not `block_size × block_size`.
    pub fn from_tiles(
        block_rows: usize,
        block_cols: usize,
        block_size: usize,
        coords: &[(usize, usize)],
        tiles: &[DenseTensor<ElT>],
    ) -> SparseResult<Self> {
        if coords.len() != tiles.len() {
            return Err(SparseError::shape(format!(
                "got {} tiles for {} blocks",
                tiles.len(),
                coords.len()
            )));
        }
        let mut values = Vec::with_capacity(tiles.len() * block_size * block_size);
        for tile in tiles {
            if tile.shape() != [block_size, block_size] {
                return Err(SparseError::shape(format!(
                    "tile shape {:?} is not {}x{}",
                    tile.shape(),
                    block_size,
                    block_size
                )));
            }
            values.extend_from_slice(tile.data());
        }
        let (rows, cols): (Vec<usize>, Vec<usize>) = coords.iter().copied().unzip();
        Self::new(block_rows, block_cols, block_size, &rows, &cols, values)
    }

    /// A matrix with no stored blocks.
    pub fn empty(block_rows: usize, block_cols: usize, block_size: usize) -> Self {
        Self {
            inner: BlockCooTensor::empty(
                vec![block_rows, block_cols],
                vec![block_size, block_size],
            ),
        }
    }

    /// Wrap a general block-COO tensor.
    ///
    /// # Errors
    ///
    /// - `SparseError::Layout` unless the tensor has two block axes and two
    ///   value axes.
    /// - `SparseError::Shape` if its tiles are not square.
    pub fn from_tensor(tensor: BlockCooTensor<ElT>) -> SparseResult<Self> {
        if tensor.sparse_dim() != 2 || tensor.dense_dim() != 2 {
            return Err(SparseError::Layout {
                sparse_dim: tensor.sparse_dim(),
                dense_dim: tensor.dense_dim(),
            });
        }
        let bs = tensor.block_shape();
        if bs[0] != bs[1] {
            return Err(SparseError::shape(format!(
                "block sparse matrix requires square tiles, got {}x{}",
                bs[0], bs[1]
            )));
        }
        Ok(Self { inner: tensor })
    }

    #[inline]
    pub fn block_rows(&self) -> usize {
        self.inner.grid()[0]
    }

    #[inline]
    pub fn block_cols(&self) -> usize {
        self.inner.grid()[1]
    }

    /// Side length of every tile.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.inner.block_shape()[0]
    }

    #[inline]
    pub fn nnz_blocks(&self) -> usize {
        self.inner.nnz_blocks()
    }

    /// Dense shape `(rows, cols)`.
    pub fn dense_shape(&self) -> (usize, usize) {
        (
            self.block_rows() * self.block_size(),
            self.block_cols() * self.block_size(),
        )
    }

    /// Block-row index of every stored block.
    pub fn row_indices(&self) -> Vec<usize> {
        self.inner.indices(0)
    }

    /// Block-column index of every stored block.
    pub fn col_indices(&self) -> Vec<usize> {
        self.inner.indices(1)
    }

    /// Flat tile buffer, one column-major tile per block.
    #[inline]
    pub fn values(&self) -> &[ElT] {
        self.inner.values()
    }

    /// `(row, col)` of the `k`-th stored block.
    pub fn coords(&self, k: usize) -> (usize, usize) {
        let block = &self.inner.blocks()[k];
        (block[0], block[1])
    }

    /// Tile of the `k`-th stored block as a faer view.
    pub fn tile(&self, k: usize) -> MatRef<'_, ElT> {
        let bs = self.block_size();
        tile_as_faer_mat(self.inner.tile(k), bs, bs)
    }

    /// Tile at block `(row, col)`, or `None` if that block is zero.
    pub fn block(&self, row: usize, col: usize) -> Option<MatRef<'_, ElT>> {
        let bs = self.block_size();
        self.inner
            .blockview(&Block::new(&[row, col]))
            .map(|tile| tile_as_faer_mat(tile, bs, bs))
    }

    /// Fraction of grid blocks that are stored.
    pub fn block_density(&self) -> f64 {
        self.inner.block_density()
    }

    /// The underlying block-COO tensor.
    #[inline]
    pub fn as_tensor(&self) -> &BlockCooTensor<ElT> {
        &self.inner
    }

    pub fn into_tensor(self) -> BlockCooTensor<ElT> {
        self.inner
    }

    /// Block transpose: grid `(C, R)`, coordinates swapped, tiles transposed.
    pub fn transpose(&self) -> SparseResult<Self> {
        Ok(Self {
            inner: crate::operations::block_coo_transpose(&self.inner)?,
        })
    }

    /// Dense `(block_rows * block_size, block_cols * block_size)` matrix.
    pub fn to_dense(&self) -> SparseResult<DenseTensor<ElT>> {
        crate::operations::block_coo_to_dense(&self.inner)
    }
}

impl<ElT: Scalar> TryFrom<BlockCooTensor<ElT>> for BlockSparseMatrix<ElT> {
    type Error = SparseError;

    fn try_from(tensor: BlockCooTensor<ElT>) -> SparseResult<Self> {
        Self::from_tensor(tensor)
    }
}

impl<ElT: Scalar> std::fmt::Display for BlockSparseMatrix<ElT> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (rows, cols) = self.dense_shape();
        write!(
            f,
            "BlockSparseMatrix({}x{}, block_size={}, nnz_blocks={})",
            rows,
            cols,
            self.block_size(),
            self.nnz_blocks()
        )
    }
}
