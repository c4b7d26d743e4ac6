//! Zero-copy conversion between dense tensors and faer matrices.
//!
//! Both `DenseTensor` and faer use column-major storage, so a rank-2 tensor
//! (or any contiguous column-major tile buffer) can be viewed as a faer
//! matrix without copying.

use faer::{MatMut, MatRef};

use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

/// Extension trait for viewing tensor data as faer matrices.
pub trait AsFaerMat<T: Scalar> {
    /// View the data as an immutable `rows x cols` faer matrix.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols` differs from the number of elements.
    ///
    /// # Example
    ///
    /// ```
    /// use blockcoo::DenseTensor;
    /// use blockcoo::backend::AsFaerMat;
    ///
    /// let t = DenseTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    /// let mat = t.as_faer_mat(2, 3);
    /// assert_eq!(mat.nrows(), 2);
    /// assert_eq!(mat[(1, 2)], 6.0);
    /// ```
    fn as_faer_mat(&self, rows: usize, cols: usize) -> MatRef<'_, T>;

    /// View the data as a mutable `rows x cols` faer matrix.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols` differs from the number of elements.
    fn as_faer_mat_mut(&mut self, rows: usize, cols: usize) -> MatMut<'_, T>;
}

impl<T: Scalar> AsFaerMat<T> for DenseTensor<T> {
    fn as_faer_mat(&self, rows: usize, cols: usize) -> MatRef<'_, T> {
        tile_as_faer_mat(self.data(), rows, cols)
    }

    fn as_faer_mat_mut(&mut self, rows: usize, cols: usize) -> MatMut<'_, T> {
        let len = self.len();
        assert_eq!(
            rows * cols,
            len,
            "Matrix dimensions ({} x {} = {}) must match tensor size ({})",
            rows,
            cols,
            rows * cols,
            len
        );
        MatMut::from_column_major_slice_mut(self.data_mut(), rows, cols)
    }
}

/// View one column-major tile of a block-COO value buffer as a faer matrix.
///
/// # Panics
///
/// Panics if `rows * cols != tile.len()`.
pub fn tile_as_faer_mat<T: Scalar>(tile: &[T], rows: usize, cols: usize) -> MatRef<'_, T> {
    assert_eq!(
        rows * cols,
        tile.len(),
        "Matrix dimensions ({} x {} = {}) must match tile size ({})",
        rows,
        cols,
        rows * cols,
        tile.len()
    );
    MatRef::from_column_major_slice(tile, rows, cols)
}

/// Copy a faer matrix into a new `[rows, cols]` tensor.
///
/// # Example
///
/// ```
/// use faer::Mat;
/// use blockcoo::backend::tensor_from_faer_mat;
///
/// let mat = Mat::from_fn(2, 3, |i, j| (i * 3 + j) as f64);
/// let tensor = tensor_from_faer_mat(mat.as_ref());
/// assert_eq!(tensor.shape(), &[2, 3]);
/// assert_eq!(tensor.get(&[1, 2]), Some(&5.0));
/// ```
pub fn tensor_from_faer_mat<T: Scalar>(mat: MatRef<'_, T>) -> DenseTensor<T> {
    let (rows, cols) = (mat.nrows(), mat.ncols());
    DenseTensor::from_fn(&[rows, cols], |ix| mat[(ix[0], ix[1])])
}
