//! Dense n-dimensional tensor.
//!
//! Storage is a flat `Vec` in column-major (Fortran) order, the layout faer
//! expects, so rank-2 tensors convert to faer matrix views without copying.

use faer::linalg::matmul::matmul;
use faer::{Accum, Par};

use crate::backend::AsFaerMat;
use crate::error::{SparseError, SparseResult};
use crate::scalar::Scalar;

/// A dense tensor with column-major storage.
///
/// # Example
///
/// ```
/// use blockcoo::DenseTensor;
///
/// // Column-major: [1, 2] is the first column
/// let t = DenseTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
/// assert_eq!(t.get(&[1, 0]), Some(&2.0));
/// assert_eq!(t.get(&[0, 1]), Some(&3.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DenseTensor<ElT: Scalar> {
    data: Vec<ElT>,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

/// A rank-2 dense tensor.
pub type DenseMatrix<ElT> = DenseTensor<ElT>;

impl<ElT: Scalar> DenseTensor<ElT> {
    /// Create a zero-filled tensor.
    pub fn zeros(shape: &[usize]) -> Self {
        let len = shape.iter().product::<usize>();
        Self {
            data: vec![ElT::zero(); len],
            shape: shape.to_vec(),
            strides: column_major_strides(shape),
        }
    }

    /// Create a tensor filled with ones.
    pub fn ones(shape: &[usize]) -> Self {
        let mut t = Self::zeros(shape);
        t.data.fill(ElT::one());
        t
    }

    /// Create a tensor from column-major data.
    ///
    /// # Errors
    ///
    /// Returns `SparseError::DataLength` if `data.len()` is not the product of `shape`.
    pub fn from_vec(data: Vec<ElT>, shape: &[usize]) -> SparseResult<Self> {
        let expected = shape.iter().product::<usize>();
        if data.len() != expected {
            return Err(SparseError::DataLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            shape: shape.to_vec(),
            strides: column_major_strides(shape),
        })
    }

    /// Create a tensor from row-major (C order) data.
    ///
    /// ```
    /// use blockcoo::DenseTensor;
    ///
    /// let t = DenseTensor::from_row_major(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    /// assert_eq!(t.get(&[0, 1]), Some(&2.0));
    /// assert_eq!(t.get(&[1, 0]), Some(&4.0));
    /// ```
    pub fn from_row_major(data: &[ElT], shape: &[usize]) -> SparseResult<Self> {
        let expected = shape.iter().product::<usize>();
        if data.len() != expected {
            return Err(SparseError::DataLength {
                expected,
                actual: data.len(),
            });
        }
        // Reading C-order data as column-major of the reversed shape gives the
        // axis-reversed tensor; reversing the axes back restores it.
        let reversed: Vec<usize> = shape.iter().rev().copied().collect();
        let t = Self::from_vec(data.to_vec(), &reversed)?;
        let perm: Vec<usize> = (0..shape.len()).rev().collect();
        t.permutedims(&perm)
    }

    /// Create a tensor by evaluating `f` at every index.
    pub fn from_fn(shape: &[usize], mut f: impl FnMut(&[usize]) -> ElT) -> Self {
        let mut t = Self::zeros(shape);
        let mut index = vec![0usize; shape.len()];
        for linear in 0..t.data.len() {
            linear_to_cartesian_into(linear, shape, &mut index);
            t.data[linear] = f(&index);
        }
        t
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Column-major data.
    #[inline]
    pub fn data(&self) -> &[ElT] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [ElT] {
        &mut self.data
    }

    /// Consume the tensor, returning its column-major data.
    pub fn into_data(self) -> Vec<ElT> {
        self.data
    }

    /// Element at `indices`, or `None` when out of bounds.
    pub fn get(&self, indices: &[usize]) -> Option<&ElT> {
        let linear = self.checked_linear(indices)?;
        self.data.get(linear)
    }

    /// Set the element at `indices`.
    ///
    /// # Errors
    ///
    /// Returns `SparseError::InvalidArgument` if `indices` is out of bounds.
    pub fn set(&mut self, indices: &[usize], value: ElT) -> SparseResult<()> {
        let linear = self.checked_linear(indices).ok_or_else(|| {
            SparseError::invalid_argument(format!(
                "index {:?} out of bounds for shape {:?}",
                indices, self.shape
            ))
        })?;
        self.data[linear] = value;
        Ok(())
    }

    fn checked_linear(&self, indices: &[usize]) -> Option<usize> {
        if indices.len() != self.ndim() {
            return None;
        }
        if indices.iter().zip(&self.shape).any(|(&i, &d)| i >= d) {
            return None;
        }
        Some(cartesian_to_linear(indices, &self.strides))
    }

    /// Data in row-major (C) order.
    pub fn to_row_major(&self) -> Vec<ElT> {
        // Row-major linear index == column-major index over the reversed shape.
        let reversed: Vec<usize> = self.shape.iter().rev().copied().collect();
        let mut reversed_index = vec![0usize; self.ndim()];
        let mut index = vec![0usize; self.ndim()];
        let mut out = Vec::with_capacity(self.len());
        for linear in 0..self.len() {
            linear_to_cartesian_into(linear, &reversed, &mut reversed_index);
            for (dst, &src) in index.iter_mut().zip(reversed_index.iter().rev()) {
                *dst = src;
            }
            out.push(self.data[cartesian_to_linear(&index, &self.strides)]);
        }
        out
    }

    /// Reshape to `new_shape`, reinterpreting the column-major data.
    ///
    /// # Errors
    ///
    /// Returns `SparseError::DataLength` if the element count changes.
    pub fn reshape(&self, new_shape: &[usize]) -> SparseResult<Self> {
        Self::from_vec(self.data.clone(), new_shape)
    }

    /// Permute the axes. `perm[i]` is the source axis of result axis `i`.
    pub fn permutedims(&self, perm: &[usize]) -> SparseResult<Self> {
        crate::operations::permutedims(self, perm)
    }

    /// Matrix transpose of a rank-2 tensor.
    ///
    /// # Errors
    ///
    /// Returns `SparseError::InvalidArgument` if the tensor is not rank 2.
    pub fn transpose(&self) -> SparseResult<Self> {
        self.require_matrix("transpose")?;
        self.permutedims(&[1, 0])
    }

    /// Dense matrix product `self @ rhs` using faer's GEMM.
    ///
    /// # Errors
    ///
    /// Returns `SparseError::InvalidArgument` for non-matrix operands and
    /// `SparseError::Shape` when the inner dimensions differ.
    ///
    /// ```
    /// use blockcoo::DenseTensor;
    ///
    /// let a = DenseTensor::from_row_major(&[1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
    /// let b = DenseTensor::from_row_major(&[1.0, 0.0, 0.0, 1.0], &[2, 2]).unwrap();
    /// assert_eq!(a.matmul(&b).unwrap(), a);
    /// ```
    pub fn matmul(&self, rhs: &Self) -> SparseResult<Self> {
        self.require_matrix("matmul")?;
        rhs.require_matrix("matmul")?;
        let (m, k) = (self.shape[0], self.shape[1]);
        let (k2, n) = (rhs.shape[0], rhs.shape[1]);
        if k != k2 {
            return Err(SparseError::shape(format!(
                "matmul inner dimensions differ: ({}, {}) @ ({}, {})",
                m, k, k2, n
            )));
        }

        let mut out = Self::zeros(&[m, n]);
        if m == 0 || n == 0 {
            return Ok(out);
        }
        let mut out_mat = out.as_faer_mat_mut(m, n);
        matmul(
            out_mat.as_mut(),
            Accum::Replace,
            self.as_faer_mat(m, k),
            rhs.as_faer_mat(k, n),
            ElT::one(),
            Par::Seq,
        );
        Ok(out)
    }

    /// Element-wise comparison with a combined absolute/relative tolerance.
    pub fn approx_eq(&self, other: &Self, rtol: f64, atol: f64) -> bool {
        self.shape == other.shape
            && self.data.iter().zip(&other.data).all(|(&a, &b)| {
                let (a, b) = (a.to_f64(), b.to_f64());
                (a - b).abs() <= atol + rtol * b.abs()
            })
    }

    pub(crate) fn require_matrix(&self, op: &str) -> SparseResult<()> {
        if self.ndim() != 2 {
            return Err(SparseError::invalid_argument(format!(
                "{} supports only 2D dense operands, actual shape: {:?}",
                op, self.shape
            )));
        }
        Ok(())
    }
}

/// Column-major strides: `[1, d0, d0*d1, ...]`.
pub(crate) fn column_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = Vec::with_capacity(shape.len());
    let mut stride = 1;
    for &dim in shape {
        strides.push(stride);
        stride *= dim;
    }
    strides
}

#[inline]
pub(crate) fn cartesian_to_linear(indices: &[usize], strides: &[usize]) -> usize {
    indices.iter().zip(strides).map(|(&i, &s)| i * s).sum()
}

/// Column-major linear index to cartesian index, written into `out`.
#[inline]
pub(crate) fn linear_to_cartesian_into(mut linear: usize, shape: &[usize], out: &mut [usize]) {
    for (slot, &dim) in out.iter_mut().zip(shape) {
        *slot = linear % dim;
        linear /= dim;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strides() {
        assert_eq!(column_major_strides(&[3, 4, 5]), vec![1, 3, 12]);
        assert!(column_major_strides(&[]).is_empty());
    }

    #[test]
    fn test_from_vec_length_mismatch() {
        let err = DenseTensor::<f64>::from_vec(vec![1.0; 5], &[2, 3]).unwrap_err();
        assert!(matches!(
            err,
            SparseError::DataLength {
                expected: 6,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_row_major_roundtrip() {
        let data: Vec<f64> = (0..24).map(|x| x as f64).collect();
        let t = DenseTensor::from_row_major(&data, &[2, 3, 4]).unwrap();
        assert_eq!(t.get(&[1, 2, 3]), Some(&23.0));
        assert_eq!(t.get(&[0, 1, 0]), Some(&4.0));
        assert_eq!(t.to_row_major(), data);
    }

    #[test]
    fn test_from_fn() {
        let t = DenseTensor::<f64>::from_fn(&[2, 3], |ix| (10 * ix[0] + ix[1]) as f64);
        assert_eq!(t.get(&[1, 2]), Some(&12.0));
        assert_eq!(t.get(&[0, 1]), Some(&1.0));
    }

    #[test]
    fn test_get_out_of_bounds() {
        let t = DenseTensor::<f64>::zeros(&[2, 2]);
        assert_eq!(t.get(&[2, 0]), None);
        assert_eq!(t.get(&[0]), None);
    }

    #[test]
    fn test_set() {
        let mut t = DenseTensor::<f32>::zeros(&[2, 2]);
        t.set(&[1, 0], 3.0).unwrap();
        assert_eq!(t.data(), &[0.0, 3.0, 0.0, 0.0]);
        assert!(t.set(&[0, 2], 1.0).is_err());
    }

    #[test]
    fn test_transpose() {
        let t = DenseTensor::from_row_major(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let tt = t.transpose().unwrap();
        assert_eq!(tt.shape(), &[3, 2]);
        assert_eq!(tt.to_row_major(), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        assert!(DenseTensor::<f64>::zeros(&[2]).transpose().is_err());
    }

    #[test]
    fn test_matmul() {
        let a = DenseTensor::from_row_major(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let b = DenseTensor::from_row_major(&[1.0, 0.0, 0.0, 1.0, 1.0, 1.0], &[3, 2]).unwrap();
        let c = a.matmul(&b).unwrap();
        assert_eq!(c.to_row_major(), vec![4.0, 5.0, 10.0, 11.0]);
    }

    #[test]
    fn test_matmul_inner_mismatch() {
        let a = DenseTensor::<f64>::zeros(&[2, 3]);
        let b = DenseTensor::<f64>::zeros(&[2, 3]);
        assert!(matches!(a.matmul(&b), Err(SparseError::Shape { .. })));
    }

    #[test]
    fn test_approx_eq() {
        let a = DenseTensor::from_vec(vec![1.0, 2.0], &[2]).unwrap();
        let b = DenseTensor::from_vec(vec![1.0 + 1e-9, 2.0], &[2]).unwrap();
        assert!(a.approx_eq(&b, 1e-6, 0.0));
        assert!(!a.approx_eq(&DenseTensor::zeros(&[2]), 1e-6, 0.0));
    }
}
