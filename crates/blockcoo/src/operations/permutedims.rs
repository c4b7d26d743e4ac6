//! Axis permutation for dense tensors.
//!
//! ```text
//! permutedims(tensor, perm)
//!     → validate permutation
//!     → allocate output with permuted shape
//!     → permutedims_into(output, tensor, perm)
//! ```

use crate::error::{SparseError, SparseResult};
use crate::scalar::Scalar;
use crate::tensor::{DenseTensor, cartesian_to_linear, linear_to_cartesian_into};

/// Permute the axes of a tensor, returning a new tensor.
///
/// `perm[i]` gives the source axis for axis `i` of the result.
///
/// # Errors
///
/// Returns `SparseError::InvalidPermutation` if `perm` is not a permutation
/// of `0..ndim`.
///
/// # Examples
///
/// ```
/// use blockcoo::DenseTensor;
/// use blockcoo::operations::permutedims;
///
/// let t = DenseTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
/// let t2 = permutedims(&t, &[1, 0]).unwrap();
/// assert_eq!(t2.shape(), &[3, 2]);
/// assert_eq!(t.get(&[1, 0]), t2.get(&[0, 1]));
/// ```
pub fn permutedims<T: Scalar>(
    tensor: &DenseTensor<T>,
    perm: &[usize],
) -> SparseResult<DenseTensor<T>> {
    validate_permutation(perm, tensor.ndim())?;

    let new_shape: Vec<usize> = perm.iter().map(|&p| tensor.shape()[p]).collect();
    let mut result = DenseTensor::zeros(&new_shape);
    permutedims_into(&mut result, tensor, perm);
    Ok(result)
}

/// Permute `src` into an existing `dest` of the permuted shape.
///
/// # Panics
///
/// Panics if `dest` does not have the permuted shape of `src`.
pub fn permutedims_into<T: Scalar>(
    dest: &mut DenseTensor<T>,
    src: &DenseTensor<T>,
    perm: &[usize],
) {
    assert!(
        perm.iter()
            .zip(dest.shape())
            .all(|(&p, &d)| src.shape()[p] == d),
        "destination shape {:?} is not src shape {:?} permuted by {:?}",
        dest.shape(),
        src.shape(),
        perm
    );

    let src_shape = src.shape().to_vec();
    let dest_strides = dest.strides().to_vec();
    let mut old_index = vec![0usize; src_shape.len()];
    let mut new_index = vec![0usize; src_shape.len()];

    for (linear_old, &value) in src.data().iter().enumerate() {
        linear_to_cartesian_into(linear_old, &src_shape, &mut old_index);
        for (slot, &p) in new_index.iter_mut().zip(perm) {
            *slot = old_index[p];
        }
        let linear_new = cartesian_to_linear(&new_index, &dest_strides);
        dest.data_mut()[linear_new] = value;
    }
}

/// Validate that `perm` is a permutation of `0..ndim`.
pub(crate) fn validate_permutation(perm: &[usize], ndim: usize) -> SparseResult<()> {
    let invalid = || SparseError::InvalidPermutation {
        perm: perm.to_vec(),
        ndim,
    };
    if perm.len() != ndim {
        return Err(invalid());
    }
    let mut seen = vec![false; ndim];
    for &p in perm {
        if p >= ndim || seen[p] {
            return Err(invalid());
        }
        seen[p] = true;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permutedims_3d() {
        let t =
            DenseTensor::<f64>::from_fn(&[2, 3, 4], |ix| (ix[0] * 100 + ix[1] * 10 + ix[2]) as f64);

        let t2 = permutedims(&t, &[2, 0, 1]).unwrap();
        assert_eq!(t2.shape(), &[4, 2, 3]);
        for i in 0..2 {
            for j in 0..3 {
                for k in 0..4 {
                    assert_eq!(t.get(&[i, j, k]), t2.get(&[k, i, j]));
                }
            }
        }
    }

    #[test]
    fn test_permutedims_identity() {
        let t = DenseTensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        assert_eq!(permutedims(&t, &[0, 1]).unwrap(), t);
    }

    #[test]
    fn test_permutedims_invalid() {
        let t = DenseTensor::<f64>::zeros(&[2, 3]);
        assert!(permutedims(&t, &[0]).is_err());
        assert!(permutedims(&t, &[0, 1, 2]).is_err());
        assert!(permutedims(&t, &[0, 2]).is_err());
        assert!(matches!(
            permutedims(&t, &[1, 1]),
            Err(SparseError::InvalidPermutation { .. })
        ));
    }

    #[test]
    fn test_permutedims_into() {
        let src = DenseTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let mut dest = DenseTensor::zeros(&[3, 2]);
        permutedims_into(&mut dest, &src, &[1, 0]);
        for i in 0..2 {
            for j in 0..3 {
                assert_eq!(src.get(&[i, j]), dest.get(&[j, i]));
            }
        }
    }
}
