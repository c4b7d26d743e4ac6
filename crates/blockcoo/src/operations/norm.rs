//! Matrix norms of tiles.

use std::fmt;
use std::str::FromStr;

use faer::MatRef;
use faer::linalg::solvers::{Svd, SvdError};
use serde::{Deserialize, Serialize};

use crate::error::{SparseError, SparseResult};
use crate::scalar::Scalar;

/// Matrix norm order used to rank blocks.
///
/// String forms follow the usual `ord` spellings: `"fro"`, `"nuc"`, `"2"`,
/// `"-2"`, `"1"`, `"-1"`, `"inf"`, `"-inf"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NormOrder {
    /// Square root of the sum of squares.
    #[serde(rename = "fro")]
    Frobenius,
    /// Sum of singular values.
    #[serde(rename = "nuc")]
    Nuclear,
    /// Largest singular value.
    #[default]
    #[serde(rename = "2")]
    Spectral,
    /// Smallest singular value.
    #[serde(rename = "-2")]
    MinSingular,
    /// Largest absolute column sum.
    #[serde(rename = "1")]
    MaxColumnSum,
    /// Smallest absolute column sum.
    #[serde(rename = "-1")]
    MinColumnSum,
    /// Largest absolute row sum.
    #[serde(rename = "inf")]
    MaxRowSum,
    /// Smallest absolute row sum.
    #[serde(rename = "-inf")]
    MinRowSum,
}

impl NormOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormOrder::Frobenius => "fro",
            NormOrder::Nuclear => "nuc",
            NormOrder::Spectral => "2",
            NormOrder::MinSingular => "-2",
            NormOrder::MaxColumnSum => "1",
            NormOrder::MinColumnSum => "-1",
            NormOrder::MaxRowSum => "inf",
            NormOrder::MinRowSum => "-inf",
        }
    }

    fn needs_svd(&self) -> bool {
        matches!(
            self,
            NormOrder::Nuclear | NormOrder::Spectral | NormOrder::MinSingular
        )
    }
}

impl fmt::Display for NormOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormOrder {
    type Err = SparseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fro" => Ok(NormOrder::Frobenius),
            "nuc" => Ok(NormOrder::Nuclear),
            "2" => Ok(NormOrder::Spectral),
            "-2" => Ok(NormOrder::MinSingular),
            "1" => Ok(NormOrder::MaxColumnSum),
            "-1" => Ok(NormOrder::MinColumnSum),
            "inf" => Ok(NormOrder::MaxRowSum),
            "-inf" => Ok(NormOrder::MinRowSum),
            other => Err(SparseError::invalid_argument(format!(
                "unknown norm order '{}'",
                other
            ))),
        }
    }
}

/// Matrix norm of `mat` of order `ord`, widened to `f64`.
///
/// Singular-value orders go through faer's thin SVD.
///
/// # Errors
///
/// Returns `SparseError::Decomposition` if the SVD fails to converge.
///
/// # Example
///
/// ```
/// use faer::mat;
/// use blockcoo::operations::{NormOrder, matrix_norm};
///
/// let m = mat![[3.0, 0.0], [0.0, -4.0]];
/// assert_eq!(matrix_norm(m.as_ref(), NormOrder::Spectral).unwrap(), 4.0);
/// assert_eq!(matrix_norm(m.as_ref(), NormOrder::Frobenius).unwrap(), 5.0);
/// ```
pub fn matrix_norm<ElT: Scalar>(mat: MatRef<'_, ElT>, ord: NormOrder) -> SparseResult<f64> {
    let (nrows, ncols) = (mat.nrows(), mat.ncols());
    if nrows == 0 || ncols == 0 {
        return Ok(0.0);
    }

    if ord.needs_svd() {
        let svd: Svd<ElT> = Svd::new_thin(mat).map_err(|e: SvdError| SparseError::Decomposition {
            message: format!("{:?}", e),
        })?;
        let s = svd.S();
        let singular: Vec<f64> = (0..nrows.min(ncols)).map(|k| s[k].to_f64()).collect();
        return Ok(match ord {
            NormOrder::Nuclear => singular.iter().sum(),
            NormOrder::Spectral => singular.iter().copied().fold(0.0, f64::max),
            _ => singular.iter().copied().fold(f64::INFINITY, f64::min),
        });
    }

    let mut sum_sq = 0.0;
    let mut column_sums = vec![0.0; ncols];
    let mut row_sums = vec![0.0; nrows];
    for j in 0..ncols {
        for i in 0..nrows {
            let a = mat[(i, j)].to_f64().abs();
            sum_sq += a * a;
            column_sums[j] += a;
            row_sums[i] += a;
        }
    }

    Ok(match ord {
        NormOrder::Frobenius => sum_sq.sqrt(),
        NormOrder::MaxColumnSum => column_sums.into_iter().fold(0.0, f64::max),
        NormOrder::MinColumnSum => column_sums.into_iter().fold(f64::INFINITY, f64::min),
        NormOrder::MaxRowSum => row_sums.into_iter().fold(0.0, f64::max),
        _ => row_sums.into_iter().fold(f64::INFINITY, f64::min),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use faer::mat;

    #[test]
    fn test_parse_roundtrip() {
        for s in ["fro", "nuc", "2", "-2", "1", "-1", "inf", "-inf"] {
            let ord: NormOrder = s.parse().unwrap();
            assert_eq!(ord.to_string(), s);
        }
        assert!("3".parse::<NormOrder>().is_err());
        assert_eq!(NormOrder::default(), NormOrder::Spectral);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&NormOrder::MaxRowSum).unwrap();
        assert_eq!(json, "\"inf\"");
        let ord: NormOrder = serde_json::from_str("\"fro\"").unwrap();
        assert_eq!(ord, NormOrder::Frobenius);
    }

    #[test]
    fn test_elementwise_norms() {
        let m = mat![[1.0, -2.0], [3.0, 4.0]];
        let m = m.as_ref();
        assert_relative_eq!(matrix_norm(m, NormOrder::Frobenius).unwrap(), 30.0_f64.sqrt());
        assert_relative_eq!(matrix_norm(m, NormOrder::MaxColumnSum).unwrap(), 6.0);
        assert_relative_eq!(matrix_norm(m, NormOrder::MinColumnSum).unwrap(), 4.0);
        assert_relative_eq!(matrix_norm(m, NormOrder::MaxRowSum).unwrap(), 7.0);
        assert_relative_eq!(matrix_norm(m, NormOrder::MinRowSum).unwrap(), 3.0);
    }

    #[test]
    fn test_singular_value_norms() {
        let m = mat![[3.0, 0.0], [0.0, -4.0]];
        let m = m.as_ref();
        assert_relative_eq!(matrix_norm(m, NormOrder::Spectral).unwrap(), 4.0, epsilon = 1e-12);
        assert_relative_eq!(matrix_norm(m, NormOrder::MinSingular).unwrap(), 3.0, epsilon = 1e-12);
        assert_relative_eq!(matrix_norm(m, NormOrder::Nuclear).unwrap(), 7.0, epsilon = 1e-12);
    }

    #[test]
    fn test_spectral_f32() {
        let m = mat![[1.0f32, 1.0], [1.0, 1.0]];
        assert_relative_eq!(
            matrix_norm(m.as_ref(), NormOrder::Spectral).unwrap(),
            2.0,
            epsilon = 1e-5
        );
    }
}
