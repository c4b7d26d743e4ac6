//! Pre-batched binary Criteo click logs.
//!
//! The file is a flat sequence of little-endian `i32` values. Each sample has
//! 40 features: the click label, 13 integer (dense) features and 26
//! categorical ids. Samples are stored in fixed batches of `batch_size`, so
//! entry `i` occupies bytes `[i * entry_size, (i + 1) * entry_size)`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::info;

use crate::config::CriteoConfig;
use crate::error::{ConfigError, DataError};
use crate::tensor::DenseTensor;

pub const LABEL_FEATURES: usize = 1;
pub const DENSE_FEATURES: usize = 13;
pub const CATEGORICAL_FEATURES: usize = 26;
pub const TOTAL_FEATURES: usize = LABEL_FEATURES + DENSE_FEATURES + CATEGORICAL_FEATURES;
pub const BYTES_PER_FEATURE: usize = 4;

/// One decoded entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CriteoBatch {
    /// `(batch, 13)`, each value `ln(x + 1)`.
    pub dense: DenseTensor<f32>,
    /// Row-major `(batch, 26)` categorical ids.
    pub categorical: Vec<i64>,
    /// `(batch, 1)` click labels.
    pub labels: DenseTensor<f32>,
}

impl CriteoBatch {
    pub fn batch_size(&self) -> usize {
        self.labels.shape()[0]
    }

    /// Categorical ids of sample `b`.
    pub fn categorical_row(&self, b: usize) -> &[i64] {
        &self.categorical[b * CATEGORICAL_FEATURES..(b + 1) * CATEGORICAL_FEATURES]
    }
}

/// Random-access reader over a binary Criteo file.
///
/// The file handle sits behind a mutex, so the dataset can be shared
/// between threads.
#[derive(Debug)]
pub struct CriteoBinDataset {
    path: PathBuf,
    file: Mutex<File>,
    batch_size: usize,
    max_ind_range: i64,
    bytes_per_entry: usize,
    num_entries: usize,
}

impl CriteoBinDataset {
    /// Open `path`. Trailing bytes that do not fill a whole entry are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Config`] if `batch_size == 0` and
    /// [`DataError::Io`] if the file cannot be opened.
    pub fn open(path: &Path, batch_size: usize, max_ind_range: i64) -> Result<Self, DataError> {
        if batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be > 0").into());
        }
        let io_err = |source| DataError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let size = file.metadata().map_err(io_err)?.len() as usize;

        let bytes_per_entry = BYTES_PER_FEATURE * TOTAL_FEATURES * batch_size;
        let num_entries = size / bytes_per_entry;
        info!(
            "CriteoBinDataset: {} batches of {} (data file={})",
            num_entries,
            batch_size,
            path.display()
        );

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            batch_size,
            max_ind_range,
            bytes_per_entry,
            num_entries,
        })
    }

    pub fn from_config(config: &CriteoConfig) -> Result<Self, DataError> {
        config.validate()?;
        Self::open(&config.data_file, config.batch_size, config.max_ind_range)
    }

    /// Number of whole entries in the file.
    pub fn len(&self) -> usize {
        self.num_entries
    }

    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode entry `idx`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::IndexOutOfBounds`] when `idx >= len()` and
    /// [`DataError::Io`] on read failure.
    pub fn get(&self, idx: usize) -> Result<CriteoBatch, DataError> {
        if idx >= self.num_entries {
            return Err(DataError::IndexOutOfBounds {
                index: idx,
                len: self.num_entries,
            });
        }
        let mut raw = vec![0u8; self.bytes_per_entry];
        {
            let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            file.seek(SeekFrom::Start((idx * self.bytes_per_entry) as u64))
                .and_then(|_| file.read_exact(&mut raw))
                .map_err(|source| DataError::Io {
                    path: self.path.clone(),
                    source,
                })?;
        }
        let values: Vec<i32> = raw
            .chunks_exact(BYTES_PER_FEATURE)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok(self.decode(&values))
    }

    /// Iterate over all entries in file order.
    pub fn iter(&self) -> impl Iterator<Item = Result<CriteoBatch, DataError>> + '_ {
        (0..self.num_entries).map(move |idx| self.get(idx))
    }

    fn decode(&self, values: &[i32]) -> CriteoBatch {
        let batch = self.batch_size;
        let feature = |b: usize, f: usize| values[b * TOTAL_FEATURES + f];

        let labels = DenseTensor::from_fn(&[batch, 1], |ix| feature(ix[0], 0) as f32);
        let dense = DenseTensor::from_fn(&[batch, DENSE_FEATURES], |ix| {
            (feature(ix[0], LABEL_FEATURES + ix[1]) as f32 + 1.0).ln()
        });
        let categorical = values
            .chunks_exact(TOTAL_FEATURES)
            .flat_map(|sample| &sample[LABEL_FEATURES + DENSE_FEATURES..])
            .map(|&id| {
                let id = i64::from(id);
                if self.max_ind_range > 0 {
                    id.rem_euclid(self.max_ind_range)
                } else {
                    id
                }
            })
            .collect();

        CriteoBatch {
            dense,
            categorical,
            labels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Sample `s`: label s % 2, dense features s + j, categorical ids 100 * s + j - 5.
    fn write_samples(n: usize, trailing: usize) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for s in 0..n as i32 {
            let mut record = vec![s % 2];
            record.extend((0..DENSE_FEATURES as i32).map(|j| s + j));
            record.extend((0..CATEGORICAL_FEATURES as i32).map(|j| 100 * s + j - 5));
            for v in record {
                file.write_all(&v.to_le_bytes()).unwrap();
            }
        }
        file.write_all(&vec![0u8; trailing]).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_len_ignores_partial_entry() {
        let file = write_samples(5, 7);
        let ds = CriteoBinDataset::open(file.path(), 2, -1).unwrap();
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn test_decode_entry() {
        let file = write_samples(4, 0);
        let ds = CriteoBinDataset::open(file.path(), 2, -1).unwrap();
        let batch = ds.get(1).unwrap();

        assert_eq!(batch.batch_size(), 2);
        assert_eq!(batch.labels.data(), &[0.0, 1.0]);
        // Sample 3, dense feature 4: ln(3 + 4 + 1)
        assert_relative_eq!(*batch.dense.get(&[1, 4]).unwrap(), 8.0f32.ln(), epsilon = 1e-6);
        assert_eq!(batch.categorical_row(0)[0], 195);
        assert_eq!(batch.categorical_row(1)[25], 320);
    }

    #[test]
    fn test_max_ind_range_is_euclidean() {
        let file = write_samples(1, 0);
        let ds = CriteoBinDataset::open(file.path(), 1, 7).unwrap();
        let batch = ds.get(0).unwrap();
        // Sample 0 categorical ids start at -5
        assert_eq!(batch.categorical_row(0)[0], 2);
        assert!(batch.categorical.iter().all(|&id| (0..7).contains(&id)));
    }

    #[test]
    fn test_index_out_of_bounds() {
        let file = write_samples(2, 0);
        let ds = CriteoBinDataset::open(file.path(), 1, -1).unwrap();
        assert!(matches!(
            ds.get(2),
            Err(DataError::IndexOutOfBounds { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_iter_visits_all_entries() {
        let file = write_samples(6, 0);
        let ds = CriteoBinDataset::open(file.path(), 3, -1).unwrap();
        let labels: Vec<f32> = ds
            .iter()
            .flat_map(|b| b.unwrap().labels.into_data())
            .collect();
        assert_eq!(labels, vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_open_errors() {
        assert!(matches!(
            CriteoBinDataset::open(Path::new("/nonexistent/criteo.bin"), 1, -1),
            Err(DataError::Io { .. })
        ));
        let file = write_samples(1, 0);
        assert!(matches!(
            CriteoBinDataset::open(file.path(), 0, -1),
            Err(DataError::Config(_))
        ));
    }
}
