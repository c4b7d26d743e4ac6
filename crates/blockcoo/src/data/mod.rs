//! Datasets feeding block-sparse experiments.
//!
//! - [`CharDataset`]: character-level language-model corpus with overlapping
//!   windows.
//! - [`CriteoBinDataset`]: random-access reader for pre-batched binary
//!   Criteo click logs.

mod char_lm;
mod criteo;

pub use char_lm::{CharBatch, CharBatches, CharDataset, CharVocab, TokenId};
pub use criteo::{
    BYTES_PER_FEATURE, CATEGORICAL_FEATURES, CriteoBatch, CriteoBinDataset, DENSE_FEATURES,
    LABEL_FEATURES, TOTAL_FEATURES,
};
