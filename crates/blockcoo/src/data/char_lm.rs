//! Character-level language-model corpus.
//!
//! A [`CharVocab`] maps characters to token ids; a [`CharDataset`] holds a
//! tokenized corpus and cuts it into `(batch_size, sequence_length)` training
//! batches where the targets are the inputs shifted by one token.

use std::collections::HashMap;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::config::CharBatchConfig;
use crate::error::{ConfigError, DataError};
use crate::tensor::DenseTensor;

/// Token id of a character.
pub type TokenId = u32;

/// Ordered character vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct CharVocab {
    chars: Vec<char>,
    index: HashMap<char, TokenId>,
}

impl CharVocab {
    /// Build from characters in id order. A repeated character maps to its
    /// last position.
    pub fn new(chars: Vec<char>) -> Self {
        let index = chars
            .iter()
            .enumerate()
            .map(|(id, &c)| (c, id as TokenId))
            .collect();
        Self { chars, index }
    }

    /// Load a JSON array of single-character strings.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Io`] if the file cannot be read and
    /// [`DataError::InvalidVocab`] if it is not such an array.
    pub fn from_path(path: &Path) -> Result<Self, DataError> {
        let text = std::fs::read_to_string(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: Vec<String> = serde_json::from_str(&text).map_err(|e| DataError::InvalidVocab {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut chars = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let mut it = entry.chars();
            match (it.next(), it.next()) {
                (Some(c), None) => chars.push(c),
                _ => {
                    return Err(DataError::InvalidVocab {
                        path: path.to_path_buf(),
                        message: format!("entry {} ({:?}) is not a single character", i, entry),
                    });
                }
            }
        }
        Ok(Self::new(chars))
    }

    /// Token ids of `text`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::UnknownCharacter`] for the first character missing
    /// from the vocabulary.
    pub fn str_to_ids(&self, text: &str) -> Result<Vec<TokenId>, DataError> {
        text.chars()
            .map(|c| self.index.get(&c).copied().ok_or(DataError::UnknownCharacter(c)))
            .collect()
    }

    /// Text of `ids`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::UnknownToken`] for the first id outside the
    /// vocabulary.
    pub fn ids_to_str(&self, ids: &[TokenId]) -> Result<String, DataError> {
        ids.iter()
            .map(|&id| {
                self.chars.get(id as usize).copied().ok_or(DataError::UnknownToken {
                    id: i64::from(id),
                    size: self.chars.len(),
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }
}

/// One training batch.
///
/// `x` and `y` are row-major `(batch_size, sequence_length)` token ids with
/// `y[b][t] == corpus[start_b + t + 1]`. `mask` is 1.0 where the position is
/// at or past `overlap_length`, 0.0 before it.
#[derive(Debug, Clone, PartialEq)]
pub struct CharBatch {
    pub x: Vec<TokenId>,
    pub y: Vec<TokenId>,
    pub mask: DenseTensor<f32>,
    pub starts: Vec<usize>,
    sequence_length: usize,
}

impl CharBatch {
    pub fn batch_size(&self) -> usize {
        self.starts.len()
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    /// Input tokens of sequence `b`.
    pub fn x_row(&self, b: usize) -> &[TokenId] {
        &self.x[b * self.sequence_length..(b + 1) * self.sequence_length]
    }

    /// Target tokens of sequence `b`.
    pub fn y_row(&self, b: usize) -> &[TokenId] {
        &self.y[b * self.sequence_length..(b + 1) * self.sequence_length]
    }
}

/// A tokenized text corpus.
#[derive(Debug, Clone)]
pub struct CharDataset {
    vocab: CharVocab,
    tokens: Vec<TokenId>,
}

impl CharDataset {
    /// Tokenize `text` with `vocab`.
    pub fn new(vocab: CharVocab, text: &str) -> Result<Self, DataError> {
        let tokens = vocab.str_to_ids(text)?;
        Ok(Self { vocab, tokens })
    }

    /// Load a JSON vocabulary and a UTF-8 text corpus.
    pub fn from_path(vocab_path: &Path, text_path: &Path) -> Result<Self, DataError> {
        let vocab = CharVocab::from_path(vocab_path)?;
        let text = std::fs::read_to_string(text_path).map_err(|source| DataError::Io {
            path: text_path.to_path_buf(),
            source,
        })?;
        let dataset = Self::new(vocab, &text)?;
        info!(
            "CharDataset: {} tokens, vocabulary of {} (text={})",
            dataset.len(),
            dataset.vocab.len(),
            text_path.display()
        );
        Ok(dataset)
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn vocab(&self) -> &CharVocab {
        &self.vocab
    }

    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    /// Iterate over training batches.
    ///
    /// Without a seed, window starts walk `0, shift, 2*shift, ...` while below
    /// `len - sequence_length`, and only complete batches are produced. With a
    /// seed, starts are drawn uniformly from `[0, len - sequence_length)` and
    /// the iterator never ends.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Config`] for an invalid `config` or a corpus not
    /// longer than `sequence_length`.
    pub fn batches(&self, config: &CharBatchConfig) -> Result<CharBatches<'_>, DataError> {
        config.validate()?;
        if self.len() <= config.sequence_length {
            return Err(ConfigError::invalid(
                "sequence_length",
                format!(
                    "corpus of {} tokens is too short for sequences of {}",
                    self.len(),
                    config.sequence_length
                ),
            )
            .into());
        }
        let end = self.len() - config.sequence_length;
        let starts = match config.seed {
            None => Starts::Sequential {
                next: 0,
                end,
                shift: config.shift(),
            },
            Some(seed) => Starts::Random {
                rng: StdRng::seed_from_u64(seed),
                end,
            },
        };
        let mask = DenseTensor::from_fn(&[config.batch_size, config.sequence_length], |ix| {
            if ix[1] >= config.overlap_length { 1.0 } else { 0.0 }
        });
        Ok(CharBatches {
            tokens: &self.tokens,
            starts,
            batch_size: config.batch_size,
            sequence_length: config.sequence_length,
            mask,
        })
    }
}

enum Starts {
    Sequential { next: usize, end: usize, shift: usize },
    Random { rng: StdRng, end: usize },
}

impl Iterator for Starts {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match self {
            Starts::Sequential { next, end, shift } => {
                if *next >= *end {
                    return None;
                }
                let start = *next;
                *next += *shift;
                Some(start)
            }
            Starts::Random { rng, end } => Some(rng.random_range(0..*end)),
        }
    }
}

/// Iterator returned by [`CharDataset::batches`].
pub struct CharBatches<'a> {
    tokens: &'a [TokenId],
    starts: Starts,
    batch_size: usize,
    sequence_length: usize,
    mask: DenseTensor<f32>,
}

impl Iterator for CharBatches<'_> {
    type Item = CharBatch;

    fn next(&mut self) -> Option<Self::Item> {
        let starts: Vec<usize> = self.starts.by_ref().take(self.batch_size).collect();
        if starts.len() < self.batch_size {
            return None;
        }

        let len = self.sequence_length;
        let mut x = Vec::with_capacity(self.batch_size * len);
        let mut y = Vec::with_capacity(self.batch_size * len);
        for &start in &starts {
            x.extend_from_slice(&self.tokens[start..start + len]);
            y.extend_from_slice(&self.tokens[start + 1..start + len + 1]);
        }
        Some(CharBatch {
            x,
            y,
            mask: self.mask.clone(),
            starts,
            sequence_length: len,
        })
    }
}
