//! Batch padding with attention masks.
//!
//! A [`PaddingSizeProvider`] picks the target length from the batch lengths;
//! a [`Padding`] strategy places filler on one side. Padding never shortens a
//! sequence: a target below an input length is an error, and windowing long
//! inputs is the job of [`truncation`](super::truncation).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::encoding::{Encoding, Token};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PaddingError {
    #[error("sequence of length {length} exceeds padding target {target}")]
    SequenceTooLong { length: usize, target: usize },
}

/// One padded sequence. `attention_mask[i]` is 0 only for filler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaddedSequence {
    pub ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
}

impl PaddedSequence {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of real (attended) tokens.
    pub fn attended(&self) -> usize {
        self.attention_mask.iter().filter(|&&flag| flag == 1).count()
    }
}

/// Chooses the padded length for a batch.
pub trait PaddingSizeProvider: Send + Sync {
    fn padding_size(&self, lengths: &[usize]) -> usize;
}

/// Pad to the longest sequence in the batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchLongestSizeProvider;

impl PaddingSizeProvider for BatchLongestSizeProvider {
    fn padding_size(&self, lengths: &[usize]) -> usize {
        lengths.iter().copied().max().unwrap_or(0)
    }
}

/// Pad to a constant length.
#[derive(Debug, Clone, Copy)]
pub struct FixedPaddingSizeProvider(pub usize);

impl PaddingSizeProvider for FixedPaddingSizeProvider {
    fn padding_size(&self, _lengths: &[usize]) -> usize {
        self.0
    }
}

/// Round another provider's target up to a multiple of `multiple`.
pub struct MultipleOfSizeProvider<P> {
    inner: P,
    multiple: usize,
}

impl<P: PaddingSizeProvider> MultipleOfSizeProvider<P> {
    /// A `multiple` of 0 or 1 leaves the inner target unchanged.
    pub fn new(inner: P, multiple: usize) -> Self {
        Self { inner, multiple }
    }
}

impl<P: PaddingSizeProvider> PaddingSizeProvider for MultipleOfSizeProvider<P> {
    fn padding_size(&self, lengths: &[usize]) -> usize {
        let size = self.inner.padding_size(lengths);
        if self.multiple > 1 && size % self.multiple != 0 {
            size + self.multiple - size % self.multiple
        } else {
            size
        }
    }
}

/// Filler placement strategy.
pub trait Padding: Send + Sync {
    fn pad(
        &self,
        batch: &[Encoding],
        size: &dyn PaddingSizeProvider,
        pad_token: &Token,
    ) -> Result<Vec<PaddedSequence>, PaddingError>;
}

/// Side of the sequence that receives filler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaddingDirection {
    Left,
    Right,
}

fn pad_batch(
    batch: &[Encoding],
    size: &dyn PaddingSizeProvider,
    pad_token: &Token,
    direction: PaddingDirection,
) -> Result<Vec<PaddedSequence>, PaddingError> {
    let lengths: Vec<usize> = batch.iter().map(Encoding::len).collect();
    let target = size.padding_size(&lengths);

    batch
        .iter()
        .map(|encoding| {
            let length = encoding.len();
            if length > target {
                return Err(PaddingError::SequenceTooLong { length, target });
            }
            let filler = target - length;
            let mut ids = Vec::with_capacity(target);
            let mut attention_mask = Vec::with_capacity(target);
            if direction == PaddingDirection::Left {
                ids.resize(filler, pad_token.id);
                attention_mask.resize(filler, 0);
            }
            ids.extend_from_slice(encoding.ids());
            attention_mask.resize(attention_mask.len() + length, 1);
            if direction == PaddingDirection::Right {
                ids.resize(target, pad_token.id);
                attention_mask.resize(target, 0);
            }
            Ok(PaddedSequence {
                ids,
                attention_mask,
            })
        })
        .collect()
}

/// Filler after the real tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct RightPadding;

impl Padding for RightPadding {
    fn pad(
        &self,
        batch: &[Encoding],
        size: &dyn PaddingSizeProvider,
        pad_token: &Token,
    ) -> Result<Vec<PaddedSequence>, PaddingError> {
        pad_batch(batch, size, pad_token, PaddingDirection::Right)
    }
}

/// Filler before the real tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeftPadding;

impl Padding for LeftPadding {
    fn pad(
        &self,
        batch: &[Encoding],
        size: &dyn PaddingSizeProvider,
        pad_token: &Token,
    ) -> Result<Vec<PaddedSequence>, PaddingError> {
        pad_batch(batch, size, pad_token, PaddingDirection::Left)
    }
}

/// No filler; every token is attended and lengths stay ragged.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPadding;

impl Padding for DefaultPadding {
    fn pad(
        &self,
        batch: &[Encoding],
        _size: &dyn PaddingSizeProvider,
        _pad_token: &Token,
    ) -> Result<Vec<PaddedSequence>, PaddingError> {
        Ok(batch
            .iter()
            .map(|encoding| PaddedSequence {
                ids: encoding.ids().to_vec(),
                attention_mask: vec![1; encoding.len()],
            })
            .collect())
    }
}

/// How the padded length is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaddingStrategy {
    #[default]
    BatchLongest,
    Fixed(usize),
}

/// Configured padding for a tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddingParams {
    pub strategy: PaddingStrategy,
    /// `None` leaves sequences ragged.
    pub direction: Option<PaddingDirection>,
    pub pad_to_multiple_of: Option<usize>,
    pub pad_token: Token,
}

impl PaddingParams {
    pub fn new(
        strategy: PaddingStrategy,
        direction: Option<PaddingDirection>,
        pad_token: Token,
    ) -> Self {
        Self {
            strategy,
            direction,
            pad_to_multiple_of: None,
            pad_token,
        }
    }

    pub fn pad_to_multiple_of(mut self, multiple: usize) -> Self {
        self.pad_to_multiple_of = Some(multiple);
        self
    }

    pub fn pad(&self, batch: &[Encoding]) -> Result<Vec<PaddedSequence>, PaddingError> {
        let padding: &dyn Padding = match self.direction {
            Some(PaddingDirection::Left) => &LeftPadding,
            Some(PaddingDirection::Right) => &RightPadding,
            None => &DefaultPadding,
        };
        let multiple = self.pad_to_multiple_of.unwrap_or(0);
        match self.strategy {
            PaddingStrategy::BatchLongest => padding.pad(
                batch,
                &MultipleOfSizeProvider::new(BatchLongestSizeProvider, multiple),
                &self.pad_token,
            ),
            PaddingStrategy::Fixed(size) => padding.pad(
                batch,
                &MultipleOfSizeProvider::new(FixedPaddingSizeProvider(size), multiple),
                &self.pad_token,
            ),
        }
    }
}
