//! Sliding-window range generation for over-length sequences.
//!
//! Consecutive windows overlap by `stride` positions, so each step advances
//! by `window - stride`. The union of the ranges is always `[0, length)`.
//!
//! ```text
//! length 10, window 4, stride 1
//! right: [0,4) [3,7) [6,10)
//! left:  [0,4) [3,7) [6,10)   (anchored at the end, walked back)
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TruncationError {
    #[error("truncation window must be greater than zero")]
    ZeroWindow,
    #[error("stride {stride} must be smaller than the window {window}")]
    StrideTooLarge { stride: usize, window: usize },
}

/// Half-open window `[offset, offset + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub offset: usize,
    pub length: usize,
}

impl Range {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Produces windows covering a sequence, in ascending offset order.
pub trait RangeGenerator: Send + Sync {
    fn ranges(&self, length: usize, window: usize, stride: usize)
        -> Result<Vec<Range>, TruncationError>;
}

fn validate(window: usize, stride: usize) -> Result<(), TruncationError> {
    if window == 0 {
        return Err(TruncationError::ZeroWindow);
    }
    if stride >= window {
        return Err(TruncationError::StrideTooLarge { stride, window });
    }
    Ok(())
}

/// First window at offset 0; the last one is clamped to end at `length`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RightDirectionRangeGenerator;

impl RangeGenerator for RightDirectionRangeGenerator {
    fn ranges(
        &self,
        length: usize,
        window: usize,
        stride: usize,
    ) -> Result<Vec<Range>, TruncationError> {
        validate(window, stride)?;
        let step = window - stride;
        let mut ranges = Vec::with_capacity(length.div_ceil(step));
        let mut offset = 0;
        while offset < length {
            let end = (offset + window).min(length);
            ranges.push(Range::new(offset, end - offset));
            if end == length {
                break;
            }
            offset += step;
        }
        Ok(ranges)
    }
}

/// Last window ends at `length`; the first one is clamped to start at 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeftDirectionRangeGenerator;

impl RangeGenerator for LeftDirectionRangeGenerator {
    fn ranges(
        &self,
        length: usize,
        window: usize,
        stride: usize,
    ) -> Result<Vec<Range>, TruncationError> {
        validate(window, stride)?;
        let step = window - stride;
        let mut ranges = Vec::with_capacity(length.div_ceil(step));
        let mut end = length;
        while end > 0 {
            let start = end.saturating_sub(window);
            ranges.push(Range::new(start, end - start));
            if start == 0 {
                break;
            }
            end -= step;
        }
        ranges.reverse();
        Ok(ranges)
    }
}

/// Which end of the sequence the windows are anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TruncationDirection {
    Left,
    #[default]
    Right,
}

impl TruncationDirection {
    pub fn generator(self) -> &'static dyn RangeGenerator {
        match self {
            TruncationDirection::Left => &LeftDirectionRangeGenerator,
            TruncationDirection::Right => &RightDirectionRangeGenerator,
        }
    }
}

/// Window size, overlap and anchoring for long inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncationParams {
    pub max_length: usize,
    #[serde(default)]
    pub stride: usize,
    #[serde(default)]
    pub direction: TruncationDirection,
}

impl TruncationParams {
    pub fn new(max_length: usize, stride: usize, direction: TruncationDirection) -> Self {
        Self {
            max_length,
            stride,
            direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(ranges: &[Range]) -> Vec<(usize, usize)> {
        ranges.iter().map(|r| (r.offset, r.end())).collect()
    }

    #[test]
    fn test_right_windows() {
        let ranges = RightDirectionRangeGenerator.ranges(10, 4, 1).unwrap();
        assert_eq!(spans(&ranges), vec![(0, 4), (3, 7), (6, 10)]);

        let ranges = RightDirectionRangeGenerator.ranges(9, 4, 0).unwrap();
        assert_eq!(spans(&ranges), vec![(0, 4), (4, 8), (8, 9)]);
    }

    #[test]
    fn test_left_windows() {
        let ranges = LeftDirectionRangeGenerator.ranges(9, 4, 0).unwrap();
        assert_eq!(spans(&ranges), vec![(0, 1), (1, 5), (5, 9)]);

        let ranges = LeftDirectionRangeGenerator.ranges(10, 4, 2).unwrap();
        assert_eq!(spans(&ranges), vec![(0, 4), (2, 6), (4, 8), (6, 10)]);
    }

    #[test]
    fn test_short_input_single_range() {
        for generator in [TruncationDirection::Left, TruncationDirection::Right] {
            let ranges = generator.generator().ranges(3, 8, 2).unwrap();
            assert_eq!(ranges, vec![Range::new(0, 3)]);
            let ranges = generator.generator().ranges(8, 8, 2).unwrap();
            assert_eq!(ranges, vec![Range::new(0, 8)]);
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(RightDirectionRangeGenerator.ranges(0, 4, 1).unwrap().is_empty());
        assert!(LeftDirectionRangeGenerator.ranges(0, 4, 1).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_configuration() {
        assert_eq!(
            RightDirectionRangeGenerator.ranges(10, 4, 4),
            Err(TruncationError::StrideTooLarge { stride: 4, window: 4 })
        );
        assert_eq!(
            LeftDirectionRangeGenerator.ranges(10, 0, 0),
            Err(TruncationError::ZeroWindow)
        );
    }

    #[test]
    fn test_params_deserialize_defaults() {
        let params: TruncationParams = serde_json::from_str(r#"{"max_length": 16}"#).unwrap();
        assert_eq!(params, TruncationParams::new(16, 0, TruncationDirection::Right));
    }
}
