//! Splitting normalized text into pre-tokens.
//!
//! [`ByteLevelPreTokenizer`] optionally adds a leading space, splits the text
//! into word-like fragments and rewrites each fragment into the byte-level
//! alphabet (see [`byte_level`](super::byte_level)), so that every possible
//! input has a printable, reversible pre-token. All fragments of one call
//! share a single materialized string; the emitted views point into it.

use std::sync::Arc;

use fancy_regex::Regex;

use super::convert::{ByteLevelConverter, CachedConverter, Converter};
use super::pool;
use super::text_view::TextView;
use super::tokenizer::TokenizerError;

/// GPT-2 split pattern: contractions, letter runs, digit runs, punctuation
/// runs (each optionally led by one space), then whitespace.
pub const GPT2_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

/// Split pattern for cl100k_base (GPT-4, GPT-3.5-turbo).
pub const CL100K_BASE_PATTERN: &str = r"(?i:'s|'t|'re|'ve|'m|'ll|'d)|[^\r\n\p{L}\p{N}]?\p{L}+|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n]*|\s*[\r\n]+|\s+(?!\S)|\s+";

/// Splits a normalized view into fragments appended to `output`.
pub trait PreTokenizer: Send + Sync {
    fn pre_tokenize(
        &self,
        view: &TextView,
        output: &mut Vec<TextView>,
    ) -> Result<(), TokenizerError>;
}

/// Fragment boundary strategy.
pub enum Splitter {
    /// The whole input is one fragment.
    Whole,
    /// Regex matches and the gaps between them each become a fragment.
    Regex(Box<Regex>),
}

impl Splitter {
    /// The GPT-2 word/punctuation/whitespace splitter.
    pub fn gpt2() -> Result<Self, TokenizerError> {
        Self::pattern(GPT2_PATTERN)
    }

    /// A splitter from a custom pattern.
    pub fn pattern(pattern: &str) -> Result<Self, TokenizerError> {
        Ok(Self::Regex(Box::new(Regex::new(pattern)?)))
    }

    /// Append the fragments of `view` to `output` as sub-views.
    pub fn split(&self, view: &TextView, output: &mut Vec<TextView>) -> Result<(), TokenizerError> {
        if view.is_empty() {
            return Ok(());
        }
        let regex = match self {
            Splitter::Whole => {
                output.push(view.clone());
                return Ok(());
            }
            Splitter::Regex(regex) => regex,
        };

        let mut last_end = 0;
        for m in regex.find_iter(view.as_str()) {
            let m = m?;
            if m.start() > last_end {
                output.extend(view.slice(last_end..m.start()));
            }
            if m.end() > m.start() {
                output.extend(view.slice(m.start()..m.end()));
            }
            last_end = m.end();
        }
        if last_end < view.len() {
            output.extend(view.slice(last_end..view.len()));
        }
        Ok(())
    }
}

/// Byte-level pre-tokenizer used by GPT-2 style vocabularies.
pub struct ByteLevelPreTokenizer {
    add_prefix_space: bool,
    splitter: Splitter,
    converter: CachedConverter<ByteLevelConverter, Arc<str>>,
}

impl ByteLevelPreTokenizer {
    /// Create a byte-level pre-tokenizer.
    ///
    /// # Arguments
    /// * `add_prefix_space` - Prepend a space when the input does not start with whitespace
    /// * `use_regex` - Split with the GPT-2 pattern; otherwise the input is one fragment
    pub fn new(add_prefix_space: bool, use_regex: bool) -> Result<Self, TokenizerError> {
        let splitter = if use_regex {
            Splitter::gpt2()?
        } else {
            Splitter::Whole
        };
        Ok(Self::with_splitter(add_prefix_space, splitter))
    }

    pub fn with_splitter(add_prefix_space: bool, splitter: Splitter) -> Self {
        Self {
            add_prefix_space,
            splitter,
            converter: CachedConverter::new(ByteLevelConverter),
        }
    }

    pub fn add_prefix_space(&self) -> bool {
        self.add_prefix_space
    }

    /// Number of fragments whose byte-level form is memoized.
    pub fn cache_len(&self) -> usize {
        self.converter.cache_len()
    }

    pub fn clear_cache(&self) {
        self.converter.clear_cache();
    }

    fn with_prefix(&self, view: &TextView) -> TextView {
        let starts_with_space = view.chars().next().is_some_and(char::is_whitespace);
        if !self.add_prefix_space || starts_with_space {
            return view.clone();
        }
        pool::with_string(|buf| {
            buf.push(' ');
            buf.push_str(view);
            TextView::new(buf.as_str())
        })
    }
}

impl PreTokenizer for ByteLevelPreTokenizer {
    fn pre_tokenize(
        &self,
        view: &TextView,
        output: &mut Vec<TextView>,
    ) -> Result<(), TokenizerError> {
        if view.is_empty() {
            return Ok(());
        }
        let text = self.with_prefix(view);

        pool::with_views(|fragments| -> Result<(), TokenizerError> {
            self.splitter.split(&text, fragments)?;

            pool::with_offsets(|ends| {
                pool::with_string(|mapped| {
                    for fragment in fragments.iter() {
                        mapped.push_str(&self.converter.convert(fragment));
                        ends.push(mapped.len());
                    }

                    let source: Arc<str> = Arc::from(mapped.as_str());
                    let mut start = 0;
                    for &end in ends.iter() {
                        output.extend(TextView::from_parts(Arc::clone(&source), start, end - start));
                        start = end;
                    }
                })
            });
            Ok(())
        })
    }
}

/// Passes the whole input through as one fragment, without byte mapping.
///
/// Suits vocabularies over plain Unicode pieces that rely on byte fallback
/// for anything they do not cover.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPreTokenizer;

impl PreTokenizer for IdentityPreTokenizer {
    fn pre_tokenize(
        &self,
        view: &TextView,
        output: &mut Vec<TextView>,
    ) -> Result<(), TokenizerError> {
        if !view.is_empty() {
            output.push(view.clone());
        }
        Ok(())
    }
}
