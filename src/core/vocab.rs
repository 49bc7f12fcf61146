//! Vocabulary and merge-table loading.
//!
//! A [`Vocab`] maps token strings to ids and back. Token strings for
//! byte-level vocabularies are in the byte-level alphabet (`Ġhello`), exactly
//! as the pre-tokenizer emits them.
//!
//! # Formats
//!
//! - HuggingFace `vocab.json`: a JSON object `{"token": id, ...}`
//! - `merges.txt`: one `left right` pair per line, highest priority first;
//!   a leading `#version` line is skipped
//! - tiktoken: `base64_token rank` per line, where the rank is also the id
//!
//! ```text
//! SGVsbG8= 0
//! V29ybGQ= 1
//! ```

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use super::byte_level::byte_level_encode;

/// Errors that can occur when loading vocabulary files.
#[derive(Error, Debug)]
pub enum VocabError {
    #[error("Invalid base64 encoding: {0}")]
    Base64Error(#[from] base64::DecodeError),
    #[error("Invalid line format: {0}")]
    ParseError(String),
    #[error("Invalid vocabulary JSON: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Bidirectional token string <-> id table.
#[derive(Debug, Clone, Default)]
pub struct Vocab {
    encoder: FxHashMap<String, u32>,
    decoder: FxHashMap<u32, String>,
}

impl Vocab {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a token. An existing string keeps its original (lowest) id, but
    /// every id remains decodable. Re-using an id replaces its string; the
    /// replaced string then encodes to its lowest remaining id, if any.
    pub fn insert(&mut self, token: impl Into<String>, id: u32) {
        let token = token.into();
        if let Some(previous) = self.decoder.insert(id, token.clone()) {
            if previous != token && self.encoder.get(&previous) == Some(&id) {
                let remaining = self
                    .decoder
                    .iter()
                    .filter(|(_, t)| **t == previous)
                    .map(|(&other, _)| other)
                    .min();
                match remaining {
                    Some(other) => self.encoder.insert(previous, other),
                    None => self.encoder.remove(&previous),
                };
            }
        }
        self.encoder.entry(token).or_insert(id);
    }

    #[inline]
    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.encoder.get(token).copied()
    }

    #[inline]
    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.decoder.get(&id).map(String::as_str)
    }

    /// Number of distinct ids.
    pub fn len(&self) -> usize {
        self.decoder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoder.is_empty()
    }

    /// One past the highest id.
    pub fn max_id_exclusive(&self) -> usize {
        self.decoder.keys().max().map_or(0, |&id| id as usize + 1)
    }

    /// Iterate over `(token, id)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.decoder.iter().map(|(&id, token)| (token.as_str(), id))
    }

    /// Parse a HuggingFace-style `{"token": id}` JSON object.
    pub fn from_json(json: &str) -> Result<Self, VocabError> {
        let entries: FxHashMap<String, u32> = serde_json::from_str(json)?;
        let vocab: Vocab = entries.into_iter().collect();
        debug!(vocab_size = vocab.len(), "loaded JSON vocabulary");
        Ok(vocab)
    }

    /// Load a `vocab.json` file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, VocabError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

impl FromIterator<(String, u32)> for Vocab {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        let mut vocab = Vocab::new();
        let mut entries: Vec<(String, u32)> = iter.into_iter().collect();
        // Lowest id wins for duplicate strings regardless of input order.
        entries.sort_unstable_by_key(|&(_, id)| id);
        for (token, id) in entries {
            vocab.insert(token, id);
        }
        vocab
    }
}

/// Parse `merges.txt` content into ordered `(left, right)` pairs.
pub fn parse_merges(text: &str) -> Result<Vec<(String, String)>, VocabError> {
    let mut merges = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() || (index == 0 && line.starts_with("#version")) {
            continue;
        }
        let (left, right) = line.split_once(' ').ok_or_else(|| {
            VocabError::ParseError(format!("merge on line {} has no separator", index + 1))
        })?;
        if left.is_empty() || right.is_empty() || right.contains(' ') {
            return Err(VocabError::ParseError(format!(
                "malformed merge on line {}: {line:?}",
                index + 1
            )));
        }
        merges.push((left.to_string(), right.to_string()));
    }
    Ok(merges)
}

/// Load a tiktoken BPE vocabulary from raw bytes.
///
/// Token bytes are re-keyed into the byte-level alphabet so the vocabulary
/// pairs with [`ByteLevelPreTokenizer`](super::pre_tokenizer::ByteLevelPreTokenizer).
pub fn load_tiktoken_bpe(data: &[u8]) -> Result<Vocab, VocabError> {
    let mut vocab = Vocab::new();

    for line in data.split(|&b| b == b'\n') {
        if line.is_empty() {
            continue;
        }

        let space_pos = line
            .iter()
            .rposition(|&b| b == b' ')
            .ok_or_else(|| VocabError::ParseError("Missing space separator".to_string()))?;

        let token = STANDARD.decode(&line[..space_pos])?;

        let rank_str = std::str::from_utf8(&line[space_pos + 1..])
            .map_err(|_| VocabError::ParseError("Invalid UTF-8 in rank".to_string()))?;
        let rank: u32 = rank_str
            .trim()
            .parse()
            .map_err(|_| VocabError::ParseError(format!("Invalid rank: {}", rank_str)))?;

        vocab.insert(byte_level_encode(&token), rank);
    }

    debug!(vocab_size = vocab.len(), "loaded tiktoken vocabulary");
    Ok(vocab)
}

/// Load a tiktoken BPE vocabulary from a file path.
pub fn load_tiktoken_bpe_file(path: impl AsRef<Path>) -> Result<Vocab, VocabError> {
    let data = std::fs::read(path)?;
    load_tiktoken_bpe(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_tiktoken_bpe() {
        // "Hello" = "SGVsbG8=", " World" = "IFdvcmxk"
        let data = b"SGVsbG8= 0\nIFdvcmxk 1\n";
        let vocab = load_tiktoken_bpe(data).unwrap();

        assert_eq!(vocab.token_to_id("Hello"), Some(0));
        assert_eq!(vocab.token_to_id("ĠWorld"), Some(1));
        assert_eq!(vocab.id_to_token(1), Some("ĠWorld"));
        assert_eq!(vocab.len(), 2);
    }

    #[test]
    fn test_load_tiktoken_rejects_bad_lines() {
        assert!(matches!(
            load_tiktoken_bpe(b"SGVsbG8=\n"),
            Err(VocabError::ParseError(_))
        ));
        assert!(matches!(
            load_tiktoken_bpe(b"SGVsbG8= x\n"),
            Err(VocabError::ParseError(_))
        ));
        assert!(matches!(
            load_tiktoken_bpe(b"!!!! 0\n"),
            Err(VocabError::Base64Error(_))
        ));
    }

    #[test]
    fn test_vocab_from_json() {
        let vocab = Vocab::from_json(r#"{"a": 0, "b": 1, "ab": 2}"#).unwrap();
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.token_to_id("ab"), Some(2));
        assert_eq!(vocab.id_to_token(0), Some("a"));
        assert_eq!(vocab.max_id_exclusive(), 3);
        assert!(Vocab::from_json("[1, 2]").is_err());
    }

    #[test]
    fn test_duplicate_string_keeps_lowest_id() {
        let vocab: Vocab = vec![("x".to_string(), 9), ("x".to_string(), 4)]
            .into_iter()
            .collect();
        assert_eq!(vocab.token_to_id("x"), Some(4));
        assert_eq!(vocab.id_to_token(9), Some("x"));
        assert_eq!(vocab.len(), 2);
    }

    #[test]
    fn test_reused_id_replaces_stale_string() {
        let mut vocab = Vocab::new();
        vocab.insert("old", 3);
        vocab.insert("new", 3);
        assert_eq!(vocab.id_to_token(3), Some("new"));
        assert_eq!(vocab.token_to_id("new"), Some(3));
        assert_eq!(vocab.token_to_id("old"), None);
        assert_eq!(vocab.len(), 1);

        // a duplicate elsewhere keeps the old string encodable
        vocab.insert("dup", 5);
        vocab.insert("dup", 8);
        vocab.insert("other", 5);
        assert_eq!(vocab.token_to_id("dup"), Some(8));
        assert_eq!(vocab.id_to_token(8), Some("dup"));
        assert_eq!(vocab.token_to_id("other"), Some(5));
    }

    #[test]
    fn test_parse_merges() {
        let merges = parse_merges("#version: 0.2\nĠ t\nh e\n\nĠt he\n").unwrap();
        assert_eq!(
            merges,
            vec![
                ("Ġ".to_string(), "t".to_string()),
                ("h".to_string(), "e".to_string()),
                ("Ġt".to_string(), "he".to_string()),
            ]
        );
        assert!(parse_merges("abc\n").is_err());
        assert!(parse_merges("a b c\n").is_err());
    }
}
