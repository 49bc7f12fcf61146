//! Tokenization results.

use serde::{Deserialize, Serialize};

/// A vocabulary entry: id plus its canonical string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub id: u32,
    pub value: String,
}

impl Token {
    pub fn new(id: u32, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }
}

/// Token ids of one input with their parallel token strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encoding {
    ids: Vec<u32>,
    tokens: Vec<String>,
}

impl Encoding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: Vec::with_capacity(capacity),
            tokens: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn push(&mut self, id: u32, token: impl Into<String>) {
        self.ids.push(id);
        self.tokens.push(token.into());
    }

    pub fn push_token(&mut self, token: &Token) {
        self.push(token.id, token.value.as_str());
    }

    /// Append every entry of `other`.
    pub fn extend(&mut self, other: &Encoding) {
        self.ids.extend_from_slice(&other.ids);
        self.tokens.extend_from_slice(&other.tokens);
    }

    /// Copy of the entries in `offset..offset + length`, clamped to bounds.
    pub fn slice(&self, offset: usize, length: usize) -> Encoding {
        let start = offset.min(self.len());
        let end = offset.saturating_add(length).min(self.len());
        Encoding {
            ids: self.ids[start..end].to_vec(),
            tokens: self.tokens[start..end].to_vec(),
        }
    }

    pub fn into_ids(self) -> Vec<u32> {
        self.ids
    }

    pub fn into_parts(self) -> (Vec<u32>, Vec<String>) {
        (self.ids, self.tokens)
    }
}

impl FromIterator<Token> for Encoding {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        let mut encoding = Encoding::new();
        for token in iter {
            encoding.ids.push(token.id);
            encoding.tokens.push(token.value);
        }
        encoding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Encoding {
        ["a", "b", "c", "d"]
            .iter()
            .enumerate()
            .map(|(id, t)| Token::new(id as u32, *t))
            .collect()
    }

    #[test]
    fn test_parallel_sequences() {
        let mut encoding = sample();
        encoding.push(9, "z");
        assert_eq!(encoding.len(), 5);
        assert_eq!(encoding.ids(), &[0, 1, 2, 3, 9]);
        assert_eq!(encoding.tokens()[4], "z");
    }

    #[test]
    fn test_slice_clamps() {
        let encoding = sample();
        assert_eq!(encoding.slice(1, 2).ids(), &[1, 2]);
        assert_eq!(encoding.slice(3, 10).tokens(), &["d".to_string()]);
        assert!(encoding.slice(7, 1).is_empty());
    }

    #[test]
    fn test_extend_and_serde() {
        let mut encoding = sample();
        encoding.extend(&sample());
        assert_eq!(encoding.len(), 8);

        let json = serde_json::to_string(&encoding).unwrap();
        let back: Encoding = serde_json::from_str(&json).unwrap();
        assert_eq!(back, encoding);
    }
}
