//! Token strings back to text.
//!
//! Each [`Decoder`] maps a list of token strings to a list of output
//! fragments; the final text is their concatenation. Decoders never fail:
//! malformed byte content degrades to U+FFFD.

use super::byte_level::byte_level_byte;
use super::convert::parse_byte_token;
use super::pool;
use super::tokenizer::TokenizerError;

const REPLACEMENT: &str = "\u{FFFD}";

/// Rewrites a token list into output fragments appended to `output`.
pub trait Decoder: Send + Sync {
    fn decode_chain(&self, tokens: &[String], output: &mut Vec<String>);

    /// Decode straight to the concatenated text.
    fn decode(&self, tokens: &[String]) -> String {
        pool::with_pieces(|pieces| {
            self.decode_chain(tokens, pieces);
            pieces.concat()
        })
    }
}

/// Joins every token into one fragment.
#[derive(Debug, Clone, Copy, Default)]
pub struct FuseDecoder;

impl Decoder for FuseDecoder {
    fn decode_chain(&self, tokens: &[String], output: &mut Vec<String>) {
        if !tokens.is_empty() {
            output.push(tokens.concat());
        }
    }
}

/// Literal replacement applied to each token on its own.
#[derive(Debug, Clone)]
pub struct ReplaceDecoder {
    pattern: String,
    content: String,
}

impl ReplaceDecoder {
    pub fn new(
        pattern: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Self, TokenizerError> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(TokenizerError::EmptyArgument {
                stage: "ReplaceDecoder",
                field: "pattern",
            });
        }
        Ok(Self {
            pattern,
            content: content.into(),
        })
    }
}

impl Decoder for ReplaceDecoder {
    fn decode_chain(&self, tokens: &[String], output: &mut Vec<String>) {
        for token in tokens {
            output.push(token.replace(self.pattern.as_str(), &self.content));
        }
    }
}

/// Merges runs of `<0xHH>` tokens and decodes them as UTF-8.
///
/// A run that is not valid UTF-8 becomes one U+FFFD per byte, so output
/// length still tracks the number of malformed bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteFallbackDecoder;

impl ByteFallbackDecoder {
    fn flush(bytes: &mut Vec<u8>, output: &mut Vec<String>) {
        if bytes.is_empty() {
            return;
        }
        match std::str::from_utf8(bytes) {
            Ok(text) => output.push(text.to_string()),
            Err(_) => output.extend((0..bytes.len()).map(|_| REPLACEMENT.to_string())),
        }
        bytes.clear();
    }
}

impl Decoder for ByteFallbackDecoder {
    fn decode_chain(&self, tokens: &[String], output: &mut Vec<String>) {
        pool::with_bytes(|bytes| {
            for token in tokens {
                match parse_byte_token(token) {
                    Some(byte) => bytes.push(byte),
                    None => {
                        Self::flush(bytes, output);
                        output.push(token.clone());
                    }
                }
            }
            Self::flush(bytes, output);
        })
    }
}

/// Maps byte-level characters back to raw bytes and decodes them lossily.
///
/// Characters outside the byte-level alphabet (added tokens, for example)
/// contribute their own UTF-8 bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteLevelDecoder;

impl Decoder for ByteLevelDecoder {
    fn decode_chain(&self, tokens: &[String], output: &mut Vec<String>) {
        if tokens.is_empty() {
            return;
        }
        pool::with_bytes(|bytes| {
            let mut buf = [0u8; 4];
            for ch in tokens.iter().flat_map(|t| t.chars()) {
                match byte_level_byte(ch) {
                    Some(byte) => bytes.push(byte),
                    None => bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes()),
                }
            }
            output.push(String::from_utf8_lossy(bytes).into_owned());
        })
    }
}

/// Decoders applied in order, each to the previous one's fragments.
#[derive(Default)]
pub struct DecoderSequence {
    decoders: Vec<Box<dyn Decoder>>,
}

impl DecoderSequence {
    pub fn new(decoders: Vec<Box<dyn Decoder>>) -> Self {
        Self { decoders }
    }

    pub fn push(&mut self, decoder: Box<dyn Decoder>) {
        self.decoders.push(decoder);
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl Decoder for DecoderSequence {
    fn decode_chain(&self, tokens: &[String], output: &mut Vec<String>) {
        let Some((last, init)) = self.decoders.split_last() else {
            output.extend_from_slice(tokens);
            return;
        };
        pool::with_pieces(|current| {
            current.extend_from_slice(tokens);
            pool::with_pieces(|next| {
                for decoder in init {
                    next.clear();
                    decoder.decode_chain(current, next);
                    std::mem::swap(current, next);
                }
            });
            last.decode_chain(current, output);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn chain(decoder: &dyn Decoder, tokens: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        decoder.decode_chain(&strings(tokens), &mut out);
        out
    }

    #[test]
    fn test_byte_fallback_valid_run() {
        assert_eq!(chain(&ByteFallbackDecoder, &["<0x41>", "<0x42>"]), vec!["AB"]);
        assert_eq!(ByteFallbackDecoder.decode(&strings(&["<0x41>", "<0x42>"])), "AB");
        assert_eq!(
            chain(&ByteFallbackDecoder, &["<0xC3>", "<0xA9>", "t"]),
            vec!["é", "t"]
        );
    }

    #[test]
    fn test_byte_fallback_invalid_run() {
        assert_eq!(
            chain(&ByteFallbackDecoder, &["<0xFF>", "<0xFE>"]),
            vec!["\u{FFFD}", "\u{FFFD}"]
        );
        // a truncated multi-byte sequence is invalid as a whole
        assert_eq!(
            chain(&ByteFallbackDecoder, &["a", "<0xE2>", "<0x82>", "b"]),
            vec!["a", "\u{FFFD}", "\u{FFFD}", "b"]
        );
    }

    #[test]
    fn test_byte_fallback_passes_malformed_tokens() {
        assert_eq!(
            chain(&ByteFallbackDecoder, &["<0x4>", "<0xZZ>", "<0x041>"]),
            vec!["<0x4>", "<0xZZ>", "<0x041>"]
        );
    }

    #[test]
    fn test_runs_split_by_regular_tokens() {
        assert_eq!(
            chain(&ByteFallbackDecoder, &["<0x41>", "x", "<0x42>"]),
            vec!["A", "x", "B"]
        );
    }

    #[test]
    fn test_fuse_and_replace() {
        assert_eq!(chain(&FuseDecoder, &["a", "b", "c"]), vec!["abc"]);
        assert!(chain(&FuseDecoder, &[]).is_empty());
        assert_eq!(
            chain(&ReplaceDecoder::new("▁", " ").unwrap(), &["▁Hey", "▁friend"]),
            vec![" Hey", " friend"]
        );
    }

    #[test]
    fn test_replace_rejects_empty_pattern() {
        assert!(matches!(
            ReplaceDecoder::new("", " "),
            Err(TokenizerError::EmptyArgument {
                stage: "ReplaceDecoder",
                field: "pattern",
            })
        ));
    }

    #[test]
    fn test_byte_level_decoder() {
        assert_eq!(
            ByteLevelDecoder.decode(&strings(&["Hello", "Ġworld", "Ċ"])),
            "Hello world\n"
        );
        assert_eq!(ByteLevelDecoder.decode(&strings(&["ä½ł", "å¥½"])), "你好");
        // a lone continuation byte decodes lossily
        assert_eq!(ByteLevelDecoder.decode(&strings(&["Ĥ"])), "\u{FFFD}");
    }

    #[test]
    fn test_sequence() {
        let sequence = DecoderSequence::new(vec![
            Box::new(ReplaceDecoder::new("▁", " ").unwrap()),
            Box::new(ByteFallbackDecoder),
            Box::new(FuseDecoder),
        ]);
        assert_eq!(
            chain(&sequence, &["▁Hi", "<0x21>", "▁", "<0xFF>"]),
            vec![" Hi! \u{FFFD}"]
        );
        assert_eq!(
            chain(&DecoderSequence::default(), &["a", "b"]),
            vec!["a", "b"]
        );
    }
}
