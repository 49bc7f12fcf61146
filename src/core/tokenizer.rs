use aho_corasick::{AhoCorasick, MatchKind};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use super::bpe::Model;
use super::decoder::{Decoder, DecoderSequence};
use super::encoding::{Encoding, Token};
use super::normalizer::{Normalizer, NormalizerSequence};
use super::padding::{
    BatchLongestSizeProvider, DefaultPadding, PaddedSequence, Padding, PaddingError, PaddingParams,
};
use super::pool;
use super::post_processor::{DefaultPostProcessor, PostProcessor};
use super::pre_tokenizer::{IdentityPreTokenizer, PreTokenizer};
use super::text_view::TextView;
use super::truncation::{TruncationError, TruncationParams};
use super::vocab::VocabError;

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Regex error: {0}")]
    RegexError(#[from] fancy_regex::Error),
    #[error("Vocabulary error: {0}")]
    VocabError(#[from] VocabError),
    #[error("Aho-Corasick build error: {0}")]
    AhoCorasickError(#[from] aho_corasick::BuildError),
    #[error("Invalid configuration JSON: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Padding error: {0}")]
    PaddingError(#[from] PaddingError),
    #[error("Truncation error: {0}")]
    TruncationError(#[from] TruncationError),
    #[error("{stage}: {field} must not be empty")]
    EmptyArgument {
        stage: &'static str,
        field: &'static str,
    },
    #[error("No vocabulary entry, byte fallback or unknown token for {0:?}")]
    UnknownSymbol(String),
    #[error("Token {0:?} is not in the vocabulary")]
    UnknownToken(String),
}

/// End-to-end text <-> token id pipeline.
///
/// Encoding runs: special-token split, normalizers, pre-tokenizer, model,
/// post-processor. Decoding maps ids back to token strings and runs the
/// decoder chain.
///
/// A `Tokenizer` is `Send + Sync`. Scratch buffers come from thread-local
/// pools, so the batch methods fan out over rayon workers without sharing
/// them; only the model's fragment cache is behind a lock.
pub struct Tokenizer {
    normalizer: NormalizerSequence,
    pre_tokenizer: Box<dyn PreTokenizer>,
    model: Box<dyn Model>,
    post_processor: Box<dyn PostProcessor>,
    decoder: DecoderSequence,
    /// Special tokens in matcher pattern order.
    special_tokens: Vec<Token>,
    special_tokens_decoder: FxHashMap<u32, String>,
    special_matcher: Option<AhoCorasick>,
    padding: Option<PaddingParams>,
    truncation: Option<TruncationParams>,
}

impl Tokenizer {
    /// Create a tokenizer around `model` with pass-through stages: no
    /// normalizers, the whole input as one fragment, plain concatenation and
    /// a decoder chain that returns the token strings as they are.
    pub fn new(model: impl Model + 'static) -> Self {
        debug!(vocab_size = model.vocab_size(), "tokenizer created");
        Self {
            normalizer: NormalizerSequence::default(),
            pre_tokenizer: Box::new(IdentityPreTokenizer),
            model: Box::new(model),
            post_processor: Box::new(DefaultPostProcessor),
            decoder: DecoderSequence::default(),
            special_tokens: Vec::new(),
            special_tokens_decoder: FxHashMap::default(),
            special_matcher: None,
            padding: None,
            truncation: None,
        }
    }

    /// Append a normalizer; normalizers run in the order they were added.
    pub fn with_normalizer(mut self, normalizer: impl Normalizer + 'static) -> Self {
        self.normalizer.push(Box::new(normalizer));
        self
    }

    pub fn with_pre_tokenizer(mut self, pre_tokenizer: impl PreTokenizer + 'static) -> Self {
        self.pre_tokenizer = Box::new(pre_tokenizer);
        self
    }

    pub fn with_post_processor(self, post_processor: impl PostProcessor + 'static) -> Self {
        self.with_boxed_post_processor(Box::new(post_processor))
    }

    pub fn with_boxed_post_processor(mut self, post_processor: Box<dyn PostProcessor>) -> Self {
        self.post_processor = post_processor;
        self
    }

    /// Append a decoder; decoders run in the order they were added.
    pub fn with_decoder(mut self, decoder: impl Decoder + 'static) -> Self {
        self.decoder.push(Box::new(decoder));
        self
    }

    /// Register special tokens, matched verbatim in the raw input before
    /// normalization. Overlapping matches resolve leftmost-longest.
    pub fn with_special_tokens(
        mut self,
        tokens: impl IntoIterator<Item = Token>,
    ) -> Result<Self, TokenizerError> {
        for token in tokens {
            if token.value.is_empty() {
                return Err(TokenizerError::EmptyArgument {
                    stage: "Tokenizer",
                    field: "special token",
                });
            }
            self.special_tokens_decoder
                .insert(token.id, token.value.clone());
            self.special_tokens.push(token);
        }

        self.special_matcher = if self.special_tokens.is_empty() {
            None
        } else {
            let patterns: Vec<&str> = self
                .special_tokens
                .iter()
                .map(|t| t.value.as_str())
                .collect();
            Some(
                AhoCorasick::builder()
                    .match_kind(MatchKind::LeftmostLongest)
                    .build(patterns)?,
            )
        };
        debug!(
            special_tokens = self.special_tokens.len(),
            "special token matcher built"
        );
        Ok(self)
    }

    pub fn with_padding(mut self, padding: PaddingParams) -> Self {
        self.padding = Some(padding);
        self
    }

    pub fn with_truncation(mut self, truncation: TruncationParams) -> Self {
        self.truncation = Some(truncation);
        self
    }

    pub fn padding(&self) -> Option<&PaddingParams> {
        self.padding.as_ref()
    }

    pub fn truncation(&self) -> Option<&TruncationParams> {
        self.truncation.as_ref()
    }

    /// Encode one sequence.
    pub fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Encoding, TokenizerError> {
        let sequence = self.encode_sequence(text)?;
        Ok(self.post_process(&sequence, None, add_special_tokens))
    }

    /// Encode a sequence pair into one model input.
    pub fn encode_pair(
        &self,
        text_a: &str,
        text_b: &str,
        add_special_tokens: bool,
    ) -> Result<Encoding, TokenizerError> {
        let sequence_a = self.encode_sequence(text_a)?;
        let sequence_b = self.encode_sequence(text_b)?;
        Ok(self.post_process(&sequence_a, Some(&sequence_b), add_special_tokens))
    }

    /// Encode multiple texts in parallel.
    pub fn encode_batch<S>(
        &self,
        texts: &[S],
        add_special_tokens: bool,
    ) -> Result<Vec<Encoding>, TokenizerError>
    where
        S: AsRef<str> + Sync,
    {
        texts
            .par_iter()
            .map(|text| self.encode(text.as_ref(), add_special_tokens))
            .collect()
    }

    /// Encode multiple texts and pad them with the configured padding.
    ///
    /// Without padding configured, sequences stay ragged with every position
    /// attended.
    pub fn encode_batch_padded<S>(
        &self,
        texts: &[S],
        add_special_tokens: bool,
    ) -> Result<Vec<PaddedSequence>, TokenizerError>
    where
        S: AsRef<str> + Sync,
    {
        let encodings = self.encode_batch(texts, add_special_tokens)?;
        let padded = match &self.padding {
            Some(padding) => padding.pad(&encodings)?,
            None => DefaultPadding.pad(
                &encodings,
                &BatchLongestSizeProvider,
                &Token::new(0, String::new()),
            )?,
        };
        Ok(padded)
    }

    /// Split a long input into overlapping windows using the configured
    /// truncation, then post-process each window.
    ///
    /// The window budget leaves room for the special tokens the
    /// post-processor adds, so no emitted encoding exceeds `max_length`.
    /// Without truncation configured this is a one-element [`encode`](Self::encode).
    pub fn encode_windows(
        &self,
        text: &str,
        add_special_tokens: bool,
    ) -> Result<Vec<Encoding>, TokenizerError> {
        let sequence = self.encode_sequence(text)?;
        let Some(params) = self.truncation else {
            return Ok(vec![self.post_process(&sequence, None, add_special_tokens)]);
        };

        let added = if add_special_tokens {
            self.num_added_tokens(false)
        } else {
            0
        };
        let window = params.max_length.saturating_sub(added);
        let ranges = params
            .direction
            .generator()
            .ranges(sequence.len(), window, params.stride)?;
        if ranges.is_empty() {
            return Ok(vec![self.post_process(&sequence, None, add_special_tokens)]);
        }

        Ok(ranges
            .iter()
            .map(|range| {
                let chunk = sequence.slice(range.offset, range.length);
                self.post_process(&chunk, None, add_special_tokens)
            })
            .collect())
    }

    /// Decode ids to text. Ids unknown to both the model and the special
    /// tokens are skipped.
    pub fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> String {
        pool::with_pieces(|tokens| {
            for &id in ids {
                if let Some(special) = self.special_tokens_decoder.get(&id) {
                    if !skip_special_tokens {
                        tokens.push(special.clone());
                    }
                } else if let Some(token) = self.model.id_to_token(id) {
                    tokens.push(token.to_string());
                }
            }
            self.decoder.decode(tokens)
        })
    }

    /// Decode multiple id lists in parallel.
    pub fn decode_batch(&self, id_lists: &[Vec<u32>], skip_special_tokens: bool) -> Vec<String> {
        id_lists
            .par_iter()
            .map(|ids| self.decode(ids, skip_special_tokens))
            .collect()
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.special_tokens
            .iter()
            .find(|t| t.value == token)
            .map(|t| t.id)
            .or_else(|| self.model.token_to_id(token))
    }

    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.special_tokens_decoder
            .get(&id)
            .map(String::as_str)
            .or_else(|| self.model.id_to_token(id))
    }

    /// One past the highest id across the model and the special tokens.
    pub fn vocab_size(&self) -> usize {
        let max_special = self
            .special_tokens
            .iter()
            .map(|t| t.id as usize + 1)
            .max()
            .unwrap_or(0);
        self.model.vocab_size().max(max_special)
    }

    /// Number of special tokens the post-processor adds.
    pub fn num_added_tokens(&self, is_pair: bool) -> usize {
        self.post_processor.num_added_tokens(is_pair)
    }

    pub fn special_tokens(&self) -> &[Token] {
        &self.special_tokens
    }

    /// Clear the model's fragment cache.
    pub fn clear_cache(&self) {
        self.model.clear_cache();
    }

    /// Get the current cache size.
    pub fn cache_len(&self) -> usize {
        self.model.cache_len()
    }

    fn post_process(
        &self,
        sequence_a: &Encoding,
        sequence_b: Option<&Encoding>,
        add_special_tokens: bool,
    ) -> Encoding {
        let extra = sequence_b.map_or(0, Encoding::len) + self.num_added_tokens(sequence_b.is_some());
        let mut output = Encoding::with_capacity(sequence_a.len() + extra);
        self.post_processor
            .post_process(sequence_a, sequence_b, add_special_tokens, &mut output);
        output
    }

    /// Tokenize one raw sequence, splitting out special tokens first.
    fn encode_sequence(&self, text: &str) -> Result<Encoding, TokenizerError> {
        let mut encoding = Encoding::new();
        let Some(ref special_matcher) = self.special_matcher else {
            self.encode_ordinary(text, &mut encoding)?;
            return Ok(encoding);
        };

        let mut last_end = 0;
        for m in special_matcher.find_iter(text) {
            if m.start() > last_end {
                self.encode_ordinary(&text[last_end..m.start()], &mut encoding)?;
            }
            encoding.push_token(&self.special_tokens[m.pattern().as_usize()]);
            last_end = m.end();
        }
        if last_end < text.len() {
            self.encode_ordinary(&text[last_end..], &mut encoding)?;
        }
        Ok(encoding)
    }

    /// Normalize, pre-tokenize and run the model over text with no special
    /// tokens in it.
    fn encode_ordinary(&self, text: &str, encoding: &mut Encoding) -> Result<(), TokenizerError> {
        let normalized = self.normalizer.normalize(TextView::new(text));

        pool::with_views(|fragments| -> Result<(), TokenizerError> {
            self.pre_tokenizer.pre_tokenize(&normalized, fragments)?;
            pool::with_ids(|ids| -> Result<(), TokenizerError> {
                for fragment in fragments.iter() {
                    self.model.tokenize(fragment, ids)?;
                }
                for &id in ids.iter() {
                    encoding.push(id, self.model.id_to_token(id).unwrap_or_default());
                }
                Ok(())
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bpe::Bpe;
    use crate::core::byte_level::byte_level_char;
    use crate::core::decoder::ByteLevelDecoder;
    use crate::core::padding::{PaddingDirection, PaddingStrategy};
    use crate::core::post_processor::RobertaPostProcessor;
    use crate::core::pre_tokenizer::ByteLevelPreTokenizer;
    use crate::core::truncation::TruncationDirection;
    use crate::core::vocab::Vocab;

    const MERGED: [&str; 7] = ["ll", "He", "Hell", "Hello", "Ġw", "or", "Ġwor"];

    fn make_test_model() -> Bpe {
        let mut vocab: Vocab = (0u8..=255)
            .map(|b| (byte_level_char(b).to_string(), b as u32))
            .collect();
        for (i, token) in MERGED.iter().enumerate() {
            vocab.insert(*token, 256 + i as u32);
        }
        let merges: Vec<(String, String)> = [
            ("l", "l"),
            ("H", "e"),
            ("He", "ll"),
            ("Hell", "o"),
            ("Ġ", "w"),
            ("o", "r"),
            ("Ġw", "or"),
        ]
        .iter()
        .map(|(l, r)| (l.to_string(), r.to_string()))
        .collect();
        Bpe::new(vocab, &merges)
    }

    fn make_test_tokenizer() -> Tokenizer {
        Tokenizer::new(make_test_model())
            .with_pre_tokenizer(ByteLevelPreTokenizer::new(false, true).unwrap())
            .with_decoder(ByteLevelDecoder)
            .with_special_tokens([
                Token::new(1000, "<|endoftext|>"),
                Token::new(1001, "<pad>"),
                Token::new(1002, "<s>"),
                Token::new(1003, "</s>"),
            ])
            .unwrap()
    }

    fn roberta() -> RobertaPostProcessor {
        RobertaPostProcessor::new(Token::new(1003, "</s>"), Token::new(1002, "<s>"))
    }

    #[test]
    fn test_encode_decode() {
        let tokenizer = make_test_tokenizer();
        let encoding = tokenizer.encode("Hello world", false).unwrap();
        assert_eq!(encoding.ids(), &[259, 262, b'l' as u32, b'd' as u32]);
        assert_eq!(encoding.tokens(), &["Hello", "Ġwor", "l", "d"]);
        assert_eq!(tokenizer.decode(encoding.ids(), false), "Hello world");
    }

    #[test]
    fn test_encode_with_special() {
        let tokenizer = make_test_tokenizer();
        let encoding = tokenizer.encode("Hello<|endoftext|> world", false).unwrap();
        assert_eq!(encoding.ids(), &[259, 1000, 262, b'l' as u32, b'd' as u32]);
        assert_eq!(
            tokenizer.decode(encoding.ids(), false),
            "Hello<|endoftext|> world"
        );
        assert_eq!(tokenizer.decode(encoding.ids(), true), "Hello world");
    }

    #[test]
    fn test_special_tokens_leftmost_longest() {
        let tokenizer = Tokenizer::new(make_test_model())
            .with_special_tokens([Token::new(500, "<|end|>"), Token::new(501, "<|end|>x")])
            .unwrap();
        let encoding = tokenizer.encode("<|end|>x<|end|>", false).unwrap();
        assert_eq!(encoding.ids(), &[501, 500]);
    }

    #[test]
    fn test_empty_special_token_rejected() {
        let result = Tokenizer::new(make_test_model()).with_special_tokens([Token::new(9, "")]);
        assert!(matches!(result, Err(TokenizerError::EmptyArgument { .. })));
    }

    #[test]
    fn test_encode_pair_with_roberta() {
        let tokenizer = make_test_tokenizer().with_post_processor(roberta());
        let encoding = tokenizer.encode_pair("Hello", "Hello", true).unwrap();
        assert_eq!(encoding.ids(), &[1002, 259, 1003, 1003, 259, 1003]);
        assert_eq!(tokenizer.num_added_tokens(true), 4);

        let plain = tokenizer.encode_pair("Hello", "Hello", false).unwrap();
        assert_eq!(plain.ids(), &[259, 259]);
    }

    #[test]
    fn test_batch_encode() {
        let tokenizer = make_test_tokenizer();
        let texts = vec!["Hello".to_string(), " world".to_string()];
        let batch = tokenizer.encode_batch(&texts, false).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].ids(), &[259]);
        assert_eq!(batch[1].len(), 3);

        let ids: Vec<Vec<u32>> = batch.iter().map(|e| e.ids().to_vec()).collect();
        assert_eq!(tokenizer.decode_batch(&ids, false), texts);
    }

    #[test]
    fn test_batch_padded() {
        let tokenizer = make_test_tokenizer().with_padding(PaddingParams::new(
            PaddingStrategy::BatchLongest,
            Some(PaddingDirection::Left),
            Token::new(1001, "<pad>"),
        ));
        let padded = tokenizer.encode_batch_padded(&["Hello", " world"], false).unwrap();
        assert_eq!(padded[0].ids, vec![1001, 1001, 259]);
        assert_eq!(padded[0].attention_mask, vec![0, 0, 1]);
        assert_eq!(padded[1].attention_mask, vec![1, 1, 1]);

        let ragged = make_test_tokenizer()
            .encode_batch_padded(&["Hello", " world"], false)
            .unwrap();
        assert_eq!(ragged[0].len(), 1);
    }

    #[test]
    fn test_windows_respect_budget() {
        let tokenizer = make_test_tokenizer()
            .with_post_processor(roberta())
            .with_truncation(TruncationParams::new(4, 1, TruncationDirection::Right));
        let windows = tokenizer.encode_windows(" world", true).unwrap();
        assert_eq!(windows.len(), 2);
        assert!(windows.iter().all(|w| w.len() <= 4));
        assert_eq!(windows[0].ids(), &[1002, 262, b'l' as u32, 1003]);
        assert_eq!(windows[1].ids(), &[1002, b'l' as u32, b'd' as u32, 1003]);
    }

    #[test]
    fn test_windows_without_truncation() {
        let tokenizer = make_test_tokenizer();
        let windows = tokenizer.encode_windows("Hello world", false).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].len(), 4);
    }

    #[test]
    fn test_windows_stride_too_large() {
        let tokenizer = make_test_tokenizer()
            .with_post_processor(roberta())
            .with_truncation(TruncationParams::new(3, 1, TruncationDirection::Left));
        assert!(matches!(
            tokenizer.encode_windows("Hello world", true),
            Err(TokenizerError::TruncationError(_))
        ));
    }

    #[test]
    fn test_vocab_lookups() {
        let tokenizer = make_test_tokenizer();
        assert_eq!(tokenizer.vocab_size(), 1004);
        assert_eq!(tokenizer.token_to_id("<s>"), Some(1002));
        assert_eq!(tokenizer.token_to_id("Hello"), Some(259));
        assert_eq!(tokenizer.id_to_token(262), Some("Ġwor"));
        assert_eq!(tokenizer.id_to_token(5000), None);
        // unknown ids are skipped
        assert_eq!(tokenizer.decode(&[259, 5000], false), "Hello");
    }

    #[test]
    fn test_cache_works() {
        let tokenizer = make_test_tokenizer();
        let first = tokenizer.encode("Hello world", false).unwrap();
        let second = tokenizer.encode("Hello world", false).unwrap();
        assert_eq!(first, second);
        assert!(tokenizer.cache_len() > 0);
        tokenizer.clear_cache();
        assert_eq!(tokenizer.cache_len(), 0);
    }
}
