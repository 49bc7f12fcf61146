//! Core tokenization pipeline for tokenweave.
//!
//! Text flows through a fixed sequence of stages, each behind a small trait
//! with a handful of concrete strategies:
//!
//! ```text
//! raw text -> Normalizer -> PreTokenizer -> Model (BPE) -> PostProcessor
//!          -> Padding / truncation windows -> ids
//! ids -> token strings -> Decoder chain -> text
//! ```
//!
//! # Architecture
//!
//! - [`Tokenizer`]: facade wiring the stages together, with Aho-Corasick
//!   special token matching and Rayon batch methods
//! - [`normalizer`]: prefix/suffix insertion, literal replacement, Unicode forms
//! - [`pre_tokenizer`]: regex splitting and reversible byte-level re-encoding
//! - [`bpe`]: rank-ordered pair merging with `<0xHH>` byte fallback and an LRU cache
//! - [`post_processor`]: special-token framing for single sequences and pairs
//! - [`padding`] / [`truncation`]: batch shaping and sliding windows
//! - [`decoder`]: byte-fallback and byte-level reconstruction
//! - [`config`]: serde pipeline description
//!
//! Stages share [`TextView`] spans instead of copying strings, and draw
//! scratch buffers from thread-local [`pool`]s.

pub mod bpe;
pub mod byte_level;
pub mod config;
pub mod convert;
pub mod decoder;
pub mod encoding;
pub mod normalizer;
pub mod padding;
pub mod pool;
pub mod post_processor;
pub mod pre_tokenizer;
pub mod text_view;
pub mod tokenizer;
pub mod truncation;
pub mod vocab;

pub use bpe::{Bpe, Model, DEFAULT_CACHE_SIZE};
pub use byte_level::{
    byte_level_byte, byte_level_char, byte_level_decode, byte_level_decode_into,
    byte_level_encode, byte_level_encode_into, is_byte_level_char,
};
pub use config::{
    DecoderConfig, ModelConfig, NormalizerConfig, PaddingConfig, PipelineConfig,
    PostProcessorConfig, PreTokenizerConfig,
};
pub use convert::{
    parse_byte_token, ByteLevelConverter, ByteToTokenConverter, CachedConverter, CharSplitter,
    Converter, ManyConverter, Utf8BytesConverter,
};
pub use decoder::{
    ByteFallbackDecoder, ByteLevelDecoder, Decoder, DecoderSequence, FuseDecoder, ReplaceDecoder,
};
pub use encoding::{Encoding, Token};
pub use normalizer::{
    AppendNormalizer, NormalizationForm, Normalizer, NormalizerSequence, PrependNormalizer,
    ReplaceNormalizer, UnicodeNormalizer,
};
pub use padding::{
    BatchLongestSizeProvider, DefaultPadding, FixedPaddingSizeProvider, LeftPadding,
    MultipleOfSizeProvider, PaddedSequence, Padding, PaddingDirection, PaddingError,
    PaddingParams, PaddingSizeProvider, PaddingStrategy, RightPadding,
};
pub use pool::{Pool, Pooled, Reusable};
pub use post_processor::{
    BertPostProcessor, ByteLevelPostProcessor, DefaultPostProcessor, PostProcessor,
    RobertaPostProcessor,
};
pub use pre_tokenizer::{
    ByteLevelPreTokenizer, IdentityPreTokenizer, PreTokenizer, Splitter, CL100K_BASE_PATTERN,
    GPT2_PATTERN,
};
pub use text_view::TextView;
pub use tokenizer::{Tokenizer, TokenizerError};
pub use truncation::{
    LeftDirectionRangeGenerator, Range, RangeGenerator, RightDirectionRangeGenerator,
    TruncationDirection, TruncationError, TruncationParams,
};
pub use vocab::{load_tiktoken_bpe, load_tiktoken_bpe_file, parse_merges, Vocab, VocabError};
