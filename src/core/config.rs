//! Declarative pipeline configuration.
//!
//! A [`PipelineConfig`] names every stage by kind plus its options; it
//! deserializes from JSON and builds a [`Tokenizer`] over a vocabulary with
//! [`Tokenizer::from_config`].
//!
//! ```json
//! {
//!   "normalizers": [{"type": "Unicode", "form": "Nfc"}],
//!   "pre_tokenizer": {"type": "ByteLevel", "add_prefix_space": true},
//!   "model": {"merges": ["Ġ t", "h e"], "byte_fallback": false},
//!   "post_processor": {"type": "Roberta", "sep": "</s>", "cls": "<s>"},
//!   "decoders": [{"type": "ByteLevel"}],
//!   "padding": {"strategy": "BatchLongest", "direction": "Right", "pad_token": "<pad>"},
//!   "truncation": {"max_length": 512, "stride": 128}
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::bpe::{Bpe, DEFAULT_CACHE_SIZE};
use super::decoder::{ByteFallbackDecoder, ByteLevelDecoder, FuseDecoder, ReplaceDecoder};
use super::encoding::Token;
use super::normalizer::{
    AppendNormalizer, NormalizationForm, PrependNormalizer, ReplaceNormalizer, UnicodeNormalizer,
};
use super::padding::{PaddingDirection, PaddingParams, PaddingStrategy};
use super::post_processor::{
    BertPostProcessor, ByteLevelPostProcessor, DefaultPostProcessor, PostProcessor,
    RobertaPostProcessor,
};
use super::pre_tokenizer::{ByteLevelPreTokenizer, IdentityPreTokenizer, Splitter};
use super::tokenizer::{Tokenizer, TokenizerError};
use super::truncation::TruncationParams;
use super::vocab::{parse_merges, Vocab};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NormalizerConfig {
    Prepend { prefix: String },
    Append { suffix: String },
    Replace { pattern: String, content: String },
    Unicode {
        #[serde(default)]
        form: NormalizationForm,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type")]
pub enum PreTokenizerConfig {
    #[default]
    Identity,
    ByteLevel {
        #[serde(default)]
        add_prefix_space: bool,
        #[serde(default = "default_true")]
        use_regex: bool,
        /// Custom split pattern; replaces the GPT-2 pattern when set.
        #[serde(default)]
        pattern: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// `left right` merge lines in priority order. Without merges the
    /// vocabulary is treated as rank-ordered (tiktoken style).
    pub merges: Option<Vec<String>>,
    pub byte_fallback: bool,
    pub unk_token: Option<String>,
    pub cache_size: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            merges: None,
            byte_fallback: false,
            unk_token: None,
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type")]
pub enum PostProcessorConfig {
    #[default]
    Default,
    ByteLevel {
        #[serde(default)]
        trim_offsets: bool,
    },
    Roberta { sep: String, cls: String },
    Bert { sep: String, cls: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DecoderConfig {
    Fuse,
    Replace { pattern: String, content: String },
    ByteFallback,
    ByteLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaddingConfig {
    #[serde(default)]
    pub strategy: PaddingStrategy,
    /// `None` keeps sequences ragged.
    #[serde(default)]
    pub direction: Option<PaddingDirection>,
    #[serde(default)]
    pub pad_to_multiple_of: Option<usize>,
    pub pad_token: String,
}

/// Every stage of a tokenizer pipeline, in run order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub normalizers: Vec<NormalizerConfig>,
    pub pre_tokenizer: PreTokenizerConfig,
    pub model: ModelConfig,
    pub post_processor: PostProcessorConfig,
    pub decoders: Vec<DecoderConfig>,
    /// Tokens matched verbatim before normalization, with fixed ids.
    pub special_tokens: Vec<Token>,
    pub padding: Option<PaddingConfig>,
    pub truncation: Option<TruncationParams>,
}

fn default_true() -> bool {
    true
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self, TokenizerError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        debug!(
            normalizers = config.normalizers.len(),
            decoders = config.decoders.len(),
            special_tokens = config.special_tokens.len(),
            "pipeline config parsed"
        );
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TokenizerError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, TokenizerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Resolve a token name against the special tokens, then the vocabulary.
fn resolve(name: &str, specials: &[Token], vocab: &Vocab) -> Result<Token, TokenizerError> {
    specials
        .iter()
        .find(|t| t.value == name)
        .map(|t| t.id)
        .or_else(|| vocab.token_to_id(name))
        .map(|id| Token::new(id, name))
        .ok_or_else(|| TokenizerError::UnknownToken(name.to_string()))
}

impl Tokenizer {
    /// Build a tokenizer from a declarative configuration.
    ///
    /// Token names in the post-processor and padding sections resolve
    /// against `special_tokens` first, then the vocabulary.
    pub fn from_config(config: &PipelineConfig, vocab: Vocab) -> Result<Self, TokenizerError> {
        let specials = &config.special_tokens;
        let model_config = &config.model;

        let mut model = match &model_config.merges {
            Some(lines) => {
                let merges = parse_merges(&lines.join("\n"))?;
                Bpe::new(vocab, &merges)
            }
            None => Bpe::from_ranked_vocab(vocab),
        }
        .byte_fallback(model_config.byte_fallback)
        .cache_size(model_config.cache_size);
        if let Some(unk) = &model_config.unk_token {
            model = model.unk_token(unk)?;
        }

        let vocab = model.vocab();
        let padding = match &config.padding {
            Some(p) => {
                let pad_token = resolve(&p.pad_token, specials, vocab)?;
                let mut params = PaddingParams::new(p.strategy, p.direction, pad_token);
                params.pad_to_multiple_of = p.pad_to_multiple_of;
                Some(params)
            }
            None => None,
        };
        let post_processor: Box<dyn PostProcessor> = match &config.post_processor {
            PostProcessorConfig::Default => Box::new(DefaultPostProcessor),
            PostProcessorConfig::ByteLevel { trim_offsets } => {
                Box::new(ByteLevelPostProcessor::new(*trim_offsets))
            }
            PostProcessorConfig::Roberta { sep, cls } => Box::new(RobertaPostProcessor::new(
                resolve(sep, specials, vocab)?,
                resolve(cls, specials, vocab)?,
            )),
            PostProcessorConfig::Bert { sep, cls } => Box::new(BertPostProcessor::new(
                resolve(sep, specials, vocab)?,
                resolve(cls, specials, vocab)?,
            )),
        };

        let mut tokenizer = Tokenizer::new(model).with_boxed_post_processor(post_processor);

        for normalizer in &config.normalizers {
            tokenizer = match normalizer {
                NormalizerConfig::Prepend { prefix } => {
                    tokenizer.with_normalizer(PrependNormalizer::new(prefix.as_str())?)
                }
                NormalizerConfig::Append { suffix } => {
                    tokenizer.with_normalizer(AppendNormalizer::new(suffix.as_str())?)
                }
                NormalizerConfig::Replace { pattern, content } => tokenizer
                    .with_normalizer(ReplaceNormalizer::new(pattern.as_str(), content.as_str())?),
                NormalizerConfig::Unicode { form } => {
                    tokenizer.with_normalizer(UnicodeNormalizer::new(*form))
                }
            };
        }

        tokenizer = match &config.pre_tokenizer {
            PreTokenizerConfig::Identity => tokenizer.with_pre_tokenizer(IdentityPreTokenizer),
            PreTokenizerConfig::ByteLevel {
                add_prefix_space,
                use_regex,
                pattern,
            } => {
                let splitter = match (*use_regex, pattern.as_deref()) {
                    (false, _) => Splitter::Whole,
                    (true, Some(pattern)) => Splitter::pattern(pattern)?,
                    (true, None) => Splitter::gpt2()?,
                };
                tokenizer.with_pre_tokenizer(ByteLevelPreTokenizer::with_splitter(
                    *add_prefix_space,
                    splitter,
                ))
            }
        };

        for decoder in &config.decoders {
            tokenizer = match decoder {
                DecoderConfig::Fuse => tokenizer.with_decoder(FuseDecoder),
                DecoderConfig::Replace { pattern, content } => tokenizer
                    .with_decoder(ReplaceDecoder::new(pattern.as_str(), content.as_str())?),
                DecoderConfig::ByteFallback => tokenizer.with_decoder(ByteFallbackDecoder),
                DecoderConfig::ByteLevel => tokenizer.with_decoder(ByteLevelDecoder),
            };
        }

        tokenizer = tokenizer.with_special_tokens(specials.iter().cloned())?;
        if let Some(padding) = padding {
            tokenizer = tokenizer.with_padding(padding);
        }
        if let Some(truncation) = config.truncation {
            tokenizer = tokenizer.with_truncation(truncation);
        }

        debug!(
            normalizers = config.normalizers.len(),
            decoders = config.decoders.len(),
            vocab_size = tokenizer.vocab_size(),
            "tokenizer built from config"
        );
        Ok(tokenizer)
    }
}
