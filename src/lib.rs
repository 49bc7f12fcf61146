//! tokenweave - a configurable byte-level BPE tokenization pipeline
//!
//! - Normalizers, regex pre-tokenization and a reversible byte-level alphabet
//! - Linked-list BPE merging with `<0xHH>` byte fallback and an LRU fragment cache
//! - Special-token framing, padding with attention masks, sliding-window truncation
//! - Byte-fallback and byte-level decoding that never fails on malformed bytes
//! - Rayon parallelism for batch encode/decode, thread-local buffer pools
//!
//! ```
//! use tokenweave::{ByteLevelDecoder, ByteLevelPreTokenizer, Bpe, Tokenizer, Vocab};
//!
//! let vocab: Vocab = (0u8..=255)
//!     .map(|b| (tokenweave::byte_level_char(b).to_string(), b as u32))
//!     .collect();
//! let tokenizer = Tokenizer::new(Bpe::new(vocab, &[]))
//!     .with_pre_tokenizer(ByteLevelPreTokenizer::new(true, true)?)
//!     .with_decoder(ByteLevelDecoder);
//!
//! let encoding = tokenizer.encode("Papa", false)?;
//! assert_eq!(encoding.tokens()[0], "Ġ");
//! assert_eq!(tokenizer.decode(encoding.ids(), false), " Papa");
//! # Ok::<(), tokenweave::TokenizerError>(())
//! ```

pub mod core;

pub use self::core::*;
