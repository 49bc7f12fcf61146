//! Unit converters shared by the encode and decode paths.
//!
//! A [`Converter`] maps one source unit to one destination unit; a
//! [`ManyConverter`] appends any number of destination units to an output
//! sink. [`CachedConverter`] memoizes a converter over [`TextView`] inputs by
//! content. Its cache has no eviction and lives as long as the owning stage,
//! which is bounded by the distinct fragments seen for a fixed vocabulary.

use std::sync::{Arc, LazyLock, Mutex};

use rustc_hash::FxHashMap;

use super::byte_level::byte_level_encode_char;
use super::pool;
use super::text_view::TextView;

/// One-to-one transform from `S` to `D`.
pub trait Converter<S: ?Sized, D> {
    fn convert(&self, input: &S) -> D;
}

/// One-to-many transform from `S` into a sink of `D`.
pub trait ManyConverter<S: ?Sized, D> {
    fn convert_into(&self, input: &S, output: &mut Vec<D>);
}

/// Content-keyed memoization of a converter over text views.
pub struct CachedConverter<C, D> {
    inner: C,
    cache: Mutex<FxHashMap<TextView, D>>,
}

impl<C, D> CachedConverter<C, D>
where
    C: Converter<TextView, D>,
    D: Clone,
{
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    /// Number of memoized inputs.
    pub fn cache_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

impl<C, D> Converter<TextView, D> for CachedConverter<C, D>
where
    C: Converter<TextView, D>,
    D: Clone,
{
    fn convert(&self, input: &TextView) -> D {
        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(input.as_str()) {
                return hit.clone();
            }
        }

        let converted = self.inner.convert(input);

        // Key on an exact-size copy so the cache never pins a large input.
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(TextView::new(input.as_str()), converted.clone());
        }
        converted
    }
}

/// Text fragment to its byte-level form, one character at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteLevelConverter;

impl Converter<TextView, Arc<str>> for ByteLevelConverter {
    fn convert(&self, input: &TextView) -> Arc<str> {
        pool::with_string(|buf| {
            for ch in input.chars() {
                byte_level_encode_char(ch, buf);
            }
            Arc::from(buf.as_str())
        })
    }
}

/// Text to its raw UTF-8 bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8BytesConverter;

impl ManyConverter<str, u8> for Utf8BytesConverter {
    fn convert_into(&self, input: &str, output: &mut Vec<u8>) {
        output.extend_from_slice(input.as_bytes());
    }
}

/// Text view to one sub-view per character.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharSplitter;

impl ManyConverter<TextView, TextView> for CharSplitter {
    fn convert_into(&self, input: &TextView, output: &mut Vec<TextView>) {
        for (offset, ch) in input.char_indices() {
            if let Some(view) = input.slice(offset..offset + ch.len_utf8()) {
                output.push(view);
            }
        }
    }
}

static BYTE_TOKENS: LazyLock<[String; 256]> =
    LazyLock::new(|| std::array::from_fn(|b| format!("<0x{b:02X}>")));

/// Raw byte to its fallback token name, `<0xHH>` with uppercase hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteToTokenConverter;

impl Converter<u8, &'static str> for ByteToTokenConverter {
    #[inline]
    fn convert(&self, input: &u8) -> &'static str {
        BYTE_TOKENS[*input as usize].as_str()
    }
}

/// Parse a byte-fallback token (`<0xHH>`, exactly six characters).
pub fn parse_byte_token(token: &str) -> Option<u8> {
    if token.len() != 6 {
        return None;
    }
    let hex = token.strip_prefix("<0x")?.strip_suffix('>')?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(hex, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting<'a>(&'a AtomicUsize);

    impl Converter<TextView, String> for Counting<'_> {
        fn convert(&self, input: &TextView) -> String {
            self.0.fetch_add(1, Ordering::SeqCst);
            input.to_uppercase()
        }
    }

    #[test]
    fn test_cached_converter_hits_by_content() {
        let calls = AtomicUsize::new(0);
        let cached = CachedConverter::new(Counting(&calls));

        let a = TextView::new("say hello").slice(4..9).unwrap();
        let b = TextView::new("hello");
        assert_eq!(cached.convert(&a), "HELLO");
        assert_eq!(cached.convert(&b), "HELLO");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.cache_len(), 1);

        cached.clear_cache();
        assert_eq!(cached.cache_len(), 0);
        cached.convert(&b);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_byte_level_converter() {
        let out = ByteLevelConverter.convert(&TextView::new(" Papa"));
        assert_eq!(&*out, "ĠPapa");
    }

    #[test]
    fn test_char_splitter() {
        let mut out = Vec::new();
        CharSplitter.convert_into(&TextView::new("aé😀"), &mut out);
        let chars: Vec<&str> = out.iter().map(|v| v.as_str()).collect();
        assert_eq!(chars, vec!["a", "é", "😀"]);
        assert_eq!(out[2].start(), 3);
    }

    #[test]
    fn test_utf8_bytes_converter() {
        let mut out = Vec::new();
        Utf8BytesConverter.convert_into("é", &mut out);
        assert_eq!(out, vec![0xC3, 0xA9]);
    }

    #[test]
    fn test_byte_token_names() {
        assert_eq!(ByteToTokenConverter.convert(&0x41), "<0x41>");
        assert_eq!(ByteToTokenConverter.convert(&0x0A), "<0x0A>");
        assert_eq!(ByteToTokenConverter.convert(&0xFF), "<0xFF>");
    }

    #[test]
    fn test_parse_byte_token() {
        for b in 0u8..=255 {
            assert_eq!(parse_byte_token(ByteToTokenConverter.convert(&b)), Some(b));
        }
        assert_eq!(parse_byte_token("<0xff>"), Some(0xFF));
        assert_eq!(parse_byte_token("<0xGG>"), None);
        assert_eq!(parse_byte_token("<0x4>"), None);
        assert_eq!(parse_byte_token("<0x041>"), None);
        assert_eq!(parse_byte_token("<0x+1>"), None);
        assert_eq!(parse_byte_token("0x41"), None);
    }
}
