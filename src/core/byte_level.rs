//! Reversible byte-level alphabet.
//!
//! Every byte value 0-255 is assigned one visible Unicode character, so any
//! byte sequence (valid UTF-8 or not) can be carried through the pipeline as
//! ordinary text and mapped back without loss.
//!
//! # Mapping Strategy
//!
//! Printable ASCII and most of Latin-1 keep their own code point; the rest
//! (control characters, space, DEL, the non-breaking block and the soft
//! hyphen) are moved to U+0100 onwards in byte order:
//!
//! - Bytes 33-126 (`!` to `~`): map to themselves
//! - Bytes 161-172 (`¡` to `¬`): map to themselves
//! - Bytes 174-255 (`®` to `ÿ`): map to themselves
//! - Other bytes (0-32, 127-160, 173): map to U+0100 onwards
//!
//! This is the GPT-2 table, so space becomes `Ġ` (U+0120) and newline `Ċ`.

use rustc_hash::FxHashMap;
use std::sync::LazyLock;

#[inline]
fn is_direct(b: u8) -> bool {
    matches!(b, 33..=126 | 161..=172 | 174..=255)
}

/// Byte to Unicode character mapping (256 entries).
static BYTE_TO_CHAR: LazyLock<[char; 256]> = LazyLock::new(|| {
    let mut mapping = ['\0'; 256];
    let mut next = 0x100u32;
    for b in 0u8..=255 {
        mapping[b as usize] = if is_direct(b) {
            b as char
        } else {
            let ch = char::from_u32(next).unwrap_or(char::REPLACEMENT_CHARACTER);
            next += 1;
            ch
        };
    }
    mapping
});

/// Unicode character to byte mapping (reverse of `BYTE_TO_CHAR`).
static CHAR_TO_BYTE: LazyLock<FxHashMap<char, u8>> = LazyLock::new(|| {
    BYTE_TO_CHAR
        .iter()
        .enumerate()
        .map(|(byte, &ch)| (ch, byte as u8))
        .collect()
});

/// Append the byte-level form of `bytes` to `out`.
#[inline]
pub fn byte_level_encode_into(bytes: &[u8], out: &mut String) {
    out.extend(bytes.iter().map(|&b| BYTE_TO_CHAR[b as usize]));
}

/// Append the byte-level form of one character's UTF-8 encoding to `out`.
#[inline]
pub fn byte_level_encode_char(ch: char, out: &mut String) {
    let mut buf = [0u8; 4];
    byte_level_encode_into(ch.encode_utf8(&mut buf).as_bytes(), out);
}

/// Encode a byte slice as a byte-level string.
///
/// ```
/// use tokenweave::byte_level_encode;
///
/// assert_eq!(byte_level_encode(b" hello"), "Ġhello");
/// ```
#[inline]
pub fn byte_level_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    byte_level_encode_into(bytes, &mut out);
    out
}

/// Append the raw bytes behind a byte-level string to `out`.
///
/// Returns `false` (leaving `out` partially extended) at the first character
/// outside the byte-level alphabet.
#[inline]
pub fn byte_level_decode_into(text: &str, out: &mut Vec<u8>) -> bool {
    for ch in text.chars() {
        match CHAR_TO_BYTE.get(&ch) {
            Some(&b) => out.push(b),
            None => return false,
        }
    }
    true
}

/// Decode a byte-level string back to raw bytes.
///
/// Returns `None` if the string contains characters outside the alphabet.
#[inline]
pub fn byte_level_decode(text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    byte_level_decode_into(text, &mut out).then_some(out)
}

/// Check if a character is part of the byte-level alphabet.
#[inline]
pub fn is_byte_level_char(ch: char) -> bool {
    CHAR_TO_BYTE.contains_key(&ch)
}

/// The byte-level character for a byte value.
#[inline]
pub fn byte_level_char(byte: u8) -> char {
    BYTE_TO_CHAR[byte as usize]
}

/// The byte value behind a byte-level character.
#[inline]
pub fn byte_level_byte(ch: char) -> Option<u8> {
    CHAR_TO_BYTE.get(&ch).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_is_bijective() {
        let mut seen = std::collections::HashSet::new();
        for b in 0u8..=255 {
            assert!(seen.insert(byte_level_char(b)), "duplicate for byte {b}");
        }
        assert_eq!(seen.len(), 256);
        assert_eq!(CHAR_TO_BYTE.len(), 256);
    }

    #[test]
    fn test_every_mapped_char_is_visible() {
        for b in 0u8..=255 {
            let ch = byte_level_char(b);
            assert!(!ch.is_control(), "byte {b} maps to control {ch:?}");
            assert!(!ch.is_whitespace(), "byte {b} maps to whitespace {ch:?}");
        }
    }

    #[test]
    fn test_single_byte_roundtrip() {
        for b in 0u8..=255 {
            let encoded = byte_level_encode(&[b]);
            assert_eq!(encoded.chars().count(), 1);
            assert_eq!(byte_level_decode(&encoded).unwrap(), vec![b]);
        }
    }

    #[test]
    fn test_space_and_newline() {
        assert_eq!(byte_level_char(b' '), 'Ġ');
        assert_eq!(byte_level_char(b' ') as u32, 0x0120);
        assert_eq!(byte_level_char(b'\n'), 'Ċ');
        assert_eq!(byte_level_char(0), '\u{0100}');
    }

    #[test]
    fn test_printable_ascii_preserved() {
        for b in 33u8..=126 {
            assert_eq!(byte_level_char(b) as u32, b as u32);
        }
        assert_eq!(byte_level_encode(b"Hello"), "Hello");
    }

    #[test]
    fn test_encode_multibyte() {
        // "你好" is [228, 189, 160, 229, 165, 189]
        assert_eq!(byte_level_encode("你好".as_bytes()), "ä½łå¥½");
        let mut out = String::new();
        byte_level_encode_char('你', &mut out);
        assert_eq!(out, "ä½ł");
    }

    #[test]
    fn test_decode_rejects_foreign_chars() {
        assert!(byte_level_decode("Ġhello").is_some());
        assert!(byte_level_decode("hello world").is_none());
        assert!(!is_byte_level_char(' '));
        assert!(is_byte_level_char('Ġ'));
        assert_eq!(byte_level_byte('Ġ'), Some(b' '));
    }

    #[test]
    fn test_invalid_utf8_roundtrip() {
        let raw = [0xFFu8, 0xFE, 0x00, 0xC3];
        let encoded = byte_level_encode(&raw);
        assert_eq!(byte_level_decode(&encoded).unwrap(), raw);
    }
}
