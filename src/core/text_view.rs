//! Zero-copy views over shared text.
//!
//! A [`TextView`] is a `(source, start, len)` triple over an `Arc<str>`. Every
//! pipeline stage passes views around so that splitting never copies; a new
//! owned string is only materialized when a stage actually rewrites content.
//!
//! Equality and hashing are by the referenced characters, never by identity,
//! so a view can key a content cache regardless of which buffer it points into.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Immutable view over a span of shared text.
///
/// `start` and `len` are byte offsets into the source and always fall on
/// `char` boundaries.
#[derive(Clone)]
pub struct TextView {
    source: Arc<str>,
    start: usize,
    len: usize,
}

impl TextView {
    /// Create a view covering the whole of `text`.
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        let source: Arc<str> = text.into();
        let len = source.len();
        Self {
            source,
            start: 0,
            len,
        }
    }

    /// Create a view over `source[start..start + len]`.
    ///
    /// Returns `None` when the span exceeds the source or splits a character.
    pub fn from_parts(source: Arc<str>, start: usize, len: usize) -> Option<Self> {
        let end = start.checked_add(len)?;
        source.get(start..end)?;
        Some(Self { source, start, len })
    }

    /// Narrow this view to `range`, relative to the view's own start.
    pub fn slice(&self, range: std::ops::Range<usize>) -> Option<Self> {
        if range.start > range.end || range.end > self.len {
            return None;
        }
        Self::from_parts(
            Arc::clone(&self.source),
            self.start + range.start,
            range.end - range.start,
        )
    }

    /// The referenced characters.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.source[self.start..self.start + self.len]
    }

    /// Byte offset of the view inside its source.
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Length of the view in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The backing text shared by all views split from the same input.
    pub fn source(&self) -> &Arc<str> {
        &self.source
    }

    /// Whether this view and `other` point into the same allocation.
    pub fn shares_source(&self, other: &TextView) -> bool {
        Arc::ptr_eq(&self.source, &other.source)
    }
}

impl Default for TextView {
    fn default() -> Self {
        Self::new("")
    }
}

impl Deref for TextView {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for TextView {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for TextView {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq for TextView {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for TextView {}

impl PartialEq<str> for TextView {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for TextView {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

// Must agree with `str`'s Hash so that `Borrow<str>` lookups work.
impl Hash for TextView {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Debug for TextView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextView")
            .field("text", &self.as_str())
            .field("start", &self.start)
            .field("len", &self.len)
            .finish()
    }
}

impl fmt::Display for TextView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for TextView {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for TextView {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}
