//! Text-level rewrites applied before splitting.
//!
//! Each [`Normalizer`] maps one view to another, returning its input
//! untouched when there is nothing to rewrite so the common case allocates
//! nothing. Normalizers compose in a fixed order via [`NormalizerSequence`].

use serde::{Deserialize, Serialize};
use unicode_normalization::{
    is_nfc_quick, is_nfd_quick, is_nfkc_quick, is_nfkd_quick, IsNormalized, UnicodeNormalization,
};

use super::pool;
use super::text_view::TextView;
use super::tokenizer::TokenizerError;

/// A pure text view rewrite.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, view: TextView) -> TextView;
}

/// Insert a fixed prefix in front of non-empty input.
#[derive(Debug, Clone)]
pub struct PrependNormalizer {
    prefix: String,
}

impl PrependNormalizer {
    pub fn new(prefix: impl Into<String>) -> Result<Self, TokenizerError> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(TokenizerError::EmptyArgument {
                stage: "PrependNormalizer",
                field: "prefix",
            });
        }
        Ok(Self { prefix })
    }
}

impl Normalizer for PrependNormalizer {
    fn normalize(&self, view: TextView) -> TextView {
        if view.is_empty() {
            return view;
        }
        pool::with_string(|buf| {
            buf.push_str(&self.prefix);
            buf.push_str(&view);
            TextView::new(buf.as_str())
        })
    }
}

/// Insert a fixed suffix after non-empty input.
#[derive(Debug, Clone)]
pub struct AppendNormalizer {
    suffix: String,
}

impl AppendNormalizer {
    pub fn new(suffix: impl Into<String>) -> Result<Self, TokenizerError> {
        let suffix = suffix.into();
        if suffix.is_empty() {
            return Err(TokenizerError::EmptyArgument {
                stage: "AppendNormalizer",
                field: "suffix",
            });
        }
        Ok(Self { suffix })
    }
}

impl Normalizer for AppendNormalizer {
    fn normalize(&self, view: TextView) -> TextView {
        if view.is_empty() {
            return view;
        }
        pool::with_string(|buf| {
            buf.push_str(&view);
            buf.push_str(&self.suffix);
            TextView::new(buf.as_str())
        })
    }
}

/// Literal (non-regex) substring replacement. An empty replacement deletes.
#[derive(Debug, Clone)]
pub struct ReplaceNormalizer {
    pattern: String,
    replacement: String,
}

impl ReplaceNormalizer {
    pub fn new(
        pattern: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Result<Self, TokenizerError> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(TokenizerError::EmptyArgument {
                stage: "ReplaceNormalizer",
                field: "pattern",
            });
        }
        Ok(Self {
            pattern,
            replacement: replacement.into(),
        })
    }
}

impl Normalizer for ReplaceNormalizer {
    fn normalize(&self, view: TextView) -> TextView {
        if !view.contains(self.pattern.as_str()) {
            return view;
        }
        pool::with_string(|buf| {
            let mut last = 0;
            for (at, _) in view.match_indices(self.pattern.as_str()) {
                buf.push_str(&view[last..at]);
                buf.push_str(&self.replacement);
                last = at + self.pattern.len();
            }
            buf.push_str(&view[last..]);
            TextView::new(buf.as_str())
        })
    }
}

/// The four standard Unicode normalization forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NormalizationForm {
    /// Canonical composition.
    #[default]
    Nfc,
    /// Canonical decomposition.
    Nfd,
    /// Compatibility composition.
    Nfkc,
    /// Compatibility decomposition.
    Nfkd,
}

/// Apply a Unicode normalization form (NFC unless configured otherwise).
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeNormalizer {
    form: NormalizationForm,
}

impl UnicodeNormalizer {
    pub fn new(form: NormalizationForm) -> Self {
        Self { form }
    }

    pub fn form(&self) -> NormalizationForm {
        self.form
    }

    fn is_normalized(&self, text: &str) -> bool {
        let quick = match self.form {
            NormalizationForm::Nfc => is_nfc_quick(text.chars()),
            NormalizationForm::Nfd => is_nfd_quick(text.chars()),
            NormalizationForm::Nfkc => is_nfkc_quick(text.chars()),
            NormalizationForm::Nfkd => is_nfkd_quick(text.chars()),
        };
        quick == IsNormalized::Yes
    }
}

impl Normalizer for UnicodeNormalizer {
    fn normalize(&self, view: TextView) -> TextView {
        if self.is_normalized(&view) {
            return view;
        }
        pool::with_string(|buf| {
            match self.form {
                NormalizationForm::Nfc => buf.extend(view.as_str().nfc()),
                NormalizationForm::Nfd => buf.extend(view.as_str().nfd()),
                NormalizationForm::Nfkc => buf.extend(view.as_str().nfkc()),
                NormalizationForm::Nfkd => buf.extend(view.as_str().nfkd()),
            }
            if buf.as_str() == view.as_str() {
                view
            } else {
                TextView::new(buf.as_str())
            }
        })
    }
}

/// Normalizers applied in order, each to the previous one's output.
#[derive(Default)]
pub struct NormalizerSequence {
    normalizers: Vec<Box<dyn Normalizer>>,
}

impl NormalizerSequence {
    pub fn new(normalizers: Vec<Box<dyn Normalizer>>) -> Self {
        Self { normalizers }
    }

    pub fn push(&mut self, normalizer: Box<dyn Normalizer>) {
        self.normalizers.push(normalizer);
    }

    pub fn len(&self) -> usize {
        self.normalizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalizers.is_empty()
    }
}

impl Normalizer for NormalizerSequence {
    fn normalize(&self, view: TextView) -> TextView {
        self.normalizers
            .iter()
            .fold(view, |view, normalizer| normalizer.normalize(view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(normalizer: &dyn Normalizer, text: &str) -> String {
        normalizer.normalize(TextView::new(text)).as_str().to_string()
    }

    #[test]
    fn test_prepend_and_append() {
        let prepend = PrependNormalizer::new("▁").unwrap();
        let append = AppendNormalizer::new("</w>").unwrap();
        assert_eq!(run(&prepend, "hey"), "▁hey");
        assert_eq!(run(&append, "hey"), "hey</w>");
        assert_eq!(run(&prepend, ""), "");
    }

    #[test]
    fn test_empty_configuration_rejected() {
        assert!(matches!(
            PrependNormalizer::new(""),
            Err(TokenizerError::EmptyArgument { field: "prefix", .. })
        ));
        assert!(matches!(
            AppendNormalizer::new(""),
            Err(TokenizerError::EmptyArgument { field: "suffix", .. })
        ));
        assert!(matches!(
            ReplaceNormalizer::new("", "x"),
            Err(TokenizerError::EmptyArgument { field: "pattern", .. })
        ));
    }

    #[test]
    fn test_replace_literal() {
        let replace = ReplaceNormalizer::new(" ", "▁").unwrap();
        assert_eq!(run(&replace, "a b  c"), "a▁b▁▁c");
        // regex metacharacters are literal
        let dots = ReplaceNormalizer::new(".*", "!").unwrap();
        assert_eq!(run(&dots, "a.*b.c"), "a!b.c");
    }

    #[test]
    fn test_replace_with_empty_deletes() {
        let delete = ReplaceNormalizer::new("--", "").unwrap();
        assert_eq!(run(&delete, "a--b----c"), "abc");
    }

    #[test]
    fn test_unchanged_input_is_not_copied() {
        let replace = ReplaceNormalizer::new("x", "y").unwrap();
        let input = TextView::new("abc");
        let output = replace.normalize(input.clone());
        assert!(output.shares_source(&input));

        let nfc = UnicodeNormalizer::default();
        let output = nfc.normalize(input.clone());
        assert!(output.shares_source(&input));
    }

    #[test]
    fn test_unicode_forms() {
        let decomposed = "e\u{0301}";
        let composed = "\u{00E9}";
        assert_eq!(run(&UnicodeNormalizer::default(), decomposed), composed);
        assert_eq!(
            run(&UnicodeNormalizer::new(NormalizationForm::Nfd), composed),
            decomposed
        );
        // compatibility forms fold the "ﬁ" ligature
        assert_eq!(run(&UnicodeNormalizer::new(NormalizationForm::Nfkc), "ﬁ"), "fi");
        assert_eq!(run(&UnicodeNormalizer::new(NormalizationForm::Nfkd), "ﬁ"), "fi");
        assert_eq!(run(&UnicodeNormalizer::new(NormalizationForm::Nfc), "ﬁ"), "ﬁ");
    }

    #[test]
    fn test_unicode_idempotent() {
        for form in [
            NormalizationForm::Nfc,
            NormalizationForm::Nfd,
            NormalizationForm::Nfkc,
            NormalizationForm::Nfkd,
        ] {
            let normalizer = UnicodeNormalizer::new(form);
            let once = run(&normalizer, "Ångström e\u{0301} ﬁ ①");
            let twice = run(&normalizer, &once);
            assert_eq!(once, twice, "{form:?} not idempotent");
        }
    }

    #[test]
    fn test_sequence_runs_in_order() {
        let sequence = NormalizerSequence::new(vec![
            Box::new(ReplaceNormalizer::new(" ", "▁").unwrap()),
            Box::new(PrependNormalizer::new("▁").unwrap()),
        ]);
        assert_eq!(sequence.len(), 2);
        assert_eq!(run(&sequence, "Hey friend"), "▁Hey▁friend");

        let reversed = NormalizerSequence::new(vec![
            Box::new(PrependNormalizer::new(" ").unwrap()),
            Box::new(ReplaceNormalizer::new(" ", "▁").unwrap()),
        ]);
        assert_eq!(run(&reversed, "Hey friend"), "▁Hey▁friend");
        assert_eq!(run(&NormalizerSequence::default(), "as is"), "as is");
    }
}
