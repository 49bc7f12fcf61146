//! Special-token insertion around one or two tokenized sequences.

use super::encoding::{Encoding, Token};

/// Combines sequence A (and optionally B) into the model input.
pub trait PostProcessor: Send + Sync {
    /// Append the combined sequence to `output`.
    ///
    /// With `add_special_tokens == false` the sequences are only
    /// concatenated, A first.
    fn post_process(
        &self,
        tokens_a: &Encoding,
        tokens_b: Option<&Encoding>,
        add_special_tokens: bool,
        output: &mut Encoding,
    );

    /// Number of special tokens `post_process` inserts.
    fn num_added_tokens(&self, is_pair: bool) -> usize;
}

fn concat(tokens_a: &Encoding, tokens_b: Option<&Encoding>, output: &mut Encoding) {
    output.extend(tokens_a);
    if let Some(tokens_b) = tokens_b {
        output.extend(tokens_b);
    }
}

/// Plain concatenation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPostProcessor;

impl PostProcessor for DefaultPostProcessor {
    fn post_process(
        &self,
        tokens_a: &Encoding,
        tokens_b: Option<&Encoding>,
        _add_special_tokens: bool,
        output: &mut Encoding,
    ) {
        concat(tokens_a, tokens_b, output);
    }

    fn num_added_tokens(&self, _is_pair: bool) -> usize {
        0
    }
}

/// Concatenation for byte-level pipelines.
///
/// Encodings carry no character offsets, so `trim_offsets` has nothing to
/// act on; it is kept so configurations round-trip.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteLevelPostProcessor {
    trim_offsets: bool,
}

impl ByteLevelPostProcessor {
    pub fn new(trim_offsets: bool) -> Self {
        Self { trim_offsets }
    }

    pub fn trim_offsets(&self) -> bool {
        self.trim_offsets
    }
}

impl PostProcessor for ByteLevelPostProcessor {
    fn post_process(
        &self,
        tokens_a: &Encoding,
        tokens_b: Option<&Encoding>,
        _add_special_tokens: bool,
        output: &mut Encoding,
    ) {
        concat(tokens_a, tokens_b, output);
    }

    fn num_added_tokens(&self, _is_pair: bool) -> usize {
        0
    }
}

/// RoBERTa framing: `<s> A </s>` and `<s> A </s> </s> B </s>`.
#[derive(Debug, Clone)]
pub struct RobertaPostProcessor {
    sep: Token,
    cls: Token,
}

impl RobertaPostProcessor {
    pub fn new(sep: Token, cls: Token) -> Self {
        Self { sep, cls }
    }

    pub fn sep(&self) -> &Token {
        &self.sep
    }

    pub fn cls(&self) -> &Token {
        &self.cls
    }
}

impl PostProcessor for RobertaPostProcessor {
    fn post_process(
        &self,
        tokens_a: &Encoding,
        tokens_b: Option<&Encoding>,
        add_special_tokens: bool,
        output: &mut Encoding,
    ) {
        if !add_special_tokens {
            return concat(tokens_a, tokens_b, output);
        }
        output.push_token(&self.cls);
        output.extend(tokens_a);
        output.push_token(&self.sep);
        if let Some(tokens_b) = tokens_b {
            output.push_token(&self.sep);
            output.extend(tokens_b);
            output.push_token(&self.sep);
        }
    }

    fn num_added_tokens(&self, is_pair: bool) -> usize {
        if is_pair {
            4
        } else {
            2
        }
    }
}

/// BERT framing: `[CLS] A [SEP]` and `[CLS] A [SEP] B [SEP]`.
#[derive(Debug, Clone)]
pub struct BertPostProcessor {
    sep: Token,
    cls: Token,
}

impl BertPostProcessor {
    pub fn new(sep: Token, cls: Token) -> Self {
        Self { sep, cls }
    }
}

impl PostProcessor for BertPostProcessor {
    fn post_process(
        &self,
        tokens_a: &Encoding,
        tokens_b: Option<&Encoding>,
        add_special_tokens: bool,
        output: &mut Encoding,
    ) {
        if !add_special_tokens {
            return concat(tokens_a, tokens_b, output);
        }
        output.push_token(&self.cls);
        output.extend(tokens_a);
        output.push_token(&self.sep);
        if let Some(tokens_b) = tokens_b {
            output.extend(tokens_b);
            output.push_token(&self.sep);
        }
    }

    fn num_added_tokens(&self, is_pair: bool) -> usize {
        if is_pair {
            3
        } else {
            2
        }
    }
}
