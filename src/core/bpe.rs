//! Byte-pair encoding of pre-token fragments.
//!
//! A fragment starts as one symbol per character. Adjacent pairs are merged
//! lowest-rank-first until no known merge remains, using a flat-array
//! linked list so each merge is O(1) to apply. Long fragments find the next
//! pair through a min-heap instead of a rescan.
//!
//! Characters with no vocabulary entry degrade to byte-fallback tokens
//! (`<0xHH>` per UTF-8 byte) when enabled, then to the unknown token.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::convert::{ByteToTokenConverter, Converter, ManyConverter, Utf8BytesConverter};
use super::pool;
use super::text_view::TextView;
use super::tokenizer::TokenizerError;
use super::vocab::Vocab;

/// Default number of fragments whose encodings are cached.
pub const DEFAULT_CACHE_SIZE: usize = 4096;

type Rank = u32;

const NONE: usize = usize::MAX;

/// Fragments with more symbols than this merge through a binary heap.
const HEAP_THRESHOLD: usize = 32;

/// Maps pre-token fragments to token ids.
pub trait Model: Send + Sync {
    /// Append the ids for `fragment` to `output`.
    fn tokenize(&self, fragment: &TextView, output: &mut Vec<u32>) -> Result<(), TokenizerError>;

    fn token_to_id(&self, token: &str) -> Option<u32>;

    fn id_to_token(&self, id: u32) -> Option<&str>;

    fn vocab_size(&self) -> usize;

    /// Clear any memoized fragment encodings.
    fn clear_cache(&self) {}

    /// Number of memoized fragment encodings.
    fn cache_len(&self) -> usize {
        0
    }
}

/// BPE model over a vocabulary and a pair-merge table.
pub struct Bpe {
    vocab: Vocab,
    /// (left id, right id) -> (rank, merged id)
    merges: FxHashMap<(u32, u32), (Rank, u32)>,
    byte_fallback: bool,
    /// Fragments that are whole vocabulary tokens skip merging.
    ignore_merges: bool,
    unk_id: Option<u32>,
    cache: Mutex<LruCache<TextView, Vec<u32>>>,
}

struct Node {
    id: u32,
    rank: Rank,
    prev: usize,
    next: usize,
}

impl Bpe {
    /// Build from a vocabulary and an ordered merge list; earlier merges win.
    ///
    /// Merges whose halves or result are missing from the vocabulary are
    /// ignored. Every fragment goes through rank-ordered merging, even one
    /// that is itself a vocabulary token, so results follow merges.txt
    /// exactly.
    pub fn new(vocab: Vocab, merges: &[(String, String)]) -> Self {
        let mut table = FxHashMap::default();
        let mut merged = String::new();
        for (rank, (left, right)) in merges.iter().enumerate() {
            merged.clear();
            merged.push_str(left);
            merged.push_str(right);
            if let (Some(l), Some(r), Some(m)) = (
                vocab.token_to_id(left),
                vocab.token_to_id(right),
                vocab.token_to_id(&merged),
            ) {
                table.entry((l, r)).or_insert((rank as Rank, m));
            }
        }
        Self::with_table(vocab, table, false)
    }

    /// Build from a rank-ordered vocabulary (tiktoken style, rank == id).
    ///
    /// Every split of a multi-character token whose halves are both tokens
    /// becomes a merge ranked by the merged id. As in tiktoken, a fragment
    /// that is itself a token maps straight to its id without merging.
    pub fn from_ranked_vocab(vocab: Vocab) -> Self {
        let mut table: FxHashMap<(u32, u32), (Rank, u32)> = FxHashMap::default();
        for (token, id) in vocab.iter() {
            for (split, _) in token.char_indices().skip(1) {
                let (left, right) = token.split_at(split);
                if let (Some(l), Some(r)) = (vocab.token_to_id(left), vocab.token_to_id(right)) {
                    table
                        .entry((l, r))
                        .and_modify(|entry| {
                            if id < entry.0 {
                                *entry = (id, id);
                            }
                        })
                        .or_insert((id, id));
                }
            }
        }
        Self::with_table(vocab, table, true)
    }

    fn with_table(
        vocab: Vocab,
        merges: FxHashMap<(u32, u32), (Rank, u32)>,
        ignore_merges: bool,
    ) -> Self {
        debug!(
            vocab_size = vocab.len(),
            merge_count = merges.len(),
            "BPE model initialized"
        );
        Self {
            vocab,
            merges,
            byte_fallback: false,
            ignore_merges,
            unk_id: None,
            cache: Mutex::new(LruCache::new(cache_capacity(DEFAULT_CACHE_SIZE))),
        }
    }

    /// Enable or disable `<0xHH>` byte fallback for unknown characters.
    pub fn byte_fallback(mut self, enabled: bool) -> Self {
        self.byte_fallback = enabled;
        self
    }

    /// Set the token used when neither the vocabulary nor byte fallback
    /// covers a character.
    pub fn unk_token(mut self, token: &str) -> Result<Self, TokenizerError> {
        let id = self
            .vocab
            .token_to_id(token)
            .ok_or_else(|| TokenizerError::UnknownToken(token.to_string()))?;
        self.unk_id = Some(id);
        Ok(self)
    }

    /// Resize the fragment cache, dropping its contents.
    pub fn cache_size(mut self, cache_size: usize) -> Self {
        self.cache = Mutex::new(LruCache::new(cache_capacity(cache_size)));
        self
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn merge_count(&self) -> usize {
        self.merges.len()
    }

    /// Initial symbols: one id per character, with fallbacks resolved.
    fn push_symbols(&self, fragment: &str, symbols: &mut Vec<u32>) -> Result<(), TokenizerError> {
        let mut buf = [0u8; 4];
        for ch in fragment.chars() {
            let symbol = ch.encode_utf8(&mut buf);
            if let Some(id) = self.vocab.token_to_id(symbol) {
                symbols.push(id);
                continue;
            }
            if self.byte_fallback && self.push_byte_fallback(symbol, symbols) {
                continue;
            }
            match self.unk_id {
                // Runs of unknown characters collapse into one unknown token.
                Some(unk) if symbols.last() == Some(&unk) => {}
                Some(unk) => symbols.push(unk),
                None => return Err(TokenizerError::UnknownSymbol(symbol.to_string())),
            }
        }
        Ok(())
    }

    fn push_byte_fallback(&self, symbol: &str, symbols: &mut Vec<u32>) -> bool {
        pool::with_bytes(|bytes| {
            Utf8BytesConverter.convert_into(symbol, bytes);
            let start = symbols.len();
            for byte in bytes.iter() {
                match self.vocab.token_to_id(ByteToTokenConverter.convert(byte)) {
                    Some(id) => symbols.push(id),
                    None => {
                        symbols.truncate(start);
                        return false;
                    }
                }
            }
            true
        })
    }

    fn merge(&self, symbols: &[u32], output: &mut Vec<u32>) {
        if symbols.len() < 2 {
            output.extend_from_slice(symbols);
            return;
        }

        let mut nodes = self.build_nodes(symbols);
        if symbols.len() <= HEAP_THRESHOLD {
            self.merge_linear(&mut nodes);
        } else {
            self.merge_heap(&mut nodes);
        }

        let mut cur = 0;
        while cur != NONE {
            output.push(nodes[cur].id);
            cur = nodes[cur].next;
        }
    }

    fn build_nodes(&self, symbols: &[u32]) -> Vec<Node> {
        let n = symbols.len();
        let mut nodes: Vec<Node> = symbols
            .iter()
            .enumerate()
            .map(|(i, &id)| Node {
                id,
                rank: Rank::MAX,
                prev: if i > 0 { i - 1 } else { NONE },
                next: if i + 1 < n { i + 1 } else { NONE },
            })
            .collect();
        for i in 0..n - 1 {
            nodes[i].rank = self.pair_rank(&nodes, i);
        }
        nodes
    }

    /// Replace the pair starting at `i` with its merged token and return the
    /// index of the predecessor, if any. Refreshes the ranks of both.
    fn apply_merge(&self, nodes: &mut [Node], i: usize) -> Option<usize> {
        let j = nodes[i].next;
        let Some(&(_, merged)) = self.merges.get(&(nodes[i].id, nodes[j].id)) else {
            nodes[i].rank = Rank::MAX;
            return None;
        };
        nodes[i].id = merged;
        nodes[i].next = nodes[j].next;
        if nodes[j].next != NONE {
            let after = nodes[j].next;
            nodes[after].prev = i;
        }
        nodes[j].rank = Rank::MAX;

        nodes[i].rank = self.pair_rank(nodes, i);
        let prev = nodes[i].prev;
        if prev == NONE {
            return None;
        }
        nodes[prev].rank = self.pair_rank(nodes, prev);
        Some(prev)
    }

    /// O(n) scan per merge.
    fn merge_linear(&self, nodes: &mut [Node]) {
        loop {
            // Lowest rank, leftmost on ties.
            let mut best = (Rank::MAX, NONE);
            let mut cur = 0;
            while cur != NONE {
                if nodes[cur].rank < best.0 {
                    best = (nodes[cur].rank, cur);
                }
                cur = nodes[cur].next;
            }
            if best.1 == NONE {
                break;
            }
            self.apply_merge(nodes, best.1);
        }
    }

    /// O(log n) per merge. Entries whose rank no longer matches the node
    /// are stale and skipped; node indices follow list order, so ties still
    /// resolve leftmost.
    fn merge_heap(&self, nodes: &mut [Node]) {
        let mut heap: BinaryHeap<Reverse<(Rank, usize)>> = nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.rank != Rank::MAX)
            .map(|(i, node)| Reverse((node.rank, i)))
            .collect();

        while let Some(Reverse((rank, i))) = heap.pop() {
            if rank == Rank::MAX || nodes[i].rank != rank {
                continue;
            }
            let prev = self.apply_merge(nodes, i);
            if nodes[i].rank != Rank::MAX {
                heap.push(Reverse((nodes[i].rank, i)));
            }
            if let Some(prev) = prev {
                if nodes[prev].rank != Rank::MAX {
                    heap.push(Reverse((nodes[prev].rank, prev)));
                }
            }
        }
    }

    #[inline]
    fn pair_rank(&self, nodes: &[Node], i: usize) -> Rank {
        let j = nodes[i].next;
        if j == NONE {
            return Rank::MAX;
        }
        self.merges
            .get(&(nodes[i].id, nodes[j].id))
            .map_or(Rank::MAX, |&(rank, _)| rank)
    }
}

fn cache_capacity(cache_size: usize) -> NonZeroUsize {
    NonZeroUsize::new(cache_size.max(1)).unwrap_or(NonZeroUsize::MIN)
}

impl Model for Bpe {
    fn tokenize(&self, fragment: &TextView, output: &mut Vec<u32>) -> Result<(), TokenizerError> {
        if fragment.is_empty() {
            return Ok(());
        }

        if self.ignore_merges {
            if let Some(id) = self.vocab.token_to_id(fragment) {
                output.push(id);
                return Ok(());
            }
        }

        if let Ok(mut cache) = self.cache.lock() {
            if let Some(cached) = cache.get(fragment.as_str()) {
                output.extend_from_slice(cached);
                return Ok(());
            }
        }

        let start = output.len();
        pool::with_ids(|symbols| -> Result<(), TokenizerError> {
            self.push_symbols(fragment, symbols)?;
            self.merge(symbols, output);
            Ok(())
        })?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(TextView::new(fragment.as_str()), output[start..].to_vec());
        }
        Ok(())
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocab.token_to_id(token)
    }

    fn id_to_token(&self, id: u32) -> Option<&str> {
        self.vocab.id_to_token(id)
    }

    fn vocab_size(&self) -> usize {
        self.vocab.max_id_exclusive()
    }

    fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    fn cache_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}
