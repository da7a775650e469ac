//! LZ77 match finding for DEFLATE.
//!
//! The compressor keeps a 32 KiB circular dictionary. Every position is
//! entered into a hash chain keyed on the three bytes starting there; a match
//! search walks that chain from the most recent candidate backwards, so among
//! equally long matches the nearest one wins.
//!
//! The dictionary carries a copy of its first `MAX_MATCH - 1` bytes past the
//! end. Comparisons that start near the end of the ring can then read
//! straight through the wrap point without masking every index.
//!
//! Matches found here are recorded in an [`LzBuffer`], the compact
//! intermediate form a block is built from before Huffman coding.

use crate::tables::{MAX_MATCH, MIN_MATCH, distance_to_code, length_to_code};

/// Size of the sliding dictionary.
pub const LZ_DICT_SIZE: usize = 32768;

/// Mask for positions inside the dictionary ring.
pub const LZ_DICT_MASK: usize = LZ_DICT_SIZE - 1;

/// Number of bits in a chain hash.
pub const HASH_BITS: u32 = 15;

/// Shift applied per byte when rolling the chain hash.
pub const HASH_SHIFT: u32 = HASH_BITS.div_ceil(3);

const HASH_SIZE: usize = 1 << HASH_BITS;

/// Number of bits in the single-slot hash used by the fast level.
pub const FAST_HASH_BITS: u32 = 12;

const FAST_HASH_MASK: u32 = (1 << FAST_HASH_BITS) - 1;

/// Matches of exactly `MIN_MATCH` bytes this far back cost more than the
/// literals they replace.
pub const MIN_MATCH_FAR_DISTANCE: usize = 8 * 1024;

/// Probe counts indexed by compression level (0-10).
pub const LEVEL_PROBES: [u32; 11] = [0, 1, 6, 32, 16, 32, 128, 256, 512, 768, 1500];

/// Capacity of the LZ code buffer for one block.
pub const LZ_CODE_BUF_SIZE: usize = 64 * 1024;

/// A match found in the dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Match {
    /// Number of matching bytes (0 when nothing was found).
    pub len: usize,
    /// Distance back from the current position.
    pub dist: usize,
}

/// Hash-chain match finder over a 32 KiB dictionary.
#[derive(Debug, Clone)]
pub struct MatchFinder {
    dict: Box<[u8]>,
    hash: Box<[u16]>,
    next: Box<[u16]>,
    /// Probe budgets for short and long current matches.
    probes: [u32; 2],
}

impl MatchFinder {
    /// Create a match finder that follows chains for about `raw_probes`
    /// candidates.
    ///
    /// Once a match of 32 bytes or more is in hand, only a quarter of that
    /// budget is spent looking for something longer. Budgets are rounded up
    /// to a multiple of three; zero disables searching.
    pub fn new(raw_probes: u32) -> Self {
        Self {
            dict: vec![0u8; LZ_DICT_SIZE + MAX_MATCH - 1].into_boxed_slice(),
            hash: vec![0u16; HASH_SIZE].into_boxed_slice(),
            next: vec![0u16; LZ_DICT_SIZE].into_boxed_slice(),
            probes: [
                3 * raw_probes.div_ceil(3),
                3 * (raw_probes >> 2).div_ceil(3),
            ],
        }
    }

    /// Effective probe budgets `[short, long]`.
    pub fn probes(&self) -> [u32; 2] {
        self.probes
    }

    /// Forget every chain. Dictionary bytes are kept but become unreachable.
    pub fn reset(&mut self) {
        self.hash.fill(0);
        self.next.fill(0);
    }

    /// Byte stored for absolute position `pos`.
    #[inline]
    pub fn byte(&self, pos: usize) -> u8 {
        self.dict[pos & LZ_DICT_MASK]
    }

    /// Store `byte` at absolute position `pos`, keeping the wrap copy current.
    #[inline]
    pub fn write_byte(&mut self, pos: usize, byte: u8) {
        let at = pos & LZ_DICT_MASK;
        self.dict[at] = byte;
        if at < MAX_MATCH - 1 {
            self.dict[LZ_DICT_SIZE + at] = byte;
        }
    }

    /// Store `bytes` starting at absolute position `pos`.
    pub fn write_bytes(&mut self, pos: usize, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            self.write_byte(pos + i, b);
        }
    }

    /// Hash seeded with the two bytes at `pos` and `pos + 1`.
    #[inline]
    pub fn seed_hash(&self, pos: usize) -> u32 {
        ((self.byte(pos) as u32) << HASH_SHIFT) ^ self.byte(pos + 1) as u32
    }

    /// Roll one more byte into a chain hash.
    #[inline]
    pub fn roll_hash(hash: u32, byte: u8) -> u32 {
        ((hash << HASH_SHIFT) ^ byte as u32) & (HASH_SIZE as u32 - 1)
    }

    /// Chain hash of the three bytes starting at `pos`.
    #[inline]
    pub fn hash_at(&self, pos: usize) -> u32 {
        Self::roll_hash(self.seed_hash(pos), self.byte(pos + 2))
    }

    /// Link position `pos` at the head of the chain for `hash`.
    #[inline]
    pub fn insert(&mut self, pos: usize, hash: u32) {
        self.next[pos & LZ_DICT_MASK] = self.hash[hash as usize];
        self.hash[hash as usize] = pos as u16;
    }

    /// Search the chain for a match at `pos` longer than `best.len`.
    ///
    /// Candidates further back than `max_dist` end the search, as does the
    /// probe budget. Only strictly longer matches replace `best`, so ties go
    /// to the most recent candidate. The result never exceeds
    /// `max_match_len` bytes.
    pub fn find_match(&self, pos: usize, max_dist: usize, max_match_len: usize, best: Match) -> Match {
        let max_match_len = max_match_len.min(MAX_MATCH);
        let mut best = best;
        if max_match_len <= best.len {
            return best;
        }

        let cur = pos & LZ_DICT_MASK;
        let mut probe_pos = cur;
        let mut probes_left = self.probes[usize::from(best.len >= 32)];
        let mut c0 = self.dict[cur + best.len];
        let mut c1 = self.dict[cur + best.len.saturating_sub(1)];

        loop {
            if probes_left == 0 {
                return best;
            }
            probes_left -= 1;

            let candidate = self.next[probe_pos];
            let dist = (pos as u16).wrapping_sub(candidate) as usize;
            if candidate == 0 || dist > max_dist || dist == 0 {
                return best;
            }
            probe_pos = candidate as usize & LZ_DICT_MASK;

            // The bytes at the current best length must agree before a full
            // comparison can possibly beat it.
            if self.dict[probe_pos + best.len] != c0
                || self.dict[probe_pos + best.len.saturating_sub(1)] != c1
            {
                continue;
            }

            let len = self.match_len(cur, probe_pos, max_match_len);
            if len > best.len {
                best = Match { len, dist };
                if len == max_match_len {
                    return best;
                }
                c0 = self.dict[cur + len];
                c1 = self.dict[cur + len - 1];
            }
        }
    }

    /// Length of the common prefix of the ring slots `a` and `b`, up to `max`.
    #[inline]
    pub fn match_len(&self, a: usize, b: usize, max: usize) -> usize {
        let max = max.min(MAX_MATCH);
        self.dict[a..a + max]
            .iter()
            .zip(&self.dict[b..b + max])
            .take_while(|(x, y)| x == y)
            .count()
    }

    /// The three bytes starting at ring slot `at`, little-endian.
    #[inline]
    pub fn trigram(&self, at: usize) -> u32 {
        u32::from_le_bytes([self.dict[at], self.dict[at + 1], self.dict[at + 2], 0])
    }

    /// Replace the single-slot entry for `trigram` with `pos`, returning
    /// the position stored there before.
    #[inline]
    pub fn fast_swap(&mut self, trigram: u32, pos: usize) -> u16 {
        let slot = ((trigram ^ (trigram >> (24 - (HASH_BITS - 8)))) & FAST_HASH_MASK) as usize;
        std::mem::replace(&mut self.hash[slot], pos as u16)
    }
}

/// One element of an [`LzBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LzToken {
    /// A literal byte.
    Literal(u8),
    /// A back-reference to previously seen data.
    Match {
        /// Number of bytes to copy (3-258).
        len: usize,
        /// Distance back into the window (1-32768).
        dist: usize,
    },
}

/// Pending literals and matches for the block being built.
///
/// Tokens are packed in groups of eight behind a flag byte, least
/// significant bit first; a set bit marks a match stored as `len - 3`
/// followed by `dist - 1` in little-endian order. Symbol frequencies are
/// counted as tokens arrive.
#[derive(Debug, Clone)]
pub struct LzBuffer {
    codes: Vec<u8>,
    flags_pos: usize,
    flags_left: u32,
    total_bytes: usize,
    lit_freq: [u32; 288],
    dist_freq: [u32; 32],
}

impl LzBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        let mut codes = Vec::with_capacity(LZ_CODE_BUF_SIZE);
        codes.push(0);
        Self {
            codes,
            flags_pos: 0,
            flags_left: 8,
            total_bytes: 0,
            lit_freq: [0; 288],
            dist_freq: [0; 32],
        }
    }

    /// Record a literal.
    #[inline]
    pub fn push_literal(&mut self, byte: u8) {
        self.codes.push(byte);
        self.codes[self.flags_pos] >>= 1;
        self.next_flag();
        self.total_bytes += 1;
        self.lit_freq[byte as usize] += 1;
    }

    /// Record a match of `len` bytes at distance `dist`.
    #[inline]
    pub fn push_match(&mut self, len: usize, dist: usize) {
        debug_assert!((MIN_MATCH..=MAX_MATCH).contains(&len));
        debug_assert!((1..=LZ_DICT_SIZE).contains(&dist));
        let d = ((dist - 1) as u16).to_le_bytes();
        self.codes.extend_from_slice(&[(len - MIN_MATCH) as u8, d[0], d[1]]);
        self.codes[self.flags_pos] = (self.codes[self.flags_pos] >> 1) | 0x80;
        self.next_flag();
        self.total_bytes += len;
        self.lit_freq[length_to_code(len).0 as usize] += 1;
        self.dist_freq[distance_to_code(dist).0 as usize] += 1;
    }

    fn next_flag(&mut self) {
        self.flags_left -= 1;
        if self.flags_left == 0 {
            self.flags_left = 8;
            self.flags_pos = self.codes.len();
            self.codes.push(0);
        }
    }

    /// Shift the last flag byte into place, dropping it if unused.
    pub fn finish_flags(&mut self) {
        if self.flags_left == 8 {
            self.codes.truncate(self.flags_pos);
        } else {
            self.codes[self.flags_pos] >>= self.flags_left;
        }
        self.flags_left = 8;
    }

    /// Whether the next token might not fit.
    #[inline]
    pub fn is_nearly_full(&self) -> bool {
        self.codes.len() > LZ_CODE_BUF_SIZE - 8
    }

    /// Encoded size of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether no token has been recorded.
    pub fn is_empty(&self) -> bool {
        self.total_bytes == 0
    }

    /// Number of input bytes the recorded tokens cover.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Literal/length symbol frequencies.
    pub fn lit_freq(&self) -> &[u32; 288] {
        &self.lit_freq
    }

    /// Distance symbol frequencies.
    pub fn dist_freq(&self) -> &[u32; 32] {
        &self.dist_freq
    }

    /// Iterate over the recorded tokens. Call [`Self::finish_flags`] first.
    pub fn tokens(&self) -> LzTokens<'_> {
        LzTokens {
            codes: &self.codes,
            pos: 0,
            flags: 1,
        }
    }

    /// Start a new block.
    pub fn clear(&mut self) {
        self.codes.clear();
        self.codes.push(0);
        self.flags_pos = 0;
        self.flags_left = 8;
        self.total_bytes = 0;
        self.lit_freq = [0; 288];
        self.dist_freq = [0; 32];
    }
}

impl Default for LzBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the tokens of an [`LzBuffer`].
#[derive(Debug)]
pub struct LzTokens<'a> {
    codes: &'a [u8],
    pos: usize,
    flags: u32,
}

impl Iterator for LzTokens<'_> {
    type Item = LzToken;

    fn next(&mut self) -> Option<LzToken> {
        if self.pos >= self.codes.len() {
            return None;
        }
        if self.flags == 1 {
            self.flags = self.codes[self.pos] as u32 | 0x100;
            self.pos += 1;
        }
        let is_match = self.flags & 1 != 0;
        self.flags >>= 1;

        let token = if is_match {
            let c = self.codes.get(self.pos..self.pos + 3)?;
            self.pos += 3;
            LzToken::Match {
                len: c[0] as usize + MIN_MATCH,
                dist: u16::from_le_bytes([c[1], c[2]]) as usize + 1,
            }
        } else {
            let b = *self.codes.get(self.pos)?;
            self.pos += 1;
            LzToken::Literal(b)
        };
        Some(token)
    }
}
