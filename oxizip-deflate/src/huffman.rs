//! Canonical Huffman codes for DEFLATE.
//!
//! Three pieces live here:
//!
//! - [`build_lengths`]: optimal code lengths for a frequency table, limited to
//!   a maximum length (15 for literal/length and distance, 7 for the
//!   code-length alphabet).
//! - [`EncodeTable`]: canonical codes, bit-reversed for LSB-first emission.
//! - [`DecodeTable`]: a 10-bit direct lookup table backed by a small node
//!   arena for longer codes.
//!
//! # Alphabets
//!
//! DEFLATE uses three Huffman alphabets:
//! - **Literal/Length**: 0-287 (0-255 literals, 256 EOB, 257-285 lengths)
//! - **Distance**: 0-31 (only 0-29 are valid)
//! - **Code Length**: 0-18 (for transmitting dynamic tables)

use oxizip_core::bitbuf::reverse_bits;
use oxizip_core::error::{OxiZipError, Result};

/// Maximum code length in DEFLATE (15 bits).
pub const MAX_CODE_LENGTH: u8 = 15;

/// Maximum code length for the code-length alphabet.
pub const MAX_CODELEN_CODE_LENGTH: u8 = 7;

/// Number of literal/length symbols a block may transmit.
pub const LITLEN_ALPHABET_SIZE: usize = 286;

/// Number of distance symbols a block may transmit.
pub const DISTANCE_ALPHABET_SIZE: usize = 30;

/// Size of the code length alphabet (0-18).
pub const CODELEN_ALPHABET_SIZE: usize = 19;

/// End of block symbol.
pub const END_OF_BLOCK: u16 = 256;

/// Width of the direct lookup table.
pub const FAST_LOOKUP_BITS: u32 = 10;

const FAST_LOOKUP_SIZE: usize = 1 << FAST_LOOKUP_BITS;

/// Compute length-limited Huffman code lengths for `freqs`.
///
/// Symbols with zero frequency get length 0. A lone used symbol gets
/// length 1. Otherwise the lengths describe a complete prefix code (the
/// Kraft sum is exactly 1) with no length above `max_len`, and more frequent
/// symbols never get longer codes than less frequent ones.
///
/// Fails with `InvalidParameter` when symbols are used but `max_len` is 0 or
/// above 63, or when more than `2^max_len` symbols are used.
///
/// # Example
///
/// ```
/// use oxizip_deflate::huffman::build_lengths;
///
/// let lengths = build_lengths(&[10, 1, 1, 0, 5], 15).unwrap();
/// assert_eq!(lengths, vec![1, 3, 3, 0, 2]);
/// assert!(build_lengths(&[1, 1, 1, 1, 1], 2).is_err());
/// ```
pub fn build_lengths(freqs: &[u32], max_len: u8) -> Result<Vec<u8>> {
    let mut lengths = vec![0u8; freqs.len()];

    // Stable sort keeps equal frequencies in symbol order.
    let mut used: Vec<(u64, usize)> = freqs
        .iter()
        .enumerate()
        .filter(|&(_, &f)| f > 0)
        .map(|(sym, &f)| (f as u64, sym))
        .collect();
    used.sort_by_key(|&(freq, _)| freq);

    if used.is_empty() {
        return Ok(lengths);
    }
    if max_len == 0 || max_len > 63 || used.len() as u64 > 1u64 << max_len {
        return Err(OxiZipError::invalid_parameter(format!(
            "{} used symbols do not fit in codes of at most {max_len} bits",
            used.len()
        )));
    }
    if let [(_, sym)] = used[..] {
        lengths[sym] = 1;
        return Ok(lengths);
    }

    let mut keys: Vec<u64> = used.iter().map(|&(freq, _)| freq).collect();
    minimum_redundancy(&mut keys);

    let mut num_codes = [0u32; 64];
    for &depth in &keys {
        num_codes[(depth as usize).min(63)] += 1;
    }
    limit_code_lengths(&mut num_codes, max_len as usize);

    // The end of `used` holds the most frequent symbols; they get the
    // shortest lengths.
    let mut next = used.len();
    for (len, &count) in num_codes.iter().enumerate().take(max_len as usize + 1).skip(1) {
        for _ in 0..count {
            next -= 1;
            lengths[used[next].1] = len as u8;
        }
    }

    Ok(lengths)
}

/// In-place minimum-redundancy code lengths (Moffat and Katajainen).
///
/// `a` must be sorted by ascending weight and hold at least two entries. On
/// return `a[i]` is the code length of the i-th lightest symbol.
fn minimum_redundancy(a: &mut [u64]) {
    let n = a.len();
    debug_assert!(n >= 2);

    // Phase 1: build the tree, storing parent pointers in place.
    a[0] += a[1];
    let mut root = 0usize;
    let mut leaf = 2usize;
    for next in 1..n - 1 {
        if leaf >= n || a[root] < a[leaf] {
            a[next] = a[root];
            a[root] = next as u64;
            root += 1;
        } else {
            a[next] = a[leaf];
            leaf += 1;
        }

        if leaf >= n || (root < next && a[root] < a[leaf]) {
            a[next] += a[root];
            a[root] = next as u64;
            root += 1;
        } else {
            a[next] += a[leaf];
            leaf += 1;
        }
    }

    // Phase 2: convert parent pointers into internal node depths.
    a[n - 2] = 0;
    for next in (0..n.saturating_sub(2)).rev() {
        a[next] = a[a[next] as usize] + 1;
    }

    // Phase 3: convert internal node depths into leaf depths.
    let mut avail = 1usize;
    let mut used = 0usize;
    let mut depth = 0u64;
    let mut root = n as isize - 2;
    let mut next = n as isize - 1;
    while avail > 0 {
        while root >= 0 && a[root as usize] == depth {
            used += 1;
            root -= 1;
        }
        while avail > used {
            a[next as usize] = depth;
            next -= 1;
            avail -= 1;
        }
        avail = 2 * used;
        depth += 1;
        used = 0;
    }
}

/// Fold lengths above `max_len` into `max_len`, then rebalance until the
/// code space is exactly full again.
fn limit_code_lengths(num_codes: &mut [u32; 64], max_len: usize) {
    for i in max_len + 1..num_codes.len() {
        num_codes[max_len] += num_codes[i];
        num_codes[i] = 0;
    }

    let mut total: u64 = (1..=max_len)
        .map(|i| (num_codes[i] as u64) << (max_len - i))
        .sum();

    while total != 1u64 << max_len {
        num_codes[max_len] -= 1;
        // Split a code from the longest non-empty length below the maximum.
        if let Some(i) = (1..max_len).rev().find(|&i| num_codes[i] != 0) {
            num_codes[i] -= 1;
            num_codes[i + 1] += 2;
        }
        total -= 1;
    }
}

/// Kraft numerator of `lengths` against a denominator of `2^max_len`.
///
/// A complete code yields exactly `1 << max_len`.
pub fn kraft_sum(lengths: &[u8], max_len: u8) -> u64 {
    lengths
        .iter()
        .filter(|&&len| len > 0)
        .map(|&len| 1u64 << (max_len.saturating_sub(len)))
        .sum()
}

/// Canonical codes for one alphabet, ready for LSB-first output.
#[derive(Debug, Clone)]
pub struct EncodeTable {
    codes: Vec<u16>,
    lengths: Vec<u8>,
}

impl EncodeTable {
    /// Assign canonical codes in (length, symbol) order.
    pub fn from_lengths(lengths: &[u8]) -> Self {
        let mut count = [0u32; MAX_CODE_LENGTH as usize + 2];
        for &len in lengths {
            count[len as usize] += 1;
        }
        count[0] = 0;

        let mut next_code = [0u32; MAX_CODE_LENGTH as usize + 2];
        for len in 2..=MAX_CODE_LENGTH as usize {
            next_code[len] = (next_code[len - 1] + count[len - 1]) << 1;
        }

        let codes = lengths
            .iter()
            .map(|&len| {
                if len == 0 {
                    return 0;
                }
                let code = next_code[len as usize];
                next_code[len as usize] += 1;
                reverse_bits(code, len as u32) as u16
            })
            .collect();

        Self {
            codes,
            lengths: lengths.to_vec(),
        }
    }

    /// Bit-reversed code and its length for `symbol`.
    #[inline]
    pub fn code(&self, symbol: usize) -> (u32, u32) {
        (self.codes[symbol] as u32, self.lengths[symbol] as u32)
    }

    /// Code lengths this table was built from.
    pub fn lengths(&self) -> &[u8] {
        &self.lengths
    }
}

/// One slot of the direct lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FastEntry {
    /// No code starts with these bits.
    Empty,
    /// A code of at most `FAST_LOOKUP_BITS` bits.
    Symbol { symbol: u16, len: u8 },
    /// Codes longer than the table; continue at this arena node.
    Node(u16),
}

/// One child link of an arena node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Empty,
    Symbol(u16),
    Node(u16),
}

/// Result of a table lookup against the bits currently buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// A complete code: the symbol and how many bits it occupied.
    Symbol(u16, u32),
    /// The buffered bits are a prefix of a code; supply more.
    NeedMoreBits,
    /// No code matches the buffered bits.
    Invalid,
}

/// Huffman decoding table built from code lengths.
#[derive(Debug, Clone)]
pub struct DecodeTable {
    fast: Box<[FastEntry; FAST_LOOKUP_SIZE]>,
    nodes: Vec<[Link; 2]>,
}

impl DecodeTable {
    /// Build a decoding table.
    ///
    /// Fails with `CorruptTable` when a length exceeds 15, or when more than
    /// one symbol is used and the lengths do not exactly fill the code space.
    pub fn from_lengths(lengths: &[u8]) -> Result<Self> {
        let mut count = [0u32; MAX_CODE_LENGTH as usize + 1];
        for &len in lengths {
            if len > MAX_CODE_LENGTH {
                return Err(OxiZipError::corrupt_table(format!(
                    "code length {len} exceeds {MAX_CODE_LENGTH}"
                )));
            }
            count[len as usize] += 1;
        }

        let used: u32 = count[1..].iter().sum();
        let mut next_code = [0u32; MAX_CODE_LENGTH as usize + 2];
        let mut total = 0u32;
        for len in 1..=MAX_CODE_LENGTH as usize {
            total = (total + count[len]) << 1;
            next_code[len + 1] = total;
        }
        if total != 1 << 16 && used > 1 {
            return Err(OxiZipError::corrupt_table(format!(
                "{used} code lengths do not fill the code space"
            )));
        }

        let mut table = Self {
            fast: Box::new([FastEntry::Empty; FAST_LOOKUP_SIZE]),
            nodes: Vec::new(),
        };

        for (symbol, &len) in lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let code = next_code[len as usize];
            next_code[len as usize] += 1;
            let rev = reverse_bits(code, len as u32) as usize;
            table.insert(rev, len as u32, symbol as u16);
        }

        Ok(table)
    }

    fn insert(&mut self, rev: usize, len: u32, symbol: u16) {
        if len <= FAST_LOOKUP_BITS {
            let mut slot = rev;
            while slot < FAST_LOOKUP_SIZE {
                self.fast[slot] = FastEntry::Symbol {
                    symbol,
                    len: len as u8,
                };
                slot += 1 << len;
            }
            return;
        }

        let prefix = rev & (FAST_LOOKUP_SIZE - 1);
        let mut node = match self.fast[prefix] {
            FastEntry::Node(node) => node as usize,
            _ => {
                let node = self.new_node();
                self.fast[prefix] = FastEntry::Node(node as u16);
                node
            }
        };

        let mut bits = rev >> FAST_LOOKUP_BITS;
        for _ in FAST_LOOKUP_BITS + 1..len {
            let bit = bits & 1;
            bits >>= 1;
            node = match self.nodes[node][bit] {
                Link::Node(child) => child as usize,
                _ => {
                    let child = self.new_node();
                    self.nodes[node][bit] = Link::Node(child as u16);
                    child
                }
            };
        }
        self.nodes[node][bits & 1] = Link::Symbol(symbol);
    }

    fn new_node(&mut self) -> usize {
        self.nodes.push([Link::Empty; 2]);
        self.nodes.len() - 1
    }

    /// Decode one symbol from the low `available` bits of `bits` (LSB first).
    ///
    /// Bits above `available` must be zero.
    #[inline]
    pub fn decode(&self, bits: u64, available: u32) -> Decoded {
        match self.fast[(bits as usize) & (FAST_LOOKUP_SIZE - 1)] {
            FastEntry::Symbol { symbol, len } => {
                if len as u32 <= available {
                    Decoded::Symbol(symbol, len as u32)
                } else {
                    Decoded::NeedMoreBits
                }
            }
            FastEntry::Empty => {
                if available >= FAST_LOOKUP_BITS {
                    Decoded::Invalid
                } else {
                    Decoded::NeedMoreBits
                }
            }
            FastEntry::Node(start) => {
                let mut node = start as usize;
                let mut len = FAST_LOOKUP_BITS;
                loop {
                    if len >= available {
                        return Decoded::NeedMoreBits;
                    }
                    let bit = ((bits >> len) & 1) as usize;
                    len += 1;
                    match self.nodes[node][bit] {
                        Link::Symbol(symbol) => return Decoded::Symbol(symbol, len),
                        Link::Node(child) => node = child as usize,
                        Link::Empty => return Decoded::Invalid,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_symbols(table: &EncodeTable, symbols: &[usize]) -> (u64, u32) {
        let mut bits = 0u64;
        let mut n = 0u32;
        for &s in symbols {
            let (code, len) = table.code(s);
            bits |= (code as u64) << n;
            n += len;
        }
        (bits, n)
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(build_lengths(&[0, 0, 0], 15).unwrap(), vec![0, 0, 0]);
        assert_eq!(build_lengths(&[0, 7, 0], 15).unwrap(), vec![0, 1, 0]);
        assert_eq!(build_lengths(&[], 15).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_symbol_count_must_fit_the_length_limit() {
        // Two bits hold at most four codes.
        assert!(matches!(
            build_lengths(&[1, 1, 1, 1, 1], 2),
            Err(OxiZipError::InvalidParameter { .. })
        ));
        let four = build_lengths(&[1, 1, 1, 1], 2).unwrap();
        assert_eq!(four, vec![2, 2, 2, 2]);
        assert_eq!(kraft_sum(&four, 2), 1 << 2);

        assert!(build_lengths(&[3, 0, 2], 0).is_err());
        assert!(build_lengths(&[0, 0], 0).unwrap().iter().all(|&l| l == 0));
        assert_eq!(build_lengths(&[0, 9], 1).unwrap(), vec![0, 1]);
        assert!(build_lengths(&[1, 2, 3], 1).is_err());
    }

    #[test]
    fn test_two_symbols_get_one_bit_each() {
        assert_eq!(build_lengths(&[1, 1000], 15).unwrap(), vec![1, 1]);
    }

    #[test]
    fn test_frequent_symbols_get_shorter_codes() {
        let lengths = build_lengths(&[100, 50, 25, 12, 6, 3, 1, 1], 15).unwrap();
        for pair in lengths.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert_eq!(kraft_sum(&lengths, 15), 1 << 15);
    }

    #[test]
    fn test_length_limit_fibonacci() {
        // Fibonacci weights produce a maximally skewed tree.
        let mut freqs = vec![1u32, 1];
        while freqs.len() < 30 {
            let n = freqs.len();
            freqs.push(freqs[n - 1] + freqs[n - 2]);
        }
        let unlimited = build_lengths(&freqs, 32).unwrap();
        assert!(unlimited.iter().copied().max().unwrap_or(0) > 15);

        let lengths = build_lengths(&freqs, 15).unwrap();
        assert!(lengths.iter().all(|&l| l <= 15 && l > 0));
        assert_eq!(kraft_sum(&lengths, 15), 1 << 15);

        let codelen = build_lengths(&freqs[..19], 7).unwrap();
        assert!(codelen.iter().all(|&l| l <= 7));
        assert_eq!(kraft_sum(&codelen, 7), 1 << 7);
    }

    #[test]
    fn test_canonical_codes_rfc_example() {
        // RFC 1951 3.2.2: lengths (3,3,3,3,3,2,4,4) give codes
        // 010,011,100,101,110,00,1110,1111.
        let table = EncodeTable::from_lengths(&[3, 3, 3, 3, 3, 2, 4, 4]);
        let expected = [0b010, 0b011, 0b100, 0b101, 0b110, 0b00, 0b1110, 0b1111];
        for (sym, &code) in expected.iter().enumerate() {
            let (rev, len) = table.code(sym);
            assert_eq!(reverse_bits(rev, len), code, "symbol {sym}");
        }
    }

    #[test]
    fn test_decode_table_simple() {
        // Lengths [1, 2, 2]: A=0, B=10, C=11. LSB-first 0x1A decodes A, B, C, A.
        let table = DecodeTable::from_lengths(&[1, 2, 2]).expect("valid table");
        let mut bits = 0x1Au64;
        let mut available = 8u32;
        let mut out = Vec::new();
        for _ in 0..4 {
            match table.decode(bits, available) {
                Decoded::Symbol(sym, len) => {
                    out.push(sym);
                    bits >>= len;
                    available -= len;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(out, vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_decode_long_codes_through_arena() {
        let mut freqs: Vec<u32> = (0..40).map(|i| 1u32 << (i / 3).min(20)).collect();
        freqs.reverse();
        let lengths = build_lengths(&freqs, 15).unwrap();
        assert!(lengths.iter().any(|&l| l as u32 > FAST_LOOKUP_BITS));

        let enc = EncodeTable::from_lengths(&lengths);
        let dec = DecodeTable::from_lengths(&lengths).expect("complete code");
        for sym in 0..lengths.len() {
            let (bits, n) = encode_symbols(&enc, &[sym]);
            assert_eq!(dec.decode(bits, n), Decoded::Symbol(sym as u16, n));
            if n > 1 {
                assert_eq!(dec.decode(bits & ((1 << (n - 1)) - 1), n - 1), Decoded::NeedMoreBits);
            }
        }
    }

    #[test]
    fn test_decode_table_rejects_bad_kraft() {
        // Over-subscribed.
        assert!(matches!(
            DecodeTable::from_lengths(&[1, 1, 1]),
            Err(OxiZipError::CorruptTable { .. })
        ));
        // Incomplete with more than one symbol.
        assert!(DecodeTable::from_lengths(&[1, 2, 0]).is_err());
        // Over-long code.
        assert!(DecodeTable::from_lengths(&[16, 1]).is_err());
    }

    #[test]
    fn test_decode_table_allows_single_and_empty() {
        let single = DecodeTable::from_lengths(&[0, 1]).expect("single symbol");
        assert_eq!(single.decode(0, 8), Decoded::Symbol(1, 1));
        assert_eq!(single.decode(1, 10), Decoded::Invalid);

        let empty = DecodeTable::from_lengths(&[0; 30]).expect("empty table");
        assert_eq!(empty.decode(0, 16), Decoded::Invalid);
    }
}
