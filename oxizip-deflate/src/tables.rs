//! Static tables for DEFLATE (RFC 1951).
//!
//! Fixed Huffman code lengths, length/distance base values with their extra
//! bit counts, and the transmission order of the code-length alphabet.

/// Smallest match length DEFLATE can express.
pub const MIN_MATCH: usize = 3;

/// Largest match length DEFLATE can express.
pub const MAX_MATCH: usize = 258;

/// Size of the sliding window.
pub const WINDOW_SIZE: usize = 32768;

/// Fixed literal/length code lengths (RFC 1951 Section 3.2.6).
///
/// - Symbols 0-143: 8 bits
/// - Symbols 144-255: 9 bits
/// - Symbols 256-279: 7 bits
/// - Symbols 280-287: 8 bits
pub const FIXED_LITLEN_LENGTHS: [u8; 288] = {
    let mut lengths = [8u8; 288];
    let mut i = 144;
    while i < 256 {
        lengths[i] = 9;
        i += 1;
    }
    while i < 280 {
        lengths[i] = 7;
        i += 1;
    }
    lengths
};

/// Fixed distance code lengths: all 32 codes use 5 bits.
pub const FIXED_DISTANCE_LENGTHS: [u8; 32] = [5u8; 32];

/// Length code base values for codes 257-285.
pub const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, // 257-264: 0 extra bits
    11, 13, 15, 17, // 265-268: 1 extra bit
    19, 23, 27, 31, // 269-272: 2 extra bits
    35, 43, 51, 59, // 273-276: 3 extra bits
    67, 83, 99, 115, // 277-280: 4 extra bits
    131, 163, 195, 227, // 281-284: 5 extra bits
    258, // 285: 0 extra bits
];

/// Number of extra bits for length codes 257-285.
pub const LENGTH_EXTRA_BITS: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

/// Distance code base values for codes 0-29.
pub const DISTANCE_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

/// Number of extra bits for distance codes 0-29.
pub const DISTANCE_EXTRA_BITS: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Order in which code-length code lengths are transmitted (RFC 1951 Section 3.2.7).
pub const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Length symbol (minus 257) for every `length - 3` in 0..=255.
const LENGTH_SYMBOL: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut code = 0;
    while code < 29 {
        let base = LENGTH_BASE[code] as usize - MIN_MATCH;
        let span = 1usize << LENGTH_EXTRA_BITS[code];
        let mut k = 0;
        while k < span && base + k < 256 {
            table[base + k] = code as u8;
            k += 1;
        }
        code += 1;
    }
    table
};

/// Map a match length (3-258) to `(symbol, extra_bits, extra_value)`.
#[inline]
pub fn length_to_code(length: usize) -> (u16, u8, u16) {
    debug_assert!((MIN_MATCH..=MAX_MATCH).contains(&length), "length {length}");
    let index = LENGTH_SYMBOL[length - MIN_MATCH] as usize;
    let extra = (length - LENGTH_BASE[index] as usize) as u16;
    (257 + index as u16, LENGTH_EXTRA_BITS[index], extra)
}

/// Map a distance (1-32768) to `(symbol, extra_bits, extra_value)`.
#[inline]
pub fn distance_to_code(distance: usize) -> (u16, u8, u16) {
    debug_assert!((1..=WINDOW_SIZE).contains(&distance), "distance {distance}");
    // Codes pair up per extra-bit count: code = 2 * log2(d - 1) + next bit.
    let code = if distance <= 4 {
        distance - 1
    } else {
        let d = distance - 1;
        let log2 = (usize::BITS - 1 - d.leading_zeros()) as usize;
        2 * log2 + ((d >> (log2 - 1)) & 1)
    };
    let extra = (distance - DISTANCE_BASE[code] as usize) as u16;
    (code as u16, DISTANCE_EXTRA_BITS[code], extra)
}
