//! Streaming checksums used by the zlib wrapper and the ZIP container.
//!
//! - **CRC-32 (ISO 3309)**: every ZIP entry carries one over its uncompressed bytes
//! - **Adler-32 (RFC 1950)**: the zlib trailer
//!
//! Both come in two flavours: a free function that folds bytes into a
//! running value (`crc32(prev, bytes)`, `adler32(prev, bytes)`), and a small
//! stateful accumulator for callers that prefer an object.
//!
//! ## Performance
//!
//! CRC-32 uses the "slicing-by-8" technique for inputs of 16 bytes or more,
//! processing 8 bytes per step with 8 precomputed tables. Adler-32 defers the
//! modulo reduction to once every [`ADLER32_NMAX`] bytes, the largest run for
//! which the sums cannot overflow a `u32`.

/// Starting value for a running CRC-32 (`crc32(CRC32_INIT, b"") == CRC32_INIT`).
pub const CRC32_INIT: u32 = 0;

/// Starting value for a running Adler-32.
pub const ADLER32_INIT: u32 = 1;

/// Largest prime smaller than 65536.
const ADLER32_MOD: u32 = 65521;

/// Largest n such that 255n(n+1)/2 + (n+1)(MOD-1) fits in a `u32`.
pub const ADLER32_NMAX: usize = 5552;

/// CRC-32 slicing-by-8 lookup tables (polynomial 0xEDB88320, reflected).
/// Table 0 is the classic byte-at-a-time table.
const CRC32_TABLES: [[u32; 256]; 8] = {
    let mut tables = [[0u32; 256]; 8];

    let mut i = 0usize;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB88320;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        tables[0][i] = crc;
        i += 1;
    }

    let mut t = 1;
    while t < 8 {
        let mut i = 0usize;
        while i < 256 {
            let prev = tables[t - 1][i];
            tables[t][i] = tables[0][(prev & 0xFF) as usize] ^ (prev >> 8);
            i += 1;
        }
        t += 1;
    }

    tables
};

/// Fold `data` into a finished CRC-32 value.
///
/// Pass [`CRC32_INIT`] to start a new checksum; pass a previous result to
/// continue one. The pre- and post-inversion are handled internally.
///
/// # Example
///
/// ```
/// use oxizip_core::checksum::{crc32, CRC32_INIT};
///
/// let whole = crc32(CRC32_INIT, b"123456789");
/// let split = crc32(crc32(CRC32_INIT, b"1234"), b"56789");
/// assert_eq!(whole, 0xCBF43926);
/// assert_eq!(whole, split);
/// ```
#[inline]
pub fn crc32(crc: u32, data: &[u8]) -> u32 {
    let mut state = !crc;
    if data.len() >= 16 {
        crc32_slice8(&mut state, data);
    } else {
        crc32_bytewise(&mut state, data);
    }
    !state
}

#[inline]
fn crc32_bytewise(state: &mut u32, data: &[u8]) {
    for &byte in data {
        let index = ((*state ^ byte as u32) & 0xFF) as usize;
        *state = CRC32_TABLES[0][index] ^ (*state >> 8);
    }
}

fn crc32_slice8(state: &mut u32, data: &[u8]) {
    let mut chunks = data.chunks_exact(8);
    for chunk in &mut chunks {
        let lo = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ *state;
        let hi = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);

        *state = CRC32_TABLES[7][(lo & 0xFF) as usize]
            ^ CRC32_TABLES[6][((lo >> 8) & 0xFF) as usize]
            ^ CRC32_TABLES[5][((lo >> 16) & 0xFF) as usize]
            ^ CRC32_TABLES[4][(lo >> 24) as usize]
            ^ CRC32_TABLES[3][(hi & 0xFF) as usize]
            ^ CRC32_TABLES[2][((hi >> 8) & 0xFF) as usize]
            ^ CRC32_TABLES[1][((hi >> 16) & 0xFF) as usize]
            ^ CRC32_TABLES[0][(hi >> 24) as usize];
    }
    crc32_bytewise(state, chunks.remainder());
}

/// Fold `data` into a running Adler-32 value.
///
/// Pass [`ADLER32_INIT`] to start a new checksum.
///
/// ```
/// use oxizip_core::checksum::{adler32, ADLER32_INIT};
///
/// assert_eq!(adler32(ADLER32_INIT, b""), 1);
/// assert_eq!(adler32(ADLER32_INIT, b"Wikipedia"), 0x11E60398);
/// ```
pub fn adler32(adler: u32, data: &[u8]) -> u32 {
    let mut s1 = adler & 0xFFFF;
    let mut s2 = adler >> 16;

    for block in data.chunks(ADLER32_NMAX) {
        for &byte in block {
            s1 += byte as u32;
            s2 += s1;
        }
        s1 %= ADLER32_MOD;
        s2 %= ADLER32_MOD;
    }

    (s2 << 16) | s1
}

/// CRC-32 calculator (ISO 3309).
///
/// - Polynomial: 0x04C11DB7 (reflected: 0xEDB88320)
/// - Initial value: 0xFFFFFFFF
/// - Final XOR: 0xFFFFFFFF
///
/// # Example
///
/// ```
/// use oxizip_core::checksum::Crc32;
///
/// let mut crc = Crc32::new();
/// crc.update(b"Hello, World!");
/// assert_eq!(crc.value(), 0xEC4AC3D0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc32 {
    value: u32,
}

impl Crc32 {
    /// Create a new CRC-32 calculator.
    pub fn new() -> Self {
        Self { value: CRC32_INIT }
    }

    /// Resume from a previously finished value.
    pub fn with_value(value: u32) -> Self {
        Self { value }
    }

    /// Reset the CRC to its initial state.
    pub fn reset(&mut self) {
        self.value = CRC32_INIT;
    }

    /// Update the CRC with more data.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.value = crc32(self.value, data);
    }

    /// Current CRC value.
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Compute the CRC-32 of a byte slice in one shot.
    pub fn compute(data: &[u8]) -> u32 {
        crc32(CRC32_INIT, data)
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Adler-32 accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adler32 {
    value: u32,
}

impl Adler32 {
    /// Create a new Adler-32 accumulator.
    pub fn new() -> Self {
        Self {
            value: ADLER32_INIT,
        }
    }

    /// Reset to the initial value of 1.
    pub fn reset(&mut self) {
        self.value = ADLER32_INIT;
    }

    /// Update with more data.
    pub fn update(&mut self, data: &[u8]) {
        self.value = adler32(self.value, data);
    }

    /// Current Adler-32 value.
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Compute the Adler-32 of a byte slice in one shot.
    pub fn compute(data: &[u8]) -> u32 {
        adler32(ADLER32_INIT, data)
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}
