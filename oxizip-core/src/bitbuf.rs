//! LSB-first bit accumulator for DEFLATE output.
//!
//! DEFLATE packs bits starting from the least significant bit of each byte.
//! [`BitBuffer`] keeps up to 63 pending bits in a `u64` and moves whole bytes
//! into an owned output vector as soon as they are complete.
//!
//! # Example
//!
//! ```
//! use oxizip_core::bitbuf::BitBuffer;
//!
//! let mut bits = BitBuffer::new();
//! bits.put_bits(0b101, 3);
//! bits.put_bits(0b1100, 4);
//! bits.align_to_byte();
//! assert_eq!(bits.as_bytes(), &[0b0110_0101]);
//! ```

/// Saved position inside a [`BitBuffer`], used to rewind a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitSnapshot {
    len: usize,
    bits: u64,
    count: u32,
}

/// Pending-bit accumulator that owns the bytes it has completed.
#[derive(Debug, Clone, Default)]
pub struct BitBuffer {
    out: Vec<u8>,
    bits: u64,
    count: u32,
}

impl BitBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            out: Vec::with_capacity(capacity),
            bits: 0,
            count: 0,
        }
    }

    /// Append the low `n` bits of `value` (n ≤ 32).
    #[inline]
    pub fn put_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32);
        debug_assert!(n == 32 || value >> n == 0);
        self.bits |= (value as u64) << self.count;
        self.count += n;
        while self.count >= 8 {
            self.out.push(self.bits as u8);
            self.bits >>= 8;
            self.count -= 8;
        }
    }

    /// Pad with zero bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        if self.count > 0 {
            self.put_bits(0, 8 - self.count);
        }
    }

    /// Append raw bytes. The buffer must be byte aligned.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        debug_assert_eq!(self.count, 0);
        self.out.extend_from_slice(bytes);
    }

    /// Number of bits waiting for a full byte.
    pub fn pending_bits(&self) -> u32 {
        self.count
    }

    /// Completed bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.out
    }

    /// Number of completed bytes.
    pub fn len(&self) -> usize {
        self.out.len()
    }

    /// Whether no byte has been completed yet.
    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    /// Remove and return the completed bytes, keeping pending bits.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out)
    }

    /// Drop completed bytes, keeping pending bits.
    pub fn clear_bytes(&mut self) {
        self.out.clear();
    }

    /// Remember the current position.
    pub fn snapshot(&self) -> BitSnapshot {
        BitSnapshot {
            len: self.out.len(),
            bits: self.bits,
            count: self.count,
        }
    }

    /// Rewind to a previously taken snapshot, discarding everything since.
    pub fn restore(&mut self, snapshot: BitSnapshot) {
        self.out.truncate(snapshot.len);
        self.bits = snapshot.bits;
        self.count = snapshot.count;
    }
}

/// Reverse the low `len` bits of `code`.
#[inline]
pub fn reverse_bits(code: u32, len: u32) -> u32 {
    if len == 0 {
        return 0;
    }
    code.reverse_bits() >> (32 - len)
}
