//! DEFLATE decompression (inflate).
//!
//! [`Inflater`] is a resumable state machine. Every call takes whatever input
//! is available and writes into a caller-owned output buffer, returning a
//! status that says whether it wants more input, more output room, or is
//! done. Because all decoder state lives in the struct, the output is the
//! same however the compressed stream is split across calls.
//!
//! The output buffer is either:
//!
//! - **non-wrapping**: it holds the whole decompressed stream from its start,
//!   and back-references may reach anything before the write position, or
//! - **wrapping**: a power-of-two ring (normally 32 KiB) that back-references
//!   index modulo its size; the caller drains it and restarts at offset 0
//!   when it fills.

use crate::huffman::{DecodeTable, Decoded, END_OF_BLOCK};
use crate::tables::{
    CODE_LENGTH_ORDER, DISTANCE_BASE, DISTANCE_EXTRA_BITS, FIXED_DISTANCE_LENGTHS,
    FIXED_LITLEN_LENGTHS, LENGTH_BASE, LENGTH_EXTRA_BITS, WINDOW_SIZE,
};
use oxizip_core::checksum::{ADLER32_INIT, adler32};
use oxizip_core::error::{OxiZipError, Result};
use oxizip_core::traits::{Decompressor, InflateStatus};
use std::ops::BitOr;
use std::sync::OnceLock;

/// Decoder options, combined with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct InflateFlags(u32);

impl InflateFlags {
    /// No options: raw DEFLATE, wrapping output, all input present.
    pub const NONE: Self = Self(0);
    /// Expect a zlib header and verify the Adler-32 trailer.
    pub const PARSE_ZLIB_HEADER: Self = Self(1);
    /// More input may follow; running dry yields `NeedsMoreInput`.
    pub const HAS_MORE_INPUT: Self = Self(2);
    /// The output buffer holds the entire stream.
    pub const NON_WRAPPING_OUTPUT: Self = Self(4);
    /// Track the Adler-32 of the output even without zlib framing.
    pub const COMPUTE_ADLER32: Self = Self(8);

    /// Raw flag bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Build from raw bits; unknown bits are dropped.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits & 0xF)
    }

    /// Whether every flag in `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for InflateFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Counts and status from one [`Inflater::decompress`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InflateResult {
    /// Input bytes consumed.
    pub consumed: usize,
    /// Output bytes written, starting at the `out_pos` passed in.
    pub written: usize,
    /// What the decoder needs next.
    pub status: InflateStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    ZlibHeader,
    BlockHeader,
    StoredHeader,
    StoredCopy,
    DynamicCounts,
    CodeLengthLengths,
    CodeLengths,
    Literals,
    DistSym,
    CopyMatch,
    Trailer,
    Done,
    Failed,
}

/// Bits pulled from the input but not yet used, LSB first.
///
/// Bytes are pulled one at a time and only when a step needs them, so at
/// the end of the stream fewer than eight padding bits are ever held.
#[derive(Debug, Clone, Copy, Default)]
struct BitState {
    buf: u64,
    count: u32,
}

struct Input<'a> {
    data: &'a [u8],
    pos: usize,
}

impl BitState {
    /// Ensure at least `n` bits are buffered. False if input ran out.
    fn fill(&mut self, input: &mut Input<'_>, n: u32) -> bool {
        while self.count < n {
            let Some(&byte) = input.data.get(input.pos) else {
                return false;
            };
            self.buf |= (byte as u64) << self.count;
            self.count += 8;
            input.pos += 1;
        }
        true
    }

    fn consume(&mut self, n: u32) {
        self.buf >>= n;
        self.count -= n;
    }

    fn take(&mut self, n: u32) -> u32 {
        let value = (self.buf & ((1u64 << n) - 1)) as u32;
        self.consume(n);
        value
    }

    fn align(&mut self) {
        self.consume(self.count % 8);
    }
}

struct Output<'a> {
    buf: &'a mut [u8],
    start: usize,
    pos: usize,
    /// Index mask for back-references (`usize::MAX` when non-wrapping).
    mask: usize,
    /// Start of the region not yet folded into the running Adler-32.
    adler_from: usize,
}

impl Output<'_> {
    fn is_full(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn space(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn push(&mut self, byte: u8) {
        self.buf[self.pos] = byte;
        self.pos += 1;
    }

    fn copy_back(&mut self, dist: usize) {
        self.buf[self.pos] = self.buf[self.pos.wrapping_sub(dist) & self.mask];
        self.pos += 1;
    }
}

/// Code tables for fixed-Huffman blocks, built once per process.
fn fixed_tables() -> Option<&'static (DecodeTable, DecodeTable)> {
    static FIXED: OnceLock<Option<(DecodeTable, DecodeTable)>> = OnceLock::new();
    FIXED
        .get_or_init(|| {
            let lit = DecodeTable::from_lengths(&FIXED_LITLEN_LENGTHS).ok()?;
            let dist = DecodeTable::from_lengths(&FIXED_DISTANCE_LENGTHS).ok()?;
            Some((lit, dist))
        })
        .as_ref()
}

fn block_tables(
    fixed: bool,
    dynamic: &Option<(DecodeTable, DecodeTable)>,
) -> Result<&(DecodeTable, DecodeTable)> {
    let tables = if fixed { fixed_tables() } else { dynamic.as_ref() };
    tables.ok_or_else(|| OxiZipError::corrupt_table("no code tables for block"))
}

/// Decode the next symbol without consuming its bits.
///
/// `Ok(None)` means the input ran out before a whole code was buffered.
fn peek_symbol(
    bits: &mut BitState,
    input: &mut Input<'_>,
    table: &DecodeTable,
    offset: u64,
) -> Result<Option<(u16, u32)>> {
    loop {
        match table.decode(bits.buf, bits.count) {
            Decoded::Symbol(symbol, len) => return Ok(Some((symbol, len))),
            Decoded::NeedMoreBits => {
                let want = bits.count + 8;
                if !bits.fill(input, want) {
                    return Ok(None);
                }
            }
            Decoded::Invalid => {
                return Err(OxiZipError::corrupted(
                    offset + input.pos as u64,
                    "invalid Huffman code",
                ));
            }
        }
    }
}

/// Streaming DEFLATE decompressor.
#[derive(Debug, Clone)]
pub struct Inflater {
    state: State,
    bits: BitState,
    zlib: bool,
    track_adler: bool,
    final_block: bool,
    fixed_block: bool,
    dynamic: Option<(DecodeTable, DecodeTable)>,
    code_len_table: Option<DecodeTable>,
    num_lit: usize,
    num_dist: usize,
    num_code_len: usize,
    code_len_lengths: [u8; 19],
    lengths: [u8; 286 + 30],
    index: usize,
    remaining: usize,
    match_len: usize,
    match_dist: usize,
    adler: u32,
    total_in: u64,
    total_out: u64,
}

impl Inflater {
    /// Create a decompressor at the start of a stream.
    pub fn new() -> Self {
        Self {
            state: State::Start,
            bits: BitState::default(),
            zlib: false,
            track_adler: false,
            final_block: false,
            fixed_block: false,
            dynamic: None,
            code_len_table: None,
            num_lit: 0,
            num_dist: 0,
            num_code_len: 0,
            code_len_lengths: [0; 19],
            lengths: [0; 286 + 30],
            index: 0,
            remaining: 0,
            match_len: 0,
            match_dist: 0,
            adler: ADLER32_INIT,
            total_in: 0,
            total_out: 0,
        }
    }

    /// Reset for a new stream.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Whether the end of the stream (and trailer) has been reached.
    pub fn is_finished(&self) -> bool {
        self.state == State::Done
    }

    /// Adler-32 of the output produced so far (when tracked).
    pub fn adler32(&self) -> u32 {
        self.adler
    }

    /// Total input bytes consumed.
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Total output bytes produced.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Decompress `input` into `output`, starting at `out_pos`.
    ///
    /// With [`InflateFlags::NON_WRAPPING_OUTPUT`], `output[..out_pos]` is the
    /// stream decoded so far. Otherwise `output` is a ring whose length must
    /// be a power of two; when it fills the call returns
    /// [`InflateStatus::HasMoreOutput`] and the caller continues at offset 0.
    ///
    /// Running out of input is an error unless
    /// [`InflateFlags::HAS_MORE_INPUT`] is set.
    pub fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        out_pos: usize,
        flags: InflateFlags,
    ) -> Result<InflateResult> {
        if out_pos > output.len() {
            return Err(OxiZipError::invalid_parameter(format!(
                "output position {out_pos} beyond buffer of {}",
                output.len()
            )));
        }
        let non_wrapping = flags.contains(InflateFlags::NON_WRAPPING_OUTPUT);
        if !non_wrapping && !output.len().is_power_of_two() {
            return Err(OxiZipError::invalid_parameter(format!(
                "wrapping output buffer length {} is not a power of two",
                output.len()
            )));
        }
        if self.state == State::Failed {
            return Err(OxiZipError::corrupted(
                self.total_in,
                "decompressor failed on an earlier call",
            ));
        }
        if self.state == State::Start {
            self.zlib = flags.contains(InflateFlags::PARSE_ZLIB_HEADER);
            self.track_adler = self.zlib || flags.contains(InflateFlags::COMPUTE_ADLER32);
            self.state = if self.zlib {
                State::ZlibHeader
            } else {
                State::BlockHeader
            };
        }

        let mask = if non_wrapping {
            usize::MAX
        } else {
            output.len() - 1
        };
        let mut inp = Input {
            data: input,
            pos: 0,
        };
        let mut out = Output {
            buf: output,
            start: out_pos,
            pos: out_pos,
            mask,
            adler_from: out_pos,
        };

        let status = match self.step(&mut inp, &mut out, flags, non_wrapping) {
            Ok(status) => status,
            Err(err) => {
                log::debug!("inflate failed after {} input bytes: {err}", self.total_in + inp.pos as u64);
                self.state = State::Failed;
                return Err(err);
            }
        };

        self.fold_adler(&mut out);
        let written = out.pos - out.start;
        self.total_in += inp.pos as u64;
        self.total_out += written as u64;

        Ok(InflateResult {
            consumed: inp.pos,
            written,
            status,
        })
    }

    fn fold_adler(&mut self, out: &mut Output<'_>) {
        if self.track_adler {
            self.adler = adler32(self.adler, &out.buf[out.adler_from..out.pos]);
        }
        out.adler_from = out.pos;
    }

    fn starved(&self, flags: InflateFlags, inp: &Input<'_>) -> Result<InflateStatus> {
        if flags.contains(InflateFlags::HAS_MORE_INPUT) {
            Ok(InflateStatus::NeedsMoreInput)
        } else {
            Err(OxiZipError::corrupted(
                self.total_in + inp.pos as u64,
                "unexpected end of compressed stream",
            ))
        }
    }

    fn end_block(&mut self) {
        self.state = if !self.final_block {
            State::BlockHeader
        } else if self.zlib {
            State::Trailer
        } else {
            State::Done
        };
    }

    fn step(
        &mut self,
        inp: &mut Input<'_>,
        out: &mut Output<'_>,
        flags: InflateFlags,
        non_wrapping: bool,
    ) -> Result<InflateStatus> {
        loop {
            let offset = self.total_in;
            match self.state {
                State::Start | State::Failed => {
                    return Err(OxiZipError::invalid_parameter("decoder not started"));
                }
                State::ZlibHeader => {
                    if !self.bits.fill(inp, 16) {
                        return self.starved(flags, inp);
                    }
                    let cmf = self.bits.take(8);
                    let flg = self.bits.take(8);
                    self.check_zlib_header(cmf, flg, out.buf.len(), non_wrapping)?;
                    self.state = State::BlockHeader;
                }
                State::BlockHeader => {
                    if !self.bits.fill(inp, 3) {
                        return self.starved(flags, inp);
                    }
                    self.final_block = self.bits.take(1) == 1;
                    match self.bits.take(2) {
                        0 => self.state = State::StoredHeader,
                        1 => {
                            self.fixed_block = true;
                            self.state = State::Literals;
                        }
                        2 => self.state = State::DynamicCounts,
                        _ => {
                            return Err(OxiZipError::corrupted(
                                offset + inp.pos as u64,
                                "invalid block type 3",
                            ));
                        }
                    }
                }
                State::StoredHeader => {
                    self.bits.align();
                    if !self.bits.fill(inp, 32) {
                        return self.starved(flags, inp);
                    }
                    let len = self.bits.take(16);
                    let nlen = self.bits.take(16);
                    if len != !nlen & 0xFFFF {
                        return Err(OxiZipError::corrupted(
                            offset + inp.pos as u64,
                            "stored block length does not match its complement",
                        ));
                    }
                    self.remaining = len as usize;
                    self.state = State::StoredCopy;
                }
                State::StoredCopy => {
                    while self.remaining > 0 {
                        if out.is_full() {
                            return Ok(InflateStatus::HasMoreOutput);
                        }
                        if self.bits.count >= 8 {
                            out.push(self.bits.take(8) as u8);
                            self.remaining -= 1;
                            continue;
                        }
                        let available = inp.data.len() - inp.pos;
                        if available == 0 {
                            return self.starved(flags, inp);
                        }
                        let n = self.remaining.min(available).min(out.space());
                        out.buf[out.pos..out.pos + n]
                            .copy_from_slice(&inp.data[inp.pos..inp.pos + n]);
                        out.pos += n;
                        inp.pos += n;
                        self.remaining -= n;
                    }
                    self.end_block();
                }
                State::DynamicCounts => {
                    if !self.bits.fill(inp, 14) {
                        return self.starved(flags, inp);
                    }
                    self.num_lit = self.bits.take(5) as usize + 257;
                    self.num_dist = self.bits.take(5) as usize + 1;
                    self.num_code_len = self.bits.take(4) as usize + 4;
                    if self.num_lit > 286 || self.num_dist > 30 {
                        return Err(OxiZipError::corrupted(
                            offset + inp.pos as u64,
                            format!(
                                "too many length or distance symbols ({}, {})",
                                self.num_lit, self.num_dist
                            ),
                        ));
                    }
                    self.code_len_lengths = [0; 19];
                    self.index = 0;
                    self.state = State::CodeLengthLengths;
                }
                State::CodeLengthLengths => {
                    while self.index < self.num_code_len {
                        if !self.bits.fill(inp, 3) {
                            return self.starved(flags, inp);
                        }
                        self.code_len_lengths[CODE_LENGTH_ORDER[self.index]] =
                            self.bits.take(3) as u8;
                        self.index += 1;
                    }
                    self.code_len_table = Some(DecodeTable::from_lengths(&self.code_len_lengths)?);
                    self.index = 0;
                    self.state = State::CodeLengths;
                }
                State::CodeLengths => {
                    let total = self.num_lit + self.num_dist;
                    while self.index < total {
                        let table = self
                            .code_len_table
                            .as_ref()
                            .ok_or_else(|| OxiZipError::corrupt_table("missing code length table"))?;
                        let Some((sym, len)) = peek_symbol(&mut self.bits, inp, table, offset)?
                        else {
                            return self.starved(flags, inp);
                        };
                        if sym < 16 {
                            self.bits.consume(len);
                            self.lengths[self.index] = sym as u8;
                            self.index += 1;
                            continue;
                        }

                        let (extra, base) = match sym {
                            16 => (2, 3),
                            17 => (3, 3),
                            _ => (7, 11),
                        };
                        if sym == 16 && self.index == 0 {
                            return Err(OxiZipError::corrupted(
                                offset + inp.pos as u64,
                                "repeat code with no previous length",
                            ));
                        }
                        if !self.bits.fill(inp, len + extra) {
                            return self.starved(flags, inp);
                        }
                        self.bits.consume(len);
                        let count = base + self.bits.take(extra) as usize;
                        if self.index + count > total {
                            return Err(OxiZipError::corrupted(
                                offset + inp.pos as u64,
                                "code length repeat overflows the table",
                            ));
                        }
                        let value = if sym == 16 {
                            self.lengths[self.index - 1]
                        } else {
                            0
                        };
                        self.lengths[self.index..self.index + count].fill(value);
                        self.index += count;
                    }

                    if self.lengths[END_OF_BLOCK as usize] == 0 {
                        return Err(OxiZipError::corrupted(
                            offset + inp.pos as u64,
                            "missing end-of-block code",
                        ));
                    }
                    let lit = DecodeTable::from_lengths(&self.lengths[..self.num_lit])?;
                    let dist = DecodeTable::from_lengths(&self.lengths[self.num_lit..total])?;
                    self.dynamic = Some((lit, dist));
                    self.fixed_block = false;
                    self.state = State::Literals;
                }
                State::Literals => {
                    let (lit, _) = block_tables(self.fixed_block, &self.dynamic)?;
                    let Some((sym, len)) = peek_symbol(&mut self.bits, inp, lit, offset)? else {
                        return self.starved(flags, inp);
                    };
                    match sym {
                        0..=255 => {
                            if out.is_full() {
                                return Ok(InflateStatus::HasMoreOutput);
                            }
                            self.bits.consume(len);
                            out.push(sym as u8);
                        }
                        END_OF_BLOCK => {
                            self.bits.consume(len);
                            self.end_block();
                        }
                        257..=285 => {
                            let index = (sym - 257) as usize;
                            let extra = LENGTH_EXTRA_BITS[index] as u32;
                            if !self.bits.fill(inp, len + extra) {
                                return self.starved(flags, inp);
                            }
                            self.bits.consume(len);
                            self.match_len = LENGTH_BASE[index] as usize + self.bits.take(extra) as usize;
                            self.state = State::DistSym;
                        }
                        _ => {
                            return Err(OxiZipError::corrupted(
                                offset + inp.pos as u64,
                                format!("invalid literal/length symbol {sym}"),
                            ));
                        }
                    }
                }
                State::DistSym => {
                    let (_, dist) = block_tables(self.fixed_block, &self.dynamic)?;
                    let Some((sym, len)) = peek_symbol(&mut self.bits, inp, dist, offset)? else {
                        return self.starved(flags, inp);
                    };
                    let index = sym as usize;
                    if index >= DISTANCE_BASE.len() {
                        return Err(OxiZipError::corrupted(
                            offset + inp.pos as u64,
                            format!("invalid distance symbol {sym}"),
                        ));
                    }
                    let extra = DISTANCE_EXTRA_BITS[index] as u32;
                    if !self.bits.fill(inp, len + extra) {
                        return self.starved(flags, inp);
                    }
                    self.bits.consume(len);
                    let distance = DISTANCE_BASE[index] as usize + self.bits.take(extra) as usize;

                    let produced = self.total_out + (out.pos - out.start) as u64;
                    let history = if non_wrapping {
                        out.pos as u64
                    } else {
                        produced.min(out.buf.len() as u64)
                    };
                    if distance as u64 > history {
                        return Err(OxiZipError::corrupted(
                            offset + inp.pos as u64,
                            format!("distance {distance} beyond the {history} bytes produced"),
                        ));
                    }
                    self.match_dist = distance;
                    self.state = State::CopyMatch;
                }
                State::CopyMatch => {
                    while self.match_len > 0 {
                        if out.is_full() {
                            return Ok(InflateStatus::HasMoreOutput);
                        }
                        out.copy_back(self.match_dist);
                        self.match_len -= 1;
                    }
                    self.state = State::Literals;
                }
                State::Trailer => {
                    self.bits.align();
                    if !self.bits.fill(inp, 32) {
                        return self.starved(flags, inp);
                    }
                    let expected = (0..4).fold(0u32, |acc, _| (acc << 8) | self.bits.take(8));
                    self.fold_adler(out);
                    if expected != self.adler {
                        return Err(OxiZipError::adler_mismatch(expected, self.adler));
                    }
                    self.state = State::Done;
                }
                State::Done => return Ok(InflateStatus::Done),
            }
        }
    }

    fn check_zlib_header(&self, cmf: u32, flg: u32, out_len: usize, non_wrapping: bool) -> Result<()> {
        if (cmf * 256 + flg) % 31 != 0 {
            return Err(OxiZipError::corrupted(0, "zlib header check bits are wrong"));
        }
        if cmf & 0x0F != 8 {
            return Err(OxiZipError::corrupted(
                0,
                format!("unknown zlib compression method {}", cmf & 0x0F),
            ));
        }
        if flg & 0x20 != 0 {
            return Err(OxiZipError::unsupported("zlib preset dictionary"));
        }
        let window = 1usize << (8 + (cmf >> 4));
        if window > WINDOW_SIZE || (!non_wrapping && window > out_len) {
            return Err(OxiZipError::corrupted(
                0,
                format!("zlib window of {window} bytes is too large"),
            ));
        }
        Ok(())
    }
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

/// Decompress a complete raw DEFLATE stream.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    inflate_with_flags(data, InflateFlags::NONE)
}

/// Decompress a complete stream held in memory into a growing vector.
pub fn inflate_with_flags(data: &[u8], flags: InflateFlags) -> Result<Vec<u8>> {
    let flags = flags | InflateFlags::NON_WRAPPING_OUTPUT;
    let mut inflater = Inflater::new();
    let mut output = vec![0u8; data.len().saturating_mul(4).clamp(1024, 1 << 24)];
    let mut in_pos = 0;
    let mut out_pos = 0;

    loop {
        let result = inflater.decompress(&data[in_pos..], &mut output, out_pos, flags)?;
        in_pos += result.consumed;
        out_pos += result.written;
        match result.status {
            InflateStatus::Done => break,
            InflateStatus::HasMoreOutput => {
                let grown = output.len() * 2;
                output.resize(grown, 0);
            }
            InflateStatus::NeedsMoreInput => {
                return Err(OxiZipError::corrupted(
                    in_pos as u64,
                    "unexpected end of compressed stream",
                ));
            }
        }
    }

    output.truncate(out_pos);
    Ok(output)
}

/// Decompress a complete raw DEFLATE stream into `output`.
///
/// Returns the number of bytes written, or `BufferTooSmall` if the stream
/// does not fit.
pub fn inflate_to_buffer(data: &[u8], output: &mut [u8]) -> Result<usize> {
    let mut inflater = Inflater::new();
    let result = inflater.decompress(data, output, 0, InflateFlags::NON_WRAPPING_OUTPUT)?;
    match result.status {
        InflateStatus::Done => Ok(result.written),
        _ => Err(OxiZipError::buffer_too_small(output.len() + 1, output.len())),
    }
}

/// Decompressor that owns a 32 KiB ring and drains it into any output slice.
///
/// This is the adapter used when the caller cannot provide the whole output
/// buffer up front, such as when extracting an archive entry to a writer.
#[derive(Debug, Clone)]
pub struct StreamInflater {
    inflater: Inflater,
    window: Box<[u8]>,
    window_pos: usize,
    pending_start: usize,
    pending_len: usize,
    flags: InflateFlags,
}

impl StreamInflater {
    /// Streaming decompressor for raw DEFLATE.
    pub fn new() -> Self {
        Self::with_flags(InflateFlags::NONE)
    }

    /// Streaming decompressor for zlib-framed data.
    pub fn zlib() -> Self {
        Self::with_flags(InflateFlags::PARSE_ZLIB_HEADER)
    }

    fn with_flags(flags: InflateFlags) -> Self {
        Self {
            inflater: Inflater::new(),
            window: vec![0u8; WINDOW_SIZE].into_boxed_slice(),
            window_pos: 0,
            pending_start: 0,
            pending_len: 0,
            flags: flags | InflateFlags::HAS_MORE_INPUT,
        }
    }

    /// Total input bytes consumed.
    pub fn total_in(&self) -> u64 {
        self.inflater.total_in()
    }

    /// Total output bytes produced.
    pub fn total_out(&self) -> u64 {
        self.inflater.total_out()
    }

    fn drain(&mut self, output: &mut [u8], written: &mut usize) {
        let n = self.pending_len.min(output.len() - *written);
        output[*written..*written + n]
            .copy_from_slice(&self.window[self.pending_start..self.pending_start + n]);
        *written += n;
        self.pending_start += n;
        self.pending_len -= n;
    }
}

impl Default for StreamInflater {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor for StreamInflater {
    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(usize, usize, InflateStatus)> {
        let mut consumed = 0;
        let mut written = 0;
        let mut starved = false;

        loop {
            self.drain(output, &mut written);
            if self.pending_len > 0 {
                return Ok((consumed, written, InflateStatus::HasMoreOutput));
            }
            if self.inflater.is_finished() {
                return Ok((consumed, written, InflateStatus::Done));
            }
            if starved {
                return Ok((consumed, written, InflateStatus::NeedsMoreInput));
            }

            if self.window_pos == self.window.len() {
                self.window_pos = 0;
            }
            let result = self.inflater.decompress(
                &input[consumed..],
                &mut self.window,
                self.window_pos,
                self.flags,
            )?;
            consumed += result.consumed;
            self.pending_start = self.window_pos;
            self.pending_len = result.written;
            self.window_pos += result.written;
            starved = result.status == InflateStatus::NeedsMoreInput;
        }
    }

    fn reset(&mut self) {
        self.inflater.reset();
        self.window_pos = 0;
        self.pending_start = 0;
        self.pending_len = 0;
    }

    fn is_finished(&self) -> bool {
        self.inflater.is_finished() && self.pending_len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deflate::{DeflateParams, deflate, deflate_with_params};

    #[test]
    fn test_inflate_stored() {
        // Final stored block: BFINAL=1, BTYPE=00, LEN=5, NLEN=!5, "Hello".
        let data = [0x01, 0x05, 0x00, 0xFA, 0xFF, b'H', b'e', b'l', b'l', b'o'];
        assert_eq!(inflate(&data).unwrap(), b"Hello");
    }

    #[test]
    fn test_inflate_fixed_empty() {
        assert_eq!(inflate(&[0x03, 0x00]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_inflate_known_fixed_stream() {
        // zlib's raw deflate of "abc" at level 6.
        let data = [0x4B, 0x4C, 0x4A, 0x06, 0x00];
        assert_eq!(inflate(&data).unwrap(), b"abc");
    }

    #[test]
    fn test_block_type_three_fails() {
        let err = inflate(&[0x07, 0x00]).unwrap_err();
        assert!(err.to_string().contains("block type 3"));
    }

    #[test]
    fn test_stored_length_mismatch_fails() {
        let data = [0x01, 0x05, 0x00, 0x00, 0x00, b'H'];
        assert!(inflate(&data).is_err());
    }

    #[test]
    fn test_distance_beyond_output_fails() {
        // Fixed block: literal 'a', then length 3 at distance 2.
        let mut bits = oxizip_core::bitbuf::BitBuffer::new();
        let lit = crate::huffman::EncodeTable::from_lengths(&FIXED_LITLEN_LENGTHS);
        let dist = crate::huffman::EncodeTable::from_lengths(&FIXED_DISTANCE_LENGTHS);
        bits.put_bits(1, 1);
        bits.put_bits(1, 2);
        let (c, l) = lit.code(b'a' as usize);
        bits.put_bits(c, l);
        let (c, l) = lit.code(257);
        bits.put_bits(c, l);
        let (c, l) = dist.code(1);
        bits.put_bits(c, l);
        let (c, l) = lit.code(256);
        bits.put_bits(c, l);
        bits.align_to_byte();

        let err = inflate(bits.as_bytes()).unwrap_err();
        assert!(err.is_data_error());
        assert!(err.to_string().contains("distance 2"));
    }

    #[test]
    fn test_truncated_stream() {
        let compressed = deflate(b"some data that compresses, some data that compresses", 6).unwrap();
        let truncated = &compressed[..compressed.len() - 1];
        assert!(inflate(truncated).is_err());

        let mut inflater = Inflater::new();
        let mut out = vec![0u8; 256];
        let result = inflater
            .decompress(truncated, &mut out, 0, InflateFlags::NON_WRAPPING_OUTPUT | InflateFlags::HAS_MORE_INPUT)
            .unwrap();
        assert_eq!(result.status, InflateStatus::NeedsMoreInput);
        assert_eq!(result.consumed, truncated.len());
    }

    #[test]
    fn test_wrapping_buffer_must_be_power_of_two() {
        let mut inflater = Inflater::new();
        let mut out = vec![0u8; 1000];
        let err = inflater
            .decompress(&[0x03, 0x00], &mut out, 0, InflateFlags::NONE)
            .unwrap_err();
        assert!(matches!(err, OxiZipError::InvalidParameter { .. }));
    }

    #[test]
    fn test_one_byte_at_a_time() {
        let data: Vec<u8> = (0..20_000u32).map(|i| (i * 7 % 251) as u8).collect();
        let compressed = deflate(&data, 9).unwrap();

        let mut inflater = Inflater::new();
        let mut out = vec![0u8; data.len()];
        let mut out_pos = 0;
        let flags = InflateFlags::NON_WRAPPING_OUTPUT | InflateFlags::HAS_MORE_INPUT;
        for (i, byte) in compressed.iter().enumerate() {
            let result = inflater
                .decompress(std::slice::from_ref(byte), &mut out, out_pos, flags)
                .unwrap();
            assert_eq!(result.consumed, 1, "byte {i}");
            out_pos += result.written;
        }
        assert!(inflater.is_finished());
        assert_eq!(out, data);
    }

    #[test]
    fn test_small_ring_output() {
        let data: Vec<u8> = b"ring buffers wrap around; ring buffers wrap around. "
            .iter()
            .copied()
            .cycle()
            .take(10_000)
            .collect();
        let compressed = deflate(&data, 6).unwrap();

        // Distances stay below 64, so a 64-byte ring is enough history.
        let mut inflater = Inflater::new();
        let mut ring = [0u8; 64];
        let mut pos = 0;
        let mut in_pos = 0;
        let mut result_data = Vec::new();
        loop {
            let result = inflater
                .decompress(&compressed[in_pos..], &mut ring, pos, InflateFlags::NONE)
                .unwrap();
            in_pos += result.consumed;
            result_data.extend_from_slice(&ring[pos..pos + result.written]);
            pos += result.written;
            if pos == ring.len() {
                pos = 0;
            }
            if result.status == InflateStatus::Done {
                break;
            }
        }
        assert_eq!(result_data, data);
    }

    #[test]
    fn test_zlib_flags_and_adler() {
        let data = b"adler checked payload, adler checked payload".to_vec();
        let compressed = deflate_with_params(&data, DeflateParams::zlib(6)).unwrap();
        let out = inflate_with_flags(&compressed, InflateFlags::PARSE_ZLIB_HEADER).unwrap();
        assert_eq!(out, data);

        let mut corrupt = compressed.clone();
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0x01;
        assert!(matches!(
            inflate_with_flags(&corrupt, InflateFlags::PARSE_ZLIB_HEADER),
            Err(OxiZipError::AdlerMismatch { .. })
        ));
    }

    #[test]
    fn test_inflate_to_buffer_too_small() {
        let compressed = deflate(&[7u8; 500], 6).unwrap();
        let mut small = [0u8; 100];
        assert!(matches!(
            inflate_to_buffer(&compressed, &mut small),
            Err(OxiZipError::BufferTooSmall { .. })
        ));
        let mut exact = [0u8; 500];
        assert_eq!(inflate_to_buffer(&compressed, &mut exact).unwrap(), 500);
    }

    #[test]
    fn test_stream_inflater_tiny_output() {
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 97) as u8 ^ (i / 1000) as u8).collect();
        let compressed = deflate(&data, 6).unwrap();

        let mut stream = StreamInflater::new();
        let mut result = Vec::new();
        let mut buf = [0u8; 333];
        let mut in_pos = 0;
        loop {
            let end = (in_pos + 1000).min(compressed.len());
            let (consumed, written, status) =
                stream.decompress(&compressed[in_pos..end], &mut buf).unwrap();
            in_pos += consumed;
            result.extend_from_slice(&buf[..written]);
            if status == InflateStatus::Done {
                break;
            }
        }
        assert!(stream.is_finished());
        assert_eq!(result, data);
    }

    #[test]
    fn test_failed_state_is_sticky() {
        let mut inflater = Inflater::new();
        let mut out = vec![0u8; 16];
        assert!(inflater.decompress(&[0x07], &mut out, 0, InflateFlags::NON_WRAPPING_OUTPUT).is_err());
        assert!(inflater.decompress(&[0x03, 0x00], &mut out, 0, InflateFlags::NON_WRAPPING_OUTPUT).is_err());
    }
}
