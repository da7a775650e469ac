//! DEFLATE compression (RFC 1951).
//!
//! [`Deflater`] is a resumable streaming compressor. Input is copied into a
//! 32 KiB dictionary, parsed into literals and matches, and emitted as
//! blocks of one of three kinds:
//!
//! - **Stored** when coding would not shrink the block (or at level 0)
//! - **Static** (fixed Huffman codes) for small blocks, or when forced
//! - **Dynamic** Huffman codes otherwise
//!
//! Output goes either into a caller buffer, in which case a call returns
//! early once the buffer is full and picks up where it left off next time,
//! or to a sink callback that receives every chunk as it is produced.

use crate::huffman::{
    EncodeTable, MAX_CODE_LENGTH, MAX_CODELEN_CODE_LENGTH, END_OF_BLOCK, build_lengths,
};
use crate::lz77::{
    LEVEL_PROBES, LZ_DICT_MASK, LZ_DICT_SIZE, LzBuffer, LzToken, MIN_MATCH_FAR_DISTANCE, Match,
    MatchFinder,
};
use crate::tables::{
    CODE_LENGTH_ORDER, FIXED_DISTANCE_LENGTHS, FIXED_LITLEN_LENGTHS, MAX_MATCH, MIN_MATCH,
    distance_to_code, length_to_code,
};
use oxizip_core::bitbuf::BitBuffer;
use oxizip_core::checksum::{ADLER32_INIT, adler32};
use oxizip_core::error::{OxiZipError, Result};
use oxizip_core::traits::{CompressionLevel, Compressor, DeflateStatus, FlushMode};
use std::io;

/// Blocks covering fewer input bytes than this use the fixed codes.
const STATIC_BLOCK_THRESHOLD: usize = 48;

/// Lookahead window of the fast (level 1) parser.
const FAST_LOOKAHEAD: usize = 4096;

/// Matches this long are taken without trying the next position.
const LAZY_CUTOFF: usize = 128;

/// Matches of this length or shorter are dropped by the filtered strategy.
const FILTER_MAX_LEN: usize = 5;

/// Header written before the first block when zlib framing is on.
const ZLIB_HEADER: [u8; 2] = [0x78, 0x01];

/// Compression strategy, as accepted by zlib-style front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Normal LZ77 with Huffman coding.
    #[default]
    Default,
    /// Drop short matches; suits data with small random variations.
    Filtered,
    /// Literals only.
    HuffmanOnly,
    /// Only matches at distance 1.
    Rle,
    /// Always use the fixed Huffman codes.
    Fixed,
}

/// Knobs controlling a [`Deflater`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeflateParams {
    /// Chain probes per match search before rounding (0 disables matching).
    pub max_probes: u32,
    /// Take the first acceptable match instead of looking one byte ahead.
    pub greedy: bool,
    /// Wrap the stream in a zlib header and Adler-32 trailer.
    pub zlib_header: bool,
    /// Track the Adler-32 of the input even without zlib framing.
    pub compute_adler: bool,
    /// Only look for runs of the previous byte.
    pub rle_matches: bool,
    /// Drop matches of five bytes or fewer.
    pub filter_matches: bool,
    /// Never build dynamic Huffman tables.
    pub force_static: bool,
    /// Emit stored blocks only.
    pub force_raw: bool,
}

impl DeflateParams {
    /// Flag: write a zlib header and Adler-32 trailer.
    pub const WRITE_ZLIB_HEADER: u32 = 0x0_1000;
    /// Flag: compute the Adler-32 of the input.
    pub const COMPUTE_ADLER32: u32 = 0x0_2000;
    /// Flag: greedy parsing.
    pub const GREEDY_PARSING: u32 = 0x0_4000;
    /// Flag: run-length matches only.
    pub const RLE_MATCHES: u32 = 0x1_0000;
    /// Flag: drop short matches.
    pub const FILTER_MATCHES: u32 = 0x2_0000;
    /// Flag: fixed Huffman codes only.
    pub const FORCE_ALL_STATIC_BLOCKS: u32 = 0x4_0000;
    /// Flag: stored blocks only.
    pub const FORCE_ALL_RAW_BLOCKS: u32 = 0x8_0000;
    /// Mask selecting the probe count.
    pub const MAX_PROBES_MASK: u32 = 0x0_0FFF;

    /// Parameters for a raw DEFLATE stream at `level`.
    pub fn from_level(level: u8) -> Self {
        let level = CompressionLevel::new(level).level();
        Self {
            max_probes: LEVEL_PROBES[level as usize],
            greedy: level <= 3,
            zlib_header: false,
            compute_adler: false,
            rle_matches: false,
            filter_matches: false,
            force_static: false,
            force_raw: level == 0,
        }
    }

    /// Parameters for a zlib stream at `level`.
    pub fn zlib(level: u8) -> Self {
        Self {
            zlib_header: true,
            ..Self::from_level(level)
        }
    }

    /// Parameters from zlib-style arguments.
    ///
    /// A positive `window_bits` selects zlib framing; zero or negative means
    /// a raw stream. Level 0 stores regardless of `strategy`.
    pub fn from_zip_params(level: u8, window_bits: i32, strategy: Strategy) -> Self {
        let mut params = Self::from_level(level);
        params.zlib_header = window_bits > 0;
        if level == 0 {
            return params;
        }
        match strategy {
            Strategy::Default => {}
            Strategy::Filtered => params.filter_matches = true,
            Strategy::HuffmanOnly => params.max_probes = 0,
            Strategy::Fixed => params.force_static = true,
            Strategy::Rle => params.rle_matches = true,
        }
        params
    }

    /// Decode a packed flag word (probe count in the low 12 bits).
    pub fn from_flags(flags: u32) -> Self {
        Self {
            max_probes: flags & Self::MAX_PROBES_MASK,
            greedy: flags & Self::GREEDY_PARSING != 0,
            zlib_header: flags & Self::WRITE_ZLIB_HEADER != 0,
            compute_adler: flags & Self::COMPUTE_ADLER32 != 0,
            rle_matches: flags & Self::RLE_MATCHES != 0,
            filter_matches: flags & Self::FILTER_MATCHES != 0,
            force_static: flags & Self::FORCE_ALL_STATIC_BLOCKS != 0,
            force_raw: flags & Self::FORCE_ALL_RAW_BLOCKS != 0,
        }
    }

    /// Pack into a flag word.
    pub fn to_flags(&self) -> u32 {
        let mut flags = self.max_probes & Self::MAX_PROBES_MASK;
        for (set, bit) in [
            (self.greedy, Self::GREEDY_PARSING),
            (self.zlib_header, Self::WRITE_ZLIB_HEADER),
            (self.compute_adler, Self::COMPUTE_ADLER32),
            (self.rle_matches, Self::RLE_MATCHES),
            (self.filter_matches, Self::FILTER_MATCHES),
            (self.force_static, Self::FORCE_ALL_STATIC_BLOCKS),
            (self.force_raw, Self::FORCE_ALL_RAW_BLOCKS),
        ] {
            if set {
                flags |= bit;
            }
        }
        flags
    }

    fn uses_fast_path(&self) -> bool {
        self.max_probes == 1
            && self.greedy
            && !(self.filter_matches || self.force_raw || self.rle_matches)
    }

    fn tracks_adler(&self) -> bool {
        self.zlib_header || self.compute_adler
    }
}

impl Default for DeflateParams {
    fn default() -> Self {
        Self::from_level(CompressionLevel::DEFAULT.level())
    }
}

/// Where compressed bytes go during one call.
enum Output<'a> {
    Buffer { buf: &'a mut [u8], written: usize },
    Sink(&'a mut dyn FnMut(&[u8]) -> io::Result<()>),
}

/// Streaming DEFLATE compressor.
#[derive(Debug)]
pub struct Deflater {
    params: DeflateParams,
    finder: MatchFinder,
    lz: LzBuffer,
    /// Absolute position of the first byte not yet parsed.
    lookahead_pos: usize,
    /// Bytes buffered but not yet parsed.
    lookahead_size: usize,
    /// Bytes behind `lookahead_pos` that matches may reference.
    dict_size: usize,
    /// Absolute position where the current block starts.
    block_start: usize,
    saved_lit: u8,
    saved_match: Match,
    bits: BitBuffer,
    /// Bytes of `bits` already handed out.
    drained: usize,
    block_index: u32,
    adler: u32,
    flush: FlushMode,
    wants_to_finish: bool,
    finished: bool,
    failed: bool,
    total_in: u64,
    total_out: u64,
    static_lit: EncodeTable,
    static_dist: EncodeTable,
}

impl Deflater {
    /// Create a raw DEFLATE compressor at `level` (0-10).
    pub fn new(level: u8) -> Self {
        Self::with_params(DeflateParams::from_level(level))
    }

    /// Create a compressor with explicit parameters.
    pub fn with_params(params: DeflateParams) -> Self {
        Self {
            params,
            finder: MatchFinder::new(params.max_probes),
            lz: LzBuffer::new(),
            lookahead_pos: 0,
            lookahead_size: 0,
            dict_size: 0,
            block_start: 0,
            saved_lit: 0,
            saved_match: Match::default(),
            bits: BitBuffer::with_capacity(LZ_DICT_SIZE),
            drained: 0,
            block_index: 0,
            adler: ADLER32_INIT,
            flush: FlushMode::None,
            wants_to_finish: false,
            finished: false,
            failed: false,
            total_in: 0,
            total_out: 0,
            static_lit: EncodeTable::from_lengths(&FIXED_LITLEN_LENGTHS),
            static_dist: EncodeTable::from_lengths(&FIXED_DISTANCE_LENGTHS),
        }
    }

    /// Parameters this compressor was built with.
    pub fn params(&self) -> &DeflateParams {
        &self.params
    }

    /// Adler-32 of the input consumed so far (if tracked).
    pub fn adler32(&self) -> u32 {
        self.adler
    }

    /// Total input bytes consumed.
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Total compressed bytes handed out.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Compress into a caller buffer.
    ///
    /// Returns `(consumed, written, status)`. When the output buffer fills
    /// the call stops early; call again with the unconsumed input and the
    /// same flush mode until [`DeflateStatus::Done`] (for `Finish`) or until
    /// a call leaves output space unused (for the other flushes).
    pub fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, DeflateStatus)> {
        let mut out = Output::Buffer {
            buf: output,
            written: 0,
        };
        let consumed = self.run(input, flush, &mut out)?;
        let written = match out {
            Output::Buffer { written, .. } => written,
            Output::Sink(_) => 0,
        };
        Ok((consumed, written, self.status()))
    }

    /// Compress everything in `input`, passing output chunks to `sink`.
    ///
    /// All of `input` is consumed. A sink error fails the compressor.
    pub fn compress_to<F>(&mut self, input: &[u8], flush: FlushMode, mut sink: F) -> Result<DeflateStatus>
    where
        F: FnMut(&[u8]) -> io::Result<()>,
    {
        let mut out = Output::Sink(&mut sink);
        self.run(input, flush, &mut out)?;
        Ok(self.status())
    }

    /// Whether the final block was written and every byte handed out.
    pub fn is_finished(&self) -> bool {
        self.status() == DeflateStatus::Done
    }

    /// Reset for a new stream with the same parameters.
    pub fn reset(&mut self) {
        *self = Self::with_params(self.params);
    }

    fn status(&self) -> DeflateStatus {
        if self.finished && !self.has_pending() {
            DeflateStatus::Done
        } else {
            DeflateStatus::Okay
        }
    }

    fn has_pending(&self) -> bool {
        self.drained < self.bits.len()
    }

    fn run(&mut self, input: &[u8], flush: FlushMode, out: &mut Output<'_>) -> Result<usize> {
        if self.failed {
            return Err(OxiZipError::invalid_parameter(
                "compressor failed on an earlier call",
            ));
        }
        if self.wants_to_finish && flush != FlushMode::Finish {
            return Err(OxiZipError::invalid_parameter(
                "stream already finishing; only Finish is accepted",
            ));
        }
        if self.finished && !input.is_empty() {
            return Err(OxiZipError::invalid_parameter("input after end of stream"));
        }

        self.wants_to_finish |= flush == FlushMode::Finish;
        self.flush = flush;

        if self.has_pending() {
            self.emit(out)?;
            return Ok(0);
        }
        if self.finished {
            return Ok(0);
        }

        let (consumed, stalled) = if self.params.uses_fast_path() {
            self.compress_fast(input, out)?
        } else {
            self.compress_normal(input, out)?
        };

        if self.params.tracks_adler() {
            self.adler = adler32(self.adler, &input[..consumed]);
        }
        self.total_in += consumed as u64;

        if !stalled && flush.is_flush() && self.lookahead_size == 0 && consumed == input.len() {
            self.flush_block(flush)?;
            self.finished = flush == FlushMode::Finish;
            if flush == FlushMode::Full {
                self.finder.reset();
                self.dict_size = 0;
            }
            log::trace!(
                "deflate flush {:?}: block {}, in {} out {}",
                flush,
                self.block_index,
                self.total_in,
                self.total_out + self.bits.len() as u64
            );
            self.emit(out)?;
        }

        Ok(consumed)
    }

    /// Hand out completed bytes. Returns true if some could not be placed.
    fn emit(&mut self, out: &mut Output<'_>) -> Result<bool> {
        match out {
            Output::Buffer { buf, written } => {
                let pending = &self.bits.as_bytes()[self.drained..];
                let n = pending.len().min(buf.len() - *written);
                buf[*written..*written + n].copy_from_slice(&pending[..n]);
                *written += n;
                self.drained += n;
                self.total_out += n as u64;
            }
            Output::Sink(sink) => {
                let pending = &self.bits.as_bytes()[self.drained..];
                if !pending.is_empty() {
                    if let Err(err) = (*sink)(pending) {
                        self.failed = true;
                        return Err(err.into());
                    }
                    self.total_out += pending.len() as u64;
                }
                self.drained = self.bits.len();
            }
        }

        if self.has_pending() {
            return Ok(true);
        }
        self.bits.clear_bytes();
        self.drained = 0;
        Ok(false)
    }

    fn advance(&mut self, len: usize) {
        self.lookahead_pos += len;
        self.lookahead_size -= len;
        self.dict_size = (self.dict_size + len).min(LZ_DICT_SIZE);
    }

    /// Copy input into the lookahead until it holds `MAX_MATCH` bytes,
    /// entering each newly completed trigram into the hash chains.
    fn fill_lookahead(&mut self, input: &[u8]) -> usize {
        if self.lookahead_size + self.dict_size >= MIN_MATCH - 1 {
            let n = input.len().min(MAX_MATCH - self.lookahead_size);
            let mut ins_pos = self.lookahead_pos + self.lookahead_size - 2;
            let mut hash = self.finder.seed_hash(ins_pos);
            for &c in &input[..n] {
                self.finder.write_byte(ins_pos + 2, c);
                hash = MatchFinder::roll_hash(hash, c);
                self.finder.insert(ins_pos, hash);
                ins_pos += 1;
            }
            self.lookahead_size += n;
            n
        } else {
            let mut n = 0;
            while n < input.len() && self.lookahead_size < MAX_MATCH {
                self.finder
                    .write_byte(self.lookahead_pos + self.lookahead_size, input[n]);
                n += 1;
                self.lookahead_size += 1;
                if self.lookahead_size + self.dict_size >= MIN_MATCH {
                    let ins_pos = self.lookahead_pos + self.lookahead_size - MIN_MATCH;
                    let hash = self.finder.hash_at(ins_pos);
                    self.finder.insert(ins_pos, hash);
                }
            }
            n
        }
    }

    fn compress_normal(&mut self, input: &[u8], out: &mut Output<'_>) -> Result<(usize, bool)> {
        let flushing = self.flush.is_flush();
        let mut src = 0;

        while src < input.len() || (flushing && self.lookahead_size > 0) {
            src += self.fill_lookahead(&input[src..]);
            self.dict_size = self.dict_size.min(LZ_DICT_SIZE - self.lookahead_size);
            if !flushing && self.lookahead_size < MAX_MATCH {
                break;
            }

            self.parse_position();

            if self.block_is_due() {
                self.flush_block(FlushMode::None)?;
                if self.emit(out)? {
                    return Ok((src, true));
                }
            }
        }

        Ok((src, false))
    }

    /// Decide what to emit for the byte at `lookahead_pos`.
    fn parse_position(&mut self) {
        let cur_pos = self.lookahead_pos & LZ_DICT_MASK;
        let saved = self.saved_match;
        let mut cur = Match {
            len: if saved.len > 0 { saved.len } else { MIN_MATCH - 1 },
            dist: 0,
        };

        if self.params.rle_matches || self.params.force_raw {
            if self.dict_size > 0 && !self.params.force_raw {
                let prev = self.finder.byte(self.lookahead_pos.wrapping_sub(1));
                let run = (0..self.lookahead_size)
                    .take_while(|&i| self.finder.byte(self.lookahead_pos + i) == prev)
                    .count();
                cur = if run < MIN_MATCH {
                    Match::default()
                } else {
                    Match { len: run, dist: 1 }
                };
            }
        } else {
            cur = self
                .finder
                .find_match(self.lookahead_pos, self.dict_size, self.lookahead_size, cur);
        }

        if (cur.len == MIN_MATCH && cur.dist >= MIN_MATCH_FAR_DISTANCE)
            || (self.params.filter_matches && cur.len <= FILTER_MAX_LEN)
        {
            cur = Match::default();
        }

        let mut len_to_move = 1;
        if saved.len > 0 {
            if cur.dist > 0 && cur.len > saved.len {
                self.lz.push_literal(self.saved_lit);
                if cur.len >= LAZY_CUTOFF {
                    self.lz.push_match(cur.len, cur.dist);
                    self.saved_match = Match::default();
                    len_to_move = cur.len;
                } else {
                    self.saved_lit = self.finder.byte(self.lookahead_pos);
                    self.saved_match = cur;
                }
            } else {
                self.lz.push_match(saved.len, saved.dist);
                len_to_move = saved.len - 1;
                self.saved_match = Match::default();
            }
        } else if cur.dist == 0 {
            self.lz.push_literal(self.finder.byte(cur_pos));
        } else if self.params.greedy || self.params.rle_matches || cur.len >= LAZY_CUTOFF {
            self.lz.push_match(cur.len, cur.dist);
            len_to_move = cur.len;
        } else {
            self.saved_lit = self.finder.byte(cur_pos);
            self.saved_match = cur;
        }

        self.advance(len_to_move);
    }

    fn block_is_due(&self) -> bool {
        let total = self.lz.total_bytes();
        self.lz.is_nearly_full()
            || (total > 31 * 1024
                && (((self.lz.len() * 115) >> 7) >= total || self.params.force_raw))
    }

    /// Level 1: one hash slot per trigram, no chains, greedy.
    fn compress_fast(&mut self, input: &[u8], out: &mut Output<'_>) -> Result<(usize, bool)> {
        let flushing = self.flush.is_flush();
        let mut src = 0;
        let mut cur_pos = self.lookahead_pos & LZ_DICT_MASK;

        while src < input.len() || (flushing && self.lookahead_size > 0) {
            let n = (input.len() - src).min(FAST_LOOKAHEAD - self.lookahead_size);
            self.finder
                .write_bytes(self.lookahead_pos + self.lookahead_size, &input[src..src + n]);
            src += n;
            self.lookahead_size += n;
            self.dict_size = self.dict_size.min(LZ_DICT_SIZE - self.lookahead_size);
            if !flushing && self.lookahead_size < FAST_LOOKAHEAD {
                break;
            }

            while self.lookahead_size >= 4 {
                let trigram = self.finder.trigram(cur_pos);
                let probe = self.finder.fast_swap(trigram, self.lookahead_pos);
                let dist = (self.lookahead_pos as u16).wrapping_sub(probe) as usize;

                let mut len = 1;
                if dist > 0 && dist <= self.dict_size {
                    let probe_pos = probe as usize & LZ_DICT_MASK;
                    if self.finder.trigram(probe_pos) == trigram {
                        let found = self.finder.match_len(cur_pos, probe_pos, MAX_MATCH);
                        if found > MIN_MATCH
                            || (found == MIN_MATCH && dist < MIN_MATCH_FAR_DISTANCE)
                        {
                            len = found.min(self.lookahead_size);
                        }
                    }
                }

                if len == 1 {
                    self.lz.push_literal(trigram as u8);
                } else {
                    self.lz.push_match(len, dist);
                }
                self.advance(len);
                cur_pos = (cur_pos + len) & LZ_DICT_MASK;

                if self.lz.is_nearly_full() {
                    self.flush_block(FlushMode::None)?;
                    if self.emit(out)? {
                        return Ok((src, true));
                    }
                }
            }

            while self.lookahead_size > 0 {
                self.lz.push_literal(self.finder.byte(cur_pos));
                self.advance(1);
                cur_pos = (cur_pos + 1) & LZ_DICT_MASK;

                if self.lz.is_nearly_full() {
                    self.flush_block(FlushMode::None)?;
                    if self.emit(out)? {
                        return Ok((src, true));
                    }
                }
            }
        }

        Ok((src, false))
    }

    /// Whether every byte of the current block is still in the dictionary.
    fn block_in_window(&self) -> bool {
        self.lookahead_pos - self.block_start <= self.dict_size
    }

    /// Encode the pending tokens as one block, then apply `flush`.
    fn flush_block(&mut self, flush: FlushMode) -> Result<()> {
        let total = self.lz.total_bytes();
        let use_raw = self.params.force_raw && self.block_in_window();

        self.lz.finish_flags();

        if self.params.zlib_header && self.block_index == 0 {
            self.bits.put_bytes(&ZLIB_HEADER);
        }
        self.bits
            .put_bits(u32::from(flush == FlushMode::Finish), 1);

        let snapshot = self.bits.snapshot();
        let start_len = self.bits.len();
        let use_static = self.params.force_static || total < STATIC_BLOCK_THRESHOLD;
        if use_static {
            self.bits.put_bits(1, 2);
            write_lz_codes(&self.lz, &mut self.bits, &self.static_lit, &self.static_dist);
        } else {
            let (lit, dist) =
                write_dynamic_header(&mut self.bits, self.lz.lit_freq(), self.lz.dist_freq())?;
            write_lz_codes(&self.lz, &mut self.bits, &lit, &dist);
        }

        let produced = self.bits.len() - start_len;
        let expands = total > 0 && produced + 1 >= total;
        let stored = (use_raw || expands) && self.block_in_window() && total <= u16::MAX as usize;
        if stored {
            self.bits.restore(snapshot);
            self.bits.put_bits(0, 2);
            self.bits.align_to_byte();
            self.bits.put_bits(total as u32, 16);
            self.bits.put_bits(!(total as u32) & 0xFFFF, 16);
            for i in 0..total {
                self.bits
                    .put_bits(self.finder.byte(self.block_start + i) as u32, 8);
            }
        }

        match flush {
            FlushMode::None => {}
            FlushMode::Finish => {
                self.bits.align_to_byte();
                if self.params.zlib_header {
                    self.bits.put_bytes(&self.adler.to_be_bytes());
                }
            }
            FlushMode::Partial => {
                // Empty fixed-code block: header plus the 7-bit end-of-block code.
                self.bits.put_bits(0b010, 3);
                self.bits.put_bits(0, 7);
            }
            FlushMode::Sync | FlushMode::Full => {
                self.bits.put_bits(0, 3);
                self.bits.align_to_byte();
                self.bits.put_bits(0x0000, 16);
                self.bits.put_bits(0xFFFF, 16);
            }
        }

        log::trace!(
            "deflate block {}: {} input bytes, {} output bytes, {}",
            self.block_index,
            total,
            self.bits.len() - start_len,
            if stored {
                "stored"
            } else if use_static {
                "static"
            } else {
                "dynamic"
            }
        );

        self.lz.clear();
        self.block_start += total;
        self.block_index += 1;
        Ok(())
    }
}

impl Default for Deflater {
    fn default() -> Self {
        Self::with_params(DeflateParams::default())
    }
}

impl Compressor for Deflater {
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, DeflateStatus)> {
        Deflater::compress(self, input, output, flush)
    }

    fn reset(&mut self) {
        Deflater::reset(self);
    }

    fn is_finished(&self) -> bool {
        Deflater::is_finished(self)
    }
}

/// Write the literal/length and distance codes for every token, then the
/// end-of-block code.
fn write_lz_codes(lz: &LzBuffer, bits: &mut BitBuffer, lit: &EncodeTable, dist: &EncodeTable) {
    for token in lz.tokens() {
        match token {
            LzToken::Literal(byte) => {
                let (code, len) = lit.code(byte as usize);
                bits.put_bits(code, len);
            }
            LzToken::Match { len, dist: distance } => {
                let (sym, extra_bits, extra) = length_to_code(len);
                let (code, code_len) = lit.code(sym as usize);
                bits.put_bits(code, code_len);
                bits.put_bits(extra as u32, extra_bits as u32);

                let (sym, extra_bits, extra) = distance_to_code(distance);
                let (code, code_len) = dist.code(sym as usize);
                bits.put_bits(code, code_len);
                bits.put_bits(extra as u32, extra_bits as u32);
            }
        }
    }
    let (code, len) = lit.code(END_OF_BLOCK as usize);
    bits.put_bits(code, len);
}

/// Run-length coder for the code-length sequence of a dynamic header.
#[derive(Default)]
struct CodeLengthPacker {
    packed: Vec<(u8, u8)>,
    freq: [u32; 19],
    prev: Option<u8>,
    repeat_count: u8,
    zero_count: u8,
}

impl CodeLengthPacker {
    fn push(&mut self, len: u8) {
        if len == 0 {
            self.flush_repeats();
            self.zero_count += 1;
            if self.zero_count == 138 {
                self.flush_zeros();
            }
        } else {
            self.flush_zeros();
            if self.prev != Some(len) {
                self.flush_repeats();
                self.emit(len, 0);
            } else {
                self.repeat_count += 1;
                if self.repeat_count == 6 {
                    self.flush_repeats();
                }
            }
        }
        self.prev = Some(len);
    }

    fn emit(&mut self, sym: u8, extra: u8) {
        self.freq[sym as usize] += 1;
        self.packed.push((sym, extra));
    }

    fn flush_repeats(&mut self) {
        let count = std::mem::take(&mut self.repeat_count);
        let Some(prev) = self.prev else { return };
        if count == 0 {
            return;
        }
        if count < 3 {
            for _ in 0..count {
                self.emit(prev, 0);
            }
        } else {
            self.emit(16, count - 3);
        }
    }

    fn flush_zeros(&mut self) {
        let count = std::mem::take(&mut self.zero_count);
        match count {
            0 => {}
            1..=2 => {
                for _ in 0..count {
                    self.emit(0, 0);
                }
            }
            3..=10 => self.emit(17, count - 3),
            _ => self.emit(18, count - 11),
        }
    }

    fn finish(mut self) -> (Vec<(u8, u8)>, [u32; 19]) {
        if self.repeat_count > 0 {
            self.flush_repeats();
        } else {
            self.flush_zeros();
        }
        (self.packed, self.freq)
    }
}

/// Build and write a dynamic block header; returns the tables to code with.
fn write_dynamic_header(
    bits: &mut BitBuffer,
    lit_freq: &[u32; 288],
    dist_freq: &[u32; 32],
) -> Result<(EncodeTable, EncodeTable)> {
    let mut lit_freq = *lit_freq;
    lit_freq[END_OF_BLOCK as usize] = 1;

    let lit_lengths = build_lengths(&lit_freq, MAX_CODE_LENGTH)?;
    let dist_lengths = build_lengths(dist_freq, MAX_CODE_LENGTH)?;

    let num_lit = (258..=286)
        .rev()
        .find(|&n| lit_lengths[n - 1] != 0)
        .unwrap_or(257);
    let num_dist = (2..=30)
        .rev()
        .find(|&n| dist_lengths[n - 1] != 0)
        .unwrap_or(1);

    let mut packer = CodeLengthPacker::default();
    for &len in lit_lengths[..num_lit].iter().chain(&dist_lengths[..num_dist]) {
        packer.push(len);
    }
    let (packed, cl_freq) = packer.finish();

    let cl_lengths = build_lengths(&cl_freq, MAX_CODELEN_CODE_LENGTH)?;
    let cl_table = EncodeTable::from_lengths(&cl_lengths);

    bits.put_bits(2, 2);
    bits.put_bits((num_lit - 257) as u32, 5);
    bits.put_bits((num_dist - 1) as u32, 5);

    let num_cl = (0..CODE_LENGTH_ORDER.len())
        .rev()
        .find(|&i| cl_lengths[CODE_LENGTH_ORDER[i]] != 0)
        .map_or(0, |i| i + 1)
        .max(4);
    bits.put_bits((num_cl - 4) as u32, 4);
    for &sym in &CODE_LENGTH_ORDER[..num_cl] {
        bits.put_bits(cl_lengths[sym] as u32, 3);
    }

    for &(sym, extra) in &packed {
        let (code, len) = cl_table.code(sym as usize);
        bits.put_bits(code, len);
        match sym {
            16 => bits.put_bits(extra as u32, 2),
            17 => bits.put_bits(extra as u32, 3),
            18 => bits.put_bits(extra as u32, 7),
            _ => {}
        }
    }

    Ok((
        EncodeTable::from_lengths(&lit_lengths),
        EncodeTable::from_lengths(&dist_lengths),
    ))
}

/// Worst-case compressed size for `len` input bytes.
pub fn compress_bound(len: usize) -> usize {
    let stored = 128 + len + (len / (31 * 1024) + 1) * 5;
    let coded = 128 + len * 110 / 100;
    stored.max(coded)
}

/// Compress `data` as a raw DEFLATE stream at `level` (0-10).
///
/// # Example
///
/// ```
/// use oxizip_deflate::{deflate, inflate};
///
/// let data = b"Hello, World! Hello, World!";
/// let compressed = deflate(data, 6).unwrap();
/// assert_eq!(inflate(&compressed).unwrap(), data);
/// ```
pub fn deflate(data: &[u8], level: u8) -> Result<Vec<u8>> {
    deflate_with_params(data, DeflateParams::from_level(level))
}

/// Compress `data` in one call with explicit parameters.
pub fn deflate_with_params(data: &[u8], params: DeflateParams) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len() / 2 + 64);
    let mut deflater = Deflater::with_params(params);
    deflater.compress_to(data, FlushMode::Finish, |chunk| {
        output.extend_from_slice(chunk);
        Ok(())
    })?;
    Ok(output)
}
