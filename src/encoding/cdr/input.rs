// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! CDR input stream for reading GIOP message bodies and encapsulations.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::codeset::CodeSetContext;
use crate::core::{minor, CompletionStatus, CorbaError, GiopVersion, Result};

/// CDR input stream over a borrowed buffer.
///
/// The stream tracks:
/// - `offset`: current read position in `data`
/// - `base`: global position of `data[0]` within the outermost message
/// - `origin`: global position alignment is computed against
///
/// Alignment is calculated as `(base + offset - origin) % size`. For a GIOP
/// message body the origin is the start of the message and the base is 12
/// (the header length). For an encapsulation the origin is its first byte.
///
/// While a chunked value type is being read, every read is checked against
/// the current chunk: chunk length headers at a chunk border are consumed
/// transparently and a read running over the border fails.
///
/// # Example
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use iiopcodec::encoding::cdr::CdrInput;
///
/// let data = [0x07, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2A];
/// let mut input = CdrInput::new(&data, false);
/// assert_eq!(input.read_octet()?, 7);
/// assert_eq!(input.read_ulong()?, 42); // skips 3 padding bytes
/// # Ok(())
/// # }
/// ```
pub struct CdrInput<'a> {
    data: &'a [u8],
    offset: usize,
    base: usize,
    origin: usize,
    little_endian: bool,
    version: GiopVersion,
    codesets: CodeSetContext,
    chunks: Vec<Chunk>,
}

/// Lowest value tag, as a signed long.
const MIN_VALUE_TAG: i32 = 0x7fff_ff00;

/// One open chunked value.
#[derive(Debug, Clone, Copy)]
struct Chunk {
    /// Offset where the current chunk's data ends
    end: usize,
    /// A nested value interrupted this chunk; checks resume after it
    continuation_expected: bool,
    /// Closed by an end tag of a nested value
    finished: bool,
}

impl Chunk {
    fn is_active(&self) -> bool {
        !self.continuation_expected && !self.finished
    }
}

macro_rules! read_aligned {
    ($(#[$meta:meta])* $name:ident, $ty:ty, $size:expr, $read:ident) => {
        $(#[$meta])*
        pub fn $name(&mut self) -> Result<$ty> {
            self.align($size)?;
            let bytes = self.take($size)?;
            Ok(if self.little_endian {
                LittleEndian::$read(bytes)
            } else {
                BigEndian::$read(bytes)
            })
        }
    };
}

impl<'a> CdrInput<'a> {
    /// Create a stream at global position 0 using GIOP 1.2 rules and the
    /// default codesets.
    pub fn new(data: &'a [u8], little_endian: bool) -> Self {
        Self {
            data,
            offset: 0,
            base: 0,
            origin: 0,
            little_endian,
            version: GiopVersion::V1_2,
            codesets: CodeSetContext::default(),
            chunks: Vec::new(),
        }
    }

    /// Create a stream over a message body that starts at global position
    /// `base`, aligned relative to the message start.
    pub fn for_message_body(data: &'a [u8], base: usize, little_endian: bool) -> Self {
        Self {
            base,
            ..Self::new(data, little_endian)
        }
    }

    pub fn with_version(mut self, version: GiopVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_codesets(mut self, codesets: CodeSetContext) -> Self {
        self.codesets = codesets;
        self
    }

    pub fn set_endian(&mut self, little_endian: bool) {
        self.little_endian = little_endian;
    }

    /// Set the negotiated codesets and the GIOP version governing wide data.
    pub fn set_codesets(&mut self, codesets: CodeSetContext, version: GiopVersion) {
        self.codesets = codesets;
        self.version = version;
    }

    #[inline]
    pub fn is_little_endian(&self) -> bool {
        self.little_endian
    }

    #[inline]
    pub fn version(&self) -> GiopVersion {
        self.version
    }

    #[inline]
    pub fn codesets(&self) -> CodeSetContext {
        self.codesets
    }

    /// Position relative to the start of this stream's buffer.
    #[inline]
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Position relative to the start of the outermost message.
    #[inline]
    pub fn global_position(&self) -> usize {
        self.base + self.offset
    }

    #[inline]
    pub fn bytes_left(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Skip padding up to the next multiple of `size`, relative to the origin.
    pub fn align(&mut self, size: usize) -> Result<()> {
        // a new chunk may start here, and alignment counts after its header
        self.check_chunk(0)?;
        self.align_raw(size)
    }

    fn align_raw(&mut self, size: usize) -> Result<()> {
        let padding = self.padding_for(size);
        if padding > self.bytes_left() {
            return Err(CorbaError::end_of_stream());
        }
        self.offset += padding;
        Ok(())
    }

    fn padding_for(&self, size: usize) -> usize {
        let rel = self.global_position() - self.origin;
        (size - rel % size) % size
    }

    /// Like [`align`](Self::align), but succeeds without moving when the
    /// padding would run past the end of the buffer.
    pub fn try_align(&mut self, size: usize) -> bool {
        self.align(size).is_ok()
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    /// Discard whatever is left in the buffer.
    pub fn skip_rest(&mut self) {
        self.offset = self.data.len();
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        self.check_chunk(count)?;
        self.take_raw(count)
    }

    fn take_raw(&mut self, count: usize) -> Result<&'a [u8]> {
        if count > self.bytes_left() {
            return Err(CorbaError::end_of_stream());
        }
        let slice = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    fn read_long_raw(&mut self) -> Result<i32> {
        self.align_raw(4)?;
        let bytes = self.take_raw(4)?;
        Ok(if self.little_endian {
            LittleEndian::read_i32(bytes)
        } else {
            BigEndian::read_i32(bytes)
        })
    }

    /// Long at the next 4-byte boundary, without consuming it.
    fn peek_long_raw(&self) -> Option<(i32, usize)> {
        let start = self.offset + self.padding_for(4);
        let bytes = self.data.get(start..start + 4)?;
        let value = if self.little_endian {
            LittleEndian::read_i32(bytes)
        } else {
            BigEndian::read_i32(bytes)
        };
        Some((value, start + 4))
    }

    /// Check a read of `count` bytes against the innermost open chunk.
    ///
    /// At a chunk border the next long is either the length of a
    /// continuation chunk, which is consumed, or the tag of a nested value,
    /// which suspends checking until that value has ended.
    fn check_chunk(&mut self, count: usize) -> Result<()> {
        let Some(chunk) = self.chunks.last().copied() else {
            return Ok(());
        };
        if !chunk.is_active() {
            return Ok(());
        }
        let mut chunk = chunk;
        if self.offset == chunk.end {
            match self.peek_long_raw() {
                Some((len, after)) if len > 0 && len < MIN_VALUE_TAG => {
                    self.offset = after;
                    chunk.end = after + len as usize;
                }
                Some((tag, _)) if tag >= MIN_VALUE_TAG => {
                    chunk.continuation_expected = true;
                }
                _ => {}
            }
        }
        if let Some(top) = self.chunks.last_mut() {
            *top = chunk;
        }
        if chunk.is_active() && self.offset + count > chunk.end {
            return Err(CorbaError::marshal(
                minor::CHUNK_BORDER_CROSSED,
                CompletionStatus::CompletedMayBe,
            ));
        }
        Ok(())
    }

    /// Start the body of a chunked value. Its first chunk length is read
    /// with the first member.
    pub fn begin_chunked_value(&mut self) {
        self.chunks.push(Chunk {
            end: self.offset,
            continuation_expected: false,
            finished: false,
        });
    }

    /// End the innermost chunked value.
    ///
    /// Unread data left in its chunk (members of a truncated derived type)
    /// is skipped, then the end tag is read. An end tag of `-n` closes every
    /// value nested at level `n` or deeper; the enclosing value, if any,
    /// continues with a new chunk.
    pub fn end_chunked_value(&mut self) -> Result<()> {
        let Some(top) = self.chunks.pop() else {
            return Err(CorbaError::marshal(
                minor::CHUNKS_NOT_CLOSED,
                CompletionStatus::CompletedMayBe,
            ));
        };
        if top.finished {
            return Ok(());
        }
        if self.offset < top.end {
            self.take_raw(top.end - self.offset)?;
        }
        let end_tag = self.read_long_raw()?;
        if end_tag >= 0 {
            return Err(CorbaError::marshal(
                minor::INVALID_END_TAG,
                CompletionStatus::CompletedMayBe,
            ));
        }
        // values still open: 1 (this one) + the stack; outermost is level 1
        let depth = self.chunks.len() as i64 + 1;
        let levels_to_end = depth + 1 + i64::from(end_tag);
        if levels_to_end <= 0 {
            return Err(CorbaError::marshal(
                minor::END_TAG_LEVEL,
                CompletionStatus::CompletedMayBe,
            ));
        }
        let offset = self.offset;
        let mut open = self.chunks.iter_mut().rev();
        for _ in 1..levels_to_end {
            let Some(outer) = open.next() else {
                break;
            };
            if outer.end > offset {
                return Err(CorbaError::marshal(
                    minor::CHUNK_NOT_CONSUMED,
                    CompletionStatus::CompletedMayBe,
                ));
            }
            outer.finished = true;
        }
        if let Some(outer) = open.next() {
            outer.continuation_expected = false;
            outer.end = offset;
        }
        Ok(())
    }

    pub fn read_octet(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a boolean. Any wire value other than 0 or 1 fails.
    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_octet()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(CorbaError::bad_param(
                minor::INVALID_BOOLEAN,
                CompletionStatus::CompletedMayBe,
            )),
        }
    }

    read_aligned!(read_short, i16, 2, read_i16);
    read_aligned!(read_ushort, u16, 2, read_u16);
    read_aligned!(read_long, i32, 4, read_i32);
    read_aligned!(read_ulong, u32, 4, read_u32);
    read_aligned!(read_longlong, i64, 8, read_i64);
    read_aligned!(read_ulonglong, u64, 8, read_u64);
    read_aligned!(read_float, f32, 4, read_f32);
    read_aligned!(read_double, f64, 8, read_f64);

    /// Read `count` raw bytes.
    pub fn read_opaque(&mut self, count: usize) -> Result<&'a [u8]> {
        self.take(count)
    }

    /// Read a u32 length followed by that many raw bytes.
    pub fn read_octet_sequence(&mut self) -> Result<&'a [u8]> {
        let len = self.read_ulong()? as usize;
        self.take(len)
    }

    /// Read a narrow character in the negotiated char codeset.
    pub fn read_char(&mut self) -> Result<char> {
        let byte = self.read_octet()?;
        self.codesets.char_set.decode_char(byte)
    }

    /// Read a narrow string: u32 length including the terminating NUL, the
    /// characters, then the NUL. A zero length yields an empty string.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_ulong()? as usize;
        self.read_string_data(len)
    }

    /// Read the characters of a narrow string whose length was already read.
    pub fn read_string_data(&mut self, len: usize) -> Result<String> {
        if len == 0 {
            return Ok(String::new());
        }
        let bytes = self.take(len)?;
        self.codesets
            .char_set
            .decode_string(&bytes[..len - 1])
    }

    /// Read a wide character in the negotiated wchar codeset.
    pub fn read_wchar(&mut self) -> Result<char> {
        let set = self.codesets.require_wchar_set()?;
        let units = if self.version.is_1_2_or_later() {
            let count = self.read_octet()? as usize;
            let bytes = self.take(count)?;
            self.decode_tagged_units(bytes)
        } else {
            let bytes = self.take(2)?;
            vec![self.unit(bytes)]
        };
        set.decode_units(&units)?
            .chars()
            .next()
            .ok_or_else(|| CorbaError::marshal(minor::END_OF_STREAM, CompletionStatus::CompletedMayBe))
    }

    /// Read a wide string.
    ///
    /// GIOP 1.2: u32 byte length, no terminator. GIOP 1.0/1.1: u32 count of
    /// 2-byte units including a terminating zero unit.
    pub fn read_wstring(&mut self) -> Result<String> {
        let set = self.codesets.require_wchar_set()?;
        let len = self.read_ulong()? as usize;
        if self.version.is_1_2_or_later() {
            let bytes = self.take(len)?;
            let units = self.decode_tagged_units(bytes);
            return set.decode_units(&units);
        }
        if len == 0 {
            return Ok(String::new());
        }
        let bytes = self.take(len * 2)?;
        let units: Vec<u16> = bytes[..(len - 1) * 2]
            .chunks_exact(2)
            .map(|c| self.unit(c))
            .collect();
        set.decode_units(&units)
    }

    fn unit(&self, bytes: &[u8]) -> u16 {
        if self.little_endian {
            LittleEndian::read_u16(bytes)
        } else {
            BigEndian::read_u16(bytes)
        }
    }

    /// Decode GIOP 1.2 wide bytes, honoring a leading byte order mark.
    fn decode_tagged_units(&self, bytes: &[u8]) -> Vec<u16> {
        let (little_endian, body) = match bytes {
            [0xfe, 0xff, rest @ ..] => (false, rest),
            [0xff, 0xfe, rest @ ..] => (true, rest),
            _ => (self.little_endian, bytes),
        };
        body.chunks_exact(2)
            .map(|c| {
                if little_endian {
                    LittleEndian::read_u16(c)
                } else {
                    BigEndian::read_u16(c)
                }
            })
            .collect()
    }

    /// Read an encapsulation: u32 length, then a sub-stream whose first
    /// octet is its byte order flag.
    ///
    /// The returned stream has its own alignment origin at the flag octet
    /// and knows its global position, so indirections can point across it.
    pub fn read_encapsulation(&mut self) -> Result<CdrInput<'a>> {
        let len = self.read_ulong()? as usize;
        let start = self.global_position();
        let data = self.take(len)?;
        let mut inner = CdrInput {
            data,
            offset: 0,
            base: start,
            origin: start,
            little_endian: self.little_endian,
            version: self.version,
            codesets: self.codesets,
            chunks: Vec::new(),
        };
        if len > 0 {
            let flag = inner.read_octet()?;
            inner.little_endian = flag & 0x01 != 0;
        }
        Ok(inner)
    }

    /// Open an encapsulation held in a standalone buffer (e.g. a tagged
    /// component or service context body).
    pub fn from_encapsulation(data: &'a [u8]) -> Result<Self> {
        let mut inner = CdrInput::new(data, false);
        if !data.is_empty() {
            let flag = inner.read_octet()?;
            inner.little_endian = flag & 0x01 != 0;
        }
        Ok(inner)
    }

    /// Remaining unread bytes.
    pub fn remaining_slice(&self) -> &'a [u8] {
        &self.data[self.offset.min(self.data.len())..]
    }
}
