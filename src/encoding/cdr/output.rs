// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! CDR output stream for building GIOP message bodies and encapsulations.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::codeset::CodeSetContext;
use crate::core::{minor, CompletionStatus, CorbaError, GiopVersion, Result};

/// Default initial capacity for the output buffer.
const DEFAULT_CAPACITY: usize = 64;

/// CDR output stream.
///
/// Padding is zero-filled and computed relative to the stream origin, the
/// same way [`CdrInput`](super::CdrInput) skips it.
///
/// # Example
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use iiopcodec::encoding::cdr::CdrOutput;
///
/// let mut out = CdrOutput::new(false);
/// out.write_octet(1)?.write_long(0x0102_0304)?;
/// assert_eq!(out.into_bytes(), vec![1, 0, 0, 0, 1, 2, 3, 4]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CdrOutput {
    buffer: Vec<u8>,
    base: usize,
    origin: usize,
    little_endian: bool,
    version: GiopVersion,
    codesets: CodeSetContext,
}

macro_rules! write_aligned {
    ($(#[$meta:meta])* $name:ident, $ty:ty, $size:expr, $write:ident) => {
        $(#[$meta])*
        pub fn $name(&mut self, value: $ty) -> Result<&mut Self> {
            self.align($size);
            let mut bytes = [0u8; $size];
            if self.little_endian {
                LittleEndian::$write(&mut bytes, value);
            } else {
                BigEndian::$write(&mut bytes, value);
            }
            self.buffer.extend_from_slice(&bytes);
            Ok(self)
        }
    };
}

impl CdrOutput {
    /// Create a stream at global position 0 using GIOP 1.2 rules and the
    /// default codesets.
    pub fn new(little_endian: bool) -> Self {
        Self {
            buffer: Vec::with_capacity(DEFAULT_CAPACITY),
            base: 0,
            origin: 0,
            little_endian,
            version: GiopVersion::V1_2,
            codesets: CodeSetContext::default(),
        }
    }

    /// Create a stream for a message body starting at global position `base`,
    /// aligned relative to the message start.
    pub fn for_message_body(base: usize, little_endian: bool) -> Self {
        Self {
            base,
            ..Self::new(little_endian)
        }
    }

    /// Create a standalone encapsulation; the byte order flag is written
    /// immediately.
    pub fn new_encapsulation(little_endian: bool) -> Self {
        let mut out = Self::new(little_endian);
        out.buffer.push(u8::from(little_endian));
        out
    }

    pub fn with_version(mut self, version: GiopVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_codesets(mut self, codesets: CodeSetContext) -> Self {
        self.codesets = codesets;
        self
    }

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

    /// Bytes written so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    /// Position relative to the start of the outermost message.
    #[inline]
    pub fn global_position(&self) -> usize {
        self.base + self.buffer.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn align(&mut self, size: usize) {
        let rel = self.global_position() - self.origin;
        let padding = (size - rel % size) % size;
        self.buffer.resize(self.buffer.len() + padding, 0);
    }

    /// Pad with zeros to the next multiple of `size`, relative to the origin.
    pub fn force_align(&mut self, size: usize) -> Result<&mut Self> {
        self.align(size);
        Ok(self)
    }

    /// Write `count` zero bytes.
    pub fn write_padding(&mut self, count: usize) -> Result<&mut Self> {
        self.buffer.resize(self.buffer.len() + count, 0);
        Ok(self)
    }

    pub fn write_octet(&mut self, value: u8) -> Result<&mut Self> {
        self.buffer.push(value);
        Ok(self)
    }

    pub fn write_bool(&mut self, value: bool) -> Result<&mut Self> {
        self.write_octet(u8::from(value))
    }

    write_aligned!(write_short, i16, 2, write_i16);
    write_aligned!(write_ushort, u16, 2, write_u16);
    write_aligned!(write_long, i32, 4, write_i32);
    write_aligned!(write_ulong, u32, 4, write_u32);
    write_aligned!(write_longlong, i64, 8, write_i64);
    write_aligned!(write_ulonglong, u64, 8, write_u64);
    write_aligned!(write_float, f32, 4, write_f32);
    write_aligned!(write_double, f64, 8, write_f64);

    /// Write raw bytes without alignment or length.
    pub fn write_opaque(&mut self, data: &[u8]) -> Result<&mut Self> {
        self.buffer.extend_from_slice(data);
        Ok(self)
    }

    /// Write a u32 length followed by the raw bytes.
    pub fn write_octet_sequence(&mut self, data: &[u8]) -> Result<&mut Self> {
        self.write_ulong(length_u32(data.len())?)?;
        self.write_opaque(data)
    }

    /// Write a narrow character; Latin-1 keeps only the low 8 bits.
    pub fn write_char(&mut self, value: char) -> Result<&mut Self> {
        let byte = self.codesets.char_set.encode_char(value)?;
        self.write_octet(byte)
    }

    /// Write a narrow string: u32 length including NUL, bytes, NUL.
    pub fn write_string(&mut self, value: &str) -> Result<&mut Self> {
        let bytes = self.codesets.char_set.encode_string(value)?;
        self.write_ulong(length_u32(bytes.len() + 1)?)?;
        self.buffer.extend_from_slice(&bytes);
        self.buffer.push(0);
        Ok(self)
    }

    /// Write a wide character.
    ///
    /// GIOP 1.2 prefixes the encoded bytes with an octet count; earlier
    /// versions write a bare 2-byte unit.
    pub fn write_wchar(&mut self, value: char) -> Result<&mut Self> {
        let set = self.codesets.require_wchar_set()?;
        let mut buf = [0u8; 4];
        let units = set.encode_units(value.encode_utf8(&mut buf))?;
        if self.version.is_1_2_or_later() {
            self.write_octet((units.len() * 2) as u8)?;
            self.write_units(&units);
        } else {
            if units.len() != 1 {
                return Err(CorbaError::data_conversion(minor::CHARACTER_NOT_REPRESENTABLE));
            }
            self.write_units(&units);
        }
        Ok(self)
    }

    /// Write a wide string.
    ///
    /// GIOP 1.2: u32 byte length, no terminator. GIOP 1.0/1.1: u32 unit count
    /// including a terminating zero unit.
    pub fn write_wstring(&mut self, value: &str) -> Result<&mut Self> {
        let set = self.codesets.require_wchar_set()?;
        let units = set.encode_units(value)?;
        if self.version.is_1_2_or_later() {
            self.write_ulong(length_u32(units.len() * 2)?)?;
            self.write_units(&units);
        } else {
            self.write_ulong(length_u32(units.len() + 1)?)?;
            self.write_units(&units);
            self.buffer.extend_from_slice(&[0, 0]);
        }
        Ok(self)
    }

    fn write_units(&mut self, units: &[u16]) {
        for &unit in units {
            let bytes = if self.little_endian {
                unit.to_le_bytes()
            } else {
                unit.to_be_bytes()
            };
            self.buffer.extend_from_slice(&bytes);
        }
    }

    /// Start an encapsulation to be written into this stream.
    ///
    /// The parent is padded for the length field first, so the child knows
    /// its global position. Nothing else may be written to the parent until
    /// the child is handed back through
    /// [`write_encapsulation`](Self::write_encapsulation).
    pub fn encapsulation_stream(&mut self) -> CdrOutput {
        self.align(4);
        let start = self.global_position() + 4;
        let mut child = CdrOutput {
            buffer: Vec::with_capacity(DEFAULT_CAPACITY),
            base: start,
            origin: start,
            little_endian: self.little_endian,
            version: self.version,
            codesets: self.codesets,
        };
        child.buffer.push(u8::from(self.little_endian));
        child
    }

    /// Write a finished encapsulation as u32 length plus bytes.
    pub fn write_encapsulation(&mut self, child: CdrOutput) -> Result<&mut Self> {
        self.write_octet_sequence(&child.buffer)
    }
}

fn length_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| CorbaError::marshal(minor::BOUND_VIOLATION, CompletionStatus::CompletedNo))
}

#[cfg(test)]
mod tests {
    use super::super::CdrInput;
    use super::*;
    use crate::encoding::cdr::codeset::{CharCodeSet, CodeSetContext};

    #[test]
    fn test_octet_then_long_pads_three_bytes() {
        let mut out = CdrOutput::new(false);
        out.write_octet(0xff).expect("octet");
        out.write_long(1).expect("long");
        assert_eq!(out.data(), &[0xff, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_endianness() {
        let mut be = CdrOutput::new(false);
        be.write_long(0x0102_0304).expect("long");
        assert_eq!(be.into_bytes(), vec![1, 2, 3, 4]);

        let mut le = CdrOutput::new(true);
        le.write_long(0x0102_0304).expect("long");
        assert_eq!(le.into_bytes(), vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_message_body_alignment() {
        let mut out = CdrOutput::for_message_body(12, false);
        out.write_octet(1).expect("octet");
        out.force_align(8).expect("align");
        // 13 -> 16
        assert_eq!(out.position(), 4);
        assert_eq!(out.global_position(), 16);
    }

    #[test]
    fn test_mixed_widths_are_aligned() {
        let mut out = CdrOutput::new(true);
        out.write_octet(1)
            .and_then(|o| o.write_short(2))
            .and_then(|o| o.write_octet(3))
            .and_then(|o| o.write_double(4.0))
            .and_then(|o| o.write_float(5.0))
            .expect("writes");
        let bytes = out.into_bytes();
        // octet@0, pad, short@2, octet@4, pad, double@8, float@16
        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[2..4], &2i16.to_le_bytes());
        assert_eq!(&bytes[8..16], &4.0f64.to_le_bytes());
        assert_eq!(&bytes[16..20], &5.0f32.to_le_bytes());
    }

    #[test]
    fn test_string_layout() {
        let mut out = CdrOutput::new(false);
        out.write_string("testuri").expect("string");
        let mut expected = vec![0, 0, 0, 8];
        expected.extend_from_slice(b"testuri\0");
        assert_eq!(out.into_bytes(), expected);
    }

    #[test]
    fn test_latin1_char_truncates() {
        let mut out = CdrOutput::new(false);
        out.write_char('\u{0142}').expect("char");
        assert_eq!(out.into_bytes(), vec![0x42]);

        let mut ascii = CdrOutput::new(false)
            .with_codesets(CodeSetContext::new(CharCodeSet::Iso646, None));
        assert!(ascii.write_char('é').is_err());
    }

    #[test]
    fn test_wstring_layouts() {
        let mut v12 = CdrOutput::new(false);
        v12.write_wstring("test").expect("wstring");
        assert_eq!(
            v12.into_bytes(),
            vec![0, 0, 0, 8, 0, 116, 0, 101, 0, 115, 0, 116]
        );

        let mut v11 = CdrOutput::new(false).with_version(GiopVersion::V1_1);
        v11.write_wstring("hi").expect("wstring");
        assert_eq!(v11.into_bytes(), vec![0, 0, 0, 3, 0, b'h', 0, b'i', 0, 0]);
    }

    #[test]
    fn test_wchar_layouts() {
        let mut v12 = CdrOutput::new(true);
        v12.write_wchar('A').expect("wchar");
        assert_eq!(v12.into_bytes(), vec![2, 0x41, 0]);

        let mut v10 = CdrOutput::new(false).with_version(GiopVersion::V1_0);
        v10.write_wchar('A').expect("wchar");
        assert_eq!(v10.into_bytes(), vec![0, 0x41]);

        let mut unset = CdrOutput::new(false).with_codesets(CodeSetContext::unnegotiated());
        assert_eq!(unset.write_wchar('A').unwrap_err().minor_code(), Some(987));
    }

    #[test]
    fn test_encapsulation_round_trip() {
        let mut out = CdrOutput::new(false);
        out.write_octet(7).expect("octet");
        let mut child = out.encapsulation_stream();
        child.write_ulong(42).expect("ulong");
        child.write_string("x").expect("string");
        out.write_encapsulation(child).expect("encapsulation");
        out.write_octet(8).expect("octet");

        let bytes = out.into_bytes();
        // flag + 3 pad + u32 + u32 len + "x\0"
        assert_eq!(&bytes[4..8], &[0, 0, 0, 14]);
        assert_eq!(bytes[8], 0);

        let mut input = CdrInput::new(&bytes, false);
        assert_eq!(input.read_octet().expect("octet"), 7);
        let mut inner = input.read_encapsulation().expect("encapsulation");
        assert_eq!(inner.read_ulong().expect("ulong"), 42);
        assert_eq!(inner.read_string().expect("string"), "x");
        assert_eq!(input.read_octet().expect("octet"), 8);
        assert!(input.is_at_end());
    }

    #[test]
    fn test_padding_is_zero() {
        let mut out = CdrOutput::new(false);
        out.write_octet(0xff).expect("octet");
        out.write_ulonglong(u64::MAX).expect("ulonglong");
        assert!(out.data()[1..8].iter().all(|&b| b == 0));
    }
}
