// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Character codesets for narrow and wide characters.
//!
//! Narrow characters are single octets. Latin-1 truncates anything above
//! code point 255 on write, UTF-8 and ISO-646 reject what they cannot
//! represent. Wide characters are 2-byte code units in stream byte order.

use serde::{Deserialize, Serialize};

use crate::core::{minor, CompletionStatus, CorbaError, Result, SystemExceptionKind};

/// ISO 8859-1 (Latin-1).
pub const LATIN1: u32 = 0x0001_0001;
/// ISO 646 (ASCII).
pub const ISO646: u32 = 0x0001_0020;
/// X/Open UTF-8.
pub const UTF8: u32 = 0x0501_0001;
/// ISO/IEC 10646-1 UCS-2 level 1.
pub const UCS2_LEVEL1: u32 = 0x0001_0100;
/// ISO/IEC 10646-1 UTF-16.
pub const UTF16: u32 = 0x0001_0109;

/// Narrow character codeset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharCodeSet {
    Latin1,
    Utf8,
    Iso646,
}

impl CharCodeSet {
    /// Registered OSF codeset id.
    pub const fn id(self) -> u32 {
        match self {
            CharCodeSet::Latin1 => LATIN1,
            CharCodeSet::Utf8 => UTF8,
            CharCodeSet::Iso646 => ISO646,
        }
    }

    pub const fn from_id(id: u32) -> Option<Self> {
        match id {
            LATIN1 => Some(CharCodeSet::Latin1),
            UTF8 => Some(CharCodeSet::Utf8),
            ISO646 => Some(CharCodeSet::Iso646),
            _ => None,
        }
    }

    /// Encode a single narrow character.
    pub fn encode_char(self, c: char) -> Result<u8> {
        let code = u32::from(c);
        match self {
            // lossy on purpose: only the low 8 bits travel
            CharCodeSet::Latin1 => Ok((code & 0xff) as u8),
            CharCodeSet::Utf8 | CharCodeSet::Iso646 if code < 0x80 => Ok(code as u8),
            _ => Err(not_representable()),
        }
    }

    pub fn decode_char(self, byte: u8) -> Result<char> {
        match self {
            CharCodeSet::Latin1 => Ok(char::from(byte)),
            _ if byte < 0x80 => Ok(char::from(byte)),
            _ => Err(not_representable()),
        }
    }

    /// Encode the content of a narrow string (without terminator).
    pub fn encode_string(self, s: &str) -> Result<Vec<u8>> {
        match self {
            CharCodeSet::Latin1 => Ok(s.chars().map(|c| (u32::from(c) & 0xff) as u8).collect()),
            CharCodeSet::Utf8 => Ok(s.as_bytes().to_vec()),
            CharCodeSet::Iso646 => {
                if s.is_ascii() {
                    Ok(s.as_bytes().to_vec())
                } else {
                    Err(not_representable())
                }
            }
        }
    }

    pub fn decode_string(self, bytes: &[u8]) -> Result<String> {
        match self {
            CharCodeSet::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            CharCodeSet::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|_| not_representable()),
            CharCodeSet::Iso646 => {
                if bytes.is_ascii() {
                    Ok(bytes.iter().map(|&b| char::from(b)).collect())
                } else {
                    Err(not_representable())
                }
            }
        }
    }
}

/// Wide character codeset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WCharCodeSet {
    Utf16,
    Ucs2,
}

impl WCharCodeSet {
    pub const fn id(self) -> u32 {
        match self {
            WCharCodeSet::Utf16 => UTF16,
            WCharCodeSet::Ucs2 => UCS2_LEVEL1,
        }
    }

    pub const fn from_id(id: u32) -> Option<Self> {
        match id {
            UTF16 => Some(WCharCodeSet::Utf16),
            UCS2_LEVEL1 => Some(WCharCodeSet::Ucs2),
            _ => None,
        }
    }

    /// Encode to 2-byte code units.
    pub fn encode_units(self, s: &str) -> Result<Vec<u16>> {
        match self {
            WCharCodeSet::Utf16 => Ok(s.encode_utf16().collect()),
            WCharCodeSet::Ucs2 => s
                .chars()
                .map(|c| u16::try_from(u32::from(c)).map_err(|_| not_representable()))
                .collect(),
        }
    }

    pub fn decode_units(self, units: &[u16]) -> Result<String> {
        match self {
            WCharCodeSet::Utf16 => String::from_utf16(units).map_err(|_| not_representable()),
            WCharCodeSet::Ucs2 => units
                .iter()
                .map(|&u| char::from_u32(u32::from(u)).ok_or_else(not_representable))
                .collect(),
        }
    }
}

/// The character codesets in effect for a stream.
///
/// A missing wide codeset means none was negotiated; wide character
/// operations then fail with BAD_PARAM 987.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSetContext {
    pub char_set: CharCodeSet,
    pub wchar_set: Option<WCharCodeSet>,
}

impl Default for CodeSetContext {
    fn default() -> Self {
        Self {
            char_set: CharCodeSet::Latin1,
            wchar_set: Some(WCharCodeSet::Utf16),
        }
    }
}

impl CodeSetContext {
    pub fn new(char_set: CharCodeSet, wchar_set: Option<WCharCodeSet>) -> Self {
        Self {
            char_set,
            wchar_set,
        }
    }

    /// Context used before negotiation has happened (GIOP 1.0 rules).
    pub fn unnegotiated() -> Self {
        Self {
            char_set: CharCodeSet::Latin1,
            wchar_set: None,
        }
    }

    /// Build a context from negotiated codeset ids.
    pub fn from_ids(char_id: u32, wchar_id: u32) -> Result<Self> {
        let char_set = CharCodeSet::from_id(char_id).ok_or_else(|| {
            CorbaError::system(
                SystemExceptionKind::CodesetIncompatible,
                minor::CHAR_CODESET_INCOMPATIBLE,
                CompletionStatus::CompletedNo,
            )
        })?;
        let wchar_set = WCharCodeSet::from_id(wchar_id).ok_or_else(|| {
            CorbaError::system(
                SystemExceptionKind::CodesetIncompatible,
                minor::WCHAR_CODESET_INCOMPATIBLE,
                CompletionStatus::CompletedNo,
            )
        })?;
        Ok(Self::new(char_set, Some(wchar_set)))
    }

    /// The negotiated wide codeset or BAD_PARAM 987.
    pub fn require_wchar_set(&self) -> Result<WCharCodeSet> {
        self.wchar_set.ok_or_else(|| {
            CorbaError::bad_param(
                minor::WCHAR_SET_NOT_NEGOTIATED,
                CompletionStatus::CompletedNo,
            )
        })
    }
}

fn not_representable() -> CorbaError {
    CorbaError::data_conversion(minor::CHARACTER_NOT_REPRESENTABLE)
}
