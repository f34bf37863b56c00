// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! GIOP message header.
//!
//! Every GIOP message starts with a fixed 12 byte header:
//!
//! ```text
//! 0      4      5      6      7      8              12
//! +------+------+------+------+------+--------------+
//! | GIOP | major| minor| flags| type | body length  |
//! +------+------+------+------+------+--------------+
//! ```
//!
//! The body length is encoded in the byte order given by flag bit 0.

use std::fmt;
use std::io::Cursor;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::core::{minor, CompletionStatus, CorbaError, GiopVersion, Result};

/// Magic bytes opening every message.
pub const GIOP_MAGIC: [u8; 4] = *b"GIOP";

/// Size of the fixed header.
pub const HEADER_LEN: usize = 12;

/// Flag bit: the message is little-endian.
pub const FLAG_LITTLE_ENDIAN: u8 = 0x01;

/// Flag bit: more fragments follow.
pub const FLAG_FRAGMENT: u8 = 0x02;

/// GIOP message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    Request = 0,
    Reply = 1,
    CancelRequest = 2,
    LocateRequest = 3,
    LocateReply = 4,
    CloseConnection = 5,
    MessageError = 6,
    Fragment = 7,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => MessageType::Request,
            1 => MessageType::Reply,
            2 => MessageType::CancelRequest,
            3 => MessageType::LocateRequest,
            4 => MessageType::LocateReply,
            5 => MessageType::CloseConnection,
            6 => MessageType::MessageError,
            7 => MessageType::Fragment,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            MessageType::Request => "Request",
            MessageType::Reply => "Reply",
            MessageType::CancelRequest => "CancelRequest",
            MessageType::LocateRequest => "LocateRequest",
            MessageType::LocateReply => "LocateReply",
            MessageType::CloseConnection => "CloseConnection",
            MessageType::MessageError => "MessageError",
            MessageType::Fragment => "Fragment",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded GIOP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiopHeader {
    pub version: GiopVersion,
    pub little_endian: bool,
    /// Fragment bit; more fragments of this message follow
    pub fragment: bool,
    pub message_type: MessageType,
    pub body_length: u32,
}

impl GiopHeader {
    pub fn new(version: GiopVersion, message_type: MessageType, little_endian: bool, body_length: u32) -> Self {
        Self {
            version,
            little_endian,
            fragment: false,
            message_type,
            body_length,
        }
    }

    /// Flags octet; GIOP 1.0 only knows the byte order bit.
    pub fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.little_endian {
            flags |= FLAG_LITTLE_ENDIAN;
        }
        if self.fragment && !self.version.is_1_0() {
            flags |= FLAG_FRAGMENT;
        }
        flags
    }

    /// Parse the first [`HEADER_LEN`] bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(CorbaError::end_of_stream());
        }
        if bytes[0..4] != GIOP_MAGIC {
            return Err(CorbaError::marshal(minor::BAD_MAGIC, CompletionStatus::CompletedNo));
        }
        let version = GiopVersion::new(bytes[4], bytes[5]);
        if version.major != 1 {
            return Err(CorbaError::marshal(
                minor::UNSUPPORTED_GIOP_VERSION,
                CompletionStatus::CompletedNo,
            ));
        }
        let flags = bytes[6];
        let message_type = MessageType::from_u8(bytes[7])
            .ok_or_else(|| CorbaError::marshal(minor::UNKNOWN_MESSAGE_TYPE, CompletionStatus::CompletedNo))?;
        let little_endian = flags & FLAG_LITTLE_ENDIAN != 0;
        let mut cursor = Cursor::new(&bytes[8..HEADER_LEN]);
        let body_length = if little_endian {
            cursor.read_u32::<LittleEndian>()?
        } else {
            cursor.read_u32::<BigEndian>()?
        };
        Ok(Self {
            version,
            little_endian,
            fragment: flags & FLAG_FRAGMENT != 0,
            message_type,
            body_length,
        })
    }

    /// Encode the header.
    pub fn to_bytes(&self) -> Result<[u8; HEADER_LEN]> {
        let mut bytes = Vec::with_capacity(HEADER_LEN);
        bytes.extend_from_slice(&GIOP_MAGIC);
        bytes.push(self.version.major);
        bytes.push(self.version.minor);
        bytes.push(self.flags());
        bytes.push(self.message_type.as_u8());
        if self.little_endian {
            bytes.write_u32::<LittleEndian>(self.body_length)?;
        } else {
            bytes.write_u32::<BigEndian>(self.body_length)?;
        }
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&bytes);
        Ok(header)
    }
}

impl fmt::Display for GiopHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GIOP {} {} ({} endian{}, {} body bytes)",
            self.version,
            self.message_type,
            if self.little_endian { "little" } else { "big" },
            if self.fragment { ", fragment" } else { "" },
            self.body_length
        )
    }
}
