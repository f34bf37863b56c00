// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! GIOP message framing and per-message headers.
//!
//! The header layouts depend on the GIOP version: up to 1.1 the service
//! contexts lead a request or reply header, from 1.2 on they follow the
//! target and operation (requests) or the status (replies), and the
//! message body is aligned to 8 bytes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::header::{GiopHeader, MessageType, HEADER_LEN};
use super::service_context::ServiceContextList;
use crate::core::{minor, CompletionStatus, CorbaError, GiopVersion, Result, SystemException};
use crate::encoding::cdr::{CdrInput, CdrOutput};
use crate::ior::Ior;
use crate::marshal::{read_system_exception, write_system_exception};

/// Addressing disposition selecting the object key arm of a 1.2 target.
pub const KEY_ADDR: u16 = 0;

/// A complete message: header plus body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiopMessage {
    pub header: GiopHeader,
    pub body: Vec<u8>,
}

impl GiopMessage {
    pub fn new(version: GiopVersion, message_type: MessageType, little_endian: bool, body: Vec<u8>) -> Result<Self> {
        let body_length = u32::try_from(body.len())
            .map_err(|_| CorbaError::marshal(minor::MESSAGE_TOO_LARGE, CompletionStatus::CompletedNo))?;
        Ok(Self {
            header: GiopHeader::new(version, message_type, little_endian, body_length),
            body,
        })
    }

    /// A message without body (CloseConnection, MessageError).
    pub fn header_only(version: GiopVersion, message_type: MessageType) -> Self {
        Self {
            header: GiopHeader::new(version, message_type, false, 0),
            body: Vec::new(),
        }
    }

    /// Output stream for a body; alignment is relative to the message start.
    pub fn body_output(version: GiopVersion, little_endian: bool) -> CdrOutput {
        CdrOutput::for_message_body(HEADER_LEN, little_endian).with_version(version)
    }

    /// Input stream over the body.
    pub fn body_input(&self) -> CdrInput<'_> {
        CdrInput::for_message_body(&self.body, HEADER_LEN, self.header.little_endian)
            .with_version(self.header.version)
    }

    pub fn message_type(&self) -> MessageType {
        self.header.message_type
    }

    pub fn version(&self) -> GiopVersion {
        self.header.version
    }

    /// Parse a whole message; trailing bytes after the body are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = GiopHeader::parse(bytes)?;
        let end = HEADER_LEN + header.body_length as usize;
        if bytes.len() < end {
            return Err(CorbaError::end_of_stream());
        }
        Ok(Self {
            header,
            body: bytes[HEADER_LEN..end].to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.body.len());
        bytes.extend_from_slice(&self.header.to_bytes()?);
        bytes.extend_from_slice(&self.body);
        Ok(bytes)
    }

    /// Decode the per-message header without touching the payload.
    pub fn details(&self) -> Result<MessageDetails> {
        let mut input = self.body_input();
        let version = self.header.version;
        Ok(match self.header.message_type {
            MessageType::Request => MessageDetails::Request(RequestHeader::read(&mut input, version)?),
            MessageType::Reply => MessageDetails::Reply(ReplyHeader::read(&mut input, version)?),
            MessageType::CancelRequest => MessageDetails::CancelRequest(CancelRequest::read(&mut input)?),
            MessageType::LocateRequest => MessageDetails::LocateRequest(LocateRequest::read(&mut input, version)?),
            MessageType::LocateReply => MessageDetails::LocateReply(LocateReply::read(&mut input, version)?),
            MessageType::CloseConnection | MessageType::MessageError | MessageType::Fragment => {
                MessageDetails::None
            }
        })
    }
}

/// Decoded per-message header, for inspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum MessageDetails {
    Request(RequestHeader),
    Reply(ReplyHeader),
    CancelRequest(CancelRequest),
    LocateRequest(LocateRequest),
    LocateReply(LocateReply),
    None,
}

/// Response flags for a request.
///
/// One-way calls send 0; otherwise 1 up to GIOP 1.1 and 3 from 1.2 on.
pub fn response_flags(one_way: bool, version: GiopVersion) -> u8 {
    if one_way {
        0
    } else if version.is_1_2_or_later() {
        3
    } else {
        1
    }
}

fn write_target(object_key: &[u8], version: GiopVersion, out: &mut CdrOutput) -> Result<()> {
    if version.is_1_2_or_later() {
        out.write_ushort(KEY_ADDR)?;
    }
    out.write_octet_sequence(object_key)?;
    Ok(())
}

fn read_target(input: &mut CdrInput<'_>, version: GiopVersion) -> Result<Vec<u8>> {
    if version.is_1_2_or_later() {
        let disposition = input.read_ushort()?;
        if disposition != KEY_ADDR {
            return Err(CorbaError::bad_param(
                minor::UNSUPPORTED_ADDRESSING,
                CompletionStatus::CompletedNo,
            ));
        }
    }
    Ok(input.read_octet_sequence()?.to_vec())
}

/// Request header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    pub request_id: u32,
    pub response_flags: u8,
    #[serde(with = "super::hex_bytes")]
    pub object_key: Vec<u8>,
    pub operation: String,
    pub service_contexts: ServiceContextList,
}

impl RequestHeader {
    pub fn new(request_id: u32, object_key: Vec<u8>, operation: impl Into<String>, response_flags: u8) -> Self {
        Self {
            request_id,
            response_flags,
            object_key,
            operation: operation.into(),
            service_contexts: ServiceContextList::new(),
        }
    }

    pub fn response_expected(&self) -> bool {
        self.response_flags & 0x01 != 0
    }

    /// Write the header; the body alignment is left to the caller.
    pub fn write(&self, out: &mut CdrOutput, version: GiopVersion) -> Result<()> {
        if !version.is_1_2_or_later() {
            self.service_contexts.write(out)?;
        }
        out.write_ulong(self.request_id)?;
        out.write_octet(self.response_flags)?;
        out.write_padding(3)?;
        write_target(&self.object_key, version, out)?;
        out.write_string(&self.operation)?;
        if version.is_1_2_or_later() {
            self.service_contexts.write(out)?;
        } else {
            // empty principal
            out.write_ulong(0)?;
        }
        Ok(())
    }

    pub fn read(input: &mut CdrInput<'_>, version: GiopVersion) -> Result<Self> {
        Self::read_with_id(input, version, &mut None)
    }

    /// Read the header, recording the request id in `request_id` as soon as
    /// it is known so a failure later on can still be answered.
    pub fn read_with_id(input: &mut CdrInput<'_>, version: GiopVersion, request_id: &mut Option<u32>) -> Result<Self> {
        let mut service_contexts = if version.is_1_2_or_later() {
            ServiceContextList::new()
        } else {
            ServiceContextList::read(input)?
        };
        let id = input.read_ulong()?;
        *request_id = Some(id);
        let response_flags = input.read_octet()?;
        input.skip(3)?;
        let object_key = read_target(input, version)?;
        let operation = input.read_string()?;
        if version.is_1_2_or_later() {
            service_contexts = ServiceContextList::read(input)?;
        } else {
            let principal_len = input.read_ulong()? as usize;
            input.skip(principal_len)?;
        }
        debug!(request_id = id, operation = %operation, version = %version, "request header read");
        Ok(Self {
            request_id: id,
            response_flags,
            object_key,
            operation,
            service_contexts,
        })
    }
}

/// Reply status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplyStatus {
    NoException,
    UserException,
    SystemException,
    LocationForward,
    LocationForwardPerm,
    NeedsAddressingMode,
}

impl ReplyStatus {
    pub fn as_u32(self) -> u32 {
        match self {
            ReplyStatus::NoException => 0,
            ReplyStatus::UserException => 1,
            ReplyStatus::SystemException => 2,
            ReplyStatus::LocationForward => 3,
            ReplyStatus::LocationForwardPerm => 4,
            ReplyStatus::NeedsAddressingMode => 5,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => ReplyStatus::NoException,
            1 => ReplyStatus::UserException,
            2 => ReplyStatus::SystemException,
            3 => ReplyStatus::LocationForward,
            4 => ReplyStatus::LocationForwardPerm,
            5 => ReplyStatus::NeedsAddressingMode,
            _ => return None,
        })
    }
}

fn unsupported_reply_status() -> CorbaError {
    CorbaError::marshal(minor::UNSUPPORTED_REPLY_STATUS, CompletionStatus::CompletedMayBe)
}

/// Reply header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyHeader {
    pub request_id: u32,
    pub status: ReplyStatus,
    pub service_contexts: ServiceContextList,
}

impl ReplyHeader {
    pub fn new(request_id: u32, status: ReplyStatus) -> Self {
        Self {
            request_id,
            status,
            service_contexts: ServiceContextList::new(),
        }
    }

    pub fn write(&self, out: &mut CdrOutput, version: GiopVersion) -> Result<()> {
        if !version.is_1_2_or_later() {
            self.service_contexts.write(out)?;
        }
        out.write_ulong(self.request_id)?;
        out.write_ulong(self.status.as_u32())?;
        if version.is_1_2_or_later() {
            self.service_contexts.write(out)?;
        }
        Ok(())
    }

    /// Read the header. Statuses outside 0..=5 fail with MARSHAL 2401.
    pub fn read(input: &mut CdrInput<'_>, version: GiopVersion) -> Result<Self> {
        let mut service_contexts = if version.is_1_2_or_later() {
            ServiceContextList::new()
        } else {
            ServiceContextList::read(input)?
        };
        let request_id = input.read_ulong()?;
        let status = ReplyStatus::from_u32(input.read_ulong()?).ok_or_else(unsupported_reply_status)?;
        if version.is_1_2_or_later() {
            service_contexts = ServiceContextList::read(input)?;
        }
        debug!(request_id, status = ?status, version = %version, "reply header read");
        Ok(Self {
            request_id,
            status,
            service_contexts,
        })
    }
}

/// CancelRequest body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRequest {
    pub request_id: u32,
}

impl CancelRequest {
    pub fn write(&self, out: &mut CdrOutput) -> Result<()> {
        out.write_ulong(self.request_id)?;
        Ok(())
    }

    pub fn read(input: &mut CdrInput<'_>) -> Result<Self> {
        Ok(Self {
            request_id: input.read_ulong()?,
        })
    }
}

/// LocateRequest body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocateRequest {
    pub request_id: u32,
    #[serde(with = "super::hex_bytes")]
    pub object_key: Vec<u8>,
}

impl LocateRequest {
    pub fn write(&self, out: &mut CdrOutput, version: GiopVersion) -> Result<()> {
        out.write_ulong(self.request_id)?;
        write_target(&self.object_key, version, out)
    }

    pub fn read(input: &mut CdrInput<'_>, version: GiopVersion) -> Result<Self> {
        let request_id = input.read_ulong()?;
        let object_key = read_target(input, version)?;
        Ok(Self {
            request_id,
            object_key,
        })
    }
}

/// Locate reply statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocateStatus {
    UnknownObject,
    ObjectHere,
    ObjectForward,
    ObjectForwardPerm,
    LocSystemException,
    LocNeedsAddressingMode,
}

impl LocateStatus {
    pub fn as_u32(self) -> u32 {
        match self {
            LocateStatus::UnknownObject => 0,
            LocateStatus::ObjectHere => 1,
            LocateStatus::ObjectForward => 2,
            LocateStatus::ObjectForwardPerm => 3,
            LocateStatus::LocSystemException => 4,
            LocateStatus::LocNeedsAddressingMode => 5,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => LocateStatus::UnknownObject,
            1 => LocateStatus::ObjectHere,
            2 => LocateStatus::ObjectForward,
            3 => LocateStatus::ObjectForwardPerm,
            4 => LocateStatus::LocSystemException,
            5 => LocateStatus::LocNeedsAddressingMode,
            _ => return None,
        })
    }
}

/// LocateReply body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocateReply {
    pub request_id: u32,
    pub status: LocateStatus,
    /// Target of OBJECT_FORWARD and OBJECT_FORWARD_PERM
    pub forward: Option<Ior>,
    /// Payload of LOC_SYSTEM_EXCEPTION
    pub system_exception: Option<SystemException>,
    /// Payload of LOC_NEEDS_ADDRESSING_MODE
    pub addressing_mode: Option<u16>,
}

impl LocateReply {
    pub fn new(request_id: u32, status: LocateStatus) -> Self {
        Self {
            request_id,
            status,
            forward: None,
            system_exception: None,
            addressing_mode: None,
        }
    }

    pub fn forward(request_id: u32, target: Ior, permanent: bool) -> Self {
        let status = if permanent {
            LocateStatus::ObjectForwardPerm
        } else {
            LocateStatus::ObjectForward
        };
        Self {
            forward: Some(target),
            ..Self::new(request_id, status)
        }
    }

    fn has_body(&self) -> bool {
        !matches!(self.status, LocateStatus::UnknownObject | LocateStatus::ObjectHere)
    }

    pub fn write(&self, out: &mut CdrOutput, version: GiopVersion) -> Result<()> {
        out.write_ulong(self.request_id)?;
        out.write_ulong(self.status.as_u32())?;
        if !self.has_body() {
            return Ok(());
        }
        if version.is_1_2_or_later() {
            out.force_align(8)?;
        }
        match self.status {
            LocateStatus::ObjectForward | LocateStatus::ObjectForwardPerm => {
                self.forward.as_ref().unwrap_or(&Ior::null()).write(out)?;
            }
            LocateStatus::LocSystemException => {
                let ex = self.system_exception.clone().unwrap_or_else(|| {
                    SystemException::new(
                        crate::core::SystemExceptionKind::Unknown,
                        0,
                        CompletionStatus::CompletedMayBe,
                    )
                });
                write_system_exception(&ex, out)?;
            }
            LocateStatus::LocNeedsAddressingMode => {
                out.write_ushort(self.addressing_mode.unwrap_or(KEY_ADDR))?;
            }
            LocateStatus::UnknownObject | LocateStatus::ObjectHere => {}
        }
        Ok(())
    }

    pub fn read(input: &mut CdrInput<'_>, version: GiopVersion) -> Result<Self> {
        let request_id = input.read_ulong()?;
        let status = LocateStatus::from_u32(input.read_ulong()?).ok_or_else(unsupported_reply_status)?;
        let mut reply = Self::new(request_id, status);
        if !reply.has_body() {
            return Ok(reply);
        }
        if version.is_1_2_or_later() {
            input.align(8)?;
        }
        match status {
            LocateStatus::ObjectForward | LocateStatus::ObjectForwardPerm => {
                reply.forward = Some(Ior::read(input)?);
            }
            LocateStatus::LocSystemException => {
                reply.system_exception = Some(read_system_exception(input)?);
            }
            LocateStatus::LocNeedsAddressingMode => {
                reply.addressing_mode = Some(input.read_ushort()?);
            }
            LocateStatus::UnknownObject | LocateStatus::ObjectHere => {}
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SystemExceptionKind;
    use crate::giop::service_context::ServiceContext;

    fn request() -> RequestHeader {
        let mut header = RequestHeader::new(5, b"key".to_vec(), "op", 3);
        header
            .service_contexts
            .insert(ServiceContext::new(9, vec![0xaa]));
        header
    }

    #[test]
    fn test_response_flags() {
        assert_eq!(response_flags(false, GiopVersion::V1_2), 3);
        assert_eq!(response_flags(false, GiopVersion::V1_1), 1);
        assert_eq!(response_flags(false, GiopVersion::V1_0), 1);
        assert_eq!(response_flags(true, GiopVersion::V1_2), 0);
    }

    #[test]
    fn test_request_layout_1_1() {
        let mut out = CdrOutput::new(false);
        request().write(&mut out, GiopVersion::V1_1).expect("write");
        let bytes = out.into_bytes();
        // contexts lead: count 1, id 9, one byte
        assert_eq!(&bytes[0..13], &[0, 0, 0, 1, 0, 0, 0, 9, 0, 0, 0, 1, 0xaa]);
        // request id after padding to 16
        assert_eq!(&bytes[16..20], &[0, 0, 0, 5]);
        assert_eq!(bytes[20], 3);
        let back = RequestHeader::read(&mut CdrInput::new(&bytes, false), GiopVersion::V1_1).expect("read");
        assert_eq!(back, request());
    }

    #[test]
    fn test_request_layout_1_2() {
        let mut out = CdrOutput::new(false);
        request().write(&mut out, GiopVersion::V1_2).expect("write");
        let bytes = out.into_bytes();
        assert_eq!(&bytes[0..8], &[0, 0, 0, 5, 3, 0, 0, 0]);
        // KeyAddr disposition, padding, key
        assert_eq!(&bytes[8..19], &[0, 0, 0, 0, 0, 0, 0, 3, b'k', b'e', b'y']);
        let back = RequestHeader::read(&mut CdrInput::new(&bytes, false), GiopVersion::V1_2).expect("read");
        assert_eq!(back, request());
    }

    #[test]
    fn test_unsupported_disposition() {
        let bytes = [0, 0, 0, 1, 3, 0, 0, 0, 0, 1, 0, 0];
        let mut id = None;
        let err = RequestHeader::read_with_id(&mut CdrInput::new(&bytes, false), GiopVersion::V1_2, &mut id)
            .unwrap_err();
        assert!(err.is_system(SystemExceptionKind::BadParam));
        assert_eq!(err.minor_code(), Some(650));
        assert_eq!(id, Some(1));
    }

    #[test]
    fn test_reply_header_both_layouts() {
        let mut header = ReplyHeader::new(7, ReplyStatus::SystemException);
        header.service_contexts.insert(ServiceContext::new(3, vec![]));
        for version in [GiopVersion::V1_0, GiopVersion::V1_2] {
            let mut out = CdrOutput::new(true);
            header.write(&mut out, version).expect("write");
            let bytes = out.into_bytes();
            let back = ReplyHeader::read(&mut CdrInput::new(&bytes, true), version).expect("read");
            assert_eq!(back, header);
        }
    }

    #[test]
    fn test_unknown_reply_status() {
        let bytes = [0, 0, 0, 1, 0, 0, 0, 9, 0, 0, 0, 0];
        let err = ReplyHeader::read(&mut CdrInput::new(&bytes, false), GiopVersion::V1_2).unwrap_err();
        assert_eq!(err.minor_code(), Some(2401));
        assert_eq!(err.completion_status(), Some(CompletionStatus::CompletedMayBe));
    }

    #[test]
    fn test_locate_round_trip() {
        let request = LocateRequest {
            request_id: 2,
            object_key: vec![1, 2],
        };
        let mut out = CdrOutput::new(false);
        request.write(&mut out, GiopVersion::V1_2).expect("write");
        let bytes = out.into_bytes();
        assert_eq!(
            LocateRequest::read(&mut CdrInput::new(&bytes, false), GiopVersion::V1_2).expect("read"),
            request
        );

        let target = Ior::from_iiop("IDL:X:1.0", "elsewhere", 1234, GiopVersion::V1_2, vec![4]);
        let reply = LocateReply::forward(2, target, false);
        let mut out = CdrOutput::for_message_body(HEADER_LEN, false);
        reply.write(&mut out, GiopVersion::V1_2).expect("write");
        let bytes = out.into_bytes();
        let back = LocateReply::read(&mut CdrInput::for_message_body(&bytes, HEADER_LEN, false), GiopVersion::V1_2)
            .expect("read");
        assert_eq!(back, reply);
    }

    #[test]
    fn test_message_framing() {
        let mut out = GiopMessage::body_output(GiopVersion::V1_2, false);
        CancelRequest { request_id: 11 }.write(&mut out).expect("write");
        let message = GiopMessage::new(GiopVersion::V1_2, MessageType::CancelRequest, false, out.into_bytes())
            .expect("message");
        let bytes = message.to_bytes().expect("encode");
        assert_eq!(bytes.len(), HEADER_LEN + 4);
        let back = GiopMessage::from_bytes(&bytes).expect("decode");
        assert_eq!(back, message);
        assert_eq!(
            back.details().expect("details"),
            MessageDetails::CancelRequest(CancelRequest { request_id: 11 })
        );

        let err = GiopMessage::from_bytes(&bytes[..HEADER_LEN + 2]).unwrap_err();
        assert_eq!(err.minor_code(), Some(1207));
    }
}
