// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Request and reply message bodies.
//!
//! [`MessageBodySerializer`] combines the version dependent headers from
//! [`message`](super::message) with argument and result marshalling through
//! the [`Marshaller`]. From GIOP 1.2 on, the argument or result part of a
//! body starts on an 8 byte boundary.
//!
//! Request parsing never leaves a half-read body behind: on any failure the
//! rest of the body is skipped and the request id, if it was read, is
//! reported with the error so the caller can still answer.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::dispatch::{DispatchResolver, DispatchTarget, OperationSignature};
use super::header::MessageType;
use super::message::{GiopMessage, ReplyHeader, ReplyStatus, RequestHeader};
use super::service_context::ServiceContextList;
use crate::core::{
    minor, CompletionStatus, CorbaError, GiopVersion, Result, SystemException, SystemExceptionKind,
    UserException, Value,
};
use crate::encoding::cdr::{CdrInput, CdrOutput, CodeSetContext};
use crate::ior::codeset::check_codesets_compatible;
use crate::ior::Ior;
use crate::marshal::{read_system_exception, write_system_exception, Marshaller, ValueSession};

/// Stream settings for building a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSettings {
    pub version: GiopVersion,
    pub little_endian: bool,
    pub codesets: CodeSetContext,
}

impl MessageSettings {
    pub fn new(version: GiopVersion, little_endian: bool, codesets: CodeSetContext) -> Self {
        Self {
            version,
            little_endian,
            codesets,
        }
    }

    /// Body stream for a message with these settings.
    pub fn body_output(&self) -> CdrOutput {
        let mut out = GiopMessage::body_output(self.version, self.little_endian);
        out.set_codesets(self.codesets, self.version);
        out
    }
}

impl Default for MessageSettings {
    fn default() -> Self {
        Self::new(GiopVersion::V1_2, false, CodeSetContext::default())
    }
}

/// A request decoded on the server side.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    pub header: RequestHeader,
    pub target: DispatchTarget,
    /// Values of the `in` and `inout` parameters, in declaration order
    pub args: Vec<Value>,
    /// Codesets in effect for this request
    pub codesets: CodeSetContext,
}

/// A request that could not be decoded.
///
/// The body was skipped. With a request id the failure can be answered
/// with a system exception reply; without one only closing the connection
/// keeps the stream consistent.
#[derive(Debug, Clone)]
pub struct RequestParseFailure {
    pub request_id: Option<u32>,
    pub error: CorbaError,
}

impl fmt::Display for RequestParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.request_id {
            Some(id) => write!(f, "request {id} could not be decoded: {}", self.error),
            None => write!(f, "request could not be decoded: {}", self.error),
        }
    }
}

impl std::error::Error for RequestParseFailure {}

impl From<RequestParseFailure> for CorbaError {
    fn from(failure: RequestParseFailure) -> Self {
        failure.error
    }
}

/// Payload of a reply being built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ReplyBody {
    Normal { result: Value, out_args: Vec<Value> },
    UserException(UserException),
    SystemException(SystemException),
    LocationForward(Ior),
    LocationForwardPerm(Ior),
}

impl ReplyBody {
    /// Normal reply without out arguments.
    pub fn result(value: Value) -> Self {
        ReplyBody::Normal {
            result: value,
            out_args: Vec::new(),
        }
    }

    pub fn status(&self) -> ReplyStatus {
        match self {
            ReplyBody::Normal { .. } => ReplyStatus::NoException,
            ReplyBody::UserException(_) => ReplyStatus::UserException,
            ReplyBody::SystemException(_) => ReplyStatus::SystemException,
            ReplyBody::LocationForward(_) => ReplyStatus::LocationForward,
            ReplyBody::LocationForwardPerm(_) => ReplyStatus::LocationForwardPerm,
        }
    }
}

/// Successful outcome of a decoded reply.
///
/// Exceptions are not outcomes: they come back as `Err` with
/// [`CorbaError::User`] or [`CorbaError::System`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ReplyOutcome {
    Normal { result: Value, out_args: Vec<Value> },
    LocationForward(Ior),
    LocationForwardPerm(Ior),
}

impl ReplyOutcome {
    /// The result value of a normal reply.
    pub fn result(&self) -> Option<&Value> {
        match self {
            ReplyOutcome::Normal { result, .. } => Some(result),
            _ => None,
        }
    }
}

fn argument_count_mismatch() -> CorbaError {
    CorbaError::bad_param(minor::VALUE_TYPE_MISMATCH, CompletionStatus::CompletedNo)
}

fn align_body(out: &mut CdrOutput) -> Result<()> {
    if out.version().is_1_2_or_later() {
        out.force_align(8)?;
    }
    Ok(())
}

/// Serializes and deserializes request and reply bodies.
pub struct MessageBodySerializer {
    marshaller: Arc<Marshaller>,
}

impl MessageBodySerializer {
    pub fn new(marshaller: Arc<Marshaller>) -> Self {
        Self { marshaller }
    }

    pub fn marshaller(&self) -> &Arc<Marshaller> {
        &self.marshaller
    }

    /// Write a request body: header, alignment, `in` arguments.
    pub fn serialize_request(
        &self,
        header: &RequestHeader,
        signature: &OperationSignature,
        args: &[Value],
        out: &mut CdrOutput,
    ) -> Result<()> {
        let version = out.version();
        header.write(out, version)?;
        align_body(out)?;
        if signature.in_params().count() != args.len() {
            return Err(argument_count_mismatch());
        }
        for (param, arg) in signature.in_params().zip(args) {
            self.marshaller
                .write(&param.formal, &param.directives, arg, out)?;
        }
        debug!(
            request_id = header.request_id,
            operation = %header.operation,
            version = %version,
            body_length = out.position(),
            "request serialized"
        );
        Ok(())
    }

    /// Build a complete Request message.
    pub fn build_request(
        &self,
        settings: &MessageSettings,
        header: &RequestHeader,
        signature: &OperationSignature,
        args: &[Value],
    ) -> Result<GiopMessage> {
        let mut out = settings.body_output();
        self.serialize_request(header, signature, args, &mut out)?;
        GiopMessage::new(settings.version, MessageType::Request, settings.little_endian, out.into_bytes())
    }

    /// Read a request body.
    ///
    /// `codesets` are the codesets already established on the connection. A
    /// codeset service context in the request overrides them. Without
    /// either, wide characters are rejected.
    pub fn deserialize_request(
        &self,
        input: &mut CdrInput<'_>,
        resolver: &dyn DispatchResolver,
        codesets: Option<CodeSetContext>,
    ) -> std::result::Result<ParsedRequest, RequestParseFailure> {
        let mut request_id = None;
        match self.read_request(input, resolver, codesets, &mut request_id) {
            Ok(request) => Ok(request),
            Err(error) => {
                input.skip_rest();
                warn!(
                    context = "deserialize_request",
                    request_id = ?request_id,
                    error = %error,
                    "request body skipped after parse error"
                );
                Err(RequestParseFailure { request_id, error })
            }
        }
    }

    /// Parse the body of a Request message.
    pub fn parse_request(
        &self,
        message: &GiopMessage,
        resolver: &dyn DispatchResolver,
        codesets: Option<CodeSetContext>,
    ) -> std::result::Result<ParsedRequest, RequestParseFailure> {
        let mut input = message.body_input();
        self.deserialize_request(&mut input, resolver, codesets)
    }

    fn read_request(
        &self,
        input: &mut CdrInput<'_>,
        resolver: &dyn DispatchResolver,
        codesets: Option<CodeSetContext>,
        request_id: &mut Option<u32>,
    ) -> Result<ParsedRequest> {
        let version = input.version();
        let header = RequestHeader::read_with_id(input, version, request_id)?;
        let codesets = match header.service_contexts.code_sets()? {
            Some((char_set, wchar_set)) => check_codesets_compatible(char_set, wchar_set)?,
            None => codesets.unwrap_or_else(CodeSetContext::unnegotiated),
        };
        input.set_codesets(codesets, version);

        let target = resolver.resolve(&header.object_key, &header.operation)?;
        let signature = target.signature();
        if version.is_1_2_or_later() {
            // no padding when the body is empty
            input.try_align(8);
        }
        let mut session = ValueSession::new();
        let args = signature
            .in_params()
            .map(|param| {
                self.marshaller
                    .read_in(&param.formal, &param.directives, input, &mut session)
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            request_id = header.request_id,
            operation = %header.operation,
            args = args.len(),
            "request deserialized"
        );
        Ok(ParsedRequest {
            header,
            target,
            args,
            codesets,
        })
    }

    /// Write a reply body: header, alignment, payload.
    pub fn serialize_reply(
        &self,
        request_id: u32,
        service_contexts: &ServiceContextList,
        body: &ReplyBody,
        signature: &OperationSignature,
        out: &mut CdrOutput,
    ) -> Result<()> {
        let version = out.version();
        let header = ReplyHeader {
            request_id,
            status: body.status(),
            service_contexts: service_contexts.clone(),
        };
        header.write(out, version)?;
        align_body(out)?;
        match body {
            ReplyBody::Normal { result, out_args } => {
                self.marshaller
                    .write(&signature.result, &signature.result_directives, result, out)?;
                if signature.out_params().count() != out_args.len() {
                    return Err(argument_count_mismatch());
                }
                for (param, arg) in signature.out_params().zip(out_args) {
                    self.marshaller
                        .write(&param.formal, &param.directives, arg, out)?;
                }
            }
            ReplyBody::UserException(ex) => self.marshaller.write_user_exception(ex, out)?,
            ReplyBody::SystemException(ex) => write_system_exception(ex, out)?,
            ReplyBody::LocationForward(ior) | ReplyBody::LocationForwardPerm(ior) => ior.write(out)?,
        }
        debug!(request_id, status = ?header.status, version = %version, "reply serialized");
        Ok(())
    }

    /// Build a complete Reply message.
    ///
    /// If the payload cannot be marshalled, a system exception reply is built
    /// instead: the marshalling error itself when it is a system exception,
    /// otherwise UNKNOWN 300. If even that fails the result is INTERNAL 204.
    pub fn build_reply(
        &self,
        settings: &MessageSettings,
        request_id: u32,
        service_contexts: &ServiceContextList,
        body: &ReplyBody,
        signature: &OperationSignature,
    ) -> Result<GiopMessage> {
        let mut out = settings.body_output();
        let error = match self.serialize_reply(request_id, service_contexts, body, signature, &mut out) {
            Ok(()) => {
                return GiopMessage::new(settings.version, MessageType::Reply, settings.little_endian, out.into_bytes())
            }
            Err(error) => error,
        };
        if matches!(body, ReplyBody::SystemException(_)) {
            return Err(CorbaError::internal(
                minor::INTERNAL_REPLY_FAILURE,
                CompletionStatus::CompletedYes,
            ));
        }
        let ex = error.as_system().cloned().unwrap_or_else(|| {
            SystemException::new(
                SystemExceptionKind::Unknown,
                minor::UNKNOWN_REPLY_FAILURE,
                CompletionStatus::CompletedYes,
            )
        });
        warn!(
            context = "build_reply",
            request_id,
            error = %error,
            "reply payload replaced by system exception"
        );
        let mut out = settings.body_output();
        self.serialize_reply(
            request_id,
            service_contexts,
            &ReplyBody::SystemException(ex),
            signature,
            &mut out,
        )
        .map_err(|_| CorbaError::internal(minor::INTERNAL_REPLY_FAILURE, CompletionStatus::CompletedYes))?;
        GiopMessage::new(settings.version, MessageType::Reply, settings.little_endian, out.into_bytes())
    }

    /// Read a reply body against the signature of the call.
    ///
    /// User and system exceptions are returned as errors. A user exception
    /// the signature does not declare becomes UNKNOWN 1.
    pub fn deserialize_reply(
        &self,
        input: &mut CdrInput<'_>,
        signature: &OperationSignature,
    ) -> Result<(ReplyHeader, ReplyOutcome)> {
        let result = self.read_reply(input, signature);
        if result.is_err() {
            input.skip_rest();
        }
        result
    }

    /// Parse the body of a Reply message.
    pub fn parse_reply(
        &self,
        message: &GiopMessage,
        signature: &OperationSignature,
        codesets: CodeSetContext,
    ) -> Result<(ReplyHeader, ReplyOutcome)> {
        let mut input = message.body_input();
        input.set_codesets(codesets, message.version());
        self.deserialize_reply(&mut input, signature)
    }

    fn read_reply(
        &self,
        input: &mut CdrInput<'_>,
        signature: &OperationSignature,
    ) -> Result<(ReplyHeader, ReplyOutcome)> {
        let version = input.version();
        let header = ReplyHeader::read(input, version)?;
        if version.is_1_2_or_later() {
            input.try_align(8);
        }
        let outcome = match header.status {
            ReplyStatus::NoException => {
                let mut session = ValueSession::new();
                let result = self.marshaller.read_in(
                    &signature.result,
                    &signature.result_directives,
                    input,
                    &mut session,
                )?;
                let out_args = signature
                    .out_params()
                    .map(|param| {
                        self.marshaller
                            .read_in(&param.formal, &param.directives, input, &mut session)
                    })
                    .collect::<Result<Vec<_>>>()?;
                ReplyOutcome::Normal { result, out_args }
            }
            ReplyStatus::UserException => {
                let repository_id = input.read_string()?;
                if !signature.declares_exception(&repository_id) {
                    warn!(
                        context = "deserialize_reply",
                        repository_id = %repository_id,
                        "user exception not declared by the operation"
                    );
                    return Err(CorbaError::system(
                        SystemExceptionKind::Unknown,
                        minor::UNLISTED_USER_EXCEPTION,
                        CompletionStatus::CompletedMayBe,
                    ));
                }
                let ex = self.marshaller.read_user_exception(&repository_id, input)?;
                return Err(CorbaError::User(ex));
            }
            ReplyStatus::SystemException => {
                return Err(CorbaError::System(read_system_exception(input)?));
            }
            ReplyStatus::LocationForward => ReplyOutcome::LocationForward(Ior::read(input)?),
            ReplyStatus::LocationForwardPerm => ReplyOutcome::LocationForwardPerm(Ior::read(input)?),
            ReplyStatus::NeedsAddressingMode => {
                return Err(CorbaError::marshal(
                    minor::UNSUPPORTED_REPLY_STATUS,
                    CompletionStatus::CompletedMayBe,
                ));
            }
        };
        debug!(request_id = header.request_id, status = ?header.status, "reply deserialized");
        Ok((header, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PrimitiveKind, Repository};
    use crate::giop::dispatch::StaticResolver;
    use crate::giop::message::response_flags;
    use crate::schema::{FieldMeta, FormalType, TypeMetadata};

    fn long() -> FormalType {
        FormalType::Primitive(PrimitiveKind::Long)
    }

    fn add() -> OperationSignature {
        OperationSignature::new("add")
            .with_in("a", long())
            .with_in("b", long())
            .with_result(long(), Default::default())
            .with_exception("IDL:Overflow:1.0")
    }

    fn serializer() -> MessageBodySerializer {
        let repo = Repository::new();
        repo.register(TypeMetadata::exception(
            "IDL:Overflow:1.0",
            "Overflow",
            vec![FieldMeta::new("limit", long())],
        ))
        .expect("register");
        MessageBodySerializer::new(Arc::new(Marshaller::new(Arc::new(repo))))
    }

    fn resolver() -> StaticResolver {
        let resolver = StaticResolver::new();
        resolver.bind_object(b"calc", "IDL:Calc:1.0").expect("bind");
        resolver.register_operation("IDL:Calc:1.0", add()).expect("register");
        resolver
    }

    #[test]
    fn test_add_request_round_trip() {
        let ser = serializer();
        let header = RequestHeader::new(1, b"calc".to_vec(), "add", response_flags(false, GiopVersion::V1_2));
        let message = ser
            .build_request(
                &MessageSettings::default(),
                &header,
                &add(),
                &[Value::Long(2), Value::Long(3)],
            )
            .expect("build");
        assert_eq!(message.body[4], 3);

        let parsed = ser
            .parse_request(&message, &resolver(), None)
            .expect("parse");
        assert_eq!(parsed.header, header);
        assert_eq!(parsed.args, vec![Value::Long(2), Value::Long(3)]);
    }

    #[test]
    fn test_wrong_argument_count() {
        let ser = serializer();
        let header = RequestHeader::new(1, b"calc".to_vec(), "add", 3);
        let err = ser
            .build_request(&MessageSettings::default(), &header, &add(), &[Value::Long(2)])
            .unwrap_err();
        assert_eq!(err.minor_code(), Some(9006));
    }

    #[test]
    fn test_parse_failure_reports_request_id() {
        let ser = serializer();
        let header = RequestHeader::new(42, b"calc".to_vec(), "mul", 3);
        let mut out = MessageSettings::default().body_output();
        header.write(&mut out, GiopVersion::V1_2).expect("write");
        out.write_long(9).expect("trailing");
        let message =
            GiopMessage::new(GiopVersion::V1_2, MessageType::Request, false, out.into_bytes()).expect("message");

        let mut input = message.body_input();
        let failure = ser
            .deserialize_request(&mut input, &resolver(), None)
            .unwrap_err();
        assert_eq!(failure.request_id, Some(42));
        assert!(failure.error.is_system(SystemExceptionKind::BadOperation));
        assert!(input.is_at_end());
    }

    #[test]
    fn test_parse_failure_without_request_id() {
        let ser = serializer();
        let bytes = [0u8, 0];
        let mut input = CdrInput::new(&bytes, false);
        let failure = ser
            .deserialize_request(&mut input, &resolver(), None)
            .unwrap_err();
        assert_eq!(failure.request_id, None);
        assert_eq!(failure.error.minor_code(), Some(1207));
    }

    #[test]
    fn test_reply_result() {
        let ser = serializer();
        let message = ser
            .build_reply(
                &MessageSettings::default(),
                1,
                &ServiceContextList::new(),
                &ReplyBody::result(Value::Long(5)),
                &add(),
            )
            .expect("build");
        let (header, outcome) = ser
            .parse_reply(&message, &add(), CodeSetContext::default())
            .expect("parse");
        assert_eq!(header.request_id, 1);
        assert_eq!(outcome.result(), Some(&Value::Long(5)));
    }

    #[test]
    fn test_system_exception_reply() {
        let ser = serializer();
        let ex = SystemException::new(SystemExceptionKind::Marshal, 123, CompletionStatus::CompletedMayBe);
        let message = ser
            .build_reply(
                &MessageSettings::default(),
                9,
                &ServiceContextList::new(),
                &ReplyBody::SystemException(ex),
                &add(),
            )
            .expect("build");
        let err = ser
            .parse_reply(&message, &add(), CodeSetContext::default())
            .unwrap_err();
        assert_eq!(err.minor_code(), Some(123));
        assert_eq!(err.completion_status(), Some(CompletionStatus::CompletedMayBe));
    }

    #[test]
    fn test_user_exception_reply() {
        let ser = serializer();
        let ex = UserException::new("IDL:Overflow:1.0", vec![("limit".into(), Value::Long(100))]);
        let message = ser
            .build_reply(
                &MessageSettings::default(),
                3,
                &ServiceContextList::new(),
                &ReplyBody::UserException(ex.clone()),
                &add(),
            )
            .expect("build");
        match ser.parse_reply(&message, &add(), CodeSetContext::default()) {
            Err(CorbaError::User(received)) => assert_eq!(received, ex),
            other => panic!("expected user exception, got {other:?}"),
        }

        // not declared by the signature
        let err = ser
            .parse_reply(&message, &OperationSignature::new("add"), CodeSetContext::default())
            .unwrap_err();
        assert!(err.is_system(SystemExceptionKind::Unknown));
        assert_eq!(err.minor_code(), Some(1));
    }

    #[test]
    fn test_unmarshallable_result_becomes_system_exception() {
        let ser = serializer();
        let message = ser
            .build_reply(
                &MessageSettings::default(),
                4,
                &ServiceContextList::new(),
                &ReplyBody::result(Value::String("not a long".into())),
                &add(),
            )
            .expect("build");
        let err = ser
            .parse_reply(&message, &add(), CodeSetContext::default())
            .unwrap_err();
        assert!(err.is_system(SystemExceptionKind::BadParam));
        assert_eq!(err.minor_code(), Some(9006));
    }

    #[test]
    fn test_location_forward_reply() {
        let ser = serializer();
        let target = Ior::from_iiop("IDL:Calc:1.0", "backup", 2810, GiopVersion::V1_2, b"calc".to_vec());
        for (body, permanent) in [
            (ReplyBody::LocationForward(target.clone()), false),
            (ReplyBody::LocationForwardPerm(target.clone()), true),
        ] {
            let message = ser
                .build_reply(&MessageSettings::default(), 2, &ServiceContextList::new(), &body, &add())
                .expect("build");
            let (_, outcome) = ser
                .parse_reply(&message, &add(), CodeSetContext::default())
                .expect("parse");
            let expected = if permanent {
                ReplyOutcome::LocationForwardPerm(target.clone())
            } else {
                ReplyOutcome::LocationForward(target.clone())
            };
            assert_eq!(outcome, expected);
        }
    }

    #[test]
    fn test_version_1_0_reply_layout() {
        let ser = serializer();
        let settings = MessageSettings::new(GiopVersion::V1_0, false, CodeSetContext::unnegotiated());
        let message = ser
            .build_reply(&settings, 6, &ServiceContextList::new(), &ReplyBody::result(Value::Long(-1)), &add())
            .expect("build");
        // contexts, request id, status, result; no alignment to 8
        assert_eq!(
            message.body,
            vec![0, 0, 0, 0, 0, 0, 0, 6, 0, 0, 0, 0, 0xff, 0xff, 0xff, 0xff]
        );
    }
}
