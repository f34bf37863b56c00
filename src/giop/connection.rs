// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Message framing over a [`Transport`].
//!
//! A [`GiopConnection`] reads and writes whole messages, hands out request
//! ids, and keeps the codesets negotiated for the connection. Messages are
//! written one at a time, so request and reply bytes never interleave.
//!
//! The client side sends the codeset service context with its first
//! request (GIOP 1.1 and later, when the target profile advertises
//! codesets). The server side records the codesets from that context and
//! uses them for every later request on the connection.

use std::sync::Arc;

use tracing::{debug, warn};

use super::body::{MessageBodySerializer, MessageSettings, ParsedRequest, ReplyBody, ReplyOutcome};
use super::dispatch::{DispatchResolver, DispatchTarget, OperationSignature};
use super::fragment::FragmentAssembler;
use super::header::{GiopHeader, MessageType, HEADER_LEN};
use super::message::{
    response_flags, CancelRequest, GiopMessage, LocateReply, LocateRequest, LocateStatus, ReplyHeader, RequestHeader,
};
use super::service_context::{ServiceContext, ServiceContextList, CODE_SETS_CONTEXT_ID};
use super::transport::Transport;
use crate::config::OrbConfig;
use crate::core::{minor, CompletionStatus, CorbaError, GiopVersion, Result, Value};
use crate::encoding::cdr::CodeSetContext;
use crate::ior::Ior;
use crate::marshal::Marshaller;

/// Application side of request dispatch.
///
/// Standard operations never reach the handler.
pub trait RequestHandler {
    /// Produce the reply for a decoded request.
    ///
    /// A returned [`CorbaError::User`] becomes a user exception reply; any
    /// other error becomes a system exception reply.
    fn handle(&self, request: &ParsedRequest) -> Result<ReplyBody>;
}

impl<F> RequestHandler for F
where
    F: Fn(&ParsedRequest) -> Result<ReplyBody>,
{
    fn handle(&self, request: &ParsedRequest) -> Result<ReplyBody> {
        self(request)
    }
}

/// A GIOP connection over a transport.
pub struct GiopConnection<T: Transport> {
    transport: T,
    config: OrbConfig,
    serializer: MessageBodySerializer,
    next_request_id: u32,
    codesets: Option<CodeSetContext>,
    fragments: FragmentAssembler,
}

impl<T: Transport> GiopConnection<T> {
    pub fn new(transport: T, config: OrbConfig, marshaller: Arc<Marshaller>) -> Self {
        Self {
            fragments: FragmentAssembler::new(config.max_message_size),
            transport,
            config,
            serializer: MessageBodySerializer::new(marshaller),
            next_request_id: 1,
            codesets: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn config(&self) -> &OrbConfig {
        &self.config
    }

    pub fn serializer(&self) -> &MessageBodySerializer {
        &self.serializer
    }

    /// Codesets negotiated on this connection, if any.
    pub fn codesets(&self) -> Option<CodeSetContext> {
        self.codesets
    }

    /// Allocate the next request id.
    pub fn next_request_id(&mut self) -> u32 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }

    /// Read one whole message, reassembling fragmented ones.
    ///
    /// Bodies above the configured maximum are refused before they are read;
    /// the connection cannot be reused after that. The limit also applies to
    /// the total body of a reassembled message.
    pub fn read_message(&mut self) -> Result<GiopMessage> {
        loop {
            let frame = self.read_frame()?;
            if let Some(message) = self.fragments.accept(frame)? {
                return Ok(message);
            }
        }
    }

    /// Read one message as framed on the wire, fragments included.
    fn read_frame(&mut self) -> Result<GiopMessage> {
        let mut header_bytes = [0u8; HEADER_LEN];
        self.transport.read_exact(&mut header_bytes)?;
        let header = GiopHeader::parse(&header_bytes)?;
        if header.body_length > self.config.max_message_size {
            warn!(
                context = "read_message",
                body_length = header.body_length,
                max = self.config.max_message_size,
                peer = ?self.transport.peer_address(),
                "message body too large"
            );
            return Err(CorbaError::marshal(minor::MESSAGE_TOO_LARGE, CompletionStatus::CompletedNo));
        }
        let mut body = vec![0u8; header.body_length as usize];
        self.transport.read_exact(&mut body)?;
        debug!(
            message_type = %header.message_type,
            version = %header.version,
            body_length = header.body_length,
            fragment = header.fragment,
            "message received"
        );
        Ok(GiopMessage { header, body })
    }

    pub fn write_message(&mut self, message: &GiopMessage) -> Result<()> {
        let bytes = message.to_bytes()?;
        self.transport.write_all(&bytes)?;
        debug!(
            message_type = %message.header.message_type,
            version = %message.header.version,
            body_length = message.header.body_length,
            "message sent"
        );
        Ok(())
    }

    /// Invoke an operation on `target` and wait for its reply.
    ///
    /// One-way operations return a void outcome right after the request is
    /// written. Replies to other request ids are skipped.
    pub fn invoke(&mut self, target: &Ior, signature: &OperationSignature, args: &[Value]) -> Result<ReplyOutcome> {
        let profile = target
            .iiop_profile()
            .ok_or_else(|| CorbaError::inv_objref(minor::NO_IIOP_PROFILE))?;
        let version = profile.version.min(self.config.giop_version);

        let mut contexts = ServiceContextList::new();
        let codesets = match self.codesets {
            Some(codesets) => codesets,
            None => {
                let codesets = match profile.code_sets() {
                    Some(component) if !version.is_1_0() => {
                        let codesets = component.negotiate(self.config.char_codeset, self.config.wchar_codeset)?;
                        let wchar_id = codesets.wchar_set.map(|w| w.id()).unwrap_or(self.config.wchar_codeset);
                        contexts.insert(ServiceContext::code_sets(
                            codesets.char_set.id(),
                            wchar_id,
                            self.config.little_endian,
                        )?);
                        codesets
                    }
                    _ => CodeSetContext::unnegotiated(),
                };
                self.codesets = Some(codesets);
                codesets
            }
        };

        let request_id = self.next_request_id();
        let mut header = RequestHeader::new(
            request_id,
            profile.object_key.clone(),
            signature.name.clone(),
            response_flags(signature.one_way, version),
        );
        header.service_contexts = contexts;
        let settings = MessageSettings::new(version, self.config.little_endian, codesets);
        let message = self.serializer.build_request(&settings, &header, signature, args)?;
        self.write_message(&message)?;

        if signature.one_way {
            return Ok(ReplyOutcome::Normal {
                result: Value::Null,
                out_args: Vec::new(),
            });
        }
        loop {
            let message = self.read_message()?;
            match message.message_type() {
                MessageType::Reply => {
                    let reply_id = ReplyHeader::read(&mut message.body_input(), message.version())?.request_id;
                    if reply_id != request_id {
                        warn!(
                            context = "invoke",
                            expected = request_id,
                            received = reply_id,
                            "reply for another request skipped"
                        );
                        continue;
                    }
                    let (_, outcome) = self.serializer.parse_reply(&message, signature, codesets)?;
                    return Ok(outcome);
                }
                MessageType::CloseConnection => {
                    return Err(CorbaError::framing("invoke", "connection closed by peer"));
                }
                MessageType::MessageError => {
                    return Err(CorbaError::framing("invoke", "peer reported a message error"));
                }
                other => {
                    warn!(context = "invoke", message_type = %other, "unexpected message skipped");
                }
            }
        }
    }

    /// Ask whether the object behind `object_key` lives at the peer.
    pub fn locate(&mut self, object_key: &[u8], version: GiopVersion) -> Result<LocateReply> {
        let request = LocateRequest {
            request_id: self.next_request_id(),
            object_key: object_key.to_vec(),
        };
        let mut out = GiopMessage::body_output(version, self.config.little_endian);
        request.write(&mut out, version)?;
        let message = GiopMessage::new(version, MessageType::LocateRequest, self.config.little_endian, out.into_bytes())?;
        self.write_message(&message)?;
        loop {
            let message = self.read_message()?;
            if message.message_type() != MessageType::LocateReply {
                warn!(context = "locate", message_type = %message.message_type(), "unexpected message skipped");
                continue;
            }
            let reply = LocateReply::read(&mut message.body_input(), message.version())?;
            if reply.request_id == request.request_id {
                return Ok(reply);
            }
        }
    }

    /// Handle one incoming message.
    ///
    /// Returns `Ok(false)` once the peer closed the connection. A request
    /// whose id could not be read is answered with MessageError and the
    /// parse error is returned; the caller should close the connection.
    pub fn serve_one(&mut self, resolver: &dyn DispatchResolver, handler: &dyn RequestHandler) -> Result<bool> {
        let message = self.read_message()?;
        match message.message_type() {
            MessageType::Request => self.serve_request(&message, resolver, handler)?,
            MessageType::LocateRequest => {
                let version = message.version();
                let request = LocateRequest::read(&mut message.body_input(), version)?;
                let status = match resolver.target_type_id(&request.object_key) {
                    Ok(_) => LocateStatus::ObjectHere,
                    Err(_) => LocateStatus::UnknownObject,
                };
                let mut out = GiopMessage::body_output(version, self.config.little_endian);
                LocateReply::new(request.request_id, status).write(&mut out, version)?;
                let reply = GiopMessage::new(version, MessageType::LocateReply, self.config.little_endian, out.into_bytes())?;
                self.write_message(&reply)?;
            }
            MessageType::CancelRequest => {
                let cancel = CancelRequest::read(&mut message.body_input())?;
                debug!(request_id = cancel.request_id, "cancel request ignored");
            }
            MessageType::CloseConnection => {
                debug!(peer = ?self.transport.peer_address(), "peer closed the connection");
                self.transport.close()?;
                return Ok(false);
            }
            MessageType::MessageError => {
                self.transport.close()?;
                return Err(CorbaError::framing("serve", "peer reported a message error"));
            }
            other => {
                warn!(context = "serve", message_type = %other, "unexpected message skipped");
            }
        }
        Ok(true)
    }

    /// Serve messages until the peer closes the connection.
    pub fn serve(&mut self, resolver: &dyn DispatchResolver, handler: &dyn RequestHandler) -> Result<()> {
        while self.serve_one(resolver, handler)? {}
        Ok(())
    }

    fn serve_request(
        &mut self,
        message: &GiopMessage,
        resolver: &dyn DispatchResolver,
        handler: &dyn RequestHandler,
    ) -> Result<()> {
        let version = message.version();
        let request = match self.serializer.parse_request(message, resolver, self.codesets) {
            Ok(request) => request,
            Err(failure) => {
                let Some(request_id) = failure.request_id else {
                    self.write_message(&GiopMessage::header_only(version, MessageType::MessageError))?;
                    return Err(failure.error);
                };
                let body = ReplyBody::SystemException(failure.error.to_system_exception());
                let settings = MessageSettings::new(
                    version,
                    self.config.little_endian,
                    CodeSetContext::unnegotiated(),
                );
                let reply = self.serializer.build_reply(
                    &settings,
                    request_id,
                    &ServiceContextList::new(),
                    &body,
                    &OperationSignature::new(""),
                )?;
                return self.write_message(&reply);
            }
        };
        if request.header.service_contexts.contains(CODE_SETS_CONTEXT_ID) {
            self.codesets = Some(request.codesets);
        }

        let body = match &request.target {
            DispatchTarget::Standard(op) => resolver
                .target_type_id(&request.header.object_key)
                .and_then(|type_id| op.invoke(&type_id, &request.args, self.serializer.marshaller().repository()))
                .map(ReplyBody::result),
            DispatchTarget::Application(_) => handler.handle(&request),
        };
        let body = match body {
            Ok(body) => body,
            Err(CorbaError::User(ex)) => ReplyBody::UserException(ex),
            Err(err) => {
                debug!(request_id = request.header.request_id, error = %err, "request failed");
                ReplyBody::SystemException(err.to_system_exception())
            }
        };
        if !request.header.response_expected() {
            return Ok(());
        }
        let settings = MessageSettings::new(version, self.config.little_endian, request.codesets);
        let reply = self.serializer.build_reply(
            &settings,
            request.header.request_id,
            &ServiceContextList::new(),
            &body,
            &request.target.signature(),
        )?;
        self.write_message(&reply)
    }

    /// Send CloseConnection and close the transport.
    pub fn close(&mut self) -> Result<()> {
        let message = GiopMessage::header_only(self.config.giop_version, MessageType::CloseConnection);
        self.write_message(&message)?;
        self.transport.close()
    }
}
