// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! GIOP messages and connections.
//!
//! - [`header`]: the 12 byte message header
//! - [`message`]: Request, Reply, Locate and Cancel headers
//! - [`body`]: request and reply bodies with marshalled arguments
//! - [`fragment`]: reassembly of fragmented messages
//! - [`connection`]: message framing over a [`Transport`]

pub mod body;
pub mod connection;
pub mod dispatch;
pub mod fragment;
pub mod header;
pub mod message;
pub mod service_context;
pub mod standard_ops;
pub mod transport;

pub use body::{
    MessageBodySerializer, MessageSettings, ParsedRequest, ReplyBody, ReplyOutcome, RequestParseFailure,
};
pub use connection::{GiopConnection, RequestHandler};
pub use dispatch::{
    DispatchResolver, DispatchTarget, OperationSignature, ParamMode, Parameter, StaticResolver,
};
pub use fragment::FragmentAssembler;
pub use header::{GiopHeader, MessageType, HEADER_LEN};
pub use message::{
    response_flags, CancelRequest, GiopMessage, LocateReply, LocateRequest, LocateStatus, MessageDetails,
    ReplyHeader, ReplyStatus, RequestHeader,
};
pub use service_context::{ServiceContext, ServiceContextList, CODE_SETS_CONTEXT_ID};
pub use standard_ops::StandardOperation;
pub use transport::{MemoryTransport, TcpTransport, Transport};

/// Serde helper writing byte buffers as hex strings.
pub(crate) mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(&text).map_err(de::Error::custom)
    }
}
