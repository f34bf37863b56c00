// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # iiopcodec
//!
//! CORBA GIOP/IIOP protocol core: CDR streams, type-to-wire marshalling,
//! object references and GIOP messages.
//!
//! ## Architecture
//!
//! - `core/` - error model, runtime values, type repository
//! - `encoding/cdr/` - CDR input/output streams and character codesets
//! - `schema/` - type metadata table and marshalling directives
//! - `marshal/` - mapping engine, TypeCodes, value types
//! - `ior/` - IORs, IIOP profiles, tagged components, codeset negotiation
//! - `giop/` - message headers, request/reply bodies, connections
//! - `config` - ORB configuration
//!
//! ## Example: Stringified IOR
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use iiopcodec::{GiopVersion, Ior};
//!
//! let ior = Ior::from_iiop("IDL:Calc:1.0", "localhost", 2809, GiopVersion::V1_2, b"calc".to_vec());
//! let text = ior.to_ior_string()?;
//! assert!(text.starts_with("IOR:"));
//!
//! let parsed: Ior = text.parse()?;
//! assert_eq!(parsed.port(), Some(2809));
//! assert_eq!(parsed.object_key(), Some(&b"calc"[..]));
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: Marshalling a call
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use iiopcodec::giop::{MessageBodySerializer, MessageSettings, OperationSignature, RequestHeader};
//! use iiopcodec::schema::FormalType;
//! use iiopcodec::{Marshaller, PrimitiveKind, Repository, Value};
//!
//! let long = FormalType::Primitive(PrimitiveKind::Long);
//! let add = OperationSignature::new("add")
//!     .with_in("a", long.clone())
//!     .with_in("b", long);
//! let serializer = MessageBodySerializer::new(Arc::new(Marshaller::new(Arc::new(Repository::new()))));
//!
//! let header = RequestHeader::new(1, b"calc".to_vec(), "add", 3);
//! let message = serializer.build_request(
//!     &MessageSettings::default(),
//!     &header,
//!     &add,
//!     &[Value::Long(2), Value::Long(3)],
//! )?;
//! let bytes = message.to_bytes()?;
//! assert_eq!(&bytes[0..4], b"GIOP");
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

pub use core::{
    minor, CompletionStatus, CorbaError, GiopVersion, PrimitiveKind, Repository, Result, SystemException,
    SystemExceptionKind, UserException, Value,
};

// CDR streams
pub mod encoding;

pub use encoding::{CdrInput, CdrOutput, CodeSetContext};

// Type metadata
pub mod schema;

// Mapping engine
pub mod marshal;

pub use marshal::{Marshaller, TypeCode, TypeCodeCache};

// Object references
pub mod ior;

pub use ior::Ior;

// GIOP messages
pub mod giop;

pub use giop::{GiopConnection, GiopMessage, MessageBodySerializer};

pub mod config;

pub use config::OrbConfig;
