// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Error types for the GIOP/IIOP core.
//!
//! Marshalling and protocol failures are modelled as CORBA system exceptions
//! (kind + minor code + completion status) so they can be sent back to a
//! peer unchanged. Everything else is either a framing problem, a decoded
//! user exception or a configuration mistake.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::Value;

/// Minor codes raised by this crate.
pub mod minor {
    /// Unknown GIOP magic.
    pub const BAD_MAGIC: u32 = 19;
    /// GIOP major version other than 1.
    pub const UNSUPPORTED_GIOP_VERSION: u32 = 20;
    /// Message body exceeds the configured maximum.
    pub const MESSAGE_TOO_LARGE: u32 = 21;
    /// Unknown GIOP message type.
    pub const UNKNOWN_MESSAGE_TYPE: u32 = 15;
    /// Read past the end of the message.
    pub const END_OF_STREAM: u32 = 1207;
    /// Reply status outside the supported set.
    pub const UNSUPPORTED_REPLY_STATUS: u32 = 2401;
    /// Boolean wire value other than 0 or 1.
    pub const INVALID_BOOLEAN: u32 = 10030;
    /// Addressing disposition other than KeyAddr.
    pub const UNSUPPORTED_ADDRESSING: u32 = 650;
    /// Wide character data without a negotiated wchar codeset.
    pub const WCHAR_SET_NOT_NEGOTIATED: u32 = 987;
    /// Null string.
    pub const NULL_STRING: u32 = 10040;
    /// Received object reference not assignable to the formal type.
    pub const INCOMPATIBLE_OBJECT_REFERENCE: u32 = 20010;
    /// Received value type instance not assignable to the formal type.
    pub const INCOMPATIBLE_VALUE_TYPE: u32 = 903;
    /// Unknown TypeCode kind.
    pub const UNKNOWN_TYPECODE_KIND: u32 = 1504;
    /// No mapping for the formal type and directive combination.
    pub const UNMAPPABLE_FORMAL_TYPE: u32 = 9001;
    /// Union discriminant matches no case and there is no default.
    pub const UNION_NO_MATCHING_CASE: u32 = 9002;
    /// Enum ordinal outside the member range.
    pub const ENUM_OUT_OF_RANGE: u32 = 9003;
    /// Null where the mapping does not allow it.
    pub const NULL_NOT_ALLOWED: u32 = 9004;
    /// Array dimensions or sequence bound violated.
    pub const BOUND_VIOLATION: u32 = 9005;
    /// Value shape does not match the formal type.
    pub const VALUE_TYPE_MISMATCH: u32 = 9006;
    /// IOR with profiles but without an IIOP profile.
    pub const NO_IIOP_PROFILE: u32 = 9402;
    /// Malformed stringified IOR.
    pub const MALFORMED_IOR: u32 = 9420;
    /// Unknown profile id.
    pub const UNKNOWN_PROFILE: u32 = 9421;
    /// No usable narrow codeset.
    pub const CHAR_CODESET_INCOMPATIBLE: u32 = 9501;
    /// No usable wide codeset.
    pub const WCHAR_CODESET_INCOMPATIBLE: u32 = 9502;
    /// Unknown repository id.
    pub const UNKNOWN_REPOSITORY_ID: u32 = 1414;
    /// Non-CORBA failure while serializing a reply.
    pub const UNKNOWN_REPLY_FAILURE: u32 = 300;
    /// Internal failure while serializing a reply.
    pub const INTERNAL_REPLY_FAILURE: u32 = 204;
    /// Unlisted user exception received.
    pub const UNLISTED_USER_EXCEPTION: u32 = 1;
    /// Character not representable in the narrow codeset.
    pub const CHARACTER_NOT_REPRESENTABLE: u32 = 10001;
    /// Operation unknown to the target.
    pub const UNKNOWN_OPERATION: u32 = 1;
    /// Object key unknown to the server.
    pub const UNKNOWN_OBJECT_KEY: u32 = 2;
    /// TypeCode indirection to an unknown position.
    pub const BAD_TYPECODE_INDIRECTION: u32 = 2;
    /// Value indirection to an unknown position.
    pub const BAD_VALUE_INDIRECTION: u32 = 1208;
    /// MARSHAL: a read runs over the end of a value chunk.
    pub const CHUNK_BORDER_CROSSED: u32 = 901;
    /// MARSHAL: an outermost chunked value ended with chunks still open.
    pub const CHUNKS_NOT_CLOSED: u32 = 911;
    /// MARSHAL: a chunked value does not end with a negative end tag.
    pub const INVALID_END_TAG: u32 = 914;
    /// MARSHAL: an end tag closes more values than are open.
    pub const END_TAG_LEVEL: u32 = 915;
    /// MARSHAL: an end tag closes a chunk that still holds unread data.
    pub const CHUNK_NOT_CONSUMED: u32 = 917;
}

/// Whether the operation had completed when the exception was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionStatus {
    CompletedYes,
    CompletedNo,
    CompletedMayBe,
}

impl CompletionStatus {
    /// Wire value of the status.
    pub const fn as_u32(self) -> u32 {
        match self {
            CompletionStatus::CompletedYes => 0,
            CompletionStatus::CompletedNo => 1,
            CompletionStatus::CompletedMayBe => 2,
        }
    }

    /// Decode a wire value.
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(CompletionStatus::CompletedYes),
            1 => Some(CompletionStatus::CompletedNo),
            2 => Some(CompletionStatus::CompletedMayBe),
            _ => None,
        }
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionStatus::CompletedYes => write!(f, "Completed_Yes"),
            CompletionStatus::CompletedNo => write!(f, "Completed_No"),
            CompletionStatus::CompletedMayBe => write!(f, "Completed_MayBe"),
        }
    }
}

macro_rules! system_exception_kinds {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// The standard CORBA system exceptions.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum SystemExceptionKind {
            $($variant),+
        }

        impl SystemExceptionKind {
            /// Every known kind.
            pub const ALL: &'static [SystemExceptionKind] = &[$(SystemExceptionKind::$variant),+];

            /// IDL name, e.g. `MARSHAL`.
            pub const fn name(self) -> &'static str {
                match self {
                    $(SystemExceptionKind::$variant => $name),+
                }
            }
        }
    };
}

system_exception_kinds! {
    Unknown => "UNKNOWN",
    BadParam => "BAD_PARAM",
    NoMemory => "NO_MEMORY",
    ImpLimit => "IMP_LIMIT",
    CommFailure => "COMM_FAILURE",
    InvObjref => "INV_OBJREF",
    NoPermission => "NO_PERMISSION",
    Internal => "INTERNAL",
    Marshal => "MARSHAL",
    Initialize => "INITIALIZE",
    NoImplement => "NO_IMPLEMENT",
    BadTypecode => "BAD_TYPECODE",
    BadOperation => "BAD_OPERATION",
    NoResources => "NO_RESOURCES",
    NoResponse => "NO_RESPONSE",
    PersistStore => "PERSIST_STORE",
    BadInvOrder => "BAD_INV_ORDER",
    Transient => "TRANSIENT",
    FreeMem => "FREE_MEM",
    InvIdent => "INV_IDENT",
    InvFlag => "INV_FLAG",
    IntfRepos => "INTF_REPOS",
    BadContext => "BAD_CONTEXT",
    ObjAdapter => "OBJ_ADAPTER",
    DataConversion => "DATA_CONVERSION",
    ObjectNotExist => "OBJECT_NOT_EXIST",
    TransactionRequired => "TRANSACTION_REQUIRED",
    TransactionRolledback => "TRANSACTION_ROLLEDBACK",
    InvalidTransaction => "INVALID_TRANSACTION",
    InvPolicy => "INV_POLICY",
    CodesetIncompatible => "CODESET_INCOMPATIBLE",
}

impl SystemExceptionKind {
    /// Repository id, e.g. `IDL:omg.org/CORBA/MARSHAL:1.0`.
    pub fn repository_id(self) -> String {
        format!("IDL:omg.org/CORBA/{}:1.0", self.name())
    }

    /// Look up a kind by repository id.
    pub fn from_repository_id(id: &str) -> Option<Self> {
        let name = id
            .strip_prefix("IDL:omg.org/CORBA/")?
            .strip_suffix(":1.0")?;
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

/// A CORBA system exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemException {
    pub kind: SystemExceptionKind,
    pub minor: u32,
    pub completed: CompletionStatus,
}

impl SystemException {
    pub fn new(kind: SystemExceptionKind, minor: u32, completed: CompletionStatus) -> Self {
        Self {
            kind,
            minor,
            completed,
        }
    }

    pub fn repository_id(&self) -> String {
        self.kind.repository_id()
    }
}

impl fmt::Display for SystemException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CORBA system exception {} (minor {}, {})",
            self.kind.name(),
            self.minor,
            self.completed
        )
    }
}

/// A user exception decoded from a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserException {
    pub repository_id: String,
    pub members: Vec<(String, Value)>,
}

impl UserException {
    pub fn new(repository_id: impl Into<String>, members: Vec<(String, Value)>) -> Self {
        Self {
            repository_id: repository_id.into(),
            members,
        }
    }
}

/// Errors raised by the GIOP/IIOP core.
#[derive(Debug, Clone)]
pub enum CorbaError {
    /// CORBA system exception, raised locally or received from a peer
    System(SystemException),

    /// User exception received from a peer
    User(UserException),

    /// Truncated or malformed byte stream, or a transport failure
    Framing {
        /// Where the failure happened
        context: String,
        /// Error message
        message: String,
    },

    /// Invalid configuration
    Config {
        /// Error message
        message: String,
    },

    /// Other error
    Other(String),
}

impl CorbaError {
    /// Create a system exception error.
    pub fn system(kind: SystemExceptionKind, minor: u32, completed: CompletionStatus) -> Self {
        CorbaError::System(SystemException::new(kind, minor, completed))
    }

    /// Create a MARSHAL error.
    pub fn marshal(minor: u32, completed: CompletionStatus) -> Self {
        Self::system(SystemExceptionKind::Marshal, minor, completed)
    }

    /// Create a BAD_PARAM error.
    pub fn bad_param(minor: u32, completed: CompletionStatus) -> Self {
        Self::system(SystemExceptionKind::BadParam, minor, completed)
    }

    /// Create an INV_OBJREF error.
    pub fn inv_objref(minor: u32) -> Self {
        Self::system(
            SystemExceptionKind::InvObjref,
            minor,
            CompletionStatus::CompletedNo,
        )
    }

    /// Create an INTERNAL error.
    pub fn internal(minor: u32, completed: CompletionStatus) -> Self {
        Self::system(SystemExceptionKind::Internal, minor, completed)
    }

    /// Create a DATA_CONVERSION error.
    pub fn data_conversion(minor: u32) -> Self {
        Self::system(
            SystemExceptionKind::DataConversion,
            minor,
            CompletionStatus::CompletedNo,
        )
    }

    /// Create an INTF_REPOS error for an unknown repository id.
    pub fn unknown_repository_id() -> Self {
        Self::system(
            SystemExceptionKind::IntfRepos,
            minor::UNKNOWN_REPOSITORY_ID,
            CompletionStatus::CompletedMayBe,
        )
    }

    /// Create the error for a read past the end of the message.
    pub fn end_of_stream() -> Self {
        Self::marshal(minor::END_OF_STREAM, CompletionStatus::CompletedMayBe)
    }

    /// Create a framing error.
    pub fn framing(context: impl Into<String>, message: impl Into<String>) -> Self {
        CorbaError::Framing {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        CorbaError::Config {
            message: message.into(),
        }
    }

    /// The system exception carried by this error, if any.
    pub fn as_system(&self) -> Option<&SystemException> {
        match self {
            CorbaError::System(ex) => Some(ex),
            _ => None,
        }
    }

    /// Check if this is a system exception of the given kind.
    pub fn is_system(&self, kind: SystemExceptionKind) -> bool {
        matches!(self, CorbaError::System(ex) if ex.kind == kind)
    }

    /// Minor code, for system exceptions.
    pub fn minor_code(&self) -> Option<u32> {
        self.as_system().map(|ex| ex.minor)
    }

    /// Completion status, for system exceptions.
    pub fn completion_status(&self) -> Option<CompletionStatus> {
        self.as_system().map(|ex| ex.completed)
    }

    /// Convert into a system exception that can be marshalled back to a peer.
    ///
    /// Errors that are not system exceptions become UNKNOWN.
    pub fn to_system_exception(&self) -> SystemException {
        match self {
            CorbaError::System(ex) => ex.clone(),
            _ => SystemException::new(
                SystemExceptionKind::Unknown,
                minor::UNKNOWN_REPLY_FAILURE,
                CompletionStatus::CompletedMayBe,
            ),
        }
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            CorbaError::System(ex) => vec![
                ("exception", ex.kind.name().to_string()),
                ("minor", ex.minor.to_string()),
                ("completed", ex.completed.to_string()),
            ],
            CorbaError::User(ex) => vec![("exception", ex.repository_id.clone())],
            CorbaError::Framing { context, message } => {
                vec![("context", context.clone()), ("message", message.clone())]
            }
            CorbaError::Config { message } => vec![("message", message.clone())],
            CorbaError::Other(msg) => vec![("message", msg.clone())],
        }
    }
}

impl fmt::Display for CorbaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorbaError::System(ex) => write!(f, "{ex}"),
            CorbaError::User(ex) => write!(f, "CORBA user exception {}", ex.repository_id),
            CorbaError::Framing { context, message } => {
                write!(f, "Framing error in {context}: {message}")
            }
            CorbaError::Config { message } => write!(f, "Configuration error: {message}"),
            CorbaError::Other(msg) => write!(f, "Other error: {msg}"),
        }
    }
}

impl std::error::Error for CorbaError {}

impl From<std::io::Error> for CorbaError {
    fn from(err: std::io::Error) -> Self {
        CorbaError::Framing {
            context: "IO".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<SystemException> for CorbaError {
    fn from(ex: SystemException) -> Self {
        CorbaError::System(ex)
    }
}

/// Result type for iiopcodec operations.
pub type Result<T> = std::result::Result<T, CorbaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marshal_error_display() {
        let err = CorbaError::end_of_stream();
        assert_eq!(
            err.to_string(),
            "CORBA system exception MARSHAL (minor 1207, Completed_MayBe)"
        );
        assert_eq!(err.minor_code(), Some(1207));
        assert_eq!(
            err.completion_status(),
            Some(CompletionStatus::CompletedMayBe)
        );
    }

    #[test]
    fn test_repository_id_round_trip() {
        for kind in SystemExceptionKind::ALL {
            let id = kind.repository_id();
            assert_eq!(SystemExceptionKind::from_repository_id(&id), Some(*kind));
        }
        assert_eq!(
            SystemExceptionKind::BadParam.repository_id(),
            "IDL:omg.org/CORBA/BAD_PARAM:1.0"
        );
    }

    #[test]
    fn test_unknown_repository_id() {
        assert_eq!(
            SystemExceptionKind::from_repository_id("IDL:omg.org/CORBA/NOPE:1.0"),
            None
        );
        assert_eq!(SystemExceptionKind::from_repository_id("IDL:Foo:1.0"), None);
    }

    #[test]
    fn test_completion_status_wire_values() {
        assert_eq!(CompletionStatus::CompletedYes.as_u32(), 0);
        assert_eq!(CompletionStatus::CompletedNo.as_u32(), 1);
        assert_eq!(CompletionStatus::CompletedMayBe.as_u32(), 2);
        assert_eq!(CompletionStatus::from_u32(3), None);
    }

    #[test]
    fn test_to_system_exception_wraps_other_errors() {
        let err = CorbaError::framing("IO", "connection reset");
        let ex = err.to_system_exception();
        assert_eq!(ex.kind, SystemExceptionKind::Unknown);
        assert_eq!(ex.minor, minor::UNKNOWN_REPLY_FAILURE);
        assert_eq!(ex.completed, CompletionStatus::CompletedMayBe);
    }

    #[test]
    fn test_is_system() {
        let err = CorbaError::bad_param(minor::UNSUPPORTED_ADDRESSING, CompletionStatus::CompletedNo);
        assert!(err.is_system(SystemExceptionKind::BadParam));
        assert!(!err.is_system(SystemExceptionKind::Marshal));
    }

    #[test]
    fn test_log_fields_system() {
        let err = CorbaError::marshal(19, CompletionStatus::CompletedNo);
        let fields = err.log_fields();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0], ("exception", "MARSHAL".to_string()));
        assert_eq!(fields[1], ("minor", "19".to_string()));
        assert_eq!(fields[2], ("completed", "Completed_No".to_string()));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: CorbaError = io_err.into();
        assert!(matches!(err, CorbaError::Framing { .. }));
        assert_eq!(err.to_string(), "Framing error in IO: eof");
    }

    #[test]
    fn test_user_exception_display() {
        let err = CorbaError::User(UserException::new("IDL:Test/Failed:1.0", vec![]));
        assert_eq!(err.to_string(), "CORBA user exception IDL:Test/Failed:1.0");
    }
}
