// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core types used throughout iiopcodec.
//!
//! This module provides the foundational types for the library:
//! - [`CorbaError`] - System/user exception aware error handling
//! - [`Value`] - Runtime value representation
//! - [`Repository`] - Repository id to type metadata registry
//! - [`GiopVersion`] - Protocol version identifier

pub mod error;
pub mod registry;
pub mod value;

pub use error::{
    minor, CompletionStatus, CorbaError, Result, SystemException, SystemExceptionKind,
    UserException,
};
pub use registry::{Repository, TypeRegistry};
pub use value::{AnyValue, PrimitiveKind, Value};

use serde::{Deserialize, Serialize};

/// GIOP protocol version.
///
/// Ordering follows the version number, so `v >= GiopVersion::V1_2` selects
/// the 1.2 layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GiopVersion {
    pub major: u8,
    pub minor: u8,
}

/// Error returned when parsing a `GiopVersion` from string fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseVersionError {
    _private: (),
}

impl std::fmt::Display for ParseVersionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid GIOP version, expected '1.0', '1.1' or '1.2'")
    }
}

impl std::error::Error for ParseVersionError {}

impl std::str::FromStr for GiopVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "1.0" => Ok(GiopVersion::V1_0),
            "1.1" => Ok(GiopVersion::V1_1),
            "1.2" => Ok(GiopVersion::V1_2),
            _ => Err(ParseVersionError { _private: () }),
        }
    }
}

impl GiopVersion {
    pub const V1_0: GiopVersion = GiopVersion { major: 1, minor: 0 };
    pub const V1_1: GiopVersion = GiopVersion { major: 1, minor: 1 };
    pub const V1_2: GiopVersion = GiopVersion { major: 1, minor: 2 };

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Check if the 1.2 message layouts apply.
    pub fn is_1_2_or_later(self) -> bool {
        self >= GiopVersion::V1_2
    }

    /// Check if this is GIOP 1.0, which has no codeset negotiation,
    /// no wide characters and no tagged components.
    pub fn is_1_0(self) -> bool {
        self == GiopVersion::V1_0
    }

    /// Check if this version can be spoken by this crate.
    pub fn is_supported(self) -> bool {
        self.major == 1 && self.minor <= 2
    }
}

impl Default for GiopVersion {
    fn default() -> Self {
        GiopVersion::V1_2
    }
}

impl std::fmt::Display for GiopVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ordering() {
        assert!(GiopVersion::V1_0 < GiopVersion::V1_1);
        assert!(GiopVersion::V1_2.is_1_2_or_later());
        assert!(!GiopVersion::V1_1.is_1_2_or_later());
        assert!(GiopVersion::V1_0.is_1_0());
    }

    #[test]
    fn test_version_from_str() {
        assert_eq!("1.1".parse::<GiopVersion>(), Ok(GiopVersion::V1_1));
        assert!("2.0".parse::<GiopVersion>().is_err());
    }

    #[test]
    fn test_version_supported() {
        assert!(GiopVersion::new(1, 2).is_supported());
        assert!(!GiopVersion::new(1, 3).is_supported());
        assert!(!GiopVersion::new(2, 0).is_supported());
        assert_eq!(GiopVersion::default().to_string(), "1.2");
    }
}
