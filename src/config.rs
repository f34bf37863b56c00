// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! ORB configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! giop_version = "1.1"
//! little_endian = false
//! max_message_size = 1048576
//! receive_timeout_ms = 5000
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{CorbaError, GiopVersion, Repository, Result};
use crate::encoding::cdr::codeset::{LATIN1, UTF16};
use crate::encoding::cdr::CodeSetContext;
use crate::giop::MessageSettings;
use crate::marshal::Marshaller;

/// Default limit for incoming message bodies.
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 16 * 1024 * 1024;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for CorbaError {
    fn from(err: ConfigError) -> Self {
        CorbaError::config(err.to_string())
    }
}

/// ORB configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbConfig {
    /// GIOP version used for outgoing messages.
    #[serde(with = "version_string")]
    pub giop_version: GiopVersion,

    /// Byte order of outgoing messages.
    pub little_endian: bool,

    /// Native narrow codeset id.
    pub char_codeset: u32,

    /// Native wide codeset id.
    pub wchar_codeset: u32,

    /// Write a null sequence as an empty one instead of failing.
    pub allow_null_sequences: bool,

    /// Largest accepted incoming message body, in bytes.
    pub max_message_size: u32,

    pub connect_timeout_ms: Option<u64>,
    pub send_timeout_ms: Option<u64>,
    pub receive_timeout_ms: Option<u64>,
}

impl Default for OrbConfig {
    fn default() -> Self {
        Self {
            giop_version: GiopVersion::V1_2,
            little_endian: cfg!(target_endian = "little"),
            char_codeset: LATIN1,
            wchar_codeset: UTF16,
            allow_null_sequences: true,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            connect_timeout_ms: None,
            send_timeout_ms: None,
            receive_timeout_ms: None,
        }
    }
}

impl OrbConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::from)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| CorbaError::config(e.to_string()))
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !self.giop_version.is_supported() {
            return Err(ConfigError::Invalid(format!(
                "unsupported GIOP version {}",
                self.giop_version
            )));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::Invalid("max_message_size must be positive".into()));
        }
        CodeSetContext::from_ids(self.char_codeset, self.wchar_codeset).map_err(|_| {
            ConfigError::Invalid(format!(
                "unknown codesets 0x{:08x}/0x{:08x}",
                self.char_codeset, self.wchar_codeset
            ))
        })?;
        Ok(())
    }

    /// The native codesets as a stream context.
    pub fn codesets(&self) -> Result<CodeSetContext> {
        CodeSetContext::from_ids(self.char_codeset, self.wchar_codeset)
    }

    /// Settings for messages sent before codesets are negotiated.
    pub fn message_settings(&self) -> MessageSettings {
        MessageSettings::new(
            self.giop_version,
            self.little_endian,
            CodeSetContext::unnegotiated(),
        )
    }

    /// A marshaller honouring the null sequence policy.
    pub fn marshaller(&self, repository: Arc<Repository>) -> Marshaller {
        Marshaller::new(repository).with_allow_null_sequences(self.allow_null_sequences)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn send_timeout(&self) -> Option<Duration> {
        self.send_timeout_ms.map(Duration::from_millis)
    }

    pub fn receive_timeout(&self) -> Option<Duration> {
        self.receive_timeout_ms.map(Duration::from_millis)
    }
}

mod version_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::core::GiopVersion;

    pub fn serialize<S: Serializer>(version: &GiopVersion, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(version)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<GiopVersion, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse()
            .map_err(|_| de::Error::custom(format!("invalid GIOP version '{text}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = OrbConfig::from_toml_str("").expect("parse");
        assert_eq!(config, OrbConfig::default());
        assert_eq!(config.giop_version, GiopVersion::V1_2);
        assert_eq!(config.max_message_size, 16 * 1024 * 1024);
        assert!(config.allow_null_sequences);
        assert_eq!(config.codesets().expect("codesets"), CodeSetContext::default());
    }

    #[test]
    fn test_overrides() {
        let config = OrbConfig::from_toml_str(
            r#"
            giop_version = "1.0"
            little_endian = true
            allow_null_sequences = false
            max_message_size = 4096
            receive_timeout_ms = 250
            "#,
        )
        .expect("parse");
        assert_eq!(config.giop_version, GiopVersion::V1_0);
        assert!(config.little_endian);
        assert!(!config.allow_null_sequences);
        assert_eq!(config.max_message_size, 4096);
        assert_eq!(config.receive_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.send_timeout(), None);
    }

    #[test]
    fn test_invalid_values() {
        for text in [
            "giop_version = \"2.0\"",
            "giop_version = \"1.3\"",
            "max_message_size = 0",
            "char_codeset = 7",
            "little_endian = \"yes\"",
        ] {
            let err = OrbConfig::from_toml_str(text).unwrap_err();
            assert!(matches!(err, CorbaError::Config { .. }), "{text}: {err:?}");
        }
    }

    #[test]
    fn test_toml_round_trip() {
        let config = OrbConfig {
            giop_version: GiopVersion::V1_1,
            send_timeout_ms: Some(10),
            ..OrbConfig::default()
        };
        let text = config.to_toml_string().expect("serialize");
        assert!(text.contains("giop_version = \"1.1\""));
        assert_eq!(OrbConfig::from_toml_str(&text).expect("parse"), config);
    }
}
