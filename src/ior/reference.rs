// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Interoperable Object References.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::component::TaggedComponent;
use super::profile::{InternetIiopProfile, TaggedProfile};
use crate::core::{minor, CorbaError, GiopVersion, Result};
use crate::encoding::cdr::{CdrInput, CdrOutput};

/// Prefix of the stringified form.
pub const IOR_PREFIX: &str = "IOR:";

/// An object reference: repository id plus profiles.
///
/// The null reference has an empty type id and no profiles. A non-null
/// reference with profiles always contains an Internet IIOP profile.
///
/// # Example
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use iiopcodec::core::GiopVersion;
/// use iiopcodec::ior::Ior;
///
/// let ior = Ior::from_iiop("IDL:Hello:1.0", "localhost", 2809, GiopVersion::V1_2, b"hello".to_vec());
/// let text = ior.to_string();
/// assert!(text.starts_with("IOR:"));
/// let back: Ior = text.parse()?;
/// assert_eq!(back.port(), Some(2809));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ior {
    type_id: String,
    profiles: Vec<TaggedProfile>,
}

impl Ior {
    /// Build a reference, checking that an IIOP profile is present.
    pub fn new(type_id: impl Into<String>, profiles: Vec<TaggedProfile>) -> Result<Self> {
        let ior = Self {
            type_id: type_id.into(),
            profiles,
        };
        ior.validate()?;
        Ok(ior)
    }

    /// The null reference.
    pub fn null() -> Self {
        Self {
            type_id: String::new(),
            profiles: Vec::new(),
        }
    }

    /// A one-profile reference for a TCP endpoint.
    ///
    /// Profiles newer than GIOP 1.0 advertise the default codesets.
    pub fn from_iiop(
        type_id: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        version: GiopVersion,
        object_key: Vec<u8>,
    ) -> Self {
        let mut profile = InternetIiopProfile::new(version, host, port, object_key);
        if !version.is_1_0() {
            profile = profile.with_component(TaggedComponent::default_code_sets());
        }
        Self {
            type_id: type_id.into(),
            profiles: vec![TaggedProfile::InternetIiop(profile)],
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.profiles.is_empty() && self.iiop_profile().is_none() {
            return Err(CorbaError::inv_objref(minor::NO_IIOP_PROFILE));
        }
        Ok(())
    }

    pub fn is_null_reference(&self) -> bool {
        self.type_id.is_empty() && self.profiles.is_empty()
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn profiles(&self) -> &[TaggedProfile] {
        &self.profiles
    }

    /// The first Internet IIOP profile.
    pub fn iiop_profile(&self) -> Option<&InternetIiopProfile> {
        self.profiles.iter().find_map(TaggedProfile::as_iiop)
    }

    pub fn host(&self) -> Option<&str> {
        self.iiop_profile().map(|p| p.host.as_str())
    }

    pub fn port(&self) -> Option<u16> {
        self.iiop_profile().map(|p| p.port)
    }

    pub fn version(&self) -> Option<GiopVersion> {
        self.iiop_profile().map(|p| p.version)
    }

    pub fn object_key(&self) -> Option<&[u8]> {
        self.iiop_profile().map(|p| p.object_key.as_slice())
    }

    /// Same reference with a different type id.
    pub fn with_type_id(&self, type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            profiles: self.profiles.clone(),
        }
    }

    /// Read the wire form: type id, profile count, profiles.
    pub fn read(input: &mut CdrInput<'_>) -> Result<Self> {
        let type_id = input.read_string()?;
        let count = input.read_ulong()? as usize;
        if count > input.bytes_left() / 8 {
            return Err(CorbaError::end_of_stream());
        }
        let profiles = (0..count)
            .map(|_| TaggedProfile::read(input))
            .collect::<Result<Vec<_>>>()?;
        Self::new(type_id, profiles)
    }

    pub fn write(&self, out: &mut CdrOutput) -> Result<()> {
        out.write_string(&self.type_id)?;
        out.write_ulong(self.profiles.len() as u32)?;
        for profile in &self.profiles {
            profile.write(out)?;
        }
        Ok(())
    }

    /// Parse the stringified form; hex digits may be in either case.
    pub fn parse(text: &str) -> Result<Self> {
        let digits = text
            .trim()
            .strip_prefix(IOR_PREFIX)
            .ok_or_else(|| CorbaError::inv_objref(minor::MALFORMED_IOR))?;
        let bytes = hex::decode(digits).map_err(|_| CorbaError::inv_objref(minor::MALFORMED_IOR))?;
        let mut input = CdrInput::from_encapsulation(&bytes)?;
        Self::read(&mut input)
    }

    /// Stringified form: `IOR:` plus lowercase hex of a big-endian
    /// encapsulation.
    pub fn to_ior_string(&self) -> Result<String> {
        let mut out = CdrOutput::new_encapsulation(false);
        self.write(&mut out)?;
        Ok(format!("{IOR_PREFIX}{}", hex::encode(out.into_bytes())))
    }
}

impl FromStr for Ior {
    type Err = CorbaError;

    fn from_str(s: &str) -> Result<Self> {
        Ior::parse(s)
    }
}

impl fmt::Display for Ior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_ior_string() {
            Ok(text) => write!(f, "{text}"),
            Err(_) => write!(f, "IOR(<{}>)", self.type_id),
        }
    }
}
