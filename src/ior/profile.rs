// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! IOR profiles.

use serde::{Deserialize, Serialize};

use super::codeset::CodeSetComponentData;
use super::component::{global_component_registry, TaggedComponent};
use crate::core::{minor, CorbaError, GiopVersion, Result};
use crate::encoding::cdr::{CdrInput, CdrOutput};

/// Profile id of the Internet IIOP profile (TAG_INTERNET_IOP).
pub const TAG_INTERNET_IOP: u32 = 0;
/// Profile id of the multiple components profile.
pub const TAG_MULTIPLE_COMPONENTS: u32 = 1;

/// Connection data for a TCP/IP endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternetIiopProfile {
    pub version: GiopVersion,
    pub host: String,
    pub port: u16,
    /// Issued by the server, never interpreted by anyone else
    pub object_key: Vec<u8>,
    pub components: Vec<TaggedComponent>,
}

impl InternetIiopProfile {
    pub fn new(version: GiopVersion, host: impl Into<String>, port: u16, object_key: Vec<u8>) -> Self {
        Self {
            version,
            host: host.into(),
            port,
            object_key,
            components: Vec::new(),
        }
    }

    pub fn with_component(mut self, component: TaggedComponent) -> Self {
        self.components.push(component);
        self
    }

    /// The codeset component, if the profile carries one.
    pub fn code_sets(&self) -> Option<&CodeSetComponentData> {
        self.components.iter().find_map(TaggedComponent::code_sets)
    }

    /// Read the profile body from its encapsulation.
    fn read_body(body: &mut CdrInput<'_>) -> Result<Self> {
        let major = body.read_octet()?;
        let minor_version = body.read_octet()?;
        let version = GiopVersion::new(major, minor_version);
        let host = body.read_string()?;
        let port = body.read_ushort()?;
        let object_key = body.read_octet_sequence()?.to_vec();
        let components = if version.is_1_0() {
            Vec::new()
        } else {
            read_components(body)?
        };
        Ok(Self {
            version,
            host,
            port,
            object_key,
            components,
        })
    }

    fn write_body(&self, body: &mut CdrOutput) -> Result<()> {
        body.write_octet(self.version.major)?;
        body.write_octet(self.version.minor)?;
        body.write_string(&self.host)?;
        body.write_ushort(self.port)?;
        body.write_octet_sequence(&self.object_key)?;
        if !self.version.is_1_0() {
            write_components(body, &self.components)?;
        }
        Ok(())
    }
}

fn read_components(body: &mut CdrInput<'_>) -> Result<Vec<TaggedComponent>> {
    let count = body.read_ulong()? as usize;
    // every component needs at least its id and length
    if count > body.bytes_left() / 8 {
        return Err(CorbaError::end_of_stream());
    }
    let registry = global_component_registry();
    (0..count)
        .map(|_| TaggedComponent::read(body, registry))
        .collect()
}

fn write_components(body: &mut CdrOutput, components: &[TaggedComponent]) -> Result<()> {
    let registry = global_component_registry();
    body.write_ulong(components.len() as u32)?;
    for component in components {
        component.write(body, registry)?;
    }
    Ok(())
}

/// A profile inside an IOR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaggedProfile {
    InternetIiop(InternetIiopProfile),
    MultipleComponents(Vec<TaggedComponent>),
}

impl TaggedProfile {
    pub fn id(&self) -> u32 {
        match self {
            TaggedProfile::InternetIiop(_) => TAG_INTERNET_IOP,
            TaggedProfile::MultipleComponents(_) => TAG_MULTIPLE_COMPONENTS,
        }
    }

    /// Read a profile id and its encapsulated body.
    ///
    /// Unknown profile ids fail the parse with INV_OBJREF 9421.
    pub fn read(input: &mut CdrInput<'_>) -> Result<Self> {
        let id = input.read_ulong()?;
        match id {
            TAG_INTERNET_IOP => {
                let mut body = input.read_encapsulation()?;
                InternetIiopProfile::read_body(&mut body).map(TaggedProfile::InternetIiop)
            }
            TAG_MULTIPLE_COMPONENTS => {
                let mut body = input.read_encapsulation()?;
                read_components(&mut body).map(TaggedProfile::MultipleComponents)
            }
            _ => Err(CorbaError::inv_objref(minor::UNKNOWN_PROFILE)),
        }
    }

    pub fn write(&self, out: &mut CdrOutput) -> Result<()> {
        out.write_ulong(self.id())?;
        let mut body = out.encapsulation_stream();
        match self {
            TaggedProfile::InternetIiop(profile) => profile.write_body(&mut body)?,
            TaggedProfile::MultipleComponents(components) => {
                write_components(&mut body, components)?
            }
        }
        out.write_encapsulation(body)?;
        Ok(())
    }

    pub fn as_iiop(&self) -> Option<&InternetIiopProfile> {
        match self {
            TaggedProfile::InternetIiop(profile) => Some(profile),
            TaggedProfile::MultipleComponents(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SystemExceptionKind;

    fn round_trip(profile: &TaggedProfile, little_endian: bool) -> TaggedProfile {
        let mut out = CdrOutput::new(little_endian);
        profile.write(&mut out).expect("write");
        let bytes = out.into_bytes();
        let mut input = CdrInput::new(&bytes, little_endian);
        let back = TaggedProfile::read(&mut input).expect("read");
        assert!(input.is_at_end());
        back
    }

    #[test]
    fn test_iiop_1_0_has_no_components() {
        let profile = TaggedProfile::InternetIiop(InternetIiopProfile::new(
            GiopVersion::V1_0,
            "localhost",
            2809,
            b"key".to_vec(),
        ));
        let mut out = CdrOutput::new(false);
        profile.write(&mut out).expect("write");
        let bytes = out.into_bytes();
        // id, length, flag, 1, 0, pad, host(4+10), port, key(4+3)
        assert_eq!(&bytes[0..4], &[0, 0, 0, 0]);
        assert_eq!(round_trip(&profile, false), profile);
    }

    #[test]
    fn test_iiop_1_2_with_code_sets() {
        let profile = TaggedProfile::InternetIiop(
            InternetIiopProfile::new(GiopVersion::V1_2, "10.0.0.1", 8085, b"obj".to_vec())
                .with_component(TaggedComponent::default_code_sets()),
        );
        let back = round_trip(&profile, true);
        assert_eq!(back, profile);
        assert!(back.as_iiop().and_then(InternetIiopProfile::code_sets).is_some());
    }

    #[test]
    fn test_multiple_components_profile() {
        let profile = TaggedProfile::MultipleComponents(vec![TaggedComponent::default_code_sets()]);
        assert_eq!(round_trip(&profile, false), profile);
        assert_eq!(profile.id(), 1);
    }

    #[test]
    fn test_unknown_profile_id() {
        let bytes = [0, 0, 0, 9, 0, 0, 0, 0];
        let err = TaggedProfile::read(&mut CdrInput::new(&bytes, false)).unwrap_err();
        assert!(err.is_system(SystemExceptionKind::InvObjref));
        assert_eq!(err.minor_code(), Some(9421));
    }
}
