// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Codeset negotiation data carried in IIOP profiles.

use serde::{Deserialize, Serialize};

use crate::core::{minor, CompletionStatus, CorbaError, Result, SystemExceptionKind};
use crate::encoding::cdr::codeset::{
    CharCodeSet, CodeSetContext, WCharCodeSet, ISO646, LATIN1, UCS2_LEVEL1, UTF16, UTF8,
};
use crate::encoding::cdr::{CdrInput, CdrOutput};

/// Tag of the codeset component (TAG_CODE_SETS).
pub const TAG_CODE_SETS: u32 = 1;

/// Native codeset plus the sets the owner can convert from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSetComponent {
    pub native_set: u32,
    pub conversion_sets: Vec<u32>,
}

impl CodeSetComponent {
    pub fn new(native_set: u32, conversion_sets: Vec<u32>) -> Self {
        Self {
            native_set,
            conversion_sets,
        }
    }

    fn read(input: &mut CdrInput<'_>) -> Result<Self> {
        let native_set = input.read_ulong()?;
        let count = input.read_ulong()? as usize;
        if count > input.bytes_left() / 4 {
            return Err(CorbaError::end_of_stream());
        }
        let conversion_sets = (0..count)
            .map(|_| input.read_ulong())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            native_set,
            conversion_sets,
        })
    }

    fn write(&self, out: &mut CdrOutput) -> Result<()> {
        out.write_ulong(self.native_set)?;
        out.write_ulong(self.conversion_sets.len() as u32)?;
        for set in &self.conversion_sets {
            out.write_ulong(*set)?;
        }
        Ok(())
    }
}

/// Body of the TAG_CODE_SETS component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSetComponentData {
    pub char_sets: CodeSetComponent,
    pub wchar_sets: CodeSetComponent,
}

impl Default for CodeSetComponentData {
    fn default() -> Self {
        Self {
            char_sets: CodeSetComponent::new(LATIN1, vec![UTF8, ISO646]),
            wchar_sets: CodeSetComponent::new(UTF16, vec![UCS2_LEVEL1]),
        }
    }
}

impl CodeSetComponentData {
    /// Component data advertising the given native sets and the default
    /// conversion sets.
    pub fn with_native(char_set: u32, wchar_set: u32) -> Self {
        let defaults = Self::default();
        Self {
            char_sets: CodeSetComponent::new(char_set, defaults.char_sets.conversion_sets),
            wchar_sets: CodeSetComponent::new(wchar_set, defaults.wchar_sets.conversion_sets),
        }
    }

    /// Decode from the component's encapsulation bytes.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut input = CdrInput::from_encapsulation(data)?;
        Ok(Self {
            char_sets: CodeSetComponent::read(&mut input)?,
            wchar_sets: CodeSetComponent::read(&mut input)?,
        })
    }

    /// Encode as encapsulation bytes.
    pub fn encode(&self, little_endian: bool) -> Result<Vec<u8>> {
        let mut out = CdrOutput::new_encapsulation(little_endian);
        self.char_sets.write(&mut out)?;
        self.wchar_sets.write(&mut out)?;
        Ok(out.into_bytes())
    }

    /// Pick the narrow codeset for talking to the owner of this component.
    ///
    /// Preference: the server's native set if it is ours or one we know,
    /// then a server conversion set equal to our native set, then any
    /// server conversion set we know.
    pub fn choose_char_set(&self, our_native: u32) -> Result<u32> {
        choose(
            &self.char_sets,
            our_native,
            |id| CharCodeSet::from_id(id).is_some(),
            minor::CHAR_CODESET_INCOMPATIBLE,
        )
    }

    /// Pick the wide codeset, with the same preference order as
    /// [`choose_char_set`](Self::choose_char_set).
    pub fn choose_wchar_set(&self, our_native: u32) -> Result<u32> {
        choose(
            &self.wchar_sets,
            our_native,
            |id| WCharCodeSet::from_id(id).is_some(),
            minor::WCHAR_CODESET_INCOMPATIBLE,
        )
    }

    /// Negotiate both sets and build the resulting stream context.
    pub fn negotiate(&self, our_char: u32, our_wchar: u32) -> Result<CodeSetContext> {
        let char_set = self.choose_char_set(our_char)?;
        let wchar_set = self.choose_wchar_set(our_wchar)?;
        CodeSetContext::from_ids(char_set, wchar_set)
    }
}

fn choose(
    offered: &CodeSetComponent,
    our_native: u32,
    known: impl Fn(u32) -> bool,
    incompatible_minor: u32,
) -> Result<u32> {
    if offered.native_set == our_native || known(offered.native_set) {
        return Ok(offered.native_set);
    }
    if offered.conversion_sets.contains(&our_native) {
        return Ok(our_native);
    }
    offered
        .conversion_sets
        .iter()
        .copied()
        .find(|&id| known(id))
        .ok_or_else(|| {
            CorbaError::system(
                SystemExceptionKind::CodesetIncompatible,
                incompatible_minor,
                CompletionStatus::CompletedNo,
            )
        })
}

/// Server-side check of the codesets a client chose.
pub fn check_codesets_compatible(char_set: u32, wchar_set: u32) -> Result<CodeSetContext> {
    CodeSetContext::from_ids(char_set, wchar_set)
}
