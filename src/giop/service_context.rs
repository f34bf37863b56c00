// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Service contexts carried by requests and replies.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::Result;
use crate::encoding::cdr::{CdrInput, CdrOutput};

/// Service context id of the negotiated codesets.
pub const CODE_SETS_CONTEXT_ID: u32 = 1;

/// One (service id, opaque data) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceContext {
    pub id: u32,
    #[serde(with = "super::hex_bytes")]
    pub data: Vec<u8>,
}

impl ServiceContext {
    pub fn new(id: u32, data: Vec<u8>) -> Self {
        Self { id, data }
    }

    /// The codeset context holding the chosen (char, wchar) pair.
    pub fn code_sets(char_set: u32, wchar_set: u32, little_endian: bool) -> Result<Self> {
        let mut out = CdrOutput::new_encapsulation(little_endian);
        out.write_ulong(char_set)?;
        out.write_ulong(wchar_set)?;
        Ok(Self::new(CODE_SETS_CONTEXT_ID, out.into_bytes()))
    }
}

/// Ordered service context list; ids are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceContextList {
    contexts: Vec<ServiceContext>,
}

impl ServiceContextList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a context, replacing any context with the same id.
    pub fn insert(&mut self, context: ServiceContext) {
        match self.contexts.iter_mut().find(|c| c.id == context.id) {
            Some(existing) => *existing = context,
            None => self.contexts.push(context),
        }
    }

    pub fn get(&self, id: u32) -> Option<&ServiceContext> {
        self.contexts.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceContext> {
        self.contexts.iter()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Decoded codeset context, if present.
    pub fn code_sets(&self) -> Result<Option<(u32, u32)>> {
        let Some(context) = self.get(CODE_SETS_CONTEXT_ID) else {
            return Ok(None);
        };
        let mut input = CdrInput::from_encapsulation(&context.data)?;
        let char_set = input.read_ulong()?;
        let wchar_set = input.read_ulong()?;
        Ok(Some((char_set, wchar_set)))
    }

    /// Read a list: count, then (id, octet sequence) pairs.
    ///
    /// A repeated id keeps the first occurrence.
    pub fn read(input: &mut CdrInput<'_>) -> Result<Self> {
        let count = input.read_ulong()? as usize;
        let mut list = Self::new();
        for _ in 0..count {
            let id = input.read_ulong()?;
            let data = input.read_octet_sequence()?.to_vec();
            if list.contains(id) {
                warn!(context = "service_context", id, "duplicated service context ignored");
                continue;
            }
            list.contexts.push(ServiceContext::new(id, data));
        }
        Ok(list)
    }

    pub fn write(&self, out: &mut CdrOutput) -> Result<()> {
        out.write_ulong(self.contexts.len() as u32)?;
        for context in &self.contexts {
            out.write_ulong(context.id)?;
            out.write_octet_sequence(&context.data)?;
        }
        Ok(())
    }
}

impl FromIterator<ServiceContext> for ServiceContextList {
    fn from_iter<I: IntoIterator<Item = ServiceContext>>(iter: I) -> Self {
        let mut list = Self::new();
        for context in iter {
            list.insert(context);
        }
        list
    }
}
