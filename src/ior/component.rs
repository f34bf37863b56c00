// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Tagged components and the per-tag codec registry.
//!
//! Components whose tag has a registered codec are decoded into structured
//! data. Everything else is kept as opaque bytes and written back unchanged.
//!
//! # Example
//!
//! ```
//! use iiopcodec::ior::component::{global_component_registry, ComponentData};
//! use iiopcodec::ior::codeset::{CodeSetComponentData, TAG_CODE_SETS};
//!
//! let bytes = CodeSetComponentData::default().encode(false).unwrap();
//! let data = global_component_registry().decode(TAG_CODE_SETS, &bytes).unwrap();
//! assert!(matches!(data, ComponentData::CodeSets(_)));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::codeset::{CodeSetComponentData, TAG_CODE_SETS};
use crate::core::{CorbaError, Result};
use crate::encoding::cdr::{CdrInput, CdrOutput};

/// Decoded content of a tagged component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComponentData {
    CodeSets(CodeSetComponentData),
    Opaque(Vec<u8>),
}

/// A (tag, data) pair inside an IIOP profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedComponent {
    pub id: u32,
    pub data: ComponentData,
}

impl TaggedComponent {
    pub fn new(id: u32, data: ComponentData) -> Self {
        Self { id, data }
    }

    /// The default codeset component advertised by new profiles.
    pub fn default_code_sets() -> Self {
        Self::new(
            TAG_CODE_SETS,
            ComponentData::CodeSets(CodeSetComponentData::default()),
        )
    }

    pub fn code_sets(&self) -> Option<&CodeSetComponentData> {
        match &self.data {
            ComponentData::CodeSets(data) => Some(data),
            ComponentData::Opaque(_) => None,
        }
    }

    /// Read `id` and the encapsulated body, decoding it through `registry`.
    pub fn read(input: &mut CdrInput<'_>, registry: &ComponentRegistry) -> Result<Self> {
        let id = input.read_ulong()?;
        let body = input.read_octet_sequence()?;
        let data = registry.decode(id, body)?;
        Ok(Self { id, data })
    }

    pub fn write(&self, out: &mut CdrOutput, registry: &ComponentRegistry) -> Result<()> {
        let body = registry.encode(self, out.is_little_endian())?;
        out.write_ulong(self.id)?;
        out.write_octet_sequence(&body)?;
        Ok(())
    }
}

/// Codec for one component tag.
pub trait ComponentCodec: Send + Sync {
    fn decode(&self, data: &[u8]) -> Result<ComponentData>;

    fn encode(&self, data: &ComponentData, little_endian: bool) -> Result<Vec<u8>>;
}

struct CodeSetsCodec;

impl ComponentCodec for CodeSetsCodec {
    fn decode(&self, data: &[u8]) -> Result<ComponentData> {
        CodeSetComponentData::decode(data).map(ComponentData::CodeSets)
    }

    fn encode(&self, data: &ComponentData, little_endian: bool) -> Result<Vec<u8>> {
        match data {
            ComponentData::CodeSets(sets) => sets.encode(little_endian),
            ComponentData::Opaque(bytes) => Ok(bytes.clone()),
        }
    }
}

/// Registry of component codecs keyed by tag.
#[derive(Default)]
pub struct ComponentRegistry {
    codecs: RwLock<HashMap<u32, Arc<dyn ComponentCodec>>>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in codecs.
    pub fn with_builtin() -> Self {
        let mut codecs: HashMap<u32, Arc<dyn ComponentCodec>> = HashMap::new();
        codecs.insert(TAG_CODE_SETS, Arc::new(CodeSetsCodec));
        Self {
            codecs: RwLock::new(codecs),
        }
    }

    /// Register a codec for a tag, replacing any earlier one.
    pub fn register(&self, id: u32, codec: Arc<dyn ComponentCodec>) -> Result<()> {
        let mut codecs = self
            .codecs
            .write()
            .map_err(|e| CorbaError::Other(format!("Registry lock poisoned: {e}")))?;
        codecs.insert(id, codec);
        Ok(())
    }

    pub fn has_codec(&self, id: u32) -> bool {
        self.codecs
            .read()
            .map(|codecs| codecs.contains_key(&id))
            .unwrap_or(false)
    }

    fn codec(&self, id: u32) -> Result<Option<Arc<dyn ComponentCodec>>> {
        let codecs = self
            .codecs
            .read()
            .map_err(|e| CorbaError::Other(format!("Registry lock poisoned: {e}")))?;
        Ok(codecs.get(&id).cloned())
    }

    /// Decode a component body. Unknown tags are kept as opaque bytes.
    pub fn decode(&self, id: u32, data: &[u8]) -> Result<ComponentData> {
        match self.codec(id)? {
            Some(codec) => codec.decode(data),
            None => {
                warn!(
                    context = "tagged_component",
                    tag = id,
                    len = data.len(),
                    "Unknown tagged component kept as opaque data"
                );
                Ok(ComponentData::Opaque(data.to_vec()))
            }
        }
    }

    /// Encode a component body.
    pub fn encode(&self, component: &TaggedComponent, little_endian: bool) -> Result<Vec<u8>> {
        if let ComponentData::Opaque(bytes) = &component.data {
            return Ok(bytes.clone());
        }
        match self.codec(component.id)? {
            Some(codec) => codec.encode(&component.data, little_endian),
            None => Err(CorbaError::Other(format!(
                "no codec registered for tagged component {}",
                component.id
            ))),
        }
    }
}

static GLOBAL_REGISTRY: OnceLock<ComponentRegistry> = OnceLock::new();

/// Get the process-wide component registry.
pub fn global_component_registry() -> &'static ComponentRegistry {
    GLOBAL_REGISTRY.get_or_init(ComponentRegistry::with_builtin)
}
