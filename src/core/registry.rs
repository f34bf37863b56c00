// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Process-wide type registries.
//!
//! [`TypeRegistry`] is a read-mostly map guarded by an `RwLock`. Entries are
//! published once and never replaced, so concurrent connection threads can
//! populate it lazily and always observe the same answer for a key.
//!
//! [`Repository`] builds on it to map repository ids to [`TypeMetadata`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use super::error::{CorbaError, Result};
use crate::schema::{TypeKind, TypeMetadata, OBJECT_REPOSITORY_ID};

/// Thread-safe, publish-once registry.
pub struct TypeRegistry<T> {
    inner: RwLock<HashMap<String, T>>,
}

impl<T> Default for TypeRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TypeRegistry<T> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Publish an entry unless the key is already taken.
    ///
    /// Returns the entry that is registered after the call, which is the
    /// earlier one if the key was already present.
    pub fn publish(&self, name: impl Into<String>, entry: T) -> Result<T>
    where
        T: Clone,
    {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| CorbaError::Other(format!("Registry lock poisoned: {e}")))?;
        Ok(inner.entry(name.into()).or_insert(entry).clone())
    }

    /// Get an entry by name.
    pub fn get(&self, name: &str) -> Result<Option<T>>
    where
        T: Clone,
    {
        let inner = self
            .inner
            .read()
            .map_err(|e| CorbaError::Other(format!("Registry lock poisoned: {e}")))?;
        Ok(inner.get(name).cloned())
    }

    /// Check if an entry is registered.
    pub fn contains(&self, name: &str) -> Result<bool> {
        let inner = self
            .inner
            .read()
            .map_err(|e| CorbaError::Other(format!("Registry lock poisoned: {e}")))?;
        Ok(inner.contains_key(name))
    }

    /// Get all registered names.
    pub fn names(&self) -> Result<Vec<String>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| CorbaError::Other(format!("Registry lock poisoned: {e}")))?;
        Ok(inner.keys().cloned().collect())
    }

    /// Number of registered entries.
    pub fn len(&self) -> Result<usize> {
        let inner = self
            .inner
            .read()
            .map_err(|e| CorbaError::Other(format!("Registry lock poisoned: {e}")))?;
        Ok(inner.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Maps wire repository ids to type metadata.
///
/// Populated incrementally; once an id is registered the answer for it never
/// changes for the lifetime of the repository.
#[derive(Default)]
pub struct Repository {
    types: TypeRegistry<Arc<TypeMetadata>>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type. The first registration for an id wins.
    pub fn register(&self, meta: TypeMetadata) -> Result<Arc<TypeMetadata>> {
        let id = meta.repository_id.clone();
        let published = self.types.publish(id.clone(), Arc::new(meta))?;
        tracing::debug!(repository_id = %id, "type registered");
        Ok(published)
    }

    /// Look up metadata by repository id.
    pub fn type_for_wire_id(&self, id: &str) -> Result<Option<Arc<TypeMetadata>>> {
        self.types.get(id)
    }

    /// Look up metadata by repository id, failing with INTF_REPOS if unknown.
    pub fn require(&self, id: &str) -> Result<Arc<TypeMetadata>> {
        self.type_for_wire_id(id)?
            .ok_or_else(CorbaError::unknown_repository_id)
    }

    /// Look up metadata, computing and registering it on first use.
    pub fn get_or_register_with<F>(&self, id: &str, build: F) -> Result<Arc<TypeMetadata>>
    where
        F: FnOnce() -> Result<TypeMetadata>,
    {
        if let Some(meta) = self.type_for_wire_id(id)? {
            return Ok(meta);
        }
        self.register(build()?)
    }

    /// Wire id for a type.
    pub fn wire_id_for_type<'m>(&self, meta: &'m TypeMetadata) -> &'m str {
        &meta.repository_id
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        self.types.contains(id)
    }

    pub fn len(&self) -> Result<usize> {
        self.types.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.types.is_empty()
    }

    /// Check whether `actual` is `formal` or derives from it.
    ///
    /// Interfaces follow their base list, value types their base chain.
    /// Every type is assignable to the universal object type.
    pub fn is_assignable(&self, actual: &str, formal: &str) -> Result<bool> {
        if actual == formal || formal == OBJECT_REPOSITORY_ID {
            return Ok(true);
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([actual.to_string()]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if id == formal {
                return Ok(true);
            }
            let Some(meta) = self.type_for_wire_id(&id)? else {
                continue;
            };
            match &meta.kind {
                TypeKind::Interface { bases, .. } => queue.extend(bases.iter().cloned()),
                TypeKind::ValueType {
                    base: Some(base), ..
                } => queue.push_back(base.clone()),
                _ => {}
            }
        }
        Ok(false)
    }

    /// Value type inheritance chain, root first, ending with `id` itself.
    pub fn value_hierarchy(&self, id: &str) -> Result<Vec<Arc<TypeMetadata>>> {
        let mut chain = Vec::new();
        let mut current = Some(id.to_string());
        while let Some(current_id) = current {
            if chain
                .iter()
                .any(|m: &Arc<TypeMetadata>| m.repository_id == current_id)
            {
                return Err(CorbaError::Other(format!(
                    "cyclic value type hierarchy at {current_id}"
                )));
            }
            let meta = self.require(&current_id)?;
            current = match &meta.kind {
                TypeKind::ValueType { base, .. } => base.clone(),
                _ => None,
            };
            chain.push(meta);
        }
        chain.reverse();
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PrimitiveKind;
    use crate::schema::{FieldMeta, FormalType};

    fn long_field(name: &str) -> FieldMeta {
        FieldMeta::new(name, FormalType::Primitive(PrimitiveKind::Long))
    }

    #[test]
    fn test_publish_keeps_first_entry() {
        let registry: TypeRegistry<u32> = TypeRegistry::new();
        assert_eq!(registry.publish("a", 1).expect("publish"), 1);
        assert_eq!(registry.publish("a", 2).expect("publish"), 1);
        assert_eq!(registry.get("a").expect("get"), Some(1));
        assert_eq!(registry.len().expect("len"), 1);
    }

    #[test]
    fn test_require_unknown_id() {
        let repo = Repository::new();
        let err = repo.require("IDL:Missing:1.0").unwrap_err();
        assert!(err.is_system(crate::core::SystemExceptionKind::IntfRepos));
        assert_eq!(err.minor_code(), Some(1414));
    }

    #[test]
    fn test_register_is_consistent() {
        let repo = Repository::new();
        repo.register(TypeMetadata::structure("IDL:P:1.0", "P", vec![long_field("x")]))
            .expect("register");
        repo.register(TypeMetadata::structure("IDL:P:1.0", "Other", vec![]))
            .expect("register");
        let meta = repo.require("IDL:P:1.0").expect("lookup");
        assert_eq!(meta.name, "P");
        assert_eq!(meta.fields().len(), 1);
    }

    #[test]
    fn test_interface_assignability() {
        let repo = Repository::new();
        repo.register(TypeMetadata::interface("IDL:Base:1.0", "Base", &[]))
            .expect("register");
        repo.register(TypeMetadata::interface("IDL:Mid:1.0", "Mid", &["IDL:Base:1.0"]))
            .expect("register");
        repo.register(TypeMetadata::interface("IDL:Leaf:1.0", "Leaf", &["IDL:Mid:1.0"]))
            .expect("register");
        assert!(repo.is_assignable("IDL:Leaf:1.0", "IDL:Base:1.0").expect("check"));
        assert!(!repo.is_assignable("IDL:Base:1.0", "IDL:Leaf:1.0").expect("check"));
        assert!(repo
            .is_assignable("IDL:Base:1.0", OBJECT_REPOSITORY_ID)
            .expect("check"));
    }

    #[test]
    fn test_value_hierarchy_root_first() {
        let repo = Repository::new();
        repo.register(TypeMetadata::value_type("IDL:A:1.0", "A", None, vec![long_field("a")]))
            .expect("register");
        repo.register(TypeMetadata::value_type(
            "IDL:B:1.0",
            "B",
            Some("IDL:A:1.0"),
            vec![long_field("b")],
        ))
        .expect("register");
        let chain = repo.value_hierarchy("IDL:B:1.0").expect("hierarchy");
        let ids: Vec<_> = chain.iter().map(|m| m.repository_id.as_str()).collect();
        assert_eq!(ids, vec!["IDL:A:1.0", "IDL:B:1.0"]);
    }

    #[test]
    fn test_get_or_register_with_builds_once() {
        let repo = Repository::new();
        let mut calls = 0;
        let first = repo
            .get_or_register_with("IDL:Lazy:1.0", || {
                calls += 1;
                Ok(TypeMetadata::structure("IDL:Lazy:1.0", "Lazy", vec![]))
            })
            .expect("build");
        assert_eq!(first.name, "Lazy");
        let second = repo
            .get_or_register_with("IDL:Lazy:1.0", || {
                Err(CorbaError::Other("should not be called".into()))
            })
            .expect("cached");
        assert_eq!(second.name, "Lazy");
        assert_eq!(calls, 1);
    }
}
