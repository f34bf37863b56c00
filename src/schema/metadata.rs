// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Type metadata table.
//!
//! Every type the mapping engine can marshal beyond primitives is described
//! by a [`TypeMetadata`] entry, keyed by its repository id. Entries are built
//! once (by hand, by generated code, or from a received TypeCode) and never
//! change afterwards.

use serde::{Deserialize, Serialize};

use super::directive::{Directive, DirectiveKind, DirectiveSet};
use crate::core::{PrimitiveKind, Value};

/// Repository id of the universal object type (`CORBA::Object`).
pub const OBJECT_REPOSITORY_ID: &str = "IDL:omg.org/CORBA/Object:1.0";

/// The statically declared type at a declaration site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormalType {
    /// No value (operation without result)
    Void,
    /// IDL primitive
    Primitive(PrimitiveKind),
    /// Language-level array; the directives decide between sequence and array
    Array(Box<FormalType>),
    /// A registered type, by repository id
    Named(String),
    /// The universal object reference type
    Object,
    /// IDL `any`
    Any,
    /// IDL `TypeCode`
    TypeCode,
}

impl FormalType {
    pub fn named(repository_id: impl Into<String>) -> Self {
        FormalType::Named(repository_id.into())
    }

    pub fn array(element: FormalType) -> Self {
        FormalType::Array(Box::new(element))
    }

    /// Repository id for named types.
    pub fn repository_id(&self) -> Option<&str> {
        match self {
            FormalType::Named(id) => Some(id),
            _ => None,
        }
    }

    /// Short description used in cache keys and log lines.
    pub fn describe(&self) -> String {
        match self {
            FormalType::Void => "void".to_string(),
            FormalType::Primitive(kind) => kind.to_string(),
            FormalType::Array(element) => format!("{}[]", element.describe()),
            FormalType::Named(id) => id.clone(),
            FormalType::Object => "Object".to_string(),
            FormalType::Any => "any".to_string(),
            FormalType::TypeCode => "TypeCode".to_string(),
        }
    }
}

/// A field of a struct, exception or value type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub name: String,
    pub formal: FormalType,
    pub directives: DirectiveSet,
}

impl FieldMeta {
    pub fn new(name: impl Into<String>, formal: FormalType) -> Self {
        Self {
            name: name.into(),
            formal,
            directives: DirectiveSet::new(),
        }
    }

    pub fn with_directives(mut self, directives: DirectiveSet) -> Self {
        self.directives = directives;
        self
    }
}

/// One arm of a union.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionCase {
    /// Discriminator values selecting this arm
    pub labels: Vec<Value>,
    pub name: String,
    pub formal: FormalType,
    pub directives: DirectiveSet,
}

impl UnionCase {
    pub fn new(labels: Vec<Value>, name: impl Into<String>, formal: FormalType) -> Self {
        Self {
            labels,
            name: name.into(),
            formal,
            directives: DirectiveSet::new(),
        }
    }

    pub fn with_directives(mut self, directives: DirectiveSet) -> Self {
        self.directives = directives;
        self
    }
}

/// Structural shape of a registered type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeKind {
    Struct {
        fields: Vec<FieldMeta>,
    },
    Union {
        discriminator: FormalType,
        cases: Vec<UnionCase>,
        /// Index into `cases` of the default arm
        default_case: Option<usize>,
    },
    Enum {
        members: Vec<String>,
        /// Integer codec for enums that are not true IDL enums
        underlying: PrimitiveKind,
    },
    Interface {
        bases: Vec<String>,
        is_abstract: bool,
    },
    ValueType {
        base: Option<String>,
        fields: Vec<FieldMeta>,
        is_abstract: bool,
    },
    ValueBox {
        content: FormalType,
        directives: DirectiveSet,
    },
    Exception {
        fields: Vec<FieldMeta>,
    },
    Alias {
        content: FormalType,
        directives: DirectiveSet,
    },
}

/// Immutable description of a registered type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeMetadata {
    pub repository_id: String,
    pub name: String,
    pub kind: TypeKind,
    /// Type-level directives
    pub directives: DirectiveSet,
}

impl TypeMetadata {
    /// Create a metadata entry. Fields are put into serialization order.
    pub fn new(
        repository_id: impl Into<String>,
        name: impl Into<String>,
        kind: TypeKind,
        directives: DirectiveSet,
    ) -> Self {
        let mut meta = Self {
            repository_id: repository_id.into(),
            name: name.into(),
            kind,
            directives,
        };
        meta.order_fields();
        meta
    }

    pub fn structure(id: &str, name: &str, fields: Vec<FieldMeta>) -> Self {
        Self::new(id, name, TypeKind::Struct { fields }, DirectiveSet::new())
    }

    pub fn exception(id: &str, name: &str, fields: Vec<FieldMeta>) -> Self {
        Self::new(id, name, TypeKind::Exception { fields }, DirectiveSet::new())
    }

    pub fn union(
        id: &str,
        name: &str,
        discriminator: FormalType,
        cases: Vec<UnionCase>,
        default_case: Option<usize>,
    ) -> Self {
        Self::new(
            id,
            name,
            TypeKind::Union {
                discriminator,
                cases,
                default_case,
            },
            DirectiveSet::new(),
        )
    }

    /// A true IDL enum.
    pub fn enumeration(id: &str, name: &str, members: &[&str]) -> Self {
        Self::new(
            id,
            name,
            TypeKind::Enum {
                members: members.iter().map(|m| m.to_string()).collect(),
                underlying: PrimitiveKind::ULong,
            },
            DirectiveSet::from(vec![Directive::IdlEnum]),
        )
    }

    /// An integer-backed (flags) enum, marshalled through its underlying type.
    pub fn flags_enum(id: &str, name: &str, members: &[&str], underlying: PrimitiveKind) -> Self {
        Self::new(
            id,
            name,
            TypeKind::Enum {
                members: members.iter().map(|m| m.to_string()).collect(),
                underlying,
            },
            DirectiveSet::new(),
        )
    }

    pub fn interface(id: &str, name: &str, bases: &[&str]) -> Self {
        Self::new(
            id,
            name,
            TypeKind::Interface {
                bases: bases.iter().map(|b| b.to_string()).collect(),
                is_abstract: false,
            },
            DirectiveSet::new(),
        )
    }

    pub fn abstract_interface(id: &str, name: &str, bases: &[&str]) -> Self {
        Self::new(
            id,
            name,
            TypeKind::Interface {
                bases: bases.iter().map(|b| b.to_string()).collect(),
                is_abstract: true,
            },
            DirectiveSet::new(),
        )
    }

    pub fn value_type(id: &str, name: &str, base: Option<&str>, fields: Vec<FieldMeta>) -> Self {
        Self::new(
            id,
            name,
            TypeKind::ValueType {
                base: base.map(str::to_string),
                fields,
                is_abstract: false,
            },
            DirectiveSet::new(),
        )
    }

    pub fn value_box(id: &str, name: &str, content: FormalType, directives: DirectiveSet) -> Self {
        Self::new(
            id,
            name,
            TypeKind::ValueBox {
                content,
                directives,
            },
            DirectiveSet::new(),
        )
    }

    pub fn alias(id: &str, name: &str, content: FormalType, directives: DirectiveSet) -> Self {
        Self::new(
            id,
            name,
            TypeKind::Alias {
                content,
                directives,
            },
            DirectiveSet::new(),
        )
    }

    /// Replace the type-level directives, re-ordering fields if needed.
    pub fn with_directives(mut self, directives: DirectiveSet) -> Self {
        self.directives = directives;
        self.order_fields();
        self
    }

    /// Fields in serialization order (empty for kinds without fields).
    pub fn fields(&self) -> &[FieldMeta] {
        match &self.kind {
            TypeKind::Struct { fields }
            | TypeKind::Exception { fields }
            | TypeKind::ValueType { fields, .. } => fields,
            _ => &[],
        }
    }

    pub fn is_idl_enum(&self) -> bool {
        self.directives.contains(DirectiveKind::IdlEnum)
    }

    /// Sort fields by their order directive when the type asks for it.
    ///
    /// Fields without an order directive keep declaration order and go last.
    fn order_fields(&mut self) {
        if !self
            .directives
            .contains(DirectiveKind::ExplicitSerializationOrdered)
        {
            return;
        }
        let fields = match &mut self.kind {
            TypeKind::Struct { fields }
            | TypeKind::Exception { fields }
            | TypeKind::ValueType { fields, .. } => fields,
            _ => return,
        };
        fields.sort_by_key(|f| f.directives.serialization_order().unwrap_or(u32::MAX));
    }
}
