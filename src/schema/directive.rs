// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Marshalling directives.
//!
//! A directive carries IDL intent that the formal type alone cannot express,
//! e.g. "this array is an IDL sequence" or "this char is narrow". Directives
//! are attached to declaration sites (parameters, fields, return values) and
//! looked up by [`DirectiveKind`].
//!
//! [`DirectiveSet`] is an immutable value: every modifying operation returns
//! a new set. The mapping engine removes a directive once it has been applied
//! at one level, so nested values never see a stale directive.
//!
//! Sequence and array directives carry a nesting level. Level 0 describes
//! the innermost collection, and each enclosing collection is one level
//! higher. The engine always applies the highest level first, so the
//! meaning of a set does not depend on the order of its items.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single marshalling directive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Directive {
    /// Char/string may use the wide encoding; `false` forces narrow.
    WideChar(bool),
    /// The array is an IDL sequence. A bound of 0 means unbounded.
    Sequence { level: u32, bound: u32 },
    /// The array is an IDL fixed-size array with these dimensions.
    Array { level: u32, dimensions: Vec<u32> },
    /// The value travels as the boxed value type with this repository id.
    BoxedValue { repository_id: String },
    /// Explicit serialization position of a field.
    SerializationOrder(u32),
    /// Fields of the type follow their `SerializationOrder` directives.
    ExplicitSerializationOrdered,
    /// The enum is a true IDL enum (ordinal on the wire).
    IdlEnum,
    /// The reference is an IDL abstract interface.
    AbstractInterface,
}

/// Lookup key for directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectiveKind {
    WideChar,
    Sequence,
    Array,
    BoxedValue,
    SerializationOrder,
    ExplicitSerializationOrdered,
    IdlEnum,
    AbstractInterface,
}

impl Directive {
    /// Innermost sequence directive.
    pub fn sequence(bound: u32) -> Self {
        Directive::Sequence { level: 0, bound }
    }

    /// Innermost fixed-size array directive.
    pub fn array(dimensions: Vec<u32>) -> Self {
        Directive::Array { level: 0, dimensions }
    }

    /// Nesting level of sequence and array directives.
    pub fn level(&self) -> Option<u32> {
        match self {
            Directive::Sequence { level, .. } | Directive::Array { level, .. } => Some(*level),
            _ => None,
        }
    }

    pub fn kind(&self) -> DirectiveKind {
        match self {
            Directive::WideChar(_) => DirectiveKind::WideChar,
            Directive::Sequence { .. } => DirectiveKind::Sequence,
            Directive::Array { .. } => DirectiveKind::Array,
            Directive::BoxedValue { .. } => DirectiveKind::BoxedValue,
            Directive::SerializationOrder(_) => DirectiveKind::SerializationOrder,
            Directive::ExplicitSerializationOrdered => DirectiveKind::ExplicitSerializationOrdered,
            Directive::IdlEnum => DirectiveKind::IdlEnum,
            Directive::AbstractInterface => DirectiveKind::AbstractInterface,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::WideChar(wide) => write!(f, "wide_char({wide})"),
            Directive::Sequence { level, bound } => write!(f, "sequence@{level}({bound})"),
            Directive::Array { level, dimensions } => write!(f, "array@{level}({dimensions:?})"),
            Directive::BoxedValue { repository_id } => write!(f, "boxed({repository_id})"),
            Directive::SerializationOrder(order) => write!(f, "order({order})"),
            Directive::ExplicitSerializationOrdered => write!(f, "explicit_order"),
            Directive::IdlEnum => write!(f, "idl_enum"),
            Directive::AbstractInterface => write!(f, "abstract_interface"),
        }
    }
}

/// An immutable collection of directives.
///
/// Equality is set equality: two sets are equal when each contains every
/// element of the other, regardless of order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectiveSet {
    items: Vec<Directive>,
}

impl DirectiveSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Directive> {
        self.items.iter()
    }

    /// Check if a directive of this kind is present.
    pub fn contains(&self, kind: DirectiveKind) -> bool {
        self.items.iter().any(|d| d.kind() == kind)
    }

    /// Check if this exact directive is present.
    pub fn contains_directive(&self, directive: &Directive) -> bool {
        self.items.contains(directive)
    }

    /// First directive of the given kind.
    pub fn get(&self, kind: DirectiveKind) -> Option<&Directive> {
        self.items.iter().find(|d| d.kind() == kind)
    }

    /// New set with `directive` inserted at the front.
    pub fn with(&self, directive: Directive) -> Self {
        let mut items = Vec::with_capacity(self.items.len() + 1);
        items.push(directive);
        items.extend(self.items.iter().cloned());
        Self { items }
    }

    /// New set holding the distinct directives of `other` first, followed by
    /// the directives of `self` that `other` does not already contain.
    pub fn merge(&self, other: &DirectiveSet) -> Self {
        let mut items: Vec<Directive> = Vec::with_capacity(self.items.len() + other.items.len());
        for directive in other.items.iter().chain(self.items.iter()) {
            if !items.contains(directive) {
                items.push(directive.clone());
            }
        }
        Self { items }
    }

    /// New set with the directives of `other` whose kind is not yet present
    /// appended at the end.
    pub fn add_missing(&self, other: &DirectiveSet) -> Self {
        let mut items = self.items.clone();
        for directive in &other.items {
            if !self.contains(directive.kind()) {
                items.push(directive.clone());
            }
        }
        Self { items }
    }

    /// New set without the first directive of the given kind.
    ///
    /// The remaining directives keep their order.
    pub fn without(&self, kind: DirectiveKind) -> Self {
        self.take(kind).1
    }

    /// Split off the first directive of the given kind.
    pub fn take(&self, kind: DirectiveKind) -> (Option<Directive>, Self) {
        match self.items.iter().position(|d| d.kind() == kind) {
            Some(index) => {
                let mut items = self.items.clone();
                let removed = items.remove(index);
                (Some(removed), Self { items })
            }
            None => (None, self.clone()),
        }
    }

    /// Highest nesting level among sequence and array directives.
    pub fn outermost_level(&self) -> Option<u32> {
        self.items.iter().filter_map(Directive::level).max()
    }

    /// Level for a collection directive enclosing the ones in this set.
    pub fn next_level(&self) -> u32 {
        self.outermost_level().map_or(0, |level| level + 1)
    }

    /// Split off the sequence or array directive with the highest level.
    pub fn take_outermost(&self) -> (Option<Directive>, Self) {
        let Some(level) = self.outermost_level() else {
            return (None, self.clone());
        };
        match self.items.iter().position(|d| d.level() == Some(level)) {
            Some(index) => {
                let mut items = self.items.clone();
                let removed = items.remove(index);
                (Some(removed), Self { items })
            }
            None => (None, self.clone()),
        }
    }

    /// Whether char/string may use the wide encoding. Defaults to `true`;
    /// any `WideChar(false)` forces narrow.
    pub fn wide_char_allowed(&self) -> bool {
        !self.items.contains(&Directive::WideChar(false))
    }

    /// Explicit serialization position, if any.
    pub fn serialization_order(&self) -> Option<u32> {
        match self.get(DirectiveKind::SerializationOrder) {
            Some(Directive::SerializationOrder(order)) => Some(*order),
            _ => None,
        }
    }

    /// Order-independent textual key, used for cache lookups.
    ///
    /// Repeated directives stay in the key.
    pub fn canonical_key(&self) -> String {
        let mut parts: Vec<String> = self.items.iter().map(|d| d.to_string()).collect();
        parts.sort();
        parts.join(",")
    }
}

impl PartialEq for DirectiveSet {
    fn eq(&self, other: &Self) -> bool {
        self.items.iter().all(|d| other.items.contains(d))
            && other.items.iter().all(|d| self.items.contains(d))
    }
}

impl Eq for DirectiveSet {}

impl FromIterator<Directive> for DirectiveSet {
    fn from_iter<I: IntoIterator<Item = Directive>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Directive>> for DirectiveSet {
    fn from(items: Vec<Directive>) -> Self {
        Self { items }
    }
}
