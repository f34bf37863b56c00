// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Type metadata and marshalling directives.
//!
//! This module provides the static description the mapping engine is driven by:
//! - [`metadata`] - formal types and the per-type metadata table entries
//! - [`directive`] - directive values and immutable directive sets

pub mod directive;
pub mod metadata;

pub use directive::{Directive, DirectiveKind, DirectiveSet};
pub use metadata::{
    FieldMeta, FormalType, TypeKind, TypeMetadata, UnionCase, OBJECT_REPOSITORY_ID,
};
