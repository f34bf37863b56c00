// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Value marshalling driven by formal types.
//!
//! - [`engine`] - the mapping engine turning [`Value`](crate::core::Value)s
//!   into CDR and back
//! - [`typecode`] - the TypeCode model and its wire form
//! - [`typecode_cache`] - TypeCodes derived from formal types, and back

pub mod engine;
pub mod typecode;
pub mod typecode_cache;

pub use engine::{
    read_system_exception, write_system_exception, Classified, FormalKind, Marshaller,
    ValueSession, VALUE_TAG_SINGLE_ID,
};
pub use typecode::{TcKind, TcMember, TcUnionMember, TcValueMember, TypeCode};
pub use typecode_cache::{simple_name, typecode_to_formal, TypeCodeCache};
