// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Type-to-wire mapping engine.
//!
//! The wire form of a value is decided by the formal type at the
//! declaration site and its directives. Each (formal type, directives) pair
//! is classified once into a [`FormalKind`] and cached, so marshalling a
//! value is a single match on the cached kind.
//!
//! Directives that only apply to the current level (e.g. "this array is a
//! sequence") are consumed by the classification; nested values are
//! marshalled with the remaining set.

use std::collections::HashMap;
use std::num::TryFromIntError;
use std::sync::Arc;

use tracing::debug;

use super::typecode::{TypeCode, INDIRECTION_TAG};
use super::typecode_cache::{typecode_to_formal, TypeCodeCache};
use crate::core::{
    minor, CompletionStatus, CorbaError, PrimitiveKind, Repository, Result, SystemException,
    SystemExceptionKind, TypeRegistry, UserException, Value,
};
use crate::encoding::cdr::{CdrInput, CdrOutput};
use crate::ior::Ior;
use crate::schema::{
    Directive, DirectiveKind, DirectiveSet, FormalType, TypeKind, TypeMetadata, OBJECT_REPOSITORY_ID,
};

/// Lowest value tag; tags run from here to `0x7fffffff`.
pub const VALUE_TAG_BASE: u32 = 0x7fff_ff00;
/// Value tag written for values: one repository id, no codebase, not chunked.
pub const VALUE_TAG_SINGLE_ID: u32 = 0x7fff_ff02;
const VALUE_TAG_CODEBASE: u32 = 0x01;
const VALUE_TAG_TYPE_INFO: u32 = 0x06;
const VALUE_TAG_ID_LIST: u32 = 0x06;
const VALUE_TAG_ONE_ID: u32 = 0x02;
const VALUE_TAG_CHUNKED: u32 = 0x08;

/// Wire shape of a declaration site, decided once per (formal, directives).
#[derive(Debug, Clone)]
pub enum FormalKind {
    Void,
    Primitive(PrimitiveKind),
    Struct(Arc<TypeMetadata>),
    Union(Arc<TypeMetadata>),
    Sequence {
        element: FormalType,
        bound: u32,
    },
    Array {
        element: FormalType,
        level: u32,
        dimensions: Vec<u32>,
    },
    Enum(Arc<TypeMetadata>),
    ObjectRef {
        repository_id: String,
    },
    Any,
    Boxed {
        repository_id: String,
        content: FormalType,
        content_directives: DirectiveSet,
    },
    /// Abstract interface: a reference or a value, told apart by a boolean
    Abstract {
        repository_id: String,
    },
    Exception(Arc<TypeMetadata>),
    ValueType(Arc<TypeMetadata>),
    TypeCode,
}

/// A classified declaration site.
#[derive(Debug, Clone)]
pub struct Classified {
    pub kind: FormalKind,
    /// Directives left for nested values
    pub rest: DirectiveSet,
}

/// Per-message state for reading value types.
///
/// Value and repository id indirections point backwards to earlier data in
/// the same message, identified by global stream position.
#[derive(Debug, Default)]
pub struct ValueSession {
    values: HashMap<usize, Value>,
    repository_ids: HashMap<usize, String>,
}

impl ValueSession {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Marshals [`Value`]s according to formal types and directives.
///
/// # Example
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use std::sync::Arc;
/// use iiopcodec::core::{PrimitiveKind, Repository, Value};
/// use iiopcodec::encoding::cdr::{CdrInput, CdrOutput};
/// use iiopcodec::marshal::Marshaller;
/// use iiopcodec::schema::{Directive, DirectiveSet, FormalType};
///
/// let marshaller = Marshaller::new(Arc::new(Repository::new()));
/// let formal = FormalType::array(FormalType::Primitive(PrimitiveKind::Short));
/// let directives = DirectiveSet::from(vec![Directive::sequence(0)]);
/// let value = Value::Sequence(vec![Value::Short(1), Value::Short(-1)]);
///
/// let mut out = CdrOutput::new(false);
/// marshaller.write(&formal, &directives, &value, &mut out)?;
/// let bytes = out.into_bytes();
/// assert_eq!(bytes, vec![0, 0, 0, 2, 0, 1, 0xff, 0xff]);
///
/// let back = marshaller.read(&formal, &directives, &mut CdrInput::new(&bytes, false))?;
/// assert_eq!(back, value);
/// # Ok(())
/// # }
/// ```
pub struct Marshaller {
    repository: Arc<Repository>,
    type_codes: Arc<TypeCodeCache>,
    kinds: TypeRegistry<Arc<Classified>>,
    allow_null_sequences: bool,
}

impl Marshaller {
    pub fn new(repository: Arc<Repository>) -> Self {
        Self {
            repository,
            type_codes: Arc::new(TypeCodeCache::new()),
            kinds: TypeRegistry::new(),
            allow_null_sequences: true,
        }
    }

    /// Share a TypeCode cache with other marshallers.
    pub fn with_type_code_cache(mut self, cache: Arc<TypeCodeCache>) -> Self {
        self.type_codes = cache;
        self
    }

    /// Whether a null sequence is written as length 0 (default) or rejected.
    pub fn with_allow_null_sequences(mut self, allow: bool) -> Self {
        self.allow_null_sequences = allow;
        self
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    pub fn type_codes(&self) -> &Arc<TypeCodeCache> {
        &self.type_codes
    }

    /// TypeCode describing values of a declaration site.
    pub fn type_code_for(&self, formal: &FormalType, directives: &DirectiveSet) -> Result<TypeCode> {
        self.type_codes
            .type_code_for(formal, directives, &self.repository)
    }

    /// Classify a declaration site, using the cache when possible.
    pub fn classify(&self, formal: &FormalType, directives: &DirectiveSet) -> Result<Arc<Classified>> {
        let key = format!("{}|{}", formal.describe(), directives.canonical_key());
        if let Some(classified) = self.kinds.get(&key)? {
            return Ok(classified);
        }
        let classified = Arc::new(self.classify_uncached(formal, directives)?);
        debug!(key = %key, kind = ?classified.kind, "formal type classified");
        self.kinds.publish(key, classified)
    }

    fn classify_uncached(&self, formal: &FormalType, directives: &DirectiveSet) -> Result<Classified> {
        if let (Some(Directive::BoxedValue { repository_id }), rest) =
            directives.take(DirectiveKind::BoxedValue)
        {
            return Ok(Classified {
                kind: FormalKind::Boxed {
                    repository_id,
                    content: formal.clone(),
                    content_directives: rest.clone(),
                },
                rest,
            });
        }
        let plain = |kind| {
            Ok(Classified {
                kind,
                rest: directives.clone(),
            })
        };
        match formal {
            FormalType::Void => plain(FormalKind::Void),
            FormalType::Primitive(kind) => plain(FormalKind::Primitive(*kind)),
            FormalType::Any => plain(FormalKind::Any),
            FormalType::TypeCode => plain(FormalKind::TypeCode),
            FormalType::Object => {
                let repository_id = OBJECT_REPOSITORY_ID.to_string();
                if let (Some(_), rest) = directives.take(DirectiveKind::AbstractInterface) {
                    return Ok(Classified {
                        kind: FormalKind::Abstract { repository_id },
                        rest,
                    });
                }
                plain(FormalKind::ObjectRef { repository_id })
            }
            FormalType::Array(element) => {
                let element = element.as_ref().clone();
                let (outermost, rest) = directives.take_outermost();
                let Some(directive) = outermost else {
                    return plain(FormalKind::Sequence { element, bound: 0 });
                };
                // two collection directives on one level leave the shape ambiguous
                if rest.outermost_level() == directive.level() {
                    return Err(unmappable());
                }
                let kind = match directive {
                    Directive::Sequence { bound, .. } => FormalKind::Sequence { element, bound },
                    Directive::Array { level, dimensions } => {
                        if dimensions.is_empty() {
                            return Err(unmappable());
                        }
                        FormalKind::Array {
                            element,
                            level,
                            dimensions,
                        }
                    }
                    _ => return Err(unmappable()),
                };
                Ok(Classified { kind, rest })
            }
            FormalType::Named(id) => {
                let meta = self.repository.require(id)?;
                let kind = match &meta.kind {
                    TypeKind::Struct { .. } => FormalKind::Struct(meta.clone()),
                    TypeKind::Union { .. } => FormalKind::Union(meta.clone()),
                    TypeKind::Enum { .. } => FormalKind::Enum(meta.clone()),
                    TypeKind::Exception { .. } => FormalKind::Exception(meta.clone()),
                    TypeKind::ValueType { .. } => FormalKind::ValueType(meta.clone()),
                    TypeKind::Interface { is_abstract, .. } => {
                        let repository_id = id.clone();
                        if *is_abstract || directives.contains(DirectiveKind::AbstractInterface) {
                            FormalKind::Abstract { repository_id }
                        } else {
                            FormalKind::ObjectRef { repository_id }
                        }
                    }
                    TypeKind::ValueBox {
                        content,
                        directives: content_directives,
                    } => FormalKind::Boxed {
                        repository_id: id.clone(),
                        content: content.clone(),
                        content_directives: content_directives.clone(),
                    },
                    TypeKind::Alias {
                        content,
                        directives: content_directives,
                    } => {
                        return self.classify_uncached(content, &content_directives.merge(directives));
                    }
                };
                plain(kind)
            }
        }
    }

    /// Write `value` as declared by `formal` and `directives`.
    pub fn write(
        &self,
        formal: &FormalType,
        directives: &DirectiveSet,
        value: &Value,
        out: &mut CdrOutput,
    ) -> Result<()> {
        let classified = self.classify(formal, directives)?;
        let rest = &classified.rest;
        match &classified.kind {
            FormalKind::Void => Ok(()),
            FormalKind::Primitive(kind) => write_primitive(*kind, rest.wide_char_allowed(), value, out),
            FormalKind::Struct(meta) => {
                let Value::Struct(_) = value else {
                    return Err(mismatch_on_write());
                };
                self.write_fields(meta, value, out)
            }
            FormalKind::Union(meta) => self.write_union(meta, value, out),
            FormalKind::Sequence { element, bound } => {
                let items = match value {
                    Value::Null if self.allow_null_sequences => &[][..],
                    Value::Null => {
                        return Err(CorbaError::bad_param(
                            minor::NULL_NOT_ALLOWED,
                            CompletionStatus::CompletedNo,
                        ))
                    }
                    other => other.elements().ok_or_else(mismatch_on_write)?,
                };
                if *bound > 0 && items.len() > *bound as usize {
                    return Err(bound_violation(CompletionStatus::CompletedNo));
                }
                out.write_ulong(items.len() as u32)?;
                for item in items {
                    self.write(element, rest, item, out)?;
                }
                Ok(())
            }
            FormalKind::Array {
                element,
                level,
                dimensions,
            } => {
                let items = value.elements().ok_or_else(mismatch_on_write)?;
                if items.len() != dimensions[0] as usize {
                    return Err(bound_violation(CompletionStatus::CompletedNo));
                }
                let inner = inner_dimensions(*level, dimensions, rest);
                for item in items {
                    self.write(element, &inner, item, out)?;
                }
                Ok(())
            }
            FormalKind::Enum(meta) => self.write_enum(meta, value, out),
            FormalKind::ObjectRef { .. } => match value {
                Value::Null => Ior::null().write(out),
                Value::ObjectRef(ior) => ior.write(out),
                _ => Err(mismatch_on_write()),
            },
            FormalKind::Any => match value {
                Value::Null => TypeCode::Null.write(out),
                Value::Any(any) => {
                    any.type_code.write(out)?;
                    let (formal, directives) = typecode_to_formal(&any.type_code, &self.repository)?;
                    self.write(&formal, &directives, &any.value, out)
                }
                _ => Err(mismatch_on_write()),
            },
            FormalKind::TypeCode => match value {
                Value::TypeCode(tc) => tc.write(out),
                _ => Err(mismatch_on_write()),
            },
            FormalKind::Boxed {
                repository_id,
                content,
                content_directives,
            } => {
                if value.is_null() {
                    out.write_ulong(0)?;
                    return Ok(());
                }
                out.write_ulong(VALUE_TAG_SINGLE_ID)?;
                out.write_string(repository_id)?;
                self.write(content, content_directives, value, out)
            }
            FormalKind::Abstract { repository_id } => match value {
                Value::Null => {
                    out.write_bool(true)?;
                    Ior::null().write(out)
                }
                Value::ObjectRef(ior) => {
                    out.write_bool(true)?;
                    ior.write(out)
                }
                Value::ValueType { .. } => {
                    out.write_bool(false)?;
                    self.write_value_type(repository_id, value, out)
                }
                _ => Err(mismatch_on_write()),
            },
            FormalKind::ValueType(meta) => self.write_value_type(&meta.repository_id, value, out),
            FormalKind::Exception(_) => match value {
                Value::SystemException(ex) => write_system_exception(ex, out),
                Value::Exception {
                    repository_id,
                    members,
                } => self.write_user_exception(&UserException::new(repository_id.clone(), members.clone()), out),
                _ => Err(mismatch_on_write()),
            },
        }
    }

    fn write_fields(&self, meta: &TypeMetadata, value: &Value, out: &mut CdrOutput) -> Result<()> {
        for field in meta.fields() {
            let member = value.field(&field.name).ok_or_else(mismatch_on_write)?;
            self.write(&field.formal, &field.directives, member, out)?;
        }
        Ok(())
    }

    fn write_union(&self, meta: &TypeMetadata, value: &Value, out: &mut CdrOutput) -> Result<()> {
        let TypeKind::Union { discriminator: disc_formal, .. } = &meta.kind else {
            return Err(unmappable());
        };
        let Value::Union { discriminator, value } = value else {
            return Err(mismatch_on_write());
        };
        self.write(disc_formal, &DirectiveSet::new(), discriminator, out)?;
        match select_case(meta, discriminator)? {
            Some(case) => self.write(&case.formal, &case.directives, value, out),
            None => Ok(()),
        }
    }

    fn write_enum(&self, meta: &TypeMetadata, value: &Value, out: &mut CdrOutput) -> Result<()> {
        let TypeKind::Enum { members, underlying } = &meta.kind else {
            return Err(unmappable());
        };
        let raw = value.as_i64().ok_or_else(mismatch_on_write)?;
        if meta.is_idl_enum() {
            if raw < 0 || raw as usize >= members.len() {
                return Err(CorbaError::bad_param(
                    minor::ENUM_OUT_OF_RANGE,
                    CompletionStatus::CompletedNo,
                ));
            }
            out.write_ulong(raw as u32)?;
            return Ok(());
        }
        write_primitive(*underlying, false, &integer_value(*underlying, raw)?, out)
    }

    fn write_value_type(&self, formal_id: &str, value: &Value, out: &mut CdrOutput) -> Result<()> {
        let Value::ValueType {
            repository_id,
            members,
        } = value
        else {
            if value.is_null() {
                out.write_ulong(0)?;
                return Ok(());
            }
            return Err(mismatch_on_write());
        };
        if !self.repository.is_assignable(repository_id, formal_id)? {
            return Err(CorbaError::bad_param(
                minor::INCOMPATIBLE_VALUE_TYPE,
                CompletionStatus::CompletedNo,
            ));
        }
        out.write_ulong(VALUE_TAG_SINGLE_ID)?;
        out.write_string(repository_id)?;
        for meta in self.repository.value_hierarchy(repository_id)? {
            for field in meta.fields() {
                let member = members
                    .iter()
                    .find(|(name, _)| *name == field.name)
                    .map(|(_, v)| v)
                    .ok_or_else(mismatch_on_write)?;
                self.write(&field.formal, &field.directives, member, out)?;
            }
        }
        Ok(())
    }

    /// Write a user exception: repository id, then the declared fields.
    pub fn write_user_exception(&self, ex: &UserException, out: &mut CdrOutput) -> Result<()> {
        let meta = self.repository.require(&ex.repository_id)?;
        out.write_string(&ex.repository_id)?;
        let value = Value::Exception {
            repository_id: ex.repository_id.clone(),
            members: ex.members.clone(),
        };
        self.write_fields(&meta, &value, out)
    }

    /// Read a value declared by `formal` and `directives`.
    pub fn read(&self, formal: &FormalType, directives: &DirectiveSet, input: &mut CdrInput<'_>) -> Result<Value> {
        self.read_in(formal, directives, input, &mut ValueSession::new())
    }

    /// Read a value, sharing value indirection state with other reads of
    /// the same message.
    pub fn read_in(
        &self,
        formal: &FormalType,
        directives: &DirectiveSet,
        input: &mut CdrInput<'_>,
        session: &mut ValueSession,
    ) -> Result<Value> {
        let classified = self.classify(formal, directives)?;
        let rest = &classified.rest;
        match &classified.kind {
            FormalKind::Void => Ok(Value::Null),
            FormalKind::Primitive(kind) => read_primitive(*kind, rest.wide_char_allowed(), input),
            FormalKind::Struct(meta) => Ok(Value::Struct(self.read_fields(meta, input, session)?)),
            FormalKind::Union(meta) => {
                let TypeKind::Union { discriminator, .. } = &meta.kind else {
                    return Err(unmappable());
                };
                let discriminator = self.read_in(discriminator, &DirectiveSet::new(), input, session)?;
                let case = select_case(meta, &discriminator)?.ok_or_else(|| {
                    CorbaError::bad_param(minor::UNION_NO_MATCHING_CASE, CompletionStatus::CompletedMayBe)
                })?;
                let value = self.read_in(&case.formal, &case.directives, input, session)?;
                Ok(Value::union(discriminator, value))
            }
            FormalKind::Sequence { element, bound } => {
                let len = input.read_ulong()? as usize;
                if *bound > 0 && len > *bound as usize {
                    return Err(bound_violation(CompletionStatus::CompletedMayBe));
                }
                // void elements occupy no bytes, so their count cannot be checked
                if matches!(element, FormalType::Void) && len > 0 {
                    return Err(mismatch_on_read());
                }
                if len > input.bytes_left() {
                    return Err(CorbaError::end_of_stream());
                }
                let items = (0..len)
                    .map(|_| self.read_in(element, rest, input, session))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Sequence(items))
            }
            FormalKind::Array {
                element,
                level,
                dimensions,
            } => {
                let inner = inner_dimensions(*level, dimensions, rest);
                let items = (0..dimensions[0])
                    .map(|_| self.read_in(element, &inner, input, session))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Array(items))
            }
            FormalKind::Enum(meta) => {
                let TypeKind::Enum { members, underlying } = &meta.kind else {
                    return Err(unmappable());
                };
                if meta.is_idl_enum() {
                    let ordinal = input.read_ulong()?;
                    if ordinal as usize >= members.len() {
                        return Err(CorbaError::bad_param(
                            minor::ENUM_OUT_OF_RANGE,
                            CompletionStatus::CompletedMayBe,
                        ));
                    }
                    return Ok(Value::Enum(ordinal));
                }
                let raw = read_primitive(*underlying, false, input)?
                    .as_i64()
                    .ok_or_else(mismatch_on_read)?;
                let raw = u32::try_from(raw).map_err(|_| {
                    CorbaError::bad_param(minor::ENUM_OUT_OF_RANGE, CompletionStatus::CompletedMayBe)
                })?;
                Ok(Value::Enum(raw))
            }
            FormalKind::ObjectRef { repository_id } => self.read_object_ref(repository_id, input),
            FormalKind::Any => {
                let type_code = TypeCode::read(input)?;
                if type_code == TypeCode::Null {
                    return Ok(Value::Null);
                }
                let (formal, directives) = typecode_to_formal(&type_code, &self.repository)?;
                let value = self.read_in(&formal, &directives, input, session)?;
                Ok(Value::any(type_code, value))
            }
            FormalKind::TypeCode => Ok(Value::TypeCode(Box::new(TypeCode::read(input)?))),
            FormalKind::Boxed {
                repository_id,
                content,
                content_directives,
            } => self.read_value(repository_id, Some((content, content_directives)), input, session),
            FormalKind::Abstract { repository_id } => {
                if input.read_bool()? {
                    self.read_object_ref(repository_id, input)
                } else {
                    self.read_value(repository_id, None, input, session)
                }
            }
            FormalKind::ValueType(meta) => self.read_value(&meta.repository_id, None, input, session),
            FormalKind::Exception(_) => {
                let repository_id = input.read_string()?;
                if let Some(kind) = SystemExceptionKind::from_repository_id(&repository_id) {
                    return read_system_exception_body(kind, input).map(Value::SystemException);
                }
                let ex = self.read_user_exception_in(&repository_id, input, session)?;
                Ok(Value::Exception {
                    repository_id: ex.repository_id,
                    members: ex.members,
                })
            }
        }
    }

    fn read_fields(
        &self,
        meta: &TypeMetadata,
        input: &mut CdrInput<'_>,
        session: &mut ValueSession,
    ) -> Result<Vec<(String, Value)>> {
        meta.fields()
            .iter()
            .map(|field| {
                let value = self.read_in(&field.formal, &field.directives, input, session)?;
                Ok((field.name.clone(), value))
            })
            .collect()
    }

    fn read_object_ref(&self, formal_id: &str, input: &mut CdrInput<'_>) -> Result<Value> {
        let ior = Ior::read(input)?;
        if ior.is_null_reference() {
            return Ok(Value::Null);
        }
        if formal_id != OBJECT_REPOSITORY_ID {
            let actual = ior.type_id();
            if actual.is_empty() {
                return Err(incompatible_reference());
            }
            if !self.repository.contains(actual)? {
                return Err(CorbaError::unknown_repository_id());
            }
            if !self.repository.is_assignable(actual, formal_id)? {
                return Err(incompatible_reference());
            }
        }
        Ok(Value::object_ref(ior))
    }

    /// Read a value type or boxed value; `boxed` carries the box content.
    fn read_value(
        &self,
        formal_id: &str,
        boxed: Option<(&FormalType, &DirectiveSet)>,
        input: &mut CdrInput<'_>,
        session: &mut ValueSession,
    ) -> Result<Value> {
        input.align(4)?;
        let start = input.global_position();
        let tag = input.read_ulong()?;
        if tag == 0 {
            return Ok(Value::Null);
        }
        if tag == INDIRECTION_TAG {
            let target = read_indirection_target(input)?;
            return session.values.get(&target).cloned().ok_or_else(bad_value_indirection);
        }
        if !(VALUE_TAG_BASE..=0x7fff_ffff).contains(&tag) {
            return Err(mismatch_on_read());
        }
        if tag & VALUE_TAG_CODEBASE != 0 {
            let codebase = read_repository_id(input, session)?;
            debug!(codebase = %codebase, "value codebase URL ignored");
        }
        let actual_id = match tag & VALUE_TAG_TYPE_INFO {
            0 => formal_id.to_string(),
            VALUE_TAG_ONE_ID => read_repository_id(input, session)?,
            VALUE_TAG_ID_LIST => {
                let count = input.read_long()?;
                if count <= 0 {
                    return Err(mismatch_on_read());
                }
                let ids = (0..count)
                    .map(|_| read_repository_id(input, session))
                    .collect::<Result<Vec<_>>>()?;
                // most derived first; take the first one we know
                let mut known = None;
                for id in &ids {
                    if self.repository.contains(id)? {
                        known = Some(id.clone());
                        break;
                    }
                }
                known.unwrap_or_else(|| ids[0].clone())
            }
            _ => return Err(mismatch_on_read()),
        };
        let chunked = tag & VALUE_TAG_CHUNKED != 0;
        if chunked {
            input.begin_chunked_value();
        }
        let value = match boxed {
            Some((content, directives)) => self.read_in(content, directives, input, session)?,
            None => {
                if formal_id != OBJECT_REPOSITORY_ID && !self.repository.is_assignable(&actual_id, formal_id)? {
                    return Err(CorbaError::bad_param(
                        minor::INCOMPATIBLE_VALUE_TYPE,
                        CompletionStatus::CompletedMayBe,
                    ));
                }
                let mut members = Vec::new();
                for meta in self.repository.value_hierarchy(&actual_id)? {
                    members.extend(self.read_fields(&meta, input, session)?);
                }
                Value::ValueType {
                    repository_id: actual_id,
                    members,
                }
            }
        };
        if chunked {
            input.end_chunked_value()?;
        }
        session.values.insert(start, value.clone());
        Ok(value)
    }

    /// Read the fields of a user exception whose repository id was already
    /// read.
    pub fn read_user_exception(&self, repository_id: &str, input: &mut CdrInput<'_>) -> Result<UserException> {
        self.read_user_exception_in(repository_id, input, &mut ValueSession::new())
    }

    fn read_user_exception_in(
        &self,
        repository_id: &str,
        input: &mut CdrInput<'_>,
        session: &mut ValueSession,
    ) -> Result<UserException> {
        let meta = self.repository.require(repository_id)?;
        if !matches!(meta.kind, TypeKind::Exception { .. }) {
            return Err(mismatch_on_read());
        }
        let members = self.read_fields(&meta, input, session)?;
        Ok(UserException::new(repository_id, members))
    }
}

/// Write a system exception: repository id, minor code, completion status.
pub fn write_system_exception(ex: &SystemException, out: &mut CdrOutput) -> Result<()> {
    out.write_string(&ex.repository_id())?;
    out.write_ulong(ex.minor)?;
    out.write_ulong(ex.completed.as_u32())?;
    Ok(())
}

/// Read a system exception including its repository id.
///
/// Unknown system exception ids are reported as UNKNOWN.
pub fn read_system_exception(input: &mut CdrInput<'_>) -> Result<SystemException> {
    let repository_id = input.read_string()?;
    let kind = SystemExceptionKind::from_repository_id(&repository_id).unwrap_or(SystemExceptionKind::Unknown);
    read_system_exception_body(kind, input)
}

fn read_system_exception_body(kind: SystemExceptionKind, input: &mut CdrInput<'_>) -> Result<SystemException> {
    let minor_code = input.read_ulong()?;
    let completed = CompletionStatus::from_u32(input.read_ulong()?).ok_or_else(mismatch_on_read)?;
    Ok(SystemException::new(kind, minor_code, completed))
}

fn select_case<'m>(meta: &'m TypeMetadata, discriminator: &Value) -> Result<Option<&'m crate::schema::UnionCase>> {
    let TypeKind::Union {
        cases, default_case, ..
    } = &meta.kind
    else {
        return Err(unmappable());
    };
    let wanted = discriminator.as_i64();
    let matched = cases.iter().find(|case| {
        case.labels
            .iter()
            .any(|label| label == discriminator || (wanted.is_some() && label.as_i64() == wanted))
    });
    Ok(matched.or_else(|| default_case.and_then(|index| cases.get(index))))
}

fn inner_dimensions(level: u32, dimensions: &[u32], rest: &DirectiveSet) -> DirectiveSet {
    if dimensions.len() > 1 {
        rest.with(Directive::Array {
            level,
            dimensions: dimensions[1..].to_vec(),
        })
    } else {
        rest.clone()
    }
}

fn read_indirection_target(input: &mut CdrInput<'_>) -> Result<usize> {
    let here = input.global_position() as i64;
    let delta = i64::from(input.read_long()?);
    usize::try_from(here + delta).map_err(|_| bad_value_indirection())
}

/// Read a repository id or codebase string, following indirections.
fn read_repository_id(input: &mut CdrInput<'_>, session: &mut ValueSession) -> Result<String> {
    input.align(4)?;
    let start = input.global_position();
    let len = input.read_ulong()?;
    if len == INDIRECTION_TAG {
        let target = read_indirection_target(input)?;
        return session
            .repository_ids
            .get(&target)
            .cloned()
            .ok_or_else(bad_value_indirection);
    }
    let id = input.read_string_data(len as usize)?;
    session.repository_ids.insert(start, id.clone());
    Ok(id)
}

fn write_primitive(kind: PrimitiveKind, wide: bool, value: &Value, out: &mut CdrOutput) -> Result<()> {
    match (kind, value) {
        (PrimitiveKind::Boolean, Value::Bool(v)) => out.write_bool(*v)?,
        (PrimitiveKind::Octet, Value::Octet(v)) => out.write_octet(*v)?,
        (PrimitiveKind::Short, Value::Short(v)) => out.write_short(*v)?,
        (PrimitiveKind::UShort, Value::UShort(v)) => out.write_ushort(*v)?,
        (PrimitiveKind::Long, Value::Long(v)) => out.write_long(*v)?,
        (PrimitiveKind::ULong, Value::ULong(v)) => out.write_ulong(*v)?,
        (PrimitiveKind::LongLong, Value::LongLong(v)) => out.write_longlong(*v)?,
        (PrimitiveKind::ULongLong, Value::ULongLong(v)) => out.write_ulonglong(*v)?,
        (PrimitiveKind::Float, Value::Float(v)) => out.write_float(*v)?,
        (PrimitiveKind::Double, Value::Double(v)) => out.write_double(*v)?,
        (PrimitiveKind::Char, Value::Char(c)) if wide => out.write_wchar(*c)?,
        (PrimitiveKind::Char, Value::Char(c)) => out.write_char(*c)?,
        (PrimitiveKind::String, Value::String(s)) if wide => out.write_wstring(s)?,
        (PrimitiveKind::String, Value::String(s)) => out.write_string(s)?,
        (PrimitiveKind::String, Value::Null) => {
            return Err(CorbaError::bad_param(minor::NULL_STRING, CompletionStatus::CompletedNo))
        }
        _ => return Err(mismatch_on_write()),
    };
    Ok(())
}

fn read_primitive(kind: PrimitiveKind, wide: bool, input: &mut CdrInput<'_>) -> Result<Value> {
    Ok(match kind {
        PrimitiveKind::Boolean => Value::Bool(input.read_bool()?),
        PrimitiveKind::Octet => Value::Octet(input.read_octet()?),
        PrimitiveKind::Short => Value::Short(input.read_short()?),
        PrimitiveKind::UShort => Value::UShort(input.read_ushort()?),
        PrimitiveKind::Long => Value::Long(input.read_long()?),
        PrimitiveKind::ULong => Value::ULong(input.read_ulong()?),
        PrimitiveKind::LongLong => Value::LongLong(input.read_longlong()?),
        PrimitiveKind::ULongLong => Value::ULongLong(input.read_ulonglong()?),
        PrimitiveKind::Float => Value::Float(input.read_float()?),
        PrimitiveKind::Double => Value::Double(input.read_double()?),
        PrimitiveKind::Char if wide => Value::Char(input.read_wchar()?),
        PrimitiveKind::Char => Value::Char(input.read_char()?),
        PrimitiveKind::String if wide => Value::String(input.read_wstring()?),
        PrimitiveKind::String => Value::String(input.read_string()?),
    })
}

/// Integer value of the given primitive kind; out of range values fail.
fn integer_value(kind: PrimitiveKind, raw: i64) -> Result<Value> {
    let out_of_range = |_: TryFromIntError| CorbaError::bad_param(minor::ENUM_OUT_OF_RANGE, CompletionStatus::CompletedNo);
    Ok(match kind {
        PrimitiveKind::Octet => Value::Octet(u8::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::Short => Value::Short(i16::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::UShort => Value::UShort(u16::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::Long => Value::Long(i32::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::ULong => Value::ULong(u32::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::LongLong => Value::LongLong(raw),
        PrimitiveKind::ULongLong => Value::ULongLong(u64::try_from(raw).map_err(out_of_range)?),
        _ => return Err(unmappable()),
    })
}

fn unmappable() -> CorbaError {
    CorbaError::bad_param(minor::UNMAPPABLE_FORMAL_TYPE, CompletionStatus::CompletedNo)
}

fn mismatch_on_write() -> CorbaError {
    CorbaError::bad_param(minor::VALUE_TYPE_MISMATCH, CompletionStatus::CompletedNo)
}

fn mismatch_on_read() -> CorbaError {
    CorbaError::bad_param(minor::VALUE_TYPE_MISMATCH, CompletionStatus::CompletedMayBe)
}

fn bound_violation(completed: CompletionStatus) -> CorbaError {
    CorbaError::bad_param(minor::BOUND_VIOLATION, completed)
}

fn incompatible_reference() -> CorbaError {
    CorbaError::bad_param(minor::INCOMPATIBLE_OBJECT_REFERENCE, CompletionStatus::CompletedMayBe)
}

fn bad_value_indirection() -> CorbaError {
    CorbaError::marshal(minor::BAD_VALUE_INDIRECTION, CompletionStatus::CompletedMayBe)
}
