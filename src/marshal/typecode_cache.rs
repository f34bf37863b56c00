// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! TypeCode construction and caching.
//!
//! [`TypeCodeCache`] derives the TypeCode of a declaration site (formal type
//! plus directives) from the repository and keeps the result for the life of
//! the process. Named types being built are tracked on the current build's
//! stack, so a type that refers to itself becomes a [`TypeCode::Recursive`]
//! reference instead of an endless descent.
//!
//! [`typecode_to_formal`] goes the other way for TypeCodes received inside an
//! `any`, registering metadata for types the repository has not seen yet.

use std::sync::Arc;

use tracing::debug;

use super::typecode::{
    TcMember, TcUnionMember, TcValueMember, TypeCode, PUBLIC_MEMBER, VM_ABSTRACT, VM_NONE,
};
use crate::core::{minor, CompletionStatus, CorbaError, PrimitiveKind, Repository, Result, TypeRegistry, Value};
use crate::schema::{
    Directive, DirectiveKind, DirectiveSet, FieldMeta, FormalType, TypeKind, TypeMetadata, UnionCase,
    OBJECT_REPOSITORY_ID,
};

/// Process-wide cache of declaration-site TypeCodes.
///
/// # Example
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use iiopcodec::core::{PrimitiveKind, Repository};
/// use iiopcodec::marshal::{TypeCode, TypeCodeCache};
/// use iiopcodec::schema::{Directive, DirectiveSet, FormalType};
///
/// let cache = TypeCodeCache::new();
/// let repository = Repository::new();
/// let narrow = DirectiveSet::from(vec![Directive::WideChar(false)]);
/// let tc = cache.type_code_for(&FormalType::Primitive(PrimitiveKind::String), &narrow, &repository)?;
/// assert_eq!(tc, TypeCode::String { bound: 0 });
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct TypeCodeCache {
    entries: TypeRegistry<Arc<TypeCode>>,
}

impl TypeCodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// TypeCode for a declaration site, built on first use.
    pub fn type_code_for(
        &self,
        formal: &FormalType,
        directives: &DirectiveSet,
        repository: &Repository,
    ) -> Result<TypeCode> {
        let key = format!("{}|{}", formal.describe(), directives.canonical_key());
        if let Some(tc) = self.entries.get(&key)? {
            return Ok(tc.as_ref().clone());
        }
        let mut builder = Builder {
            repository,
            stack: Vec::new(),
        };
        let tc = builder.build(formal, directives)?;
        debug!(key = %key, kind = ?tc.kind(), "TypeCode built");
        let published = self.entries.publish(key, Arc::new(tc))?;
        Ok(published.as_ref().clone())
    }

    /// Number of cached TypeCodes.
    pub fn len(&self) -> Result<usize> {
        self.entries.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.entries.is_empty()
    }
}

struct Builder<'r> {
    repository: &'r Repository,
    /// Named types whose TypeCode is being built
    stack: Vec<String>,
}

impl Builder<'_> {
    fn build(&mut self, formal: &FormalType, directives: &DirectiveSet) -> Result<TypeCode> {
        if let (Some(Directive::BoxedValue { repository_id }), rest) =
            directives.take(DirectiveKind::BoxedValue)
        {
            let content = self.build(formal, &rest)?;
            return Ok(TypeCode::ValueBox {
                name: simple_name(&repository_id),
                id: repository_id,
                content: Box::new(content),
            });
        }
        match formal {
            FormalType::Void => Ok(TypeCode::Void),
            FormalType::Primitive(kind) => Ok(primitive_type_code(*kind, directives.wide_char_allowed())),
            FormalType::Array(element) => self.build_array(element, directives),
            FormalType::Named(id) => self.build_named(id),
            FormalType::Object => Ok(TypeCode::ObjRef {
                id: OBJECT_REPOSITORY_ID.to_string(),
                name: "Object".to_string(),
            }),
            FormalType::Any => Ok(TypeCode::Any),
            FormalType::TypeCode => Ok(TypeCode::TypeCode),
        }
    }

    fn build_array(&mut self, element: &FormalType, directives: &DirectiveSet) -> Result<TypeCode> {
        let (outermost, rest) = directives.take_outermost();
        match outermost {
            Some(Directive::Sequence { bound, .. }) => Ok(TypeCode::Sequence {
                element: Box::new(self.build(element, &rest)?),
                bound,
            }),
            Some(Directive::Array { level, dimensions }) => {
                let Some((&length, inner)) = dimensions.split_first() else {
                    return Err(unmappable());
                };
                let element_directives = if inner.is_empty() {
                    rest
                } else {
                    rest.with(Directive::Array {
                        level,
                        dimensions: inner.to_vec(),
                    })
                };
                Ok(TypeCode::Array {
                    element: Box::new(self.build(element, &element_directives)?),
                    length,
                })
            }
            // plain arrays travel as unbounded sequences
            _ => Ok(TypeCode::Sequence {
                element: Box::new(self.build(element, directives)?),
                bound: 0,
            }),
        }
    }

    fn build_named(&mut self, id: &str) -> Result<TypeCode> {
        if self.stack.iter().any(|open| open == id) {
            return Ok(TypeCode::Recursive { id: id.to_string() });
        }
        let meta = self.repository.require(id)?;
        self.stack.push(id.to_string());
        let result = self.build_from_metadata(&meta);
        self.stack.pop();
        result
    }

    fn members(&mut self, fields: &[FieldMeta]) -> Result<Vec<TcMember>> {
        fields
            .iter()
            .map(|field| {
                Ok(TcMember {
                    name: field.name.clone(),
                    type_code: self.build(&field.formal, &field.directives)?,
                })
            })
            .collect()
    }

    fn build_from_metadata(&mut self, meta: &TypeMetadata) -> Result<TypeCode> {
        let id = meta.repository_id.clone();
        let name = meta.name.clone();
        Ok(match &meta.kind {
            TypeKind::Struct { fields } => TypeCode::Struct {
                id,
                name,
                members: self.members(fields)?,
            },
            TypeKind::Exception { fields } => TypeCode::Except {
                id,
                name,
                members: self.members(fields)?,
            },
            TypeKind::Union {
                discriminator,
                cases,
                default_case,
            } => {
                let discriminator = self.build(discriminator, &DirectiveSet::new())?;
                let mut members = Vec::new();
                let mut default_index = -1;
                for (index, case) in cases.iter().enumerate() {
                    let type_code = self.build(&case.formal, &case.directives)?;
                    if Some(index) == *default_case {
                        default_index = members.len() as i32;
                        members.push(TcUnionMember {
                            label: Value::Octet(0),
                            name: case.name.clone(),
                            type_code: type_code.clone(),
                        });
                    }
                    for label in &case.labels {
                        members.push(TcUnionMember {
                            label: label.clone(),
                            name: case.name.clone(),
                            type_code: type_code.clone(),
                        });
                    }
                }
                TypeCode::Union {
                    id,
                    name,
                    discriminator: Box::new(discriminator),
                    default_index,
                    members,
                }
            }
            TypeKind::Enum { members, underlying } => {
                if meta.is_idl_enum() {
                    TypeCode::Enum {
                        id,
                        name,
                        members: members.clone(),
                    }
                } else {
                    TypeCode::Alias {
                        id,
                        name,
                        content: Box::new(primitive_type_code(*underlying, false)),
                    }
                }
            }
            TypeKind::Interface { is_abstract: true, .. } => TypeCode::AbstractInterface { id, name },
            TypeKind::Interface { .. } => TypeCode::ObjRef { id, name },
            TypeKind::ValueType {
                base,
                fields,
                is_abstract,
            } => {
                let base = match base {
                    Some(base_id) => Some(Box::new(self.build_named(base_id)?)),
                    None => None,
                };
                let members = fields
                    .iter()
                    .map(|field| {
                        Ok(TcValueMember {
                            name: field.name.clone(),
                            type_code: self.build(&field.formal, &field.directives)?,
                            visibility: PUBLIC_MEMBER,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                TypeCode::Value {
                    id,
                    name,
                    modifier: if *is_abstract { VM_ABSTRACT } else { VM_NONE },
                    base,
                    members,
                }
            }
            TypeKind::ValueBox { content, directives } => TypeCode::ValueBox {
                id,
                name,
                content: Box::new(self.build(content, directives)?),
            },
            TypeKind::Alias { content, directives } => TypeCode::Alias {
                id,
                name,
                content: Box::new(self.build(content, directives)?),
            },
        })
    }
}

fn primitive_type_code(kind: PrimitiveKind, wide: bool) -> TypeCode {
    match kind {
        PrimitiveKind::Boolean => TypeCode::Boolean,
        PrimitiveKind::Octet => TypeCode::Octet,
        PrimitiveKind::Short => TypeCode::Short,
        PrimitiveKind::UShort => TypeCode::UShort,
        PrimitiveKind::Long => TypeCode::Long,
        PrimitiveKind::ULong => TypeCode::ULong,
        PrimitiveKind::LongLong => TypeCode::LongLong,
        PrimitiveKind::ULongLong => TypeCode::ULongLong,
        PrimitiveKind::Float => TypeCode::Float,
        PrimitiveKind::Double => TypeCode::Double,
        PrimitiveKind::Char if wide => TypeCode::WChar,
        PrimitiveKind::Char => TypeCode::Char,
        PrimitiveKind::String if wide => TypeCode::WString { bound: 0 },
        PrimitiveKind::String => TypeCode::String { bound: 0 },
    }
}

/// Last scoped name of a repository id, e.g. `Point` for `IDL:geo/Point:1.0`.
pub fn simple_name(repository_id: &str) -> String {
    let body = repository_id
        .strip_prefix("IDL:")
        .or_else(|| repository_id.strip_prefix("RMI:"))
        .unwrap_or(repository_id);
    let body = body.split(':').next().unwrap_or(body);
    body.rsplit('/').next().unwrap_or(body).to_string()
}

fn unmappable() -> CorbaError {
    CorbaError::bad_param(minor::UNMAPPABLE_FORMAL_TYPE, CompletionStatus::CompletedMayBe)
}

/// Derive the formal type and directives that marshal values described by
/// `tc`, registering metadata for named types the repository lacks.
pub fn typecode_to_formal(tc: &TypeCode, repository: &Repository) -> Result<(FormalType, DirectiveSet)> {
    let narrow = || DirectiveSet::from(vec![Directive::WideChar(false)]);
    let primitive = |kind: PrimitiveKind| -> Result<(FormalType, DirectiveSet)> {
        Ok((FormalType::Primitive(kind), DirectiveSet::new()))
    };
    match tc {
        TypeCode::Null | TypeCode::Void => Ok((FormalType::Void, DirectiveSet::new())),
        TypeCode::Short => primitive(PrimitiveKind::Short),
        TypeCode::Long => primitive(PrimitiveKind::Long),
        TypeCode::UShort => primitive(PrimitiveKind::UShort),
        TypeCode::ULong => primitive(PrimitiveKind::ULong),
        TypeCode::Float => primitive(PrimitiveKind::Float),
        TypeCode::Double => primitive(PrimitiveKind::Double),
        TypeCode::Boolean => primitive(PrimitiveKind::Boolean),
        TypeCode::Octet => primitive(PrimitiveKind::Octet),
        TypeCode::LongLong => primitive(PrimitiveKind::LongLong),
        TypeCode::ULongLong => primitive(PrimitiveKind::ULongLong),
        TypeCode::WChar => primitive(PrimitiveKind::Char),
        TypeCode::WString { .. } => primitive(PrimitiveKind::String),
        TypeCode::Char => Ok((FormalType::Primitive(PrimitiveKind::Char), narrow())),
        TypeCode::String { .. } => Ok((FormalType::Primitive(PrimitiveKind::String), narrow())),
        TypeCode::Any => Ok((FormalType::Any, DirectiveSet::new())),
        TypeCode::TypeCode => Ok((FormalType::TypeCode, DirectiveSet::new())),
        TypeCode::ObjRef { id, .. } if id == OBJECT_REPOSITORY_ID || id.is_empty() => {
            Ok((FormalType::Object, DirectiveSet::new()))
        }
        TypeCode::Sequence { element, bound } => {
            let (formal, directives) = typecode_to_formal(element, repository)?;
            let level = directives.next_level();
            Ok((
                FormalType::array(formal),
                directives.with(Directive::Sequence { level, bound: *bound }),
            ))
        }
        TypeCode::Array { element, length } => {
            let (formal, directives) = typecode_to_formal(element, repository)?;
            if matches!(element.as_ref(), TypeCode::Array { .. }) {
                if let (Some(Directive::Array { level, dimensions }), rest) = directives.take_outermost() {
                    let mut all = vec![*length];
                    all.extend(dimensions);
                    return Ok((
                        FormalType::array(formal),
                        rest.with(Directive::Array { level, dimensions: all }),
                    ));
                }
            }
            let level = directives.next_level();
            Ok((
                FormalType::array(formal),
                directives.with(Directive::Array {
                    level,
                    dimensions: vec![*length],
                }),
            ))
        }
        TypeCode::Recursive { id } => Ok((FormalType::named(id.clone()), DirectiveSet::new())),
        named => {
            let id = named.id().ok_or_else(unmappable)?.to_string();
            repository.get_or_register_with(&id, || metadata_from_type_code(named, repository))?;
            Ok((FormalType::Named(id), DirectiveSet::new()))
        }
    }
}

fn fields_from_members<'m>(
    members: impl Iterator<Item = (&'m str, &'m TypeCode)>,
    repository: &Repository,
) -> Result<Vec<FieldMeta>> {
    members
        .map(|(name, tc)| {
            let (formal, directives) = typecode_to_formal(tc, repository)?;
            Ok(FieldMeta::new(name, formal).with_directives(directives))
        })
        .collect()
}

fn metadata_from_type_code(tc: &TypeCode, repository: &Repository) -> Result<TypeMetadata> {
    Ok(match tc {
        TypeCode::Struct { id, name, members } => TypeMetadata::structure(
            id,
            name,
            fields_from_members(members.iter().map(|m| (m.name.as_str(), &m.type_code)), repository)?,
        ),
        TypeCode::Except { id, name, members } => TypeMetadata::exception(
            id,
            name,
            fields_from_members(members.iter().map(|m| (m.name.as_str(), &m.type_code)), repository)?,
        ),
        TypeCode::Union {
            id,
            name,
            discriminator,
            default_index,
            members,
        } => {
            let (discriminator, _) = typecode_to_formal(discriminator, repository)?;
            let mut cases = Vec::with_capacity(members.len());
            let mut default_case = None;
            for (index, member) in members.iter().enumerate() {
                let (formal, directives) = typecode_to_formal(&member.type_code, repository)?;
                let labels = if index as i32 == *default_index {
                    default_case = Some(cases.len());
                    Vec::new()
                } else {
                    vec![member.label.clone()]
                };
                cases.push(UnionCase::new(labels, member.name.clone(), formal).with_directives(directives));
            }
            TypeMetadata::union(id, name, discriminator, cases, default_case)
        }
        TypeCode::Enum { id, name, members } => {
            let members: Vec<&str> = members.iter().map(String::as_str).collect();
            TypeMetadata::enumeration(id, name, &members)
        }
        TypeCode::ObjRef { id, name } => TypeMetadata::interface(id, name, &[]),
        TypeCode::AbstractInterface { id, name } => TypeMetadata::abstract_interface(id, name, &[]),
        TypeCode::Alias { id, name, content } => {
            let (formal, directives) = typecode_to_formal(content, repository)?;
            TypeMetadata::alias(id, name, formal, directives)
        }
        TypeCode::ValueBox { id, name, content } => {
            let (formal, directives) = typecode_to_formal(content, repository)?;
            TypeMetadata::value_box(id, name, formal, directives)
        }
        TypeCode::Value {
            id,
            name,
            modifier,
            base,
            members,
        } => {
            let base = match base {
                Some(base) => {
                    let (formal, _) = typecode_to_formal(base, repository)?;
                    formal.repository_id().map(str::to_string)
                }
                None => None,
            };
            let fields =
                fields_from_members(members.iter().map(|m| (m.name.as_str(), &m.type_code)), repository)?;
            TypeMetadata::new(
                id.clone(),
                name.clone(),
                TypeKind::ValueType {
                    base,
                    fields,
                    is_abstract: *modifier == VM_ABSTRACT,
                },
                DirectiveSet::new(),
            )
        }
        _ => return Err(unmappable()),
    })
}
