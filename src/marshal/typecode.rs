// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! TypeCode model and its CDR encoding.
//!
//! Simple kinds are a bare kind ulong; string kinds add a bound. Complex
//! kinds are the kind followed by an encapsulation holding the parameters,
//! member TypeCodes included. A reference back to an enclosing TypeCode is
//! written as the indirection marker `0xffffffff` and a signed offset from
//! the offset field to the kind of the referenced TypeCode.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::{minor, CompletionStatus, CorbaError, Result, SystemExceptionKind, Value};
use crate::encoding::cdr::{CdrInput, CdrOutput};

/// Indirection marker for TypeCodes, repository ids and values.
pub const INDIRECTION_TAG: u32 = 0xffff_ffff;

/// Value modifier: no modifier.
pub const VM_NONE: i16 = 0;
/// Value modifier: abstract value type.
pub const VM_ABSTRACT: i16 = 2;
/// Visibility of public state members.
pub const PUBLIC_MEMBER: i16 = 1;

/// TypeCode kinds (`TCKind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TcKind {
    Null = 0,
    Void = 1,
    Short = 2,
    Long = 3,
    UShort = 4,
    ULong = 5,
    Float = 6,
    Double = 7,
    Boolean = 8,
    Char = 9,
    Octet = 10,
    Any = 11,
    TypeCode = 12,
    ObjRef = 14,
    Struct = 15,
    Union = 16,
    Enum = 17,
    String = 18,
    Sequence = 19,
    Array = 20,
    Alias = 21,
    Except = 22,
    LongLong = 23,
    ULongLong = 24,
    WChar = 26,
    WString = 27,
    Value = 29,
    ValueBox = 30,
    AbstractInterface = 32,
}

impl TcKind {
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Decode a kind; unsupported kinds fail with BAD_PARAM 1504.
    pub fn from_u32(value: u32) -> Result<Self> {
        Ok(match value {
            0 => TcKind::Null,
            1 => TcKind::Void,
            2 => TcKind::Short,
            3 => TcKind::Long,
            4 => TcKind::UShort,
            5 => TcKind::ULong,
            6 => TcKind::Float,
            7 => TcKind::Double,
            8 => TcKind::Boolean,
            9 => TcKind::Char,
            10 => TcKind::Octet,
            11 => TcKind::Any,
            12 => TcKind::TypeCode,
            14 => TcKind::ObjRef,
            15 => TcKind::Struct,
            16 => TcKind::Union,
            17 => TcKind::Enum,
            18 => TcKind::String,
            19 => TcKind::Sequence,
            20 => TcKind::Array,
            21 => TcKind::Alias,
            22 => TcKind::Except,
            23 => TcKind::LongLong,
            24 => TcKind::ULongLong,
            26 => TcKind::WChar,
            27 => TcKind::WString,
            29 => TcKind::Value,
            30 => TcKind::ValueBox,
            32 => TcKind::AbstractInterface,
            _ => {
                return Err(CorbaError::bad_param(
                    minor::UNKNOWN_TYPECODE_KIND,
                    CompletionStatus::CompletedMayBe,
                ))
            }
        })
    }
}

/// Struct or exception member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcMember {
    pub name: String,
    pub type_code: TypeCode,
}

/// Union arm; the default arm carries the octet label 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcUnionMember {
    pub label: Value,
    pub name: String,
    pub type_code: TypeCode,
}

/// Value type state member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcValueMember {
    pub name: String,
    pub type_code: TypeCode,
    pub visibility: i16,
}

/// A self-describing type description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeCode {
    Null,
    Void,
    Short,
    Long,
    UShort,
    ULong,
    Float,
    Double,
    Boolean,
    Char,
    Octet,
    Any,
    TypeCode,
    LongLong,
    ULongLong,
    WChar,
    String {
        bound: u32,
    },
    WString {
        bound: u32,
    },
    ObjRef {
        id: String,
        name: String,
    },
    AbstractInterface {
        id: String,
        name: String,
    },
    Struct {
        id: String,
        name: String,
        members: Vec<TcMember>,
    },
    Except {
        id: String,
        name: String,
        members: Vec<TcMember>,
    },
    Union {
        id: String,
        name: String,
        discriminator: Box<TypeCode>,
        /// Index of the default member, or -1
        default_index: i32,
        members: Vec<TcUnionMember>,
    },
    Enum {
        id: String,
        name: String,
        members: Vec<String>,
    },
    Sequence {
        element: Box<TypeCode>,
        bound: u32,
    },
    Array {
        element: Box<TypeCode>,
        length: u32,
    },
    Alias {
        id: String,
        name: String,
        content: Box<TypeCode>,
    },
    Value {
        id: String,
        name: String,
        modifier: i16,
        base: Option<Box<TypeCode>>,
        members: Vec<TcValueMember>,
    },
    ValueBox {
        id: String,
        name: String,
        content: Box<TypeCode>,
    },
    /// Reference to an enclosing TypeCode with this repository id
    Recursive {
        id: String,
    },
}

impl TypeCode {
    /// Kind of this TypeCode. A recursive reference reports the kind of
    /// what it refers to only after resolution, so it reports `Null` here.
    pub fn kind(&self) -> TcKind {
        match self {
            TypeCode::Null | TypeCode::Recursive { .. } => TcKind::Null,
            TypeCode::Void => TcKind::Void,
            TypeCode::Short => TcKind::Short,
            TypeCode::Long => TcKind::Long,
            TypeCode::UShort => TcKind::UShort,
            TypeCode::ULong => TcKind::ULong,
            TypeCode::Float => TcKind::Float,
            TypeCode::Double => TcKind::Double,
            TypeCode::Boolean => TcKind::Boolean,
            TypeCode::Char => TcKind::Char,
            TypeCode::Octet => TcKind::Octet,
            TypeCode::Any => TcKind::Any,
            TypeCode::TypeCode => TcKind::TypeCode,
            TypeCode::LongLong => TcKind::LongLong,
            TypeCode::ULongLong => TcKind::ULongLong,
            TypeCode::WChar => TcKind::WChar,
            TypeCode::String { .. } => TcKind::String,
            TypeCode::WString { .. } => TcKind::WString,
            TypeCode::ObjRef { .. } => TcKind::ObjRef,
            TypeCode::AbstractInterface { .. } => TcKind::AbstractInterface,
            TypeCode::Struct { .. } => TcKind::Struct,
            TypeCode::Except { .. } => TcKind::Except,
            TypeCode::Union { .. } => TcKind::Union,
            TypeCode::Enum { .. } => TcKind::Enum,
            TypeCode::Sequence { .. } => TcKind::Sequence,
            TypeCode::Array { .. } => TcKind::Array,
            TypeCode::Alias { .. } => TcKind::Alias,
            TypeCode::Value { .. } => TcKind::Value,
            TypeCode::ValueBox { .. } => TcKind::ValueBox,
        }
    }

    /// Repository id of named kinds.
    pub fn id(&self) -> Option<&str> {
        match self {
            TypeCode::ObjRef { id, .. }
            | TypeCode::AbstractInterface { id, .. }
            | TypeCode::Struct { id, .. }
            | TypeCode::Except { id, .. }
            | TypeCode::Union { id, .. }
            | TypeCode::Enum { id, .. }
            | TypeCode::Alias { id, .. }
            | TypeCode::Value { id, .. }
            | TypeCode::ValueBox { id, .. }
            | TypeCode::Recursive { id } => Some(id),
            _ => None,
        }
    }

    /// Name of named kinds.
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeCode::ObjRef { name, .. }
            | TypeCode::AbstractInterface { name, .. }
            | TypeCode::Struct { name, .. }
            | TypeCode::Except { name, .. }
            | TypeCode::Union { name, .. }
            | TypeCode::Enum { name, .. }
            | TypeCode::Alias { name, .. }
            | TypeCode::Value { name, .. }
            | TypeCode::ValueBox { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Write this TypeCode to `out`.
    pub fn write(&self, out: &mut CdrOutput) -> Result<()> {
        TypeCodeWriter::default().write(self, out)
    }

    /// Read a TypeCode from `input`.
    pub fn read(input: &mut CdrInput<'_>) -> Result<Self> {
        TypeCodeReader::default().read(input)
    }
}

/// Writes TypeCodes, remembering where named ones start for indirections.
#[derive(Default)]
struct TypeCodeWriter {
    positions: HashMap<String, usize>,
}

impl TypeCodeWriter {
    fn write(&mut self, tc: &TypeCode, out: &mut CdrOutput) -> Result<()> {
        if let TypeCode::Recursive { id } = tc {
            let target = *self.positions.get(id).ok_or_else(bad_indirection)?;
            out.write_ulong(INDIRECTION_TAG)?;
            let here = out.global_position();
            out.write_long(offset(target, here)?)?;
            return Ok(());
        }
        out.force_align(4)?;
        if let Some(id) = tc.id() {
            self.positions.insert(id.to_string(), out.global_position());
        }
        out.write_ulong(tc.kind().as_u32())?;
        match tc {
            TypeCode::String { bound } | TypeCode::WString { bound } => {
                out.write_ulong(*bound)?;
            }
            TypeCode::ObjRef { id, name } | TypeCode::AbstractInterface { id, name } => {
                let mut body = out.encapsulation_stream();
                body.write_string(id)?.write_string(name)?;
                out.write_encapsulation(body)?;
            }
            TypeCode::Struct { id, name, members } | TypeCode::Except { id, name, members } => {
                let mut body = out.encapsulation_stream();
                body.write_string(id)?.write_string(name)?;
                body.write_ulong(members.len() as u32)?;
                for member in members {
                    body.write_string(&member.name)?;
                    self.write(&member.type_code, &mut body)?;
                }
                out.write_encapsulation(body)?;
            }
            TypeCode::Union {
                id,
                name,
                discriminator,
                default_index,
                members,
            } => {
                let mut body = out.encapsulation_stream();
                body.write_string(id)?.write_string(name)?;
                self.write(discriminator, &mut body)?;
                body.write_long(*default_index)?;
                body.write_ulong(members.len() as u32)?;
                for (index, member) in members.iter().enumerate() {
                    if index as i32 == *default_index {
                        body.write_octet(0)?;
                    } else {
                        write_label(&member.label, discriminator, &mut body)?;
                    }
                    body.write_string(&member.name)?;
                    self.write(&member.type_code, &mut body)?;
                }
                out.write_encapsulation(body)?;
            }
            TypeCode::Enum { id, name, members } => {
                let mut body = out.encapsulation_stream();
                body.write_string(id)?.write_string(name)?;
                body.write_ulong(members.len() as u32)?;
                for member in members {
                    body.write_string(member)?;
                }
                out.write_encapsulation(body)?;
            }
            TypeCode::Sequence { element, bound: length }
            | TypeCode::Array { element, length } => {
                let mut body = out.encapsulation_stream();
                self.write(element, &mut body)?;
                body.write_ulong(*length)?;
                out.write_encapsulation(body)?;
            }
            TypeCode::Alias { id, name, content } | TypeCode::ValueBox { id, name, content } => {
                let mut body = out.encapsulation_stream();
                body.write_string(id)?.write_string(name)?;
                self.write(content, &mut body)?;
                out.write_encapsulation(body)?;
            }
            TypeCode::Value {
                id,
                name,
                modifier,
                base,
                members,
            } => {
                let mut body = out.encapsulation_stream();
                body.write_string(id)?.write_string(name)?;
                body.write_short(*modifier)?;
                match base {
                    Some(base) => self.write(base, &mut body)?,
                    None => self.write(&TypeCode::Null, &mut body)?,
                }
                body.write_ulong(members.len() as u32)?;
                for member in members {
                    body.write_string(&member.name)?;
                    self.write(&member.type_code, &mut body)?;
                    body.write_short(member.visibility)?;
                }
                out.write_encapsulation(body)?;
            }
            _ => {}
        }
        Ok(())
    }
}

enum ReadEntry {
    InProgress(String),
    Done(TypeCode),
}

/// Reads TypeCodes, resolving indirections to enclosing or earlier ones.
#[derive(Default)]
struct TypeCodeReader {
    positions: HashMap<usize, ReadEntry>,
}

impl TypeCodeReader {
    fn read(&mut self, input: &mut CdrInput<'_>) -> Result<TypeCode> {
        input.align(4)?;
        let start = input.global_position();
        let raw_kind = input.read_ulong()?;
        if raw_kind == INDIRECTION_TAG {
            let here = input.global_position();
            let delta = input.read_long()?;
            let target = usize::try_from(here as i64 + i64::from(delta)).map_err(|_| bad_indirection())?;
            return match self.positions.get(&target) {
                Some(ReadEntry::InProgress(id)) => Ok(TypeCode::Recursive { id: id.clone() }),
                Some(ReadEntry::Done(tc)) => Ok(tc.clone()),
                None => Err(bad_indirection()),
            };
        }
        let kind = TcKind::from_u32(raw_kind)?;
        let tc = match kind {
            TcKind::Null => TypeCode::Null,
            TcKind::Void => TypeCode::Void,
            TcKind::Short => TypeCode::Short,
            TcKind::Long => TypeCode::Long,
            TcKind::UShort => TypeCode::UShort,
            TcKind::ULong => TypeCode::ULong,
            TcKind::Float => TypeCode::Float,
            TcKind::Double => TypeCode::Double,
            TcKind::Boolean => TypeCode::Boolean,
            TcKind::Char => TypeCode::Char,
            TcKind::Octet => TypeCode::Octet,
            TcKind::Any => TypeCode::Any,
            TcKind::TypeCode => TypeCode::TypeCode,
            TcKind::LongLong => TypeCode::LongLong,
            TcKind::ULongLong => TypeCode::ULongLong,
            TcKind::WChar => TypeCode::WChar,
            TcKind::String => TypeCode::String {
                bound: input.read_ulong()?,
            },
            TcKind::WString => TypeCode::WString {
                bound: input.read_ulong()?,
            },
            _ => {
                let mut body = input.read_encapsulation()?;
                self.read_complex(kind, start, &mut body)?
            }
        };
        if tc.id().is_some() {
            self.positions.insert(start, ReadEntry::Done(tc.clone()));
        }
        Ok(tc)
    }

    fn read_header(&mut self, start: usize, body: &mut CdrInput<'_>) -> Result<(String, String)> {
        let id = body.read_string()?;
        let name = body.read_string()?;
        self.positions.insert(start, ReadEntry::InProgress(id.clone()));
        Ok((id, name))
    }

    fn read_complex(&mut self, kind: TcKind, start: usize, body: &mut CdrInput<'_>) -> Result<TypeCode> {
        Ok(match kind {
            TcKind::ObjRef | TcKind::AbstractInterface => {
                let (id, name) = self.read_header(start, body)?;
                if kind == TcKind::ObjRef {
                    TypeCode::ObjRef { id, name }
                } else {
                    TypeCode::AbstractInterface { id, name }
                }
            }
            TcKind::Struct | TcKind::Except => {
                let (id, name) = self.read_header(start, body)?;
                let count = read_count(body)?;
                let mut members = Vec::with_capacity(count);
                for _ in 0..count {
                    let name = body.read_string()?;
                    let type_code = self.read(body)?;
                    members.push(TcMember { name, type_code });
                }
                if kind == TcKind::Struct {
                    TypeCode::Struct { id, name, members }
                } else {
                    TypeCode::Except { id, name, members }
                }
            }
            TcKind::Union => {
                let (id, name) = self.read_header(start, body)?;
                let discriminator = self.read(body)?;
                let default_index = body.read_long()?;
                let count = read_count(body)?;
                let mut members = Vec::with_capacity(count);
                for index in 0..count {
                    let label = if index as i32 == default_index {
                        Value::Octet(body.read_octet()?)
                    } else {
                        read_label(&discriminator, body)?
                    };
                    let name = body.read_string()?;
                    let type_code = self.read(body)?;
                    members.push(TcUnionMember {
                        label,
                        name,
                        type_code,
                    });
                }
                TypeCode::Union {
                    id,
                    name,
                    discriminator: Box::new(discriminator),
                    default_index,
                    members,
                }
            }
            TcKind::Enum => {
                let (id, name) = self.read_header(start, body)?;
                let count = read_count(body)?;
                let members = (0..count)
                    .map(|_| body.read_string())
                    .collect::<Result<Vec<_>>>()?;
                TypeCode::Enum { id, name, members }
            }
            TcKind::Sequence | TcKind::Array => {
                let element = Box::new(self.read(body)?);
                let length = body.read_ulong()?;
                if kind == TcKind::Sequence {
                    TypeCode::Sequence {
                        element,
                        bound: length,
                    }
                } else {
                    TypeCode::Array { element, length }
                }
            }
            TcKind::Alias | TcKind::ValueBox => {
                let (id, name) = self.read_header(start, body)?;
                let content = Box::new(self.read(body)?);
                if kind == TcKind::Alias {
                    TypeCode::Alias { id, name, content }
                } else {
                    TypeCode::ValueBox { id, name, content }
                }
            }
            TcKind::Value => {
                let (id, name) = self.read_header(start, body)?;
                let modifier = body.read_short()?;
                let base = match self.read(body)? {
                    TypeCode::Null => None,
                    base => Some(Box::new(base)),
                };
                let count = read_count(body)?;
                let mut members = Vec::with_capacity(count);
                for _ in 0..count {
                    let name = body.read_string()?;
                    let type_code = self.read(body)?;
                    let visibility = body.read_short()?;
                    members.push(TcValueMember {
                        name,
                        type_code,
                        visibility,
                    });
                }
                TypeCode::Value {
                    id,
                    name,
                    modifier,
                    base,
                    members,
                }
            }
            _ => {
                return Err(CorbaError::bad_param(
                    minor::UNKNOWN_TYPECODE_KIND,
                    CompletionStatus::CompletedMayBe,
                ))
            }
        })
    }
}

fn read_count(body: &mut CdrInput<'_>) -> Result<usize> {
    let count = body.read_ulong()? as usize;
    // each member takes at least one aligned long
    if count > body.bytes_left() / 4 + 1 {
        return Err(CorbaError::end_of_stream());
    }
    Ok(count)
}

fn bad_indirection() -> CorbaError {
    CorbaError::system(
        SystemExceptionKind::BadTypecode,
        minor::BAD_TYPECODE_INDIRECTION,
        CompletionStatus::CompletedMayBe,
    )
}

fn offset(target: usize, here: usize) -> Result<i32> {
    i32::try_from(target as i64 - here as i64).map_err(|_| bad_indirection())
}

/// Write a union label in the wire form of the discriminator type.
pub fn write_label(label: &Value, discriminator: &TypeCode, out: &mut CdrOutput) -> Result<()> {
    let n = label.as_i64().ok_or_else(label_mismatch)?;
    match discriminator {
        TypeCode::Short => out.write_short(n as i16)?,
        TypeCode::UShort => out.write_ushort(n as u16)?,
        TypeCode::Long => out.write_long(n as i32)?,
        TypeCode::ULong | TypeCode::Enum { .. } => out.write_ulong(n as u32)?,
        TypeCode::LongLong => out.write_longlong(n)?,
        TypeCode::ULongLong => out.write_ulonglong(n as u64)?,
        TypeCode::Boolean => out.write_bool(n != 0)?,
        TypeCode::Char => out.write_char(label_char(n)?)?,
        TypeCode::WChar => out.write_wchar(label_char(n)?)?,
        TypeCode::Alias { content, .. } => return write_label(label, content, out),
        _ => return Err(label_mismatch()),
    };
    Ok(())
}

/// Read a union label of the discriminator type.
pub fn read_label(discriminator: &TypeCode, input: &mut CdrInput<'_>) -> Result<Value> {
    Ok(match discriminator {
        TypeCode::Short => Value::Short(input.read_short()?),
        TypeCode::UShort => Value::UShort(input.read_ushort()?),
        TypeCode::Long => Value::Long(input.read_long()?),
        TypeCode::ULong => Value::ULong(input.read_ulong()?),
        TypeCode::Enum { .. } => Value::Enum(input.read_ulong()?),
        TypeCode::LongLong => Value::LongLong(input.read_longlong()?),
        TypeCode::ULongLong => Value::ULongLong(input.read_ulonglong()?),
        TypeCode::Boolean => Value::Bool(input.read_bool()?),
        TypeCode::Char => Value::Char(input.read_char()?),
        TypeCode::WChar => Value::Char(input.read_wchar()?),
        TypeCode::Alias { content, .. } => return read_label(content, input),
        _ => return Err(label_mismatch()),
    })
}

fn label_char(n: i64) -> Result<char> {
    u32::try_from(n)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(label_mismatch)
}

fn label_mismatch() -> CorbaError {
    CorbaError::bad_param(minor::VALUE_TYPE_MISMATCH, CompletionStatus::CompletedMayBe)
}
