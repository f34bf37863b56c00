// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Runtime value model.
//!
//! Arguments, return values and exception members travel through the
//! mapping engine as [`Value`]s. The wire form is decided by the formal type
//! and directives at the declaration site, never by the value alone, so a
//! `Value::Char` can end up as a narrow or a wide character.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::SystemException;
use crate::ior::Ior;
use crate::marshal::typecode::TypeCode;

/// A value carried in a GIOP message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    // Null reference, null value type, empty any, or a void result
    Null,

    // Primitives
    Bool(bool),
    Octet(u8),
    Short(i16),
    UShort(u16),
    Long(i32),
    ULong(u32),
    LongLong(i64),
    ULongLong(u64),
    Float(f32),
    Double(f64),
    Char(char),
    String(String),

    // Enum ordinal (or the raw value of an integer-backed enum)
    Enum(u32),

    // Constructed types
    Struct(Vec<(String, Value)>),
    Union {
        discriminator: Box<Value>,
        value: Box<Value>,
    },
    Sequence(Vec<Value>),
    Array(Vec<Value>),

    // References and containers
    ObjectRef(Box<Ior>),
    Any(Box<AnyValue>),
    TypeCode(Box<TypeCode>),
    ValueType {
        repository_id: String,
        members: Vec<(String, Value)>,
    },

    // Exceptions
    Exception {
        repository_id: String,
        members: Vec<(String, Value)>,
    },
    SystemException(SystemException),
}

/// Content of an IDL `any`: a TypeCode and the value it describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnyValue {
    pub type_code: TypeCode,
    pub value: Value,
}

impl AnyValue {
    pub fn new(type_code: TypeCode, value: Value) -> Self {
        Self { type_code, value }
    }
}

impl Value {
    /// Build a struct value from `(name, value)` pairs.
    pub fn structure<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Value::Struct(
            fields
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }

    /// Build a union value.
    pub fn union(discriminator: Value, value: Value) -> Self {
        Value::Union {
            discriminator: Box::new(discriminator),
            value: Box::new(value),
        }
    }

    /// Build an object reference value.
    pub fn object_ref(ior: Ior) -> Self {
        Value::ObjectRef(Box::new(ior))
    }

    /// Build an `any` value.
    pub fn any(type_code: TypeCode, value: Value) -> Self {
        Value::Any(Box::new(AnyValue::new(type_code, value)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view used for discriminators and integer-backed enums.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Octet(v) => Some(i64::from(*v)),
            Value::Short(v) => Some(i64::from(*v)),
            Value::UShort(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(i64::from(*v)),
            Value::ULong(v) => Some(i64::from(*v)),
            Value::LongLong(v) => Some(*v),
            Value::ULongLong(v) => i64::try_from(*v).ok(),
            Value::Enum(v) => Some(i64::from(*v)),
            Value::Char(c) => Some(i64::from(u32::from(*c))),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Look up a member of a struct, value type or exception by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        let members = match self {
            Value::Struct(members) => members,
            Value::ValueType { members, .. } | Value::Exception { members, .. } => members,
            _ => return None,
        };
        members.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Elements of a sequence or array.
    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) | Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Get the type name of this value as a string.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Octet(_) => "octet",
            Value::Short(_) => "short",
            Value::UShort(_) => "unsigned short",
            Value::Long(_) => "long",
            Value::ULong(_) => "unsigned long",
            Value::LongLong(_) => "long long",
            Value::ULongLong(_) => "unsigned long long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Enum(_) => "enum",
            Value::Struct(_) => "struct",
            Value::Union { .. } => "union",
            Value::Sequence(_) => "sequence",
            Value::Array(_) => "array",
            Value::ObjectRef(_) => "object reference",
            Value::Any(_) => "any",
            Value::TypeCode(_) => "TypeCode",
            Value::ValueType { .. } => "value type",
            Value::Exception { .. } => "exception",
            Value::SystemException(_) => "system exception",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Octet(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::UShort(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::ULong(v) => write!(f, "{v}"),
            Value::LongLong(v) => write!(f, "{v}"),
            Value::ULongLong(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "'{v}'"),
            Value::String(v) => write!(f, "\"{v}\""),
            Value::Enum(v) => write!(f, "enum({v})"),
            Value::Struct(v) => write!(f, "{{{} fields}}", v.len()),
            Value::Union {
                discriminator,
                value,
            } => write!(f, "union({discriminator}: {value})"),
            Value::Sequence(v) => write!(f, "sequence[{} elements]", v.len()),
            Value::Array(v) => write!(f, "[{} elements]", v.len()),
            Value::ObjectRef(ior) => write!(f, "objref({})", ior.type_id()),
            Value::Any(any) => write!(f, "any({})", any.value),
            Value::TypeCode(tc) => write!(f, "TypeCode({:?})", tc.kind()),
            Value::ValueType { repository_id, .. } => write!(f, "value({repository_id})"),
            Value::Exception { repository_id, .. } => write!(f, "exception({repository_id})"),
            Value::SystemException(ex) => write!(f, "{ex}"),
        }
    }
}

// =============================================================================
// Primitive Kind Enum
// =============================================================================

/// IDL primitive types.
///
/// `Char` and `String` cover both the narrow and the wide wire forms; the
/// wide-char directive at the declaration site picks one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Boolean,
    Octet,
    Short,
    UShort,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    Char,
    String,
}

impl PrimitiveKind {
    /// Natural CDR alignment in bytes.
    pub const fn alignment(self) -> usize {
        match self {
            PrimitiveKind::Boolean | PrimitiveKind::Octet | PrimitiveKind::Char => 1,
            PrimitiveKind::Short | PrimitiveKind::UShort => 2,
            PrimitiveKind::Long | PrimitiveKind::ULong | PrimitiveKind::Float => 4,
            PrimitiveKind::LongLong | PrimitiveKind::ULongLong | PrimitiveKind::Double => 8,
            PrimitiveKind::String => 4, // Length prefix is 4-byte aligned
        }
    }

    /// Check if this kind may be used as a union discriminator.
    pub const fn is_discriminator(self) -> bool {
        !matches!(
            self,
            PrimitiveKind::Octet
                | PrimitiveKind::Float
                | PrimitiveKind::Double
                | PrimitiveKind::String
        )
    }

    /// Parse an IDL type name.
    pub fn try_from_str(s: &str) -> Option<Self> {
        match s {
            "boolean" => Some(PrimitiveKind::Boolean),
            "octet" => Some(PrimitiveKind::Octet),
            "short" => Some(PrimitiveKind::Short),
            "unsigned short" => Some(PrimitiveKind::UShort),
            "long" => Some(PrimitiveKind::Long),
            "unsigned long" => Some(PrimitiveKind::ULong),
            "long long" => Some(PrimitiveKind::LongLong),
            "unsigned long long" => Some(PrimitiveKind::ULongLong),
            "float" => Some(PrimitiveKind::Float),
            "double" => Some(PrimitiveKind::Double),
            "char" | "wchar" => Some(PrimitiveKind::Char),
            "string" | "wstring" => Some(PrimitiveKind::String),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PrimitiveKind::Boolean => write!(f, "boolean"),
            PrimitiveKind::Octet => write!(f, "octet"),
            PrimitiveKind::Short => write!(f, "short"),
            PrimitiveKind::UShort => write!(f, "unsigned short"),
            PrimitiveKind::Long => write!(f, "long"),
            PrimitiveKind::ULong => write!(f, "unsigned long"),
            PrimitiveKind::LongLong => write!(f, "long long"),
            PrimitiveKind::ULongLong => write!(f, "unsigned long long"),
            PrimitiveKind::Float => write!(f, "float"),
            PrimitiveKind::Double => write!(f, "double"),
            PrimitiveKind::Char => write!(f, "char"),
            PrimitiveKind::String => write!(f, "string"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_i64() {
        assert_eq!(Value::Long(-5).as_i64(), Some(-5));
        assert_eq!(Value::Enum(3).as_i64(), Some(3));
        assert_eq!(Value::Bool(true).as_i64(), Some(1));
        assert_eq!(Value::ULongLong(u64::MAX).as_i64(), None);
        assert_eq!(Value::String("x".into()).as_i64(), None);
    }

    #[test]
    fn test_field_lookup() {
        let v = Value::structure([("x", Value::Long(1)), ("y", Value::Long(2))]);
        assert_eq!(v.field("y"), Some(&Value::Long(2)));
        assert_eq!(v.field("z"), None);
        assert_eq!(Value::Long(1).field("x"), None);
    }

    #[test]
    fn test_type_name() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::ULong(1).type_name(), "unsigned long");
        assert_eq!(Value::union(Value::Long(1), Value::Null).type_name(), "union");
    }

    #[test]
    fn test_primitive_kind_alignment() {
        assert_eq!(PrimitiveKind::Octet.alignment(), 1);
        assert_eq!(PrimitiveKind::UShort.alignment(), 2);
        assert_eq!(PrimitiveKind::Float.alignment(), 4);
        assert_eq!(PrimitiveKind::Double.alignment(), 8);
        assert_eq!(PrimitiveKind::String.alignment(), 4);
    }

    #[test]
    fn test_primitive_kind_from_str() {
        assert_eq!(
            PrimitiveKind::try_from_str("unsigned long long"),
            Some(PrimitiveKind::ULongLong)
        );
        assert_eq!(PrimitiveKind::try_from_str("wchar"), Some(PrimitiveKind::Char));
        assert_eq!(PrimitiveKind::try_from_str("int32"), None);
    }

    #[test]
    fn test_serialization() {
        let v = Value::structure([("name", Value::String("a".into())), ("n", Value::Short(3))]);
        let json = serde_json::to_string(&v).expect("serialize value");
        let back: Value = serde_json::from_str(&json).expect("deserialize value");
        assert_eq!(v, back);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Char('a').to_string(), "'a'");
        assert_eq!(Value::Sequence(vec![Value::Null]).to_string(), "sequence[1 elements]");
    }
}
