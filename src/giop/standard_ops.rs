// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Standard CORBA operations every object supports.

use serde::{Deserialize, Serialize};

use super::dispatch::{OperationSignature, ParamMode, Parameter};
use crate::core::{minor, CompletionStatus, CorbaError, PrimitiveKind, Repository, Result, Value};
use crate::schema::{Directive, DirectiveSet, FormalType};

/// Operations handled by the generic handler instead of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StandardOperation {
    /// `_is_a(in string repository_id) -> boolean`
    IsA,
    /// `_non_existent() -> boolean`
    NonExistent,
}

impl StandardOperation {
    /// Recognize a standard operation by its wire name.
    ///
    /// `_not_existent` is the GIOP 1.0 spelling of `_non_existent`.
    pub fn from_name(operation: &str) -> Option<Self> {
        match operation {
            "_is_a" => Some(StandardOperation::IsA),
            "_non_existent" | "_not_existent" => Some(StandardOperation::NonExistent),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StandardOperation::IsA => "_is_a",
            StandardOperation::NonExistent => "_non_existent",
        }
    }

    pub fn signature(self) -> OperationSignature {
        let boolean = FormalType::Primitive(PrimitiveKind::Boolean);
        match self {
            StandardOperation::IsA => OperationSignature::new(self.name())
                .with_param(
                    Parameter::new(
                        "repository_id",
                        FormalType::Primitive(PrimitiveKind::String),
                        ParamMode::In,
                    )
                    .with_directives(DirectiveSet::from(vec![Directive::WideChar(false)])),
                )
                .with_result(boolean, DirectiveSet::new()),
            StandardOperation::NonExistent => {
                OperationSignature::new(self.name()).with_result(boolean, DirectiveSet::new())
            }
        }
    }

    /// Run the operation against the object with repository id `target`.
    pub fn invoke(self, target: &str, args: &[Value], repository: &Repository) -> Result<Value> {
        match self {
            StandardOperation::IsA => {
                let wanted = args
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| CorbaError::bad_param(minor::VALUE_TYPE_MISMATCH, CompletionStatus::CompletedNo))?;
                Ok(Value::Bool(repository.is_assignable(target, wanted)?))
            }
            // a resolvable object exists
            StandardOperation::NonExistent => Ok(Value::Bool(false)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{TypeMetadata, OBJECT_REPOSITORY_ID};

    #[test]
    fn test_from_name() {
        assert_eq!(StandardOperation::from_name("_is_a"), Some(StandardOperation::IsA));
        assert_eq!(
            StandardOperation::from_name("_not_existent"),
            Some(StandardOperation::NonExistent)
        );
        assert_eq!(StandardOperation::from_name("is_a"), None);
    }

    #[test]
    fn test_is_a() {
        let repo = Repository::new();
        repo.register(TypeMetadata::interface("IDL:Base:1.0", "Base", &[]))
            .expect("register");
        repo.register(TypeMetadata::interface("IDL:Derived:1.0", "Derived", &["IDL:Base:1.0"]))
            .expect("register");
        let is_a = |id: &str| {
            StandardOperation::IsA
                .invoke("IDL:Derived:1.0", &[Value::String(id.into())], &repo)
                .expect("invoke")
        };
        assert_eq!(is_a("IDL:Base:1.0"), Value::Bool(true));
        assert_eq!(is_a(OBJECT_REPOSITORY_ID), Value::Bool(true));
        assert_eq!(is_a("IDL:Other:1.0"), Value::Bool(false));

        let err = StandardOperation::IsA.invoke("IDL:Derived:1.0", &[], &repo).unwrap_err();
        assert_eq!(err.minor_code(), Some(9006));
    }

    #[test]
    fn test_signature_shapes() {
        let is_a = StandardOperation::IsA.signature();
        assert_eq!(is_a.in_params().count(), 1);
        assert_eq!(is_a.result, FormalType::Primitive(PrimitiveKind::Boolean));
        assert_eq!(StandardOperation::NonExistent.signature().parameters.len(), 0);
    }
}
