// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Operation signatures and dispatch resolution.
//!
//! The body serializer needs the formal types of an operation's parameters
//! and result to marshal a call. A [`DispatchResolver`] maps an object key
//! and operation name to that signature; standard CORBA operations such as
//! `_is_a` are recognized before the resolver is asked.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::standard_ops::StandardOperation;
use crate::core::{minor, CompletionStatus, CorbaError, Result, SystemExceptionKind, TypeRegistry};
use crate::schema::{DirectiveSet, FormalType};

/// Direction of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamMode {
    In,
    Out,
    InOut,
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub formal: FormalType,
    pub directives: DirectiveSet,
    pub mode: ParamMode,
}

impl Parameter {
    pub fn new(name: impl Into<String>, formal: FormalType, mode: ParamMode) -> Self {
        Self {
            name: name.into(),
            formal,
            directives: DirectiveSet::new(),
            mode,
        }
    }

    pub fn with_directives(mut self, directives: DirectiveSet) -> Self {
        self.directives = directives;
        self
    }

    /// Sent with the request.
    pub fn is_in(&self) -> bool {
        matches!(self.mode, ParamMode::In | ParamMode::InOut)
    }

    /// Returned with the reply.
    pub fn is_out(&self) -> bool {
        matches!(self.mode, ParamMode::Out | ParamMode::InOut)
    }
}

/// Formal description of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSignature {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub result: FormalType,
    pub result_directives: DirectiveSet,
    /// Repository ids of the declared user exceptions
    pub exceptions: Vec<String>,
    pub one_way: bool,
}

impl OperationSignature {
    /// A two-way operation without parameters returning nothing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            result: FormalType::Void,
            result_directives: DirectiveSet::new(),
            exceptions: Vec::new(),
            one_way: false,
        }
    }

    pub fn with_param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Add an `in` parameter.
    pub fn with_in(self, name: impl Into<String>, formal: FormalType) -> Self {
        self.with_param(Parameter::new(name, formal, ParamMode::In))
    }

    pub fn with_result(mut self, formal: FormalType, directives: DirectiveSet) -> Self {
        self.result = formal;
        self.result_directives = directives;
        self
    }

    pub fn with_exception(mut self, repository_id: impl Into<String>) -> Self {
        self.exceptions.push(repository_id.into());
        self
    }

    pub fn one_way(mut self) -> Self {
        self.one_way = true;
        self
    }

    pub fn in_params(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.is_in())
    }

    pub fn out_params(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.is_out())
    }

    pub fn declares_exception(&self, repository_id: &str) -> bool {
        self.exceptions.iter().any(|id| id == repository_id)
    }
}

/// What a request resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchTarget {
    /// A standard CORBA operation, handled generically
    Standard(StandardOperation),
    /// An application operation
    Application(Arc<OperationSignature>),
}

impl DispatchTarget {
    pub fn signature(&self) -> Arc<OperationSignature> {
        match self {
            DispatchTarget::Standard(op) => Arc::new(op.signature()),
            DispatchTarget::Application(signature) => signature.clone(),
        }
    }

    pub fn is_standard(&self) -> bool {
        matches!(self, DispatchTarget::Standard(_))
    }
}

/// Resolves requests to operation signatures.
pub trait DispatchResolver: Send + Sync {
    /// Repository id of the object behind a key.
    ///
    /// Unknown keys fail with OBJECT_NOT_EXIST.
    fn target_type_id(&self, object_key: &[u8]) -> Result<String>;

    /// Signature of an application operation.
    ///
    /// Unknown operations fail with BAD_OPERATION.
    fn resolve_operation(&self, object_key: &[u8], operation: &str) -> Result<Arc<OperationSignature>>;

    /// Resolve a request target, recognizing standard operations by name.
    fn resolve(&self, object_key: &[u8], operation: &str) -> Result<DispatchTarget> {
        self.target_type_id(object_key)?;
        if let Some(standard) = StandardOperation::from_name(operation) {
            return Ok(DispatchTarget::Standard(standard));
        }
        self.resolve_operation(object_key, operation)
            .map(DispatchTarget::Application)
    }
}

/// Error for an unknown object key.
pub fn unknown_object_key() -> CorbaError {
    CorbaError::system(
        SystemExceptionKind::ObjectNotExist,
        minor::UNKNOWN_OBJECT_KEY,
        CompletionStatus::CompletedNo,
    )
}

/// Error for an unknown operation.
pub fn unknown_operation() -> CorbaError {
    CorbaError::system(
        SystemExceptionKind::BadOperation,
        minor::UNKNOWN_OPERATION,
        CompletionStatus::CompletedNo,
    )
}

/// In-memory resolver: object keys bound to interfaces, operations
/// registered per interface.
#[derive(Default)]
pub struct StaticResolver {
    objects: TypeRegistry<String>,
    operations: TypeRegistry<Arc<OperationSignature>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an object key to the repository id of its interface.
    pub fn bind_object(&self, object_key: &[u8], type_id: impl Into<String>) -> Result<()> {
        self.objects.publish(hex::encode(object_key), type_id.into())?;
        Ok(())
    }

    /// Register an operation of an interface.
    pub fn register_operation(&self, type_id: &str, signature: OperationSignature) -> Result<()> {
        let key = operation_key(type_id, &signature.name);
        self.operations.publish(key, Arc::new(signature))?;
        Ok(())
    }
}

fn operation_key(type_id: &str, operation: &str) -> String {
    format!("{type_id}#{operation}")
}

impl DispatchResolver for StaticResolver {
    fn target_type_id(&self, object_key: &[u8]) -> Result<String> {
        self.objects
            .get(&hex::encode(object_key))?
            .ok_or_else(unknown_object_key)
    }

    fn resolve_operation(&self, object_key: &[u8], operation: &str) -> Result<Arc<OperationSignature>> {
        let type_id = self.target_type_id(object_key)?;
        self.operations
            .get(&operation_key(&type_id, operation))?
            .ok_or_else(unknown_operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PrimitiveKind;

    fn resolver() -> StaticResolver {
        let resolver = StaticResolver::new();
        resolver.bind_object(b"calc", "IDL:Calc:1.0").expect("bind");
        resolver
            .register_operation(
                "IDL:Calc:1.0",
                OperationSignature::new("add")
                    .with_in("a", FormalType::Primitive(PrimitiveKind::Long))
                    .with_in("b", FormalType::Primitive(PrimitiveKind::Long)),
            )
            .expect("register");
        resolver
    }

    #[test]
    fn test_resolve_application_operation() {
        let target = resolver().resolve(b"calc", "add").expect("resolve");
        assert!(!target.is_standard());
        assert_eq!(target.signature().in_params().count(), 2);
    }

    #[test]
    fn test_standard_operations_take_precedence() {
        let target = resolver().resolve(b"calc", "_is_a").expect("resolve");
        assert_eq!(target, DispatchTarget::Standard(StandardOperation::IsA));
    }

    #[test]
    fn test_resolution_failures() {
        let err = resolver().resolve(b"nope", "add").unwrap_err();
        assert!(err.is_system(SystemExceptionKind::ObjectNotExist));
        assert_eq!(err.minor_code(), Some(2));

        let err = resolver().resolve(b"calc", "sub").unwrap_err();
        assert!(err.is_system(SystemExceptionKind::BadOperation));
        assert_eq!(err.minor_code(), Some(1));
    }

    #[test]
    fn test_parameter_modes() {
        let signature = OperationSignature::new("swap")
            .with_param(Parameter::new("a", FormalType::Any, ParamMode::InOut))
            .with_param(Parameter::new("b", FormalType::Any, ParamMode::Out));
        assert_eq!(signature.in_params().count(), 1);
        assert_eq!(signature.out_params().count(), 2);
    }
}
