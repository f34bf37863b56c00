// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use iiopcodec::giop::{MessageBodySerializer, OperationSignature, StaticResolver};
use iiopcodec::schema::{Directive, DirectiveSet, FieldMeta, FormalType, TypeMetadata, UnionCase};
use iiopcodec::{Marshaller, PrimitiveKind, Repository, Value};

// ============================================================================
// Formal types
// ============================================================================

pub fn long() -> FormalType {
    FormalType::Primitive(PrimitiveKind::Long)
}

pub fn wstring() -> FormalType {
    FormalType::Primitive(PrimitiveKind::String)
}

pub fn narrow() -> DirectiveSet {
    DirectiveSet::from(vec![Directive::WideChar(false)])
}

pub fn sequence(bound: u32) -> DirectiveSet {
    DirectiveSet::from(vec![Directive::sequence(bound)])
}

// ============================================================================
// Repository fixtures
// ============================================================================

pub const CALC_ID: &str = "IDL:demo/Calc:1.0";
pub const ECHO_ID: &str = "IDL:demo/Echo:1.0";
pub const OVERFLOW_ID: &str = "IDL:demo/Overflow:1.0";

/// Types used across the integration tests.
pub fn repository() -> Arc<Repository> {
    let repo = Repository::new();
    let register = |meta: TypeMetadata| repo.register(meta).expect("register type");

    register(TypeMetadata::interface(CALC_ID, "Calc", &[]));
    register(TypeMetadata::interface(ECHO_ID, "Echo", &[]));
    register(TypeMetadata::exception(
        OVERFLOW_ID,
        "Overflow",
        vec![FieldMeta::new("limit", long())],
    ));
    register(TypeMetadata::structure("IDL:demo/Empty:1.0", "Empty", vec![]));
    register(TypeMetadata::structure(
        "IDL:demo/Inner:1.0",
        "Inner",
        vec![
            FieldMeta::new("id", FormalType::Primitive(PrimitiveKind::ULongLong)),
            FieldMeta::new("tag", wstring()).with_directives(narrow()),
        ],
    ));
    register(TypeMetadata::structure(
        "IDL:demo/Middle:1.0",
        "Middle",
        vec![
            FieldMeta::new("flag", FormalType::Primitive(PrimitiveKind::Boolean)),
            FieldMeta::new("inner", FormalType::named("IDL:demo/Inner:1.0")),
        ],
    ));
    register(TypeMetadata::structure(
        "IDL:demo/Outer:1.0",
        "Outer",
        vec![
            FieldMeta::new("octet", FormalType::Primitive(PrimitiveKind::Octet)),
            FieldMeta::new("middle", FormalType::named("IDL:demo/Middle:1.0")),
            FieldMeta::new("values", FormalType::array(long())).with_directives(sequence(0)),
        ],
    ));
    register(TypeMetadata::union(
        "IDL:demo/Choice:1.0",
        "Choice",
        FormalType::Primitive(PrimitiveKind::Long),
        vec![
            UnionCase::new(vec![Value::Long(1)], "number", long()),
            UnionCase::new(vec![Value::Long(2), Value::Long(3)], "text", wstring())
                .with_directives(narrow()),
            UnionCase::new(vec![], "other", FormalType::Primitive(PrimitiveKind::Double)),
        ],
        Some(2),
    ));
    register(TypeMetadata::value_type(
        "IDL:demo/Node:1.0",
        "Node",
        None,
        vec![FieldMeta::new("weight", long())],
    ));
    Arc::new(repo)
}

pub fn marshaller() -> Arc<Marshaller> {
    Arc::new(Marshaller::new(repository()))
}

pub fn serializer() -> MessageBodySerializer {
    MessageBodySerializer::new(marshaller())
}

// ============================================================================
// Operations
// ============================================================================

/// `long add(in long a, in long b) raises (Overflow)`
pub fn add_signature() -> OperationSignature {
    OperationSignature::new("add")
        .with_in("a", long())
        .with_in("b", long())
        .with_result(long(), DirectiveSet::new())
        .with_exception(OVERFLOW_ID)
}

/// `wstring EchoWString(in wstring arg)`
pub fn echo_wstring_signature() -> OperationSignature {
    OperationSignature::new("EchoWString")
        .with_in("arg", wstring())
        .with_result(wstring(), DirectiveSet::new())
}

/// Resolver serving `calc` (Calc) and `testuri` (Echo).
pub fn resolver() -> StaticResolver {
    let resolver = StaticResolver::new();
    resolver.bind_object(b"calc", CALC_ID).expect("bind calc");
    resolver.bind_object(b"testuri", ECHO_ID).expect("bind echo");
    resolver
        .register_operation(CALC_ID, add_signature())
        .expect("register add");
    resolver
        .register_operation(ECHO_ID, echo_wstring_signature())
        .expect("register echo");
    resolver
}
