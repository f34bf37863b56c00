// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Marshalling tests against the shared fixture repository.

mod common;

use iiopcodec::schema::{Directive, DirectiveKind, DirectiveSet, FormalType};
use iiopcodec::{CdrInput, CdrOutput, GiopVersion, Marshaller, SystemExceptionKind, Value};

fn round_trip_in(
    marshaller: &Marshaller,
    formal: &FormalType,
    directives: &DirectiveSet,
    value: &Value,
    version: GiopVersion,
    little_endian: bool,
) -> Value {
    // 12 is where a body starts after the message header
    let mut out = CdrOutput::for_message_body(12, little_endian).with_version(version);
    marshaller.write(formal, directives, value, &mut out).expect("write");
    let bytes = out.into_bytes();
    let mut input = CdrInput::for_message_body(&bytes, 12, little_endian).with_version(version);
    let back = marshaller.read(formal, directives, &mut input).expect("read");
    assert!(input.is_at_end(), "{} bytes left", input.bytes_left());
    back
}

fn round_trip(marshaller: &Marshaller, formal: &FormalType, directives: &DirectiveSet, value: &Value) -> Value {
    round_trip_in(marshaller, formal, directives, value, GiopVersion::V1_2, false)
}

fn outer(values: Vec<Value>) -> Value {
    Value::structure([
        ("octet", Value::Octet(0xa5)),
        (
            "middle",
            Value::structure([
                ("flag", Value::Bool(true)),
                (
                    "inner",
                    Value::structure([
                        ("id", Value::ULongLong(u64::MAX - 1)),
                        ("tag", Value::String("tag-\u{e9}".to_string())),
                    ]),
                ),
            ]),
        ),
        ("values", Value::Sequence(values)),
    ])
}

fn node(weight: i32) -> Value {
    Value::ValueType {
        repository_id: "IDL:demo/Node:1.0".to_string(),
        members: vec![("weight".to_string(), Value::Long(weight))],
    }
}

// ============================================================================
// Structs
// ============================================================================

#[test]
fn test_nested_struct_layout() {
    let marshaller = common::marshaller();
    let mut out = CdrOutput::new(false);
    marshaller
        .write(
            &FormalType::named("IDL:demo/Outer:1.0"),
            &DirectiveSet::new(),
            &outer(vec![Value::Long(1)]),
            &mut out,
        )
        .expect("write");
    let bytes = out.into_bytes();

    assert_eq!(bytes[0], 0xa5, "octet");
    assert_eq!(bytes[1], 1, "flag");
    assert_eq!(&bytes[2..8], &[0; 6], "padding before the ulonglong");
    assert_eq!(&bytes[8..16], &(u64::MAX - 1).to_be_bytes());
    assert_eq!(&bytes[16..20], &[0, 0, 0, 6], "narrow tag length");
    assert_eq!(&bytes[20..26], &[b't', b'a', b'g', b'-', 0xe9, 0]);
    assert_eq!(&bytes[28..32], &[0, 0, 0, 1], "sequence length");
    assert_eq!(&bytes[32..36], &[0, 0, 0, 1]);
    assert_eq!(bytes.len(), 36);
}

#[test]
fn test_nested_struct_round_trip_all_versions() {
    let marshaller = common::marshaller();
    let formal = FormalType::named("IDL:demo/Outer:1.0");
    let value = outer(vec![Value::Long(-1), Value::Long(0), Value::Long(i32::MAX)]);
    for version in [GiopVersion::V1_0, GiopVersion::V1_1, GiopVersion::V1_2] {
        for little_endian in [false, true] {
            let back = round_trip_in(&marshaller, &formal, &DirectiveSet::new(), &value, version, little_endian);
            assert_eq!(back, value, "{version} little_endian={little_endian}");
        }
    }
}

#[test]
fn test_empty_struct_writes_nothing() {
    let marshaller = common::marshaller();
    let formal = FormalType::named("IDL:demo/Empty:1.0");
    let mut out = CdrOutput::new(false);
    marshaller
        .write(&formal, &DirectiveSet::new(), &Value::Struct(vec![]), &mut out)
        .expect("write");
    assert!(out.data().is_empty());
    assert_eq!(
        round_trip(&marshaller, &formal, &DirectiveSet::new(), &Value::Struct(vec![])),
        Value::Struct(vec![])
    );
}

// ============================================================================
// Unions
// ============================================================================

#[test]
fn test_union_cases_and_default() {
    let marshaller = common::marshaller();
    let formal = FormalType::named("IDL:demo/Choice:1.0");
    let cases = [
        Value::union(Value::Long(1), Value::Long(42)),
        Value::union(Value::Long(2), Value::String("two".to_string())),
        Value::union(Value::Long(3), Value::String("three".to_string())),
        Value::union(Value::Long(-7), Value::Double(0.5)),
    ];
    for value in cases {
        assert_eq!(round_trip(&marshaller, &formal, &DirectiveSet::new(), &value), value);
    }
}

#[test]
fn test_union_text_case_is_narrow() {
    let marshaller = common::marshaller();
    let mut out = CdrOutput::new(false);
    marshaller
        .write(
            &FormalType::named("IDL:demo/Choice:1.0"),
            &DirectiveSet::new(),
            &Value::union(Value::Long(2), Value::String("ab".to_string())),
            &mut out,
        )
        .expect("write");
    assert_eq!(out.data(), &[0, 0, 0, 2, 0, 0, 0, 3, b'a', b'b', 0]);
}

// ============================================================================
// Sequences
// ============================================================================

#[test]
fn test_sequences() {
    let marshaller = common::marshaller();
    let formal = FormalType::array(common::long());

    let empty = Value::Sequence(vec![]);
    assert_eq!(round_trip(&marshaller, &formal, &common::sequence(0), &empty), empty);

    let many = Value::Sequence((0..100).map(Value::Long).collect());
    assert_eq!(round_trip(&marshaller, &formal, &common::sequence(0), &many), many);

    let strings = Value::Sequence(vec![Value::String("a".into()), Value::String(String::new())]);
    let narrow_seq = common::sequence(0).merge(&common::narrow());
    let element = FormalType::array(common::wstring());
    assert_eq!(round_trip(&marshaller, &element, &narrow_seq, &strings), strings);
}

#[test]
fn test_sequence_bound_enforced() {
    let marshaller = common::marshaller();
    let value = Value::Sequence(vec![Value::Long(1), Value::Long(2), Value::Long(3)]);
    let err = marshaller
        .write(
            &FormalType::array(common::long()),
            &common::sequence(2),
            &value,
            &mut CdrOutput::new(false),
        )
        .unwrap_err();
    assert!(err.is_system(SystemExceptionKind::BadParam));
    assert_eq!(err.minor_code(), Some(9005));
}

#[test]
fn test_nested_sequence_levels_ignore_directive_order() {
    let marshaller = common::marshaller();
    let formal = FormalType::array(FormalType::array(common::long()));
    let outer_bounded = Directive::Sequence { level: 1, bound: 2 };
    let inner_unbounded = Directive::sequence(0);
    let outer_unbounded = Directive::Sequence { level: 1, bound: 0 };
    let inner_bounded = Directive::sequence(2);
    // three rows of one element each
    let value = Value::Sequence(vec![Value::Sequence(vec![Value::Long(1)]); 3]);

    let write = |directives: DirectiveSet| {
        let mut out = CdrOutput::new(false);
        marshaller.write(&formal, &directives, &value, &mut out).map(|_| out.into_bytes())
    };

    // the same marshaller sees both orders; the cached kind must not matter
    for _ in 0..2 {
        for directives in [
            DirectiveSet::from(vec![outer_bounded.clone(), inner_unbounded.clone()]),
            DirectiveSet::from(vec![inner_unbounded.clone(), outer_bounded.clone()]),
        ] {
            let err = write(directives).unwrap_err();
            assert_eq!(err.minor_code(), Some(9005));
        }
        let a = write(DirectiveSet::from(vec![outer_unbounded.clone(), inner_bounded.clone()])).expect("write");
        let b = write(DirectiveSet::from(vec![inner_bounded.clone(), outer_unbounded.clone()])).expect("write");
        assert_eq!(a, b);
    }
}

#[test]
fn test_collection_directives_on_one_level_rejected() {
    let marshaller = common::marshaller();
    let formal = FormalType::array(FormalType::array(common::long()));
    let directives = DirectiveSet::from(vec![Directive::array(vec![2]), Directive::sequence(0)]);
    let value = Value::Sequence(vec![]);
    let err = marshaller
        .write(&formal, &directives, &value, &mut CdrOutput::new(false))
        .unwrap_err();
    assert!(err.is_system(SystemExceptionKind::BadParam));
}

#[test]
fn test_repeated_array_directive_is_not_the_single_one() {
    let marshaller = common::marshaller();
    let formal = FormalType::array(FormalType::array(common::long()));
    let value = Value::Array(vec![
        Value::Array(vec![Value::Long(1), Value::Long(2)]),
        Value::Array(vec![Value::Long(3), Value::Long(4)]),
    ]);

    // a single array directive leaves the inner level a counted sequence
    let single = DirectiveSet::from(vec![Directive::array(vec![2])]);
    let mut out = CdrOutput::new(false);
    marshaller
        .write(&formal, &single, &value, &mut out)
        .expect("write");
    assert_eq!(out.data().len(), 24);

    let nested = DirectiveSet::from(vec![
        Directive::Array {
            level: 1,
            dimensions: vec![2],
        },
        Directive::array(vec![2]),
    ]);
    let mut out = CdrOutput::new(false);
    marshaller
        .write(&formal, &nested, &value, &mut out)
        .expect("write");
    assert_eq!(out.data().len(), 16);
}

// ============================================================================
// Value types and any
// ============================================================================

#[test]
fn test_value_types() {
    let marshaller = common::marshaller();
    let formal = FormalType::named("IDL:demo/Node:1.0");
    let directives = DirectiveSet::new();

    let mut out = CdrOutput::new(false);
    marshaller.write(&formal, &directives, &Value::Null, &mut out).expect("null");
    assert_eq!(out.data(), &[0, 0, 0, 0]);

    assert_eq!(round_trip(&marshaller, &formal, &directives, &Value::Null), Value::Null);
    assert_eq!(round_trip(&marshaller, &formal, &directives, &node(12)), node(12));

    let list = FormalType::array(formal);
    let nodes = Value::Sequence(vec![node(1), Value::Null, node(1)]);
    assert_eq!(round_trip(&marshaller, &list, &common::sequence(0), &nodes), nodes);
}

#[test]
fn test_any_with_registered_type() {
    let marshaller = common::marshaller();
    let type_code = marshaller
        .type_code_for(&FormalType::named("IDL:demo/Outer:1.0"), &DirectiveSet::new())
        .expect("type code");
    // the cache hands out the same TypeCode on later lookups
    assert_eq!(
        marshaller
            .type_code_for(&FormalType::named("IDL:demo/Outer:1.0"), &DirectiveSet::new())
            .expect("cached"),
        type_code
    );

    let value = Value::any(type_code, outer(vec![Value::Long(5)]));
    assert_eq!(round_trip(&marshaller, &FormalType::Any, &DirectiveSet::new(), &value), value);
}

// ============================================================================
// Directives
// ============================================================================

#[test]
fn test_directive_sets() {
    let a = DirectiveSet::from(vec![Directive::WideChar(false), Directive::sequence(4)]);
    let b = DirectiveSet::from(vec![Directive::sequence(4), Directive::WideChar(false)]);
    assert_eq!(a, b);

    let merged = common::narrow().merge(&common::sequence(4));
    assert_eq!(merged, a);
    assert_eq!(merged.iter().next(), Some(&Directive::sequence(4)));

    let (taken, rest) = merged.take(DirectiveKind::Sequence);
    assert_eq!(taken, Some(Directive::sequence(4)));
    assert_eq!(rest, common::narrow());
    assert!(!rest.wide_char_allowed());
}
