// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Object reference tests: stringified form, profiles, components.

mod common;

use iiopcodec::encoding::cdr::codeset::{LATIN1, UTF16};
use iiopcodec::ior::{ComponentData, InternetIiopProfile, TaggedComponent, TaggedProfile};
use iiopcodec::schema::{DirectiveSet, FormalType};
use iiopcodec::{CdrInput, CdrOutput, CodeSetContext, GiopVersion, Ior, SystemExceptionKind, Value};

fn calc_ior(version: GiopVersion) -> Ior {
    Ior::from_iiop(common::CALC_ID, "localhost", 8087, version, b"calc".to_vec())
}

#[test]
fn test_string_round_trip() {
    let ior = calc_ior(GiopVersion::V1_2);
    let text = ior.to_ior_string().expect("stringify");
    assert!(text.starts_with("IOR:"));
    assert!(text[4..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

    let parsed: Ior = text.parse().expect("parse");
    assert_eq!(parsed, ior);
    assert_eq!(parsed.type_id(), common::CALC_ID);
    assert_eq!(parsed.host(), Some("localhost"));
    assert_eq!(parsed.port(), Some(8087));
    assert_eq!(parsed.object_key(), Some(&b"calc"[..]));

    // hex digits are accepted in either case
    let upper = format!("IOR:{}", text[4..].to_uppercase());
    assert_eq!(upper.parse::<Ior>().expect("parse upper"), ior);
}

#[test]
fn test_null_reference_round_trip() {
    let text = Ior::null().to_ior_string().expect("stringify");
    let parsed: Ior = text.parse().expect("parse");
    assert!(parsed.is_null_reference());
    assert!(parsed.iiop_profile().is_none());
}

#[test]
fn test_profile_components_depend_on_version() {
    let old = calc_ior(GiopVersion::V1_0);
    let old = old.to_ior_string().expect("stringify").parse::<Ior>().expect("parse");
    let profile = old.iiop_profile().expect("profile");
    assert_eq!(profile.version, GiopVersion::V1_0);
    assert!(profile.components.is_empty());
    assert!(profile.code_sets().is_none());

    let new = calc_ior(GiopVersion::V1_2);
    let new = new.to_ior_string().expect("stringify").parse::<Ior>().expect("parse");
    let code_sets = new.iiop_profile().and_then(InternetIiopProfile::code_sets).expect("code sets");
    assert_eq!(code_sets.char_sets.native_set, LATIN1);
    assert_eq!(code_sets.wchar_sets.native_set, UTF16);
    assert_eq!(
        code_sets.negotiate(LATIN1, UTF16).expect("negotiate"),
        CodeSetContext::default()
    );
}

#[test]
fn test_unknown_component_kept_opaque() {
    let profile = InternetIiopProfile::new(GiopVersion::V1_2, "example.org", 2809, vec![0, 1, 2])
        .with_component(TaggedComponent::default_code_sets())
        .with_component(TaggedComponent::new(0x4f4d_0000, ComponentData::Opaque(vec![9, 8, 7])));
    let ior = Ior::new("IDL:demo/Opaque:1.0", vec![TaggedProfile::InternetIiop(profile)]).expect("ior");

    let parsed: Ior = ior.to_ior_string().expect("stringify").parse().expect("parse");
    let components = &parsed.iiop_profile().expect("profile").components;
    assert_eq!(components.len(), 2);
    assert_eq!(components[1].data, ComponentData::Opaque(vec![9, 8, 7]));
    assert_eq!(parsed, ior);
}

#[test]
fn test_unknown_profile_rejected() {
    let mut out = CdrOutput::new_encapsulation(false);
    out.write_string("IDL:demo/Odd:1.0").expect("type id");
    out.write_ulong(1).expect("count");
    out.write_ulong(99).expect("profile id");
    out.write_octet_sequence(&[0]).expect("profile body");
    let text = format!("IOR:{}", hex::encode(out.into_bytes()));

    let err = text.parse::<Ior>().unwrap_err();
    assert!(err.is_system(SystemExceptionKind::InvObjref));
    assert_eq!(err.minor_code(), Some(9421));
}

#[test]
fn test_malformed_strings_rejected() {
    for text in ["corbaloc::host/key", "IOR:zz", "ior:00"] {
        let err = text.parse::<Ior>().unwrap_err();
        assert_eq!(err.minor_code(), Some(9420), "{text}");
    }
}

#[test]
fn test_reference_without_iiop_profile_rejected() {
    let err = Ior::new("IDL:demo/X:1.0", vec![TaggedProfile::MultipleComponents(vec![])]).unwrap_err();
    assert_eq!(err.minor_code(), Some(9402));
}

#[test]
fn test_object_reference_as_parameter() {
    let marshaller = common::marshaller();
    let ior = calc_ior(GiopVersion::V1_1);
    let directives = DirectiveSet::new();

    let mut out = CdrOutput::new(false);
    marshaller
        .write(&FormalType::Object, &directives, &Value::ObjectRef(Box::new(ior.clone())), &mut out)
        .expect("write reference");
    marshaller
        .write(&FormalType::Object, &directives, &Value::Null, &mut out)
        .expect("write null");
    let bytes = out.into_bytes();

    let mut input = CdrInput::new(&bytes, false);
    assert_eq!(
        marshaller.read(&FormalType::Object, &directives, &mut input).expect("read reference"),
        Value::ObjectRef(Box::new(ior))
    );
    assert_eq!(
        marshaller.read(&FormalType::Object, &directives, &mut input).expect("read null"),
        Value::Null
    );
    assert!(input.is_at_end());
}
