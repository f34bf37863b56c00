// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! CDR stream tests: alignment, byte order, strings, encapsulations.

use iiopcodec::core::SystemExceptionKind;
use iiopcodec::{CdrInput, CdrOutput, CodeSetContext, CompletionStatus, GiopVersion};

// ============================================================================
// Alignment
// ============================================================================

#[test]
fn test_scripted_writes_are_naturally_aligned() {
    let mut out = CdrOutput::new(false);
    out.write_octet(1).expect("octet");
    out.write_short(2).expect("short");
    out.write_octet(3).expect("octet");
    out.write_long(4).expect("long");
    out.write_octet(5).expect("octet");
    out.write_double(6.0).expect("double");
    out.write_ushort(7).expect("ushort");
    out.write_longlong(8).expect("longlong");
    let bytes = out.into_bytes();

    // octet@0 short@2 octet@4 long@8 octet@12 double@16 ushort@24 longlong@32
    assert_eq!(bytes.len(), 40);
    assert_eq!(&bytes[0..4], &[1, 0, 0, 2]);
    assert_eq!(&bytes[4..12], &[3, 0, 0, 0, 0, 0, 0, 4]);
    assert_eq!(bytes[12], 5);
    assert_eq!(&bytes[13..16], &[0, 0, 0]);
    assert_eq!(&bytes[24..26], &[0, 7]);
    assert_eq!(&bytes[26..32], &[0; 6]);
    assert_eq!(bytes[39], 8);

    let mut input = CdrInput::new(&bytes, false);
    assert_eq!(input.read_octet().expect("octet"), 1);
    assert_eq!(input.read_short().expect("short"), 2);
    assert_eq!(input.read_octet().expect("octet"), 3);
    assert_eq!(input.read_long().expect("long"), 4);
    assert_eq!(input.read_octet().expect("octet"), 5);
    assert_eq!(input.read_double().expect("double"), 6.0);
    assert_eq!(input.read_ushort().expect("ushort"), 7);
    assert_eq!(input.read_longlong().expect("longlong"), 8);
    assert!(input.is_at_end());
}

#[test]
fn test_message_body_aligns_to_message_start() {
    // the body starts after the 12 byte header
    let mut out = CdrOutput::for_message_body(12, false);
    out.write_octet(1).expect("octet");
    out.write_double(2.0).expect("double");
    let bytes = out.into_bytes();
    // global 12 octet, 13..16 pad, double at global 16 = local 4
    assert_eq!(bytes.len(), 12);

    let mut input = CdrInput::for_message_body(&bytes, 12, false);
    input.read_octet().expect("octet");
    assert_eq!(input.read_double().expect("double"), 2.0);
    assert_eq!(input.global_position(), 24);
}

#[test]
fn test_force_align_on_empty_stream() {
    let mut out = CdrOutput::for_message_body(12, false);
    out.force_align(8).expect("align");
    assert_eq!(out.position(), 4);
    assert_eq!(out.global_position(), 16);
}

// ============================================================================
// Byte order
// ============================================================================

#[test]
fn test_known_long_layouts() {
    let mut be = CdrOutput::new(false);
    be.write_long(0x0102_0304).expect("long");
    assert_eq!(be.data(), &[0x01, 0x02, 0x03, 0x04]);

    let mut le = CdrOutput::new(true);
    le.write_long(0x0102_0304).expect("long");
    assert_eq!(le.data(), &[0x04, 0x03, 0x02, 0x01]);
}

#[test]
fn test_wrong_byte_order_reads_reversed_value() {
    let mut le = CdrOutput::new(true);
    le.write_ulong(0x0102_0304).expect("ulong");
    le.write_ulonglong(0x0102_0304_0506_0708).expect("ulonglong");
    let bytes = le.into_bytes();

    let mut same = CdrInput::new(&bytes, true);
    assert_eq!(same.read_ulong().expect("ulong"), 0x0102_0304);
    assert_eq!(same.read_ulonglong().expect("ulonglong"), 0x0102_0304_0506_0708);

    let mut swapped = CdrInput::new(&bytes, false);
    assert_eq!(swapped.read_ulong().expect("ulong"), 0x0102_0304u32.swap_bytes());
    assert_eq!(
        swapped.read_ulonglong().expect("ulonglong"),
        0x0102_0304_0506_0708u64.swap_bytes()
    );
}

#[test]
fn test_floating_point_boundaries() {
    for little_endian in [false, true] {
        let mut out = CdrOutput::new(little_endian);
        out.write_float(f32::MIN_POSITIVE).expect("float");
        out.write_double(f64::MAX).expect("double");
        out.write_double(-0.0).expect("double");
        let bytes = out.into_bytes();
        let mut input = CdrInput::new(&bytes, little_endian);
        assert_eq!(input.read_float().expect("float"), f32::MIN_POSITIVE);
        assert_eq!(input.read_double().expect("double"), f64::MAX);
        assert!(input.read_double().expect("double").is_sign_negative());
    }
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn test_narrow_string_round_trip() {
    let mut out = CdrOutput::new(false);
    out.write_string("").expect("empty");
    out.write_string("caf\u{e9}").expect("latin1");
    let bytes = out.into_bytes();
    assert_eq!(&bytes[0..5], &[0, 0, 0, 1, 0]);

    let mut input = CdrInput::new(&bytes, false);
    assert_eq!(input.read_string().expect("empty"), "");
    assert_eq!(input.read_string().expect("latin1"), "caf\u{e9}");
}

#[test]
fn test_zero_length_string_is_tolerated() {
    let bytes = [0u8, 0, 0, 0];
    let mut input = CdrInput::new(&bytes, false);
    assert_eq!(input.read_string().expect("read"), "");
}

#[test]
fn test_wstring_layout_depends_on_version() {
    let text = "h\u{e9}";

    let mut v12 = CdrOutput::new(false);
    v12.write_wstring(text).expect("1.2");
    assert_eq!(v12.data(), &[0, 0, 0, 4, 0, b'h', 0, 0xe9]);

    let mut v10 = CdrOutput::new(false).with_version(GiopVersion::V1_0);
    v10.write_wstring(text).expect("1.0");
    assert_eq!(v10.data(), &[0, 0, 0, 3, 0, b'h', 0, 0xe9, 0, 0]);

    for (bytes, version) in [(v12.into_bytes(), GiopVersion::V1_2), (v10.into_bytes(), GiopVersion::V1_0)] {
        let mut input = CdrInput::new(&bytes, false).with_version(version);
        assert_eq!(input.read_wstring().expect("read"), text);
        assert!(input.is_at_end());
    }
}

#[test]
fn test_wide_data_needs_negotiated_codeset() {
    let mut out = CdrOutput::new(false).with_codesets(CodeSetContext::unnegotiated());
    let err = out.write_wstring("x").unwrap_err();
    assert!(err.is_system(SystemExceptionKind::BadParam));
    assert_eq!(err.minor_code(), Some(987));

    let bytes = [0u8, 0, 0, 2, 0, b'x'];
    let mut input = CdrInput::new(&bytes, false).with_codesets(CodeSetContext::unnegotiated());
    assert_eq!(input.read_wstring().unwrap_err().minor_code(), Some(987));
    assert_eq!(input.read_wchar().unwrap_err().minor_code(), Some(987));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_read_past_end_is_marshal_1207() {
    let bytes = [0u8, 0, 0];
    let mut input = CdrInput::new(&bytes, false);
    let err = input.read_long().unwrap_err();
    assert!(err.is_system(SystemExceptionKind::Marshal));
    assert_eq!(err.minor_code(), Some(1207));
    assert_eq!(err.completion_status(), Some(CompletionStatus::CompletedMayBe));
}

#[test]
fn test_invalid_boolean_rejected() {
    let bytes = [2u8];
    let err = CdrInput::new(&bytes, false).read_bool().unwrap_err();
    assert_eq!(err.minor_code(), Some(10030));
}

// ============================================================================
// Encapsulations
// ============================================================================

#[test]
fn test_nested_encapsulation_keeps_global_positions() {
    let mut out = CdrOutput::for_message_body(12, false);
    out.write_octet(9).expect("octet");
    let mut child = out.encapsulation_stream();
    child.write_long(-1).expect("long");
    child.write_string("inner").expect("string");
    out.write_encapsulation(child).expect("encapsulation");
    out.write_octet(7).expect("trailer");
    let bytes = out.into_bytes();

    let mut input = CdrInput::for_message_body(&bytes, 12, false);
    assert_eq!(input.read_octet().expect("octet"), 9);
    let mut inner = input.read_encapsulation().expect("open");
    // length field at global 16, flag octet at global 20
    assert_eq!(inner.global_position(), 21);
    assert_eq!(inner.read_long().expect("long"), -1);
    assert_eq!(inner.read_string().expect("string"), "inner");
    assert!(inner.is_at_end());
    assert_eq!(input.read_octet().expect("trailer"), 7);
}

#[test]
fn test_encapsulation_byte_order_is_independent() {
    let mut child = CdrOutput::new_encapsulation(true);
    child.write_ulong(0x0001_0109).expect("ulong");
    let data = child.into_bytes();
    assert_eq!(data, vec![1, 0, 0, 0, 0x09, 0x01, 0x01, 0x00]);

    let mut input = CdrInput::from_encapsulation(&data).expect("open");
    assert!(input.is_little_endian());
    assert_eq!(input.read_ulong().expect("ulong"), 0x0001_0109);
}
