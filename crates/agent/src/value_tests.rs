// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::cmp::Ordering;

use super::*;

#[test]
fn wire_names_round_trip() -> anyhow::Result<()> {
    for (ty, name) in [
        (ValueType::S8, "s8"),
        (ValueType::U32, "u32"),
        (ValueType::Float, "float"),
        (ValueType::Double, "double"),
        (ValueType::Utf8, "utf8"),
    ] {
        assert_eq!(serde_json::to_value(ty)?, json!(name));
        let back: ValueType = serde_json::from_value(json!(name))?;
        assert_eq!(back, ty);
    }
    Ok(())
}

#[test]
fn integer_parse_is_range_checked() {
    assert_eq!(ValueType::S8.parse_value(&json!("127")).ok(), Some(ScanValue::Signed(127)));
    assert!(ValueType::S8.parse_value(&json!("128")).is_err());
    assert!(ValueType::U8.parse_value(&json!("-1")).is_err());
    assert_eq!(ValueType::U16.parse_value(&json!(65535)).ok(), Some(ScanValue::Unsigned(65535)));
}

#[test]
fn little_endian_encoding() {
    let v = ScanValue::Signed(100);
    assert_eq!(ValueType::S32.encode(&v), vec![100, 0, 0, 0]);
    let v = ScanValue::Unsigned(0x0102);
    assert_eq!(ValueType::U16.encode(&v), vec![0x02, 0x01]);
    let v = ScanValue::Float(1.0);
    assert_eq!(ValueType::Float.encode(&v), 1.0f32.to_le_bytes().to_vec());
    let v = ScanValue::Bytes(b"hi".to_vec());
    assert_eq!(ValueType::Utf8.encode(&v), b"hi".to_vec());
}

#[test]
fn decode_inverts_encode() {
    for (ty, value) in [
        (ValueType::S8, ScanValue::Signed(-5)),
        (ValueType::S64, ScanValue::Signed(-1_234_567)),
        (ValueType::U32, ScanValue::Unsigned(4_000_000_000)),
        (ValueType::Double, ScanValue::Float(3.5)),
    ] {
        let bytes = ty.encode(&value);
        assert_eq!(ty.decode(&bytes), Some(value));
    }
}

#[test]
fn decode_rejects_short_slices() {
    assert_eq!(ValueType::S32.decode(&[1, 2]), None);
    assert_eq!(ValueType::U64.decode(&[]), None);
    assert_eq!(ValueType::Utf8.decode(&[]), None);
}

#[test]
fn comparisons_follow_type_semantics() {
    let a = ScanValue::Signed(3);
    let b = ScanValue::Signed(5);
    assert_eq!(a.compare(&b), Some(Ordering::Less));
    assert_eq!(b.compare(&a), Some(Ordering::Greater));

    let x = ScanValue::Float(f64::NAN);
    let y = ScanValue::Float(1.0);
    assert_eq!(x.compare(&y), None);

    // Byte values only support equality.
    let p = ScanValue::Bytes(b"aa".to_vec());
    let q = ScanValue::Bytes(b"ab".to_vec());
    assert_eq!(p.compare(&q), None);
    assert_ne!(p, q);
    assert_eq!(p, ScanValue::Bytes(b"aa".to_vec()));
}

#[test]
fn utf8_parse_requires_nonempty_string() {
    assert!(ValueType::Utf8.parse_value(&json!("")).is_err());
    assert_eq!(
        ValueType::Utf8.parse_value(&json!("abc")).ok(),
        Some(ScanValue::Bytes(b"abc".to_vec()))
    );
}
