//! Tuple codec instructions and float encodings.

use stacktester_core::{tuple, Versionstamp};

use super::*;
use crate::Error;

fn stamp() -> Element {
    Element::Versionstamp(Versionstamp::incomplete(0))
}

fn with_skip_probability(p: f64) -> Harness {
    Harness::with_config(TesterConfig {
        versionstamp_skip_probability: p,
        ..test_config()
    })
}

#[tokio::test]
async fn test_tuple_pack_uses_push_order() {
    let mut h = Harness::new();
    h.run(vec![push(1i64), push("x"), push(2i64), op("TUPLE_PACK")])
        .await
        .unwrap();
    let expected = tuple::pack(&[Element::from(1i64), Element::from("x")]).unwrap();
    assert_eq!(h.resolved().await, vec![Element::Bytes(expected)]);
}

#[tokio::test]
async fn test_tuple_unpack_pushes_one_element_tuples() {
    let mut h = Harness::new();
    let packed = tuple::pack(&[Element::from(1i64), Element::from("x")]).unwrap();
    h.run(vec![push(Element::Bytes(packed)), op("TUPLE_UNPACK")])
        .await
        .unwrap();
    assert_eq!(
        h.resolved().await,
        vec![
            Element::Bytes(tuple::pack(&[Element::from(1i64)]).unwrap()),
            Element::Bytes(tuple::pack(&[Element::from("x")]).unwrap()),
        ]
    );
}

#[tokio::test]
async fn test_tuple_range_pushes_begin_then_end() {
    let mut h = Harness::new();
    h.run(vec![push("p"), push(1i64), op("TUPLE_RANGE")])
        .await
        .unwrap();
    let (begin, end) = tuple::range(&[Element::from("p")]).unwrap();
    assert_eq!(
        h.resolved().await,
        vec![Element::Bytes(begin), Element::Bytes(end)]
    );
}

#[tokio::test]
async fn test_tuple_sort_orders_by_codec() {
    let mut h = Harness::new();
    let two = tuple::pack(&[Element::from(2i64)]).unwrap();
    let neg = tuple::pack(&[Element::from(-5i64)]).unwrap();
    let text = tuple::pack(&[Element::from("a")]).unwrap();
    h.run(vec![
        push(Element::Bytes(two.clone())),
        push(Element::Bytes(text.clone())),
        push(Element::Bytes(neg.clone())),
        push(3i64),
        op("TUPLE_SORT"),
    ])
    .await
    .unwrap();
    assert_eq!(
        h.resolved().await,
        vec![Element::Bytes(text), Element::Bytes(neg), Element::Bytes(two)]
    );
}

#[tokio::test]
async fn test_tuple_unpack_of_garbage_is_fatal() {
    let mut h = Harness::new();
    let err = h
        .run(vec![push(bytes(b"\x7f")), op("TUPLE_UNPACK")])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Tuple(_)));
}

// =============================================================================
// Versionstamp packing
// =============================================================================

#[tokio::test]
async fn test_pack_with_versionstamp_single_placeholder() {
    let mut h = with_skip_probability(1.0);
    h.run(vec![
        push("a"),
        push(stamp()),
        push(bytes(b"pre")),
        push(2i64),
        op("TUPLE_PACK_WITH_VERSIONSTAMP"),
    ])
    .await
    .unwrap();
    let expected =
        tuple::pack_with_versionstamp(b"pre", &[Element::from("a"), stamp()]).unwrap();
    assert_eq!(
        h.resolved().await,
        vec![bytes(b"OK"), Element::Bytes(expected)]
    );
}

#[tokio::test]
async fn test_pack_with_versionstamp_multiple_placeholders() {
    let mut h = with_skip_probability(1.0);
    h.run(vec![
        push(stamp()),
        push(stamp()),
        push(bytes(b"pre")),
        push(2i64),
        op("TUPLE_PACK_WITH_VERSIONSTAMP"),
    ])
    .await
    .unwrap();
    assert_eq!(h.resolved().await, vec![bytes(b"ERROR: MULTIPLE")]);
}

#[tokio::test]
async fn test_pack_with_versionstamp_without_placeholder() {
    for p in [0.0, 0.5, 1.0] {
        let mut h = with_skip_probability(p);
        h.run(vec![
            push("a"),
            push(bytes(b"pre")),
            push(1i64),
            op("TUPLE_PACK_WITH_VERSIONSTAMP"),
        ])
        .await
        .unwrap();
        assert_eq!(h.resolved().await, vec![bytes(b"ERROR: NONE")]);
    }
}

#[tokio::test]
async fn test_nested_placeholder_counts() {
    let mut h = with_skip_probability(0.0);
    h.run(vec![
        push(Element::Tuple(vec![stamp()])),
        push(bytes(b"")),
        push(1i64),
        op("TUPLE_PACK_WITH_VERSIONSTAMP"),
    ])
    .await
    .unwrap();
    assert_eq!(h.resolved().await[0], bytes(b"OK"));
}

// =============================================================================
// Float encodings
// =============================================================================

#[tokio::test]
async fn test_encode_and_decode_floats() {
    let mut h = Harness::new();
    h.run(vec![
        push(bytes(&1.5f32.to_be_bytes())),
        op("ENCODE_FLOAT"),
        push(bytes(&(-0.25f64).to_be_bytes())),
        op("ENCODE_DOUBLE"),
        push(Element::Float(3.0)),
        op("DECODE_FLOAT"),
        push(Element::Double(f64::INFINITY)),
        op("DECODE_DOUBLE"),
    ])
    .await
    .unwrap();
    assert_eq!(
        h.resolved().await,
        vec![
            Element::Float(1.5),
            Element::Double(-0.25),
            bytes(&3.0f32.to_be_bytes()),
            bytes(&f64::INFINITY.to_be_bytes()),
        ]
    );
}

#[tokio::test]
async fn test_encode_preserves_nan_payload() {
    let mut h = Harness::new();
    let raw = [0x7f, 0xc0, 0x00, 0x01];
    h.run(vec![push(bytes(&raw)), op("ENCODE_FLOAT"), op("DECODE_FLOAT")])
        .await
        .unwrap();
    assert_eq!(h.resolved().await, vec![bytes(&raw)]);
}

#[tokio::test]
async fn test_encode_float_rejects_wrong_width() {
    let mut h = Harness::new();
    let err = h
        .run(vec![push(bytes(&[0, 0])), op("ENCODE_FLOAT")])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidParameter { operation: "ENCODE_FLOAT", .. }));
}

#[tokio::test]
async fn test_decode_accepts_integer_operands() {
    let mut h = Harness::new();
    h.run(vec![
        push(3i64),
        op("DECODE_FLOAT"),
        push(-7i64),
        op("DECODE_DOUBLE"),
    ])
    .await
    .unwrap();
    assert_eq!(
        h.resolved().await,
        vec![
            bytes(&3.0f32.to_be_bytes()),
            bytes(&(-7.0f64).to_be_bytes()),
        ]
    );
}

#[tokio::test]
async fn test_decode_rejects_non_numbers() {
    let mut h = Harness::new();
    let err = h
        .run(vec![push("1.5"), op("DECODE_DOUBLE")])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidParameter { operation: "DECODE_DOUBLE", .. }));
}
