//! Tuple-keyed rows written and read back by the program itself.

use crate::*;

/// Instructions writing `("data", i) = "v<i>"` for `i` in `0..rows`.
fn write_rows(program: &mut Vec<Vec<Element>>, rows: i64) {
    for i in 0..rows {
        program.push(push(bytes(b"data")));
        program.push(push(i));
        program.push(push(2i64));
        program.push(op("TUPLE_PACK"));
        program.push(push(bytes(format!("v{i}").as_bytes())));
        program.push(op("SET_DATABASE"));
        program.push(op("POP"));
    }
}

fn row(i: i64) -> (Vec<u8>, Vec<u8>) {
    (
        tuple::pack(&[bytes(b"data"), Element::from(i)]).unwrap(),
        format!("v{i}").into_bytes(),
    )
}

fn packed_rows(rows: &[i64]) -> Element {
    let mut items = Vec::new();
    for &i in rows {
        let (key, value) = row(i);
        items.push(Element::bytes(key));
        items.push(Element::bytes(value));
    }
    Element::Bytes(tuple::pack(&items).unwrap())
}

#[tokio::test]
async fn test_rows_read_back_by_prefix_and_tuple_range() {
    let db = database();
    let mut program = Vec::new();
    write_rows(&mut program, 4);

    program.push(push(bytes(b"data")));
    program.push(push(1i64));
    program.push(op("TUPLE_PACK"));
    program.push(push(0i64));
    program.push(push(1i64));
    program.push(push(Element::Null));
    let starts_with = program.len();
    program.push(op("GET_RANGE_STARTS_WITH_DATABASE"));

    program.push(push(bytes(b"data")));
    program.push(push(1i64));
    program.push(op("TUPLE_RANGE"));
    program.push(push(2i64));
    program.push(push(0i64));
    program.push(push(Element::Null));
    let range = program.len();
    program.push(op("GET_RANGE_DATABASE"));

    program.push(push(bytes(b"log")));
    program.push(op("LOG_STACK"));
    load_program(&db, b"rows", &program).await;

    let summary = run(&db, b"rows").await;
    assert!(summary.is_success(), "{:?}", summary.failures);
    assert_eq!(
        logged(&db, b"log", 0, starts_with).await,
        Some(packed_rows(&[3, 2, 1, 0]))
    );
    assert_eq!(logged(&db, b"log", 1, range).await, Some(packed_rows(&[0, 1])));
}

#[tokio::test]
async fn test_cleared_rows_disappear() {
    let db = database();
    let mut program = Vec::new();
    write_rows(&mut program, 3);
    program.push(push(bytes(b"data")));
    program.push(push(1i64));
    program.push(op("TUPLE_PACK"));
    program.push(op("CLEAR_RANGE_STARTS_WITH_DATABASE"));
    program.push(op("WAIT_FUTURE"));
    program.push(op("POP"));
    load_program(&db, b"rows", &program).await;

    let summary = run(&db, b"rows").await;
    assert!(summary.is_success(), "{:?}", summary.failures);
    for i in 0..3 {
        assert_eq!(read_key(&db, &row(i).0).await, None);
    }
}
