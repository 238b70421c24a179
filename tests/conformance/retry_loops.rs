//! Two named transactions racing on one key.

use stacktester::error_marker;

use crate::*;

/// t1 reads `shared`, t2 overwrites it and commits, then t1 commits and
/// hands the outcome to ON_ERROR.
fn racing_program(read: &str) -> Vec<Vec<Element>> {
    vec![
        push(bytes(b"t1")),        // 0
        op("USE_TRANSACTION"),     // 1
        push(bytes(b"shared")),    // 2
        op(read),                  // 3
        op("WAIT_FUTURE"),         // 4
        op("POP"),                 // 5
        push(bytes(b"t1_out")),    // 6
        push(bytes(b"x")),         // 7
        op("SET"),                 // 8
        push(bytes(b"t2")),        // 9
        op("USE_TRANSACTION"),     // 10
        push(bytes(b"shared")),    // 11
        push(bytes(b"new")),       // 12
        op("SET"),                 // 13
        op("COMMIT"),              // 14
        op("WAIT_FUTURE"),         // 15
        op("POP"),                 // 16
        push(bytes(b"t1")),        // 17
        op("USE_TRANSACTION"),     // 18
        op("COMMIT"),              // 19
        op("WAIT_FUTURE"),         // 20
        push(bytes(b"log")),       // 21
        op("LOG_STACK"),           // 22
    ]
}

#[tokio::test]
async fn test_stale_read_fails_commit_with_conflict_marker() {
    let db = database();
    load_program(&db, b"race", &racing_program("GET")).await;

    let summary = run(&db, b"race").await;
    assert!(summary.is_success(), "{:?}", summary.failures);
    assert_eq!(
        logged(&db, b"log", 0, 19).await,
        Some(error_marker(1020).unwrap())
    );
    assert_eq!(read_key(&db, b"shared").await, Some(b"new".to_vec()));
    assert_eq!(read_key(&db, b"t1_out").await, None);
}

#[tokio::test]
async fn test_snapshot_read_does_not_conflict() {
    let db = database();
    load_program(&db, b"race", &racing_program("GET_SNAPSHOT")).await;

    let summary = run(&db, b"race").await;
    assert!(summary.is_success(), "{:?}", summary.failures);
    assert_eq!(logged(&db, b"log", 0, 19).await, Some(not_present()));
    assert_eq!(read_key(&db, b"t1_out").await, Some(b"x".to_vec()));
}

#[tokio::test]
async fn test_on_error_retries_and_second_attempt_commits() {
    let db = database();
    let mut program = racing_program("GET");
    program.truncate(21);
    program.extend([
        op("POP"),                 // 21: the conflict marker
        push(1020i64),             // 22
        op("ON_ERROR"),            // 23
        op("WAIT_FUTURE"),         // 24
        push(bytes(b"t1_out")),    // 25
        push(bytes(b"retried")),   // 26
        op("SET"),                 // 27
        op("COMMIT"),              // 28
        op("WAIT_FUTURE"),         // 29
        push(bytes(b"log")),       // 30
        op("LOG_STACK"),           // 31
    ]);
    load_program(&db, b"race", &program).await;

    let summary = run(&db, b"race").await;
    assert!(summary.is_success(), "{:?}", summary.failures);
    assert_eq!(logged(&db, b"log", 0, 23).await, Some(not_present()));
    assert_eq!(logged(&db, b"log", 1, 28).await, Some(not_present()));
    assert_eq!(read_key(&db, b"t1_out").await, Some(b"retried".to_vec()));
}

#[tokio::test]
async fn test_non_retryable_code_is_logged_as_marker() {
    let db = database();
    load_program(
        &db,
        b"root",
        &[
            push(2000i64),
            op("ON_ERROR"),
            op("WAIT_FUTURE"),
            push(bytes(b"log")),
            op("LOG_STACK"),
        ],
    )
    .await;

    let summary = run(&db, b"root").await;
    assert!(summary.is_success(), "{:?}", summary.failures);
    assert_eq!(
        logged(&db, b"log", 0, 1).await,
        Some(error_marker(2000).unwrap())
    );
}
