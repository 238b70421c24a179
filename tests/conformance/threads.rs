//! START_THREAD fan-out.

use crate::*;

fn worker(name: &str, value: i64) -> Vec<Vec<Element>> {
    vec![
        push(bytes(format!("{name}_key").as_bytes())),
        push(bytes(name.as_bytes())),
        op("SET_DATABASE"),
        op("WAIT_FUTURE"),
        op("POP"),
        push(value),
        push(bytes(format!("{name}_log").as_bytes())),
        op("LOG_STACK"),
    ]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_workers_run_concurrently_with_private_stacks() {
    let db = database();
    let names: Vec<String> = (0..4).map(|i| format!("w{i}")).collect();
    let mut root = Vec::new();
    for (i, name) in names.iter().enumerate() {
        load_program(&db, name.as_bytes(), &worker(name, i as i64)).await;
        root.push(push(bytes(name.as_bytes())));
        root.push(op("START_THREAD"));
    }
    load_program(&db, b"root", &root).await;

    let summary = run(&db, b"root").await;
    assert!(summary.is_success(), "{:?}", summary.failures);
    assert_eq!(summary.contexts, 5);
    for (i, name) in names.iter().enumerate() {
        assert_eq!(
            read_key(&db, format!("{name}_key").as_bytes()).await,
            Some(name.clone().into_bytes())
        );
        let log = format!("{name}_log");
        assert_eq!(
            logged(&db, log.as_bytes(), 0, 5).await,
            Some(Element::from(i as i64))
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_parent_waits_for_child_to_clear_its_keys() {
    let db = database();
    load_program(
        &db,
        b"root",
        &[
            push(bytes(b"child")),
            op("START_THREAD"),
            push(bytes(b"scratch/")),
            op("WAIT_EMPTY"),
            push(bytes(b"log")),
            op("LOG_STACK"),
        ],
    )
    .await;
    load_program(
        &db,
        b"child",
        &[
            push(bytes(b"scratch/a")),
            push(bytes(b"1")),
            op("SET_DATABASE"),
            push(bytes(b"scratch/")),
            op("CLEAR_RANGE_STARTS_WITH_DATABASE"),
        ],
    )
    .await;

    let summary = run(&db, b"root").await;
    assert!(summary.is_success(), "{:?}", summary.failures);
    assert_eq!(
        logged(&db, b"log", 0, 3).await,
        Some(bytes(b"WAITED_FOR_EMPTY"))
    );
    assert_eq!(read_key(&db, b"scratch/a").await, None);
}

#[tokio::test]
async fn test_missing_thread_program_is_an_empty_run() {
    let db = database();
    load_program(&db, b"root", &[push(bytes(b"nobody")), op("START_THREAD")]).await;
    let summary = run(&db, b"root").await;
    assert!(summary.is_success(), "{:?}", summary.failures);
    assert_eq!(summary.contexts, 2);
}
