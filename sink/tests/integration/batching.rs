use config::shared::ColumnValue;
use sink::store::StateStore;
use sink::store::memory::MemoryStateStore;
use sink::test_utils::destination::{batched_destination_config, test_destination_config};
use sink::test_utils::driver::FakeDriver;
use sink::test_utils::message::AckLog;
use sink::types::AckType;
use telemetry::tracing::init_test_tracing;

use crate::start_destination;

#[tokio::test]
async fn messages_are_committed_in_batches_of_flush_lines() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.create_table("messages", &["host", "msg"]);
    let acks = AckLog::new();

    let handle =
        start_destination(&batched_destination_config(2), &driver, MemoryStateStore::new()).await;
    for i in 1..=5 {
        handle.queue(acks.message(&format!("message {i}")));
    }

    driver.wait_until(|db| db.committed.len() == 5).await;
    let stats = handle.stats();
    handle.shutdown_and_wait().await.unwrap();

    assert_eq!(driver.count_statements("COMMIT"), 3);
    assert_eq!(driver.count_statements("BEGIN"), 3);
    assert_eq!(acks.count(AckType::Processed), 5);
    assert_eq!(acks.count(AckType::Dropped), 0);
    assert_eq!(stats.queued, 5);
    assert_eq!(
        acks.acks()
            .into_iter()
            .map(|(text, _)| text)
            .collect::<Vec<_>>(),
        (1..=5).map(|i| format!("message {i}")).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn rows_are_acknowledged_only_after_their_commit() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.create_table("messages", &["host", "msg"]);
    let acks = AckLog::new();

    let handle =
        start_destination(&batched_destination_config(3), &driver, MemoryStateStore::new()).await;
    handle.queue(acks.message("first"));
    handle.queue(acks.message("second"));

    // The queue runs dry before the batch is full, so the worker commits the partial batch.
    driver
        .wait_until(|db| db.committed.len() == 2 && !db.in_transaction)
        .await;
    handle.shutdown_and_wait().await.unwrap();

    assert_eq!(acks.count(AckType::Processed), 2);
    assert_eq!(driver.count_statements("COMMIT"), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_commit_rewinds_the_whole_batch() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.create_table("messages", &["host", "msg", "seq"]);
    driver.fail_statements("COMMIT", 1);
    let acks = AckLog::new();

    let mut config = batched_destination_config(3);
    config.columns.push("seq int".to_string());
    config
        .values
        .push(ColumnValue::Template("${SEQNUM}".to_string()));

    let store = MemoryStateStore::new();
    let handle = start_destination(&config, &driver, store.clone()).await;
    for text in ["a", "b", "c"] {
        handle.queue(acks.message(text));
    }

    driver.wait_until(|db| db.committed.len() == 3).await;
    let stats = handle.stats();
    handle.shutdown_and_wait().await.unwrap();

    let inserts: Vec<String> = driver
        .statements()
        .into_iter()
        .filter(|sql| sql.starts_with("INSERT INTO"))
        .collect();
    assert_eq!(inserts.len(), 6);
    assert_eq!(inserts[..3], inserts[3..]);
    assert_eq!(driver.committed(), inserts[3..]);
    insta::assert_snapshot!(driver.committed().join("\n"), @r"
    INSERT INTO messages (host, msg, seq) VALUES ('web-1', 'a', '1')
    INSERT INTO messages (host, msg, seq) VALUES ('web-1', 'b', '2')
    INSERT INTO messages (host, msg, seq) VALUES ('web-1', 'c', '3')
    ");
    assert_eq!(
        store
            .get("sql_sequence_number(sqlite3,,,logs.db,messages)")
            .await
            .unwrap()
            .as_deref(),
        Some("4")
    );
    assert_eq!(driver.count_statements("ROLLBACK"), 1);

    // Every row is acknowledged once, after the replayed batch committed.
    assert_eq!(
        acks.acks(),
        vec![
            ("a".to_string(), AckType::Processed),
            ("b".to_string(), AckType::Processed),
            ("c".to_string(), AckType::Processed),
        ]
    );
    assert_eq!(stats.stored, 3);
    assert_eq!(stats.suspensions, 1);
}

#[tokio::test]
async fn backlog_without_batching_acknowledges_each_row() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.create_table("messages", &["host", "msg"]);
    let acks = AckLog::new();

    // Explicit commits with a non-positive flush_lines keep the backlog but never batch.
    let config = batched_destination_config(0);

    let handle = start_destination(&config, &driver, MemoryStateStore::new()).await;
    handle.queue(acks.message("one"));
    handle.queue(acks.message("two"));

    driver.wait_until(|db| db.committed.len() == 2).await;
    handle.shutdown_and_wait().await.unwrap();

    assert_eq!(acks.count(AckType::Processed), 2);
    // Only the schema check opens a transaction, inserts commit on their own.
    assert_eq!(driver.count_statements("BEGIN"), 1);
}

#[tokio::test]
async fn autocommit_mode_never_opens_transactions_for_inserts() {
    init_test_tracing();

    let driver = FakeDriver::new();
    let acks = AckLog::new();

    let handle =
        start_destination(&test_destination_config(), &driver, MemoryStateStore::new()).await;
    handle.queue(acks.message("hello"));

    driver.wait_until(|db| db.committed.len() == 1).await;
    handle.shutdown_and_wait().await.unwrap();

    insta::assert_snapshot!(driver.statements().join("\n"), @r"
    BEGIN
    SELECT * FROM messages WHERE 0=1
    COMMIT
    BEGIN
    CREATE TABLE messages (host text, msg text)
    COMMIT
    INSERT INTO messages (host, msg) VALUES ('web-1', 'hello')
    ");
    assert_eq!(acks.acks(), vec![("hello".to_string(), AckType::Processed)]);
}
