use std::time::Duration;

use sink::destination::SqlDestination;
use sink::store::StateStore;
use sink::store::memory::MemoryStateStore;
use sink::test_utils::destination::{
    batched_destination_config, destination_options, test_destination_config,
};
use sink::test_utils::driver::{DriverEvent, FakeDriver};
use sink::test_utils::message::{AckLog, test_message};
use sink::types::{AckType, LogMessage};
use telemetry::tracing::init_test_tracing;
use tokio::time::Instant;

use crate::start_destination;

const SEQUENCE_KEY: &str = "sql_sequence_number(sqlite3,,,logs.db,messages)";
const QUEUE_KEY: &str = "sql_queue(sqlite3,,,logs.db,messages)";
const LEGACY_QUEUE_KEY: &str = "sql_queue(sqlite3,,,logs.db)";

#[tokio::test(start_paused = true)]
async fn dead_connection_suspends_once_per_time_reopen() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.create_table("messages", &["host", "msg"]);
    let acks = AckLog::new();

    let config = test_destination_config();
    let time_reopen = Duration::from_millis(config.time_reopen_ms);

    let handle = start_destination(&config, &driver, MemoryStateStore::new()).await;
    handle.queue(acks.message("before"));
    driver.wait_until(|db| db.committed.len() == 1).await;

    driver.set_alive(false);
    let outage_started = Instant::now();
    handle.queue(acks.message("during"));

    // The failed insert closes the connection, the next connect comes one time_reopen later.
    driver
        .wait_until(|db| db.count_events(&DriverEvent::ConnectFailed) == 1)
        .await;
    assert!(outage_started.elapsed() >= time_reopen);
    assert_eq!(driver.count_events(&DriverEvent::Close), 1);
    assert_eq!(driver.count_events(&DriverEvent::Ping(false)), 1);

    driver.set_alive(true);
    driver.wait_until(|db| db.committed.len() == 2).await;
    assert!(outage_started.elapsed() >= time_reopen * 2);

    let stats = handle.stats();
    handle.shutdown_and_wait().await.unwrap();

    assert_eq!(driver.count_events(&DriverEvent::ConnectFailed), 1);
    assert_eq!(stats.suspensions, 2);
    assert_eq!(stats.dropped, 0);
    assert_eq!(
        acks.acks(),
        vec![
            ("before".to_string(), AckType::Processed),
            ("during".to_string(), AckType::Processed),
        ]
    );
}

#[tokio::test]
async fn shutdown_drains_queue_and_commits_open_batch() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.create_table("messages", &["host", "msg"]);
    let store = MemoryStateStore::new();
    let acks = AckLog::new();

    let handle = start_destination(&batched_destination_config(10), &driver, store.clone()).await;
    for text in ["x", "y", "z"] {
        handle.queue(acks.message(text));
    }
    handle.shutdown_and_wait().await.unwrap();

    assert_eq!(driver.committed().len(), 3);
    assert_eq!(acks.count(AckType::Processed), 3);
    assert_eq!(store.get(SEQUENCE_KEY).await.unwrap().as_deref(), Some("4"));
    assert_eq!(store.get(QUEUE_KEY).await.unwrap(), None);
    assert_eq!(driver.count_events(&DriverEvent::Close), 1);
}

#[tokio::test]
async fn undelivered_messages_survive_a_restart() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.create_table("messages", &["host", "msg"]);
    driver.set_alive(false);
    let store = MemoryStateStore::new();

    let config = batched_destination_config(10);
    let handle = start_destination(&config, &driver, store.clone()).await;
    handle.queue(test_message("kept 1"));
    handle.queue(test_message("kept 2"));
    handle.shutdown_and_wait().await.unwrap();

    assert!(driver.committed().is_empty());
    let persisted = store.get(QUEUE_KEY).await.unwrap().unwrap();
    let messages: Vec<LogMessage> = serde_json::from_str(&persisted).unwrap();
    assert_eq!(messages, vec![test_message("kept 1"), test_message("kept 2")]);
    assert_eq!(store.get(SEQUENCE_KEY).await.unwrap().as_deref(), Some("1"));

    driver.set_alive(true);
    let handle = start_destination(&config, &driver, store.clone()).await;
    driver.wait_until(|db| db.committed.len() == 2).await;
    handle.shutdown_and_wait().await.unwrap();

    let committed = driver.committed();
    assert!(committed[0].contains("'kept 1'"));
    assert!(committed[1].contains("'kept 2'"));
    assert_eq!(store.get(QUEUE_KEY).await.unwrap(), None);
    assert_eq!(store.get(SEQUENCE_KEY).await.unwrap().as_deref(), Some("3"));
}

#[tokio::test]
async fn sequence_number_is_restored_and_used_in_templates() {
    init_test_tracing();

    let driver = FakeDriver::new();
    let store = MemoryStateStore::new();
    store.set(SEQUENCE_KEY, "41".to_string()).await.unwrap();

    let mut config = test_destination_config();
    config.columns.push("seq int".to_string());
    config
        .values
        .push(config::shared::ColumnValue::Template("${SEQNUM}".to_string()));

    let handle = start_destination(&config, &driver, store.clone()).await;
    handle.queue(test_message("one"));
    handle.queue(test_message("two"));
    driver.wait_until(|db| db.committed.len() == 2).await;
    handle.shutdown_and_wait().await.unwrap();

    insta::assert_snapshot!(driver.committed().join("\n"), @r"
    INSERT INTO messages (host, msg, seq) VALUES ('web-1', 'one', '41')
    INSERT INTO messages (host, msg, seq) VALUES ('web-1', 'two', '42')
    ");
    assert_eq!(store.get(SEQUENCE_KEY).await.unwrap().as_deref(), Some("43"));
}

#[tokio::test]
async fn legacy_queue_entry_is_migrated() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.create_table("messages", &["host", "msg"]);
    let store = MemoryStateStore::new();
    let legacy = serde_json::to_string(&vec![test_message("from before the upgrade")]).unwrap();
    store.set(LEGACY_QUEUE_KEY, legacy).await.unwrap();

    let handle = start_destination(&test_destination_config(), &driver, store.clone()).await;
    driver.wait_until(|db| db.committed.len() == 1).await;
    handle.shutdown_and_wait().await.unwrap();

    assert!(driver.committed()[0].contains("'from before the upgrade'"));
    let entries = store.entries().await;
    assert!(!entries.contains_key(LEGACY_QUEUE_KEY));
    assert!(!entries.contains_key(QUEUE_KEY));
}

#[tokio::test]
async fn session_statements_run_after_connecting() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.create_table("messages", &["host", "msg"]);
    let mut config = test_destination_config();
    config.session_statements = vec!["PRAGMA journal_mode=WAL".to_string()];

    let handle = start_destination(&config, &driver, MemoryStateStore::new()).await;
    handle.queue(test_message("hello"));
    driver.wait_until(|db| db.committed.len() == 1).await;
    handle.shutdown_and_wait().await.unwrap();

    assert_eq!(driver.statements()[0], "PRAGMA journal_mode=WAL");
}

#[tokio::test(start_paused = true)]
async fn failing_session_statement_fails_the_connection() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.create_table("messages", &["host", "msg"]);
    driver.fail_statements("SET", 1);
    let mut config = test_destination_config();
    config.session_statements = vec!["SET search_path TO logs".to_string()];

    let handle = start_destination(&config, &driver, MemoryStateStore::new()).await;
    handle.queue(test_message("hello"));
    driver.wait_until(|db| db.committed.len() == 1).await;
    let stats = handle.stats();
    handle.shutdown_and_wait().await.unwrap();

    // The first connection is closed right away and the worker retries after time_reopen.
    assert_eq!(driver.count_events(&DriverEvent::Connect), 2);
    assert_eq!(driver.count_statements("SET search_path TO logs"), 2);
    assert_eq!(stats.suspensions, 1);
}

#[tokio::test]
async fn unsupported_driver_type_fails_without_panicking() {
    init_test_tracing();

    let mut config = test_destination_config();
    config.connection.driver_type = "oracle".to_string();
    let destination: SqlDestination<_, _> = SqlDestination::new(
        destination_options(&config),
        sink::client::sqlx_driver::SqlxDriver::new(),
        MemoryStateStore::new(),
    );

    let handle = destination.start().await.unwrap();
    handle.queue(test_message("nowhere to go"));
    handle.shutdown_and_wait().await.unwrap();
}
