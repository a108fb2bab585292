use sink::store::memory::MemoryStateStore;
use sink::test_utils::destination::{batched_destination_config, test_destination_config};
use sink::test_utils::driver::{DriverEvent, FakeDriver};
use sink::test_utils::message::AckLog;
use sink::types::AckType;
use telemetry::tracing::init_test_tracing;

use crate::start_destination;

#[tokio::test(start_paused = true)]
async fn failing_message_is_dropped_after_retries_attempts() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.create_table("messages", &["host", "msg"]);
    driver.fail_statements("INSERT INTO", 3);
    let acks = AckLog::new();

    let config = test_destination_config();
    assert_eq!(config.retries, 3);

    let handle = start_destination(&config, &driver, MemoryStateStore::new()).await;
    handle.queue(acks.message("poison"));
    handle.queue(acks.message("healthy"));

    driver.wait_until(|db| db.committed.len() == 1).await;
    let stats = handle.stats();
    handle.shutdown_and_wait().await.unwrap();

    assert_eq!(driver.count_statements("INSERT INTO"), 4);
    assert_eq!(driver.count_events(&DriverEvent::Ping(true)), 2);
    assert_eq!(
        acks.acks(),
        vec![
            ("poison".to_string(), AckType::Dropped),
            ("healthy".to_string(), AckType::Processed),
        ]
    );
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.stored, 1);
    assert_eq!(stats.suspensions, 2);
    assert!(driver.committed()[0].contains("'healthy'"));
}

#[tokio::test]
async fn single_attempt_drops_without_suspending() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.create_table("messages", &["host", "msg"]);
    driver.fail_statements("INSERT INTO", 1);
    let acks = AckLog::new();

    let mut config = test_destination_config();
    config.retries = 1;

    let handle = start_destination(&config, &driver, MemoryStateStore::new()).await;
    handle.queue(acks.message("poison"));
    handle.queue(acks.message("healthy"));

    driver.wait_until(|db| db.committed.len() == 1).await;
    let stats = handle.stats();
    handle.shutdown_and_wait().await.unwrap();

    assert_eq!(acks.count(AckType::Dropped), 1);
    assert_eq!(acks.count(AckType::Processed), 1);
    assert_eq!(stats.suspensions, 0);
    assert_eq!(driver.count_events(&DriverEvent::Connect), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_commit_does_not_count_as_a_failed_attempt() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.create_table("messages", &["host", "msg"]);
    driver.fail_statements("COMMIT", 1);
    driver.fail_statements_after("INSERT INTO", 1, 1);
    let acks = AckLog::new();

    let mut config = batched_destination_config(1);
    config.retries = 2;

    let handle = start_destination(&config, &driver, MemoryStateStore::new()).await;
    handle.queue(acks.message("only"));

    driver.wait_until(|db| db.committed.len() == 1).await;
    let stats = handle.stats();
    handle.shutdown_and_wait().await.unwrap();

    // One failed commit and one failed insert stay within two attempts.
    assert_eq!(driver.count_statements("INSERT INTO"), 3);
    assert_eq!(acks.acks(), vec![("only".to_string(), AckType::Processed)]);
    assert_eq!(stats.dropped, 0);
    assert_eq!(stats.suspensions, 2);
}

#[tokio::test(start_paused = true)]
async fn lost_connection_mid_batch_replays_the_batch() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.create_table("messages", &["host", "msg"]);
    driver.fail_statements_after("INSERT INTO", 1, 1);
    driver.script_pings(&[false]);
    let acks = AckLog::new();

    let handle =
        start_destination(&batched_destination_config(5), &driver, MemoryStateStore::new()).await;
    handle.queue(acks.message("a"));
    handle.queue(acks.message("b"));

    driver.wait_until(|db| db.committed.len() == 2).await;
    handle.shutdown_and_wait().await.unwrap();

    let committed = driver.committed();
    assert!(committed[0].contains("'a'"));
    assert!(committed[1].contains("'b'"));
    assert_eq!(driver.count_statements("INSERT INTO"), 4);
    assert_eq!(driver.count_events(&DriverEvent::Ping(false)), 1);
    assert_eq!(
        acks.acks(),
        vec![
            ("a".to_string(), AckType::Processed),
            ("b".to_string(), AckType::Processed),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failing_row_behind_a_batch_is_dropped_after_retries_attempts() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.create_table("messages", &["host", "msg"]);
    driver.fail_statements(
        "INSERT INTO messages (host, msg) VALUES ('web-1', 'poison')",
        usize::MAX,
    );
    let acks = AckLog::new();

    let mut config = batched_destination_config(10);
    config.retries = 3;

    let handle = start_destination(&config, &driver, MemoryStateStore::new()).await;
    handle.queue(acks.message("a"));
    handle.queue(acks.message("b"));
    handle.queue(acks.message("poison"));

    driver.wait_until(|db| db.committed.len() == 2).await;
    let stats = handle.stats();
    handle.shutdown_and_wait().await.unwrap();

    // The rows ahead of the failing one are written again after every rewind.
    assert_eq!(
        driver.count_statements("INSERT INTO messages (host, msg) VALUES ('web-1', 'poison')"),
        3
    );
    assert_eq!(driver.count_statements("INSERT INTO"), 9);
    assert_eq!(
        driver.committed(),
        vec![
            "INSERT INTO messages (host, msg) VALUES ('web-1', 'a')".to_string(),
            "INSERT INTO messages (host, msg) VALUES ('web-1', 'b')".to_string(),
        ]
    );
    assert_eq!(
        acks.acks(),
        vec![
            ("poison".to_string(), AckType::Dropped),
            ("a".to_string(), AckType::Processed),
            ("b".to_string(), AckType::Processed),
        ]
    );
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.stored, 2);
    assert_eq!(stats.suspensions, 2);
}
