use std::sync::Arc;

use config::shared::{DestinationFlag, SqlDestinationConfig};
use sink::destination::SqlSession;
use sink::error::ErrorKind;
use sink::queue::memory::MemoryQueue;
use sink::stats::DestinationStats;
use sink::store::memory::MemoryStateStore;
use sink::test_utils::destination::{destination_options, test_destination_config};
use sink::test_utils::driver::FakeDriver;
use sink::test_utils::message::AckLog;
use telemetry::tracing::init_test_tracing;

use crate::start_destination;

async fn connected_session(
    config: &SqlDestinationConfig,
    driver: &FakeDriver,
) -> SqlSession<FakeDriver, MemoryQueue> {
    let options = Arc::new(destination_options(config));
    let stats = DestinationStats::new(options.stats_instance());
    let mut session = SqlSession::new(options, driver.clone(), Arc::new(MemoryQueue::new()), stats);
    session.ensure_connection().await.unwrap();

    session
}

#[tokio::test]
async fn missing_columns_are_added_with_their_indexes() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.create_table("messages", &["host"]);

    let mut config = test_destination_config();
    config.indexes = vec!["msg".to_string()];
    let mut session = connected_session(&config, &driver).await;

    let table = session.validate_table("messages").await.unwrap();
    assert_eq!(table, "messages");

    insta::assert_snapshot!(driver.statements().join("\n"), @r"
    BEGIN
    SELECT * FROM messages WHERE 0=1
    COMMIT
    BEGIN
    ALTER TABLE messages ADD msg text
    CREATE INDEX messages_msg_idx ON messages (msg)
    COMMIT
    ");
    assert_eq!(
        driver.table_columns("messages"),
        Some(vec!["host".to_string(), "msg".to_string()])
    );
    assert!(!session.in_transaction());
}

#[tokio::test]
async fn second_validation_issues_no_statements() {
    init_test_tracing();

    let driver = FakeDriver::new();
    let mut session = connected_session(&test_destination_config(), &driver).await;

    session.validate_table("messages").await.unwrap();
    let issued = driver.statements().len();
    assert_eq!(driver.count_statements("CREATE TABLE"), 1);

    session.validate_table("messages").await.unwrap();
    assert_eq!(driver.statements().len(), issued);
    assert!(session.is_table_validated("messages"));

    // A new connection checks the table again but finds nothing to change.
    session.disconnect().await;
    assert!(!session.is_table_validated("messages"));
    session.ensure_connection().await.unwrap();
    session.validate_table("messages").await.unwrap();

    assert_eq!(driver.count_statements("CREATE TABLE"), 1);
    assert_eq!(driver.count_statements("ALTER TABLE"), 0);
    assert_eq!(driver.count_statements("SELECT * FROM messages"), 2);
}

#[tokio::test]
async fn table_names_are_sanitized() {
    init_test_tracing();

    let driver = FakeDriver::new();
    let mut session = connected_session(&test_destination_config(), &driver).await;

    let table = session.validate_table("orders table").await.unwrap();

    assert_eq!(table, "orders_table");
    assert_eq!(
        driver.table_columns("orders_table"),
        Some(vec!["host".to_string(), "msg".to_string()])
    );
    assert!(
        driver
            .statements()
            .contains(&"CREATE TABLE orders_table (host text, msg text)".to_string())
    );
}

#[tokio::test]
async fn rendered_table_names_are_sanitized_before_inserting() {
    init_test_tracing();

    let driver = FakeDriver::new();
    let mut config = test_destination_config();
    config.table = "logs-${HOST}".to_string();
    let acks = AckLog::new();

    let handle = start_destination(&config, &driver, MemoryStateStore::new()).await;
    handle.queue(acks.message("hello"));

    driver.wait_until(|db| db.committed.len() == 1).await;
    handle.shutdown_and_wait().await.unwrap();

    assert!(driver.table_columns("logs_web_1").is_some());
    assert_eq!(
        driver.committed(),
        vec!["INSERT INTO logs_web_1 (host, msg) VALUES ('web-1', 'hello')".to_string()]
    );
}

#[tokio::test]
async fn dont_create_tables_skips_schema_checks() {
    init_test_tracing();

    let driver = FakeDriver::new();
    let mut config = test_destination_config();
    config.flags.push(DestinationFlag::DontCreateTables);
    let mut session = connected_session(&config, &driver).await;

    let table = session.validate_table("my table").await.unwrap();

    assert_eq!(table, "my_table");
    assert!(driver.statements().is_empty());
}

#[tokio::test]
async fn index_failures_do_not_fail_validation() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.fail_statements("CREATE INDEX", 1);

    let mut config = test_destination_config();
    config.indexes = vec!["host".to_string(), "msg".to_string()];
    let mut session = connected_session(&config, &driver).await;

    session.validate_table("messages").await.unwrap();

    assert_eq!(driver.count_statements("CREATE INDEX"), 2);
    assert!(session.is_table_validated("messages"));
}

#[tokio::test]
async fn failed_index_is_reported_to_the_caller() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.create_table("messages", &["host", "msg"]);
    driver.fail_statements("CREATE INDEX", 1);
    let mut session = connected_session(&test_destination_config(), &driver).await;

    let err = session.create_index("messages", "host").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaError);
    assert_eq!(err.detail(), Some("messages_host_idx"));
    session.create_index("messages", "host").await.unwrap();
}

#[tokio::test]
async fn failed_alter_fails_validation() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.create_table("messages", &["host"]);
    driver.fail_statements("ALTER TABLE", 1);
    let mut session = connected_session(&test_destination_config(), &driver).await;

    let err = session.validate_table("messages").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaError);
    assert!(!session.is_table_validated("messages"));
}

#[tokio::test]
async fn failed_create_fails_validation() {
    init_test_tracing();

    let driver = FakeDriver::new();
    driver.fail_statements("CREATE TABLE", 1);
    let mut session = connected_session(&test_destination_config(), &driver).await;

    let err = session.validate_table("messages").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaError);
    assert!(!session.is_table_validated("messages"));
    assert_eq!(driver.table_columns("messages"), None);
}
