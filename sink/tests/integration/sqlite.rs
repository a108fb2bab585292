use std::path::{Path, PathBuf};

use config::shared::{ColumnValue, DestinationFlag, SqlDestinationConfig};
use sink::client::sqlx_driver::SqlxDriver;
use sink::destination::SqlDestination;
use sink::store::StateStore;
use sink::store::file::FileStateStore;
use sink::test_utils::message::{AckLog, test_message};
use sink::types::AckType;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, SqliteConnection};
use telemetry::tracing::init_test_tracing;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("sql_sink_{name}_{}", rand::random::<u64>()))
}

fn sqlite_config(database: &str) -> SqlDestinationConfig {
    let mut config: SqlDestinationConfig = serde_json::from_value(serde_json::json!({
        "type": "sqlite3",
        "database": database,
        "table": "messages",
        "columns": ["id integer primary key autoincrement", "host", "msg", "seq int"],
        "values": ["default", "${HOST}", "${MSG}", "${SEQNUM}"],
        "indexes": ["host"],
        "flush_lines": 2,
    }))
    .unwrap();
    config.flags.push(DestinationFlag::ExplicitCommits);

    config
}

async fn read_rows(database: &Path) -> Vec<(String, String, i64)> {
    let mut connection: SqliteConnection = SqliteConnectOptions::new()
        .filename(database)
        .connect()
        .await
        .unwrap();

    sqlx::query_as("SELECT host, msg, seq FROM messages ORDER BY id")
        .fetch_all(&mut connection)
        .await
        .unwrap()
}

#[tokio::test]
async fn writes_batches_into_a_sqlite_database() {
    init_test_tracing();

    let database = temp_path("logs.db");
    let state = temp_path("state.json");
    let config = sqlite_config(&database.display().to_string());
    let acks = AckLog::new();

    let store = FileStateStore::open(&state).await.unwrap();
    let destination: SqlDestination<_, _> =
        SqlDestination::from_config(&config, SqlxDriver::new(), store).unwrap();
    let handle = destination.start().await.unwrap();
    for text in ["first", "second", "third"] {
        handle.queue(acks.message(text));
    }
    handle.shutdown_and_wait().await.unwrap();

    assert_eq!(acks.count(AckType::Processed), 3);
    assert_eq!(
        read_rows(&database).await,
        vec![
            ("web-1".to_string(), "first".to_string(), 1),
            ("web-1".to_string(), "second".to_string(), 2),
            ("web-1".to_string(), "third".to_string(), 3),
        ]
    );

    // A restarted destination finds the table and continues the sequence.
    let store = FileStateStore::open(&state).await.unwrap();
    let destination: SqlDestination<_, _> =
        SqlDestination::from_config(&config, SqlxDriver::new(), store).unwrap();
    let handle = destination.start().await.unwrap();
    handle.queue(test_message("fourth"));
    handle.shutdown_and_wait().await.unwrap();

    let rows = read_rows(&database).await;
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[3], ("web-1".to_string(), "fourth".to_string(), 4));

    let store = FileStateStore::open(&state).await.unwrap();
    let sequence_key = format!(
        "sql_sequence_number(sqlite3,,,{},messages)",
        database.display()
    );
    assert_eq!(
        store.get(&sequence_key).await.unwrap().as_deref(),
        Some("5")
    );

    tokio::fs::remove_file(&database).await.unwrap();
    tokio::fs::remove_file(&state).await.unwrap();
}

#[tokio::test]
async fn missing_columns_are_added_to_an_existing_sqlite_table() {
    init_test_tracing();

    let database = temp_path("logs.db");
    {
        let mut connection: SqliteConnection = SqliteConnectOptions::new()
            .filename(&database)
            .create_if_missing(true)
            .connect()
            .await
            .unwrap();
        sqlx::query("CREATE TABLE messages (id integer primary key autoincrement, host text)")
            .execute(&mut connection)
            .await
            .unwrap();
    }

    let mut config = sqlite_config(&database.display().to_string());
    config.values[3] = ColumnValue::Template("7".to_string());
    let store = sink::store::memory::MemoryStateStore::new();
    let destination: SqlDestination<_, _> =
        SqlDestination::from_config(&config, SqlxDriver::new(), store).unwrap();
    let handle = destination.start().await.unwrap();
    handle.queue(test_message("after alter"));
    handle.shutdown_and_wait().await.unwrap();

    assert_eq!(
        read_rows(&database).await,
        vec![("web-1".to_string(), "after alter".to_string(), 7)]
    );

    tokio::fs::remove_file(&database).await.unwrap();
}
