use tracing::{error, info, warn};

use crate::client::{Dialect, SqlDriver};
use crate::destination::{SqlSession, sanitize_identifier};
use crate::error::{ErrorKind, SinkResult};
use crate::queue::DeliveryQueue;
use crate::sink_error;

/// Room left for the `_` separator and the `_idx` suffix of an index name.
const INDEX_NAME_OVERHEAD: usize = 5;

/// Returns the name of the index on `table.column`.
///
/// Names that would exceed the identifier limit of the dialect are replaced by a hash of
/// `table_column`. `None` means such a name is needed but hashing is not available.
pub fn index_name(dialect: Dialect, table: &str, column: &str) -> Option<String> {
    match dialect.max_identifier_length() {
        Some(max_length) if table.len() + column.len() > max_length - INDEX_NAME_OVERHEAD => {
            hashed_index_name(table, column, max_length)
        }
        _ => Some(format!("{table}_{column}_idx")),
    }
}

#[cfg(feature = "index-name-hashing")]
fn hashed_index_name(table: &str, column: &str, max_length: usize) -> Option<String> {
    use sha2::{Digest, Sha256};

    let digest = Sha256::digest(format!("{table}_{column}").as_bytes());
    let mut name: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
    name.truncate(max_length);
    // Hex digests may start with a digit, which is not a valid identifier start.
    name.replace_range(..1, "i");

    Some(name)
}

#[cfg(not(feature = "index-name-hashing"))]
fn hashed_index_name(_table: &str, _column: &str, _max_length: usize) -> Option<String> {
    None
}

impl<D, Q> SqlSession<D, Q>
where
    D: SqlDriver,
    Q: DeliveryQueue,
{
    /// Makes sure `table` exists with every configured column.
    ///
    /// Returns the sanitized table name. Missing tables are created and missing columns added,
    /// together with their indexes. A table is checked once per connection.
    pub async fn validate_table(&mut self, table: &str) -> SinkResult<String> {
        let table = sanitize_identifier(table);

        if self.options.dont_create_tables || self.validated_tables.contains(&table) {
            return Ok(table);
        }

        if let Err(err) = self.begin_new().await {
            error!(
                error = %err,
                table = %table,
                "starting new transaction for querying table failed"
            );
            return Err(err);
        }

        let probe = format!("SELECT * FROM {table} WHERE 0=1");
        match self.probe_columns(&probe).await {
            Ok(columns) => self.add_missing_columns(&table, &columns).await?,
            Err(_) => self.create_table(&table).await?,
        }

        // Inserts autocommit without batching, so nothing may stay open after the DDL.
        if !self.batching_enabled() && self.transaction.active {
            self.transaction.active = false;
            self.run_query("COMMIT").await.map_err(|err| {
                sink_error!(
                    ErrorKind::SchemaError,
                    "Committing schema changes failed",
                    table,
                    source: err
                )
            })?;
        }

        self.validated_tables.insert(table.clone());

        Ok(table)
    }

    async fn add_missing_columns(&mut self, table: &str, columns: &[String]) -> SinkResult<()> {
        let options = self.options.clone();
        let mut transaction_started = false;

        for field in &options.fields {
            if columns
                .iter()
                .any(|column| column.eq_ignore_ascii_case(&field.name))
            {
                continue;
            }

            if !transaction_started {
                if let Err(err) = self.begin_new().await {
                    error!(
                        error = %err,
                        table,
                        "starting new transaction for modifying table failed"
                    );
                    return Err(err);
                }
                transaction_started = true;
            }

            let alter = format!("ALTER TABLE {table} ADD {} {}", field.name, field.sql_type);
            if let Err(err) = self.run_query(&alter).await {
                error!(
                    error = %err,
                    table,
                    column = %field.name,
                    "error adding missing column, giving up"
                );
                return Err(sink_error!(
                    ErrorKind::SchemaError,
                    "Adding missing column failed",
                    format!("{table}.{}", field.name),
                    source: err
                ));
            }
            info!(table, column = %field.name, "added missing column");

            if options.is_index_column(&field.name) {
                if let Err(err) = self.create_index(table, &field.name).await {
                    warn!(error = %err, table, column = %field.name, "error adding missing index");
                }
            }
        }

        Ok(())
    }

    async fn create_table(&mut self, table: &str) -> SinkResult<()> {
        if let Err(err) = self.begin_new().await {
            error!(
                error = %err,
                table,
                "starting new transaction for table creation failed"
            );
            return Err(err);
        }

        let options = self.options.clone();
        let columns = options
            .fields
            .iter()
            .map(|field| format!("{} {}", field.name, field.sql_type))
            .collect::<Vec<_>>()
            .join(", ");

        let create = format!("CREATE TABLE {table} ({columns})");
        if let Err(err) = self.run_query(&create).await {
            error!(error = %err, table, "error creating table, giving up");
            return Err(sink_error!(
                ErrorKind::SchemaError,
                "Table creation failed",
                table,
                source: err
            ));
        }
        info!(table, "created table");

        // Index failures leave the table usable.
        for column in &options.indexes {
            if let Err(err) = self.create_index(table, column).await {
                warn!(error = %err, table, column = %column, "error adding missing index");
            }
        }

        Ok(())
    }

    /// Creates the index on `table.column`.
    pub async fn create_index(&mut self, table: &str, column: &str) -> SinkResult<()> {
        let Some(index) = index_name(self.options.dialect, table, column) else {
            warn!(
                table,
                column, "index name too long and index name hashing is disabled, skipping index"
            );
            return Ok(());
        };

        let create = format!("CREATE INDEX {index} ON {table} ({column})");
        self.run_query(&create).await.map_err(|err| {
            sink_error!(
                ErrorKind::SchemaError,
                "Index creation failed",
                index,
                source: err
            )
        })
    }
}
