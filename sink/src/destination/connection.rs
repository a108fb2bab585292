use tracing::{error, info};

use crate::client::{SqlConnection, SqlDriver};
use crate::destination::SqlSession;
use crate::error::SinkResult;
use crate::queue::DeliveryQueue;

impl<D, Q> SqlSession<D, Q>
where
    D: SqlDriver,
    Q: DeliveryQueue,
{
    /// Opens the connection unless one is already open, then runs the session statements.
    ///
    /// On failure no connection is kept.
    pub async fn ensure_connection(&mut self) -> SinkResult<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        let connect_options = &self.options.connect_options;
        let mut connection = match self.driver.connect(connect_options).await {
            Ok(connection) => connection,
            Err(err) => {
                error!(
                    error = %err,
                    driver_type = %connect_options.driver_type,
                    host = %connect_options.host,
                    database = %connect_options.database,
                    "error establishing sql connection"
                );
                return Err(err);
            }
        };

        for statement in &self.options.session_statements {
            if let Err(err) = connection.execute(statement).await {
                error!(
                    error = %err,
                    statement = %statement,
                    "error executing sql connection statement"
                );
                connection.close().await;
                return Err(err);
            }
        }

        info!(
            driver_type = %connect_options.driver_type,
            host = %connect_options.host,
            database = %connect_options.database,
            "sql connection established"
        );
        self.connection = Some(connection);

        Ok(())
    }

    /// Closes the connection and forgets everything tied to it.
    ///
    /// The validated-table cache is cleared and an open transaction ends. Rows of an uncommitted
    /// batch return to the queue since the server discards them.
    pub async fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close().await;
            info!("sql connection closed");
        }

        self.validated_tables.clear();

        if self.transaction.active || self.batched_rows() > 0 {
            self.rewind_backlog();
        }
        self.transaction.active = false;
        self.transaction.reset_batch();
    }
}
