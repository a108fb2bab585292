use crate::bail;
use crate::client::{SqlConnection, SqlDriver};
use crate::destination::{DestinationOptions, FieldValue, SqlSession};
use crate::error::{ErrorKind, SinkResult};
use crate::queue::DeliveryQueue;
use crate::template::TimeZoneRole;
use crate::types::LogMessage;

/// Builds the INSERT statement of `message` into `table`.
///
/// Values equal to the configured null value become `NULL`, others are quoted with `quote`.
/// Values that cannot be quoted are written as empty strings. Columns filled by the database
/// default are left out.
pub fn build_insert_statement<F>(
    options: &DestinationOptions,
    quote: F,
    table: &str,
    message: &LogMessage,
    seq_num: i32,
) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut columns = Vec::with_capacity(options.fields.len());
    let mut values = Vec::with_capacity(options.fields.len());

    for field in &options.fields {
        let FieldValue::Template(template) = &field.value else {
            continue;
        };

        let value = template.render(
            message,
            &options.template_options,
            TimeZoneRole::Send,
            seq_num,
        );
        let value = if options.null_value.as_deref() == Some(value.as_str()) {
            "NULL".to_string()
        } else {
            quote(&value).unwrap_or_else(|| "''".to_string())
        };

        columns.push(field.name.as_str());
        values.push(value);
    }

    format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        values.join(", ")
    )
}

impl<D, Q> SqlSession<D, Q>
where
    D: SqlDriver,
    Q: DeliveryQueue,
{
    /// Builds the INSERT statement of `message`, quoting values with the open connection.
    pub fn build_insert(
        &self,
        table: &str,
        message: &LogMessage,
        seq_num: i32,
    ) -> SinkResult<String> {
        let Some(connection) = self.connection.as_ref() else {
            bail!(ErrorKind::ConnectionFailed, "No open database connection");
        };

        Ok(build_insert_statement(
            &self.options,
            |value| connection.quote_string(value),
            table,
            message,
            seq_num,
        ))
    }

    /// Returns a message whose insert failed to the head of the queue.
    pub fn requeue_message(&self, message: LogMessage) {
        if self.options.explicit_commits {
            self.queue.rewind_backlog(1);
        } else {
            self.queue.push_front(message);
        }
    }
}
