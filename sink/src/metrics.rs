//! Metric names and labels exported by the sink.

/// Label carrying the destination's stats instance, `type,host,port,database,table`.
pub const DESTINATION_LABEL: &str = "destination";

/// Counter of messages accepted from producers.
pub const SQL_SINK_QUEUED_MESSAGES_TOTAL: &str = "sql_sink_queued_messages_total";

/// Counter of messages written to the database.
pub const SQL_SINK_STORED_MESSAGES_TOTAL: &str = "sql_sink_stored_messages_total";

/// Counter of messages dropped after exhausting their retries.
pub const SQL_SINK_DROPPED_MESSAGES_TOTAL: &str = "sql_sink_dropped_messages_total";

/// Counter of times the worker suspended after a failure.
pub const SQL_SINK_SUSPENSIONS_TOTAL: &str = "sql_sink_suspensions_total";
