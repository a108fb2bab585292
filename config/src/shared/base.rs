use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A field holds a value outside of its allowed range or format.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// `columns` and `values` must describe the same number of fields.
    #[error("`columns` has {columns} entries but `values` has {values}")]
    ColumnValueCountMismatch { columns: usize, values: usize },
    /// No columns were configured.
    #[error("at least one column must be configured")]
    NoColumns,
}
