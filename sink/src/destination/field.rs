use config::shared::ColumnValue;

use crate::destination::check_identifier;
use crate::error::SinkResult;
use crate::template::Template;

/// Column type used when a column spec names no type.
pub const DEFAULT_COLUMN_TYPE: &str = "text";

/// Where the value of a column comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Template(Template),
    /// Left out of INSERT statements so the database fills in its default.
    Default,
}

/// One target column of a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub sql_type: String,
    pub value: FieldValue,
}

impl Field {
    /// Builds a field from a `name` or `name type` column spec and its configured value.
    ///
    /// The name must be a valid identifier as is, it is never sanitized.
    pub fn parse(spec: &str, value: &ColumnValue) -> SinkResult<Self> {
        let (name, sql_type) = match spec.split_once(' ') {
            Some((name, sql_type)) => (name, sql_type.trim()),
            None => (spec, ""),
        };
        check_identifier(name)?;

        let sql_type = if sql_type.is_empty() {
            DEFAULT_COLUMN_TYPE
        } else {
            sql_type
        };

        let value = match value {
            ColumnValue::Template(source) => FieldValue::Template(Template::compile(source)?),
            ColumnValue::Default => FieldValue::Default,
        };

        Ok(Self {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            value,
        })
    }

    pub fn is_default(&self) -> bool {
        matches!(self.value, FieldValue::Default)
    }
}
