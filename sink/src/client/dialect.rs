use std::fmt;

/// SQL phrasing differences between the supported database kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
    Oracle,
    /// Microsoft SQL Server and Sybase through FreeTDS.
    FreeTds,
    /// Any other driver type. Uses the common SQL subset.
    Generic,
}

impl Dialect {
    /// Maps a configured driver type to its dialect. Unknown types map to [`Dialect::Generic`].
    pub fn from_driver_type(driver_type: &str) -> Self {
        match driver_type.to_ascii_lowercase().as_str() {
            "mysql" => Dialect::MySql,
            "pgsql" | "postgres" | "postgresql" => Dialect::Postgres,
            "sqlite" | "sqlite3" => Dialect::Sqlite,
            "oracle" => Dialect::Oracle,
            "freetds" | "mssql" => Dialect::FreeTds,
            _ => Dialect::Generic,
        }
    }

    /// Statement opening a transaction, or `None` when transactions start implicitly.
    pub fn begin_statement(&self) -> Option<&'static str> {
        match self {
            Dialect::Oracle => None,
            Dialect::FreeTds => Some("BEGIN TRANSACTION"),
            _ => Some("BEGIN"),
        }
    }

    /// Maximum length of an identifier, when the database enforces a short one.
    pub fn max_identifier_length(&self) -> Option<usize> {
        match self {
            Dialect::Oracle => Some(30),
            _ => None,
        }
    }

    /// Whether the connection port is passed to the driver as a number rather than as text.
    pub fn port_option_is_numeric(&self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Quotes `value` as a string literal.
    ///
    /// Returns `None` for values that cannot be written as a literal, such as text containing a
    /// NUL character.
    pub fn quote_string(&self, value: &str) -> Option<String> {
        if value.contains('\0') {
            return None;
        }

        let quoted = match self {
            Dialect::Postgres => pg_escape::quote_literal(value).to_string(),
            Dialect::MySql => {
                let mut quoted = String::with_capacity(value.len() + 2);
                quoted.push('\'');
                for c in value.chars() {
                    match c {
                        '\'' => quoted.push_str("''"),
                        '\\' => quoted.push_str("\\\\"),
                        '\n' => quoted.push_str("\\n"),
                        '\r' => quoted.push_str("\\r"),
                        c => quoted.push(c),
                    }
                }
                quoted.push('\'');
                quoted
            }
            _ => format!("'{}'", value.replace('\'', "''")),
        };

        Some(quoted)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "pgsql",
            Dialect::Sqlite => "sqlite3",
            Dialect::Oracle => "oracle",
            Dialect::FreeTds => "freetds",
            Dialect::Generic => "generic",
        };

        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_driver_type_aliases() {
        assert_eq!(Dialect::from_driver_type("mssql"), Dialect::FreeTds);
        assert_eq!(Dialect::from_driver_type("PGSQL"), Dialect::Postgres);
        assert_eq!(Dialect::from_driver_type("sqlite3"), Dialect::Sqlite);
        assert_eq!(Dialect::from_driver_type("db2"), Dialect::Generic);
    }

    #[test]
    fn transaction_opening_differs_per_database() {
        assert_eq!(Dialect::MySql.begin_statement(), Some("BEGIN"));
        assert_eq!(
            Dialect::FreeTds.begin_statement(),
            Some("BEGIN TRANSACTION")
        );
        assert_eq!(Dialect::Oracle.begin_statement(), None);
    }

    #[test]
    fn quotes_literals_per_dialect() {
        assert_eq!(
            Dialect::Sqlite.quote_string("it's").as_deref(),
            Some("'it''s'")
        );
        assert_eq!(
            Dialect::MySql.quote_string(r"C:\tmp 'x'").as_deref(),
            Some(r"'C:\\tmp ''x'''")
        );
        assert_eq!(
            Dialect::Postgres.quote_string("it's").as_deref(),
            Some("'it''s'")
        );
        assert_eq!(Dialect::Postgres.quote_string("a\0b"), None);
    }
}
