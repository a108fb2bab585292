//! Shorthands for building [`crate::error::SinkError`] values at the failure site.

/// Builds a [`crate::error::SinkError`].
///
/// Takes the kind and the static description, then optionally any displayable detail and a
/// `source: err` to chain.
///
/// ```ignore
/// sink_error!(ErrorKind::SchemaError, "Table creation failed", table, source: err)
/// ```
#[macro_export]
macro_rules! sink_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::SinkError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::sink_error!($kind, $desc).with_source($source)
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::SinkError::from((
            $kind,
            $desc,
            ::std::string::ToString::to_string(&$detail),
        ))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        $crate::sink_error!($kind, $desc, $detail).with_source($source)
    };
}

/// Returns early with the error [`sink_error!`] builds from the same arguments.
#[macro_export]
macro_rules! bail {
    ($($args:tt)+) => {
        return ::core::result::Result::Err($crate::sink_error!($($args)+))
    };
}
