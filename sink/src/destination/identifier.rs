use crate::bail;
use crate::error::{ErrorKind, SinkResult};

fn is_identifier_char(index: usize, c: char) -> bool {
    c == '.' || c == '_' || c.is_ascii_alphabetic() || (index > 0 && c.is_ascii_digit())
}

/// Returns `true` when `name` only consists of letters, digits, `.` and `_`, and does not start
/// with a digit.
pub fn is_valid_identifier(name: &str) -> bool {
    name.chars()
        .enumerate()
        .all(|(index, c)| is_identifier_char(index, c))
}

/// Replaces every character that is not allowed in an identifier with `_`.
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .enumerate()
        .map(|(index, c)| if is_identifier_char(index, c) { c } else { '_' })
        .collect()
}

/// Fails with [`ErrorKind::InvalidIdentifier`] unless `name` is a valid identifier.
pub fn check_identifier(name: &str) -> SinkResult<()> {
    if name.is_empty() || !is_valid_identifier(name) {
        bail!(
            ErrorKind::InvalidIdentifier,
            "Column name is not a valid SQL identifier",
            name
        );
    }

    Ok(())
}
