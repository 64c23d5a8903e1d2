use once_cell::sync::Lazy;
use regex::Regex;

use super::EngineError;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new("^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern should compile")
});

/// Rejects anything but a plain SQL identifier.
///
/// Table, column, index and command names are spliced into SQL text, so
/// they must never carry quoting or whitespace.
pub(crate) fn check(name: &str) -> Result<&str, EngineError> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(EngineError::InvalidIdentifier(name.to_string()))
    }
}

pub(crate) fn check_all<'a, I>(names: I) -> Result<(), EngineError>
where
    I: IntoIterator<Item = &'a str>,
{
    names.into_iter().try_for_each(|name| check(name).map(drop))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        for name in ["MainTable", "_x", "Score2", "updateRow", "IsFilteredOut"] {
            assert!(check(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_everything_else() {
        for name in ["", "2abc", "a b", "a;DROP TABLE t", "\"q\"", "a-b", "é"] {
            assert!(
                matches!(check(name), Err(EngineError::InvalidIdentifier(_))),
                "{name}"
            );
        }
        assert!(check_all(["Ok", "not ok"]).is_err());
    }
}
