use thiserror::Error;

/// Rejection of a tool call's arguments before anything is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    Missing(&'static str),
    #[error("field '{name}' must be {expected}")]
    WrongType {
        name: &'static str,
        expected: &'static str,
    },
    #[error("field '{name}' exceeds {max} characters")]
    TooLong { name: &'static str, max: usize },
    #[error("field '{name}' must be between {min} and {max}")]
    OutOfRange {
        name: &'static str,
        min: i64,
        max: i64,
    },
    #[error("field '{name}' must be one of: {}", allowed.join(", "))]
    NotAllowed {
        name: &'static str,
        allowed: &'static [&'static str],
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_displays_missing_field() {
        let e = ValidationError::Missing("text");
        assert_eq!(e.to_string(), "missing required field: text");
    }

    #[test]
    fn it_lists_allowed_values() {
        let e = ValidationError::NotAllowed {
            name: "product",
            allowed: &["Top", "Latest"],
        };
        assert_eq!(e.to_string(), "field 'product' must be one of: Top, Latest");
    }
}
