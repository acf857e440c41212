//! Input rules for user-supplied board, column and task text.

use thiserror::Error;

pub const MAX_NAME_LEN: usize = 120;
pub const MAX_DESCRIPTION_LEN: usize = 4000;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be at most {max} characters (got {len})")]
    TooLong {
        field: &'static str,
        max: usize,
        len: usize,
    },

    #[error("Invalid email address: '{0}'")]
    InvalidEmail(String),
}

/// Trim and check a board name, column name or task title.
///
/// ```
/// use db::validation::validate_name;
///
/// assert_eq!(validate_name("title", "  Ship it ").unwrap(), "Ship it");
/// assert!(validate_name("title", "   ").is_err());
/// ```
pub fn validate_name(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    let len = trimmed.chars().count();
    if len > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_NAME_LEN,
            len,
        });
    }
    Ok(trimmed.to_string())
}

/// Trim an optional description. Blank descriptions become `None`.
pub fn validate_description(value: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(trimmed) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let len = trimmed.chars().count();
    if len > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::TooLong {
            field: "description",
            max: MAX_DESCRIPTION_LEN,
            len,
        });
    }
    Ok(Some(trimmed.to_string()))
}

/// Only a shape check: one `@` with something on both sides.
pub fn validate_email(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(trimmed.to_string())
        }
        _ => Err(ValidationError::InvalidEmail(trimmed.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_trimmed() {
        assert_eq!(validate_name("name", "  Backlog\n").unwrap(), "Backlog");
    }

    #[test]
    fn blank_name_is_rejected() {
        assert_eq!(
            validate_name("name", " \t "),
            Err(ValidationError::Empty { field: "name" })
        );
    }

    #[test]
    fn name_length_counts_characters_not_bytes() {
        let exactly = "é".repeat(MAX_NAME_LEN);
        assert!(validate_name("name", &exactly).is_ok());

        let over = "a".repeat(MAX_NAME_LEN + 1);
        let err = validate_name("title", &over).unwrap_err();
        assert_eq!(
            err,
            ValidationError::TooLong {
                field: "title",
                max: MAX_NAME_LEN,
                len: MAX_NAME_LEN + 1
            }
        );
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn blank_description_becomes_none() {
        assert_eq!(validate_description(None).unwrap(), None);
        assert_eq!(validate_description(Some("   ")).unwrap(), None);
        assert_eq!(
            validate_description(Some(" notes ")).unwrap(),
            Some("notes".to_string())
        );
    }

    #[test]
    fn long_description_is_rejected() {
        let long = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        assert!(validate_description(Some(&long)).is_err());
    }

    #[test]
    fn email_shape() {
        assert_eq!(validate_email(" ada@example.com ").unwrap(), "ada@example.com");
        assert!(validate_email("ada").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ada@").is_err());
        assert!(validate_email("a@b@c").is_err());
    }
}
