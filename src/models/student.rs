use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static USN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9]+$").unwrap());

/// A participant of the 50-days session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub usn: String,
    pub current_streak: i32,
    pub highest_streak: i32,
}

/// Validated input for inserting a student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    pub name: String,
    pub usn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StudentInputError {
    #[error("Name and USN required")]
    Missing,
    #[error("USN must be alphanumeric")]
    InvalidUsn,
}

impl NewStudent {
    /// Trim the name, trim and upper-case the USN, then validate both.
    pub fn parse(name: Option<&str>, usn: Option<&str>) -> Result<Self, StudentInputError> {
        let name = name.unwrap_or_default().trim();
        let usn = usn.unwrap_or_default().trim().to_uppercase();

        if name.is_empty() || usn.is_empty() {
            return Err(StudentInputError::Missing);
        }
        if !USN_PATTERN.is_match(&usn) {
            return Err(StudentInputError::InvalidUsn);
        }

        Ok(Self {
            name: name.to_string(),
            usn,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usn_is_normalized() {
        let s = NewStudent::parse(Some("  Asha Rao "), Some(" 1at23cs001 ")).unwrap();
        assert_eq!(s.name, "Asha Rao");
        assert_eq!(s.usn, "1AT23CS001");
    }

    #[test]
    fn test_usn_with_separator_rejected() {
        assert_eq!(
            NewStudent::parse(Some("Asha"), Some("1AT-23CS001")),
            Err(StudentInputError::InvalidUsn)
        );
        assert_eq!(
            NewStudent::parse(Some("Asha"), Some("1AT 23CS001")),
            Err(StudentInputError::InvalidUsn)
        );
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(NewStudent::parse(None, Some("1AT23CS001")), Err(StudentInputError::Missing));
        assert_eq!(NewStudent::parse(Some("   "), Some("1AT23CS001")), Err(StudentInputError::Missing));
        assert_eq!(NewStudent::parse(Some("Asha"), Some("  ")), Err(StudentInputError::Missing));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(StudentInputError::Missing.to_string(), "Name and USN required");
        assert_eq!(StudentInputError::InvalidUsn.to_string(), "USN must be alphanumeric");
    }
}
