//! Field-level validation for complex parameters.
//!
//! Types bound as complex parameters implement [`Validate`]. The binder
//! deserializes the JSON value, then runs `validate` and reports every
//! message for that parameter together.
//!
//! # Example
//!
//! ```
//! use kairos_core::FieldErrors;
//! use kairos_dispatch::{Validate, Validator};
//!
//! struct NewLabel {
//!     name: String,
//!     weight: i64,
//! }
//!
//! impl Validate for NewLabel {
//!     fn validate(&self) -> Result<(), FieldErrors> {
//!         let mut v = Validator::new();
//!         v.required("name", &self.name);
//!         v.length("name", &self.name, 1, 32);
//!         v.range("weight", self.weight, 0, 10);
//!         v.finish()
//!     }
//! }
//!
//! let bad = NewLabel { name: String::new(), weight: 99 };
//! let errors = bad.validate().unwrap_err();
//! assert_eq!(errors.len(), 2);
//! ```

use kairos_core::FieldErrors;
use regex::Regex;

/// Field-level validation of a deserialized value.
pub trait Validate {
    /// Validates the value, collecting every failing field.
    fn validate(&self) -> Result<(), FieldErrors>;
}

/// Accumulates field errors.
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    /// Creates a validator with no errors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires a string to contain non-whitespace characters.
    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.errors.add(field, "is required");
        }
        self
    }

    /// Requires a string's character count to lie in `min..=max`.
    ///
    /// An empty string that [`required`](Self::required) already flagged is
    /// not reported a second time.
    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize) -> &mut Self {
        let len = value.chars().count();
        if len < min {
            if len > 0 || !self.errors.fields.contains_key(field) {
                self.errors
                    .add(field, format!("must be at least {min} characters"));
            }
        } else if len > max {
            self.errors
                .add(field, format!("must be at most {max} characters"));
        }
        self
    }

    /// Applies [`length`](Self::length) when the value is present.
    pub fn optional_length(
        &mut self,
        field: &str,
        value: Option<&str>,
        min: usize,
        max: usize,
    ) -> &mut Self {
        if let Some(value) = value {
            self.length(field, value, min, max);
        }
        self
    }

    /// Requires a number to lie in `min..=max`.
    pub fn range(&mut self, field: &str, value: i64, min: i64, max: i64) -> &mut Self {
        if !(min..=max).contains(&value) {
            self.errors
                .add(field, format!("must be between {min} and {max}"));
        }
        self
    }

    /// Requires a non-empty string to match `pattern`.
    pub fn matches(&mut self, field: &str, value: &str, pattern: &Regex, message: &str) -> &mut Self {
        if !value.is_empty() && !pattern.is_match(value) {
            self.errors.add(field, message);
        }
        self
    }

    /// Records a custom failure.
    pub fn fail(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        self.errors.add(field, message);
        self
    }

    /// Returns the collected errors as a result.
    pub fn finish(&mut self) -> Result<(), FieldErrors> {
        std::mem::take(&mut self.errors).into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_rejects_blank() {
        let mut v = Validator::new();
        v.required("title", "   ");
        let errors = v.finish().unwrap_err();
        assert_eq!(errors.fields["title"], vec!["is required".to_string()]);
    }

    #[test]
    fn test_length_bounds() {
        let mut v = Validator::new();
        v.length("short", "ab", 3, 10).length("long", "abcdef", 1, 5);
        let errors = v.finish().unwrap_err();
        assert_eq!(errors.fields["short"][0], "must be at least 3 characters");
        assert_eq!(errors.fields["long"][0], "must be at most 5 characters");
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let mut v = Validator::new();
        v.length("name", "ééé", 1, 3);
        assert!(v.finish().is_ok());
    }

    #[test]
    fn test_empty_value_reported_once() {
        let mut v = Validator::new();
        v.required("title", "").length("title", "", 1, 200);
        let errors = v.finish().unwrap_err();
        assert_eq!(errors.fields["title"].len(), 1);
    }

    #[test]
    fn test_empty_value_checked_against_minimum() {
        let mut v = Validator::new();
        v.length("description", "", 1, 2000)
            .optional_length("note", Some(""), 1, 10)
            .length("tag", "", 0, 10);
        let errors = v.finish().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.fields["description"][0], "must be at least 1 characters");
        assert!(errors.fields.contains_key("note"));
    }

    #[test]
    fn test_range() {
        let mut v = Validator::new();
        v.range("priority", 0, 1, 5).range("ok", 3, 1, 5);
        let errors = v.finish().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.fields.contains_key("priority"));
    }

    #[test]
    fn test_matches() {
        let digits = Regex::new(r"^\d+$").unwrap();
        let mut v = Validator::new();
        v.matches("code", "12a", &digits, "must be numeric")
            .matches("empty", "", &digits, "must be numeric");
        let errors = v.finish().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.fields["code"][0], "must be numeric");
    }

    #[test]
    fn test_finish_resets_state() {
        let mut v = Validator::new();
        v.fail("x", "bad");
        assert!(v.finish().is_err());
        assert!(v.finish().is_ok());
    }
}
