// crates/fintrack-core/src/validation.rs
// ============================================================================
// Module: Fintrack Input Validation
// Description: Field-level checks applied to record inputs before any write.
// Purpose: Reject malformed amounts, dates, and text at the domain boundary.
// Dependencies: thiserror, time
// ============================================================================

//! ## Overview
//! Validation runs before a [`crate::Mutation`] is built, so invalid input
//! never reaches the primary store and is never replayed to replicas.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::Date;
use time::macros::format_description;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum length of a name-like field (account, category, bank, ...).
pub const MAX_NAME_LENGTH: usize = 128;
/// Maximum length of a free-form note.
pub const MAX_NOTE_LENGTH: usize = 1024;
/// Maximum length of a username.
pub const MAX_USERNAME_LENGTH: usize = 64;
/// Minimum length of a username.
pub const MIN_USERNAME_LENGTH: usize = 3;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Domain input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Amount is zero, negative, or not finite.
    #[error("{field} must be a positive finite amount")]
    Amount {
        /// Offending field.
        field: &'static str,
    },
    /// Number is NaN or infinite.
    #[error("{field} must be a finite number")]
    NotFinite {
        /// Offending field.
        field: &'static str,
    },
    /// Number is negative where only zero or more is allowed.
    #[error("{field} must not be negative")]
    Negative {
        /// Offending field.
        field: &'static str,
    },
    /// Date is not a valid `YYYY-MM-DD` calendar date.
    #[error("{field} must be a YYYY-MM-DD date, got '{value}'")]
    Date {
        /// Offending field.
        field: &'static str,
        /// Rejected input.
        value: String,
    },
    /// Required text is empty.
    #[error("{field} must not be empty")]
    Empty {
        /// Offending field.
        field: &'static str,
    },
    /// Text exceeds its length limit.
    #[error("{field} exceeds {max} characters")]
    TooLong {
        /// Offending field.
        field: &'static str,
        /// Maximum allowed characters.
        max: usize,
    },
    /// Value falls outside its allowed range.
    #[error("{field} is out of range: {detail}")]
    OutOfRange {
        /// Offending field.
        field: &'static str,
        /// Range description.
        detail: String,
    },
    /// Enumerated text value is not recognized.
    #[error("unknown {field} value: '{value}'")]
    UnknownVariant {
        /// Offending field.
        field: &'static str,
        /// Rejected input.
        value: String,
    },
}

// ============================================================================
// SECTION: Checks
// ============================================================================

/// Requires a finite, strictly positive amount.
///
/// # Errors
///
/// Returns [`ValidationError::Amount`] otherwise.
pub fn positive_amount(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::Amount {
            field,
        })
    }
}

/// Requires a finite number (any sign).
///
/// # Errors
///
/// Returns [`ValidationError::NotFinite`] for NaN or infinities.
pub fn finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NotFinite {
            field,
        })
    }
}

/// Requires a finite number that is zero or more.
///
/// # Errors
///
/// Returns [`ValidationError`] for non-finite or negative values.
pub fn non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::Negative {
            field,
        });
    }
    Ok(())
}

/// Parses a `YYYY-MM-DD` calendar date.
///
/// # Errors
///
/// Returns [`ValidationError::Date`] when the text is not a real date.
pub fn parse_date(field: &'static str, value: &str) -> Result<Date, ValidationError> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(value, &format).map_err(|_| ValidationError::Date {
        field,
        value: value.to_string(),
    })
}

/// Requires non-blank text within `max` characters.
///
/// # Errors
///
/// Returns [`ValidationError`] for blank or overlong text.
pub fn required_text(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty {
            field,
        });
    }
    bounded_text(field, value, max)
}

/// Requires text within `max` characters; empty is allowed.
///
/// # Errors
///
/// Returns [`ValidationError::TooLong`] for overlong text.
pub fn bounded_text(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field,
            max,
        });
    }
    Ok(())
}

/// Validates a username: ASCII letters, digits, `.`, `_`, `-`.
///
/// # Errors
///
/// Returns [`ValidationError`] when the username is malformed.
pub fn username(value: &str) -> Result<(), ValidationError> {
    let length = value.chars().count();
    if length < MIN_USERNAME_LENGTH || length > MAX_USERNAME_LENGTH {
        return Err(ValidationError::OutOfRange {
            field: "username",
            detail: format!("length must be {MIN_USERNAME_LENGTH}..={MAX_USERNAME_LENGTH}"),
        });
    }
    if !value.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-')) {
        return Err(ValidationError::OutOfRange {
            field: "username",
            detail: "only letters, digits, '.', '_' and '-' are allowed".to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
