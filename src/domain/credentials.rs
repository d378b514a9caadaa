//! Credential rules for local accounts.
//!
//! Every check reports the first violated rule so the client can point the
//! user at a single field.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::config::{
    MAX_USERNAME_LENGTH, MIN_PASSWORD_LENGTH, MIN_USERNAME_LENGTH, PASSWORD_SYMBOLS,
};

static USERNAME_CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid username regex"));

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// A violated credential rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("Username must be between 3 and 20 characters")]
    UsernameLength,
    #[error("Username may only contain letters, numbers, underscores and hyphens")]
    UsernameCharset,
    #[error("Password must be at least 8 characters")]
    PasswordTooShort,
    #[error("Password must contain at least one uppercase letter")]
    PasswordMissingUppercase,
    #[error("Password must contain at least one lowercase letter")]
    PasswordMissingLowercase,
    #[error("Password must contain at least one number")]
    PasswordMissingDigit,
    #[error("Password must contain at least one special character")]
    PasswordMissingSymbol,
    #[error("First name is required")]
    FirstNameRequired,
    #[error("Last name is required")]
    LastNameRequired,
    #[error("Invalid email format")]
    InvalidEmail,
}

impl CredentialError {
    /// Name of the request field the rule applies to.
    pub fn field(&self) -> &'static str {
        match self {
            CredentialError::UsernameLength | CredentialError::UsernameCharset => "username",
            CredentialError::PasswordTooShort
            | CredentialError::PasswordMissingUppercase
            | CredentialError::PasswordMissingLowercase
            | CredentialError::PasswordMissingDigit
            | CredentialError::PasswordMissingSymbol => "password",
            CredentialError::FirstNameRequired => "firstName",
            CredentialError::LastNameRequired => "lastName",
            CredentialError::InvalidEmail => "email",
        }
    }
}

/// Lower-case form used for storage and lookups.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Trimmed, lower-cased email.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_username(username: &str) -> Result<(), CredentialError> {
    let length = username.chars().count();
    if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&length) {
        return Err(CredentialError::UsernameLength);
    }
    if !USERNAME_CHARSET.is_match(username) {
        return Err(CredentialError::UsernameCharset);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), CredentialError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CredentialError::PasswordTooShort);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(CredentialError::PasswordMissingUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(CredentialError::PasswordMissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(CredentialError::PasswordMissingDigit);
    }
    if !password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
        return Err(CredentialError::PasswordMissingSymbol);
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), CredentialError> {
    if EMAIL_PATTERN.is_match(email) {
        Ok(())
    } else {
        Err(CredentialError::InvalidEmail)
    }
}

pub fn validate_name(value: &str, missing: CredentialError) -> Result<(), CredentialError> {
    if value.trim().is_empty() {
        Err(missing)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_rules_report_first_violation() {
        assert_eq!(
            validate_password("short1!"),
            Err(CredentialError::PasswordTooShort)
        );
        assert_eq!(
            validate_password("alllowercase1!"),
            Err(CredentialError::PasswordMissingUppercase)
        );
        assert_eq!(
            validate_password("ALLUPPER1!"),
            Err(CredentialError::PasswordMissingLowercase)
        );
        assert_eq!(
            validate_password("NoDigits!"),
            Err(CredentialError::PasswordMissingDigit)
        );
        assert_eq!(
            validate_password("NoSymbol1"),
            Err(CredentialError::PasswordMissingSymbol)
        );
        assert_eq!(validate_password("Valid123!"), Ok(()));
    }

    #[test]
    fn test_username_rules() {
        assert_eq!(validate_username("al"), Err(CredentialError::UsernameLength));
        assert_eq!(
            validate_username("a".repeat(21).as_str()),
            Err(CredentialError::UsernameLength)
        );
        assert_eq!(
            validate_username("alice smith"),
            Err(CredentialError::UsernameCharset)
        );
        assert_eq!(
            validate_username("alice.w"),
            Err(CredentialError::UsernameCharset)
        );
        assert_eq!(validate_username("alice_W-01"), Ok(()));
        assert_eq!(validate_username("abc"), Ok(()));
    }

    #[test]
    fn test_email_pattern() {
        assert_eq!(validate_email("alice@x.com"), Ok(()));
        assert_eq!(validate_email("alice@x"), Err(CredentialError::InvalidEmail));
        assert_eq!(validate_email("alice x@y.com"), Err(CredentialError::InvalidEmail));
        assert_eq!(validate_email("@x.com"), Err(CredentialError::InvalidEmail));
    }

    #[test]
    fn test_names_must_not_be_blank() {
        assert_eq!(
            validate_name("   ", CredentialError::FirstNameRequired),
            Err(CredentialError::FirstNameRequired)
        );
        assert_eq!(validate_name("Alice", CredentialError::FirstNameRequired), Ok(()));
    }

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_username(" Alice "), "alice");
        assert_eq!(normalize_email(" Alice@X.COM "), "alice@x.com");
    }

    #[test]
    fn test_fields() {
        assert_eq!(CredentialError::UsernameCharset.field(), "username");
        assert_eq!(CredentialError::PasswordMissingSymbol.field(), "password");
        assert_eq!(CredentialError::LastNameRequired.field(), "lastName");
    }
}
