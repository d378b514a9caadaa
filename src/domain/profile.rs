//! Identity asserted by an external provider.

use serde::{Deserialize, Serialize};

use super::credentials::normalize_email;

/// Profile returned by an external identity provider after a successful
/// sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalProfile {
    /// Provider subject identifier, stable across logins
    pub external_id: String,
    /// Normalized email
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl ExternalProfile {
    pub fn new(
        external_id: impl Into<String>,
        email: &str,
        display_name: impl Into<String>,
        avatar_url: Option<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            email: normalize_email(email),
            display_name: display_name.into(),
            avatar_url: avatar_url.filter(|url| !url.is_empty()),
        }
    }

    pub fn name(&self) -> DisplayName {
        DisplayName::split(&self.display_name)
    }
}

/// Display name broken into the stored name fields.
///
/// Split on the first space: the text before it is the first name and the
/// remainder, verbatim, is the last name, which may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayName {
    pub full: String,
    pub first: String,
    pub last: String,
}

impl DisplayName {
    pub fn split(display_name: &str) -> Self {
        let (first, last) = display_name.split_once(' ').unwrap_or((display_name, ""));

        Self {
            full: display_name.to_string(),
            first: first.to_string(),
            last: last.to_string(),
        }
    }
}

/// A verified statement that the caller controls an external identity.
///
/// Only produced by verifying a link token minted at a successful provider
/// callback; never built from client-supplied fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalAssertion {
    pub external_id: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_two_tokens() {
        let name = DisplayName::split("Alice Wonderland");
        assert_eq!(name.first, "Alice");
        assert_eq!(name.last, "Wonderland");
        assert_eq!(name.full, "Alice Wonderland");
    }

    #[test]
    fn test_split_keeps_remainder_as_last_name() {
        let name = DisplayName::split("Mary Ann Smith");
        assert_eq!(name.first, "Mary");
        assert_eq!(name.last, "Ann Smith");
    }

    #[test]
    fn test_split_keeps_repeated_spaces_in_remainder() {
        let name = DisplayName::split("Jean  Luc Picard");
        assert_eq!(name.first, "Jean");
        assert_eq!(name.last, " Luc Picard");
        assert_eq!(name.full, "Jean  Luc Picard");
    }

    #[test]
    fn test_split_single_token_has_empty_last_name() {
        let name = DisplayName::split("Cher");
        assert_eq!(name.first, "Cher");
        assert_eq!(name.last, "");
    }

    #[test]
    fn test_profile_normalizes_email_and_drops_empty_avatar() {
        let profile = ExternalProfile::new("g-1", " Alice@X.com", "Alice", Some(String::new()));
        assert_eq!(profile.email, "alice@x.com");
        assert_eq!(profile.avatar_url, None);
    }
}
