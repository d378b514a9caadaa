//! User domain entity and related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::profile::{DisplayName, ExternalProfile};

/// How a user can currently sign in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IdentityState {
    /// Username and password only
    LocalOnly,
    /// External provider only
    ExternalOnly,
    /// Both sign-in methods bound to the same row
    Linked,
}

/// User domain entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub external_id: Option<String>,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub email: String,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// New user created from a first external-provider login.
    pub fn from_profile(profile: &ExternalProfile) -> Self {
        let now = Utc::now();
        let name = profile.name();
        Self {
            id: Uuid::new_v4(),
            external_id: Some(profile.external_id.clone()),
            username: None,
            password_hash: None,
            email: profile.email.clone(),
            name: name.full,
            first_name: name.first,
            last_name: name.last,
            avatar: profile.avatar_url.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// New local-only user.
    pub fn local(
        username: String,
        password_hash: String,
        first_name: String,
        last_name: String,
        email: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            external_id: None,
            username: Some(username),
            password_hash: Some(password_hash),
            email,
            name: format!("{} {}", first_name, last_name),
            first_name,
            last_name,
            avatar: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn identity_state(&self) -> IdentityState {
        match (self.external_id.is_some(), self.has_local_credential()) {
            (true, true) => IdentityState::Linked,
            (true, false) => IdentityState::ExternalOnly,
            _ => IdentityState::LocalOnly,
        }
    }

    /// Check whether a username/password pair is bound to this user
    pub fn has_local_credential(&self) -> bool {
        self.password_hash.is_some() && self.username.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Refresh name, email and avatar from a provider profile.
    ///
    /// Never touches `external_id`. The avatar is only replaced when the
    /// provider supplied one.
    pub fn refresh_from_profile(&mut self, profile: &ExternalProfile) {
        self.apply_name(profile.name());
        self.email = profile.email.clone();
        if let Some(avatar) = &profile.avatar_url {
            self.avatar = Some(avatar.clone());
        }
        self.touch();
    }

    /// Bind an external identity to a local-only row.
    ///
    /// The provider's display name replaces locally entered names. Email is
    /// left as is since it already matches.
    pub fn link_external(&mut self, profile: &ExternalProfile) {
        self.external_id = Some(profile.external_id.clone());
        self.apply_name(profile.name());
        if let Some(avatar) = &profile.avatar_url {
            self.avatar = Some(avatar.clone());
        }
        self.touch();
    }

    /// Attach a local credential to an externally created row.
    ///
    /// Names already supplied by the provider win over the form values.
    pub fn attach_local_credential(
        &mut self,
        username: String,
        password_hash: String,
        first_name: &str,
        last_name: &str,
    ) {
        self.username = Some(username);
        self.password_hash = Some(password_hash);
        if self.first_name.is_empty() {
            self.first_name = first_name.to_string();
        }
        if self.last_name.is_empty() {
            self.last_name = last_name.to_string();
        }
        if self.name.is_empty() {
            self.name = format!("{} {}", self.first_name, self.last_name)
                .trim()
                .to_string();
        }
        self.touch();
    }

    fn apply_name(&mut self, name: DisplayName) {
        self.name = name.full;
        self.first_name = name.first;
        self.last_name = name.last;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// User response (safe to return to client)
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    /// Unique user identifier
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    /// Local username, if a local credential exists
    #[schema(example = "alice")]
    pub username: Option<String>,
    /// User email address
    #[schema(example = "alice@example.com")]
    pub email: String,
    /// Display name
    #[schema(example = "Alice Wonderland")]
    pub name: String,
    #[schema(example = "Alice")]
    pub first_name: String,
    #[schema(example = "Wonderland")]
    pub last_name: String,
    /// Avatar URL
    pub avatar: Option<String>,
    /// Whether a Google account is linked
    pub google_linked: bool,
    /// Sign-in methods bound to this account
    pub identity: IdentityState,
    /// Account creation timestamp
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let identity = user.identity_state();
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            name: user.name,
            first_name: user.first_name,
            last_name: user.last_name,
            avatar: user.avatar,
            google_linked: user.external_id.is_some(),
            identity,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(avatar: Option<&str>) -> ExternalProfile {
        ExternalProfile::new(
            "g-001",
            "alice@x.com",
            "Alice Wonderland",
            avatar.map(str::to_string),
        )
    }

    fn local_alice() -> User {
        User::local(
            "alice".into(),
            "hash".into(),
            "Al".into(),
            "W".into(),
            "alice@x.com".into(),
        )
    }

    #[test]
    fn test_identity_states() {
        let mut user = local_alice();
        assert_eq!(user.identity_state(), IdentityState::LocalOnly);

        user.link_external(&profile(None));
        assert_eq!(user.identity_state(), IdentityState::Linked);

        let external = User::from_profile(&profile(None));
        assert_eq!(external.identity_state(), IdentityState::ExternalOnly);
    }

    #[test]
    fn test_local_user_name_is_joined() {
        let user = local_alice();
        assert_eq!(user.name, "Al W");
        assert!(user.has_local_credential());
    }

    #[test]
    fn test_link_overwrites_names_with_provider_values() {
        let mut user = local_alice();
        user.link_external(&profile(Some("https://img/a.png")));

        assert_eq!(user.external_id.as_deref(), Some("g-001"));
        assert_eq!(user.first_name, "Alice");
        assert_eq!(user.last_name, "Wonderland");
        assert_eq!(user.name, "Alice Wonderland");
        assert_eq!(user.avatar.as_deref(), Some("https://img/a.png"));
    }

    #[test]
    fn test_refresh_keeps_avatar_when_provider_sends_none() {
        let mut user = User::from_profile(&profile(Some("https://img/a.png")));
        let before = user.updated_at;

        user.refresh_from_profile(&profile(None));

        assert_eq!(user.avatar.as_deref(), Some("https://img/a.png"));
        assert!(user.updated_at >= before);
    }

    #[test]
    fn test_refresh_never_changes_external_id() {
        let mut user = User::from_profile(&profile(None));
        let other = ExternalProfile::new("g-999", "alice@x.com", "Alice W", None);

        user.refresh_from_profile(&other);

        assert_eq!(user.external_id.as_deref(), Some("g-001"));
    }

    #[test]
    fn test_attach_local_credential_prefers_provider_names() {
        let mut user = User::from_profile(&profile(None));
        user.attach_local_credential("alice".into(), "hash".into(), "Form", "Name");

        assert_eq!(user.first_name, "Alice");
        assert_eq!(user.last_name, "Wonderland");
        assert_eq!(user.identity_state(), IdentityState::Linked);
    }

    #[test]
    fn test_attach_local_credential_fills_missing_names() {
        let single = ExternalProfile::new("g-2", "cher@x.com", "Cher", None);
        let mut user = User::from_profile(&single);
        user.attach_local_credential("cher".into(), "hash".into(), "Cherilyn", "Sarkisian");

        assert_eq!(user.first_name, "Cher");
        assert_eq!(user.last_name, "Sarkisian");
        assert_eq!(user.name, "Cher");
    }

    #[test]
    fn test_response_hides_password_hash() {
        let json = serde_json::to_value(local_alice()).unwrap();
        assert!(json.get("password_hash").is_none());

        let response = UserResponse::from(local_alice());
        assert!(!response.google_linked);
        assert_eq!(response.identity, IdentityState::LocalOnly);
    }
}
