//! Identity resolver behaviour over the in-memory unit of work.
//!
//! The in-memory store applies the same uniqueness rules as the Postgres
//! indexes, so these tests exercise the full read-then-write sequences.

use std::sync::Arc;

use estate_auth::config::JwtSettings;
use estate_auth::domain::{CredentialError, ExternalAssertion, ExternalProfile, IdentityState};
use estate_auth::errors::AppError;
use estate_auth::infra::{InMemoryPersistence, MemorySessionStore};
use estate_auth::services::{
    IdentityResolver, IdentityService, LocalRegistration, Registration, TokenIssuer, TokenService,
};

fn setup() -> (Arc<InMemoryPersistence>, IdentityResolver<InMemoryPersistence>) {
    let uow = Arc::new(InMemoryPersistence::new());
    let resolver = IdentityResolver::new(uow.clone());
    (uow, resolver)
}

fn registration(username: &str, password: &str, email: &str) -> LocalRegistration {
    LocalRegistration {
        username: username.to_string(),
        password: password.to_string(),
        first_name: "Form".to_string(),
        last_name: "Name".to_string(),
        email: email.to_string(),
    }
}

fn google(external_id: &str, email: &str, name: &str) -> ExternalProfile {
    ExternalProfile::new(external_id, email, name, None)
}

/// Link assertion as the callback would mint it
fn assertion_for(user: &estate_auth::User) -> ExternalAssertion {
    let tokens = TokenIssuer::new(
        JwtSettings::new("integration-secret-at-least-32-characters", 1),
        Arc::new(MemorySessionStore::new()),
    );
    let token = tokens.issue_link_token(user).unwrap();
    tokens.verify_link_token(&token).unwrap()
}

#[tokio::test]
async fn test_resolving_same_profile_twice_keeps_one_row() {
    let (uow, resolver) = setup();
    let profile = google("g-100", "carol@x.com", "Carol Danvers");

    let first = resolver.resolve_external_login(profile.clone()).await.unwrap();
    let second = resolver.resolve_external_login(profile).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(uow.store().len().await, 1);
    assert_eq!(second.identity_state(), IdentityState::ExternalOnly);
}

#[tokio::test]
async fn test_each_resolution_writes_exactly_one_row() {
    let (uow, resolver) = setup();

    resolver
        .resolve_external_login(google("g-1", "a@x.com", "A"))
        .await
        .unwrap();
    assert_eq!(uow.store().writes(), 1);

    resolver
        .resolve_external_login(google("g-1", "a@x.com", "A Renamed"))
        .await
        .unwrap();
    assert_eq!(uow.store().writes(), 2);
}

#[tokio::test]
async fn test_duplicate_username_is_rejected_case_insensitively() {
    let (uow, resolver) = setup();

    resolver
        .register_local(registration("dave", "Valid123!", "dave@x.com"), None)
        .await
        .unwrap();

    let result = resolver
        .register_local(registration("DAVE", "Valid123!", "other@x.com"), None)
        .await;

    assert!(matches!(result, Err(AppError::UsernameTaken)));
    assert_eq!(uow.store().len().await, 1);
}

#[tokio::test]
async fn test_concurrent_registrations_of_one_username() {
    let (uow, resolver) = setup();
    let resolver = Arc::new(resolver);

    let a = {
        let resolver = resolver.clone();
        tokio::spawn(async move {
            resolver
                .register_local(registration("erin", "Valid123!", "erin1@x.com"), None)
                .await
        })
    };
    let b = {
        let resolver = resolver.clone();
        tokio::spawn(async move {
            resolver
                .register_local(registration("Erin", "Valid123!", "erin2@x.com"), None)
                .await
        })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let taken = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::UsernameTaken)))
        .count();

    assert_eq!((successes, taken), (1, 1));
    assert_eq!(uow.store().len().await, 1);
}

#[tokio::test]
async fn test_external_login_links_local_account_once() {
    let (uow, resolver) = setup();

    let Registration::Registered { user: local, .. } = resolver
        .register_local(registration("frank", "Valid123!", "frank@x.com"), None)
        .await
        .unwrap()
    else {
        panic!("expected registration");
    };

    let linked = resolver
        .resolve_external_login(google("g-200", "Frank@X.com", "Frank Castle"))
        .await
        .unwrap();

    assert_eq!(linked.id, local.id);
    assert_eq!(linked.identity_state(), IdentityState::Linked);
    assert_eq!(linked.external_id.as_deref(), Some("g-200"));

    let again = resolver
        .resolve_external_login(google("g-200", "frank@x.com", "Frank Castle"))
        .await
        .unwrap();

    assert_eq!(again.id, local.id);
    assert_eq!(again.external_id.as_deref(), Some("g-200"));
    assert_eq!(uow.store().len().await, 1);
}

#[tokio::test]
async fn test_linked_row_is_not_relinked_by_another_profile() {
    let (uow, resolver) = setup();

    resolver
        .register_local(registration("gina", "Valid123!", "gina@x.com"), None)
        .await
        .unwrap();
    resolver
        .resolve_external_login(google("g-300", "gina@x.com", "Gina"))
        .await
        .unwrap();

    // Same email, different Google account: the linked row is not a candidate
    let stranger = resolver
        .resolve_external_login(google("g-301", "gina@x.com", "Impostor"))
        .await
        .unwrap();

    assert_eq!(stranger.external_id.as_deref(), Some("g-301"));
    assert_eq!(uow.store().len().await, 2);

    let original = uow
        .store()
        .all()
        .await
        .into_iter()
        .find(|u| u.username.as_deref() == Some("gina"))
        .unwrap();
    assert_eq!(original.external_id.as_deref(), Some("g-300"));
}

#[tokio::test]
async fn test_registration_against_external_email_needs_consent() {
    let (uow, resolver) = setup();

    let external = resolver
        .resolve_external_login(google("g-400", "hank@x.com", "Hank Pym"))
        .await
        .unwrap();
    let writes_before = uow.store().writes();

    let outcome = resolver
        .register_local(registration("hank", "Valid123!", "hank@x.com"), None)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Registration::NeedsLinking {
            email: "hank@x.com".to_string(),
            name: "Hank Pym".to_string(),
        }
    );
    assert_eq!(uow.store().writes(), writes_before);

    let outcome = resolver
        .register_local(
            registration("hank", "Valid123!", "hank@x.com"),
            Some(assertion_for(&external)),
        )
        .await
        .unwrap();

    let Registration::Registered { user, linked } = outcome else {
        panic!("expected registration");
    };
    assert!(linked);
    assert_eq!(user.id, external.id);
    assert_eq!(user.identity_state(), IdentityState::Linked);
    assert_eq!((user.first_name.as_str(), user.last_name.as_str()), ("Hank", "Pym"));
    assert_eq!(uow.store().writes(), writes_before + 1);
    assert_eq!(uow.store().len().await, 1);

    let signed_in = resolver
        .authenticate_local("hank".to_string(), "Valid123!".to_string())
        .await
        .unwrap();
    assert_eq!(signed_in.id, external.id);
}

#[tokio::test]
async fn test_assertion_for_another_account_is_rejected() {
    let (uow, resolver) = setup();

    resolver
        .resolve_external_login(google("g-500", "ivy@x.com", "Ivy"))
        .await
        .unwrap();
    let attacker = resolver
        .resolve_external_login(google("g-666", "mallory@x.com", "Mallory"))
        .await
        .unwrap();
    let writes_before = uow.store().writes();

    let result = resolver
        .register_local(
            registration("ivy", "Valid123!", "ivy@x.com"),
            Some(assertion_for(&attacker)),
        )
        .await;

    assert!(matches!(result, Err(AppError::LinkRejected)));
    assert_eq!(uow.store().writes(), writes_before);
}

#[tokio::test]
async fn test_assertion_picks_its_own_row_when_external_accounts_share_an_email() {
    for _ in 0..20 {
        let (uow, resolver) = setup();

        resolver
            .resolve_external_login(google("g-a", "same@x.com", "First Account"))
            .await
            .unwrap();
        let second = resolver
            .resolve_external_login(google("g-b", "same@x.com", "Second Account"))
            .await
            .unwrap();

        let outcome = resolver
            .register_local(
                registration("shared", "Valid123!", "same@x.com"),
                Some(assertion_for(&second)),
            )
            .await
            .unwrap();

        let Registration::Registered { user, linked } = outcome else {
            panic!("expected registration");
        };
        assert!(linked);
        assert_eq!(user.id, second.id);
        assert_eq!(user.external_id.as_deref(), Some("g-b"));
        assert_eq!(uow.store().len().await, 2);
    }
}

#[tokio::test]
async fn test_needs_linking_names_the_same_account_every_time() {
    let (_, resolver) = setup();

    resolver
        .resolve_external_login(google("g-a", "same@x.com", "First Account"))
        .await
        .unwrap();
    resolver
        .resolve_external_login(google("g-b", "same@x.com", "Second Account"))
        .await
        .unwrap();

    let mut names = Vec::new();
    for _ in 0..10 {
        match resolver
            .register_local(registration("shared", "Valid123!", "same@x.com"), None)
            .await
            .unwrap()
        {
            Registration::NeedsLinking { name, .. } => names.push(name),
            other => panic!("unexpected {:?}", other),
        }
    }
    names.dedup();
    assert_eq!(names.len(), 1);
}

#[tokio::test]
async fn test_concurrent_registrations_of_one_email() {
    let (uow, resolver) = setup();
    let resolver = Arc::new(resolver);

    let handles: Vec<_> = ["nora", "nina"]
        .into_iter()
        .map(|username| {
            let resolver = resolver.clone();
            tokio::spawn(async move {
                resolver
                    .register_local(registration(username, "Valid123!", "nora@x.com"), None)
                    .await
            })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::EmailAlreadyRegistered)))
        .count();
    assert_eq!((successes, duplicates), (1, 1));
    assert_eq!(uow.store().len().await, 1);
}

#[tokio::test]
async fn test_second_local_account_for_email_is_rejected() {
    let (uow, resolver) = setup();

    resolver
        .register_local(registration("jane", "Valid123!", "jane@x.com"), None)
        .await
        .unwrap();
    let result = resolver
        .register_local(registration("jane2", "Valid123!", "JANE@x.com"), None)
        .await;

    assert!(matches!(result, Err(AppError::EmailAlreadyRegistered)));
    assert_eq!(uow.store().len().await, 1);
}

#[tokio::test]
async fn test_password_rules_report_specific_reasons() {
    let (uow, resolver) = setup();

    let cases = [
        ("short1!", CredentialError::PasswordTooShort),
        ("alllowercase1!", CredentialError::PasswordMissingUppercase),
        ("ALLUPPER1!", CredentialError::PasswordMissingLowercase),
        ("NoDigits!", CredentialError::PasswordMissingDigit),
        ("NoSymbol1", CredentialError::PasswordMissingSymbol),
    ];

    for (password, expected) in cases {
        let result = resolver
            .register_local(registration("kate", password, "kate@x.com"), None)
            .await;
        match result {
            Err(AppError::InvalidField(reason)) => assert_eq!(reason, expected, "{}", password),
            other => panic!("{}: unexpected {:?}", password, other),
        }
    }
    assert!(uow.store().is_empty().await);

    let accepted = resolver
        .register_local(registration("kate", "Valid123!", "kate@x.com"), None)
        .await;
    assert!(accepted.is_ok());
}

#[tokio::test]
async fn test_external_only_account_cannot_use_password_login() {
    let (_, resolver) = setup();

    resolver
        .resolve_external_login(google("g-700", "leo@x.com", "Leo"))
        .await
        .unwrap();

    let result = resolver
        .authenticate_local("leo".to_string(), "Valid123!".to_string())
        .await;
    assert!(matches!(result, Err(AppError::InvalidCredentials)));
}

#[tokio::test]
async fn test_wrong_password_and_unknown_user_are_indistinguishable() {
    let (_, resolver) = setup();

    resolver
        .register_local(registration("mike", "Valid123!", "mike@x.com"), None)
        .await
        .unwrap();

    let wrong = resolver
        .authenticate_local("mike".to_string(), "Wrong123!".to_string())
        .await
        .unwrap_err();
    let unknown = resolver
        .authenticate_local("nobody".to_string(), "Valid123!".to_string())
        .await
        .unwrap_err();

    assert_eq!(wrong.to_string(), unknown.to_string());
    assert_eq!(wrong.status(), unknown.status());
}

#[tokio::test]
async fn test_alice_end_to_end() {
    let (uow, resolver) = setup();

    let outcome = resolver
        .register_local(
            LocalRegistration {
                username: "alice".to_string(),
                password: "Abc12345!".to_string(),
                first_name: "Al".to_string(),
                last_name: "Ice".to_string(),
                email: "alice@x.com".to_string(),
            },
            None,
        )
        .await
        .unwrap();
    let Registration::Registered { user: alice, linked } = outcome else {
        panic!("expected registration");
    };
    assert!(!linked);
    assert_eq!(alice.identity_state(), IdentityState::LocalOnly);

    let profile = google("g-001", "alice@x.com", "Alice Wonderland");
    let linked = resolver
        .resolve_external_login(profile.clone())
        .await
        .unwrap();

    assert_eq!(linked.id, alice.id);
    assert_eq!(linked.first_name, "Alice");
    assert_eq!(linked.last_name, "Wonderland");
    assert_eq!(linked.external_id.as_deref(), Some("g-001"));
    assert_eq!(linked.username.as_deref(), Some("alice"));

    let repeat = resolver.resolve_external_login(profile).await.unwrap();
    assert_eq!(repeat.id, alice.id);
    assert!(repeat.updated_at >= linked.updated_at);
    assert_eq!(uow.store().len().await, 1);

    let by_password = resolver
        .authenticate_local("Alice".to_string(), "Abc12345!".to_string())
        .await
        .unwrap();
    assert_eq!(by_password.id, alice.id);
}
