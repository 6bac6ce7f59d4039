//! Tests for chat account linking.

use helpdesk_core::db::unix_timestamp;

use super::account_svc::{ChannelProfile, synthetic_email};
use super::link_svc::{LINK_TOKEN_BYTES, LinkMode};
use crate::auth::hash_token;
use crate::error::{ErrorKind, ServiceError};
use crate::storage::Role;
use crate::test_helpers::TestHelpdesk;

fn profile(username: &str) -> ChannelProfile {
    ChannelProfile {
        first_name: "Ivan".into(),
        last_name: Some("Petrov".into()),
        username: Some(username.into()),
    }
}

/// Contents of every `<code>` element in an HTML message.
fn code_blocks(text: &str) -> Vec<&str> {
    text.split("<code>")
        .skip(1)
        .filter_map(|s| s.split_once("</code>").map(|(code, _)| code))
        .collect()
}

#[tokio::test]
async fn issued_token_is_random_hex_and_stored_hashed() {
    let t = TestHelpdesk::new().await;
    let before = unix_timestamp();

    let issued = t.helpdesk.linker().issue_link_token(None).await.unwrap();
    assert_eq!(issued.mode, LinkMode::Register);
    assert_eq!(issued.token.len(), LINK_TOKEN_BYTES * 2);
    assert!(issued.token.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(issued.expires_at >= before + 900);
    assert_eq!(issued.deep_link_payload(), format!("auth_{}", issued.token));

    assert!(t.db.get_link_token(&issued.token).await.unwrap().is_none());
    let stored = t
        .db
        .get_link_token(&hash_token(&issued.token))
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.used);
    assert!(stored.is_registration());

    let other = t.helpdesk.linker().issue_link_token(None).await.unwrap();
    assert_ne!(issued.token, other.token);
}

#[tokio::test]
async fn link_token_for_unknown_email_is_not_found() {
    let t = TestHelpdesk::new().await;
    let err = t
        .helpdesk
        .linker()
        .issue_link_token(Some("nobody@example.com"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn register_mode_creates_first_user_as_admin_and_relays_credentials() {
    let mut t = TestHelpdesk::new().await;
    let issued = t.helpdesk.linker().issue_link_token(None).await.unwrap();

    let redemption = t
        .helpdesk
        .linker()
        .redeem_link_token(&issued.token, "555", &profile("ivan"))
        .await
        .unwrap();
    assert!(redemption.created);
    let user = redemption.user;
    assert_eq!(user.role, Role::Admin);
    assert_eq!(user.telegram_id.as_deref(), Some("555"));
    assert_eq!(user.email, synthetic_email("555", &user.id));
    assert_eq!(user.name, "ivan");

    let (chat, text) = t.next_message().await;
    assert_eq!(chat, "555");
    let codes = code_blocks(&text);
    assert_eq!(codes[0], user.email);

    // The relayed password is the only copy and it works.
    let authed = t
        .helpdesk
        .accounts()
        .authenticate(&user.email, codes[1])
        .await
        .unwrap();
    assert_eq!(authed.id, user.id);
}

#[tokio::test]
async fn later_registrations_are_plain_users() {
    let t = TestHelpdesk::new().await;
    t.seed_user("first", "First", None).await;

    let issued = t.helpdesk.linker().issue_link_token(None).await.unwrap();
    let redemption = t
        .helpdesk
        .linker()
        .redeem_link_token(&issued.token, "555", &ChannelProfile::default())
        .await
        .unwrap();
    assert_eq!(redemption.user.role, Role::User);
    assert_eq!(redemption.user.name, "user_555");
}

#[tokio::test]
async fn second_redemption_is_invalid() {
    let t = TestHelpdesk::new().await;
    let issued = t.helpdesk.linker().issue_link_token(None).await.unwrap();
    let linker = t.helpdesk.linker();

    linker
        .redeem_link_token(&issued.token, "555", &profile("ivan"))
        .await
        .unwrap();
    let err = linker
        .redeem_link_token(&issued.token, "556", &profile("other"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidToken));
}

#[tokio::test]
async fn unknown_and_expired_tokens_are_invalid_without_side_effects() {
    let t = TestHelpdesk::with_link_ttl(-1).await;
    let linker = t.helpdesk.linker();

    let err = linker
        .redeem_link_token("deadbeef", "555", &profile("ivan"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidToken);

    let issued = linker.issue_link_token(None).await.unwrap();
    let err = linker
        .redeem_link_token(&issued.token, "555", &profile("ivan"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidToken);

    let stored = t
        .db
        .get_link_token(&hash_token(&issued.token))
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.used);
    assert_eq!(t.db.count_users().await.unwrap(), 0);
}

#[tokio::test]
async fn link_mode_binds_existing_account() {
    let t = TestHelpdesk::new().await;
    t.seed_user("u1", "Alice", None).await;
    let linker = t.helpdesk.linker();

    let issued = linker
        .issue_link_token(Some("u1@example.com"))
        .await
        .unwrap();
    assert_eq!(issued.mode, LinkMode::Link);

    let redemption = linker
        .redeem_link_token(&issued.token, "777", &profile("alice"))
        .await
        .unwrap();
    assert!(!redemption.created);
    assert_eq!(redemption.user.id, "u1");
    assert_eq!(redemption.user.telegram_id.as_deref(), Some("777"));
    assert_eq!(t.db.count_users().await.unwrap(), 1);
}

#[tokio::test]
async fn relinking_the_same_account_succeeds() {
    let t = TestHelpdesk::new().await;
    t.seed_user("u1", "Alice", Some("777")).await;
    let linker = t.helpdesk.linker();

    let issued = linker
        .issue_link_token(Some("u1@example.com"))
        .await
        .unwrap();
    let redemption = linker
        .redeem_link_token(&issued.token, "777", &profile("alice"))
        .await
        .unwrap();
    assert_eq!(redemption.user.id, "u1");
}

#[tokio::test]
async fn channel_of_another_user_cannot_be_bound() {
    let t = TestHelpdesk::new().await;
    t.seed_user("a", "Alice", Some("777")).await;
    t.seed_user("b", "Bob", None).await;
    let linker = t.helpdesk.linker();

    let issued = linker.issue_link_token(Some("b@example.com")).await.unwrap();
    let err = linker
        .redeem_link_token(&issued.token, "777", &profile("bob"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ChannelAlreadyLinked));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let holder = t.db.get_user_by_telegram_id("777").await.unwrap().unwrap();
    assert_eq!(holder.id, "a");
    assert!(t.db.get_user("b").await.unwrap().telegram_id.is_none());

    // The token was valid when claimed, so it stays consumed.
    let err = linker
        .redeem_link_token(&issued.token, "778", &profile("bob"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidToken);
}

#[tokio::test]
async fn register_mode_rejects_already_linked_channel() {
    let t = TestHelpdesk::new().await;
    t.seed_user("a", "Alice", Some("777")).await;
    let linker = t.helpdesk.linker();

    let issued = linker.issue_link_token(None).await.unwrap();
    let err = linker
        .redeem_link_token(&issued.token, "777", &profile("alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ChannelAlreadyLinked));
    assert_eq!(t.db.count_users().await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_redemptions_have_one_winner() {
    let t = TestHelpdesk::new().await;
    let issued = t.helpdesk.linker().issue_link_token(None).await.unwrap();
    let first = t.helpdesk.linker().clone();
    let second = t.helpdesk.linker().clone();

    let (one, two) = (profile("one"), profile("two"));

    let (a, b) = tokio::join!(
        first.redeem_link_token(&issued.token, "1001", &one),
        second.redeem_link_token(&issued.token, "1002", &two),
    );

    let outcomes = [a.is_ok(), b.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    let loser = a.err().or(b.err()).unwrap();
    assert_eq!(loser.kind(), ErrorKind::InvalidToken);
    assert_eq!(t.db.count_users().await.unwrap(), 1);
}

#[tokio::test]
async fn login_or_register_is_idempotent() {
    let mut t = TestHelpdesk::new().await;
    let linker = t.helpdesk.linker().clone();

    let first = linker
        .login_or_register_by_secondary_id("4242", &profile("neo"))
        .await
        .unwrap();
    let second = linker
        .login_or_register_by_secondary_id("4242", &profile("neo"))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.role, Role::Admin);
    assert_eq!(t.db.count_users().await.unwrap(), 1);

    // Credentials go out once, on creation.
    let (chat, text) = t.next_message().await;
    assert_eq!(chat, "4242");
    assert!(text.contains(&synthetic_email("4242", &first.id)));
}

#[tokio::test]
async fn concurrent_login_or_register_creates_one_user() {
    let t = TestHelpdesk::new().await;
    let linker = t.helpdesk.linker();
    let neo = profile("neo");

    let (a, b) = tokio::join!(
        linker.login_or_register_by_secondary_id("4242", &neo),
        linker.login_or_register_by_secondary_id("4242", &neo),
    );

    assert_eq!(a.unwrap().id, b.unwrap().id);
    assert_eq!(t.db.count_users().await.unwrap(), 1);
}

#[tokio::test]
async fn empty_channel_id_is_rejected() {
    let t = TestHelpdesk::new().await;
    let err = t
        .helpdesk
        .linker()
        .login_or_register_by_secondary_id("  ", &profile("neo"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn freed_channel_can_register_again() {
    let t = TestHelpdesk::new().await;
    let linker = t.helpdesk.linker();

    let original = linker
        .login_or_register_by_secondary_id("123", &profile("mover"))
        .await
        .unwrap();

    // Move the account to another chat, freeing 123.
    let issued = linker
        .issue_link_token(Some(&original.email))
        .await
        .unwrap();
    let moved = linker
        .redeem_link_token(&issued.token, "456", &profile("mover"))
        .await
        .unwrap();
    assert_eq!(moved.user.id, original.id);
    assert!(t.db.get_user_by_telegram_id("123").await.unwrap().is_none());

    let fresh = linker
        .login_or_register_by_secondary_id("123", &profile("newcomer"))
        .await
        .unwrap();
    assert_ne!(fresh.id, original.id);
    assert_ne!(fresh.email, original.email);
    assert_eq!(fresh.telegram_id.as_deref(), Some("123"));

    // Free 123 once more and take it through a registration token.
    let issued = linker.issue_link_token(Some(&fresh.email)).await.unwrap();
    linker
        .redeem_link_token(&issued.token, "789", &profile("newcomer"))
        .await
        .unwrap();
    let issued = linker.issue_link_token(None).await.unwrap();
    let redemption = linker
        .redeem_link_token(&issued.token, "123", &profile("third"))
        .await
        .unwrap();
    assert!(redemption.created);
    assert_eq!(redemption.user.telegram_id.as_deref(), Some("123"));
    assert_eq!(t.db.count_users().await.unwrap(), 3);
}
