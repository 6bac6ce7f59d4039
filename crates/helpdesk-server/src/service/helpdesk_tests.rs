//! Tests for the operation facade: identity checks and sessions.

use super::account_svc::ChannelProfile;
use crate::error::ErrorKind;
use crate::storage::{Priority, Role, TicketStatus};
use crate::test_helpers::TestHelpdesk;

#[tokio::test]
async fn protected_operations_require_identity() {
    let t = TestHelpdesk::new().await;
    let h = &t.helpdesk;

    let kinds = [
        h.create_ticket(None, "Printer", "Printer shows error 42", None)
            .await
            .unwrap_err()
            .kind(),
        h.change_ticket_status(None, "t1", TicketStatus::Resolved)
            .await
            .unwrap_err()
            .kind(),
        h.add_comment(None, "t1", "hello").await.unwrap_err().kind(),
        h.list_my_tickets(None).await.unwrap_err().kind(),
        h.list_all_tickets(None).await.unwrap_err().kind(),
        h.get_ticket(None, "t1").await.unwrap_err().kind(),
        h.get_profile(None).await.unwrap_err().kind(),
        h.update_profile(None, Some("Name")).await.unwrap_err().kind(),
        h.update_user_role(None, "u1", Role::Admin)
            .await
            .unwrap_err()
            .kind(),
        h.list_users(None).await.unwrap_err().kind(),
        h.issue_link_token(None, Some("a@example.com"))
            .await
            .unwrap_err()
            .kind(),
    ];
    assert!(kinds.iter().all(|k| *k == ErrorKind::Unauthorized), "{kinds:?}");
}

#[tokio::test]
async fn login_session_identifies_user() {
    let t = TestHelpdesk::new().await;
    let h = &t.helpdesk;
    let user = h
        .register("Alice", "alice@example.com", "secret1")
        .await
        .unwrap();

    let session = h.login("alice@example.com", "secret1").await.unwrap();
    let header = format!("Bearer {}", session.token);
    let identity = h.identify(Some(&header)).unwrap();
    assert_eq!(identity.user_id, user.id);
    assert_eq!(identity.role, Role::Admin);

    let ticket = h
        .create_ticket(Some(&identity), "Printer", "Printer shows error 42", Some(Priority::Low))
        .await
        .unwrap();
    let mine = h.list_my_tickets(Some(&identity)).await.unwrap();
    assert_eq!(mine[0].id, ticket.id);

    let profile = h.get_profile(Some(&identity)).await.unwrap();
    assert_eq!(profile.email, "alice@example.com");

    assert_eq!(
        h.identify(Some("Bearer garbage")).unwrap_err().kind(),
        ErrorKind::Unauthorized
    );
    assert_eq!(h.identify(None).unwrap_err().kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn link_tokens_only_target_own_account() {
    let t = TestHelpdesk::new().await;
    let h = &t.helpdesk;
    let alice = t.seed_with_role("alice", "Alice", None, Role::User).await;
    t.seed_user("bob", "Bob", None).await;

    h.issue_link_token(Some(&alice), Some("alice@example.com"))
        .await
        .unwrap();

    let err = h
        .issue_link_token(Some(&alice), Some("bob@example.com"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = h
        .issue_link_token(Some(&alice), Some("ghost@example.com"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h
        .issue_link_token(None, Some("alice@example.com"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    // Registration tokens are open to anonymous callers.
    h.issue_link_token(None, None).await.unwrap();
}

#[tokio::test]
async fn chat_login_returns_usable_session() {
    let t = TestHelpdesk::new().await;
    let h = &t.helpdesk;
    let profile = ChannelProfile {
        first_name: "Neo".into(),
        ..ChannelProfile::default()
    };

    let first = h
        .login_or_register_by_secondary_id("4242", &profile)
        .await
        .unwrap();
    let again = h
        .login_or_register_by_secondary_id("4242", &profile)
        .await
        .unwrap();
    assert_eq!(first.user.id, again.user.id);
    assert_eq!(first.user.name, "Neo");

    let header = format!("Bearer {}", again.session.token);
    let identity = h.identify(Some(&header)).unwrap();
    assert_eq!(identity.user_id, first.user.id);
}
