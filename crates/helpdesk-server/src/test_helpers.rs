//! Shared test helpers for service and relay test modules.
//!
//! Provides a recording [`MessageSender`], a fully wired [`Helpdesk`] over
//! an in-memory database, and shortcuts for seeding users.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::auth::{Identity, SessionManager};
use crate::notifications::{MessageSender, NotificationError, NotificationRelay};
use crate::service::Helpdesk;
use crate::storage::{HelpdeskDatabase, NewUser, Role, User};

/// How long a test waits for an expected notification.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Forwards every sent `(chat_id, text)` pair to a channel.
pub struct RecordingSender {
    tx: mpsc::UnboundedSender<(String, String)>,
}

impl RecordingSender {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, String)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), NotificationError> {
        let _ = self.tx.send((chat_id.to_string(), text.to_string()));
        Ok(())
    }
}

/// Wait for the next delivered message, failing the test on timeout.
pub async fn expect_message(rx: &mut mpsc::UnboundedReceiver<(String, String)>) -> (String, String) {
    tokio::time::timeout(DELIVERY_TIMEOUT, rx.recv())
        .await
        .unwrap()
        .unwrap()
}

/// A helpdesk wired to an in-memory database and a recording sender.
pub struct TestHelpdesk {
    pub helpdesk: Helpdesk,
    pub db: HelpdeskDatabase,
    pub sent: mpsc::UnboundedReceiver<(String, String)>,
    pub cancel: CancellationToken,
}

impl TestHelpdesk {
    pub async fn new() -> Self {
        Self::with_link_ttl(900).await
    }

    pub async fn with_link_ttl(link_ttl_secs: i64) -> Self {
        let db = HelpdeskDatabase::open_in_memory().await.unwrap();
        let (sender, sent) = RecordingSender::new();
        let cancel = CancellationToken::new();
        let (relay, _handle) =
            NotificationRelay::spawn(db.clone(), Arc::new(sender), 64, cancel.clone());
        let sessions = Arc::new(SessionManager::new(b"test-secret", 3600));
        let helpdesk = Helpdesk::new(db.clone(), relay, sessions, link_ttl_secs);
        Self {
            helpdesk,
            db,
            sent,
            cancel,
        }
    }

    /// Insert a user directly. The first one inserted becomes ADMIN.
    pub async fn seed_user(&self, id: &str, name: &str, telegram_id: Option<&str>) -> User {
        self.db
            .create_user(&NewUser {
                id,
                email: &format!("{id}@example.com"),
                name,
                password_hash: "hash",
                telegram_id,
            })
            .await
            .unwrap()
    }

    /// Insert a user and force its role.
    pub async fn seed_with_role(
        &self,
        id: &str,
        name: &str,
        telegram_id: Option<&str>,
        role: Role,
    ) -> Identity {
        self.seed_user(id, name, telegram_id).await;
        self.db.update_user_role(id, role).await.unwrap();
        Identity::new(id, role)
    }

    pub async fn next_message(&mut self) -> (String, String) {
        expect_message(&mut self.sent).await
    }
}

impl Drop for TestHelpdesk {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
