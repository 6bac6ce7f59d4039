//! Fire-and-forget notification dispatch.
//!
//! Operations hand a message to [`NotificationRelay::notify`] after their
//! writes are committed. The call never blocks and never fails: the message
//! goes onto a bounded queue drained by a single [`NotificationDispatcher`]
//! task, which resolves the recipient's chat id and makes one delivery
//! attempt. Overflow, missing chat ids and transport errors are logged and
//! otherwise ignored.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::MessageSender;
use crate::storage::HelpdeskDatabase;

/// A queued message for a user.
#[derive(Debug, Clone)]
pub struct Notification {
    pub user_id: String,
    pub text: String,
}

/// Handle used by operations to enqueue notifications. Cheap to clone.
#[derive(Debug, Clone)]
pub struct NotificationRelay {
    tx: mpsc::Sender<Notification>,
}

impl NotificationRelay {
    /// Create a relay and the dispatcher that drains it.
    pub fn new(
        db: HelpdeskDatabase,
        sender: Arc<dyn MessageSender>,
        capacity: usize,
    ) -> (Self, NotificationDispatcher) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, NotificationDispatcher { db, sender, rx })
    }

    /// Create a relay and spawn its dispatcher on the current runtime.
    pub fn spawn(
        db: HelpdeskDatabase,
        sender: Arc<dyn MessageSender>,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (relay, dispatcher) = Self::new(db, sender, capacity);
        let handle = tokio::spawn(dispatcher.run(cancel));
        (relay, handle)
    }

    /// Enqueue a message for `user_id`. Never blocks, never fails.
    pub fn notify(&self, user_id: &str, text: impl Into<String>) {
        let notification = Notification {
            user_id: user_id.to_string(),
            text: text.into(),
        };
        match self.tx.try_send(notification) {
            Ok(()) => debug!(user_id, "Notification queued"),
            Err(TrySendError::Full(n)) => {
                warn!(user_id = %n.user_id, "Notification queue full, message dropped");
            }
            Err(TrySendError::Closed(n)) => {
                warn!(user_id = %n.user_id, "Notification dispatcher stopped, message dropped");
            }
        }
    }
}

/// Background task delivering queued notifications one at a time.
pub struct NotificationDispatcher {
    db: HelpdeskDatabase,
    sender: Arc<dyn MessageSender>,
    rx: mpsc::Receiver<Notification>,
}

impl NotificationDispatcher {
    /// Drain the queue until cancelled or every relay handle is dropped.
    ///
    /// Messages still queued at cancellation are discarded.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Notification dispatcher started");
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    let dropped = self.rx.len();
                    info!(dropped, "Notification dispatcher cancelled");
                    break;
                }
                next = self.rx.recv() => match next {
                    Some(notification) => self.deliver(notification).await,
                    None => {
                        info!("Notification relay closed, dispatcher exiting");
                        break;
                    }
                },
            }
        }
    }

    /// One delivery attempt. Every failure ends here as a log line.
    async fn deliver(&self, notification: Notification) {
        let user = match self.db.get_user(&notification.user_id).await {
            Ok(user) => user,
            Err(e) => {
                warn!(user_id = %notification.user_id, error = %e, "Cannot resolve notification recipient");
                return;
            }
        };

        let Some(chat_id) = user.telegram_id.as_deref() else {
            debug!(user_id = %user.id, "User has no linked chat, notification skipped");
            return;
        };

        match self.sender.send(chat_id, &notification.text).await {
            Ok(()) => debug!(user_id = %user.id, "Notification delivered"),
            Err(e) => warn!(user_id = %user.id, error = %e, "Notification delivery failed"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::notifications::NotificationError;
    use crate::storage::NewUser;
    use crate::test_helpers::{RecordingSender, expect_message};
    use async_trait::async_trait;

    async fn db_with_users() -> HelpdeskDatabase {
        let db = HelpdeskDatabase::open_in_memory().await.unwrap();
        for (id, email, tg) in [("u1", "a@x.io", Some("100")), ("u2", "b@x.io", None)] {
            db.create_user(&NewUser {
                id,
                email,
                name: id,
                password_hash: "hash",
                telegram_id: tg,
            })
            .await
            .unwrap();
        }
        db
    }

    struct FailingSender;

    #[async_trait]
    impl MessageSender for FailingSender {
        async fn send(&self, _chat_id: &str, _text: &str) -> Result<(), NotificationError> {
            Err(NotificationError::Api {
                status: 403,
                description: "Forbidden: bot was blocked by the user".into(),
            })
        }
    }

    #[tokio::test]
    async fn delivers_to_linked_chat() {
        let db = db_with_users().await;
        let (sender, mut rx) = RecordingSender::new();
        let (relay, _handle) =
            NotificationRelay::spawn(db, Arc::new(sender), 8, CancellationToken::new());

        relay.notify("u1", "hello");
        let (chat, text) = expect_message(&mut rx).await;
        assert_eq!(chat, "100");
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn unlinked_and_unknown_users_are_skipped() {
        let db = db_with_users().await;
        let (sender, mut rx) = RecordingSender::new();
        let (relay, _handle) =
            NotificationRelay::spawn(db, Arc::new(sender), 8, CancellationToken::new());

        relay.notify("u2", "no chat");
        relay.notify("ghost", "no user");
        relay.notify("u1", "marker");

        let (_, text) = expect_message(&mut rx).await;
        assert_eq!(text, "marker");
    }

    #[tokio::test]
    async fn transport_failure_does_not_stop_dispatcher() {
        let db = db_with_users().await;
        let (relay, dispatcher) = NotificationRelay::new(db, Arc::new(FailingSender), 8);
        relay.notify("u1", "first");
        relay.notify("u1", "second");
        drop(relay);

        // Returns once the queue is drained and the relay is gone.
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            dispatcher.run(CancellationToken::new()),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let db = db_with_users().await;
        let (sender, _rx) = RecordingSender::new();
        let (relay, mut dispatcher) = NotificationRelay::new(db, Arc::new(sender), 1);

        // Dispatcher not running: the second and third messages overflow.
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            relay.notify("u1", "one");
            relay.notify("u1", "two");
            relay.notify("u1", "three");
        })
        .await
        .expect("notify blocked on a full queue");

        let queued = dispatcher.rx.try_recv().unwrap();
        assert_eq!(queued.text, "one");
        assert!(dispatcher.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn notify_after_shutdown_is_harmless() {
        let db = db_with_users().await;
        let (sender, _rx) = RecordingSender::new();
        let cancel = CancellationToken::new();
        let (relay, handle) = NotificationRelay::spawn(db, Arc::new(sender), 8, cancel.clone());

        cancel.cancel();
        handle.await.unwrap();
        relay.notify("u1", "too late");
    }
}
