use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::warn;

use skillswap_db::Database;
use skillswap_types::events::{GatewayEvent, Notification};

use crate::dispatcher::Dispatcher;
use crate::policy::{self, DomainEvent};
use crate::push::PushChannel;

/// Delivers domain events through both notification channels.
///
/// The persisted in-app record is written first and is authoritative — a
/// failure there propagates to the caller. The push channel and the
/// realtime gateway are best-effort on top; their failures are logged and
/// never roll anything back. Per-recipient deliveries are independent, so
/// a partial fan-out is possible and accepted.
#[derive(Clone)]
pub struct Notifier {
    db: Arc<Database>,
    push: PushChannel,
    dispatcher: Dispatcher,
}

impl Notifier {
    pub fn new(db: Arc<Database>, push: PushChannel, dispatcher: Dispatcher) -> Self {
        Self {
            db,
            push,
            dispatcher,
        }
    }

    /// Fan out `event` and deliver each resulting notification.
    pub async fn dispatch(&self, event: DomainEvent) -> Result<Vec<Notification>> {
        let notifications = policy::fan_out(&event, Utc::now());

        for notification in &notifications {
            self.persist(notification).await?;

            self.dispatcher
                .send_to_user(
                    notification.recipient_id,
                    GatewayEvent::NotificationCreate {
                        notification: notification.clone(),
                    },
                )
                .await;

            self.try_push(notification).await;
        }

        Ok(notifications)
    }

    async fn persist(&self, notification: &Notification) -> Result<()> {
        let db = self.db.clone();
        let record = notification.clone();
        tokio::task::spawn_blocking(move || db.insert_notification(&record))
            .await
            .context("notification insert task panicked")?
    }

    /// Push path: any failure here — token lookup included — is logged and
    /// swallowed.
    async fn try_push(&self, notification: &Notification) {
        let db = self.db.clone();
        let recipient = notification.recipient_id;
        let token = tokio::task::spawn_blocking(move || db.push_token(&recipient.to_string())).await;

        let token = match token {
            Ok(Ok(Some(token))) => token,
            Ok(Ok(None)) => return, // no device registered
            Ok(Err(e)) => {
                warn!("Push token lookup for {} failed: {}", recipient, e);
                return;
            }
            Err(e) => {
                warn!("Push token lookup task for {} panicked: {}", recipient, e);
                return;
            }
        };

        let payload = match serde_json::to_value(&notification.payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Unserializable push payload for {}: {}", recipient, e);
                return;
            }
        };

        self.push
            .send(&token, &notification.title, &notification.body, payload)
            .await;
    }
}
