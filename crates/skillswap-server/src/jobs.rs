use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use skillswap_db::Database;
use skillswap_notify::{DomainEvent, Notifier};

/// How long notifications are kept before the sweep removes them.
const RETENTION_DAYS: i64 = 30;

/// How far ahead the reminder job looks for starting events.
const REMINDER_HORIZON_MINS: i64 = 60;

/// Background task that reminds participants of events starting soon.
///
/// Runs on an interval, finds events starting within the next hour whose
/// reminder has not fired, fans out to all participants, and marks the
/// event so it is reminded exactly once.
pub async fn run_reminder_loop(db: Arc<Database>, notifier: Notifier, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match send_due_reminders(&db, &notifier).await {
            Ok(count) => {
                if count > 0 {
                    info!("Reminders: notified participants of {} events", count);
                }
            }
            Err(e) => {
                warn!("Reminder run error: {}", e);
            }
        }
    }
}

async fn send_due_reminders(db: &Arc<Database>, notifier: &Notifier) -> anyhow::Result<usize> {
    let now = Utc::now();
    let horizon = now + chrono::Duration::minutes(REMINDER_HORIZON_MINS);

    let lookup = db.clone();
    let due = tokio::task::spawn_blocking(move || lookup.events_due_reminder(now, horizon)).await??;

    let mut reminded = 0;
    for event in due {
        if event.participants.is_empty() {
            // Nothing to fan out, but don't pick the event up again.
            mark_sent(db, &event.id.to_string()).await?;
            continue;
        }

        notifier
            .dispatch(DomainEvent::EventReminder {
                event_id: event.id,
                title: event.title.clone(),
                participants: event.participants.clone(),
            })
            .await?;

        mark_sent(db, &event.id.to_string()).await?;
        reminded += 1;
    }

    Ok(reminded)
}

async fn mark_sent(db: &Arc<Database>, event_id: &str) -> anyhow::Result<()> {
    let db = db.clone();
    let id = event_id.to_string();
    tokio::task::spawn_blocking(move || db.mark_reminder_sent(&id)).await?
}

/// Background task that soft-deletes notifications past the retention
/// window, so they disappear from every active-notification query.
pub async fn run_retention_sweep(db: Arc<Database>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let cutoff = Utc::now() - chrono::Duration::days(RETENTION_DAYS);
        let sweep = db.clone();
        let result =
            tokio::task::spawn_blocking(move || sweep.sweep_notifications_before(cutoff)).await;

        match result {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Retention sweep: removed {} old notifications", count);
                }
            }
            Ok(Err(e)) => warn!("Retention sweep error: {}", e),
            Err(e) => warn!("Retention sweep task panicked: {}", e),
        }
    }
}
