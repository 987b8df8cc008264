use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use skillswap_types::events::Notification;

use crate::models::NotificationRow;
use crate::{Database, parse_ts, parse_uuid, ts};

impl Database {
    pub fn insert_notification(&self, n: &Notification) -> Result<()> {
        let payload = serde_json::to_string(&n.payload)?;
        let kind = n.kind().as_str();

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, recipient_id, kind, title, body, payload,
                        read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
                rusqlite::params![
                    n.id.to_string(),
                    n.recipient_id.to_string(),
                    kind,
                    n.title,
                    n.body,
                    payload,
                    ts(n.created_at)
                ],
            )?;
            Ok(())
        })
    }

    /// Active (non-deleted) notifications, newest first. The cursor is the
    /// (created_at, id) pair of the last row of the previous page.
    pub fn active_notifications(
        &self,
        recipient: Uuid,
        limit: u32,
        cursor: Option<(&str, &str)>,
    ) -> Result<Vec<Notification>> {
        let rid = recipient.to_string();
        self.with_conn(|conn| {
            let rows = match cursor {
                Some((created_at, id)) => conn
                    .prepare(
                        "SELECT id, recipient_id, title, body, payload, read, read_at, created_at
                         FROM notifications
                         WHERE recipient_id = ?1 AND deleted = 0
                           AND (created_at < ?2 OR (created_at = ?2 AND id < ?3))
                         ORDER BY created_at DESC, id DESC
                         LIMIT ?4",
                    )?
                    .query_map(rusqlite::params![rid, created_at, id, limit], notification_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
                None => conn
                    .prepare(
                        "SELECT id, recipient_id, title, body, payload, read, read_at, created_at
                         FROM notifications
                         WHERE recipient_id = ?1 AND deleted = 0
                         ORDER BY created_at DESC, id DESC
                         LIMIT ?2",
                    )?
                    .query_map(rusqlite::params![rid, limit], notification_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            };

            rows.into_iter().map(into_notification).collect()
        })
    }

    pub fn unread_notification_count(&self, recipient: Uuid) -> Result<u32> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM notifications
                 WHERE recipient_id = ?1 AND read = 0 AND deleted = 0",
                [recipient.to_string()],
                |row| row.get(0),
            )
            .map_err(Into::into)
        })
    }

    /// Scoped to the recipient so users cannot mark each other's rows.
    pub fn mark_notification_read(
        &self,
        id: &str,
        recipient: Uuid,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE notifications SET read = 1, read_at = ?3
                 WHERE id = ?1 AND recipient_id = ?2 AND deleted = 0",
                rusqlite::params![id, recipient.to_string(), ts(now)],
            )?)
        })
    }

    pub fn mark_all_notifications_read(&self, recipient: Uuid, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE notifications SET read = 1, read_at = ?2
                 WHERE recipient_id = ?1 AND read = 0 AND deleted = 0",
                rusqlite::params![recipient.to_string(), ts(now)],
            )?)
        })
    }

    pub fn delete_notification(&self, id: &str, recipient: Uuid) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE notifications SET deleted = 1
                 WHERE id = ?1 AND recipient_id = ?2 AND deleted = 0",
                rusqlite::params![id, recipient.to_string()],
            )?)
        })
    }

    pub fn delete_all_notifications(&self, recipient: Uuid) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE notifications SET deleted = 1
                 WHERE recipient_id = ?1 AND deleted = 0",
                [recipient.to_string()],
            )?)
        })
    }

    /// Retention sweep: soft-delete everything created before the cutoff.
    pub fn sweep_notifications_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE notifications SET deleted = 1
                 WHERE created_at < ?1 AND deleted = 0",
                [ts(cutoff)],
            )?)
        })
    }
}

fn notification_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        recipient_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        payload: row.get(4)?,
        read: row.get(5)?,
        read_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn into_notification(row: NotificationRow) -> Result<Notification> {
    Ok(Notification {
        id: parse_uuid(&row.id)?,
        recipient_id: parse_uuid(&row.recipient_id)?,
        title: row.title,
        body: row.body,
        payload: serde_json::from_str(&row.payload)
            .with_context(|| format!("bad notification payload for {}", row.id))?,
        read: row.read,
        read_at: row.read_at.as_deref().map(parse_ts).transpose()?,
        created_at: parse_ts(&row.created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use skillswap_types::events::NotificationPayload;

    fn notification(n: u128, recipient: Uuid, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::from_u128(n),
            recipient_id: recipient,
            title: "New Match Found!".into(),
            body: "You have a 75% match".into(),
            payload: NotificationPayload::NewMatch {
                matched_user_id: Uuid::from_u128(99),
                score: 75,
            },
            read: false,
            read_at: None,
            created_at,
        }
    }

    fn db_with_user(recipient: Uuid) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user(
            &recipient.to_string(),
            "u@example.com",
            "User",
            "hash",
            Utc::now(),
        )
        .unwrap();
        db
    }

    #[test]
    fn sweep_excludes_old_rows_from_active_queries() {
        let recipient = Uuid::from_u128(1);
        let db = db_with_user(recipient);
        let now = Utc::now();

        db.insert_notification(&notification(10, recipient, now - Duration::days(31)))
            .unwrap();
        db.insert_notification(&notification(11, recipient, now - Duration::days(2)))
            .unwrap();

        let swept = db
            .sweep_notifications_before(now - Duration::days(30))
            .unwrap();
        assert_eq!(swept, 1);

        let active = db.active_notifications(recipient, 50, None).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, Uuid::from_u128(11));
    }

    #[test]
    fn read_state_transitions_and_counts() {
        let recipient = Uuid::from_u128(1);
        let db = db_with_user(recipient);
        let now = Utc::now();

        db.insert_notification(&notification(10, recipient, now)).unwrap();
        db.insert_notification(&notification(11, recipient, now)).unwrap();
        assert_eq!(db.unread_notification_count(recipient).unwrap(), 2);

        let id = Uuid::from_u128(10).to_string();
        assert_eq!(db.mark_notification_read(&id, recipient, now).unwrap(), 1);
        assert_eq!(db.unread_notification_count(recipient).unwrap(), 1);

        // Wrong recipient cannot touch the row.
        assert_eq!(
            db.mark_notification_read(&id, Uuid::from_u128(2), now).unwrap(),
            0
        );

        assert_eq!(db.mark_all_notifications_read(recipient, now).unwrap(), 1);
        assert_eq!(db.unread_notification_count(recipient).unwrap(), 0);

        let payload_roundtrip = db.active_notifications(recipient, 50, None).unwrap();
        assert!(matches!(
            payload_roundtrip[0].payload,
            NotificationPayload::NewMatch { score: 75, .. }
        ));
    }
}
