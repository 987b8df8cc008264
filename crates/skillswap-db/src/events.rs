use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use skillswap_types::models::Event;

use crate::{Database, OptionalExt, parse_ts, parse_uuid, ts};

/// Outcome of a transactional RSVP attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyJoined,
    Full,
    NotFound,
}

const EVENT_COLUMNS: &str = "id, title, description, topic, community_id, created_by, \
     start_time, end_time, max_participants, created_at";

impl Database {
    pub fn create_event(
        &self,
        id: &str,
        title: &str,
        description: &str,
        topic: &str,
        community_id: Option<&str>,
        created_by: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        max_participants: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO events (id, title, description, topic, community_id, created_by,
                        start_time, end_time, max_participants, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    id,
                    title,
                    description,
                    topic,
                    community_id,
                    created_by,
                    ts(start_time),
                    ts(end_time),
                    max_participants,
                    ts(now)
                ],
            )?;
            // The creator attends their own event.
            tx.execute(
                "INSERT INTO event_participants (event_id, user_id, joined_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![id, created_by, ts(now)],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_event(&self, id: &str) -> Result<Option<Event>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"))?
                .query_row([id], event_row)
                .optional()?;

            match row {
                Some(row) => Ok(Some(into_event(conn, row)?)),
                None => Ok(None),
            }
        })
    }

    pub fn upcoming_events(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<Event>> {
        self.with_conn(|conn| {
            let rows = conn
                .prepare(&format!(
                    "SELECT {EVENT_COLUMNS} FROM events
                     WHERE start_time >= ?1
                     ORDER BY start_time ASC
                     LIMIT ?2"
                ))?
                .query_map(rusqlite::params![ts(now), limit], event_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(|row| into_event(conn, row)).collect()
        })
    }

    pub fn user_events(&self, user_id: &str) -> Result<Vec<Event>> {
        self.with_conn(|conn| {
            let rows = conn
                .prepare(&format!(
                    "SELECT {EVENT_COLUMNS} FROM events
                     WHERE id IN (SELECT event_id FROM event_participants WHERE user_id = ?1)
                     ORDER BY start_time ASC"
                ))?
                .query_map([user_id], event_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(|row| into_event(conn, row)).collect()
        })
    }

    /// RSVP with the capacity check inside the transaction, so a full event
    /// cannot be oversubscribed by racing joins.
    pub fn try_join_event(
        &self,
        event_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<JoinOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let max: Option<Option<u32>> = tx
                .query_row(
                    "SELECT max_participants FROM events WHERE id = ?1",
                    [event_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(max) = max else {
                return Ok(JoinOutcome::NotFound);
            };

            let already: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM event_participants WHERE event_id = ?1 AND user_id = ?2",
                    [event_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            if already.is_some() {
                return Ok(JoinOutcome::AlreadyJoined);
            }

            if let Some(max) = max {
                let count: u32 = tx.query_row(
                    "SELECT COUNT(*) FROM event_participants WHERE event_id = ?1",
                    [event_id],
                    |row| row.get(0),
                )?;
                if count >= max {
                    return Ok(JoinOutcome::Full);
                }
            }

            tx.execute(
                "INSERT INTO event_participants (event_id, user_id, joined_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![event_id, user_id, ts(now)],
            )?;
            tx.commit()?;
            Ok(JoinOutcome::Joined)
        })
    }

    /// Returns true if the user was attending.
    pub fn leave_event(&self, event_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM event_participants WHERE event_id = ?1 AND user_id = ?2",
                [event_id, user_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_event(&self, id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM event_participants WHERE event_id = ?1", [id])?;
            let deleted = tx.execute("DELETE FROM events WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(deleted)
        })
    }

    /// Events starting inside the window whose reminder has not fired yet.
    pub fn events_due_reminder(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        self.with_conn(|conn| {
            let rows = conn
                .prepare(&format!(
                    "SELECT {EVENT_COLUMNS} FROM events
                     WHERE start_time >= ?1 AND start_time <= ?2 AND reminder_sent = 0
                     ORDER BY start_time ASC"
                ))?
                .query_map(rusqlite::params![ts(from), ts(until)], event_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(|row| into_event(conn, row)).collect()
        })
    }

    pub fn mark_reminder_sent(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("UPDATE events SET reminder_sent = 1 WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    pub fn count_events(&self) -> Result<u32> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
                .map_err(Into::into)
        })
    }
}

struct EventRow {
    id: String,
    title: String,
    description: String,
    topic: String,
    community_id: Option<String>,
    created_by: String,
    start_time: String,
    end_time: String,
    max_participants: Option<u32>,
    created_at: String,
}

fn event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        topic: row.get(3)?,
        community_id: row.get(4)?,
        created_by: row.get(5)?,
        start_time: row.get(6)?,
        end_time: row.get(7)?,
        max_participants: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn into_event(conn: &Connection, row: EventRow) -> Result<Event> {
    let participants: Vec<Uuid> = conn
        .prepare(
            "SELECT user_id FROM event_participants WHERE event_id = ?1 ORDER BY joined_at",
        )?
        .query_map([&row.id], |r| r.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?
        .iter()
        .map(|s| parse_uuid(s))
        .collect::<Result<_>>()?;

    Ok(Event {
        id: parse_uuid(&row.id)?,
        title: row.title,
        description: row.description,
        topic: row.topic,
        community_id: row.community_id.as_deref().map(parse_uuid).transpose()?,
        created_by: parse_uuid(&row.created_by)?,
        start_time: parse_ts(&row.start_time)?,
        end_time: parse_ts(&row.end_time)?,
        max_participants: row.max_participants,
        participants,
        created_at: parse_ts(&row.created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn db_with_users(n: u128) -> Database {
        let db = Database::open_in_memory().unwrap();
        for i in 1..=n {
            db.create_user(
                &Uuid::from_u128(i).to_string(),
                &format!("u{i}@example.com"),
                &format!("User {i}"),
                "hash",
                Utc::now(),
            )
            .unwrap();
        }
        db
    }

    #[test]
    fn capacity_is_enforced_in_the_join_transaction() {
        let db = db_with_users(3);
        let creator = Uuid::from_u128(1).to_string();
        let event_id = Uuid::from_u128(100).to_string();
        let now = Utc::now();

        db.create_event(
            &event_id,
            "Study jam",
            "",
            "math",
            None,
            &creator,
            now + Duration::hours(2),
            now + Duration::hours(3),
            Some(2),
            now,
        )
        .unwrap();

        let u2 = Uuid::from_u128(2).to_string();
        let u3 = Uuid::from_u128(3).to_string();
        assert_eq!(db.try_join_event(&event_id, &u2, now).unwrap(), JoinOutcome::Joined);
        assert_eq!(
            db.try_join_event(&event_id, &u2, now).unwrap(),
            JoinOutcome::AlreadyJoined
        );
        assert_eq!(db.try_join_event(&event_id, &u3, now).unwrap(), JoinOutcome::Full);
    }

    #[test]
    fn reminder_window_skips_already_reminded_events() {
        let db = db_with_users(1);
        let creator = Uuid::from_u128(1).to_string();
        let now = Utc::now();

        let soon = Uuid::from_u128(100).to_string();
        let later = Uuid::from_u128(101).to_string();
        db.create_event(
            &soon, "Soon", "", "math", None, &creator,
            now + Duration::minutes(30), now + Duration::minutes(90), None, now,
        )
        .unwrap();
        db.create_event(
            &later, "Later", "", "math", None, &creator,
            now + Duration::hours(5), now + Duration::hours(6), None, now,
        )
        .unwrap();

        let due = db.events_due_reminder(now, now + Duration::hours(1)).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].title, "Soon");

        db.mark_reminder_sent(&soon).unwrap();
        let due = db.events_due_reminder(now, now + Duration::hours(1)).unwrap();
        assert!(due.is_empty());
    }
}
