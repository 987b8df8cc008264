use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use skillswap_types::models::{Chat, ChatMessage, FileAttachment};

use crate::{Database, OptionalExt, parse_ts, parse_uuid, ts};

impl Database {
    /// The direct chat shared by the pair, if one exists.
    pub fn find_chat_between(&self, a: Uuid, b: Uuid) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.prepare(
                "SELECT chat_id FROM chat_participants WHERE user_id = ?1
                 INTERSECT
                 SELECT chat_id FROM chat_participants WHERE user_id = ?2",
            )?
            .query_row([a.to_string(), b.to_string()], |row| row.get(0))
            .optional()
        })
    }

    pub fn create_chat(&self, id: &str, a: Uuid, b: Uuid, now: DateTime<Utc>) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO chats (id, created_at) VALUES (?1, ?2)",
                rusqlite::params![id, ts(now)],
            )?;
            for user in [a, b] {
                tx.execute(
                    "INSERT INTO chat_participants (chat_id, user_id) VALUES (?1, ?2)",
                    rusqlite::params![id, user.to_string()],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_chat(&self, id: &str, for_user: Uuid) -> Result<Option<Chat>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(
                    "SELECT c.id, c.last_message, c.last_message_at, c.created_at,
                            (SELECT unread_count FROM chat_participants
                              WHERE chat_id = c.id AND user_id = ?2)
                     FROM chats c WHERE c.id = ?1",
                )?
                .query_row(rusqlite::params![id, for_user.to_string()], chat_row)
                .optional()?;

            match row {
                Some(row) => Ok(Some(into_chat(conn, row)?)),
                None => Ok(None),
            }
        })
    }

    /// All chats the user participates in, most recent activity first.
    pub fn user_chats(&self, user_id: Uuid) -> Result<Vec<Chat>> {
        self.with_conn(|conn| {
            let rows = conn
                .prepare(
                    "SELECT c.id, c.last_message, c.last_message_at, c.created_at, p.unread_count
                     FROM chats c
                     JOIN chat_participants p ON p.chat_id = c.id
                     WHERE p.user_id = ?1
                     ORDER BY c.last_message_at IS NULL, c.last_message_at DESC",
                )?
                .query_map([user_id.to_string()], chat_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(|row| into_chat(conn, row)).collect()
        })
    }

    pub fn chat_participants(&self, chat_id: &str) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| participants(conn, chat_id))
    }

    /// Insert the message, refresh the chat's denormalised preview and bump
    /// the unread count of every other participant, atomically.
    pub fn insert_chat_message(
        &self,
        id: &str,
        chat_id: &str,
        sender_id: Uuid,
        text: &str,
        file: Option<&FileAttachment>,
        preview: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO chat_messages (id, chat_id, sender_id, text, file_url, file_name,
                        file_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    id,
                    chat_id,
                    sender_id.to_string(),
                    text,
                    file.map(|f| f.url.as_str()),
                    file.map(|f| f.file_name.as_str()),
                    file.map(|f| f.content_type.as_str()),
                    ts(now)
                ],
            )?;
            tx.execute(
                "UPDATE chats SET last_message = ?2, last_message_at = ?3 WHERE id = ?1",
                rusqlite::params![chat_id, preview, ts(now)],
            )?;
            tx.execute(
                "UPDATE chat_participants SET unread_count = unread_count + 1
                 WHERE chat_id = ?1 AND user_id != ?2",
                rusqlite::params![chat_id, sender_id.to_string()],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Newest messages first. Cursor-based pagination: pass the `created_at`
    /// of the oldest message from the previous page to fetch older ones.
    pub fn chat_messages(
        &self,
        chat_id: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<ChatMessage>> {
        self.with_conn(|conn| {
            let rows = match before {
                Some(before) => conn
                    .prepare(
                        "SELECT id, chat_id, sender_id, text, file_url, file_name, file_type,
                                created_at
                         FROM chat_messages
                         WHERE chat_id = ?1 AND created_at < ?2
                         ORDER BY created_at DESC
                         LIMIT ?3",
                    )?
                    .query_map(rusqlite::params![chat_id, before, limit], message_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
                None => conn
                    .prepare(
                        "SELECT id, chat_id, sender_id, text, file_url, file_name, file_type,
                                created_at
                         FROM chat_messages
                         WHERE chat_id = ?1
                         ORDER BY created_at DESC
                         LIMIT ?2",
                    )?
                    .query_map(rusqlite::params![chat_id, limit], message_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            };

            rows.into_iter().map(into_message).collect()
        })
    }

    pub fn mark_chat_read(&self, chat_id: &str, user_id: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE chat_participants SET unread_count = 0
                 WHERE chat_id = ?1 AND user_id = ?2",
                rusqlite::params![chat_id, user_id.to_string()],
            )?;
            Ok(())
        })
    }

    /// Sum of unread counts across all of the user's chats.
    pub fn total_unread(&self, user_id: Uuid) -> Result<u32> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COALESCE(SUM(unread_count), 0) FROM chat_participants
                 WHERE user_id = ?1",
                [user_id.to_string()],
                |row| row.get(0),
            )
            .map_err(Into::into)
        })
    }
}

struct ChatRow {
    id: String,
    last_message: Option<String>,
    last_message_at: Option<String>,
    created_at: String,
    unread_count: Option<u32>,
}

fn chat_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatRow> {
    Ok(ChatRow {
        id: row.get(0)?,
        last_message: row.get(1)?,
        last_message_at: row.get(2)?,
        created_at: row.get(3)?,
        unread_count: row.get(4)?,
    })
}

fn participants(conn: &Connection, chat_id: &str) -> Result<Vec<Uuid>> {
    let rows = conn
        .prepare("SELECT user_id FROM chat_participants WHERE chat_id = ?1 ORDER BY user_id")?
        .query_map([chat_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    rows.iter().map(|s| parse_uuid(s)).collect()
}

fn into_chat(conn: &Connection, row: ChatRow) -> Result<Chat> {
    Ok(Chat {
        id: parse_uuid(&row.id)?,
        participants: participants(conn, &row.id)?,
        last_message: row.last_message,
        last_message_at: row.last_message_at.as_deref().map(parse_ts).transpose()?,
        unread_count: row.unread_count.unwrap_or(0),
        created_at: parse_ts(&row.created_at)?,
    })
}

struct MessageRow {
    id: String,
    chat_id: String,
    sender_id: String,
    text: String,
    file_url: Option<String>,
    file_name: Option<String>,
    file_type: Option<String>,
    created_at: String,
}

fn message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        sender_id: row.get(2)?,
        text: row.get(3)?,
        file_url: row.get(4)?,
        file_name: row.get(5)?,
        file_type: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn into_message(row: MessageRow) -> Result<ChatMessage> {
    let file = match (row.file_url, row.file_name, row.file_type) {
        (Some(url), Some(file_name), Some(content_type)) => Some(FileAttachment {
            url,
            file_name,
            content_type,
        }),
        _ => None,
    };

    Ok(ChatMessage {
        id: parse_uuid(&row.id)?,
        chat_id: parse_uuid(&row.chat_id)?,
        sender_id: parse_uuid(&row.sender_id)?,
        text: row.text,
        file,
        created_at: parse_ts(&row.created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn unread_counts_track_sends_and_reads() {
        let db = db_with_users(2);
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let chat_id = Uuid::from_u128(100).to_string();
        db.create_chat(&chat_id, a, b, Utc::now()).unwrap();

        db.insert_chat_message(
            &Uuid::from_u128(200).to_string(),
            &chat_id,
            a,
            "hi",
            None,
            "hi",
            Utc::now(),
        )
        .unwrap();
        db.insert_chat_message(
            &Uuid::from_u128(201).to_string(),
            &chat_id,
            a,
            "there",
            None,
            "there",
            Utc::now(),
        )
        .unwrap();

        assert_eq!(db.total_unread(b).unwrap(), 2);
        assert_eq!(db.total_unread(a).unwrap(), 0);

        db.mark_chat_read(&chat_id, b).unwrap();
        assert_eq!(db.total_unread(b).unwrap(), 0);

        let chat = db.get_chat(&chat_id, b).unwrap().unwrap();
        assert_eq!(chat.last_message.as_deref(), Some("there"));
    }

    #[test]
    fn find_chat_between_matches_the_pair_only() {
        let db = db_with_users(3);
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let c = Uuid::from_u128(3);

        let ab = Uuid::from_u128(100).to_string();
        db.create_chat(&ab, a, b, Utc::now()).unwrap();

        assert_eq!(db.find_chat_between(a, b).unwrap(), Some(ab.clone()));
        assert_eq!(db.find_chat_between(b, a).unwrap(), Some(ab));
        assert_eq!(db.find_chat_between(a, c).unwrap(), None);
    }
}
