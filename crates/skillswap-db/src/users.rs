use std::collections::HashMap;

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;

use skillswap_types::models::{AccountStatus, Role, Streak, UserProfile};

use crate::models::{UserAuthRow, UserBaseRow};
use crate::{Database, OptionalExt, parse_ts, parse_uuid, ts};

const BASE_COLUMNS: &str = "id, email, display_name, photo_url, bio, role, status, \
     streak_count, streak_last_active, created_at";

impl Database {
    // -- Accounts --

    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        display_name: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, display_name, password, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![id, email, display_name, password_hash, ts(now)],
            )?;
            Ok(())
        })
    }

    pub fn get_auth_by_email(&self, email: &str) -> Result<Option<UserAuthRow>> {
        self.with_conn(|conn| {
            conn.prepare(
                "SELECT id, display_name, role, status, password FROM users WHERE email = ?1",
            )?
            .query_row([email], |row| {
                Ok(UserAuthRow {
                    id: row.get(0)?,
                    display_name: row.get(1)?,
                    role: row.get(2)?,
                    status: row.get(3)?,
                    password: row.get(4)?,
                })
            })
            .optional()
        })
    }

    pub fn record_login(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET last_login_at = ?2 WHERE id = ?1",
                rusqlite::params![id, ts(now)],
            )?;
            Ok(())
        })
    }

    // -- Profiles --

    pub fn get_user(&self, id: &str) -> Result<Option<UserProfile>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(&format!("SELECT {BASE_COLUMNS} FROM users WHERE id = ?1"))?
                .query_row([id], base_row)
                .optional()?;

            match row {
                Some(row) => Ok(load_profiles(conn, vec![row])?.pop()),
                None => Ok(None),
            }
        })
    }

    pub fn update_profile(
        &self,
        id: &str,
        display_name: Option<&str>,
        bio: Option<&str>,
        photo_url: Option<&str>,
        push_token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let mut sets = vec!["updated_at = ?2".to_string()];
            let mut params: Vec<Box<dyn rusqlite::types::ToSql>> =
                vec![Box::new(id.to_string()), Box::new(ts(now))];

            for (column, value) in [
                ("display_name", display_name),
                ("bio", bio),
                ("photo_url", photo_url),
                ("push_token", push_token),
            ] {
                if let Some(value) = value {
                    params.push(Box::new(value.to_string()));
                    sets.push(format!("{column} = ?{}", params.len()));
                }
            }

            let sql = format!("UPDATE users SET {} WHERE id = ?1", sets.join(", "));
            let refs: Vec<&dyn rusqlite::types::ToSql> =
                params.iter().map(|p| p.as_ref()).collect();
            Ok(conn.execute(&sql, refs.as_slice())?)
        })
    }

    pub fn set_skills(&self, id: &str, topics: &[String]) -> Result<()> {
        self.replace_topics("user_skills", id, topics)
    }

    pub fn set_needs(&self, id: &str, topics: &[String]) -> Result<()> {
        self.replace_topics("user_needs", id, topics)
    }

    fn replace_topics(&self, table: &str, id: &str, topics: &[String]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(&format!("DELETE FROM {table} WHERE user_id = ?1"), [id])?;
            {
                let mut stmt =
                    tx.prepare(&format!("INSERT OR IGNORE INTO {table} (user_id, topic) VALUES (?1, ?2)"))?;
                for topic in topics {
                    stmt.execute(rusqlite::params![id, topic])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn block_user(&self, user_id: &str, blocked_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO user_blocks (user_id, blocked_id) VALUES (?1, ?2)",
                [user_id, blocked_id],
            )?;
            Ok(())
        })
    }

    pub fn unblock_user(&self, user_id: &str, blocked_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM user_blocks WHERE user_id = ?1 AND blocked_id = ?2",
                [user_id, blocked_id],
            )?;
            Ok(())
        })
    }

    pub fn set_streak(&self, id: &str, count: u32, last_active: NaiveDate) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET streak_count = ?2, streak_last_active = ?3 WHERE id = ?1",
                rusqlite::params![id, count, last_active.to_string()],
            )?;
            Ok(())
        })
    }

    pub fn push_token(&self, id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let token: Option<Option<String>> = conn
                .query_row("SELECT push_token FROM users WHERE id = ?1", [id], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(token.flatten())
        })
    }

    // -- Discovery --

    /// Users whose skills or needs contain `topic`.
    pub fn search_by_topic(&self, topic: &str, limit: u32) -> Result<Vec<UserProfile>> {
        self.with_conn(|conn| {
            let rows = conn
                .prepare(&format!(
                    "SELECT {BASE_COLUMNS} FROM users
                     WHERE status = 'active' AND id IN (
                         SELECT user_id FROM user_skills WHERE topic = ?1
                         UNION
                         SELECT user_id FROM user_needs WHERE topic = ?1
                     )
                     ORDER BY created_at DESC
                     LIMIT ?2"
                ))?
                .query_map(rusqlite::params![topic, limit], base_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            load_profiles(conn, rows)
        })
    }

    /// One page of the discovery listing, newest first. The cursor is the
    /// (created_at, id) pair of the last row of the previous page.
    pub fn list_users(
        &self,
        limit: u32,
        cursor: Option<(&str, &str)>,
    ) -> Result<Vec<UserProfile>> {
        self.with_conn(|conn| {
            let rows = match cursor {
                Some((created_at, id)) => conn
                    .prepare(&format!(
                        "SELECT {BASE_COLUMNS} FROM users
                         WHERE created_at < ?1 OR (created_at = ?1 AND id < ?2)
                         ORDER BY created_at DESC, id DESC
                         LIMIT ?3"
                    ))?
                    .query_map(rusqlite::params![created_at, id, limit], base_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
                None => conn
                    .prepare(&format!(
                        "SELECT {BASE_COLUMNS} FROM users
                         ORDER BY created_at DESC, id DESC
                         LIMIT ?1"
                    ))?
                    .query_map([limit], base_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            };

            load_profiles(conn, rows)
        })
    }

    /// Candidate pool for matching. Active accounts only.
    pub fn all_users(&self, limit: u32) -> Result<Vec<UserProfile>> {
        self.with_conn(|conn| {
            let rows = conn
                .prepare(&format!(
                    "SELECT {BASE_COLUMNS} FROM users WHERE status = 'active' LIMIT ?1"
                ))?
                .query_map([limit], base_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            load_profiles(conn, rows)
        })
    }

    // -- Moderation --

    pub fn set_role(&self, id: &str, role: &str, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE users SET role = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id, role, ts(now)],
            )?)
        })
    }

    pub fn ban_user(&self, id: &str, reason: &str, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE users SET status = 'banned', ban_reason = ?2, banned_at = ?3,
                        updated_at = ?3
                 WHERE id = ?1",
                rusqlite::params![id, reason, ts(now)],
            )?)
        })
    }

    pub fn unban_user(&self, id: &str, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE users SET status = 'active', ban_reason = NULL, banned_at = NULL,
                        updated_at = ?2
                 WHERE id = ?1",
                rusqlite::params![id, ts(now)],
            )?)
        })
    }

    /// (total, active within the last 7 days, admins, banned).
    pub fn user_stats(&self, active_since: DateTime<Utc>) -> Result<(u32, u32, u32, u32)> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*),
                        COUNT(CASE WHEN last_login_at >= ?1 THEN 1 END),
                        COUNT(CASE WHEN role = 'admin' THEN 1 END),
                        COUNT(CASE WHEN status = 'banned' THEN 1 END)
                 FROM users",
                [ts(active_since)],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .map_err(Into::into)
        })
    }
}

fn base_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserBaseRow> {
    Ok(UserBaseRow {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        photo_url: row.get(3)?,
        bio: row.get(4)?,
        role: row.get(5)?,
        status: row.get(6)?,
        streak_count: row.get(7)?,
        streak_last_active: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Assemble full profiles from base rows, batch-fetching the skills, needs
/// and blocked sets in one IN query per table instead of per-user lookups.
pub(crate) fn load_profiles(
    conn: &Connection,
    rows: Vec<UserBaseRow>,
) -> Result<Vec<UserProfile>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut skills = topic_map(conn, "user_skills", &ids)?;
    let mut needs = topic_map(conn, "user_needs", &ids)?;
    let mut blocks = block_map(conn, &ids)?;

    rows.into_iter()
        .map(|row| {
            let streak_last_active = row
                .streak_last_active
                .as_deref()
                .map(|d| {
                    d.parse::<NaiveDate>()
                        .map_err(|e| anyhow!("bad streak date '{}': {}", d, e))
                })
                .transpose()?;

            Ok(UserProfile {
                id: parse_uuid(&row.id)?,
                email: row.email,
                display_name: row.display_name,
                photo_url: row.photo_url,
                bio: row.bio,
                skills: skills.remove(&row.id).unwrap_or_default(),
                needs: needs.remove(&row.id).unwrap_or_default(),
                blocked: blocks.remove(&row.id).unwrap_or_default(),
                role: parse_role(&row.role)?,
                status: parse_status(&row.status)?,
                streak: Streak {
                    count: row.streak_count,
                    last_active: streak_last_active,
                },
                created_at: parse_ts(&row.created_at)?,
            })
        })
        .collect()
}

fn topic_map(
    conn: &Connection,
    table: &str,
    ids: &[String],
) -> Result<HashMap<String, Vec<String>>> {
    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "SELECT user_id, topic FROM {table} WHERE user_id IN ({}) ORDER BY topic",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::types::ToSql> =
        ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();

    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    let rows = stmt.query_map(params.as_slice(), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (user_id, topic) = row?;
        map.entry(user_id).or_default().push(topic);
    }
    Ok(map)
}

fn block_map(conn: &Connection, ids: &[String]) -> Result<HashMap<String, Vec<uuid::Uuid>>> {
    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "SELECT user_id, blocked_id FROM user_blocks WHERE user_id IN ({})",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::types::ToSql> =
        ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();

    let mut map: HashMap<String, Vec<uuid::Uuid>> = HashMap::new();
    let rows = stmt.query_map(params.as_slice(), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (user_id, blocked_id) = row?;
        map.entry(user_id).or_default().push(parse_uuid(&blocked_id)?);
    }
    Ok(map)
}

pub(crate) fn parse_role(s: &str) -> Result<Role> {
    match s {
        "user" => Ok(Role::User),
        "admin" => Ok(Role::Admin),
        other => Err(anyhow!("unknown role '{}'", other)),
    }
}

pub(crate) fn parse_status(s: &str) -> Result<AccountStatus> {
    match s {
        "active" => Ok(AccountStatus::Active),
        "banned" => Ok(AccountStatus::Banned),
        other => Err(anyhow!("unknown account status '{}'", other)),
    }
}
