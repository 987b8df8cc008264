use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use skillswap_types::models::{Channel, ChannelMessage, Community};

use crate::{Database, OptionalExt, parse_ts, parse_uuid, ts};

const COMMUNITY_COLUMNS: &str = "c.id, c.name, c.description, c.topic, c.icon, c.created_by, \
     (SELECT COUNT(*) FROM community_members m WHERE m.community_id = c.id), c.created_at";

impl Database {
    /// Create a community with the creator as first member and a default
    /// `general` channel, all in one transaction.
    pub fn create_community(
        &self,
        id: &str,
        name: &str,
        description: &str,
        topic: &str,
        icon: &str,
        created_by: &str,
        general_channel_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO communities (id, name, description, topic, icon, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![id, name, description, topic, icon, created_by, ts(now)],
            )?;
            tx.execute(
                "INSERT INTO community_members (community_id, user_id, joined_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![id, created_by, ts(now)],
            )?;
            tx.execute(
                "INSERT INTO community_channels (id, community_id, name, description, created_at)
                 VALUES (?1, ?2, 'general', 'General discussion', ?3)",
                rusqlite::params![general_channel_id, id, ts(now)],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_community(&self, id: &str) -> Result<Option<Community>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(&format!(
                    "SELECT {COMMUNITY_COLUMNS} FROM communities c WHERE c.id = ?1"
                ))?
                .query_row([id], community_row)
                .optional()?;
            row.map(into_community).transpose()
        })
    }

    /// Largest communities first.
    pub fn list_communities(&self, limit: u32) -> Result<Vec<Community>> {
        self.with_conn(|conn| {
            let rows = conn
                .prepare(&format!(
                    "SELECT {COMMUNITY_COLUMNS} FROM communities c
                     ORDER BY 7 DESC, c.created_at DESC
                     LIMIT ?1"
                ))?
                .query_map([limit], community_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(into_community).collect()
        })
    }

    pub fn user_communities(&self, user_id: &str) -> Result<Vec<Community>> {
        self.with_conn(|conn| {
            let rows = conn
                .prepare(&format!(
                    "SELECT {COMMUNITY_COLUMNS} FROM communities c
                     JOIN community_members m ON m.community_id = c.id
                     WHERE m.user_id = ?1
                     ORDER BY c.created_at DESC"
                ))?
                .query_map([user_id], community_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(into_community).collect()
        })
    }

    pub fn community_members(&self, id: &str) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let rows = conn
                .prepare(
                    "SELECT user_id FROM community_members
                     WHERE community_id = ?1 ORDER BY joined_at",
                )?
                .query_map([id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.iter().map(|s| parse_uuid(s)).collect()
        })
    }

    /// Returns true if the user was newly added.
    pub fn add_member(&self, community_id: &str, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO community_members (community_id, user_id, joined_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![community_id, user_id, ts(now)],
            )?;
            Ok(changed > 0)
        })
    }

    /// Returns true if the user was a member.
    pub fn remove_member(&self, community_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM community_members WHERE community_id = ?1 AND user_id = ?2",
                [community_id, user_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn is_member(&self, community_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM community_members WHERE community_id = ?1 AND user_id = ?2",
                    [community_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    // -- Channels --

    pub fn create_channel(
        &self,
        id: &str,
        community_id: &str,
        name: &str,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO community_channels (id, community_id, name, description, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, community_id, name, description, ts(now)],
            )?;
            Ok(())
        })
    }

    pub fn channels(&self, community_id: &str) -> Result<Vec<Channel>> {
        self.with_conn(|conn| {
            let rows = conn
                .prepare(
                    "SELECT id, community_id, name, description, created_at
                     FROM community_channels WHERE community_id = ?1
                     ORDER BY created_at",
                )?
                .query_map([community_id], channel_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(into_channel).collect()
        })
    }

    pub fn get_channel(&self, id: &str) -> Result<Option<Channel>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(
                    "SELECT id, community_id, name, description, created_at
                     FROM community_channels WHERE id = ?1",
                )?
                .query_row([id], channel_row)
                .optional()?;
            row.map(into_channel).transpose()
        })
    }

    pub fn insert_channel_message(
        &self,
        id: &str,
        channel_id: &str,
        author_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO channel_messages (id, channel_id, author_id, text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, channel_id, author_id, text, ts(now)],
            )?;
            Ok(())
        })
    }

    /// Latest `limit` messages, returned oldest-first for display.
    pub fn channel_messages(&self, channel_id: &str, limit: u32) -> Result<Vec<ChannelMessage>> {
        self.with_conn(|conn| {
            let mut rows = conn
                .prepare(
                    "SELECT id, channel_id, author_id, text, created_at
                     FROM channel_messages WHERE channel_id = ?1
                     ORDER BY created_at DESC
                     LIMIT ?2",
                )?
                .query_map(rusqlite::params![channel_id, limit], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.reverse();

            rows.into_iter()
                .map(|(id, channel_id, author_id, text, created_at)| {
                    Ok(ChannelMessage {
                        id: parse_uuid(&id)?,
                        channel_id: parse_uuid(&channel_id)?,
                        author_id: parse_uuid(&author_id)?,
                        text,
                        created_at: parse_ts(&created_at)?,
                    })
                })
                .collect()
        })
    }

    pub fn count_communities(&self) -> Result<u32> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM communities", [], |row| row.get(0))
                .map_err(Into::into)
        })
    }
}

struct CommunityRow {
    id: String,
    name: String,
    description: String,
    topic: String,
    icon: String,
    created_by: String,
    member_count: u32,
    created_at: String,
}

fn community_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommunityRow> {
    Ok(CommunityRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        topic: row.get(3)?,
        icon: row.get(4)?,
        created_by: row.get(5)?,
        member_count: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn into_community(row: CommunityRow) -> Result<Community> {
    Ok(Community {
        id: parse_uuid(&row.id)?,
        name: row.name,
        description: row.description,
        topic: row.topic,
        icon: row.icon,
        created_by: parse_uuid(&row.created_by)?,
        member_count: row.member_count,
        created_at: parse_ts(&row.created_at)?,
    })
}

fn channel_row(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<(String, String, String, String, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn into_channel(row: (String, String, String, String, String)) -> Result<Channel> {
    let (id, community_id, name, description, created_at) = row;
    Ok(Channel {
        id: parse_uuid(&id)?,
        community_id: parse_uuid(&community_id)?,
        name,
        description,
        created_at: parse_ts(&created_at)?,
    })
}
