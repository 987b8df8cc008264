use anyhow::{Context, Result};
use rusqlite::Row;

use skillswap_types::models::SharedFile;

use crate::{Database, OptionalExt, parse_ts, parse_uuid, ts};

const FILE_COLUMNS: &str = "id, community_id, channel_id, file_name, content_type, size_bytes, \
     storage_path, url, uploaded_by, description, tags, uploaded_at";

impl Database {
    pub fn insert_file(&self, file: &SharedFile, storage_path: &str) -> Result<()> {
        let tags = serde_json::to_string(&file.tags)?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO files (id, community_id, channel_id, file_name, content_type,
                        size_bytes, storage_path, url, uploaded_by, description, tags, uploaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    file.id.to_string(),
                    file.community_id.to_string(),
                    file.channel_id.map(|id| id.to_string()),
                    file.file_name,
                    file.content_type,
                    file.size_bytes,
                    storage_path,
                    file.url,
                    file.uploaded_by.to_string(),
                    file.description,
                    tags,
                    ts(file.uploaded_at)
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_file(&self, id: &str) -> Result<Option<(SharedFile, String)>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(&format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1"))?
                .query_row([id], file_row)
                .optional()?;
            row.map(into_file).transpose()
        })
    }

    /// Files shared in a community, optionally scoped to one channel,
    /// newest first.
    pub fn community_files(
        &self,
        community_id: &str,
        channel_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<SharedFile>> {
        self.with_conn(|conn| {
            let rows = match channel_id {
                Some(channel_id) => conn
                    .prepare(&format!(
                        "SELECT {FILE_COLUMNS} FROM files
                         WHERE community_id = ?1 AND channel_id = ?2
                         ORDER BY uploaded_at DESC
                         LIMIT ?3"
                    ))?
                    .query_map(rusqlite::params![community_id, channel_id, limit], file_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
                None => conn
                    .prepare(&format!(
                        "SELECT {FILE_COLUMNS} FROM files
                         WHERE community_id = ?1
                         ORDER BY uploaded_at DESC
                         LIMIT ?2"
                    ))?
                    .query_map(rusqlite::params![community_id, limit], file_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            };

            rows.into_iter()
                .map(|row| into_file(row).map(|(file, _)| file))
                .collect()
        })
    }

    pub fn delete_file(&self, id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| Ok(conn.execute("DELETE FROM files WHERE id = ?1", [id])?))
    }

    pub fn count_files(&self) -> Result<u32> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))
                .map_err(Into::into)
        })
    }
}

struct FileRow {
    id: String,
    community_id: String,
    channel_id: Option<String>,
    file_name: String,
    content_type: String,
    size_bytes: u64,
    storage_path: String,
    url: String,
    uploaded_by: String,
    description: String,
    tags: String,
    uploaded_at: String,
}

fn file_row(row: &Row<'_>) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: row.get(0)?,
        community_id: row.get(1)?,
        channel_id: row.get(2)?,
        file_name: row.get(3)?,
        content_type: row.get(4)?,
        size_bytes: row.get(5)?,
        storage_path: row.get(6)?,
        url: row.get(7)?,
        uploaded_by: row.get(8)?,
        description: row.get(9)?,
        tags: row.get(10)?,
        uploaded_at: row.get(11)?,
    })
}

fn into_file(row: FileRow) -> Result<(SharedFile, String)> {
    let file = SharedFile {
        id: parse_uuid(&row.id)?,
        community_id: parse_uuid(&row.community_id)?,
        channel_id: row.channel_id.as_deref().map(parse_uuid).transpose()?,
        file_name: row.file_name,
        content_type: row.content_type,
        size_bytes: row.size_bytes,
        url: row.url,
        uploaded_by: parse_uuid(&row.uploaded_by)?,
        description: row.description,
        tags: serde_json::from_str(&row.tags)
            .with_context(|| format!("bad tags for file {}", row.id))?,
        uploaded_at: parse_ts(&row.uploaded_at)?,
    };
    Ok((file, row.storage_path))
}
