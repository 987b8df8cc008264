use anyhow::Result;
use chrono::{DateTime, Utc};

use skillswap_types::models::{Report, ReportStatus};

use crate::{Database, parse_ts, parse_uuid, ts};

impl Database {
    pub fn insert_report(
        &self,
        id: &str,
        reporter_id: &str,
        subject_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO reports (id, reporter_id, subject_id, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, reporter_id, subject_id, reason, ts(now)],
            )?;
            Ok(())
        })
    }

    /// Reports newest first, optionally filtered by status.
    pub fn list_reports(&self, status: Option<ReportStatus>, limit: u32) -> Result<Vec<Report>> {
        self.with_conn(|conn| {
            let rows = match status {
                Some(status) => conn
                    .prepare(
                        "SELECT id, reporter_id, subject_id, reason, status, admin_notes,
                                reviewed_at, created_at
                         FROM reports WHERE status = ?1
                         ORDER BY created_at DESC LIMIT ?2",
                    )?
                    .query_map(rusqlite::params![status_str(status), limit], report_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
                None => conn
                    .prepare(
                        "SELECT id, reporter_id, subject_id, reason, status, admin_notes,
                                reviewed_at, created_at
                         FROM reports ORDER BY created_at DESC LIMIT ?1",
                    )?
                    .query_map([limit], report_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            };

            rows.into_iter().map(into_report).collect()
        })
    }

    pub fn update_report(
        &self,
        id: &str,
        status: ReportStatus,
        admin_notes: &str,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE reports SET status = ?2, admin_notes = ?3, reviewed_at = ?4
                 WHERE id = ?1",
                rusqlite::params![id, status_str(status), admin_notes, ts(now)],
            )?)
        })
    }

    pub fn pending_report_count(&self) -> Result<u32> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM reports WHERE status = 'pending'",
                [],
                |row| row.get(0),
            )
            .map_err(Into::into)
        })
    }
}

fn status_str(status: ReportStatus) -> &'static str {
    match status {
        ReportStatus::Pending => "pending",
        ReportStatus::Reviewed => "reviewed",
        ReportStatus::Dismissed => "dismissed",
    }
}

type ReportRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
);

fn report_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn into_report(row: ReportRow) -> Result<Report> {
    let (id, reporter_id, subject_id, reason, status, admin_notes, reviewed_at, created_at) = row;
    let status = match status.as_str() {
        "pending" => ReportStatus::Pending,
        "reviewed" => ReportStatus::Reviewed,
        "dismissed" => ReportStatus::Dismissed,
        other => anyhow::bail!("unknown report status '{}'", other),
    };

    Ok(Report {
        id: parse_uuid(&id)?,
        reporter_id: parse_uuid(&reporter_id)?,
        subject_id: parse_uuid(&subject_id)?,
        reason,
        status,
        admin_notes,
        created_at: parse_ts(&created_at)?,
        reviewed_at: reviewed_at.as_deref().map(parse_ts).transpose()?,
    })
}
