use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use skillswap_types::models::{ConnectionRequest, ConnectionStatus};

use crate::models::ConnectionRow;
use crate::{Database, OptionalExt, parse_ts, parse_uuid, ts};

/// Canonical storage order for an unordered pair.
fn canonical_pair(a: Uuid, b: Uuid) -> (String, String) {
    if a < b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl Database {
    /// Insert a pending request for the pair unless an active one already
    /// exists. The existence check and the insert run in one transaction,
    /// with the UNIQUE (user_lo, user_hi) constraint as a backstop, so two
    /// racing initiators cannot both create a request.
    ///
    /// Returns `None` when an active request already exists.
    pub fn try_create_connection(
        &self,
        id: &str,
        from: Uuid,
        to: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<ConnectionRequest>> {
        let (lo, hi) = canonical_pair(from, to);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let exists: Option<String> = tx
                .query_row(
                    "SELECT id FROM connections WHERE user_lo = ?1 AND user_hi = ?2",
                    [&lo, &hi],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_some() {
                return Ok(None);
            }

            let inserted = tx.execute(
                "INSERT INTO connections (id, user_lo, user_hi, initiator, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
                rusqlite::params![id, lo, hi, from.to_string(), ts(now)],
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }

            tx.commit()?;

            Ok(Some(ConnectionRequest {
                id: parse_uuid(id)?,
                participants: [parse_uuid(&lo)?, parse_uuid(&hi)?],
                initiator: from,
                status: ConnectionStatus::Pending,
                created_at: now,
                accepted_at: None,
            }))
        })
    }

    pub fn get_connection(&self, id: &str) -> Result<Option<ConnectionRequest>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(
                    "SELECT id, user_lo, user_hi, initiator, status, created_at, accepted_at
                     FROM connections WHERE id = ?1",
                )?
                .query_row([id], connection_row)
                .optional()?;
            row.map(into_request).transpose()
        })
    }

    /// The active request between the unordered pair, if any.
    pub fn connection_between(&self, a: Uuid, b: Uuid) -> Result<Option<ConnectionRequest>> {
        let (lo, hi) = canonical_pair(a, b);
        self.with_conn(|conn| {
            let row = conn
                .prepare(
                    "SELECT id, user_lo, user_hi, initiator, status, created_at, accepted_at
                     FROM connections WHERE user_lo = ?1 AND user_hi = ?2",
                )?
                .query_row([&lo, &hi], connection_row)
                .optional()?;
            row.map(into_request).transpose()
        })
    }

    /// `pending -> accepted`. Returns the number of rows transitioned:
    /// 0 means the request was missing or not pending.
    pub fn accept_connection(&self, id: &str, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE connections SET status = 'accepted', accepted_at = ?2
                 WHERE id = ?1 AND status = 'pending'",
                rusqlite::params![id, ts(now)],
            )?)
        })
    }

    /// Declining removes the row outright; no terminal record is kept.
    pub fn delete_connection(&self, id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute("DELETE FROM connections WHERE id = ?1", [id])?)
        })
    }

    pub fn pending_for(&self, user_id: Uuid) -> Result<Vec<ConnectionRequest>> {
        self.connections_for(user_id, "pending")
    }

    pub fn accepted_for(&self, user_id: Uuid) -> Result<Vec<ConnectionRequest>> {
        self.connections_for(user_id, "accepted")
    }

    fn connections_for(&self, user_id: Uuid, status: &str) -> Result<Vec<ConnectionRequest>> {
        let uid = user_id.to_string();
        self.with_conn(|conn| {
            let rows = conn
                .prepare(
                    "SELECT id, user_lo, user_hi, initiator, status, created_at, accepted_at
                     FROM connections
                     WHERE (user_lo = ?1 OR user_hi = ?1) AND status = ?2
                     ORDER BY created_at DESC",
                )?
                .query_map(rusqlite::params![uid, status], connection_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(into_request).collect()
        })
    }
}

fn connection_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConnectionRow> {
    Ok(ConnectionRow {
        id: row.get(0)?,
        user_lo: row.get(1)?,
        user_hi: row.get(2)?,
        initiator: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        accepted_at: row.get(6)?,
    })
}

fn into_request(row: ConnectionRow) -> Result<ConnectionRequest> {
    let status = match row.status.as_str() {
        "pending" => ConnectionStatus::Pending,
        "accepted" => ConnectionStatus::Accepted,
        other => anyhow::bail!("unknown connection status '{}'", other),
    };

    Ok(ConnectionRequest {
        id: parse_uuid(&row.id)?,
        participants: [parse_uuid(&row.user_lo)?, parse_uuid(&row.user_hi)?],
        initiator: parse_uuid(&row.initiator)?,
        status,
        created_at: parse_ts(&row.created_at)?,
        accepted_at: row.accepted_at.as_deref().map(parse_ts).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_users(ids: &[Uuid]) -> Database {
        let db = Database::open_in_memory().unwrap();
        for (n, id) in ids.iter().enumerate() {
            db.create_user(
                &id.to_string(),
                &format!("u{n}@example.com"),
                &format!("User {n}"),
                "hash",
                Utc::now(),
            )
            .unwrap();
        }
        db
    }

    #[test]
    fn duplicate_pair_is_rejected_in_either_direction() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let db = db_with_users(&[a, b]);

        let first = db
            .try_create_connection(&Uuid::from_u128(10).to_string(), a, b, Utc::now())
            .unwrap();
        assert!(first.is_some());

        // Same pair, same direction.
        let dup = db
            .try_create_connection(&Uuid::from_u128(11).to_string(), a, b, Utc::now())
            .unwrap();
        assert!(dup.is_none());

        // Same pair, opposite direction.
        let reverse = db
            .try_create_connection(&Uuid::from_u128(12).to_string(), b, a, Utc::now())
            .unwrap();
        assert!(reverse.is_none());
    }

    #[test]
    fn accept_transitions_exactly_once() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let db = db_with_users(&[a, b]);

        let req = db
            .try_create_connection(&Uuid::from_u128(10).to_string(), a, b, Utc::now())
            .unwrap()
            .unwrap();

        assert_eq!(db.accept_connection(&req.id.to_string(), Utc::now()).unwrap(), 1);
        // Already accepted: no row matches the pending guard.
        assert_eq!(db.accept_connection(&req.id.to_string(), Utc::now()).unwrap(), 0);

        let stored = db.get_connection(&req.id.to_string()).unwrap().unwrap();
        assert_eq!(stored.status, ConnectionStatus::Accepted);
        assert!(stored.accepted_at.is_some());
    }

    #[test]
    fn decline_frees_the_pair_for_a_new_request() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let db = db_with_users(&[a, b]);

        let req = db
            .try_create_connection(&Uuid::from_u128(10).to_string(), a, b, Utc::now())
            .unwrap()
            .unwrap();

        assert_eq!(db.delete_connection(&req.id.to_string()).unwrap(), 1);
        assert!(db.connection_between(a, b).unwrap().is_none());

        let again = db
            .try_create_connection(&Uuid::from_u128(11).to_string(), b, a, Utc::now())
            .unwrap();
        assert!(again.is_some());
    }

    #[test]
    fn pending_and_accepted_queries_partition_by_status() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let c = Uuid::from_u128(3);
        let db = db_with_users(&[a, b, c]);

        let ab = db
            .try_create_connection(&Uuid::from_u128(10).to_string(), a, b, Utc::now())
            .unwrap()
            .unwrap();
        db.try_create_connection(&Uuid::from_u128(11).to_string(), c, a, Utc::now())
            .unwrap()
            .unwrap();

        db.accept_connection(&ab.id.to_string(), Utc::now()).unwrap();

        let pending = db.pending_for(a).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].initiator, c);

        let accepted = db.accepted_for(a).unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].id, ab.id);
    }
}
