use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use skillswap_db::Database;
use skillswap_notify::DomainEvent;
use skillswap_types::api::{Claims, PendingRequests, SendConnectionRequest};
use skillswap_types::models::{ConnectionRequest, ConnectionStatus};
use skillswap_types::{Error, Result};

use crate::error::ApiResult;
use crate::{AppState, blocking};

// The state machine lives in these free functions so it can be exercised
// against an in-memory store without the HTTP layer.

/// `absent -> pending`. Fails with [`Error::DuplicateRequest`] when an
/// active request already exists for the unordered pair, in either
/// direction. Requests to or from a blocking party are rejected.
pub fn send_request(db: &Database, from: Uuid, to: Uuid) -> Result<ConnectionRequest> {
    if from == to {
        return Err(Error::validation("You cannot connect with yourself"));
    }

    let sender = db
        .get_user(&from.to_string())?
        .ok_or(Error::NotFound("user"))?;
    let receiver = db
        .get_user(&to.to_string())?
        .ok_or(Error::NotFound("user"))?;
    if sender.blocked.contains(&to) || receiver.blocked.contains(&from) {
        return Err(Error::validation("This user is not available for connections"));
    }

    db.try_create_connection(&Uuid::new_v4().to_string(), from, to, Utc::now())?
        .ok_or(Error::DuplicateRequest)
}

/// `pending -> accepted`. Only the receiving participant may accept, and
/// accepting anything but a pending request is an explicit error.
pub fn accept_request(db: &Database, id: Uuid, caller: Uuid) -> Result<ConnectionRequest> {
    let request = db
        .get_connection(&id.to_string())?
        .ok_or(Error::NotFound("connection request"))?;

    if !request.participants.contains(&caller) {
        return Err(Error::Forbidden);
    }
    if request.initiator == caller {
        return Err(Error::validation("You cannot accept your own request"));
    }
    if request.status != ConnectionStatus::Pending {
        return Err(Error::validation("Connection request is not pending"));
    }

    // The UPDATE re-checks the pending guard, so a racing accept loses here.
    if db.accept_connection(&id.to_string(), Utc::now())? == 0 {
        return Err(Error::validation("Connection request is not pending"));
    }

    db.get_connection(&id.to_string())?
        .ok_or(Error::NotFound("connection request"))
}

/// `pending -> absent` (also used by an initiator to withdraw). The row is
/// deleted outright; a later `send_request` for the pair succeeds.
pub fn decline_request(db: &Database, id: Uuid, caller: Uuid) -> Result<()> {
    let request = db
        .get_connection(&id.to_string())?
        .ok_or(Error::NotFound("connection request"))?;

    if !request.participants.contains(&caller) {
        return Err(Error::Forbidden);
    }

    db.delete_connection(&id.to_string())?;
    Ok(())
}

/// Pending requests involving `user`, partitioned into incoming (someone
/// else initiated) and outgoing (the user initiated).
pub fn pending_requests_for(db: &Database, user: Uuid) -> Result<PendingRequests> {
    let (outgoing, incoming) = db
        .pending_for(user)?
        .into_iter()
        .partition(|req: &ConnectionRequest| req.initiator == user);

    Ok(PendingRequests { incoming, outgoing })
}

pub fn accepted_connections_for(db: &Database, user: Uuid) -> Result<Vec<ConnectionRequest>> {
    Ok(db.accepted_for(user)?)
}

pub fn are_connected(db: &Database, a: Uuid, b: Uuid) -> Result<bool> {
    Ok(db
        .connection_between(a, b)?
        .is_some_and(|req| req.status == ConnectionStatus::Accepted))
}

// -- HTTP handlers --

pub async fn send(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendConnectionRequest>,
) -> ApiResult<(StatusCode, Json<ConnectionRequest>)> {
    let db = state.db.clone();
    let to = req.to_user_id;
    let request = blocking(move || Ok(send_request(&db, claims.sub, to))).await??;

    state
        .notifier
        .dispatch(DomainEvent::ConnectionRequested {
            connection_id: request.id,
            from_user_id: claims.sub,
            from_display_name: claims.display_name.clone(),
            to_user_id: to,
        })
        .await
        .map_err(Error::Backend)?;

    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn accept(
    State(state): State<AppState>,
    Path(connection_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ConnectionRequest>> {
    let db = state.db.clone();
    let request = blocking(move || Ok(accept_request(&db, connection_id, claims.sub))).await??;

    state
        .notifier
        .dispatch(DomainEvent::ConnectionAccepted {
            connection_id: request.id,
            initiator_id: request.initiator,
            accepter_id: claims.sub,
            accepter_display_name: claims.display_name.clone(),
        })
        .await
        .map_err(Error::Backend)?;

    Ok(Json(request))
}

pub async fn decline(
    State(state): State<AppState>,
    Path(connection_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    let db = state.db.clone();
    blocking(move || Ok(decline_request(&db, connection_id, claims.sub))).await??;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn pending(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<PendingRequests>> {
    let db = state.db.clone();
    let requests = blocking(move || Ok(pending_requests_for(&db, claims.sub))).await??;
    Ok(Json(requests))
}

pub async fn accepted(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<ConnectionRequest>>> {
    let db = state.db.clone();
    let connections = blocking(move || Ok(accepted_connections_for(&db, claims.sub))).await??;
    Ok(Json(connections))
}

pub async fn connected_with(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<serde_json::Value>> {
    let db = state.db.clone();
    let connected = blocking(move || Ok(are_connected(&db, claims.sub, user_id))).await??;
    Ok(Json(serde_json::json!({ "connected": connected })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(n: u128) -> (Database, Vec<Uuid>) {
        let db = Database::open_in_memory().unwrap();
        let ids: Vec<Uuid> = (1..=n).map(Uuid::from_u128).collect();
        for (i, id) in ids.iter().enumerate() {
            db.create_user(
                &id.to_string(),
                &format!("u{i}@example.com"),
                &format!("User {i}"),
                "hash",
                Utc::now(),
            )
            .unwrap();
        }
        (db, ids)
    }

    #[test]
    fn second_send_is_a_duplicate() {
        let (db, ids) = setup(2);
        let (a, b) = (ids[0], ids[1]);

        send_request(&db, a, b).unwrap();
        assert!(matches!(send_request(&db, a, b), Err(Error::DuplicateRequest)));
        // Also from the other side.
        assert!(matches!(send_request(&db, b, a), Err(Error::DuplicateRequest)));
    }

    #[test]
    fn accept_connects_the_pair_exactly_once() {
        let (db, ids) = setup(2);
        let (a, b) = (ids[0], ids[1]);

        let request = send_request(&db, a, b).unwrap();
        assert!(!are_connected(&db, a, b).unwrap());

        let accepted = accept_request(&db, request.id, b).unwrap();
        assert_eq!(accepted.status, ConnectionStatus::Accepted);
        assert!(are_connected(&db, a, b).unwrap());
        assert!(are_connected(&db, b, a).unwrap());

        // Accepting a resolved request is an explicit error.
        assert!(matches!(
            accept_request(&db, request.id, b),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn initiator_cannot_accept_their_own_request() {
        let (db, ids) = setup(2);
        let (a, b) = (ids[0], ids[1]);

        let request = send_request(&db, a, b).unwrap();
        assert!(matches!(
            accept_request(&db, request.id, a),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn outsiders_cannot_touch_a_request() {
        let (db, ids) = setup(3);
        let (a, b, c) = (ids[0], ids[1], ids[2]);

        let request = send_request(&db, a, b).unwrap();
        assert!(matches!(accept_request(&db, request.id, c), Err(Error::Forbidden)));
        assert!(matches!(decline_request(&db, request.id, c), Err(Error::Forbidden)));
    }

    #[test]
    fn decline_allows_a_fresh_request() {
        let (db, ids) = setup(2);
        let (a, b) = (ids[0], ids[1]);

        let request = send_request(&db, a, b).unwrap();
        decline_request(&db, request.id, b).unwrap();

        // `pending -> absent`: the pair is free again.
        assert!(send_request(&db, a, b).is_ok());
    }

    #[test]
    fn blocked_pairs_cannot_connect() {
        let (db, ids) = setup(2);
        let (a, b) = (ids[0], ids[1]);

        db.block_user(&b.to_string(), &a.to_string()).unwrap();
        assert!(matches!(send_request(&db, a, b), Err(Error::Validation(_))));
    }

    #[test]
    fn pending_partitions_by_direction() {
        let (db, ids) = setup(3);
        let (a, b, c) = (ids[0], ids[1], ids[2]);

        send_request(&db, a, b).unwrap();
        send_request(&db, c, a).unwrap();

        let pending = pending_requests_for(&db, a).unwrap();
        assert_eq!(pending.outgoing.len(), 1);
        assert_eq!(pending.outgoing[0].other(a), b);
        assert_eq!(pending.incoming.len(), 1);
        assert_eq!(pending.incoming[0].initiator, c);
    }

    #[test]
    fn missing_request_is_not_found() {
        let (db, ids) = setup(1);
        assert!(matches!(
            accept_request(&db, Uuid::from_u128(999), ids[0]),
            Err(Error::NotFound(_))
        ));
    }
}
