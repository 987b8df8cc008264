use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use skillswap_db::events::JoinOutcome;
use skillswap_notify::DomainEvent;
use skillswap_types::Error;
use skillswap_types::api::{Claims, CreateEventRequest};
use skillswap_types::models::{Event, Role};

use crate::error::ApiResult;
use crate::validation::{
    sanitize_text, validate_description, validate_event_title, validate_future_date,
    validate_participant_limit,
};
use crate::{AppState, blocking};

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateEventRequest>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    let title = sanitize_text(&req.title);
    validate_event_title(&title)?;
    let description = sanitize_text(&req.description);
    validate_description(&description, 500)?;
    let now = Utc::now();
    validate_future_date(req.start_time, now, "Start time")?;
    if req.end_time <= req.start_time {
        return Err(Error::validation("End time must be after the start time").into());
    }
    validate_participant_limit(req.max_participants)?;

    let event_id = Uuid::new_v4();
    let db = state.db.clone();
    let community_id = req.community_id;
    let creator = claims.sub;

    let created = blocking(move || {
        // Community-scoped events require membership.
        let members = match community_id {
            Some(community_id) => {
                let cid = community_id.to_string();
                if db.get_community(&cid)?.is_none() {
                    return Ok(None);
                }
                if !db.is_member(&cid, &creator.to_string())? {
                    return Ok(Some(Err(Error::Forbidden)));
                }
                db.community_members(&cid)?
            }
            None => Vec::new(),
        };

        db.create_event(
            &event_id.to_string(),
            &title,
            &description,
            &req.topic,
            community_id.map(|id| id.to_string()).as_deref(),
            &creator.to_string(),
            req.start_time,
            req.end_time,
            req.max_participants,
            now,
        )?;

        let event = db
            .get_event(&event_id.to_string())?
            .ok_or(Error::NotFound("event"))?;
        Ok(Some(Ok((event, members))))
    })
    .await?
    .ok_or(Error::NotFound("community"))?;
    let (event, members) = created?;

    // Notify the community about the new event; direct events fan out to
    // nobody and are skipped entirely.
    if event.community_id.is_some() && !members.is_empty() {
        state
            .notifier
            .dispatch(DomainEvent::EventCreated {
                event_id: event.id,
                title: event.title.clone(),
                created_by: claims.sub,
                creator_display_name: claims.display_name.clone(),
                community_members: members,
            })
            .await
            .map_err(Error::Backend)?;
    }

    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn upcoming(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Event>>> {
    let db = state.db.clone();
    let events = blocking(move || db.upcoming_events(Utc::now(), 50)).await?;
    Ok(Json(events))
}

pub async fn mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Event>>> {
    let db = state.db.clone();
    let events = blocking(move || db.user_events(&claims.sub.to_string())).await?;
    Ok(Json(events))
}

pub async fn get(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Event>> {
    let db = state.db.clone();
    let event = blocking(move || db.get_event(&event_id.to_string()))
        .await?
        .ok_or(Error::NotFound("event"))?;
    Ok(Json(event))
}

pub async fn join(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<serde_json::Value>> {
    let db = state.db.clone();
    let outcome =
        blocking(move || db.try_join_event(&event_id.to_string(), &claims.sub.to_string(), Utc::now()))
            .await?;

    match outcome {
        JoinOutcome::Joined => Ok(Json(serde_json::json!({ "joined": true }))),
        JoinOutcome::AlreadyJoined => Ok(Json(serde_json::json!({ "joined": false }))),
        JoinOutcome::Full => Err(Error::validation("Event is full").into()),
        JoinOutcome::NotFound => Err(Error::NotFound("event").into()),
    }
}

pub async fn leave(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<serde_json::Value>> {
    let db = state.db.clone();
    let left =
        blocking(move || db.leave_event(&event_id.to_string(), &claims.sub.to_string())).await?;
    Ok(Json(serde_json::json!({ "left": left })))
}

/// Creator-only delete (admins may also remove events).
pub async fn delete(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    let db = state.db.clone();
    blocking(move || {
        let Some(event) = db.get_event(&event_id.to_string())? else {
            return Ok(Err(Error::NotFound("event")));
        };
        if event.created_by != claims.sub && claims.role != Role::Admin {
            return Ok(Err(Error::Forbidden));
        }
        db.delete_event(&event_id.to_string())?;
        Ok(Ok(()))
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}
