use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use skillswap_types::Error;
use skillswap_types::api::{Claims, Page, PageQuery, UnreadCount};
use skillswap_types::events::Notification;

use crate::error::ApiResult;
use crate::pagination::{decode_cursor, encode_cursor};
use crate::{AppState, blocking};

const DEFAULT_PAGE_SIZE: u32 = 30;
const MAX_PAGE_SIZE: u32 = 100;

/// The notification inbox: active entries only, newest first.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Page<Notification>>> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let cursor = query.token.as_deref().map(decode_cursor).transpose()?;

    let db = state.db.clone();
    let notifications = blocking(move || {
        db.active_notifications(
            claims.sub,
            limit,
            cursor
                .as_ref()
                .map(|(created_at, id)| (created_at.as_str(), id.as_str())),
        )
    })
    .await?;

    let next_token = if notifications.len() as u32 == limit {
        notifications
            .last()
            .map(|n| encode_cursor(n.created_at, n.id))
    } else {
        None
    };

    Ok(Json(Page {
        items: notifications,
        next_token,
    }))
}

pub async fn unread(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<UnreadCount>> {
    let db = state.db.clone();
    let count = blocking(move || db.unread_notification_count(claims.sub)).await?;
    Ok(Json(UnreadCount { count }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    let db = state.db.clone();
    let updated = blocking(move || {
        db.mark_notification_read(&notification_id.to_string(), claims.sub, Utc::now())
    })
    .await?;

    if updated == 0 {
        return Err(Error::NotFound("notification").into());
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<serde_json::Value>> {
    let db = state.db.clone();
    let updated = blocking(move || db.mark_all_notifications_read(claims.sub, Utc::now())).await?;
    Ok(Json(serde_json::json!({ "marked": updated })))
}

/// Soft delete; the retention sweep hard-purges eventually.
pub async fn delete(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    let db = state.db.clone();
    let deleted =
        blocking(move || db.delete_notification(&notification_id.to_string(), claims.sub)).await?;

    if deleted == 0 {
        return Err(Error::NotFound("notification").into());
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_all(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<serde_json::Value>> {
    let db = state.db.clone();
    let deleted = blocking(move || db.delete_all_notifications(claims.sub)).await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}
