use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use skillswap_types::Error;
use skillswap_types::api::{
    BanUserRequest, Claims, ContentStats, FileReportRequest, PlatformStats, UpdateReportRequest,
    UserStats,
};
use skillswap_types::models::{Report, ReportStatus, Role};

use crate::error::ApiResult;
use crate::validation::validate_text_length;
use crate::{AppState, blocking};

fn require_admin(claims: &Claims) -> Result<(), Error> {
    if claims.role != Role::Admin {
        return Err(Error::Forbidden);
    }
    Ok(())
}

/// Platform analytics: account counts plus content totals.
pub async fn stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<PlatformStats>> {
    require_admin(&claims)?;

    let db = state.db.clone();
    let stats = blocking(move || {
        let active_since = Utc::now() - Duration::days(7);
        let (total_users, active_users, admin_users, banned_users) = db.user_stats(active_since)?;

        Ok(PlatformStats {
            users: UserStats {
                total_users,
                active_users,
                admin_users,
                banned_users,
            },
            content: ContentStats {
                total_communities: db.count_communities()?,
                total_events: db.count_events()?,
                total_files: db.count_files()?,
                pending_reports: db.pending_report_count()?,
            },
        })
    })
    .await?;

    Ok(Json(stats))
}

pub async fn grant_admin(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&claims)?;
    set_role(&state, user_id, "admin").await
}

pub async fn revoke_admin(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&claims)?;
    set_role(&state, user_id, "user").await
}

async fn set_role(
    state: &AppState,
    user_id: Uuid,
    role: &'static str,
) -> ApiResult<Json<serde_json::Value>> {
    let db = state.db.clone();
    let updated = blocking(move || db.set_role(&user_id.to_string(), role, Utc::now())).await?;
    if updated == 0 {
        return Err(Error::NotFound("user").into());
    }
    Ok(Json(serde_json::json!({ "role": role })))
}

pub async fn ban(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<BanUserRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&claims)?;
    if user_id == claims.sub {
        return Err(Error::validation("You cannot ban yourself").into());
    }
    validate_text_length(&req.reason, 3, 300, "Ban reason")?;

    let db = state.db.clone();
    let updated =
        blocking(move || db.ban_user(&user_id.to_string(), &req.reason, Utc::now())).await?;
    if updated == 0 {
        return Err(Error::NotFound("user").into());
    }
    Ok(Json(serde_json::json!({ "status": "banned" })))
}

pub async fn unban(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<serde_json::Value>> {
    require_admin(&claims)?;

    let db = state.db.clone();
    let updated = blocking(move || db.unban_user(&user_id.to_string(), Utc::now())).await?;
    if updated == 0 {
        return Err(Error::NotFound("user").into());
    }
    Ok(Json(serde_json::json!({ "status": "active" })))
}

// -- Reports --

/// Any signed-in user can report another user.
pub async fn file_report(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FileReportRequest>,
) -> ApiResult<StatusCode> {
    if req.subject_id == claims.sub {
        return Err(Error::validation("You cannot report yourself").into());
    }
    validate_text_length(&req.reason, 3, 500, "Report reason")?;

    let db = state.db.clone();
    blocking(move || {
        if db.get_user(&req.subject_id.to_string())?.is_none() {
            return Ok(Err(Error::NotFound("user")));
        }
        db.insert_report(
            &Uuid::new_v4().to_string(),
            &claims.sub.to_string(),
            &req.subject_id.to_string(),
            &req.reason,
            Utc::now(),
        )?;
        Ok(Ok(()))
    })
    .await??;

    Ok(StatusCode::CREATED)
}

#[derive(Debug, Deserialize)]
pub struct ReportsQuery {
    pub status: Option<ReportStatus>,
    pub limit: Option<u32>,
}

pub async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ReportsQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Report>>> {
    require_admin(&claims)?;

    let limit = query.limit.unwrap_or(50).min(200);
    let db = state.db.clone();
    let reports = blocking(move || db.list_reports(query.status, limit)).await?;
    Ok(Json(reports))
}

pub async fn update_report(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateReportRequest>,
) -> ApiResult<StatusCode> {
    require_admin(&claims)?;

    let db = state.db.clone();
    let updated = blocking(move || {
        db.update_report(&report_id.to_string(), req.status, &req.admin_notes, Utc::now())
    })
    .await?;

    if updated == 0 {
        return Err(Error::NotFound("report").into());
    }
    Ok(StatusCode::NO_CONTENT)
}
