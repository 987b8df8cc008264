use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use skillswap_types::Error;
use skillswap_types::api::{Claims, Page, PageQuery, UpdateProfileRequest};
use skillswap_types::models::{Role, Streak, UserProfile};

use crate::error::ApiResult;
use crate::pagination::{decode_cursor, encode_cursor};
use crate::validation::{sanitize_text, validate_description, validate_display_name};
use crate::{AppState, blocking};

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

pub(crate) fn parse_role_claim(role: &str) -> Result<Role, Error> {
    match role {
        "user" => Ok(Role::User),
        "admin" => Ok(Role::Admin),
        other => Err(Error::Backend(anyhow::anyhow!("unknown role '{other}'"))),
    }
}

pub async fn get_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<UserProfile>> {
    let db = state.db.clone();
    let user = blocking(move || db.get_user(&claims.sub.to_string()))
        .await?
        .ok_or(Error::NotFound("user"))?;
    Ok(Json(user))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<UserProfile>> {
    let db = state.db.clone();
    let user = blocking(move || db.get_user(&user_id.to_string()))
        .await?
        .ok_or(Error::NotFound("user"))?;
    Ok(Json(user))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UserProfile>> {
    let display_name = req.display_name.as_deref().map(sanitize_text);
    if let Some(name) = &display_name {
        validate_display_name(name)?;
    }
    let bio = req.bio.as_deref().map(sanitize_text);
    if let Some(bio) = &bio {
        validate_description(bio, 500)?;
    }

    let uid = claims.sub.to_string();
    let db = state.db.clone();
    let skills = req.skills.clone();
    let needs = req.needs.clone();
    let photo_url = req.photo_url.clone();
    let push_token = req.push_token.clone();

    let user = blocking(move || {
        let updated = db.update_profile(
            &uid,
            display_name.as_deref(),
            bio.as_deref(),
            photo_url.as_deref(),
            push_token.as_deref(),
            Utc::now(),
        )?;
        if updated == 0 {
            return Ok(None);
        }
        if let Some(skills) = skills {
            db.set_skills(&uid, &skills)?;
        }
        if let Some(needs) = needs {
            db.set_needs(&uid, &needs)?;
        }
        db.get_user(&uid)
    })
    .await?
    .ok_or(Error::NotFound("user"))?;

    Ok(Json(user))
}

pub async fn block_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<serde_json::Value>> {
    if user_id == claims.sub {
        return Err(Error::validation("You cannot block yourself").into());
    }

    let db = state.db.clone();
    blocking(move || {
        if db.get_user(&user_id.to_string())?.is_none() {
            return Ok(None);
        }
        db.block_user(&claims.sub.to_string(), &user_id.to_string())?;
        Ok(Some(()))
    })
    .await?
    .ok_or(Error::NotFound("user"))?;

    Ok(Json(serde_json::json!({ "blocked": true })))
}

pub async fn unblock_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<serde_json::Value>> {
    let db = state.db.clone();
    blocking(move || db.unblock_user(&claims.sub.to_string(), &user_id.to_string())).await?;
    Ok(Json(serde_json::json!({ "blocked": false })))
}

/// Daily streak bump: same day is a no-op, a consecutive day increments,
/// any gap resets to 1.
pub async fn touch_streak(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Streak>> {
    let uid = claims.sub.to_string();
    let db = state.db.clone();

    let streak = blocking(move || {
        let Some(user) = db.get_user(&uid)? else {
            return Ok(None);
        };
        let today = Utc::now().date_naive();

        let streak = match advance_streak(&user.streak, today) {
            Some(count) => {
                db.set_streak(&uid, count, today)?;
                Streak {
                    count,
                    last_active: Some(today),
                }
            }
            None => user.streak,
        };
        Ok(Some(streak))
    })
    .await?
    .ok_or(Error::NotFound("user"))?;

    Ok(Json(streak))
}

/// `None` means the streak is already up to date for `today`.
fn advance_streak(current: &Streak, today: NaiveDate) -> Option<u32> {
    match current.last_active {
        Some(last) if last == today => None,
        Some(last) if last == today - Duration::days(1) => Some(current.count + 1),
        _ => Some(1),
    }
}

#[derive(Debug, Deserialize)]
pub struct TopicSearchQuery {
    pub topic: String,
    pub limit: Option<u32>,
}

/// Users whose skills or needs mention the topic.
pub async fn search_by_topic(
    State(state): State<AppState>,
    Query(query): Query<TopicSearchQuery>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Vec<UserProfile>>> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let db = state.db.clone();
    let users = blocking(move || db.search_by_topic(&query.topic, limit)).await?;
    Ok(Json(users))
}

/// Paginated discovery listing, newest first, with an opaque continuation
/// token instead of an offset.
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Page<UserProfile>>> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let cursor = query.token.as_deref().map(decode_cursor).transpose()?;

    let db = state.db.clone();
    let users = blocking(move || {
        db.list_users(
            limit,
            cursor
                .as_ref()
                .map(|(created_at, id)| (created_at.as_str(), id.as_str())),
        )
    })
    .await?;

    let next_token = if users.len() as u32 == limit {
        users
            .last()
            .map(|user| encode_cursor(user.created_at, user.id))
    } else {
        None
    };

    Ok(Json(Page {
        items: users,
        next_token,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn streak_same_day_is_noop() {
        let streak = Streak {
            count: 4,
            last_active: Some(date(2026, 3, 10)),
        };
        assert_eq!(advance_streak(&streak, date(2026, 3, 10)), None);
    }

    #[test]
    fn streak_consecutive_day_increments() {
        let streak = Streak {
            count: 4,
            last_active: Some(date(2026, 3, 10)),
        };
        assert_eq!(advance_streak(&streak, date(2026, 3, 11)), Some(5));
    }

    #[test]
    fn streak_gap_resets() {
        let streak = Streak {
            count: 4,
            last_active: Some(date(2026, 3, 10)),
        };
        assert_eq!(advance_streak(&streak, date(2026, 3, 13)), Some(1));
    }

    #[test]
    fn streak_first_activity_starts_at_one() {
        let streak = Streak {
            count: 0,
            last_active: None,
        };
        assert_eq!(advance_streak(&streak, date(2026, 3, 10)), Some(1));
    }
}
