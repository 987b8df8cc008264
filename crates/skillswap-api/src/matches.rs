use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};

use skillswap_matching::{find_matches, topic_recommendations};
use skillswap_notify::DomainEvent;
use skillswap_types::Error;
use skillswap_types::api::{Claims, MatchEntry, MatchQuery, NotifyMatchRequest};

use crate::error::ApiResult;
use crate::{AppState, blocking};

const DEFAULT_MAX_MATCHES: usize = 10;

/// Size of the candidate pool pulled for ranking. Pools are small (tens to
/// low hundreds of users); ranking happens in memory.
const CANDIDATE_POOL: u32 = 500;

/// Best matches for the caller, ranked by compatibility score.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<MatchQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<MatchEntry>>> {
    let max_results = query.limit.unwrap_or(DEFAULT_MAX_MATCHES).min(100);

    let db = state.db.clone();
    let matches = blocking(move || {
        let Some(me) = db.get_user(&claims.sub.to_string())? else {
            return Ok(None);
        };
        let candidates = db.all_users(CANDIDATE_POOL)?;
        let matches = find_matches(&me, &candidates, max_results)
            .into_iter()
            .map(|m| MatchEntry {
                user: m.user.clone(),
                score: m.score,
            })
            .collect::<Vec<_>>();
        Ok(Some(matches))
    })
    .await?
    .ok_or(Error::NotFound("user"))?;

    Ok(Json(matches))
}

/// Users who can teach `topic`, ranked by overall compatibility.
pub async fn by_topic(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<MatchEntry>>> {
    let db = state.db.clone();
    let recommendations = blocking(move || {
        let Some(me) = db.get_user(&claims.sub.to_string())? else {
            return Ok(None);
        };
        let candidates = db.all_users(CANDIDATE_POOL)?;
        let recommendations = topic_recommendations(&me, &candidates, &topic)
            .into_iter()
            .map(|m| MatchEntry {
                user: m.user.clone(),
                score: m.score,
            })
            .collect::<Vec<_>>();
        Ok(Some(recommendations))
    })
    .await?
    .ok_or(Error::NotFound("user"))?;

    Ok(Json(recommendations))
}

/// Self-directed match notification: tells the caller about a match the
/// client surfaced, through both notification channels.
pub async fn notify(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NotifyMatchRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let db = state.db.clone();
    let matched = blocking(move || db.get_user(&req.matched_user_id.to_string()))
        .await?
        .ok_or(Error::NotFound("matched user"))?;

    state
        .notifier
        .dispatch(DomainEvent::MatchFound {
            user_id: claims.sub,
            matched_user_id: matched.id,
            matched_display_name: matched.display_name,
            score: req.score.min(100),
        })
        .await
        .map_err(Error::Backend)?;

    Ok(Json(serde_json::json!({ "success": true })))
}
