use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use skillswap_notify::DomainEvent;
use skillswap_types::Error;
use skillswap_types::api::{
    Claims, CreateChannelRequest, CreateCommunityRequest, InviteMembersRequest,
    SendChannelMessageRequest,
};
use skillswap_types::events::GatewayEvent;
use skillswap_types::models::{Channel, ChannelMessage, Community};

use crate::error::ApiResult;
use crate::validation::{
    sanitize_text, validate_community_name, validate_description, validate_text_length,
};
use crate::{AppState, blocking};

const DEFAULT_COMMUNITY_ICON: &str = "books";
const MESSAGE_MAX_LEN: usize = 2000;

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCommunityRequest>,
) -> ApiResult<(StatusCode, Json<Community>)> {
    let name = sanitize_text(&req.name);
    validate_community_name(&name)?;
    let description = sanitize_text(&req.description);
    validate_description(&description, 500)?;
    validate_text_length(&req.topic, 1, 50, "Topic")?;

    let community_id = Uuid::new_v4();
    let icon = req
        .icon
        .unwrap_or_else(|| DEFAULT_COMMUNITY_ICON.to_string());

    let db = state.db.clone();
    let community = blocking(move || {
        db.create_community(
            &community_id.to_string(),
            &name,
            &description,
            &req.topic,
            &icon,
            &claims.sub.to_string(),
            &Uuid::new_v4().to_string(),
            Utc::now(),
        )?;
        db.get_community(&community_id.to_string())
    })
    .await?
    .ok_or(Error::NotFound("community"))?;

    Ok((StatusCode::CREATED, Json(community)))
}

/// Largest communities first.
pub async fn list(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Community>>> {
    let db = state.db.clone();
    let communities = blocking(move || db.list_communities(50)).await?;
    Ok(Json(communities))
}

pub async fn mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Community>>> {
    let db = state.db.clone();
    let communities = blocking(move || db.user_communities(&claims.sub.to_string())).await?;
    Ok(Json(communities))
}

pub async fn get(
    State(state): State<AppState>,
    Path(community_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Community>> {
    let db = state.db.clone();
    let community = blocking(move || db.get_community(&community_id.to_string()))
        .await?
        .ok_or(Error::NotFound("community"))?;
    Ok(Json(community))
}

/// Self-join. Joining yourself does not fan out an invitation.
pub async fn join(
    State(state): State<AppState>,
    Path(community_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<serde_json::Value>> {
    let db = state.db.clone();
    let joined = blocking(move || {
        if db.get_community(&community_id.to_string())?.is_none() {
            return Ok(None);
        }
        let added = db.add_member(&community_id.to_string(), &claims.sub.to_string(), Utc::now())?;
        Ok(Some(added))
    })
    .await?
    .ok_or(Error::NotFound("community"))?;

    Ok(Json(serde_json::json!({ "joined": joined })))
}

pub async fn leave(
    State(state): State<AppState>,
    Path(community_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<serde_json::Value>> {
    let db = state.db.clone();
    let left =
        blocking(move || db.remove_member(&community_id.to_string(), &claims.sub.to_string()))
            .await?;
    Ok(Json(serde_json::json!({ "left": left })))
}

/// Add members on their behalf (invitation). The fan-out targets exactly
/// the set difference of the member list before and after the write.
pub async fn invite(
    State(state): State<AppState>,
    Path(community_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<InviteMembersRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if req.user_ids.is_empty() {
        return Err(Error::validation("No users to invite").into());
    }

    let db = state.db.clone();
    let cid = community_id.to_string();
    let inviter = claims.sub.to_string();
    let result = blocking(move || {
        let Some(community) = db.get_community(&cid)? else {
            return Ok(None);
        };
        if !db.is_member(&cid, &inviter)? {
            return Ok(Some(Err(Error::Forbidden)));
        }

        let before = db.community_members(&cid)?;
        for user_id in &req.user_ids {
            // Unknown ids are skipped rather than failing the whole batch.
            if db.get_user(&user_id.to_string())?.is_some() {
                db.add_member(&cid, &user_id.to_string(), Utc::now())?;
            }
        }
        let after = db.community_members(&cid)?;

        Ok(Some(Ok((community, before, after))))
    })
    .await?
    .ok_or(Error::NotFound("community"))?;

    let (community, before, after) = result?;
    let added = after.len().saturating_sub(before.len());

    state
        .notifier
        .dispatch(DomainEvent::CommunityMembersAdded {
            community_id,
            name: community.name,
            inviter_display_name: claims.display_name.clone(),
            members_before: before,
            members_after: after,
        })
        .await
        .map_err(Error::Backend)?;

    Ok(Json(serde_json::json!({ "added": added })))
}

// -- Channels --

pub async fn channels(
    State(state): State<AppState>,
    Path(community_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Channel>>> {
    let db = state.db.clone();
    let channels = blocking(move || db.channels(&community_id.to_string())).await?;
    Ok(Json(channels))
}

pub async fn create_channel(
    State(state): State<AppState>,
    Path(community_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateChannelRequest>,
) -> ApiResult<(StatusCode, Json<Channel>)> {
    let name = sanitize_text(&req.name);
    validate_text_length(&name, 2, 50, "Channel name")?;
    let description = sanitize_text(&req.description);
    validate_description(&description, 200)?;

    let channel_id = Uuid::new_v4();
    let db = state.db.clone();
    let channel = blocking(move || {
        let cid = community_id.to_string();
        if db.get_community(&cid)?.is_none() {
            return Ok(None);
        }
        if !db.is_member(&cid, &claims.sub.to_string())? {
            return Ok(Some(Err(Error::Forbidden)));
        }
        db.create_channel(&channel_id.to_string(), &cid, &name, &description, Utc::now())?;
        Ok(Some(db.get_channel(&channel_id.to_string())?.ok_or(Error::NotFound("channel"))))
    })
    .await?
    .ok_or(Error::NotFound("community"))??;

    Ok((StatusCode::CREATED, Json(channel)))
}

pub async fn channel_messages(
    State(state): State<AppState>,
    Path((community_id, channel_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<MessageLimitQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<ChannelMessage>>> {
    let limit = query.limit.unwrap_or(50).min(200);

    let db = state.db.clone();
    let messages = blocking(move || {
        let channel = match db.get_channel(&channel_id.to_string())? {
            Some(channel) if channel.community_id == community_id => channel,
            _ => return Ok(None),
        };
        if !db.is_member(&community_id.to_string(), &claims.sub.to_string())? {
            return Ok(Some(Err(Error::Forbidden)));
        }
        Ok(Some(Ok(db.channel_messages(&channel.id.to_string(), limit)?)))
    })
    .await?
    .ok_or(Error::NotFound("channel"))??;

    Ok(Json(messages))
}

pub async fn send_channel_message(
    State(state): State<AppState>,
    Path((community_id, channel_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendChannelMessageRequest>,
) -> ApiResult<(StatusCode, Json<ChannelMessage>)> {
    let text = sanitize_text(&req.text);
    validate_text_length(&text, 1, MESSAGE_MAX_LEN, "Message")?;

    let message_id = Uuid::new_v4();
    let now = Utc::now();

    let db = state.db.clone();
    let stored_text = text.clone();
    let message = blocking(move || {
        let channel = match db.get_channel(&channel_id.to_string())? {
            Some(channel) if channel.community_id == community_id => channel,
            _ => return Ok(None),
        };
        if !db.is_member(&community_id.to_string(), &claims.sub.to_string())? {
            return Ok(Some(Err(Error::Forbidden)));
        }
        db.insert_channel_message(
            &message_id.to_string(),
            &channel.id.to_string(),
            &claims.sub.to_string(),
            &stored_text,
            now,
        )?;
        Ok(Some(Ok(ChannelMessage {
            id: message_id,
            channel_id,
            author_id: claims.sub,
            text: stored_text,
            created_at: now,
        })))
    })
    .await?
    .ok_or(Error::NotFound("channel"))??;

    // Realtime broadcast to subscribed clients
    state.dispatcher.broadcast(GatewayEvent::ChannelMessageCreate {
        community_id,
        message: message.clone(),
    });

    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, serde::Deserialize)]
pub struct MessageLimitQuery {
    pub limit: Option<u32>,
}
