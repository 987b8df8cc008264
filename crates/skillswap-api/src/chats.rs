use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use skillswap_notify::DomainEvent;
use skillswap_types::Error;
use skillswap_types::api::{Claims, OpenChatRequest, SendChatMessageRequest, UnreadCount};
use skillswap_types::events::GatewayEvent;
use skillswap_types::models::{Chat, ChatMessage, FileAttachment};

use crate::error::ApiResult;
use crate::validation::{sanitize_text, validate_file_size, validate_file_type};
use crate::{AppState, blocking};

const FILE_PREVIEW: &str = "\u{1F4CE} File";

/// Create the direct chat for the pair, or return the existing one.
pub async fn open(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<OpenChatRequest>,
) -> ApiResult<Json<Chat>> {
    if req.peer_id == claims.sub {
        return Err(Error::validation("You cannot chat with yourself").into());
    }

    let db = state.db.clone();
    let me = claims.sub;
    let peer = req.peer_id;
    let chat = blocking(move || {
        if db.get_user(&peer.to_string())?.is_none() {
            return Ok(None);
        }

        let chat_id = match db.find_chat_between(me, peer)? {
            Some(chat_id) => chat_id,
            None => {
                let chat_id = Uuid::new_v4().to_string();
                db.create_chat(&chat_id, me, peer, Utc::now())?;
                chat_id
            }
        };
        db.get_chat(&chat_id, me)
    })
    .await?
    .ok_or(Error::NotFound("user"))?;

    Ok(Json(chat))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Chat>>> {
    let db = state.db.clone();
    let chats = blocking(move || db.user_chats(claims.sub)).await?;
    Ok(Json(chats))
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<u32>,
    /// Cursor-based pagination — pass the `created_at` timestamp of the
    /// oldest message from the previous page to fetch older messages.
    pub before: Option<String>,
}

pub async fn messages(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Query(query): Query<MessagesQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let limit = query.limit.unwrap_or(50).min(200);
    let before = query.before;

    let db = state.db.clone();
    let messages = blocking(move || {
        let participants = db.chat_participants(&chat_id.to_string())?;
        if participants.is_empty() {
            return Ok(None);
        }
        if !participants.contains(&claims.sub) {
            return Ok(Some(Err(Error::Forbidden)));
        }
        Ok(Some(Ok(db.chat_messages(
            &chat_id.to_string(),
            limit,
            before.as_deref(),
        )?)))
    })
    .await?
    .ok_or(Error::NotFound("chat"))??;

    Ok(Json(messages))
}

pub async fn send(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendChatMessageRequest>,
) -> ApiResult<(StatusCode, Json<ChatMessage>)> {
    let text = sanitize_text(&req.text);
    if text.is_empty() && req.file.is_none() {
        return Err(Error::validation("Message text or a file is required").into());
    }

    // Attachment goes to the object store first; the message row only
    // carries its URL.
    let file = match req.file {
        Some(upload) => {
            validate_file_type(&upload.file_name)?;
            let bytes = B64
                .decode(upload.data.as_bytes())
                .map_err(|_| Error::validation("Attachment data is not valid base64"))?;
            validate_file_size(bytes.len())?;

            let attachment_id = Uuid::new_v4();
            let path = state.storage.object_path(
                &format!("chat-files/{chat_id}"),
                attachment_id,
                &upload.file_name,
            );
            state
                .storage
                .save(&path, &bytes)
                .await
                .map_err(Error::Backend)?;

            Some(FileAttachment {
                url: state.storage.download_url(attachment_id),
                file_name: upload.file_name,
                content_type: upload.content_type,
            })
        }
        None => None,
    };

    let message_id = Uuid::new_v4();
    let now = Utc::now();
    let preview = if text.is_empty() {
        FILE_PREVIEW.to_string()
    } else {
        text.clone()
    };

    let db = state.db.clone();
    let stored_text = text.clone();
    let stored_file = file.clone();
    let notify_text = preview.clone();
    let sender = claims.sub;
    let participants = blocking(move || {
        let participants = db.chat_participants(&chat_id.to_string())?;
        if participants.is_empty() {
            return Ok(None);
        }
        if !participants.contains(&sender) {
            return Ok(Some(Err(Error::Forbidden)));
        }
        db.insert_chat_message(
            &message_id.to_string(),
            &chat_id.to_string(),
            sender,
            &stored_text,
            stored_file.as_ref(),
            &preview,
            now,
        )?;
        Ok(Some(Ok(participants)))
    })
    .await?
    .ok_or(Error::NotFound("chat"))??;

    let message = ChatMessage {
        id: message_id,
        chat_id,
        sender_id: claims.sub,
        text,
        file,
        created_at: now,
    };

    // Realtime delivery to everyone in the chat, sender included (other
    // devices of the same account want the echo too).
    for participant in &participants {
        state
            .dispatcher
            .send_to_user(
                *participant,
                GatewayEvent::MessageCreate {
                    message: message.clone(),
                },
            )
            .await;
    }

    // Notification fan-out excludes the sender by policy.
    state
        .notifier
        .dispatch(DomainEvent::ChatMessageSent {
            chat_id,
            sender_id: claims.sub,
            sender_display_name: claims.display_name.clone(),
            participants,
            text: notify_text,
        })
        .await
        .map_err(Error::Backend)?;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    let db = state.db.clone();
    blocking(move || db.mark_chat_read(&chat_id.to_string(), claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unread(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<UnreadCount>> {
    let db = state.db.clone();
    let count = blocking(move || db.total_unread(claims.sub)).await?;
    Ok(Json(UnreadCount { count }))
}
