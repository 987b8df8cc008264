use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ChannelMessage, ChatMessage};

/// Notification categories. The wire tag matches the payload tag of
/// [`NotificationPayload`] so clients can route on either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ConnectionRequest,
    ConnectionAccepted,
    NewMessage,
    NewEvent,
    EventReminder,
    CommunityInvite,
    NewMatch,
}

impl NotificationKind {
    /// Stable wire/storage tag, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionRequest => "connection_request",
            Self::ConnectionAccepted => "connection_accepted",
            Self::NewMessage => "new_message",
            Self::NewEvent => "new_event",
            Self::EventReminder => "event_reminder",
            Self::CommunityInvite => "community_invite",
            Self::NewMatch => "new_match",
        }
    }
}

/// One payload shape per notification kind, exhaustively matched at
/// dispatch sites instead of a free-form data bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NotificationPayload {
    ConnectionRequest {
        from_user_id: Uuid,
        connection_id: Uuid,
    },
    ConnectionAccepted {
        user_id: Uuid,
        connection_id: Uuid,
    },
    NewMessage {
        chat_id: Uuid,
        sender_id: Uuid,
    },
    NewEvent {
        event_id: Uuid,
        created_by: Uuid,
    },
    EventReminder {
        event_id: Uuid,
    },
    CommunityInvite {
        community_id: Uuid,
    },
    NewMatch {
        matched_user_id: Uuid,
        score: u8,
    },
}

impl NotificationPayload {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::ConnectionRequest { .. } => NotificationKind::ConnectionRequest,
            Self::ConnectionAccepted { .. } => NotificationKind::ConnectionAccepted,
            Self::NewMessage { .. } => NotificationKind::NewMessage,
            Self::NewEvent { .. } => NotificationKind::NewEvent,
            Self::EventReminder { .. } => NotificationKind::EventReminder,
            Self::CommunityInvite { .. } => NotificationKind::CommunityInvite,
            Self::NewMatch { .. } => NotificationKind::NewMatch,
        }
    }
}

/// Persisted in-app notification record. This is the authoritative channel;
/// push delivery is best-effort on top of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub title: String,
    pub body: String,
    pub payload: NotificationPayload,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        self.payload.kind()
    }
}

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, display_name: String },

    /// A persisted notification was created for this user
    NotificationCreate { notification: Notification },

    /// A new direct-chat message was posted
    MessageCreate { message: ChatMessage },

    /// A new message was posted in a community channel
    ChannelMessageCreate {
        community_id: Uuid,
        message: ChannelMessage,
    },
}

impl GatewayEvent {
    /// Returns the community_id if this event is scoped to a community.
    /// Events that return `None` are targeted and delivered per-user.
    pub fn community_id(&self) -> Option<Uuid> {
        match self {
            Self::ChannelMessageCreate { community_id, .. } => Some(*community_id),
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Subscribe to channel-message events for specific communities.
    /// Targeted events (notifications, direct messages) are always delivered.
    Subscribe { community_ids: Vec<Uuid> },
}
