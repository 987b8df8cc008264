use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ConnectionRequest, Role, UserProfile};

// -- JWT Claims --

/// JWT claims shared across skillswap-api (REST middleware) and the
/// WebSocket gateway. Canonical definition lives here in skillswap-types
/// to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub display_name: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub display_name: String,
    pub token: String,
}

// -- Profiles --

/// Partial profile update; absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
    pub skills: Option<Vec<String>>,
    pub needs: Option<Vec<String>>,
    pub push_token: Option<String>,
}

/// One page of an ordered listing. `next_token` is an opaque continuation
/// token to pass back in the next call; `None` means the listing is done.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub token: Option<String>,
}

// -- Matching --

#[derive(Debug, Serialize)]
pub struct MatchEntry {
    pub user: UserProfile,
    pub score: u8,
}

#[derive(Debug, Deserialize)]
pub struct MatchQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifyMatchRequest {
    pub matched_user_id: Uuid,
    pub score: u8,
}

// -- Connections --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendConnectionRequest {
    pub to_user_id: Uuid,
}

/// Pending requests partitioned by direction relative to the caller.
#[derive(Debug, Serialize)]
pub struct PendingRequests {
    pub incoming: Vec<ConnectionRequest>,
    pub outgoing: Vec<ConnectionRequest>,
}

// -- Communities --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommunityRequest {
    pub name: String,
    pub description: String,
    pub topic: String,
    pub icon: Option<String>,
}

/// Add members on their behalf; recipients of the resulting invitation
/// notifications are the set difference of the member lists before/after.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InviteMembersRequest {
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChannelRequest {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendChannelMessageRequest {
    pub text: String,
}

// -- Events --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: String,
    pub topic: String,
    pub community_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub max_participants: Option<u32>,
}

// -- Chats --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenChatRequest {
    pub peer_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendChatMessageRequest {
    #[serde(default)]
    pub text: String,
    pub file: Option<UploadAttachment>,
}

/// Inline base64 upload, decoded and written to the object store.
#[derive(Debug, Deserialize)]
pub struct UploadAttachment {
    pub file_name: String,
    pub content_type: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: u32,
}

// -- Files --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadFileRequest {
    pub file_name: String,
    pub content_type: String,
    /// Base64-encoded file bytes.
    pub data: String,
    pub channel_id: Option<Uuid>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

// -- Reports & moderation --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileReportRequest {
    pub subject_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateReportRequest {
    pub status: crate::models::ReportStatus,
    #[serde(default)]
    pub admin_notes: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BanUserRequest {
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct UserStats {
    pub total_users: u32,
    pub active_users: u32,
    pub admin_users: u32,
    pub banned_users: u32,
}

#[derive(Debug, Serialize)]
pub struct ContentStats {
    pub total_communities: u32,
    pub total_events: u32,
    pub total_files: u32,
    pub pending_reports: u32,
}

#[derive(Debug, Serialize)]
pub struct PlatformStats {
    pub users: UserStats,
    pub content: ContentStats,
}
