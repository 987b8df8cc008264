/// Database row types — these map directly to SQLite rows.
/// Distinct from the skillswap-types API models: rows keep ids and
/// timestamps as TEXT and are assembled into domain models by the query
/// modules.

pub struct UserAuthRow {
    pub id: String,
    pub display_name: String,
    pub role: String,
    pub status: String,
    pub password: String,
}

pub struct UserBaseRow {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub bio: String,
    pub role: String,
    pub status: String,
    pub streak_count: u32,
    pub streak_last_active: Option<String>,
    pub created_at: String,
}

pub struct ConnectionRow {
    pub id: String,
    pub user_lo: String,
    pub user_hi: String,
    pub initiator: String,
    pub status: String,
    pub created_at: String,
    pub accepted_at: Option<String>,
}

pub struct NotificationRow {
    pub id: String,
    pub recipient_id: String,
    pub title: String,
    pub body: String,
    pub payload: String,
    pub read: bool,
    pub read_at: Option<String>,
    pub created_at: String,
}
