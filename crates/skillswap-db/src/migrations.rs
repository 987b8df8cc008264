use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            email           TEXT NOT NULL UNIQUE,
            display_name    TEXT NOT NULL,
            password        TEXT NOT NULL,
            photo_url       TEXT,
            bio             TEXT NOT NULL DEFAULT '',
            role            TEXT NOT NULL DEFAULT 'user',
            status          TEXT NOT NULL DEFAULT 'active',
            ban_reason      TEXT,
            banned_at       TEXT,
            push_token      TEXT,
            streak_count    INTEGER NOT NULL DEFAULT 0,
            streak_last_active TEXT,
            last_login_at   TEXT,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_skills (
            user_id     TEXT NOT NULL REFERENCES users(id),
            topic       TEXT NOT NULL,
            PRIMARY KEY (user_id, topic)
        );

        CREATE TABLE IF NOT EXISTS user_needs (
            user_id     TEXT NOT NULL REFERENCES users(id),
            topic       TEXT NOT NULL,
            PRIMARY KEY (user_id, topic)
        );

        CREATE TABLE IF NOT EXISTS user_blocks (
            user_id     TEXT NOT NULL REFERENCES users(id),
            blocked_id  TEXT NOT NULL REFERENCES users(id),
            PRIMARY KEY (user_id, blocked_id)
        );

        CREATE INDEX IF NOT EXISTS idx_user_skills_topic ON user_skills(topic);
        CREATE INDEX IF NOT EXISTS idx_user_needs_topic  ON user_needs(topic);

        -- Connection requests. The pair is stored canonically
        -- (user_lo < user_hi), so the UNIQUE constraint enforces at most one
        -- active request per unordered pair regardless of who initiated.
        -- Declined requests are deleted, never kept as a terminal state.
        CREATE TABLE IF NOT EXISTS connections (
            id          TEXT PRIMARY KEY,
            user_lo     TEXT NOT NULL REFERENCES users(id),
            user_hi     TEXT NOT NULL REFERENCES users(id),
            initiator   TEXT NOT NULL,
            status      TEXT NOT NULL CHECK (status IN ('pending', 'accepted')),
            created_at  TEXT NOT NULL,
            accepted_at TEXT,
            UNIQUE (user_lo, user_hi)
        );

        CREATE INDEX IF NOT EXISTS idx_connections_lo ON connections(user_lo, status);
        CREATE INDEX IF NOT EXISTS idx_connections_hi ON connections(user_hi, status);

        CREATE TABLE IF NOT EXISTS communities (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            topic       TEXT NOT NULL,
            icon        TEXT NOT NULL DEFAULT 'books',
            created_by  TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS community_members (
            community_id TEXT NOT NULL REFERENCES communities(id),
            user_id      TEXT NOT NULL REFERENCES users(id),
            joined_at    TEXT NOT NULL,
            PRIMARY KEY (community_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_community_members_user
            ON community_members(user_id);

        CREATE TABLE IF NOT EXISTS community_channels (
            id           TEXT PRIMARY KEY,
            community_id TEXT NOT NULL REFERENCES communities(id),
            name         TEXT NOT NULL,
            description  TEXT NOT NULL DEFAULT '',
            created_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS channel_messages (
            id          TEXT PRIMARY KEY,
            channel_id  TEXT NOT NULL REFERENCES community_channels(id),
            author_id   TEXT NOT NULL REFERENCES users(id),
            text        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_channel_messages
            ON channel_messages(channel_id, created_at);

        CREATE TABLE IF NOT EXISTS events (
            id               TEXT PRIMARY KEY,
            title            TEXT NOT NULL,
            description      TEXT NOT NULL DEFAULT '',
            topic            TEXT NOT NULL,
            community_id     TEXT REFERENCES communities(id),
            created_by       TEXT NOT NULL REFERENCES users(id),
            start_time       TEXT NOT NULL,
            end_time         TEXT NOT NULL,
            max_participants INTEGER,
            reminder_sent    INTEGER NOT NULL DEFAULT 0,
            created_at       TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_events_start ON events(start_time);

        CREATE TABLE IF NOT EXISTS event_participants (
            event_id    TEXT NOT NULL REFERENCES events(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            joined_at   TEXT NOT NULL,
            PRIMARY KEY (event_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_event_participants_user
            ON event_participants(user_id);

        CREATE TABLE IF NOT EXISTS chats (
            id              TEXT PRIMARY KEY,
            last_message    TEXT,
            last_message_at TEXT,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chat_participants (
            chat_id      TEXT NOT NULL REFERENCES chats(id),
            user_id      TEXT NOT NULL REFERENCES users(id),
            unread_count INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (chat_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_chat_participants_user
            ON chat_participants(user_id);

        CREATE TABLE IF NOT EXISTS chat_messages (
            id          TEXT PRIMARY KEY,
            chat_id     TEXT NOT NULL REFERENCES chats(id),
            sender_id   TEXT NOT NULL REFERENCES users(id),
            text        TEXT NOT NULL DEFAULT '',
            file_url    TEXT,
            file_name   TEXT,
            file_type   TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chat_messages
            ON chat_messages(chat_id, created_at);

        CREATE TABLE IF NOT EXISTS files (
            id           TEXT PRIMARY KEY,
            community_id TEXT NOT NULL REFERENCES communities(id),
            channel_id   TEXT REFERENCES community_channels(id),
            file_name    TEXT NOT NULL,
            content_type TEXT NOT NULL,
            size_bytes   INTEGER NOT NULL,
            storage_path TEXT NOT NULL,
            url          TEXT NOT NULL,
            uploaded_by  TEXT NOT NULL REFERENCES users(id),
            description  TEXT NOT NULL DEFAULT '',
            tags         TEXT NOT NULL DEFAULT '[]',
            uploaded_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_files_community
            ON files(community_id, uploaded_at);

        CREATE TABLE IF NOT EXISTS notifications (
            id           TEXT PRIMARY KEY,
            recipient_id TEXT NOT NULL REFERENCES users(id),
            kind         TEXT NOT NULL,
            title        TEXT NOT NULL,
            body         TEXT NOT NULL,
            payload      TEXT NOT NULL,
            read         INTEGER NOT NULL DEFAULT 0,
            read_at      TEXT,
            deleted      INTEGER NOT NULL DEFAULT 0,
            created_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_recipient
            ON notifications(recipient_id, deleted, created_at);

        CREATE TABLE IF NOT EXISTS reports (
            id          TEXT PRIMARY KEY,
            reporter_id TEXT NOT NULL REFERENCES users(id),
            subject_id  TEXT NOT NULL REFERENCES users(id),
            reason      TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'pending',
            admin_notes TEXT NOT NULL DEFAULT '',
            reviewed_at TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reports_status ON reports(status, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
