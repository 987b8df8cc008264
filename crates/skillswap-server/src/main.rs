mod jobs;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use skillswap_api::middleware::require_auth;
use skillswap_api::storage::Storage;
use skillswap_api::{
    AppState, AppStateInner, admin, auth, chats, communities, connections, events, files, gateway,
    matches, notifications, users,
};
use skillswap_notify::{Dispatcher, Notifier, PushChannel};
use skillswap_types::api::Claims;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skillswap=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("SKILLSWAP_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("SKILLSWAP_DB_PATH").unwrap_or_else(|_| "skillswap.db".into());
    let host = std::env::var("SKILLSWAP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("SKILLSWAP_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let storage_dir =
        std::env::var("SKILLSWAP_STORAGE_DIR").unwrap_or_else(|_| "skillswap-files".into());
    let public_url = std::env::var("SKILLSWAP_PUBLIC_URL")
        .unwrap_or_else(|_| format!("http://localhost:{port}"));
    let push_url = std::env::var("SKILLSWAP_PUSH_URL").ok();
    let reminder_interval: u64 = std::env::var("SKILLSWAP_REMINDER_INTERVAL_SECS")
        .unwrap_or_else(|_| "900".into())
        .parse()?;
    let sweep_interval: u64 = std::env::var("SKILLSWAP_SWEEP_INTERVAL_SECS")
        .unwrap_or_else(|_| "86400".into())
        .parse()?;

    // Init database and shared services
    let db = Arc::new(skillswap_db::Database::open(&PathBuf::from(&db_path))?);
    let dispatcher = Dispatcher::new();
    let push = PushChannel::from_endpoint(push_url);
    let notifier = Notifier::new(db.clone(), push, dispatcher.clone());
    let storage = Storage::new(PathBuf::from(&storage_dir), public_url).await?;

    let state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        jwt_secret,
        dispatcher: dispatcher.clone(),
        notifier: notifier.clone(),
        storage,
    });

    // Scheduled jobs: event reminders and the notification retention sweep
    tokio::spawn(jobs::run_reminder_loop(
        db.clone(),
        notifier.clone(),
        reminder_interval,
    ));
    tokio::spawn(jobs::run_retention_sweep(db.clone(), sweep_interval));

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/me", get(users::get_me).patch(users::update_me))
        .route("/users/me/streak", post(users::touch_streak))
        .route("/users/search", get(users::search_by_topic))
        .route("/users/{user_id}", get(users::get_user))
        .route(
            "/users/{user_id}/block",
            post(users::block_user).delete(users::unblock_user),
        )
        .route("/matches", get(matches::list))
        .route("/matches/notify", post(matches::notify))
        .route("/matches/topics/{topic}", get(matches::by_topic))
        .route("/connections", post(connections::send).get(connections::accepted))
        .route("/connections/pending", get(connections::pending))
        .route("/connections/with/{user_id}", get(connections::connected_with))
        .route("/connections/{connection_id}/accept", post(connections::accept))
        .route("/connections/{connection_id}", delete(connections::decline))
        .route("/communities", post(communities::create).get(communities::list))
        .route("/communities/mine", get(communities::mine))
        .route("/communities/{community_id}", get(communities::get))
        .route("/communities/{community_id}/join", post(communities::join))
        .route("/communities/{community_id}/leave", post(communities::leave))
        .route("/communities/{community_id}/members", post(communities::invite))
        .route(
            "/communities/{community_id}/channels",
            get(communities::channels).post(communities::create_channel),
        )
        .route(
            "/communities/{community_id}/channels/{channel_id}/messages",
            get(communities::channel_messages).post(communities::send_channel_message),
        )
        .route(
            "/communities/{community_id}/files",
            post(files::upload).get(files::list),
        )
        .route("/files/{file_id}/download", get(files::download))
        .route("/files/{file_id}", delete(files::delete))
        .route("/events", post(events::create).get(events::upcoming))
        .route("/events/mine", get(events::mine))
        .route("/events/{event_id}", get(events::get).delete(events::delete))
        .route("/events/{event_id}/join", post(events::join))
        .route("/events/{event_id}/leave", post(events::leave))
        .route("/chats", post(chats::open).get(chats::list))
        .route("/chats/unread", get(chats::unread))
        .route("/chats/{chat_id}/messages", get(chats::messages).post(chats::send))
        .route("/chats/{chat_id}/read", post(chats::mark_read))
        .route(
            "/notifications",
            get(notifications::list).delete(notifications::delete_all),
        )
        .route("/notifications/unread", get(notifications::unread))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route(
            "/notifications/{notification_id}/read",
            post(notifications::mark_read),
        )
        .route("/notifications/{notification_id}", delete(notifications::delete))
        .route("/reports", post(admin::file_report))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/users/{user_id}/grant", post(admin::grant_admin))
        .route("/admin/users/{user_id}/revoke", post(admin::revoke_admin))
        .route("/admin/users/{user_id}/ban", post(admin::ban))
        .route("/admin/users/{user_id}/unban", post(admin::unban))
        .route("/admin/reports", get(admin::list_reports))
        .route("/admin/reports/{report_id}", post(admin::update_report))
        .layer(middleware::from_fn(require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("SkillSwap server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: String,
}

/// WebSocket clients authenticate with their JWT as a query parameter; the
/// connection is upgraded pre-authenticated.
async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let claims = match decode::<Claims>(
        &query.token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => data.claims,
        Err(_) => return StatusCode::UNAUTHORIZED.into_response(),
    };

    let dispatcher = state.dispatcher.clone();
    ws.on_upgrade(move |socket| {
        gateway::handle_connection(socket, dispatcher, claims.sub, claims.display_name)
    })
    .into_response()
}
