pub mod admin;
pub mod auth;
pub mod chats;
pub mod communities;
pub mod connections;
pub mod error;
pub mod events;
pub mod files;
pub mod gateway;
pub mod matches;
pub mod middleware;
pub mod notifications;
pub mod pagination;
pub mod storage;
pub mod users;
pub mod validation;

use std::sync::Arc;

use skillswap_db::Database;
use skillswap_notify::{Dispatcher, Notifier};

use crate::error::ApiError;
use crate::storage::Storage;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    pub notifier: Notifier,
    pub storage: Storage,
}

/// Run a blocking DB closure off the async runtime. All handlers go through
/// this so SQLite work never stalls the executor.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let joined = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow::anyhow!("blocking task panicked: {e}"))
        .map_err(skillswap_types::Error::Backend)?;
    joined.map_err(|e| ApiError::from(skillswap_types::Error::Backend(e)))
}
