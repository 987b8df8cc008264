use serde_json::json;
use tracing::{debug, warn};

/// Best-effort push delivery. Failures are logged and swallowed: the
/// persisted in-app record is the authoritative channel, and a dead push
/// gateway must never block it. Nothing here is retried synchronously.
#[derive(Clone)]
pub enum PushChannel {
    /// POST each notification to an HTTP push gateway.
    Http {
        client: reqwest::Client,
        endpoint: String,
    },
    /// No gateway configured; sends are dropped with a debug log.
    Disabled,
}

impl PushChannel {
    pub fn from_endpoint(endpoint: Option<String>) -> Self {
        match endpoint {
            Some(endpoint) => Self::Http {
                client: reqwest::Client::new(),
                endpoint,
            },
            None => Self::Disabled,
        }
    }

    pub async fn send(
        &self,
        recipient_token: &str,
        title: &str,
        body: &str,
        payload: serde_json::Value,
    ) {
        match self {
            Self::Http { client, endpoint } => {
                let message = json!({
                    "to": recipient_token,
                    "title": title,
                    "body": body,
                    "data": payload,
                });

                match client.post(endpoint).json(&message).send().await {
                    Ok(resp) if resp.status().is_success() => {
                        debug!("Push delivered to {}", recipient_token);
                    }
                    Ok(resp) => {
                        warn!("Push gateway returned {} for {}", resp.status(), recipient_token);
                    }
                    Err(e) => {
                        warn!("Push delivery to {} failed: {}", recipient_token, e);
                    }
                }
            }
            Self::Disabled => {
                debug!("Push disabled, dropping notification for {}", recipient_token);
            }
        }
    }
}
