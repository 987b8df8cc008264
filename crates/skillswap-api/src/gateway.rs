use std::collections::HashSet;

use axum::extract::ws::{Message, WebSocket};
use tokio::sync::broadcast;
use tracing::{info, trace, warn};
use uuid::Uuid;

use skillswap_notify::Dispatcher;
use skillswap_types::events::{GatewayCommand, GatewayEvent};

/// Handle a pre-authenticated WebSocket connection. The JWT was already
/// validated at the HTTP upgrade layer, so we go straight to Ready and the
/// event loop.
///
/// Targeted events (notifications, direct messages) always flow to the
/// client; community-scoped broadcasts are filtered by the Subscribe set.
pub async fn handle_connection(
    mut socket: WebSocket,
    dispatcher: Dispatcher,
    user_id: Uuid,
    display_name: String,
) {
    let (conn_id, mut user_rx) = dispatcher.register_user_channel(user_id).await;
    let mut broadcast_rx = dispatcher.subscribe();
    let mut subscribed: HashSet<Uuid> = HashSet::new();

    info!("{} ({}) connected to gateway", display_name, user_id);

    let ready = GatewayEvent::Ready {
        user_id,
        display_name: display_name.clone(),
    };
    if send_event(&mut socket, &ready).await.is_err() {
        dispatcher.unregister_user_channel(user_id, conn_id).await;
        return;
    }

    loop {
        tokio::select! {
            event = user_rx.recv() => {
                let Some(event) = event else { break };
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }

            event = broadcast_rx.recv() => {
                match event {
                    Ok(event) => {
                        // Broadcast events are community-scoped; forward only
                        // what this client subscribed to.
                        let Some(community_id) = event.community_id() else { continue };
                        if subscribed.contains(&community_id)
                            && send_event(&mut socket, &event).await.is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("{} lagged, skipped {} gateway events", user_id, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<GatewayCommand>(&text) {
                            Ok(GatewayCommand::Subscribe { community_ids }) => {
                                subscribed = community_ids.into_iter().collect();
                            }
                            Err(e) => trace!("Unparseable gateway command: {}", e),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        trace!("WebSocket error for {}: {}", user_id, e);
                        break;
                    }
                }
            }
        }
    }

    dispatcher.unregister_user_channel(user_id, conn_id).await;
    info!("{} ({}) disconnected from gateway", display_name, user_id);
}

async fn send_event(socket: &mut WebSocket, event: &GatewayEvent) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).unwrap();
    socket.send(Message::Text(json.into())).await
}
