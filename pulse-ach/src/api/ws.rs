//! WebSocket subscription endpoint
//!
//! GET /ws?userId=… upgrades to a socket that receives the user's
//! notifications. Lifecycle per socket:
//! 1. Register the subscription (`Connecting`)
//! 2. Send `{"type":"connection","status":"connected","clientId":…}`
//! 3. Mark `Open` and forward published events
//! 4. On close or error, mark `Closing`, then drop the subscription
//!    (`Closed`, unsubscribed)
//!
//! Clients may also push metric samples over the socket
//! (`{"type":"health_metric","metric":{…}}`); these take the same write path
//! as `POST /api/health-metrics` and are answered with `metric_ack`.

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use pulse_common::models::UserId;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::records::{log_metric, NewMetric};
use crate::AppState;

/// Close code sent when the query string carries no user id
pub const CLOSE_MISSING_USER: u16 = 4000;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Client-to-server messages
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Ping,
    HealthMetric { metric: NewMetric },
}

/// GET /ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.user_id))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, user_id: Option<String>) {
    let user_id = match user_id.as_deref().map(UserId::parse) {
        Some(Ok(user_id)) => user_id,
        _ => {
            debug!("WebSocket without userId, closing");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_MISSING_USER,
                    reason: "userId required".into(),
                })))
                .await;
            return;
        }
    };

    let (mut sender, mut receiver) = socket.split();
    let mut subscription = state.channel.subscribe(&user_id);
    info!("WebSocket connected: user {} ({})", user_id, subscription.id());

    let greeting = json!({
        "type": "connection",
        "status": "connected",
        "clientId": subscription.id(),
    });
    if sender.send(Message::Text(greeting.to_string())).await.is_err() {
        return;
    }
    subscription.open();

    loop {
        tokio::select! {
            outbound = subscription.recv() => {
                let Some(text) = outbound else { break };
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let Some(reply) = handle_client_message(&state, &user_id, &text).await
                        else {
                            continue;
                        };
                        if sender.send(Message::Text(reply.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("WebSocket error for user {}: {}", user_id, e);
                        break;
                    }
                }
            }
        }
    }

    subscription.begin_close();
    info!("WebSocket disconnected: user {} ({})", user_id, subscription.id());
}

/// Reply to send for one inbound text frame, if any
async fn handle_client_message(state: &AppState, user_id: &UserId, text: &str) -> Option<Value> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            debug!("Ignoring client message from user {}: {}", user_id, e);
            return None;
        }
    };

    match message {
        ClientMessage::Ping => Some(json!({ "type": "pong" })),
        ClientMessage::HealthMetric { metric } => match log_metric(state, user_id, metric).await {
            Ok(sample) => Some(json!({
                "type": "metric_ack",
                "metricId": sample.id,
                "status": "received",
            })),
            Err(e) => {
                warn!("Rejected socket metric from user {}: {}", user_id, e);
                Some(json!({
                    "type": "metric_ack",
                    "status": "rejected",
                    "message": e.to_string(),
                }))
            }
        },
    }
}
