use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;

use opt_orchestrator::{generate_session_id, ChannelEvent, Session, SessionChannel};
use opt_wire::{ClientMessage, ServerMessage};

use crate::AppState;

struct WsChannel {
    socket: WebSocket,
}

#[async_trait]
impl SessionChannel for WsChannel {
    async fn send(&mut self, message: ServerMessage) -> anyhow::Result<()> {
        let text = serde_json::to_string(&message)?;
        self.socket.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> ChannelEvent {
        loop {
            match self.socket.recv().await {
                None => return ChannelEvent::Disconnected,
                Some(Err(_)) => return ChannelEvent::Disconnected,
                Some(Ok(WsMessage::Close(_))) => return ChannelEvent::Disconnected,
                Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(message) => match message.validate() {
                        Ok(()) => return ChannelEvent::Message(message),
                        Err(error) => return ChannelEvent::Invalid(error.to_string()),
                    },
                    Err(error) => return ChannelEvent::Invalid(format!("malformed frame: {error}")),
                },
                Some(Ok(_)) => continue,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OptimiseQuery {
    resume: Option<String>,
}

pub async fn optimise_ws(
    ws: WebSocketUpgrade,
    Query(query): Query<OptimiseQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, state, query.resume))
}

/// Builds the session to drive this connection: a fresh one, or — when
/// `resume` names a record the registry still holds — a [`Session::warm_start`]
/// continuation of it (spec.md §4.6). Returns whether the session was
/// resumed, since a resumed session must skip `await_start`'s wait for a
/// `start` message that a resuming client never sends.
async fn build_session(state: &AppState, resume: Option<String>) -> (String, Session, bool) {
    if let Some(id) = resume {
        if let Some(record) = state.sessions.get(&id).await {
            let cancellation = state.cancellations.create(&id).await;
            match Session::warm_start(&record, cancellation, state.engine_config.clone()) {
                Ok(session) => return (id, session, true),
                Err(error) => {
                    warn!(session_id = %id, %error, "failed to warm-start session, starting fresh instead");
                    state.cancellations.remove(&id).await;
                }
            }
        } else {
            warn!(session_id = %id, "no saved record for resume id, starting fresh session");
        }
    }

    let session_id = generate_session_id(&Utc::now().to_rfc3339());
    let cancellation = state.cancellations.create(&session_id).await;
    let session = Session::new(session_id.clone(), cancellation, state.engine_config.clone());
    (session_id, session, false)
}

async fn run_session(socket: WebSocket, state: AppState, resume: Option<String>) {
    let (session_id, mut session, resumed) = build_session(&state, resume).await;
    let mut channel = WsChannel { socket };

    let result = if resumed {
        session.run_resumed(&mut channel).await
    } else {
        session.run(&mut channel).await
    };

    if let Err(error) = result {
        warn!(session_id = %session_id, %error, "session ended with a transport error");
    }

    state.cancellations.remove(&session_id).await;

    let record = session.to_record(&session_id, Utc::now());
    if let Err(error) = state.sessions.save(record).await {
        warn!(session_id = %session_id, %error, "failed to persist session record");
    }
}
