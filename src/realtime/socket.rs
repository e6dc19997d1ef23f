// realtime/socket.rs
use std::{collections::HashMap, time::Duration};

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use uuid::Uuid;

use super::{
    broadcast::Broadcaster,
    events::{ClientEvent, ServerEvent},
    sessions::{Outbound, RoomSubscription, SessionGuard, SessionRegistry},
};
use crate::{
    service::{error::ServiceError, Services},
    utils::token::AuthUser,
};

#[derive(Debug, Clone, Copy)]
pub struct Heartbeat {
    pub interval: Duration,
    pub client_timeout: Duration,
}

/// Protocol state of one authenticated socket: its session and the rooms it joined.
pub struct Connection {
    user: AuthUser,
    session: SessionGuard,
    broadcaster: Broadcaster,
    rooms: HashMap<Uuid, RoomSubscription>,
    services: Services,
    sessions: SessionRegistry,
}

impl Connection {
    pub fn open(
        user: AuthUser,
        outbound: Outbound,
        services: Services,
        sessions: SessionRegistry,
    ) -> Self {
        let session = sessions.register(user, outbound.clone());
        Self {
            user,
            session,
            broadcaster: Broadcaster::new(sessions.clone()),
            rooms: HashMap::new(),
            services,
            sessions,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session.id()
    }

    fn reply(&self, event: ServerEvent) {
        self.broadcaster.to_session(self.session.id(), event);
    }

    /// Handles one text frame. Failures go back to this session only.
    pub async fn handle_text(&mut self, text: &str) {
        let event = match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                let name = serde_json::from_str::<serde_json::Value>(text)
                    .ok()
                    .and_then(|v| v.get("event").and_then(|e| e.as_str()).map(str::to_owned))
                    .unwrap_or_else(|| "unknown".to_string());
                tracing::debug!("Bad frame from {}: {}", self.user.id, e);
                self.reply(ServerEvent::error(
                    &name,
                    &ServiceError::Validation(format!("Invalid payload: {}", e)),
                ));
                return;
            }
        };

        let name = event.name();
        if let Err(error) = self.dispatch(event).await {
            tracing::debug!("{} from {} failed: {}", name, self.user.id, error);
            self.reply(ServerEvent::error(name, &error));
        }
    }

    async fn dispatch(&mut self, event: ClientEvent) -> Result<(), ServiceError> {
        let user = self.user;
        let services = &self.services;

        match event {
            ClientEvent::JoinChat { chat_id } => {
                if self.rooms.contains_key(&chat_id) {
                    return Ok(());
                }
                services.chat_service.get_chat_for(chat_id, user).await?;
                let subscription = self.sessions.join(self.session.id(), chat_id);
                self.rooms.insert(chat_id, subscription);

                services.message_service.deliver_pending(chat_id, user).await?;
            }
            ClientEvent::LeaveChat { chat_id } => {
                if let Some(subscription) = self.rooms.remove(&chat_id) {
                    tracing::debug!("Session {} left chat {}", self.session.id(), subscription.chat_id());
                }
            }
            ClientEvent::SendMessage {
                chat_id,
                message_content,
                message_type,
            } => {
                services
                    .message_service
                    .send(chat_id, user, message_content, message_type)
                    .await?;
            }
            ClientEvent::MarkAsSeen { chat_id } => {
                services.message_service.mark_seen(chat_id, user).await?;
            }
            ClientEvent::MarkAsRead {
                chat_id,
                message_ids,
            } => {
                services
                    .message_service
                    .mark_as_read(chat_id, &message_ids, user)
                    .await?;
            }
            ClientEvent::DeleteChat { chat_id, user_role } => {
                services
                    .chat_service
                    .delete_chat(chat_id, user, user_role)
                    .await?;
            }
            ClientEvent::DeleteMessage {
                message_id,
                chat_id,
                deletion_type,
                ..
            } => {
                services
                    .message_service
                    .delete_message(message_id, chat_id, user, deletion_type)
                    .await?;
            }
            ClientEvent::UploadImage {
                sender_id,
                chat_id,
                image,
            } => {
                services
                    .message_service
                    .upload_image(chat_id, user, sender_id, &image)
                    .await?;
            }
            ClientEvent::MakeOffer {
                chat_id,
                offer_amount,
                job_request_id,
            } => {
                let amount = offer_amount.parse()?;
                services
                    .offer_service
                    .make_offer(chat_id, user, amount, job_request_id)
                    .await?;
            }
            ClientEvent::AcceptOffer { chat_id, .. } => {
                services.offer_service.accept_offer(chat_id, user).await?;
            }
            ClientEvent::RejectOffer { chat_id } => {
                services.offer_service.reject_offer(chat_id, user).await?;
            }
        }

        Ok(())
    }
}

/// Drives an upgraded socket until the client leaves or stops answering pings.
pub async fn run(
    socket: WebSocket,
    user: AuthUser,
    services: Services,
    sessions: SessionRegistry,
    heartbeat: Heartbeat,
) {
    let (sink, mut stream) = socket.split();
    let (tx, rx) = unbounded_channel();
    let mut connection = Connection::open(user, tx, services, sessions);
    let session_id = connection.session_id();

    tracing::info!(
        "Socket connected: user {} session {} ({} open)",
        user.id,
        session_id,
        connection.sessions.user_session_count(user.id)
    );

    let writer = tokio::spawn(write_loop(sink, rx, heartbeat.interval));

    loop {
        match tokio::time::timeout(heartbeat.client_timeout, stream.next()).await {
            Err(_) => {
                tracing::info!("Session {} heartbeat failed, disconnecting", session_id);
                break;
            }
            Ok(None) | Ok(Some(Ok(WsMessage::Close(_)))) => break,
            Ok(Some(Err(e))) => {
                tracing::warn!("Socket error on session {}: {}", session_id, e);
                break;
            }
            Ok(Some(Ok(WsMessage::Text(text)))) => connection.handle_text(&text).await,
            // pings are answered by axum, and any frame counts as a sign of life
            Ok(Some(Ok(_))) => {}
        }
    }

    // unregisters the session and leaves its rooms, which closes the queue
    drop(connection);
    if let Err(e) = writer.await {
        tracing::warn!("Socket writer for session {} ended abnormally: {}", session_id, e);
    }

    tracing::info!("Socket disconnected: user {} session {}", user.id, session_id);
}

async fn write_loop<S>(mut sink: S, mut rx: UnboundedReceiver<ServerEvent>, interval: Duration)
where
    S: futures::Sink<WsMessage> + Unpin,
{
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("Failed to serialize event: {}", e);
                        continue;
                    }
                };
                if sink.send(WsMessage::Text(text)).await.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => {
                if sink.send(WsMessage::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
}
