// realtime/broadcast.rs
use uuid::Uuid;

use super::{
    events::ServerEvent,
    sessions::{Outbound, SessionId, SessionRegistry},
};

/// Fans events out to session queues. Sends never block; a closed queue
/// belongs to a connection that is shutting down and is skipped.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    sessions: SessionRegistry,
}

impl Broadcaster {
    pub fn new(sessions: SessionRegistry) -> Self {
        Self { sessions }
    }

    /// Every session joined to the chat room.
    pub fn to_room(&self, chat_id: Uuid, event: ServerEvent) {
        let targets = self.sessions.room_outbounds(chat_id);
        tracing::debug!("Broadcasting to {} session(s) in chat {}", targets.len(), chat_id);
        send_all(targets, event);
    }

    /// Every session of the user, joined to a room or not.
    pub fn to_user(&self, user_id: Uuid, event: ServerEvent) {
        send_all(self.sessions.user_outbounds(user_id), event);
    }

    pub fn to_session(&self, session_id: SessionId, event: ServerEvent) {
        if let Some(outbound) = self.sessions.session_outbound(session_id) {
            send_all(vec![outbound], event);
        }
    }
}

fn send_all(targets: Vec<Outbound>, event: ServerEvent) {
    for outbound in targets {
        if outbound.send(event.clone()).is_err() {
            tracing::debug!("Dropping event for a closed session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::chatmodels::ParticipantRole, utils::token::AuthUser};
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn room_events_skip_sessions_outside_the_room() {
        let registry = SessionRegistry::new();
        let broadcaster = Broadcaster::new(registry.clone());
        let chat_id = Uuid::new_v4();
        let user = AuthUser {
            id: Uuid::new_v4(),
            role: ParticipantRole::Client,
        };

        let (joined_tx, mut joined_rx) = unbounded_channel();
        let (idle_tx, mut idle_rx) = unbounded_channel();
        let joined = registry.register(user, joined_tx);
        let _idle = registry.register(user, idle_tx);
        let _room = registry.join(joined.id(), chat_id);

        let event = ServerEvent::MessageDelivered {
            message_id: Uuid::new_v4(),
        };
        broadcaster.to_room(chat_id, event.clone());
        assert_eq!(joined_rx.try_recv().unwrap(), event);
        assert!(idle_rx.try_recv().is_err());

        broadcaster.to_user(user.id, event.clone());
        assert_eq!(joined_rx.try_recv().unwrap(), event);
        assert_eq!(idle_rx.try_recv().unwrap(), event);
    }
}
