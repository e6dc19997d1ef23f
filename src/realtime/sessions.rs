// realtime/sessions.rs
//! Connected sessions and the chat rooms they joined.
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use super::events::ServerEvent;
use crate::utils::token::AuthUser;

pub type SessionId = Uuid;
pub type Outbound = UnboundedSender<ServerEvent>;

#[derive(Debug)]
struct SessionEntry {
    user: AuthUser,
    outbound: Outbound,
    rooms: HashSet<Uuid>,
}

#[derive(Debug, Default)]
struct RegistryState {
    sessions: HashMap<SessionId, SessionEntry>,
    rooms: HashMap<Uuid, HashSet<SessionId>>,
    users: HashMap<Uuid, HashSet<SessionId>>,
}

impl RegistryState {
    fn leave(&mut self, session_id: SessionId, chat_id: Uuid) {
        if let Some(entry) = self.sessions.get_mut(&session_id) {
            entry.rooms.remove(&chat_id);
        }
        if let Some(members) = self.rooms.get_mut(&chat_id) {
            members.remove(&session_id);
            if members.is_empty() {
                self.rooms.remove(&chat_id);
            }
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct SessionRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a connection. The session lives until the guard is dropped.
    pub fn register(&self, user: AuthUser, outbound: Outbound) -> SessionGuard {
        let session_id = Uuid::new_v4();
        let mut state = self.write();

        state.sessions.insert(
            session_id,
            SessionEntry {
                user,
                outbound,
                rooms: HashSet::new(),
            },
        );
        state.users.entry(user.id).or_default().insert(session_id);

        tracing::debug!("Session {} registered for user {}", session_id, user.id);

        SessionGuard {
            session_id,
            registry: self.clone(),
        }
    }

    fn unregister(&self, session_id: SessionId) {
        let mut state = self.write();
        let Some(entry) = state.sessions.remove(&session_id) else {
            return;
        };

        for chat_id in entry.rooms {
            if let Some(members) = state.rooms.get_mut(&chat_id) {
                members.remove(&session_id);
                if members.is_empty() {
                    state.rooms.remove(&chat_id);
                }
            }
        }

        if let Some(sessions) = state.users.get_mut(&entry.user.id) {
            sessions.remove(&session_id);
            if sessions.is_empty() {
                state.users.remove(&entry.user.id);
            }
        }

        tracing::debug!("Session {} unregistered", session_id);
    }

    /// Adds the session to a chat room. Membership ends when the handle is dropped.
    pub fn join(&self, session_id: SessionId, chat_id: Uuid) -> RoomSubscription {
        let mut guard = self.write();
        let state = &mut *guard;
        if let Some(entry) = state.sessions.get_mut(&session_id) {
            entry.rooms.insert(chat_id);
            state.rooms.entry(chat_id).or_default().insert(session_id);
        }

        RoomSubscription {
            session_id,
            chat_id,
            registry: self.clone(),
        }
    }

    pub fn room_outbounds(&self, chat_id: Uuid) -> Vec<Outbound> {
        let state = self.read();
        state
            .rooms
            .get(&chat_id)
            .into_iter()
            .flatten()
            .filter_map(|session_id| state.sessions.get(session_id))
            .map(|entry| entry.outbound.clone())
            .collect()
    }

    pub fn user_outbounds(&self, user_id: Uuid) -> Vec<Outbound> {
        let state = self.read();
        state
            .users
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|session_id| state.sessions.get(session_id))
            .map(|entry| entry.outbound.clone())
            .collect()
    }

    pub fn session_outbound(&self, session_id: SessionId) -> Option<Outbound> {
        self.read()
            .sessions
            .get(&session_id)
            .map(|entry| entry.outbound.clone())
    }

    /// Distinct users with at least one session joined to the room.
    pub fn online_users(&self, chat_id: Uuid) -> HashSet<Uuid> {
        let state = self.read();
        state
            .rooms
            .get(&chat_id)
            .into_iter()
            .flatten()
            .filter_map(|session_id| state.sessions.get(session_id))
            .map(|entry| entry.user.id)
            .collect()
    }

    pub fn is_user_in_room(&self, chat_id: Uuid, user_id: Uuid) -> bool {
        self.online_users(chat_id).contains(&user_id)
    }

    pub fn user_session_count(&self, user_id: Uuid) -> usize {
        self.read().users.get(&user_id).map_or(0, HashSet::len)
    }
}

/// Owned by the connection task. Dropping it unregisters the session.
#[derive(Debug)]
pub struct SessionGuard {
    session_id: SessionId,
    registry: SessionRegistry,
}

impl SessionGuard {
    pub fn id(&self) -> SessionId {
        self.session_id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.unregister(self.session_id);
    }
}

/// A session's membership in one chat room.
#[derive(Debug)]
pub struct RoomSubscription {
    session_id: SessionId,
    chat_id: Uuid,
    registry: SessionRegistry,
}

impl RoomSubscription {
    pub fn chat_id(&self) -> Uuid {
        self.chat_id
    }
}

impl Drop for RoomSubscription {
    fn drop(&mut self) {
        self.registry.write().leave(self.session_id, self.chat_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chatmodels::ParticipantRole;
    use tokio::sync::mpsc::unbounded_channel;

    fn user(role: ParticipantRole) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn dropping_subscription_leaves_room() {
        let registry = SessionRegistry::new();
        let client = user(ParticipantRole::Client);
        let chat_id = Uuid::new_v4();
        let (tx, _rx) = unbounded_channel();

        let session = registry.register(client, tx);
        let subscription = registry.join(session.id(), chat_id);
        assert!(registry.is_user_in_room(chat_id, client.id));
        assert_eq!(subscription.chat_id(), chat_id);

        drop(subscription);
        assert!(!registry.is_user_in_room(chat_id, client.id));
        assert_eq!(registry.user_session_count(client.id), 1);
    }

    #[test]
    fn dropping_session_releases_everything() {
        let registry = SessionRegistry::new();
        let seeker = user(ParticipantRole::JobSeeker);
        let chat_id = Uuid::new_v4();
        let (tx, _rx) = unbounded_channel();

        let session = registry.register(seeker, tx);
        let subscription = registry.join(session.id(), chat_id);

        drop(session);
        assert!(registry.online_users(chat_id).is_empty());
        assert_eq!(registry.user_session_count(seeker.id), 0);

        // late drop after unregister is harmless
        drop(subscription);
        assert!(registry.room_outbounds(chat_id).is_empty());
    }

    #[test]
    fn multiple_devices_count_as_one_online_user() {
        let registry = SessionRegistry::new();
        let client = user(ParticipantRole::Client);
        let chat_id = Uuid::new_v4();
        let (tx1, _rx1) = unbounded_channel();
        let (tx2, _rx2) = unbounded_channel();

        let phone = registry.register(client, tx1);
        let laptop = registry.register(client, tx2);
        let _a = registry.join(phone.id(), chat_id);
        let _b = registry.join(laptop.id(), chat_id);

        assert_eq!(registry.online_users(chat_id).len(), 1);
        assert_eq!(registry.room_outbounds(chat_id).len(), 2);
        assert_eq!(registry.user_outbounds(client.id).len(), 2);
        assert!(registry.session_outbound(phone.id()).is_some());
    }
}
