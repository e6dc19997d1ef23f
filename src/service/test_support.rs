// service/test_support.rs
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use uuid::Uuid;

use super::{
    chat_service::ChatService, message_service::MessageService,
    notification_service::NotificationService, offer_service::OfferService, Services,
};
use crate::{
    db::memory::MemoryStore,
    models::chatmodels::{Chat, ParticipantRole},
    realtime::{
        events::ServerEvent,
        sessions::{RoomSubscription, SessionGuard, SessionRegistry},
    },
    utils::{clock::ManualClock, image_utils::ImageStore, token::AuthUser},
};

#[derive(Debug, Default)]
pub struct MemoryImageStore {
    files: Mutex<Vec<(Uuid, Vec<u8>)>>,
}

impl MemoryImageStore {
    pub fn stored(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn store(&self, chat_id: Uuid, bytes: Vec<u8>, extension: &str) -> Result<String, String> {
        let id = Uuid::new_v4();
        self.files.lock().unwrap().push((id, bytes));
        Ok(format!("/uploads/{}/{}.{}", chat_id, id, extension))
    }
}

/// Services over the in-memory store with a frozen clock and three users.
pub struct Harness {
    pub services: Services,
    pub clock: Arc<ManualClock>,
    pub sessions: SessionRegistry,
    pub images: Arc<MemoryImageStore>,
    pub chats: Arc<ChatService>,
    pub offers: Arc<OfferService>,
    pub messages: Arc<MessageService>,
    pub notifications: Arc<NotificationService>,
    pub client: AuthUser,
    pub seeker: AuthUser,
    pub stranger: AuthUser,
    held: Mutex<Vec<(SessionGuard, Option<RoomSubscription>)>>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let sessions = SessionRegistry::new();
        let images = Arc::new(MemoryImageStore::default());
        let services = Services::new(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            sessions.clone(),
            images.clone(),
            1,
        );

        Self {
            clock,
            sessions,
            images,
            chats: services.chat_service.clone(),
            offers: services.offer_service.clone(),
            messages: services.message_service.clone(),
            notifications: services.notification_service.clone(),
            services,
            client: AuthUser {
                id: Uuid::new_v4(),
                role: ParticipantRole::Client,
            },
            seeker: AuthUser {
                id: Uuid::new_v4(),
                role: ParticipantRole::JobSeeker,
            },
            stranger: AuthUser {
                id: Uuid::new_v4(),
                role: ParticipantRole::Client,
            },
            held: Mutex::new(Vec::new()),
        }
    }

    /// A chat request from the job seeker to the client.
    pub async fn pending_chat(&self) -> Chat {
        self.chats
            .create(self.seeker, self.client.id, None)
            .await
            .unwrap()
    }

    pub async fn approved_chat(&self) -> Chat {
        let chat = self.pending_chat().await;
        self.chats.approve(chat.id, self.client).await.unwrap()
    }

    /// A session that has not joined any room.
    pub fn session(&self, user: AuthUser) -> UnboundedReceiver<ServerEvent> {
        let (tx, rx) = unbounded_channel();
        let guard = self.sessions.register(user, tx);
        self.held.lock().unwrap().push((guard, None));
        rx
    }

    /// A session joined to the chat room.
    pub fn connect(&self, user: AuthUser, chat_id: Uuid) -> UnboundedReceiver<ServerEvent> {
        let (tx, rx) = unbounded_channel();
        let guard = self.sessions.register(user, tx);
        let room = self.sessions.join(guard.id(), chat_id);
        self.held.lock().unwrap().push((guard, Some(room)));
        rx
    }

    pub fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn received_message_ids(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<Uuid> {
        Self::drain(rx)
            .into_iter()
            .filter_map(|event| match event {
                ServerEvent::ReceiveMessage(message) => Some(message.id),
                _ => None,
            })
            .collect()
    }
}
