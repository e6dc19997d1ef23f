pub mod chat_locks;
pub mod chat_service;
pub mod error;
pub mod message_service;
pub mod notification_service;
pub mod offer_service;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use crate::{
    db::db::Database,
    realtime::{broadcast::Broadcaster, sessions::SessionRegistry},
    utils::{clock::Clock, image_utils::ImageStore},
};

use self::{
    chat_locks::ChatLocks, chat_service::ChatService, message_service::MessageService,
    notification_service::NotificationService, offer_service::OfferService,
};

#[derive(Debug, Clone)]
pub struct Services {
    pub chat_service: Arc<ChatService>,
    pub offer_service: Arc<OfferService>,
    pub message_service: Arc<MessageService>,
    pub notification_service: Arc<NotificationService>,
}

impl Services {
    pub fn new(
        db_client: Arc<dyn Database>,
        clock: Arc<dyn Clock>,
        sessions: SessionRegistry,
        images: Arc<dyn ImageStore>,
        max_image_mb: usize,
    ) -> Self {
        let locks = Arc::new(ChatLocks::new());
        let broadcaster = Broadcaster::new(sessions.clone());

        let notification_service = Arc::new(NotificationService::new(
            db_client.clone(),
            clock.clone(),
        ));

        let chat_service = Arc::new(ChatService::new(
            db_client.clone(),
            clock.clone(),
            locks.clone(),
            broadcaster.clone(),
            notification_service.clone(),
        ));

        let offer_service = Arc::new(OfferService::new(
            db_client.clone(),
            clock.clone(),
            locks.clone(),
            broadcaster,
            notification_service.clone(),
        ));

        let message_service = Arc::new(MessageService::new(
            db_client,
            clock,
            locks,
            sessions,
            images,
            max_image_mb,
        ));

        Self {
            chat_service,
            offer_service,
            message_service,
            notification_service,
        }
    }
}
