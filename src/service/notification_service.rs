// service/notification_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::db::Database,
    models::{chatmodels::Chat, notificationmodels::*},
    service::error::ServiceError,
    utils::clock::Clock,
};

#[derive(Debug, Clone)]
pub struct NotificationService {
    db_client: Arc<dyn Database>,
    clock: Arc<dyn Clock>,
}

impl NotificationService {
    pub fn new(db_client: Arc<dyn Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db_client, clock }
    }

    pub async fn notify_chat_request(&self, chat: &Chat) {
        tracing::info!(
            "Chat request notification: {} -> {} (chat {})",
            chat.initiator_id,
            chat.recipient_id(),
            chat.id
        );

        self.store_notification(
            chat.recipient_id(),
            NotificationType::ChatRequest,
            "New chat request".to_string(),
            "Someone wants to chat with you about a job".to_string(),
            chat,
        )
        .await
    }

    pub async fn notify_offer_made(&self, chat: &Chat, amount: f64) {
        tracing::info!("Offer notification: {} offered in chat {}", amount, chat.id);

        self.store_notification(
            chat.client_id,
            NotificationType::OfferMade,
            "New offer".to_string(),
            format!("You received an offer of {}", amount),
            chat,
        )
        .await
    }

    pub async fn notify_offer_response(&self, chat: &Chat, amount: f64, accepted: bool) {
        let verb = if accepted { "accepted" } else { "rejected" };
        tracing::info!("Offer response notification: offer {} in chat {}", verb, chat.id);

        self.store_notification(
            chat.job_seeker_id,
            NotificationType::Offer,
            format!("Offer {}", verb),
            format!("Your offer of {} was {}", amount, verb),
            chat,
        )
        .await
    }

    /// Inbox writes are best effort: a failure is logged and never fails the
    /// chat operation that triggered it.
    async fn store_notification(
        &self,
        user_id: Uuid,
        notification_type: NotificationType,
        title: String,
        message: String,
        chat: &Chat,
    ) {
        let related_ids = chat.job_id.into_iter().chain([chat.id]).collect();

        let notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            notification_type,
            notification_title: title,
            notification_message: message,
            related_ids,
            is_read: false,
            created_at: self.clock.now(),
        };

        if let Err(e) = self.db_client.create_notification(&notification).await {
            tracing::warn!("Failed to store notification for {}: {}", user_id, e);
        }
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Notification>, i64), ServiceError> {
        let notifications = self
            .db_client
            .get_user_notifications(user_id, limit, offset)
            .await?;
        let unread = self.db_client.count_unread_notifications(user_id).await?;
        Ok((notifications, unread))
    }

    pub async fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        let updated = self
            .db_client
            .mark_notification_read(notification_id, user_id)
            .await?;

        if !updated {
            return Err(ServiceError::NotificationNotFound(notification_id));
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        Ok(self.db_client.mark_all_notifications_read(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::memory::MemoryStore,
        models::chatmodels::ParticipantRole,
        utils::clock::SystemClock,
    };

    fn service() -> NotificationService {
        NotificationService::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn chat_request_goes_to_recipient_with_job_first() {
        let service = service();
        let seeker = Uuid::new_v4();
        let client = Uuid::new_v4();
        let job = Uuid::new_v4();
        let chat = Chat::new(seeker, ParticipantRole::JobSeeker, client, Some(job), chrono::Utc::now());

        service.notify_chat_request(&chat).await;

        let (inbox, unread) = service.list(client, 20, 0).await.unwrap();
        assert_eq!(unread, 1);
        assert_eq!(inbox[0].notification_type, NotificationType::ChatRequest);
        assert_eq!(inbox[0].related_ids, vec![job, chat.id]);
        assert!(service.list(seeker, 20, 0).await.unwrap().0.is_empty());
    }

    #[tokio::test]
    async fn marking_read_is_scoped_to_owner() {
        let service = service();
        let seeker = Uuid::new_v4();
        let client = Uuid::new_v4();
        let chat = Chat::new(seeker, ParticipantRole::JobSeeker, client, None, chrono::Utc::now());

        service.notify_offer_made(&chat, 500.0).await;
        service.notify_offer_response(&chat, 500.0, true).await;

        let (inbox, _) = service.list(client, 20, 0).await.unwrap();
        let id = inbox[0].id;
        assert_eq!(inbox[0].related_ids, vec![chat.id]);

        let err = service.mark_read(id, seeker).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotificationNotFound(_)));

        service.mark_read(id, client).await.unwrap();
        assert_eq!(service.list(client, 20, 0).await.unwrap().1, 0);
        assert_eq!(service.mark_all_read(seeker).await.unwrap(), 1);
    }
}
