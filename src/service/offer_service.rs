// service/offer_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::db::Database,
    models::chatmodels::*,
    realtime::{broadcast::Broadcaster, events::ServerEvent},
    service::{
        chat_locks::ChatLocks,
        error::ServiceError,
        message_service::{load_chat_for, system_message},
        notification_service::NotificationService,
    },
    utils::{clock::Clock, token::AuthUser},
};

/// Offer transitions: a new offer may be made from `none` or a settled
/// offer, and only a `pending` offer can be settled.
pub fn open_offer(chat: &mut Chat, amount: f64) -> Result<(), ServiceError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ServiceError::Validation(
            "Offer amount must be greater than zero".to_string(),
        ));
    }
    if chat.status != ChatStatus::Approved {
        return Err(ServiceError::ChatNotApproved(chat.id));
    }
    if chat.offer_status == OfferStatus::Pending {
        return Err(ServiceError::StateConflict(
            "An offer is already waiting for a response".to_string(),
        ));
    }

    chat.offer_status = OfferStatus::Pending;
    chat.offer_amount = Some(amount);
    Ok(())
}

pub fn settle_offer(chat: &mut Chat, to: OfferStatus) -> Result<f64, ServiceError> {
    if chat.offer_status != OfferStatus::Pending {
        return Err(ServiceError::StateConflict(format!(
            "There is no pending offer to respond to (offer is {})",
            chat.offer_status.to_str()
        )));
    }

    chat.offer_status = to;
    Ok(chat.offer_amount.unwrap_or_default())
}

#[derive(Debug, Clone)]
pub struct OfferService {
    db_client: Arc<dyn Database>,
    clock: Arc<dyn Clock>,
    locks: Arc<ChatLocks>,
    broadcaster: Broadcaster,
    notification_service: Arc<NotificationService>,
}

impl OfferService {
    pub fn new(
        db_client: Arc<dyn Database>,
        clock: Arc<dyn Clock>,
        locks: Arc<ChatLocks>,
        broadcaster: Broadcaster,
        notification_service: Arc<NotificationService>,
    ) -> Self {
        Self {
            db_client,
            clock,
            locks,
            broadcaster,
            notification_service,
        }
    }

    /// The job-seeker names a price for the job.
    pub async fn make_offer(
        &self,
        chat_id: Uuid,
        actor: AuthUser,
        amount: f64,
        job_request_id: Option<Uuid>,
    ) -> Result<Chat, ServiceError> {
        let _guard = self.locks.lock(chat_id).await;
        let mut chat = load_chat_for(self.db_client.as_ref(), chat_id, actor.id).await?;

        if chat.role_of(actor.id) != Some(ParticipantRole::JobSeeker) {
            return Err(ServiceError::Unauthorized(
                "Only the job seeker can make an offer".to_string(),
            ));
        }

        open_offer(&mut chat, amount)?;

        let message = system_message(
            &mut chat,
            actor.id,
            SystemEvent::OfferMade {
                amount,
                job_request_id,
            },
            self.clock.now(),
        );
        self.db_client.record_chat_event(&chat, &message).await?;

        tracing::info!("Offer of {} made in chat {}", amount, chat_id);

        self.broadcaster
            .to_room(chat_id, ServerEvent::ReceiveMessage(message));
        self.broadcaster.to_user(
            chat.client_id,
            ServerEvent::ClientOfferNotification {
                chat_id,
                offer_amount: amount,
                status: chat.offer_status,
            },
        );
        self.notification_service.notify_offer_made(&chat, amount).await;

        Ok(chat)
    }

    pub async fn accept_offer(&self, chat_id: Uuid, actor: AuthUser) -> Result<Chat, ServiceError> {
        self.respond(chat_id, actor, OfferStatus::Accepted).await
    }

    pub async fn reject_offer(&self, chat_id: Uuid, actor: AuthUser) -> Result<Chat, ServiceError> {
        self.respond(chat_id, actor, OfferStatus::Rejected).await
    }

    async fn respond(
        &self,
        chat_id: Uuid,
        actor: AuthUser,
        to: OfferStatus,
    ) -> Result<Chat, ServiceError> {
        let _guard = self.locks.lock(chat_id).await;
        let mut chat = load_chat_for(self.db_client.as_ref(), chat_id, actor.id).await?;

        if chat.role_of(actor.id) != Some(ParticipantRole::Client) {
            return Err(ServiceError::Unauthorized(
                "Only the client can respond to an offer".to_string(),
            ));
        }

        let amount = settle_offer(&mut chat, to)?;
        let accepted = to == OfferStatus::Accepted;

        let event = if accepted {
            SystemEvent::OfferAccepted { amount }
        } else {
            SystemEvent::OfferRejected { amount }
        };
        let message = system_message(&mut chat, actor.id, event, self.clock.now());
        self.db_client.record_chat_event(&chat, &message).await?;

        tracing::info!("Offer in chat {} {}", chat_id, to.to_str());

        self.broadcaster
            .to_room(chat_id, ServerEvent::ReceiveMessage(message));
        let status_event = if accepted {
            ServerEvent::OfferAccepted {
                chat_id,
                offer_amount: chat.offer_amount,
                offer_status: chat.offer_status,
            }
        } else {
            ServerEvent::OfferRejected {
                chat_id,
                offer_amount: chat.offer_amount,
                offer_status: chat.offer_status,
            }
        };
        self.broadcaster.to_room(chat_id, status_event);
        self.notification_service
            .notify_offer_response(&chat, amount, accepted)
            .await;

        Ok(chat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::notificationmodels::NotificationType, service::test_support::Harness};

    #[tokio::test]
    async fn offer_sequence() {
        let h = Harness::new();
        let chat = h.approved_chat().await;

        let err = h.offers.accept_offer(chat.id, h.client).await.unwrap_err();
        assert!(matches!(err, ServiceError::StateConflict(_)));

        let chat_state = h.offers.make_offer(chat.id, h.seeker, 500.0, None).await.unwrap();
        assert_eq!(chat_state.offer_status, OfferStatus::Pending);

        let err = h.offers.make_offer(chat.id, h.seeker, 600.0, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::StateConflict(_)));

        let chat_state = h.offers.reject_offer(chat.id, h.client).await.unwrap();
        assert_eq!(chat_state.offer_status, OfferStatus::Rejected);

        let chat_state = h.offers.make_offer(chat.id, h.seeker, 700.0, None).await.unwrap();
        assert_eq!(chat_state.offer_status, OfferStatus::Pending);
        assert_eq!(chat_state.offer_amount, Some(700.0));

        let chat_state = h.offers.accept_offer(chat.id, h.client).await.unwrap();
        assert_eq!(chat_state.offer_status, OfferStatus::Accepted);

        let view = h.chats.status(chat.id, h.seeker).await.unwrap();
        assert_eq!(view.offer_status, OfferStatus::Accepted);
        assert_eq!(view.offer_amount, Some(700.0));

        let kinds: Vec<SystemEvent> = h
            .messages
            .history(chat.id, h.client)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|m| m.system_event.map(|e| e.0))
            .collect();
        assert_eq!(
            kinds,
            vec![
                SystemEvent::ChatApproved { by: h.client.id },
                SystemEvent::OfferMade { amount: 500.0, job_request_id: None },
                SystemEvent::OfferRejected { amount: 500.0 },
                SystemEvent::OfferMade { amount: 700.0, job_request_id: None },
                SystemEvent::OfferAccepted { amount: 700.0 },
            ]
        );
    }

    #[tokio::test]
    async fn offers_need_an_approved_chat_and_the_right_roles() {
        let h = Harness::new();
        let chat = h.pending_chat().await;

        let err = h.offers.make_offer(chat.id, h.seeker, 500.0, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::ChatNotApproved(_)));

        h.chats.approve(chat.id, h.client).await.unwrap();

        let err = h.offers.make_offer(chat.id, h.client, 500.0, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let err = h.offers.make_offer(chat.id, h.seeker, 0.0, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        h.offers.make_offer(chat.id, h.seeker, 500.0, None).await.unwrap();
        let err = h.offers.accept_offer(chat.id, h.seeker).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn client_hears_about_offers_on_every_session() {
        let h = Harness::new();
        let job = Uuid::new_v4();
        let chat = h.chats.create(h.seeker, h.client.id, Some(job)).await.unwrap();
        h.chats.approve(chat.id, h.client).await.unwrap();

        // one session outside the room
        let mut lobby_rx = h.session(h.client);
        let mut seeker_rx = h.connect(h.seeker, chat.id);

        h.offers.make_offer(chat.id, h.seeker, 250.0, Some(job)).await.unwrap();

        let expected = ServerEvent::ClientOfferNotification {
            chat_id: chat.id,
            offer_amount: 250.0,
            status: OfferStatus::Pending,
        };
        assert!(Harness::drain(&mut lobby_rx).contains(&expected));
        assert!(!Harness::drain(&mut seeker_rx).contains(&expected));

        let (inbox, _) = h.notifications.list(h.client.id, 20, 0).await.unwrap();
        let offer = inbox
            .iter()
            .find(|n| n.notification_type == NotificationType::OfferMade)
            .unwrap();
        assert_eq!(offer.related_ids[0], job);

        h.offers.reject_offer(chat.id, h.client).await.unwrap();
        let (inbox, _) = h.notifications.list(h.seeker.id, 20, 0).await.unwrap();
        assert_eq!(inbox[0].notification_type, NotificationType::Offer);
    }
}
