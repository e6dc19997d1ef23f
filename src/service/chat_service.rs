// service/chat_service.rs
use std::sync::Arc;

use serde::Serialize;
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

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatStatusView {
    pub status: ChatStatus,
    pub offer_status: OfferStatus,
    pub offer_amount: Option<f64>,
}

/// The only moves a chat request can make: out of `pending`, exactly once.
pub fn transition(chat: &mut Chat, to: ChatStatus) -> Result<(), ServiceError> {
    match (chat.status, to) {
        (ChatStatus::Pending, ChatStatus::Approved) | (ChatStatus::Pending, ChatStatus::Rejected) => {
            chat.status = to;
            Ok(())
        }
        (from, to) => Err(ServiceError::StateConflict(format!(
            "Chat cannot move from {} to {}",
            from.to_str(),
            to.to_str()
        ))),
    }
}

#[derive(Debug, Clone)]
pub struct ChatService {
    db_client: Arc<dyn Database>,
    clock: Arc<dyn Clock>,
    locks: Arc<ChatLocks>,
    broadcaster: Broadcaster,
    notification_service: Arc<NotificationService>,
}

impl ChatService {
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

    /// Opens a pending chat request from `initiator` to `recipient_id`.
    pub async fn create(
        &self,
        initiator: AuthUser,
        recipient_id: Uuid,
        job_id: Option<Uuid>,
    ) -> Result<Chat, ServiceError> {
        if initiator.id == recipient_id {
            return Err(ServiceError::Validation(
                "You cannot start a chat with yourself".to_string(),
            ));
        }

        let chat = Chat::new(
            initiator.id,
            initiator.role,
            recipient_id,
            job_id,
            self.clock.now(),
        );
        let chat = self.db_client.create_chat(&chat).await?;

        tracing::info!(
            "Chat {} requested by {} ({})",
            chat.id,
            initiator.id,
            initiator.role.to_str()
        );

        self.notification_service.notify_chat_request(&chat).await;
        Ok(chat)
    }

    pub async fn approve(&self, chat_id: Uuid, actor: AuthUser) -> Result<Chat, ServiceError> {
        self.respond(chat_id, actor, ChatStatus::Approved).await
    }

    pub async fn reject(&self, chat_id: Uuid, actor: AuthUser) -> Result<Chat, ServiceError> {
        self.respond(chat_id, actor, ChatStatus::Rejected).await
    }

    async fn respond(
        &self,
        chat_id: Uuid,
        actor: AuthUser,
        to: ChatStatus,
    ) -> Result<Chat, ServiceError> {
        let _guard = self.locks.lock(chat_id).await;
        let mut chat = load_chat_for(self.db_client.as_ref(), chat_id, actor.id).await?;

        if chat.recipient_id() != actor.id {
            return Err(ServiceError::Unauthorized(
                "Only the recipient of a chat request can respond to it".to_string(),
            ));
        }

        transition(&mut chat, to)?;

        let event = match to {
            ChatStatus::Rejected => SystemEvent::ChatRejected { by: actor.id },
            _ => SystemEvent::ChatApproved { by: actor.id },
        };
        let message = system_message(&mut chat, actor.id, event, self.clock.now());
        self.db_client.record_chat_event(&chat, &message).await?;

        tracing::info!("Chat {} {} by {}", chat_id, to.to_str(), actor.id);

        self.broadcaster
            .to_room(chat_id, ServerEvent::ReceiveMessage(message));
        let status_event = match to {
            ChatStatus::Rejected => ServerEvent::ChatRejected {
                chat_id,
                status: chat.status,
            },
            _ => ServerEvent::ChatApproved {
                chat_id,
                status: chat.status,
            },
        };
        self.broadcaster.to_room(chat_id, status_event);

        Ok(chat)
    }

    /// Hides the chat for the participant holding `role`. The other side keeps
    /// its view and the chat status is untouched.
    pub async fn delete_chat(
        &self,
        chat_id: Uuid,
        actor: AuthUser,
        role: ParticipantRole,
    ) -> Result<Chat, ServiceError> {
        let _guard = self.locks.lock(chat_id).await;
        let mut chat = load_chat_for(self.db_client.as_ref(), chat_id, actor.id).await?;

        if chat.role_of(actor.id) != Some(role) {
            return Err(ServiceError::Unauthorized(format!(
                "You are not the {} of chat {}",
                role.to_str(),
                chat_id
            )));
        }

        let flag = match role {
            ParticipantRole::Client => &mut chat.deleted_by_client,
            ParticipantRole::JobSeeker => &mut chat.deleted_by_job_seeker,
        };
        if !*flag {
            *flag = true;
            self.db_client.update_chat(&chat).await?;
            tracing::debug!("Chat {} hidden for {}", chat_id, actor.id);
        }

        Ok(chat)
    }

    pub async fn status(&self, chat_id: Uuid, viewer: AuthUser) -> Result<ChatStatusView, ServiceError> {
        let chat = load_chat_for(self.db_client.as_ref(), chat_id, viewer.id).await?;
        Ok(ChatStatusView {
            status: chat.status,
            offer_status: chat.offer_status,
            offer_amount: chat.offer_amount,
        })
    }

    pub async fn list(
        &self,
        viewer: AuthUser,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Chat>, ServiceError> {
        Ok(self
            .db_client
            .get_user_chats(viewer.id, limit, offset)
            .await?)
    }

    /// The chat, if `user` takes part in it.
    pub async fn get_chat_for(&self, chat_id: Uuid, user: AuthUser) -> Result<Chat, ServiceError> {
        load_chat_for(self.db_client.as_ref(), chat_id, user.id).await
    }
}
