// service/message_service.rs
use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Duration, SubsecRound, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    db::db::Database,
    models::chatmodels::*,
    realtime::{broadcast::Broadcaster, events::ServerEvent, sessions::SessionRegistry},
    service::{chat_locks::ChatLocks, error::ServiceError},
    utils::{
        clock::Clock,
        image_utils::{self, ImageStore},
        token::AuthUser,
    },
};

pub const MAX_TEXT_LENGTH: usize = 5000;

/// Timestamp for the next message of `chat`: the current time, bumped past
/// the chat's last message so that `sent_at` strictly increases.
pub(crate) fn next_sent_at(chat: &Chat, now: DateTime<Utc>) -> DateTime<Utc> {
    // Postgres keeps microseconds
    let now = now.trunc_subsecs(6);
    match chat.last_message_at {
        Some(last) if now <= last => last + Duration::microseconds(1),
        _ => now,
    }
}

/// Builds the system message that records `event` in the transcript and
/// advances the chat's `last_message_at` to it.
pub(crate) fn system_message(
    chat: &mut Chat,
    actor_id: Uuid,
    event: SystemEvent,
    now: DateTime<Utc>,
) -> Message {
    let sent_at = next_sent_at(chat, now);
    chat.last_message_at = Some(sent_at);

    Message {
        id: Uuid::new_v4(),
        chat_id: chat.id,
        sender_id: actor_id,
        message_type: MessageType::System,
        content: event.describe(),
        system_event: Some(Json(event)),
        sent_at,
        delivered_at: None,
        deleted_by_sender: false,
        deleted_by_receiver: false,
        deleted_for_everyone: false,
        read_by: Vec::new(),
    }
}

/// Loads a chat and checks that `user_id` takes part in it.
pub(crate) async fn load_chat_for(
    db_client: &dyn Database,
    chat_id: Uuid,
    user_id: Uuid,
) -> Result<Chat, ServiceError> {
    let chat = db_client
        .get_chat_by_id(chat_id)
        .await?
        .ok_or(ServiceError::ChatNotFound(chat_id))?;

    if !chat.is_participant(user_id) {
        return Err(ServiceError::not_participant(chat_id));
    }
    Ok(chat)
}

fn validate_content(content: &str, message_type: MessageType) -> Result<(), ServiceError> {
    match message_type {
        MessageType::System => Err(ServiceError::Validation(
            "System messages cannot be sent by users".to_string(),
        )),
        MessageType::Text => {
            if content.trim().is_empty() {
                return Err(ServiceError::Validation("Message cannot be empty".to_string()));
            }
            if content.chars().count() > MAX_TEXT_LENGTH {
                return Err(ServiceError::Validation(format!(
                    "Message cannot exceed {} characters",
                    MAX_TEXT_LENGTH
                )));
            }
            Ok(())
        }
        MessageType::Image => {
            if content.trim().is_empty() {
                return Err(ServiceError::Validation("Image path cannot be empty".to_string()));
            }
            Ok(())
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageService {
    db_client: Arc<dyn Database>,
    clock: Arc<dyn Clock>,
    locks: Arc<ChatLocks>,
    sessions: SessionRegistry,
    broadcaster: Broadcaster,
    images: Arc<dyn ImageStore>,
    max_image_mb: usize,
}

impl MessageService {
    pub fn new(
        db_client: Arc<dyn Database>,
        clock: Arc<dyn Clock>,
        locks: Arc<ChatLocks>,
        sessions: SessionRegistry,
        images: Arc<dyn ImageStore>,
        max_image_mb: usize,
    ) -> Self {
        Self {
            db_client,
            clock,
            locks,
            broadcaster: Broadcaster::new(sessions.clone()),
            sessions,
            images,
            max_image_mb,
        }
    }

    pub async fn send(
        &self,
        chat_id: Uuid,
        sender: AuthUser,
        content: String,
        message_type: MessageType,
    ) -> Result<Message, ServiceError> {
        validate_content(&content, message_type)?;

        let _guard = self.locks.lock(chat_id).await;
        let chat = load_chat_for(self.db_client.as_ref(), chat_id, sender.id).await?;

        if chat.status != ChatStatus::Approved {
            return Err(ServiceError::ChatNotApproved(chat_id));
        }

        let sent_at = next_sent_at(&chat, self.clock.now());
        let recipient_online = chat
            .other_participant(sender.id)
            .map_or(false, |other| self.sessions.is_user_in_room(chat_id, other));

        let message = Message {
            id: Uuid::new_v4(),
            chat_id,
            sender_id: sender.id,
            message_type,
            content,
            system_event: None,
            sent_at,
            delivered_at: recipient_online.then_some(sent_at),
            deleted_by_sender: false,
            deleted_by_receiver: false,
            deleted_for_everyone: false,
            read_by: Vec::new(),
        };

        self.db_client.insert_message(&message).await?;

        tracing::debug!("Message {} sent in chat {}", message.id, chat_id);

        self.broadcaster
            .to_room(chat_id, ServerEvent::ReceiveMessage(message.clone()));
        if recipient_online {
            self.broadcaster.to_room(
                chat_id,
                ServerEvent::MessageDelivered {
                    message_id: message.id,
                },
            );
        }

        Ok(message)
    }

    /// Marks a message as delivered to `reader`. Only the first call changes
    /// anything; repeats return `false`.
    pub async fn mark_delivered(
        &self,
        message_id: Uuid,
        reader: AuthUser,
    ) -> Result<bool, ServiceError> {
        let message = self
            .db_client
            .get_message_by_id(message_id)
            .await?
            .ok_or(ServiceError::MessageNotFound(message_id))?;

        let _guard = self.locks.lock(message.chat_id).await;
        load_chat_for(self.db_client.as_ref(), message.chat_id, reader.id).await?;

        // re-read under the lock
        let mut message = self
            .db_client
            .get_message_by_id(message_id)
            .await?
            .ok_or(ServiceError::MessageNotFound(message_id))?;

        if message.sender_id == reader.id || message.delivered_at.is_some() {
            return Ok(false);
        }

        message.delivered_at = Some(self.clock.now());
        self.db_client.update_message(&message).await?;
        self.broadcaster
            .to_room(message.chat_id, ServerEvent::MessageDelivered { message_id });

        Ok(true)
    }

    /// Marks every undelivered message the other participant sent as
    /// delivered. Runs when `reader` joins the chat room.
    pub async fn deliver_pending(
        &self,
        chat_id: Uuid,
        reader: AuthUser,
    ) -> Result<Vec<Uuid>, ServiceError> {
        let _guard = self.locks.lock(chat_id).await;
        load_chat_for(self.db_client.as_ref(), chat_id, reader.id).await?;

        let now = self.clock.now();
        let mut delivered = Vec::new();

        for mut message in self.db_client.get_chat_messages(chat_id).await? {
            if message.sender_id == reader.id || message.delivered_at.is_some() {
                continue;
            }

            message.delivered_at = Some(now);
            self.db_client.update_message(&message).await?;
            self.broadcaster.to_room(
                chat_id,
                ServerEvent::MessageDelivered {
                    message_id: message.id,
                },
            );
            delivered.push(message.id);
        }

        Ok(delivered)
    }

    /// Marks every message of the chat the reader has not seen yet.
    pub async fn mark_seen(
        &self,
        chat_id: Uuid,
        reader: AuthUser,
    ) -> Result<Vec<ReadStatus>, ServiceError> {
        self.record_reads(chat_id, reader, None, true).await
    }

    /// Marks the given messages as read. Ids of other chats, unknown ids and
    /// the reader's own messages are ignored.
    pub async fn mark_as_read(
        &self,
        chat_id: Uuid,
        message_ids: &[Uuid],
        reader: AuthUser,
    ) -> Result<Vec<ReadStatus>, ServiceError> {
        let wanted: HashSet<Uuid> = message_ids.iter().copied().collect();
        self.record_reads(chat_id, reader, Some(&wanted), false)
            .await
    }

    async fn record_reads(
        &self,
        chat_id: Uuid,
        reader: AuthUser,
        only: Option<&HashSet<Uuid>>,
        emit_seen: bool,
    ) -> Result<Vec<ReadStatus>, ServiceError> {
        let _guard = self.locks.lock(chat_id).await;
        load_chat_for(self.db_client.as_ref(), chat_id, reader.id).await?;

        let now = self.clock.now();
        let pending: Vec<ReadStatus> = self
            .db_client
            .get_chat_messages(chat_id)
            .await?
            .into_iter()
            .filter(|m| m.sender_id != reader.id)
            .filter(|m| only.map_or(true, |ids| ids.contains(&m.id)))
            .filter(|m| !m.has_read_status_for(reader.id))
            .map(|m| ReadStatus {
                id: Uuid::new_v4(),
                message_id: m.id,
                participant_id: reader.id,
                read_at: Some(now),
            })
            .collect();

        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let inserted = self.db_client.insert_read_statuses(&pending).await?;
        if inserted.is_empty() {
            return Ok(inserted);
        }

        if emit_seen {
            for status in &inserted {
                self.broadcaster.to_room(
                    chat_id,
                    ServerEvent::MessageSeen {
                        message_id: status.message_id,
                        read_status: status.clone(),
                    },
                );
            }
        }

        self.broadcaster.to_room(
            chat_id,
            ServerEvent::MessagesRead {
                chat_id,
                message_ids: inserted.iter().map(|s| s.message_id).collect(),
                read_statuses: inserted.clone(),
            },
        );

        Ok(inserted)
    }

    pub async fn delete_message(
        &self,
        message_id: Uuid,
        chat_id: Uuid,
        actor: AuthUser,
        deletion_type: DeletionType,
    ) -> Result<Message, ServiceError> {
        let _guard = self.locks.lock(chat_id).await;
        load_chat_for(self.db_client.as_ref(), chat_id, actor.id).await?;

        let mut message = self
            .db_client
            .get_message_by_id(message_id)
            .await?
            .filter(|m| m.chat_id == chat_id)
            .ok_or(ServiceError::MessageNotFound(message_id))?;

        if message.is_deleted_for_everyone() {
            return Ok(message);
        }

        let is_sender = message.sender_id == actor.id;

        match deletion_type {
            DeletionType::ForMe => {
                let flag = if is_sender {
                    &mut message.deleted_by_sender
                } else {
                    &mut message.deleted_by_receiver
                };
                if *flag {
                    return Ok(message);
                }
                *flag = true;
            }
            DeletionType::ForEveryone => {
                if !is_sender {
                    return Err(ServiceError::Unauthorized(
                        "Only the sender can delete a message for everyone".to_string(),
                    ));
                }

                let elapsed = self.clock.now() - message.sent_at;
                if elapsed > Duration::seconds(DELETE_FOR_EVERYONE_WINDOW_SECS) {
                    return Err(ServiceError::DeletionWindowExpired(message_id));
                }

                message.deleted_by_sender = true;
                message.deleted_by_receiver = true;
                message.deleted_for_everyone = true;
                message.content = TOMBSTONE_CONTENT.to_string();
            }
        }

        self.db_client.update_message(&message).await?;

        tracing::debug!(
            "Message {} deleted ({:?}) by {}",
            message_id,
            deletion_type,
            actor.id
        );

        self.broadcaster.to_room(
            chat_id,
            ServerEvent::MessageDeleted {
                message_id,
                chat_id,
                updates: message.deletion_updates(),
            },
        );

        Ok(message)
    }

    /// Stores a base64 image and posts it to the chat as an image message.
    pub async fn upload_image(
        &self,
        chat_id: Uuid,
        sender: AuthUser,
        claimed_sender_id: Uuid,
        data: &str,
    ) -> Result<Message, ServiceError> {
        if claimed_sender_id != sender.id {
            return Err(ServiceError::Unauthorized(
                "Images can only be uploaded as yourself".to_string(),
            ));
        }

        // fail before writing anything to disk
        let chat = load_chat_for(self.db_client.as_ref(), chat_id, sender.id).await?;
        if chat.status != ChatStatus::Approved {
            return Err(ServiceError::ChatNotApproved(chat_id));
        }

        let image = image_utils::decode_image(data).map_err(ServiceError::Validation)?;
        image_utils::validate_image_size(&image.bytes, self.max_image_mb)
            .map_err(ServiceError::Validation)?;

        let path = self
            .images
            .store(chat_id, image.bytes, image.extension)
            .await
            .map_err(ServiceError::Storage)?;

        self.send(chat_id, sender, path, MessageType::Image).await
    }

    /// Messages of the chat visible to `viewer`, oldest first.
    pub async fn history(&self, chat_id: Uuid, viewer: AuthUser) -> Result<Vec<Message>, ServiceError> {
        load_chat_for(self.db_client.as_ref(), chat_id, viewer.id).await?;

        Ok(self
            .db_client
            .get_chat_messages(chat_id)
            .await?
            .into_iter()
            .filter(|m| m.is_visible_to(viewer.id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::Harness;

    #[test]
    fn sent_at_moves_past_last_message() {
        let now = Utc::now().trunc_subsecs(6);
        let mut chat = Chat::new(Uuid::new_v4(), ParticipantRole::JobSeeker, Uuid::new_v4(), None, now);

        assert_eq!(next_sent_at(&chat, now), now);

        chat.last_message_at = Some(now);
        assert_eq!(next_sent_at(&chat, now), now + Duration::microseconds(1));

        chat.last_message_at = Some(now + Duration::seconds(10));
        assert!(next_sent_at(&chat, now) > now + Duration::seconds(10));
    }

    #[test]
    fn content_rules() {
        assert!(validate_content("hello", MessageType::Text).is_ok());
        assert!(validate_content("   ", MessageType::Text).is_err());
        assert!(validate_content(&"a".repeat(MAX_TEXT_LENGTH), MessageType::Text).is_ok());
        assert!(validate_content(&"a".repeat(MAX_TEXT_LENGTH + 1), MessageType::Text).is_err());
        assert!(validate_content("ok", MessageType::System).is_err());
    }

    #[tokio::test]
    async fn send_is_blocked_until_approved() {
        let h = Harness::new();
        let chat = h.pending_chat().await;

        let err = h
            .messages
            .send(chat.id, h.seeker, "hello".into(), MessageType::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ChatNotApproved(_)));

        let mut seeker_rx = h.connect(h.seeker, chat.id);
        let mut client_rx = h.connect(h.client, chat.id);

        h.chats.approve(chat.id, h.client).await.unwrap();
        let message = h
            .messages
            .send(chat.id, h.seeker, "hello".into(), MessageType::Text)
            .await
            .unwrap();

        let seeker_ids = Harness::received_message_ids(&mut seeker_rx);
        let client_ids = Harness::received_message_ids(&mut client_rx);
        assert_eq!(seeker_ids.last(), Some(&message.id));
        assert_eq!(client_ids.last(), Some(&message.id));
    }

    #[tokio::test]
    async fn strangers_and_system_messages_are_refused() {
        let h = Harness::new();
        let chat = h.approved_chat().await;

        let err = h
            .messages
            .send(chat.id, h.stranger, "hi".into(), MessageType::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let err = h
            .messages
            .send(chat.id, h.client, "fake".into(), MessageType::System)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = h
            .messages
            .send(Uuid::new_v4(), h.client, "hi".into(), MessageType::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ChatNotFound(_)));
    }

    #[tokio::test]
    async fn sent_at_increases_even_when_clock_stands_still() {
        let h = Harness::new();
        let chat = h.approved_chat().await;

        let mut last = None;
        for i in 0..5 {
            let message = h
                .messages
                .send(chat.id, h.client, format!("msg {}", i), MessageType::Text)
                .await
                .unwrap();
            if let Some(previous) = last {
                assert!(message.sent_at > previous);
            }
            last = Some(message.sent_at);
        }

        let history = h.messages.history(chat.id, h.client).await.unwrap();
        let contents: Vec<&str> = history
            .iter()
            .filter(|m| m.message_type == MessageType::Text)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["msg 0", "msg 1", "msg 2", "msg 3", "msg 4"]);
    }

    #[tokio::test]
    async fn online_recipient_gets_immediate_delivery() {
        let h = Harness::new();
        let chat = h.approved_chat().await;
        let mut seeker_rx = h.connect(h.seeker, chat.id);

        let message = h
            .messages
            .send(chat.id, h.client, "are you there?".into(), MessageType::Text)
            .await
            .unwrap();
        assert!(message.delivered_at.is_some());

        let events = Harness::drain(&mut seeker_rx);
        assert!(events.contains(&ServerEvent::MessageDelivered {
            message_id: message.id
        }));

        assert!(!h.messages.mark_delivered(message.id, h.seeker).await.unwrap());
    }

    #[tokio::test]
    async fn join_delivers_pending_messages_once() {
        let h = Harness::new();
        let chat = h.approved_chat().await;

        let message = h
            .messages
            .send(chat.id, h.client, "offline note".into(), MessageType::Text)
            .await
            .unwrap();
        assert!(message.delivered_at.is_none());

        let delivered = h.messages.deliver_pending(chat.id, h.seeker).await.unwrap();
        assert!(delivered.contains(&message.id));
        assert!(h.messages.deliver_pending(chat.id, h.seeker).await.unwrap().is_empty());
        assert!(!h.messages.mark_delivered(message.id, h.seeker).await.unwrap());
    }

    #[tokio::test]
    async fn mark_delivered_fires_once() {
        let h = Harness::new();
        let chat = h.approved_chat().await;
        let message = h
            .messages
            .send(chat.id, h.client, "ping".into(), MessageType::Text)
            .await
            .unwrap();
        let mut client_rx = h.connect(h.client, chat.id);

        // the sender cannot mark its own message
        assert!(!h.messages.mark_delivered(message.id, h.client).await.unwrap());
        assert!(h.messages.mark_delivered(message.id, h.seeker).await.unwrap());
        assert!(!h.messages.mark_delivered(message.id, h.seeker).await.unwrap());

        let delivered: Vec<_> = Harness::drain(&mut client_rx)
            .into_iter()
            .filter(|e| matches!(e, ServerEvent::MessageDelivered { .. }))
            .collect();
        assert_eq!(delivered.len(), 1);
    }

    #[tokio::test]
    async fn mark_as_read_twice_creates_one_status() {
        let h = Harness::new();
        let chat = h.approved_chat().await;
        let first = h
            .messages
            .send(chat.id, h.client, "one".into(), MessageType::Text)
            .await
            .unwrap();
        let second = h
            .messages
            .send(chat.id, h.client, "two".into(), MessageType::Text)
            .await
            .unwrap();
        let mut client_rx = h.connect(h.client, chat.id);

        let ids = [first.id, second.id, Uuid::new_v4()];
        let created = h.messages.mark_as_read(chat.id, &ids, h.seeker).await.unwrap();
        assert_eq!(created.len(), 2);

        let again = h.messages.mark_as_read(chat.id, &ids, h.seeker).await.unwrap();
        assert!(again.is_empty());

        let history = h.messages.history(chat.id, h.seeker).await.unwrap();
        for message in history.iter().filter(|m| ids.contains(&m.id)) {
            let mine = message
                .read_by
                .iter()
                .filter(|s| s.participant_id == h.seeker.id)
                .count();
            assert_eq!(mine, 1);
        }

        let reads: Vec<_> = Harness::drain(&mut client_rx)
            .into_iter()
            .filter(|e| matches!(e, ServerEvent::MessagesRead { .. }))
            .collect();
        assert_eq!(reads.len(), 1);
    }

    #[tokio::test]
    async fn mark_seen_skips_own_messages_and_emits_per_message() {
        let h = Harness::new();
        let chat = h.approved_chat().await;
        let from_client = h
            .messages
            .send(chat.id, h.client, "from client".into(), MessageType::Text)
            .await
            .unwrap();
        h.messages
            .send(chat.id, h.seeker, "from seeker".into(), MessageType::Text)
            .await
            .unwrap();
        let mut rx = h.connect(h.client, chat.id);

        let created = h.messages.mark_seen(chat.id, h.seeker).await.unwrap();
        let seen_ids: Vec<Uuid> = created.iter().map(|s| s.message_id).collect();
        assert!(seen_ids.contains(&from_client.id));
        assert!(created.iter().all(|s| s.participant_id == h.seeker.id));

        let events = Harness::drain(&mut rx);
        let seen = events
            .iter()
            .filter(|e| matches!(e, ServerEvent::MessageSeen { .. }))
            .count();
        assert_eq!(seen, created.len());
    }

    #[tokio::test]
    async fn unknown_chats_leave_no_lock_entries() {
        let h = Harness::new();
        let chat = h.approved_chat().await;

        for _ in 0..50 {
            let err = h
                .messages
                .send(Uuid::new_v4(), h.client, "hi".into(), MessageType::Text)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::ChatNotFound(_)));

            let err = h.messages.mark_seen(Uuid::new_v4(), h.seeker).await.unwrap_err();
            assert!(matches!(err, ServiceError::ChatNotFound(_)));
        }
        assert_eq!(h.messages.locks.len(), 0);

        h.messages
            .send(chat.id, h.client, "real".into(), MessageType::Text)
            .await
            .unwrap();
        assert_eq!(h.messages.locks.len(), 0);
    }

    #[tokio::test]
    async fn delete_for_everyone_respects_the_window() {
        let h = Harness::new();
        let chat = h.approved_chat().await;

        let early = h
            .messages
            .send(chat.id, h.client, "oops".into(), MessageType::Text)
            .await
            .unwrap();
        h.clock.set(early.sent_at + Duration::seconds(179));
        let deleted = h
            .messages
            .delete_message(early.id, chat.id, h.client, DeletionType::ForEveryone)
            .await
            .unwrap();
        assert!(deleted.is_deleted_for_everyone());
        assert_eq!(deleted.content, TOMBSTONE_CONTENT);

        let late = h
            .messages
            .send(chat.id, h.client, "too late".into(), MessageType::Text)
            .await
            .unwrap();
        h.clock.set(late.sent_at + Duration::seconds(181));
        let err = h
            .messages
            .delete_message(late.id, chat.id, h.client, DeletionType::ForEveryone)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DeletionWindowExpired(_)));

        for viewer in [h.seeker, h.client] {
            let history = h.messages.history(chat.id, viewer).await.unwrap();
            let tombstone = history.iter().find(|m| m.id == early.id).unwrap();
            assert!(tombstone.is_deleted_for_everyone());
            assert_eq!(tombstone.content, TOMBSTONE_CONTENT);
            assert!(history.iter().any(|m| m.id == late.id));
        }
    }

    #[tokio::test]
    async fn both_sides_deleting_for_me_is_not_a_tombstone() {
        let h = Harness::new();
        let chat = h.approved_chat().await;
        let message = h
            .messages
            .send(chat.id, h.client, "private".into(), MessageType::Text)
            .await
            .unwrap();

        h.messages
            .delete_message(message.id, chat.id, h.seeker, DeletionType::ForMe)
            .await
            .unwrap();
        let both = h
            .messages
            .delete_message(message.id, chat.id, h.client, DeletionType::ForMe)
            .await
            .unwrap();
        assert!(both.deleted_by_sender && both.deleted_by_receiver);
        assert!(!both.is_deleted_for_everyone());
        assert_eq!(both.content, "private");

        assert!(h.messages.history(chat.id, h.client).await.unwrap().iter().all(|m| m.id != message.id));
        assert!(h.messages.history(chat.id, h.seeker).await.unwrap().iter().all(|m| m.id != message.id));

        // the sender can still retract it for everyone inside the window
        let retracted = h
            .messages
            .delete_message(message.id, chat.id, h.client, DeletionType::ForEveryone)
            .await
            .unwrap();
        assert!(retracted.is_deleted_for_everyone());
        assert_eq!(retracted.content, TOMBSTONE_CONTENT);
    }

    #[tokio::test]
    async fn only_sender_deletes_for_everyone() {
        let h = Harness::new();
        let chat = h.approved_chat().await;
        let message = h
            .messages
            .send(chat.id, h.client, "mine".into(), MessageType::Text)
            .await
            .unwrap();

        let err = h
            .messages
            .delete_message(message.id, chat.id, h.seeker, DeletionType::ForEveryone)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let err = h
            .messages
            .delete_message(message.id, Uuid::new_v4(), h.client, DeletionType::ForMe)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ChatNotFound(_)));
    }

    #[tokio::test]
    async fn delete_for_me_is_idempotent_and_one_sided() {
        let h = Harness::new();
        let chat = h.approved_chat().await;
        let message = h
            .messages
            .send(chat.id, h.client, "hide me".into(), MessageType::Text)
            .await
            .unwrap();
        let mut rx = h.connect(h.seeker, chat.id);

        let once = h
            .messages
            .delete_message(message.id, chat.id, h.seeker, DeletionType::ForMe)
            .await
            .unwrap();
        let twice = h
            .messages
            .delete_message(message.id, chat.id, h.seeker, DeletionType::ForMe)
            .await
            .unwrap();
        assert_eq!(once.deletion_updates(), twice.deletion_updates());
        assert!(twice.deleted_by_receiver && !twice.deleted_by_sender);

        let deletions = Harness::drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, ServerEvent::MessageDeleted { .. }))
            .count();
        assert_eq!(deletions, 1);

        let seeker_view = h.messages.history(chat.id, h.seeker).await.unwrap();
        let client_view = h.messages.history(chat.id, h.client).await.unwrap();
        assert!(seeker_view.iter().all(|m| m.id != message.id));
        assert!(client_view.iter().any(|m| m.id == message.id));
    }

    #[tokio::test]
    async fn upload_image_posts_an_image_message() {
        let h = Harness::new();
        let chat = h.approved_chat().await;
        let data = format!(
            "data:image/png;base64,{}",
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b"fake-png")
        );

        let err = h
            .messages
            .upload_image(chat.id, h.seeker, h.client.id, &data)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let message = h
            .messages
            .upload_image(chat.id, h.seeker, h.seeker.id, &data)
            .await
            .unwrap();
        assert_eq!(message.message_type, MessageType::Image);
        assert!(message.content.ends_with(".png"));
        assert_eq!(h.images.stored(), 1);

        let err = h
            .messages
            .upload_image(chat.id, h.seeker, h.seeker.id, "data:image/png;base64,###")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
