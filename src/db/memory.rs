// db/memory.rs
//! In-process store used when no `DATABASE_URL` is configured, and by tests.
//! A single lock guards all state so every read sees a consistent snapshot.
use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::{chatdb::ChatExt, notificationdb::NotificationExt};
use crate::models::{chatmodels::*, notificationmodels::*};

#[derive(Debug, Default)]
struct MemoryState {
    chats: HashMap<Uuid, Chat>,
    messages: HashMap<Uuid, Message>,
    // message ids per chat, in insertion order
    chat_messages: HashMap<Uuid, Vec<Uuid>>,
    notifications: Vec<Notification>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MemoryState {
    fn store_chat(&mut self, chat: &Chat) -> Result<(), Error> {
        match self.chats.get_mut(&chat.id) {
            Some(existing) => {
                *existing = chat.clone();
                Ok(())
            }
            None => Err(Error::RowNotFound),
        }
    }

    fn store_message(&mut self, message: &Message) {
        let mut message = message.clone();
        message.read_by.clear();
        self.chat_messages
            .entry(message.chat_id)
            .or_default()
            .push(message.id);
        self.messages.insert(message.id, message);
    }
}

#[async_trait]
impl ChatExt for MemoryStore {
    async fn create_chat(&self, chat: &Chat) -> Result<Chat, Error> {
        let mut state = self.write();
        state.chats.insert(chat.id, chat.clone());
        Ok(chat.clone())
    }

    async fn get_chat_by_id(&self, chat_id: Uuid) -> Result<Option<Chat>, Error> {
        Ok(self.read().chats.get(&chat_id).cloned())
    }

    async fn get_user_chats(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Chat>, Error> {
        let state = self.read();
        let mut chats: Vec<Chat> = state
            .chats
            .values()
            .filter(|chat| chat.is_participant(user_id) && !chat.is_hidden_for(user_id))
            .cloned()
            .collect();

        chats.sort_by(|a, b| {
            b.last_message_at
                .cmp(&a.last_message_at)
                .then(b.created_at.cmp(&a.created_at))
        });

        Ok(chats
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn update_chat(&self, chat: &Chat) -> Result<(), Error> {
        self.write().store_chat(chat)
    }

    async fn record_chat_event(&self, chat: &Chat, message: &Message) -> Result<(), Error> {
        let mut state = self.write();
        state.store_chat(chat)?;
        state.store_message(message);
        Ok(())
    }

    async fn insert_message(&self, message: &Message) -> Result<(), Error> {
        let mut state = self.write();
        let chat = state
            .chats
            .get_mut(&message.chat_id)
            .ok_or(Error::RowNotFound)?;
        chat.last_message_at = Some(message.sent_at);
        state.store_message(message);
        Ok(())
    }

    async fn get_message_by_id(&self, message_id: Uuid) -> Result<Option<Message>, Error> {
        Ok(self.read().messages.get(&message_id).cloned())
    }

    async fn get_chat_messages(&self, chat_id: Uuid) -> Result<Vec<Message>, Error> {
        let state = self.read();
        let mut messages: Vec<Message> = state
            .chat_messages
            .get(&chat_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.messages.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();

        // stable sort keeps insertion order for equal timestamps
        messages.sort_by_key(|message| message.sent_at);
        Ok(messages)
    }

    async fn update_message(&self, message: &Message) -> Result<(), Error> {
        let mut state = self.write();
        let stored = state
            .messages
            .get_mut(&message.id)
            .ok_or(Error::RowNotFound)?;

        stored.content = message.content.clone();
        stored.delivered_at = message.delivered_at;
        stored.deleted_by_sender = message.deleted_by_sender;
        stored.deleted_by_receiver = message.deleted_by_receiver;
        stored.deleted_for_everyone = message.deleted_for_everyone;
        Ok(())
    }

    async fn insert_read_statuses(
        &self,
        statuses: &[ReadStatus],
    ) -> Result<Vec<ReadStatus>, Error> {
        let mut state = self.write();
        let mut inserted = Vec::new();

        for status in statuses {
            if let Some(message) = state.messages.get_mut(&status.message_id) {
                if !message.has_read_status_for(status.participant_id) {
                    message.read_by.push(status.clone());
                    inserted.push(status.clone());
                }
            }
        }

        Ok(inserted)
    }
}

#[async_trait]
impl NotificationExt for MemoryStore {
    async fn create_notification(&self, notification: &Notification) -> Result<(), Error> {
        self.write().notifications.push(notification.clone());
        Ok(())
    }

    async fn get_user_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, Error> {
        let state = self.read();
        // newest first; pushes happen in creation order
        Ok(state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count_unread_notifications(&self, user_id: Uuid) -> Result<i64, Error> {
        Ok(self
            .read()
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as i64)
    }

    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, Error> {
        let mut state = self.write();
        match state
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.user_id == user_id)
        {
            Some(notification) => {
                notification.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<u64, Error> {
        let mut state = self.write();
        let mut updated = 0;
        for notification in state.notifications.iter_mut() {
            if notification.user_id == user_id && !notification.is_read {
                notification.is_read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }
}
