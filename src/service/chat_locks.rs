// service/chat_locks.rs
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per chat. Every mutation of a chat, and the broadcasts it
/// produces, happen while holding that chat's guard. An entry lives only while
/// some task holds or waits for it.
#[derive(Debug, Default)]
pub struct ChatLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl ChatLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn lock(&self, chat_id: Uuid) -> ChatGuard<'_> {
        let lock = self.map().entry(chat_id).or_default().clone();
        let guard = lock.lock_owned().await;

        ChatGuard {
            locks: self,
            chat_id,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.map().len()
    }
}

/// Holds a chat's mutex. Dropping it releases the mutex and forgets the
/// chat's entry when nobody else is waiting on it.
#[derive(Debug)]
pub struct ChatGuard<'a> {
    locks: &'a ChatLocks,
    chat_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ChatGuard<'_> {
    fn drop(&mut self) {
        // clones are only taken under the map lock, so the count is stable here
        let mut locks = self.locks.map();
        drop(self.guard.take());

        if locks
            .get(&self.chat_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.chat_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_chat_is_serialized() {
        let locks = Arc::new(ChatLocks::new());
        let chat_id = Uuid::new_v4();

        let guard = locks.lock(chat_id).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(chat_id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn entry_survives_while_a_waiter_is_queued() {
        let locks = Arc::new(ChatLocks::new());
        let chat_id = Uuid::new_v4();

        let guard = locks.lock(chat_id).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(chat_id).await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(guard);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn different_chats_do_not_block() {
        let locks = ChatLocks::new();
        let _first = locks.lock(Uuid::new_v4()).await;
        let second = tokio::time::timeout(Duration::from_millis(50), locks.lock(Uuid::new_v4())).await;
        assert!(second.is_ok());
    }
}
