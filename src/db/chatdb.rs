// db/chatdb.rs
use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::chatmodels::*;

#[async_trait]
pub trait ChatExt: Send + Sync {
    // Chat management
    async fn create_chat(&self, chat: &Chat) -> Result<Chat, Error>;

    async fn get_chat_by_id(&self, chat_id: Uuid) -> Result<Option<Chat>, Error>;

    /// Chats of `user_id` that the user has not hidden, most recent activity first.
    async fn get_user_chats(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Chat>, Error>;

    async fn update_chat(&self, chat: &Chat) -> Result<(), Error>;

    /// Saves the chat and appends the message that records the change, atomically.
    async fn record_chat_event(&self, chat: &Chat, message: &Message) -> Result<(), Error>;

    // Message management
    async fn insert_message(&self, message: &Message) -> Result<(), Error>;

    async fn get_message_by_id(&self, message_id: Uuid) -> Result<Option<Message>, Error>;

    /// All messages of the chat ordered by `sent_at`, with their read statuses.
    async fn get_chat_messages(&self, chat_id: Uuid) -> Result<Vec<Message>, Error>;

    async fn update_message(&self, message: &Message) -> Result<(), Error>;

    /// Inserts read statuses, skipping (message, participant) pairs that already
    /// have one. Returns the rows that were actually inserted.
    async fn insert_read_statuses(
        &self,
        statuses: &[ReadStatus],
    ) -> Result<Vec<ReadStatus>, Error>;
}

#[async_trait]
impl ChatExt for DBClient {
    async fn create_chat(&self, chat: &Chat) -> Result<Chat, Error> {
        sqlx::query_as::<_, Chat>(
            r#"
            INSERT INTO chats (id, client_id, job_seeker_id, initiator_id, job_id, status,
                               offer_amount, offer_status, deleted_by_client,
                               deleted_by_job_seeker, last_message_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, client_id, job_seeker_id, initiator_id, job_id, status,
                      offer_amount, offer_status, deleted_by_client, deleted_by_job_seeker,
                      last_message_at, created_at
            "#
        )
        .bind(chat.id)
        .bind(chat.client_id)
        .bind(chat.job_seeker_id)
        .bind(chat.initiator_id)
        .bind(chat.job_id)
        .bind(chat.status)
        .bind(chat.offer_amount)
        .bind(chat.offer_status)
        .bind(chat.deleted_by_client)
        .bind(chat.deleted_by_job_seeker)
        .bind(chat.last_message_at)
        .bind(chat.created_at)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_chat_by_id(&self, chat_id: Uuid) -> Result<Option<Chat>, Error> {
        sqlx::query_as::<_, Chat>(
            r#"
            SELECT id, client_id, job_seeker_id, initiator_id, job_id, status,
                   offer_amount, offer_status, deleted_by_client, deleted_by_job_seeker,
                   last_message_at, created_at
            FROM chats
            WHERE id = $1
            "#
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_user_chats(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Chat>, Error> {
        sqlx::query_as::<_, Chat>(
            r#"
            SELECT id, client_id, job_seeker_id, initiator_id, job_id, status,
                   offer_amount, offer_status, deleted_by_client, deleted_by_job_seeker,
                   last_message_at, created_at
            FROM chats
            WHERE (client_id = $1 AND deleted_by_client = false)
               OR (job_seeker_id = $1 AND deleted_by_job_seeker = false)
            ORDER BY last_message_at DESC NULLS LAST, created_at DESC
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn update_chat(&self, chat: &Chat) -> Result<(), Error> {
        update_chat_row(&self.pool, chat).await
    }

    async fn record_chat_event(&self, chat: &Chat, message: &Message) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;

        update_chat_row(&mut *tx, chat).await?;
        insert_message_row(&mut *tx, message).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_message(&self, message: &Message) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;

        insert_message_row(&mut *tx, message).await?;

        sqlx::query(
            r#"
            UPDATE chats
            SET last_message_at = $2
            WHERE id = $1
            "#
        )
        .bind(message.chat_id)
        .bind(message.sent_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_message_by_id(&self, message_id: Uuid) -> Result<Option<Message>, Error> {
        let mut tx = self.pool.begin().await?;

        let message = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, chat_id, sender_id, message_type, content, system_event, sent_at,
                   delivered_at, deleted_by_sender, deleted_by_receiver, deleted_for_everyone
            FROM messages
            WHERE id = $1
            "#
        )
        .bind(message_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut message) = message else {
            return Ok(None);
        };

        message.read_by = sqlx::query_as::<_, ReadStatus>(
            r#"
            SELECT id, message_id, participant_id, read_at
            FROM read_statuses
            WHERE message_id = $1
            ORDER BY read_at ASC NULLS LAST
            "#
        )
        .bind(message_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(message))
    }

    async fn get_chat_messages(&self, chat_id: Uuid) -> Result<Vec<Message>, Error> {
        let mut tx = self.pool.begin().await?;

        // Both reads must see the same snapshot.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let mut messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, chat_id, sender_id, message_type, content, system_event, sent_at,
                   delivered_at, deleted_by_sender, deleted_by_receiver, deleted_for_everyone
            FROM messages
            WHERE chat_id = $1
            ORDER BY sent_at ASC, seq ASC
            "#
        )
        .bind(chat_id)
        .fetch_all(&mut *tx)
        .await?;

        let statuses = sqlx::query_as::<_, ReadStatus>(
            r#"
            SELECT rs.id, rs.message_id, rs.participant_id, rs.read_at
            FROM read_statuses rs
            INNER JOIN messages m ON m.id = rs.message_id
            WHERE m.chat_id = $1
            ORDER BY rs.read_at ASC NULLS LAST
            "#
        )
        .bind(chat_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut by_message: HashMap<Uuid, Vec<ReadStatus>> = HashMap::new();
        for status in statuses {
            by_message.entry(status.message_id).or_default().push(status);
        }
        for message in messages.iter_mut() {
            message.read_by = by_message.remove(&message.id).unwrap_or_default();
        }

        Ok(messages)
    }

    async fn update_message(&self, message: &Message) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE messages
            SET content = $2,
                delivered_at = $3,
                deleted_by_sender = $4,
                deleted_by_receiver = $5,
                deleted_for_everyone = $6
            WHERE id = $1
            "#
        )
        .bind(message.id)
        .bind(&message.content)
        .bind(message.delivered_at)
        .bind(message.deleted_by_sender)
        .bind(message.deleted_by_receiver)
        .bind(message.deleted_for_everyone)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_read_statuses(
        &self,
        statuses: &[ReadStatus],
    ) -> Result<Vec<ReadStatus>, Error> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(statuses.len());

        for status in statuses {
            let row = sqlx::query_as::<_, ReadStatus>(
                r#"
                INSERT INTO read_statuses (id, message_id, participant_id, read_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (message_id, participant_id) DO NOTHING
                RETURNING id, message_id, participant_id, read_at
                "#
            )
            .bind(status.id)
            .bind(status.message_id)
            .bind(status.participant_id)
            .bind(status.read_at)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(row) = row {
                inserted.push(row);
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

async fn update_chat_row<'e, E>(executor: E, chat: &Chat) -> Result<(), Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        UPDATE chats
        SET status = $2,
            offer_amount = $3,
            offer_status = $4,
            deleted_by_client = $5,
            deleted_by_job_seeker = $6,
            last_message_at = $7
        WHERE id = $1
        "#
    )
    .bind(chat.id)
    .bind(chat.status)
    .bind(chat.offer_amount)
    .bind(chat.offer_status)
    .bind(chat.deleted_by_client)
    .bind(chat.deleted_by_job_seeker)
    .bind(chat.last_message_at)
    .execute(executor)
    .await?;

    Ok(())
}

async fn insert_message_row<'e, E>(executor: E, message: &Message) -> Result<(), Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO messages (id, chat_id, sender_id, message_type, content, system_event,
                              sent_at, delivered_at, deleted_by_sender, deleted_by_receiver,
                              deleted_for_everyone)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#
    )
    .bind(message.id)
    .bind(message.chat_id)
    .bind(message.sender_id)
    .bind(message.message_type)
    .bind(&message.content)
    .bind(message.system_event.clone())
    .bind(message.sent_at)
    .bind(message.delivered_at)
    .bind(message.deleted_by_sender)
    .bind(message.deleted_by_receiver)
    .bind(message.deleted_for_everyone)
    .execute(executor)
    .await?;

    Ok(())
}
