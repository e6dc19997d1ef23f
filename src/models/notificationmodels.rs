// models/notificationmodels.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "notification_type")]
pub enum NotificationType {
    #[sqlx(rename = "chat-request")]
    #[serde(rename = "chat-request")]
    ChatRequest,
    #[sqlx(rename = "offer_made")]
    #[serde(rename = "offer_made")]
    OfferMade,
    #[sqlx(rename = "offer")]
    #[serde(rename = "offer")]
    Offer,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub notification_title: String,
    pub notification_message: String,
    pub related_ids: Vec<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
