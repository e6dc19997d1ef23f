// models/chatmodels.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// How long a sender may still delete a message for everyone.
pub const DELETE_FOR_EVERYONE_WINDOW_SECS: i64 = 180;

/// Content left behind when a message is deleted for everyone.
pub const TOMBSTONE_CONTENT: &str = "";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "chat_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    Pending,
    Approved,
    Rejected,
}

impl ChatStatus {
    pub fn to_str(&self) -> &'static str {
        match self {
            ChatStatus::Pending => "pending",
            ChatStatus::Approved => "approved",
            ChatStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "offer_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    #[default]
    None,
    Pending,
    Accepted,
    Rejected,
}

impl OfferStatus {
    pub fn to_str(&self) -> &'static str {
        match self {
            OfferStatus::None => "none",
            OfferStatus::Pending => "pending",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "message_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Image,
    System,
}

/// The side of the marketplace a user acts for.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticipantRole {
    #[serde(rename = "client")]
    Client,
    #[serde(rename = "jobseeker", alias = "job_seeker", alias = "job-seeker")]
    JobSeeker,
}

impl ParticipantRole {
    pub fn counterpart(&self) -> ParticipantRole {
        match self {
            ParticipantRole::Client => ParticipantRole::JobSeeker,
            ParticipantRole::JobSeeker => ParticipantRole::Client,
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            ParticipantRole::Client => "client",
            ParticipantRole::JobSeeker => "jobseeker",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DeletionType {
    ForMe,
    ForEveryone,
}

#[derive(Debug, Serialize, Clone, Deserialize, sqlx::FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: Uuid,
    pub client_id: Uuid,
    pub job_seeker_id: Uuid,
    pub initiator_id: Uuid,
    pub job_id: Option<Uuid>,
    pub status: ChatStatus,
    pub offer_amount: Option<f64>,
    pub offer_status: OfferStatus,
    pub deleted_by_client: bool,
    pub deleted_by_job_seeker: bool,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn new(
        initiator_id: Uuid,
        initiator_role: ParticipantRole,
        recipient_id: Uuid,
        job_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        let (client_id, job_seeker_id) = match initiator_role {
            ParticipantRole::Client => (initiator_id, recipient_id),
            ParticipantRole::JobSeeker => (recipient_id, initiator_id),
        };

        Chat {
            id: Uuid::new_v4(),
            client_id,
            job_seeker_id,
            initiator_id,
            job_id,
            status: ChatStatus::Pending,
            offer_amount: None,
            offer_status: OfferStatus::None,
            deleted_by_client: false,
            deleted_by_job_seeker: false,
            last_message_at: None,
            created_at: now,
        }
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.client_id == user_id || self.job_seeker_id == user_id
    }

    pub fn role_of(&self, user_id: Uuid) -> Option<ParticipantRole> {
        if self.client_id == user_id {
            Some(ParticipantRole::Client)
        } else if self.job_seeker_id == user_id {
            Some(ParticipantRole::JobSeeker)
        } else {
            None
        }
    }

    pub fn participant(&self, role: ParticipantRole) -> Uuid {
        match role {
            ParticipantRole::Client => self.client_id,
            ParticipantRole::JobSeeker => self.job_seeker_id,
        }
    }

    /// The other participant, or `None` when `user_id` is not in the chat.
    pub fn other_participant(&self, user_id: Uuid) -> Option<Uuid> {
        self.role_of(user_id)
            .map(|role| self.participant(role.counterpart()))
    }

    /// The participant who received the chat request.
    pub fn recipient_id(&self) -> Uuid {
        if self.initiator_id == self.client_id {
            self.job_seeker_id
        } else {
            self.client_id
        }
    }

    pub fn is_hidden_for(&self, user_id: Uuid) -> bool {
        match self.role_of(user_id) {
            Some(ParticipantRole::Client) => self.deleted_by_client,
            Some(ParticipantRole::JobSeeker) => self.deleted_by_job_seeker,
            None => true,
        }
    }
}

/// Structured record of a protocol event, stored on system messages.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SystemEvent {
    #[serde(rename_all = "camelCase")]
    ChatApproved { by: Uuid },
    #[serde(rename_all = "camelCase")]
    ChatRejected { by: Uuid },
    #[serde(rename_all = "camelCase")]
    OfferMade {
        amount: f64,
        job_request_id: Option<Uuid>,
    },
    #[serde(rename_all = "camelCase")]
    OfferAccepted { amount: f64 },
    #[serde(rename_all = "camelCase")]
    OfferRejected { amount: f64 },
}

impl SystemEvent {
    /// Fallback text for clients that do not switch on the event kind.
    pub fn describe(&self) -> String {
        match self {
            SystemEvent::ChatApproved { .. } => "Chat request accepted".to_string(),
            SystemEvent::ChatRejected { .. } => "Chat request rejected".to_string(),
            SystemEvent::OfferMade { amount, .. } => format!("Offer of {} sent", amount),
            SystemEvent::OfferAccepted { amount } => format!("Offer of {} accepted", amount),
            SystemEvent::OfferRejected { amount } => format!("Offer of {} rejected", amount),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadStatus {
    pub id: Uuid,
    pub message_id: Uuid,
    pub participant_id: Uuid,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub message_type: MessageType,
    #[serde(rename = "messageContent")]
    pub content: String,
    pub system_event: Option<Json<SystemEvent>>,
    pub sent_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub deleted_by_sender: bool,
    pub deleted_by_receiver: bool,
    pub deleted_for_everyone: bool,
    #[sqlx(skip)]
    #[serde(default)]
    pub read_by: Vec<ReadStatus>,
}

impl Message {
    /// Tombstones stay visible to both sides; a for-me deletion hides the
    /// message from that side only.
    pub fn is_visible_to(&self, viewer_id: Uuid) -> bool {
        if self.deleted_for_everyone {
            true
        } else if viewer_id == self.sender_id {
            !self.deleted_by_sender
        } else {
            !self.deleted_by_receiver
        }
    }

    pub fn is_deleted_for_everyone(&self) -> bool {
        self.deleted_for_everyone
    }

    pub fn has_read_status_for(&self, participant_id: Uuid) -> bool {
        self.read_by
            .iter()
            .any(|status| status.participant_id == participant_id)
    }

    pub fn deletion_updates(&self) -> DeletionFlags {
        DeletionFlags {
            deleted_by_sender: self.deleted_by_sender,
            deleted_by_receiver: self.deleted_by_receiver,
            deleted_for_everyone: self.deleted_for_everyone,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeletionFlags {
    pub deleted_by_sender: bool,
    pub deleted_by_receiver: bool,
    pub deleted_for_everyone: bool,
}
