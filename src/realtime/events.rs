// realtime/events.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    models::chatmodels::*,
    service::error::ServiceError,
};

/// Frames pushed to connected sessions, serialized as `{"event": ..., "data": ...}`.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "receive_message")]
    ReceiveMessage(Message),

    #[serde(rename = "message_delivered", rename_all = "camelCase")]
    MessageDelivered { message_id: Uuid },

    #[serde(rename = "message_seen", rename_all = "camelCase")]
    MessageSeen {
        message_id: Uuid,
        read_status: ReadStatus,
    },

    #[serde(rename = "messages_read", rename_all = "camelCase")]
    MessagesRead {
        chat_id: Uuid,
        message_ids: Vec<Uuid>,
        read_statuses: Vec<ReadStatus>,
    },

    #[serde(rename = "message-deleted", rename_all = "camelCase")]
    MessageDeleted {
        message_id: Uuid,
        chat_id: Uuid,
        updates: DeletionFlags,
    },

    #[serde(rename = "chat_approved", rename_all = "camelCase")]
    ChatApproved { chat_id: Uuid, status: ChatStatus },

    #[serde(rename = "chat_rejected", rename_all = "camelCase")]
    ChatRejected { chat_id: Uuid, status: ChatStatus },

    #[serde(rename = "offer_accepted", rename_all = "camelCase")]
    OfferAccepted {
        chat_id: Uuid,
        offer_amount: Option<f64>,
        offer_status: OfferStatus,
    },

    #[serde(rename = "offer_rejected", rename_all = "camelCase")]
    OfferRejected {
        chat_id: Uuid,
        offer_amount: Option<f64>,
        offer_status: OfferStatus,
    },

    #[serde(rename = "client_offer_notification", rename_all = "camelCase")]
    ClientOfferNotification {
        chat_id: Uuid,
        offer_amount: f64,
        status: OfferStatus,
    },

    #[serde(rename = "error")]
    Error {
        event: String,
        code: String,
        message: String,
    },
}

impl ServerEvent {
    pub fn error(event: &str, error: &ServiceError) -> Self {
        let message = match error {
            ServiceError::Database(_) | ServiceError::Storage(_) => {
                crate::error::ErrorMessage::ServerError.to_string()
            }
            _ => error.to_string(),
        };

        ServerEvent::Error {
            event: event.to_string(),
            code: error.code().to_string(),
            message,
        }
    }
}

/// Offer amounts arrive as numbers or as strings typed into a text field.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    pub fn parse(&self) -> Result<f64, ServiceError> {
        let amount = match self {
            AmountInput::Number(amount) => *amount,
            AmountInput::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| ServiceError::Validation(format!("'{}' is not a valid amount", text)))?,
        };

        if !amount.is_finite() || amount <= 0.0 {
            return Err(ServiceError::Validation(
                "Offer amount must be greater than zero".to_string(),
            ));
        }

        Ok(amount)
    }
}

fn default_message_type() -> MessageType {
    MessageType::Text
}

/// Frames sent by clients.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "join_chat", rename_all = "camelCase")]
    JoinChat { chat_id: Uuid },

    #[serde(rename = "leave_chat", rename_all = "camelCase")]
    LeaveChat { chat_id: Uuid },

    #[serde(rename = "send_message", rename_all = "camelCase")]
    SendMessage {
        chat_id: Uuid,
        message_content: String,
        #[serde(default = "default_message_type")]
        message_type: MessageType,
    },

    #[serde(rename = "mark_as_seen", rename_all = "camelCase")]
    MarkAsSeen { chat_id: Uuid },

    #[serde(rename = "mark_as_read", rename_all = "camelCase")]
    MarkAsRead {
        chat_id: Uuid,
        message_ids: Vec<Uuid>,
    },

    #[serde(rename = "delete_chat", rename_all = "camelCase")]
    DeleteChat {
        chat_id: Uuid,
        user_role: ParticipantRole,
    },

    #[serde(rename = "delete-message", rename_all = "camelCase")]
    DeleteMessage {
        message_id: Uuid,
        chat_id: Uuid,
        deletion_type: DeletionType,
        // advisory only, the server works out the actor's side itself
        #[serde(default)]
        is_sender: Option<bool>,
    },

    #[serde(rename = "upload_image", rename_all = "camelCase")]
    UploadImage {
        sender_id: Uuid,
        chat_id: Uuid,
        image: String,
    },

    #[serde(rename = "make_offer", rename_all = "camelCase")]
    MakeOffer {
        chat_id: Uuid,
        offer_amount: AmountInput,
        #[serde(default)]
        job_request_id: Option<Uuid>,
    },

    #[serde(rename = "accept_offer", rename_all = "camelCase")]
    AcceptOffer {
        chat_id: Uuid,
        #[serde(default)]
        job_request_id: Option<Uuid>,
    },

    #[serde(rename = "reject_offer", rename_all = "camelCase")]
    RejectOffer { chat_id: Uuid },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinChat { .. } => "join_chat",
            ClientEvent::LeaveChat { .. } => "leave_chat",
            ClientEvent::SendMessage { .. } => "send_message",
            ClientEvent::MarkAsSeen { .. } => "mark_as_seen",
            ClientEvent::MarkAsRead { .. } => "mark_as_read",
            ClientEvent::DeleteChat { .. } => "delete_chat",
            ClientEvent::DeleteMessage { .. } => "delete-message",
            ClientEvent::UploadImage { .. } => "upload_image",
            ClientEvent::MakeOffer { .. } => "make_offer",
            ClientEvent::AcceptOffer { .. } => "accept_offer",
            ClientEvent::RejectOffer { .. } => "reject_offer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_frames_parse_with_camel_case_fields() {
        let chat_id = Uuid::new_v4();
        let frame = json!({
            "event": "send_message",
            "data": { "chatId": chat_id, "messageContent": "hi", "messageType": "text" }
        });

        let event: ClientEvent = serde_json::from_value(frame).unwrap();
        assert_eq!(
            event,
            ClientEvent::SendMessage {
                chat_id,
                message_content: "hi".to_string(),
                message_type: MessageType::Text,
            }
        );
    }

    #[test]
    fn delete_message_uses_hyphenated_name() {
        let frame = json!({
            "event": "delete-message",
            "data": {
                "messageId": Uuid::new_v4(),
                "chatId": Uuid::new_v4(),
                "deletionType": "forEveryone",
                "isSender": true
            }
        });

        let event: ClientEvent = serde_json::from_value(frame).unwrap();
        assert_eq!(event.name(), "delete-message");
        assert!(matches!(
            event,
            ClientEvent::DeleteMessage { deletion_type: DeletionType::ForEveryone, .. }
        ));
    }

    #[test]
    fn offer_amount_accepts_strings_and_numbers() {
        let frame = json!({
            "event": "make_offer",
            "data": { "chatId": Uuid::new_v4(), "offerAmount": "750", "jobRequestId": null }
        });
        let ClientEvent::MakeOffer { offer_amount, .. } =
            serde_json::from_value::<ClientEvent>(frame).unwrap()
        else {
            panic!("expected make_offer");
        };
        assert_eq!(offer_amount.parse().unwrap(), 750.0);

        assert_eq!(AmountInput::Number(12.5).parse().unwrap(), 12.5);
        assert!(AmountInput::Number(0.0).parse().is_err());
        assert!(AmountInput::Text("abc".into()).parse().is_err());
        assert!(AmountInput::Number(f64::NAN).parse().is_err());
    }

    #[test]
    fn server_events_are_wrapped_in_event_and_data() {
        let message_id = Uuid::new_v4();
        let value = serde_json::to_value(ServerEvent::MessageDelivered { message_id }).unwrap();
        assert_eq!(value["event"], "message_delivered");
        assert_eq!(value["data"]["messageId"], json!(message_id));

        let value = serde_json::to_value(ServerEvent::error(
            "make_offer",
            &ServiceError::ChatNotApproved(Uuid::nil()),
        ))
        .unwrap();
        assert_eq!(value["event"], "error");
        assert_eq!(value["data"]["code"], "CHAT_NOT_APPROVED");
        assert_eq!(value["data"]["event"], "make_offer");
    }
}
