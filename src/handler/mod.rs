pub mod chat;
pub mod notification_handler;
pub mod socket;
