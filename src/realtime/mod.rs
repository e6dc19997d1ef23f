pub mod broadcast;
pub mod events;
pub mod sessions;
pub mod socket;
