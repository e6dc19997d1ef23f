pub mod chatdb;
pub mod db;
pub mod memory;
pub mod notificationdb;
