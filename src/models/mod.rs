pub mod chatmodels;
pub mod notificationmodels;
