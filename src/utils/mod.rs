pub mod clock;
pub mod image_utils;
pub mod token;
