/// Telegram upload of downloaded tracks
pub mod file_delivery;
/// Command parsing and handlers
pub mod handlers;
/// Resilient messaging with automatic retry for Telegram API operations
pub mod resilient;
/// View layer for reply texts
pub mod views;

pub use file_delivery::TelegramDelivery;
pub use handlers::Command;
