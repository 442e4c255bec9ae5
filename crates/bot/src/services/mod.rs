pub mod command_service;
pub mod telegram_transport;

pub use command_service::{CommandService, SharedHandles};
pub use telegram_transport::TelegramTransport;
