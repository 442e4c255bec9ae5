use async_trait::async_trait;
use teloxide::ApiError;
use teloxide::RequestError;
use teloxide::prelude::*;

use common::error::DispatchError;
use engine::dispatch::AlertTransport;

/// Telegram-backed alert delivery. Retry scheduling lives in the
/// dispatcher; this layer only sends one message and classifies the
/// failure mode.
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn classify(destination: i64, error: RequestError) -> DispatchError {
        match error {
            RequestError::RetryAfter(_) => DispatchError::RateLimited,
            RequestError::Network(e) => DispatchError::NetworkError(e.to_string()),
            RequestError::Io(e) => DispatchError::NetworkError(e.to_string()),
            RequestError::Api(ApiError::ChatNotFound) => {
                DispatchError::DestinationInvalid(destination)
            }
            RequestError::Api(
                ApiError::BotBlocked
                | ApiError::BotKicked
                | ApiError::BotKickedFromSupergroup
                | ApiError::NotEnoughRightsToPostMessages
                | ApiError::UserDeactivated,
            ) => DispatchError::Forbidden(destination),
            other => DispatchError::NetworkError(other.to_string()),
        }
    }
}

#[async_trait]
impl AlertTransport for TelegramTransport {
    async fn deliver(&self, destination: i64, text: &str) -> Result<(), DispatchError> {
        self.bot
            .send_message(ChatId(destination), text)
            .await
            .map(|_| ())
            .map_err(|e| Self::classify(destination, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_not_found_is_permanent() {
        let err = TelegramTransport::classify(42, RequestError::Api(ApiError::ChatNotFound));
        assert_eq!(err, DispatchError::DestinationInvalid(42));
        assert!(!err.is_transient());
    }

    #[test]
    fn blocked_bot_is_forbidden() {
        let err = TelegramTransport::classify(42, RequestError::Api(ApiError::BotBlocked));
        assert_eq!(err, DispatchError::Forbidden(42));
        assert!(!err.is_transient());
    }

    #[test]
    fn rate_limit_is_transient() {
        let err = TelegramTransport::classify(
            42,
            RequestError::RetryAfter(teloxide::types::Seconds::from_seconds(30)),
        );
        assert_eq!(err, DispatchError::RateLimited);
        assert!(err.is_transient());
    }

    #[test]
    fn unknown_api_errors_fall_back_to_transient() {
        let err = TelegramTransport::classify(42, RequestError::Api(ApiError::InvalidToken));
        assert!(err.is_transient());
    }
}
