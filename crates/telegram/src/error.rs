use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error("invalid telegram chat id {0:?}")]
    InvalidChatId(String),

    #[error("telegram bot token is not configured")]
    MissingToken,
}

pub type Result<T> = std::result::Result<T, TelegramError>;

impl From<TelegramError> for ringle_channels::Error {
    fn from(err: TelegramError) -> Self {
        match err {
            TelegramError::InvalidChatId(_) => Self::invalid_input(err),
            TelegramError::MissingToken => Self::unavailable(err),
            TelegramError::Telegram(_) | TelegramError::Reqwest(_) => {
                Self::external("telegram bot api", err)
            },
        }
    }
}
