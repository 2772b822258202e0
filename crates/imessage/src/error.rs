use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IMessageError {
    #[error("iMessage requires macOS")]
    UnsupportedPlatform,

    #[error("Messages database not found at {}", path.display())]
    DatabaseMissing { path: PathBuf },

    #[error("cannot locate the home directory")]
    NoHomeDir,

    #[error("invalid iMessage recipient {0:?}: expected +<digits> or an email address")]
    InvalidTarget(String),

    #[error("osascript failed ({status}): {stderr}")]
    Script { status: String, stderr: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, IMessageError>;

impl From<IMessageError> for ringle_channels::Error {
    fn from(err: IMessageError) -> Self {
        match err {
            IMessageError::InvalidTarget(_) => Self::invalid_input(err),
            IMessageError::UnsupportedPlatform
            | IMessageError::DatabaseMissing { .. }
            | IMessageError::NoHomeDir => Self::unavailable(err),
            IMessageError::Script { .. } | IMessageError::Io(_) => {
                Self::external("osascript", err)
            },
            IMessageError::Database(_) => Self::external("chat.db", err),
        }
    }
}
