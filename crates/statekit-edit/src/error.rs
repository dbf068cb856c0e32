use thiserror::Error;

pub type Result<T> = std::result::Result<T, EditError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("{message}")]
    InvalidArgument { message: String },
}

impl EditError {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// The error raised when a group is built around no target at all.
    #[must_use]
    pub fn missing_target() -> Self {
        Self::invalid("Target must be specified")
    }
}
