use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The request itself is malformed; reported back to the caller.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl QueryError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        QueryError::InvalidRequest {
            message: message.into(),
        }
    }
}
