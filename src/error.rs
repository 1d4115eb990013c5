use thiserror::Error;

/// Failures surfaced by the backend client, the session accessor and the proxy.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("backend rejected request ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Auth(String),
    #[error("unexpected response payload: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }

    /// Short text for the status line; validation and not-found messages are
    /// already user facing.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(message) | ClientError::Auth(message) => message.clone(),
            ClientError::NotFound(message) => (*message).to_string(),
            ClientError::Server { message, .. } => message.clone(),
            ClientError::Network(_) => "Could not reach the server".to_string(),
            ClientError::Decode(_) => "Server sent an unexpected response".to_string(),
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_surface_backend_message() {
        let err = ClientError::Server {
            status: 500,
            message: "Tag already exists".into(),
        };
        assert_eq!(err.user_message(), "Tag already exists");
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn validation_errors_are_flagged() {
        let err = ClientError::validation("Passwords do not match.");
        assert!(err.is_validation());
        assert_eq!(err.user_message(), "Passwords do not match.");
    }
}
