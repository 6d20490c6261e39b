use crate::types::ProviderErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{message} ({code})")]
    Provider {
        code: ProviderErrorCode,
        message: String,
    },

    #[error("Backend verification failed: {0}")]
    BackendVerification(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Operation timed out: {operation}")]
    OperationTimeout { operation: String },

    #[error("Another auth operation is in progress: {operation}")]
    OperationInProgress { operation: String },

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("{0}")]
    Other(String),
}

impl AuthError {
    pub fn provider(code: ProviderErrorCode) -> Self {
        let message = code.user_message().to_string();
        AuthError::Provider { code, message }
    }

    pub fn provider_code(&self) -> Option<&ProviderErrorCode> {
        match self {
            AuthError::Provider { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            AuthError::NetworkError(_)
            | AuthError::OperationTimeout { .. }
            | AuthError::OperationInProgress { .. } => true,
            AuthError::Provider { code, .. } => {
                matches!(code, ProviderErrorCode::TooManyAttempts)
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
