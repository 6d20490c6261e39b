use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The backend answered 401. The session has already been signed out
    /// and the host redirected to the login page.
    #[error("Unauthorized: {body}")]
    Unauthorized { body: String },

    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to obtain ID token: {0}")]
    Token(#[from] core_auth::AuthError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
