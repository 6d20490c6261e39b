use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("API error: {0}")]
    Api(#[from] core_api::ApiError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] core_session::NavigationError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] core_dataset::DatasetError),
}

impl From<core_runtime::Error> for CoreError {
    fn from(error: core_runtime::Error) -> Self {
        match error {
            core_runtime::Error::CapabilityMissing {
                capability,
                message,
            } => CoreError::CapabilityMissing {
                capability,
                message,
            },
            other => CoreError::InitializationFailed(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_capability_errors_keep_their_shape() {
        let err = CoreError::from(core_runtime::Error::CapabilityMissing {
            capability: "Navigator".into(),
            message: "required".into(),
        });
        assert!(matches!(err, CoreError::CapabilityMissing { ref capability, .. } if capability == "Navigator"));

        let err = CoreError::from(core_runtime::Error::Config("bad url".into()));
        assert!(matches!(err, CoreError::InitializationFailed(ref msg) if msg.contains("bad url")));
    }
}
