use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Navigation to {path} exceeded {hops} redirects")]
    RedirectLoop { path: String, hops: usize },
}

pub type Result<T> = std::result::Result<T, NavigationError>;
