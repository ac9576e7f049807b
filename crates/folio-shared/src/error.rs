use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SharedError {
    #[error("Invalid date format, expected YYYY-MM-DD: {0}")]
    InvalidDate(String),

    #[error("Invalid slug: {0}")]
    InvalidSlug(String),

    #[error("Invalid session token")]
    InvalidSessionToken,

    #[error("Invalid username: {0}")]
    InvalidUsername(String),
}
