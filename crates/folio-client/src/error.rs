use folio_shared::SharedError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error(transparent)]
    Invalid(#[from] SharedError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
