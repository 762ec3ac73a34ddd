use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to reach the API: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid API base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("The API answered {0}: {1}")]
    Status(u16, String),

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),
}

impl ApiError {
    /// True when the API could not be reached at all, as opposed to answering with an error.
    pub fn is_unreachable(&self) -> bool {
        match self {
            ApiError::Request(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}
