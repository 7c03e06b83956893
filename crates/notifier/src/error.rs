use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request failed: {0}")]
    Request(reqwest::Error),

    #[error("callback returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}
