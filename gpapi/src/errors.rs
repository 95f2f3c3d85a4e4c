use thiserror::Error;

#[derive(Error, Debug)]
pub enum APIError {
    #[error("the url `{0}` is not valid")]
    UrlError(String),
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("cookie error: {0}")]
    Cookie(String),
    #[error("login failed: {0}")]
    LoginFailed(String),
    #[error("session tokens were not found in the landing page")]
    TokensNotFound,
    #[error("request failed with HTTP status {status}")]
    RequestFailed { status: u16 },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("batchexecute error (error: {code}, query: {key})")]
    BatchExecute { code: i64, key: String },
    #[error("upload session error: {0}")]
    UploadSession(String),
    #[error("upload failed with state `{state}`")]
    UploadFailed { state: String },
    #[error("album `{0}` was not found")]
    AlbumNotFound(String),
    #[error("photo `{0}` was not found")]
    PhotoNotFound(String),
}

impl APIError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        APIError::MalformedResponse(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, crate::errors::APIError>;
