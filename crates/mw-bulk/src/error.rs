//! Error types for mw-bulk.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    pub kind: ErrorKind,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// The underlying client error, if this wraps one.
    pub fn client_error(&self) -> Option<&busbar_mw_client::Error> {
        self.source.as_ref()?.downcast_ref::<busbar_mw_client::Error>()
    }

    /// The remote API error code, if a call failed with one.
    pub fn api_code(&self) -> Option<&str> {
        self.client_error()?.code()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("Client error: {0}")]
    Client(String),
    #[error("Auth error: {0}")]
    Auth(String),
    /// The caller passed something that cannot work; never retried.
    #[error("Usage error: {0}")]
    Usage(String),
    #[error("{0}")]
    Other(String),
}

impl From<busbar_mw_client::Error> for Error {
    fn from(err: busbar_mw_client::Error) -> Self {
        Error { kind: ErrorKind::Client(err.to_string()), source: Some(Box::new(err)) }
    }
}

impl From<busbar_mw_auth::Error> for Error {
    fn from(err: busbar_mw_auth::Error) -> Self {
        Error { kind: ErrorKind::Auth(err.to_string()), source: Some(Box::new(err)) }
    }
}
