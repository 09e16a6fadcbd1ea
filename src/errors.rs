use mongodb::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Driver error: {0}")]
    Driver(#[source] mongodb::error::Error),

    #[error("BSON decode: {0}")]
    Decode(#[from] bson::de::Error),

    #[error("BSON encode: {0}")]
    Encode(#[from] bson::ser::Error),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
}

impl DbError {
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// True for failures that mean the store could not be reached or refused us.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<mongodb::error::Error> for DbError {
    fn from(err: mongodb::error::Error) -> Self {
        match *err.kind {
            ErrorKind::Authentication { .. }
            | ErrorKind::ServerSelection { .. }
            | ErrorKind::DnsResolve { .. }
            | ErrorKind::Io(_) => Self::Connection(err.to_string()),
            _ => Self::Driver(err),
        }
    }
}
