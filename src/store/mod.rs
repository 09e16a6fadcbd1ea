//! Storage capability behind every collection handle.
//!
//! The catalog never talks to a driver directly: it goes through
//! [`DocumentStore`], which has a live MongoDB implementation and an in-memory
//! one that evaluates the same Mongo-syntax documents with [`crate::query`].

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use crate::errors::DbError;
use crate::query::{
    BulkWriteReport, DeleteReport, FindOptions, ReturnDocument, UpdateReport, WriteModel,
};
use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument};
use std::time::Duration;

pub const DEFAULT_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_DATABASE: &str = "docops";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Mongo,
    Memory,
}

impl Backend {
    /// Picks the backend from the URI scheme.
    ///
    /// # Errors
    /// Returns `DbError::Config` for schemes other than `mongodb`, `mongodb+srv` and `memory`.
    pub fn from_uri(uri: &str) -> Result<Self, DbError> {
        match uri.split_once("://").map(|(scheme, _)| scheme.to_ascii_lowercase()) {
            Some(s) if s == "mongodb" || s == "mongodb+srv" => Ok(Self::Mongo),
            Some(s) if s == "memory" => Ok(Self::Memory),
            _ => Err(DbError::Config(format!("unsupported store URI {}", redact_uri(uri)))),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mongo => "mongodb",
            Self::Memory => "memory",
        }
    }
}

/// Connection settings handed to [`crate::Database::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub uri: String,
    pub database: String,
    pub app_name: String,
    pub connect_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            app_name: env!("CARGO_PKG_NAME").to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

/// Hides the password part of `user:pass@` in a connection URI.
#[must_use]
pub fn redact_uri(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => {
            let user = rest[..at].split_once(':').map_or(&rest[..at], |(u, _)| u);
            format!("{scheme}://{user}:***{}", &rest[at..])
        }
        None => uri.to_string(),
    }
}

/// True when the URI embeds a password (`user:pass@host`).
#[must_use]
pub fn uri_has_password(uri: &str) -> bool {
    uri.split_once("://").is_some_and(|(_, rest)| {
        let authority = rest.split('/').next().unwrap_or(rest);
        authority.rfind('@').is_some_and(|at| authority[..at].contains(':'))
    })
}

/// Operations the catalog needs from a document database.
///
/// Filters, updates, projections and pipelines are Mongo-syntax documents.
/// A filter that matches nothing is not an error: reads return empty results
/// and find-and-modify returns `None`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn backend(&self) -> Backend;

    async fn ping(&self) -> Result<(), DbError>;

    async fn find(
        &self,
        coll: &str,
        filter: BsonDocument,
        opts: FindOptions,
    ) -> Result<Vec<BsonDocument>, DbError>;

    async fn find_one(
        &self,
        coll: &str,
        filter: BsonDocument,
    ) -> Result<Option<BsonDocument>, DbError> {
        let opts = FindOptions { limit: Some(1), ..FindOptions::default() };
        Ok(self.find(coll, filter, opts).await?.into_iter().next())
    }

    /// Returns the `_id` of the inserted document.
    async fn insert_one(&self, coll: &str, doc: BsonDocument) -> Result<Bson, DbError>;

    async fn update_many(
        &self,
        coll: &str,
        filter: BsonDocument,
        update: BsonDocument,
    ) -> Result<UpdateReport, DbError>;

    async fn find_one_and_update(
        &self,
        coll: &str,
        filter: BsonDocument,
        update: BsonDocument,
        ret: ReturnDocument,
    ) -> Result<Option<BsonDocument>, DbError>;

    async fn find_one_and_replace(
        &self,
        coll: &str,
        filter: BsonDocument,
        replacement: BsonDocument,
        ret: ReturnDocument,
    ) -> Result<Option<BsonDocument>, DbError>;

    async fn delete_many(&self, coll: &str, filter: BsonDocument) -> Result<DeleteReport, DbError>;

    /// Ordered bulk write: steps run in sequence, each observing the ones
    /// before it, and the batch stops at the first failing step.
    async fn bulk_write(
        &self,
        coll: &str,
        models: Vec<WriteModel>,
    ) -> Result<BulkWriteReport, DbError>;

    async fn aggregate(
        &self,
        coll: &str,
        pipeline: Vec<BsonDocument>,
    ) -> Result<Vec<BsonDocument>, DbError>;

    async fn count(&self, coll: &str, filter: BsonDocument) -> Result<u64, DbError>;

    async fn close(&self) -> Result<(), DbError>;
}
