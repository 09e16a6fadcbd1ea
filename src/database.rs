use crate::collection::Collection;
use crate::errors::DbError;
use crate::store::{Backend, DocumentStore, MemoryStore, MongoStore, StoreConfig, redact_uri};
use std::sync::Arc;

pub const USERS: &str = "users";
pub const ARTICLES: &str = "articles";
pub const STUDENTS: &str = "students";

/// One open connection plus collection lookup by name.
#[derive(Clone)]
pub struct Database {
    name: String,
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("backend", &self.store.backend())
            .finish()
    }
}

impl Database {
    /// Opens the store selected by the URI scheme.
    ///
    /// # Errors
    /// `DbError::Config` for an unsupported scheme, `DbError::Connection` when
    /// the server is unreachable or rejects the credentials.
    pub async fn connect(cfg: &StoreConfig) -> Result<Self, DbError> {
        let backend = Backend::from_uri(&cfg.uri)?;
        log::debug!("opening {} store at {}", backend.as_str(), redact_uri(&cfg.uri));
        let store: Arc<dyn DocumentStore> = match backend {
            Backend::Mongo => Arc::new(MongoStore::connect(cfg).await?),
            Backend::Memory => Arc::new(MemoryStore::new()),
        };
        Ok(Self::with_store(&cfg.database, store))
    }

    /// Fresh empty in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_store(crate::store::DEFAULT_DATABASE, Arc::new(MemoryStore::new()))
    }

    #[must_use]
    pub fn with_store(name: &str, store: Arc<dyn DocumentStore>) -> Self {
        Self { name: name.to_string(), store }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        self.store.backend()
    }

    #[must_use]
    pub fn collection(&self, name: &str) -> Collection {
        Collection::new(name, Arc::clone(&self.store))
    }

    #[must_use]
    pub fn users(&self) -> Collection {
        self.collection(USERS)
    }

    #[must_use]
    pub fn articles(&self) -> Collection {
        self.collection(ARTICLES)
    }

    #[must_use]
    pub fn students(&self) -> Collection {
        self.collection(STUDENTS)
    }

    pub async fn ping(&self) -> Result<(), DbError> {
        self.store.ping().await
    }

    /// Releases the connection. Call once at shutdown.
    pub async fn close(&self) -> Result<(), DbError> {
        log::debug!("closing database {}", self.name);
        self.store.close().await
    }
}
