use crate::errors::DbError;
use crate::query::{
    BulkWriteReport, DeleteReport, FindOptions, ReturnDocument, UpdateReport, WriteModel,
};
use crate::store::DocumentStore;
use bson::{Bson, Document as BsonDocument};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Named handle on one collection. Holds no state of its own and does not
/// check that the collection exists.
#[derive(Clone)]
pub struct Collection {
    name: String,
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("backend", &self.store.backend())
            .finish()
    }
}

fn decode_all<T: DeserializeOwned>(docs: Vec<BsonDocument>) -> Result<Vec<T>, DbError> {
    docs.into_iter().map(|d| Ok(bson::from_document(d)?)).collect()
}

fn decode_opt<T: DeserializeOwned>(doc: Option<BsonDocument>) -> Result<Option<T>, DbError> {
    doc.map(bson::from_document).transpose().map_err(DbError::from)
}

impl Collection {
    pub(crate) fn new(name: &str, store: Arc<dyn DocumentStore>) -> Self {
        Self { name: name.to_string(), store }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn find(
        &self,
        filter: BsonDocument,
        opts: FindOptions,
    ) -> Result<Vec<BsonDocument>, DbError> {
        log::debug!("find on {}: {filter}", self.name);
        self.store.find(&self.name, filter, opts).await
    }

    pub async fn find_as<T: DeserializeOwned>(
        &self,
        filter: BsonDocument,
        opts: FindOptions,
    ) -> Result<Vec<T>, DbError> {
        decode_all(self.find(filter, opts).await?)
    }

    pub async fn find_one(&self, filter: BsonDocument) -> Result<Option<BsonDocument>, DbError> {
        log::debug!("find_one on {}: {filter}", self.name);
        self.store.find_one(&self.name, filter).await
    }

    pub async fn find_one_as<T: DeserializeOwned>(
        &self,
        filter: BsonDocument,
    ) -> Result<Option<T>, DbError> {
        decode_opt(self.find_one(filter).await?)
    }

    pub async fn insert_one(&self, doc: BsonDocument) -> Result<Bson, DbError> {
        log::debug!("insert_one on {}", self.name);
        self.store.insert_one(&self.name, doc).await
    }

    /// Serializes `value` and inserts it.
    pub async fn insert_one_as<T: Serialize + Sync>(&self, value: &T) -> Result<Bson, DbError> {
        self.insert_one(bson::to_document(value)?).await
    }

    pub async fn update_many(
        &self,
        filter: BsonDocument,
        update: BsonDocument,
    ) -> Result<UpdateReport, DbError> {
        log::debug!("update_many on {}: {filter} {update}", self.name);
        self.store.update_many(&self.name, filter, update).await
    }

    pub async fn find_one_and_update(
        &self,
        filter: BsonDocument,
        update: BsonDocument,
        ret: ReturnDocument,
    ) -> Result<Option<BsonDocument>, DbError> {
        log::debug!("find_one_and_update on {}: {filter} {update}", self.name);
        self.store.find_one_and_update(&self.name, filter, update, ret).await
    }

    pub async fn find_one_and_update_as<T: DeserializeOwned>(
        &self,
        filter: BsonDocument,
        update: BsonDocument,
        ret: ReturnDocument,
    ) -> Result<Option<T>, DbError> {
        decode_opt(self.find_one_and_update(filter, update, ret).await?)
    }

    pub async fn find_one_and_replace(
        &self,
        filter: BsonDocument,
        replacement: BsonDocument,
        ret: ReturnDocument,
    ) -> Result<Option<BsonDocument>, DbError> {
        log::debug!("find_one_and_replace on {}: {filter}", self.name);
        self.store.find_one_and_replace(&self.name, filter, replacement, ret).await
    }

    pub async fn find_one_and_replace_as<T: DeserializeOwned>(
        &self,
        filter: BsonDocument,
        replacement: BsonDocument,
        ret: ReturnDocument,
    ) -> Result<Option<T>, DbError> {
        decode_opt(self.find_one_and_replace(filter, replacement, ret).await?)
    }

    pub async fn delete_many(&self, filter: BsonDocument) -> Result<DeleteReport, DbError> {
        log::debug!("delete_many on {}: {filter}", self.name);
        self.store.delete_many(&self.name, filter).await
    }

    pub async fn bulk_write(&self, models: Vec<WriteModel>) -> Result<BulkWriteReport, DbError> {
        log::debug!("bulk_write on {}: {} steps", self.name, models.len());
        self.store.bulk_write(&self.name, models).await
    }

    pub async fn aggregate(
        &self,
        pipeline: Vec<BsonDocument>,
    ) -> Result<Vec<BsonDocument>, DbError> {
        log::debug!("aggregate on {}: {} stages", self.name, pipeline.len());
        self.store.aggregate(&self.name, pipeline).await
    }

    pub async fn aggregate_as<T: DeserializeOwned>(
        &self,
        pipeline: Vec<BsonDocument>,
    ) -> Result<Vec<T>, DbError> {
        decode_all(self.aggregate(pipeline).await?)
    }

    pub async fn count(&self, filter: BsonDocument) -> Result<u64, DbError> {
        log::debug!("count on {}: {filter}", self.name);
        self.store.count(&self.name, filter).await
    }
}
