use crate::document::Document;
use crate::errors::DbError;
use crate::query::{
    self, BulkWriteReport, DeleteReport, FindOptions, ReturnDocument, UpdateReport, WriteModel,
};
use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument};
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{Backend, DocumentStore};

/// In-process store evaluating Mongo-syntax documents with the crate's own
/// query engine. Collections spring into existence on first write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn read<T>(&self, coll: &str, f: impl FnOnce(&[Document]) -> T) -> T {
        let guard = self.collections.read();
        f(guard.get(coll).map_or(&[][..], Vec::as_slice))
    }

    fn write<T>(&self, coll: &str, f: impl FnOnce(&mut Vec<Document>) -> T) -> T {
        let mut guard = self.collections.write();
        f(guard.entry(coll.to_string()).or_default())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> Backend {
        Backend::Memory
    }

    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn find(
        &self,
        coll: &str,
        filter: BsonDocument,
        opts: FindOptions,
    ) -> Result<Vec<BsonDocument>, DbError> {
        self.read(coll, |docs| query::find_docs(docs, &filter, &opts))
    }

    async fn insert_one(&self, coll: &str, doc: BsonDocument) -> Result<Bson, DbError> {
        self.write(coll, |docs| query::insert_doc(docs, doc))
    }

    async fn update_many(
        &self,
        coll: &str,
        filter: BsonDocument,
        update: BsonDocument,
    ) -> Result<UpdateReport, DbError> {
        self.write(coll, |docs| query::update_many(docs, &filter, &update))
    }

    async fn find_one_and_update(
        &self,
        coll: &str,
        filter: BsonDocument,
        update: BsonDocument,
        ret: ReturnDocument,
    ) -> Result<Option<BsonDocument>, DbError> {
        self.write(coll, |docs| query::find_one_and_update(docs, &filter, &update, ret))
    }

    async fn find_one_and_replace(
        &self,
        coll: &str,
        filter: BsonDocument,
        replacement: BsonDocument,
        ret: ReturnDocument,
    ) -> Result<Option<BsonDocument>, DbError> {
        self.write(coll, |docs| query::find_one_and_replace(docs, &filter, &replacement, ret))
    }

    async fn delete_many(&self, coll: &str, filter: BsonDocument) -> Result<DeleteReport, DbError> {
        self.write(coll, |docs| query::delete_many(docs, &filter))
    }

    // One write lock for the whole batch: readers never see a half-applied bulk.
    async fn bulk_write(
        &self,
        coll: &str,
        models: Vec<WriteModel>,
    ) -> Result<BulkWriteReport, DbError> {
        self.write(coll, |docs| query::bulk_write(docs, &models))
    }

    async fn aggregate(
        &self,
        coll: &str,
        pipeline: Vec<BsonDocument>,
    ) -> Result<Vec<BsonDocument>, DbError> {
        self.read(coll, |docs| query::aggregate(docs, &pipeline))
    }

    async fn count(&self, coll: &str, filter: BsonDocument) -> Result<u64, DbError> {
        self.read(coll, |docs| query::count_docs(docs, &filter))
    }

    async fn close(&self) -> Result<(), DbError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn failed_bulk_step_keeps_earlier_effects() {
        let store = MemoryStore::new();
        let models = vec![
            WriteModel::InsertOne { document: doc! { "_id": 1, "tags": "x" } },
            WriteModel::UpdateMany {
                filter: doc! {},
                update: doc! { "$addToSet": { "tags": "y" } },
            },
            WriteModel::InsertOne { document: doc! { "_id": 2 } },
        ];
        assert!(store.bulk_write("t", models).await.is_err());
        assert_eq!(store.count("t", doc! {}).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reads_on_unknown_collections_are_empty() {
        let store = MemoryStore::new();
        assert!(store.find("nope", doc! {}, FindOptions::default()).await.unwrap().is_empty());
        assert!(store.collection_names().is_empty());
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = MemoryStore::new();
        store.insert_one("t", doc! { "_id": 1 }).await.unwrap();
        assert!(matches!(store.insert_one("t", doc! { "_id": 1 }).await, Err(DbError::Query(_))));
    }
}
