use crate::errors::DbError;
use crate::query::{
    BulkWriteReport, DeleteReport, FindOptions, ReturnDocument, UpdateReport, WriteModel,
};
use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument, doc};
use futures::TryStreamExt;
use mongodb::options::{self as mongo_opts, ClientOptions};
use mongodb::{Client, Collection, Database};

use super::{Backend, DocumentStore, StoreConfig, redact_uri};

/// Live backend over the official driver. Pooling, retries and cursor
/// batching are left to the driver defaults.
#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connects and pings so a bad host or bad credentials fail here rather
    /// than on the first operation.
    ///
    /// # Errors
    /// Returns `DbError::Connection` when the server cannot be reached or
    /// refuses authentication.
    pub async fn connect(cfg: &StoreConfig) -> Result<Self, DbError> {
        let mut options = ClientOptions::parse(&cfg.uri).await?;
        options.app_name = Some(cfg.app_name.clone());
        options.server_selection_timeout = Some(cfg.connect_timeout);
        options.connect_timeout = Some(cfg.connect_timeout);

        let client = Client::with_options(options)?;
        let db = client.database(&cfg.database);
        let store = Self { client, db };
        store.ping().await.map_err(|e| match e {
            DbError::Connection(msg) => {
                DbError::Connection(format!("{}: {msg}", redact_uri(&cfg.uri)))
            }
            other => other,
        })?;
        log::info!("connected to {} (database {})", redact_uri(&cfg.uri), cfg.database);
        Ok(store)
    }

    fn coll(&self, name: &str) -> Collection<BsonDocument> {
        self.db.collection::<BsonDocument>(name)
    }

    const fn driver_return(ret: ReturnDocument) -> mongo_opts::ReturnDocument {
        match ret {
            ReturnDocument::Before => mongo_opts::ReturnDocument::Before,
            ReturnDocument::After => mongo_opts::ReturnDocument::After,
        }
    }

    async fn apply_model(
        &self,
        coll: &Collection<BsonDocument>,
        model: WriteModel,
        report: &mut BulkWriteReport,
    ) -> Result<(), DbError> {
        match model {
            WriteModel::InsertOne { document } => {
                let res = coll.insert_one(document).await?;
                report.absorb_insert(res.inserted_id);
            }
            WriteModel::UpdateOne { filter, update } => {
                let res = coll.update_one(filter, update).await?;
                report.absorb_update(&UpdateReport {
                    matched: res.matched_count,
                    modified: res.modified_count,
                });
            }
            WriteModel::UpdateMany { filter, update } => {
                let res = coll.update_many(filter, update).await?;
                report.absorb_update(&UpdateReport {
                    matched: res.matched_count,
                    modified: res.modified_count,
                });
            }
            WriteModel::ReplaceOne { filter, replacement } => {
                let res = coll.replace_one(filter, replacement).await?;
                report.absorb_update(&UpdateReport {
                    matched: res.matched_count,
                    modified: res.modified_count,
                });
            }
            WriteModel::DeleteOne { filter } => {
                let res = coll.delete_one(filter).await?;
                report.absorb_delete(&DeleteReport { deleted: res.deleted_count });
            }
            WriteModel::DeleteMany { filter } => {
                let res = coll.delete_many(filter).await?;
                report.absorb_delete(&DeleteReport { deleted: res.deleted_count });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn backend(&self) -> Backend {
        Backend::Mongo
    }

    async fn ping(&self) -> Result<(), DbError> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn find(
        &self,
        coll: &str,
        filter: BsonDocument,
        opts: FindOptions,
    ) -> Result<Vec<BsonDocument>, DbError> {
        let mut driver_opts = mongo_opts::FindOptions::default();
        driver_opts.projection = opts.projection;
        driver_opts.sort = opts.sort;
        driver_opts.limit = opts.limit;
        driver_opts.skip = opts.skip;
        let cursor = self.coll(coll).find(filter).with_options(driver_opts).await?;
        Ok(cursor.try_collect::<Vec<_>>().await?)
    }

    async fn find_one(
        &self,
        coll: &str,
        filter: BsonDocument,
    ) -> Result<Option<BsonDocument>, DbError> {
        Ok(self.coll(coll).find_one(filter).await?)
    }

    async fn insert_one(&self, coll: &str, doc: BsonDocument) -> Result<Bson, DbError> {
        Ok(self.coll(coll).insert_one(doc).await?.inserted_id)
    }

    async fn update_many(
        &self,
        coll: &str,
        filter: BsonDocument,
        update: BsonDocument,
    ) -> Result<UpdateReport, DbError> {
        let res = self.coll(coll).update_many(filter, update).await?;
        Ok(UpdateReport { matched: res.matched_count, modified: res.modified_count })
    }

    async fn find_one_and_update(
        &self,
        coll: &str,
        filter: BsonDocument,
        update: BsonDocument,
        ret: ReturnDocument,
    ) -> Result<Option<BsonDocument>, DbError> {
        Ok(self
            .coll(coll)
            .find_one_and_update(filter, update)
            .return_document(Self::driver_return(ret))
            .await?)
    }

    async fn find_one_and_replace(
        &self,
        coll: &str,
        filter: BsonDocument,
        replacement: BsonDocument,
        ret: ReturnDocument,
    ) -> Result<Option<BsonDocument>, DbError> {
        Ok(self
            .coll(coll)
            .find_one_and_replace(filter, replacement)
            .return_document(Self::driver_return(ret))
            .await?)
    }

    async fn delete_many(&self, coll: &str, filter: BsonDocument) -> Result<DeleteReport, DbError> {
        let res = self.coll(coll).delete_many(filter).await?;
        Ok(DeleteReport { deleted: res.deleted_count })
    }

    // Client-level bulkWrite needs server 8.0, so ordered steps are issued one
    // by one and the first failure aborts the rest.
    async fn bulk_write(
        &self,
        coll: &str,
        models: Vec<WriteModel>,
    ) -> Result<BulkWriteReport, DbError> {
        let handle = self.coll(coll);
        let mut report = BulkWriteReport::default();
        for (step, model) in models.into_iter().enumerate() {
            if let Err(e) = self.apply_model(&handle, model, &mut report).await {
                log::warn!("bulk write on {coll} stopped at step {step}: {e}");
                return Err(e);
            }
        }
        Ok(report)
    }

    async fn aggregate(
        &self,
        coll: &str,
        pipeline: Vec<BsonDocument>,
    ) -> Result<Vec<BsonDocument>, DbError> {
        let cursor = self.coll(coll).aggregate(pipeline).await?;
        Ok(cursor.try_collect::<Vec<_>>().await?)
    }

    async fn count(&self, coll: &str, filter: BsonDocument) -> Result<u64, DbError> {
        Ok(self.coll(coll).count_documents(filter).await?)
    }

    async fn close(&self) -> Result<(), DbError> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}
