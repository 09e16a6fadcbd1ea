use crate::database::Database;
use crate::errors::DbError;
use crate::model::Article;
use crate::query::{BulkWriteReport, FindOptions, WriteModel};
use bson::doc;

/// The ordered steps behind `seed-articles`: one insert per type, then three
/// tag rewrites where each step sees the previous one.
#[must_use]
pub fn article_bulk_models() -> Vec<WriteModel> {
    let article = |name: &str, kind: &str| WriteModel::InsertOne {
        document: doc! {
            "name": format!("{name} - introduction"),
            "description": format!("{name} - text"),
            "type": kind,
        },
    };
    vec![
        article("Node.js", "a"),
        article("Mongodb", "b"),
        article("Angular", "c"),
        WriteModel::UpdateMany {
            filter: doc! { "type": "a" },
            update: doc! { "$set": { "tags": ["tag1-a", "tag2-a", "tag3"] } },
        },
        WriteModel::UpdateMany {
            filter: doc! { "type": { "$ne": "a" } },
            update: doc! { "$set": { "tags": ["tag2", "tag3", "super"] } },
        },
        WriteModel::UpdateMany {
            filter: doc! {},
            update: doc! { "$pull": { "tags": { "$in": ["tag1-a", "tag2"] } } },
        },
    ]
}

/// Wipes `articles`, runs the ordered bulk write and reads everything back.
pub async fn seed_articles(db: &Database) -> Result<(BulkWriteReport, Vec<Article>), DbError> {
    let articles = db.articles();
    let wiped = articles.delete_many(doc! {}).await?;
    log::debug!("removed {} stale articles", wiped.deleted);
    let report = articles.bulk_write(article_bulk_models()).await?;
    let all = articles.find_as(doc! {}, FindOptions::default()).await?;
    Ok((report, all))
}

pub async fn find_tagged_articles(db: &Database) -> Result<Vec<Article>, DbError> {
    db.articles()
        .find_as(doc! { "tags": { "$in": ["super", "tag2-a"] } }, FindOptions::default())
        .await
}
