use crate::database::Database;
use crate::errors::DbError;
use crate::model::{User, UserSummary};
use crate::query::{DeleteReport, FindOptions, ReturnDocument, UpdateReport};
use bson::{Document as BsonDocument, doc};

const YOUNGEST_LIMIT: i64 = 5;

fn jason_wood() -> BsonDocument {
    doc! { "firstName": "Jason", "lastName": "Wood" }
}

/// Every user plus the first one, read concurrently.
pub async fn get_users(db: &Database) -> Result<(Vec<User>, Option<User>), DbError> {
    let users = db.users();
    tokio::try_join!(
        users.find_as::<User>(doc! {}, FindOptions::default()),
        users.find_one_as::<User>(doc! {}),
    )
}

/// The five youngest users, names and age only.
pub async fn youngest_users(db: &Database) -> Result<Vec<UserSummary>, DbError> {
    let opts = FindOptions {
        sort: Some(doc! { "age": 1 }),
        limit: Some(YOUNGEST_LIMIT),
        projection: Some(doc! { "firstName": 1, "lastName": 1, "age": 1, "_id": 0 }),
        skip: None,
    };
    db.users().find_as(doc! {}, opts).await
}

/// Adds `skills: []` to users aged 25..30 or tagged `Engineering`.
///
/// The write completes before the read-back, so the returned users always
/// reflect it.
pub async fn add_skills_field(db: &Database) -> Result<(UpdateReport, Vec<User>), DbError> {
    let users = db.users();
    let report = users
        .update_many(
            doc! { "$or": [{ "age": { "$gte": 25, "$lt": 30 } }, { "tags": "Engineering" }] },
            doc! { "$set": { "skills": [] } },
        )
        .await?;
    let all = users.find_as(doc! {}, FindOptions::default()).await?;
    Ok((report, all))
}

pub async fn add_core_skills(db: &Database) -> Result<Option<User>, DbError> {
    db.users()
        .find_one_and_update_as(
            doc! { "skills": { "$exists": true } },
            doc! { "$addToSet": { "skills": { "$each": ["js", "git"] } } },
            ReturnDocument::After,
        )
        .await
}

/// Replaces the first `john*` user living in CA with Jason Wood from Support.
pub async fn replace_john_in_ca(db: &Database) -> Result<Option<User>, DbError> {
    db.users()
        .find_one_and_replace_as(
            doc! { "$and": [{ "email": { "$regex": "^john" } }, { "address.state": "CA" }] },
            doc! {
                "firstName": "Jason",
                "lastName": "Wood",
                "tags": ["a", "b", "c"],
                "department": "Support",
            },
            ReturnDocument::After,
        )
        .await
}

pub async fn pull_tag_c(db: &Database) -> Result<Option<User>, DbError> {
    db.users()
        .find_one_and_update_as(
            jason_wood(),
            doc! { "$pull": { "tags": "c" } },
            ReturnDocument::After,
        )
        .await
}

pub async fn add_tag_b(db: &Database) -> Result<Option<User>, DbError> {
    db.users()
        .find_one_and_update_as(
            jason_wood(),
            doc! { "$addToSet": { "tags": "b" } },
            ReturnDocument::After,
        )
        .await
}

pub async fn delete_support_users(db: &Database) -> Result<(DeleteReport, Vec<User>), DbError> {
    let users = db.users();
    let report = users.delete_many(doc! { "department": "Support" }).await?;
    let all = users.find_as(doc! {}, FindOptions::default()).await?;
    Ok((report, all))
}
