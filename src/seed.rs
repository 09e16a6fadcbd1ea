//! Fixture data for `users` and `students`.
//!
//! The fixed users are built so that every catalog operation has something to
//! act on: ages inside and outside 25..30, an `Engineering` tag, a `john*`
//! e-mail in CA and one outside CA.

use crate::database::Database;
use crate::errors::DbError;
use crate::query::WriteModel;
use bson::{Bson, Document as BsonDocument, doc};
use fake::Fake;
use fake::faker::address::en::StateAbbr;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::{FirstName, LastName};
use rand::Rng;
use rand::seq::IndexedRandom;

const GENERATED_TAGS: [&str; 6] =
    ["Engineering", "Marketing", "Sales", "Design", "Finance", "Legal"];
const MAX_EXTRA_USERS: usize = 10_000;

fn user(
    first: &str,
    last: &str,
    age: i32,
    email: &str,
    tags: &[&str],
    city: &str,
    state: &str,
) -> BsonDocument {
    doc! {
        "firstName": first,
        "lastName": last,
        "age": age,
        "email": email,
        "tags": tags.iter().map(|t| Bson::from(*t)).collect::<Vec<_>>(),
        "address": { "city": city, "state": state },
    }
}

#[must_use]
pub fn fixture_users() -> Vec<BsonDocument> {
    vec![
        user(
            "John",
            "Smith",
            28,
            "john.smith@example.com",
            &["Engineering", "Backend"],
            "San Francisco",
            "CA",
        ),
        user("Alice", "Johnson", 34, "alice.johnson@example.com", &["Marketing"], "New York", "NY"),
        user("Bob", "Brown", 22, "bob.brown@example.com", &["Engineering"], "Austin", "TX"),
        user("Carol", "White", 26, "carol.white@example.com", &["Sales"], "San Diego", "CA"),
        user("John", "Doe", 41, "john.doe@example.com", &["Support"], "Seattle", "WA"),
        user("Eve", "Black", 19, "eve.black@example.com", &["Design"], "Los Angeles", "CA"),
        user(
            "Frank",
            "Green",
            31,
            "frank.green@example.com",
            &["Engineering", "Management"],
            "Portland",
            "OR",
        ),
        user("Grace", "Hall", 29, "grace.hall@example.com", &["HR"], "Reno", "NV"),
        user("Henry", "King", 45, "henry.king@example.com", &["Operations"], "Denver", "CO"),
    ]
}

fn generated_user(rng: &mut impl Rng) -> BsonDocument {
    let first: String = FirstName().fake();
    let last: String = LastName().fake();
    let email: String = SafeEmail().fake();
    let state: String = StateAbbr().fake();
    let tag = GENERATED_TAGS.choose(rng).copied().unwrap_or("Engineering");
    user(&first, &last, rng.random_range(18..65), &email, &[tag], "Springfield", &state)
}

#[must_use]
pub fn fixture_students() -> Vec<BsonDocument> {
    let student = |name: &str, homework: f64, exam: f64, quiz: f64| {
        doc! {
            "name": name,
            "scores": [
                { "type": "homework", "score": homework },
                { "type": "exam", "score": exam },
                { "type": "quiz", "score": quiz },
            ],
        }
    };
    vec![
        student("Alice Moore", 85.0, 90.0, 88.0),
        student("Bob Lee", 62.5, 70.0, 75.0),
        student("Charlie Diaz", 91.0, 78.0, 95.0),
    ]
}

async fn replace_all(db: &Database, coll: &str, docs: Vec<BsonDocument>) -> Result<u64, DbError> {
    let handle = db.collection(coll);
    handle.delete_many(doc! {}).await?;
    let models = docs.into_iter().map(|document| WriteModel::InsertOne { document }).collect();
    let report = handle.bulk_write(models).await?;
    log::info!("seeded {} documents into {coll}", report.inserted);
    Ok(report.inserted)
}

/// Wipes `users` and inserts the fixtures plus `extra` generated users.
///
/// # Errors
/// Store failures; `DbError::Query` when `extra` is unreasonably large.
pub async fn seed_users(db: &Database, extra: usize) -> Result<u64, DbError> {
    if extra > MAX_EXTRA_USERS {
        return Err(DbError::query(format!("at most {MAX_EXTRA_USERS} generated users")));
    }
    let mut docs = fixture_users();
    {
        let mut rng = rand::rng();
        docs.extend((0..extra).map(|_| generated_user(&mut rng)));
    }
    replace_all(db, crate::database::USERS, docs).await
}

/// Wipes `students` and inserts the three fixture students.
pub async fn seed_students(db: &Database) -> Result<u64, DbError> {
    replace_all(db, crate::database::STUDENTS, fixture_students()).await
}
