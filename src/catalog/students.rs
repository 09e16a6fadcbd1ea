use crate::database::Database;
use crate::errors::DbError;
use crate::model::{AverageScore, StudentAverage, WorstHomework};
use bson::{Document as BsonDocument, doc};

#[must_use]
pub fn worst_homework_pipeline() -> Vec<BsonDocument> {
    vec![
        doc! { "$unwind": "$scores" },
        doc! { "$match": { "scores.type": "homework" } },
        doc! { "$sort": { "scores.score": 1 } },
        doc! { "$limit": 1 },
        doc! { "$project": { "name": 1, "worst_homework_score": "$scores.score", "_id": 0 } },
    ]
}

#[must_use]
pub fn average_homework_pipeline() -> Vec<BsonDocument> {
    vec![
        doc! { "$unwind": "$scores" },
        doc! { "$match": { "scores.type": "homework" } },
        doc! { "$group": { "_id": null, "avg_score": { "$avg": "$scores.score" } } },
        doc! { "$project": { "avg_score": 1, "_id": 0 } },
    ]
}

/// Groups by student name. Ties in `avg_score` have no defined order on a
/// live server; the in-memory store keeps first-encounter order.
#[must_use]
pub fn average_by_student_pipeline() -> Vec<BsonDocument> {
    vec![
        doc! { "$unwind": "$scores" },
        doc! { "$group": { "_id": "$name", "avg_score": { "$avg": "$scores.score" } } },
        doc! { "$sort": { "avg_score": -1 } },
    ]
}

pub async fn worst_homework(db: &Database) -> Result<Vec<WorstHomework>, DbError> {
    db.students().aggregate_as(worst_homework_pipeline()).await
}

pub async fn average_homework(db: &Database) -> Result<Vec<AverageScore>, DbError> {
    db.students().aggregate_as(average_homework_pipeline()).await
}

pub async fn average_by_student(db: &Database) -> Result<Vec<StudentAverage>, DbError> {
    db.students().aggregate_as(average_by_student_pipeline()).await
}
