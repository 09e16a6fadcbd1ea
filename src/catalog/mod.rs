//! Fixed, parameterless operations over `users`, `articles` and `students`,
//! addressable by name or by their `taskN` alias.

mod articles;
mod outcome;
mod students;
mod users;

pub use articles::{article_bulk_models, find_tagged_articles, seed_articles};
pub use outcome::Outcome;
pub use students::{
    average_by_student, average_by_student_pipeline, average_homework, average_homework_pipeline,
    worst_homework, worst_homework_pipeline,
};
pub use users::{
    add_core_skills, add_skills_field, add_tag_b, delete_support_users, get_users, pull_tag_c,
    replace_john_in_ca, youngest_users,
};

use crate::database::{ARTICLES, Database, STUDENTS, USERS};
use crate::errors::DbError;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationId {
    GetUsers,
    YoungestUsers,
    AddSkillsField,
    AddCoreSkills,
    ReplaceJohnInCa,
    PullTagC,
    AddTagB,
    DeleteSupportUsers,
    SeedArticles,
    FindTaggedArticles,
    WorstHomework,
    AverageHomework,
    AverageByStudent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationInfo {
    pub id: OperationId,
    pub name: &'static str,
    pub alias: &'static str,
    pub collection: &'static str,
    pub summary: &'static str,
}

const fn op(
    id: OperationId,
    name: &'static str,
    alias: &'static str,
    collection: &'static str,
    summary: &'static str,
) -> OperationInfo {
    OperationInfo { id, name, alias, collection, summary }
}

/// Registry in run order.
pub const OPERATIONS: [OperationInfo; 13] = [
    op(OperationId::GetUsers, "get-users", "example", USERS, "all users and the first user"),
    op(
        OperationId::YoungestUsers,
        "youngest-users",
        "task1",
        USERS,
        "five youngest users: firstName, lastName, age",
    ),
    op(
        OperationId::AddSkillsField,
        "add-skills-field",
        "task2",
        USERS,
        "set skills: [] for ages 25..30 or Engineering",
    ),
    op(
        OperationId::AddCoreSkills,
        "add-core-skills",
        "task3",
        USERS,
        "add js and git to the first user with skills",
    ),
    op(
        OperationId::ReplaceJohnInCa,
        "replace-john-in-ca",
        "task4",
        USERS,
        "replace the first john* user in CA with Jason Wood",
    ),
    op(OperationId::PullTagC, "pull-tag-c", "task5", USERS, "pull tag c from Jason Wood"),
    op(OperationId::AddTagB, "add-tag-b", "task6", USERS, "add tag b to Jason Wood unless present"),
    op(
        OperationId::DeleteSupportUsers,
        "delete-support-users",
        "task7",
        USERS,
        "delete every Support user",
    ),
    op(
        OperationId::SeedArticles,
        "seed-articles",
        "task8",
        ARTICLES,
        "recreate articles with an ordered bulk write",
    ),
    op(
        OperationId::FindTaggedArticles,
        "find-tagged-articles",
        "task9",
        ARTICLES,
        "articles tagged super or tag2-a",
    ),
    op(
        OperationId::WorstHomework,
        "worst-homework",
        "task10",
        STUDENTS,
        "student with the lowest homework score",
    ),
    op(
        OperationId::AverageHomework,
        "average-homework",
        "task11",
        STUDENTS,
        "average homework score",
    ),
    op(
        OperationId::AverageByStudent,
        "average-by-student",
        "task12",
        STUDENTS,
        "average score per student, highest first",
    ),
];

impl OperationId {
    #[must_use]
    pub fn info(self) -> &'static OperationInfo {
        // Every variant has exactly one registry row
        OPERATIONS.iter().find(|o| o.id == self).unwrap_or(&OPERATIONS[0])
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        self.info().name
    }
}

/// Finds an operation by name or alias, ignoring case.
#[must_use]
pub fn lookup(key: &str) -> Option<&'static OperationInfo> {
    let key = key.trim();
    OPERATIONS
        .iter()
        .find(|o| o.name.eq_ignore_ascii_case(key) || o.alias.eq_ignore_ascii_case(key))
}

/// Like [`lookup`] but failing with `DbError::UnknownOperation`.
///
/// # Errors
/// When neither a name nor an alias matches.
pub fn resolve(key: &str) -> Result<OperationId, DbError> {
    lookup(key).map(|o| o.id).ok_or_else(|| DbError::UnknownOperation(key.to_string()))
}

/// Runs one operation.
///
/// # Errors
/// Whatever the store reports. No match is not an error.
pub async fn run(db: &Database, id: OperationId) -> Result<Outcome, DbError> {
    Ok(match id {
        OperationId::GetUsers => {
            let (all, first) = get_users(db).await?;
            Outcome::Users { all, first }
        }
        OperationId::YoungestUsers => Outcome::Summaries(youngest_users(db).await?),
        OperationId::AddSkillsField => {
            let (report, users) = add_skills_field(db).await?;
            Outcome::UsersUpdated { report, users }
        }
        OperationId::AddCoreSkills => Outcome::User(add_core_skills(db).await?),
        OperationId::ReplaceJohnInCa => Outcome::User(replace_john_in_ca(db).await?),
        OperationId::PullTagC => Outcome::User(pull_tag_c(db).await?),
        OperationId::AddTagB => Outcome::User(add_tag_b(db).await?),
        OperationId::DeleteSupportUsers => {
            let (report, users) = delete_support_users(db).await?;
            Outcome::UsersDeleted { report, users }
        }
        OperationId::SeedArticles => {
            let (report, articles) = seed_articles(db).await?;
            Outcome::ArticlesSeeded { report, articles }
        }
        OperationId::FindTaggedArticles => Outcome::Articles(find_tagged_articles(db).await?),
        OperationId::WorstHomework => Outcome::WorstHomework(worst_homework(db).await?),
        OperationId::AverageHomework => Outcome::AverageHomework(average_homework(db).await?),
        OperationId::AverageByStudent => Outcome::StudentAverages(average_by_student(db).await?),
    })
}

/// [`run`] with a log line per operation; failures are logged under the
/// operation name and handed back unchanged.
///
/// # Errors
/// The operation's error.
pub async fn run_logged(db: &Database, id: OperationId) -> Result<Outcome, DbError> {
    let started = Instant::now();
    let name = id.name();
    match run(db, id).await {
        Ok(outcome) => {
            log::info!("{name}: ok ({} rows, {} ms)", outcome.len(), started.elapsed().as_millis());
            Ok(outcome)
        }
        Err(e) => {
            log::error!("{name}: {e}");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_names_and_aliases_are_unique() {
        let mut keys: Vec<&str> = OPERATIONS.iter().flat_map(|o| [o.name, o.alias]).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), OPERATIONS.len() * 2);
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(lookup("TASK8").map(|o| o.id), Some(OperationId::SeedArticles));
        assert_eq!(lookup("Pull-Tag-C").map(|o| o.id), Some(OperationId::PullTagC));
        assert!(lookup("task13").is_none());
        assert!(matches!(resolve("nope"), Err(DbError::UnknownOperation(_))));
    }

    #[test]
    fn every_id_resolves_to_its_own_row() {
        for o in &OPERATIONS {
            assert_eq!(o.id.info().name, o.name);
        }
    }
}
