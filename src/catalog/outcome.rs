use crate::model::{
    Article, AverageScore, StudentAverage, User, UserSummary, WorstHomework,
};
use crate::query::{BulkWriteReport, DeleteReport, UpdateReport};
use serde::Serialize;

/// What an operation produced. Serialized as `{"kind": ..., "result": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum Outcome {
    Users { all: Vec<User>, first: Option<User> },
    Summaries(Vec<UserSummary>),
    /// Post-image of a find-and-modify; `None` when nothing matched.
    User(Option<User>),
    UsersUpdated { report: UpdateReport, users: Vec<User> },
    UsersDeleted { report: DeleteReport, users: Vec<User> },
    ArticlesSeeded { report: BulkWriteReport, articles: Vec<Article> },
    Articles(Vec<Article>),
    WorstHomework(Vec<WorstHomework>),
    AverageHomework(Vec<AverageScore>),
    StudentAverages(Vec<StudentAverage>),
}

impl Outcome {
    /// Rows or documents carried by the outcome, for log lines.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Users { all, .. } => all.len(),
            Self::Summaries(v) => v.len(),
            Self::User(u) => usize::from(u.is_some()),
            Self::UsersUpdated { users, .. } | Self::UsersDeleted { users, .. } => users.len(),
            Self::ArticlesSeeded { articles, .. } | Self::Articles(articles) => articles.len(),
            Self::WorstHomework(v) => v.len(),
            Self::AverageHomework(v) => v.len(),
            Self::StudentAverages(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
