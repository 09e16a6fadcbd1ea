/// A parsed CLI request, independent of clap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Run {
        names: Vec<String>,
        all: bool,
        fail_fast: bool,
    },
    Seed {
        users: bool,
        students: bool,
        extra_users: usize,
    },
    Find {
        collection: String,
        filter_json: Option<String>,
        sort: Option<String>,
        limit: Option<i64>,
        project: Option<String>,
    },
    Count {
        collection: String,
        filter_json: Option<String>,
    },
    Ping,
}

impl Command {
    /// `list` is answered from the registry alone.
    #[must_use]
    pub const fn needs_store(&self) -> bool {
        !matches!(self, Self::List)
    }
}
