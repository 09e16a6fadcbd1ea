use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_SORT_FIELDS: usize = 8;
pub(crate) const MAX_UPDATE_FIELDS: usize = 128;
pub(crate) const MAX_PATTERN_LEN: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

/// Options accepted by `find`.
///
/// Projection and sort are kept as Mongo-syntax documents so the live driver
/// can forward them untouched; the in-memory engine parses them itself.
/// Sorting happens before skip/limit, projection last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub projection: Option<BsonDocument>,
    pub sort: Option<BsonDocument>,
    pub limit: Option<i64>,
    pub skip: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
    Regex { path: String, regex: regex::Regex },
}

/// One update operator applied to one path.
#[derive(Debug, Clone)]
pub enum UpdateOp {
    Set { path: String, value: Bson },
    Unset { path: String },
    Inc { path: String, by: Bson },
    Push { path: String, values: Vec<Bson> },
    AddToSet { path: String, values: Vec<Bson> },
    Pull { path: String, cond: PullCond },
}

/// What a `$pull` removes from an array.
#[derive(Debug, Clone)]
pub enum PullCond {
    /// Elements equal to the value.
    Equals(Bson),
    /// Elements satisfying an operator expression such as `{ "$in": [...] }`.
    Matches(Filter),
    /// Sub-document elements matching a query.
    Query(Filter),
}

#[derive(Debug, Default, Clone)]
pub struct UpdateDoc {
    pub ops: Vec<UpdateOp>,
}

/// Whether find-and-modify returns the document as it was or as it became.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnDocument {
    Before,
    #[default]
    After,
}

/// One step of an ordered bulk write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteModel {
    InsertOne { document: BsonDocument },
    UpdateOne { filter: BsonDocument, update: BsonDocument },
    UpdateMany { filter: BsonDocument, update: BsonDocument },
    ReplaceOne { filter: BsonDocument, replacement: BsonDocument },
    DeleteOne { filter: BsonDocument },
    DeleteMany { filter: BsonDocument },
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub deleted: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkWriteReport {
    pub inserted: u64,
    pub matched: u64,
    pub modified: u64,
    pub deleted: u64,
    pub inserted_ids: Vec<Bson>,
}

impl BulkWriteReport {
    pub fn absorb_update(&mut self, r: &UpdateReport) {
        self.matched += r.matched;
        self.modified += r.modified;
    }

    pub fn absorb_delete(&mut self, r: &DeleteReport) {
        self.deleted += r.deleted;
    }

    pub fn absorb_insert(&mut self, id: Bson) {
        self.inserted += 1;
        self.inserted_ids.push(id);
    }
}
