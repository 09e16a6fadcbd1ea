use crate::errors::DbError;
use crate::query::{parse_document_json, sort_from_spec};
use bson::Document as BsonDocument;

/// A JSON filter argument; absent or blank means "match everything".
pub fn parse_filter_arg(s: Option<&str>) -> Result<BsonDocument, DbError> {
    match s.map(str::trim) {
        None | Some("") => Ok(BsonDocument::new()),
        Some(json) => parse_document_json(json),
    }
}

/// `"-age,name"` style sort keys.
pub fn parse_sort_arg(s: Option<&str>) -> Option<BsonDocument> {
    s.map(sort_from_spec).filter(|d| !d.is_empty())
}

/// Comma-separated projection: `a,b` includes, `-a` excludes.
pub fn parse_projection_arg(s: Option<&str>) -> Option<BsonDocument> {
    let mut out = BsonDocument::new();
    for field in s?.split(',').map(str::trim).filter(|f| !f.is_empty()) {
        match field.strip_prefix('-') {
            Some(name) => out.insert(name, 0),
            None => out.insert(field.trim_start_matches('+'), 1),
        };
    }
    (!out.is_empty()).then_some(out)
}
