use crate::errors::DbError;
use bson::{Bson, Document as BsonDocument};

use super::eval::get_path;
use super::expr::Expr;
use super::update::set_path;

const MAX_PROJECTION_FIELDS: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum Field {
    Include,
    Computed(Expr),
}

/// A parsed projection in either inclusion or exclusion form.
///
/// `_id` is kept unless explicitly suppressed, in both forms.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    include: Vec<(String, Field)>,
    exclude: Vec<String>,
    keep_id: bool,
}

impl Projection {
    /// # Errors
    /// Returns `DbError::Query` when inclusion and exclusion are mixed or a
    /// computed field uses an unsupported operator.
    pub fn parse(spec: &BsonDocument) -> Result<Self, DbError> {
        if spec.len() > MAX_PROJECTION_FIELDS {
            return Err(DbError::query("too many projection fields"));
        }
        let mut out = Self { include: Vec::new(), exclude: Vec::new(), keep_id: true };
        for (key, value) in spec {
            let flag = as_flag(value);
            if key == "_id" {
                match flag {
                    Some(keep) => out.keep_id = keep,
                    None => out.include.push((key.clone(), Field::Computed(Expr::parse(value)?))),
                }
                continue;
            }
            match flag {
                Some(true) => out.include.push((key.clone(), Field::Include)),
                Some(false) => out.exclude.push(key.clone()),
                None => out.include.push((key.clone(), Field::Computed(Expr::parse(value)?))),
            }
        }
        if !out.include.is_empty() && !out.exclude.is_empty() {
            return Err(DbError::query("cannot mix inclusion and exclusion in a projection"));
        }
        Ok(out)
    }

    #[must_use]
    pub fn apply(&self, doc: &BsonDocument) -> BsonDocument {
        if self.include.is_empty() {
            let mut out = doc.clone();
            for path in &self.exclude {
                remove_path(&mut out, path);
            }
            if !self.keep_id {
                out.remove("_id");
            }
            return out;
        }
        let mut out = BsonDocument::new();
        if self.keep_id
            && let Some(id) = doc.get("_id")
        {
            out.insert("_id", id.clone());
        }
        for (path, field) in &self.include {
            let value = match field {
                Field::Include => get_path(doc, path).cloned(),
                Field::Computed(e) => e.eval(doc),
            };
            if let Some(v) = value {
                // Paths were validated when the source document was built
                let _ = set_path(&mut out, path, v);
            }
        }
        out
    }
}

fn as_flag(v: &Bson) -> Option<bool> {
    match v {
        Bson::Boolean(b) => Some(*b),
        Bson::Int32(i) => Some(*i != 0),
        Bson::Int64(i) => Some(*i != 0),
        Bson::Double(f) => Some(*f != 0.0),
        _ => None,
    }
}

fn remove_path(doc: &mut BsonDocument, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(sub)) = doc.get_mut(head) {
                remove_path(sub, rest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn inclusion_drops_id_on_request() {
        let p = Projection::parse(&doc! { "firstName": 1, "age": 1, "_id": 0 }).unwrap();
        let out = p.apply(&doc! { "_id": 7, "firstName": "Ann", "lastName": "Lee", "age": 30 });
        assert_eq!(out, doc! { "firstName": "Ann", "age": 30 });
    }

    #[test]
    fn computed_fields_read_paths() {
        let p = Projection::parse(&doc! { "name": 1, "best": "$scores.score", "_id": 0 }).unwrap();
        let out =
            p.apply(&doc! { "_id": 1, "name": "Ann", "scores": { "type": "exam", "score": 90 } });
        assert_eq!(out, doc! { "name": "Ann", "best": 90 });
    }

    #[test]
    fn mixed_projection_is_rejected() {
        assert!(Projection::parse(&doc! { "a": 1, "b": 0 }).is_err());
    }
}
