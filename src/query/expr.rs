use crate::errors::DbError;
use bson::{Bson, Document as BsonDocument};

use super::eval::get_path;

/// Aggregation expression: a `"$field.path"` reference, a literal, or an
/// object whose fields are expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Field(String),
    Literal(Bson),
    Object(Vec<(String, Expr)>),
}

impl Expr {
    /// # Errors
    /// Returns `DbError::Query` for operator expressions other than `$literal`.
    pub fn parse(value: &Bson) -> Result<Self, DbError> {
        Ok(match value {
            Bson::String(s) if s.starts_with('$') && s.len() > 1 => Self::Field(s[1..].to_string()),
            Bson::Document(d) if d.len() == 1 && d.contains_key("$literal") => {
                Self::Literal(d.get("$literal").cloned().unwrap_or(Bson::Null))
            }
            Bson::Document(d) => {
                if let Some(op) = d.keys().find(|k| k.starts_with('$')) {
                    return Err(DbError::query(format!("unsupported expression operator {op}")));
                }
                let fields = d
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), Self::parse(v)?)))
                    .collect::<Result<Vec<_>, DbError>>()?;
                Self::Object(fields)
            }
            other => Self::Literal(other.clone()),
        })
    }

    /// Evaluates against `doc`. A reference to a missing field yields `None`.
    #[must_use]
    pub fn eval(&self, doc: &BsonDocument) -> Option<Bson> {
        match self {
            Self::Field(path) => get_path(doc, path).cloned(),
            Self::Literal(v) => Some(v.clone()),
            Self::Object(fields) => {
                let mut out = BsonDocument::new();
                for (k, e) in fields {
                    if let Some(v) = e.eval(doc) {
                        out.insert(k.clone(), v);
                    }
                }
                Some(Bson::Document(out))
            }
        }
    }
}
