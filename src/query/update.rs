use crate::document::Document;
use crate::errors::DbError;
use bson::{Bson, Document as BsonDocument};

use super::eval::{as_f64, bson_equal, eval_filter};
use super::parse::{parse_field, parse_filter};
use super::types::{MAX_PATH_DEPTH, MAX_UPDATE_FIELDS, PullCond, UpdateDoc, UpdateOp};

// Field name used to evaluate `$pull` operator conditions against bare elements.
const PULL_PROBE: &str = "v";

/// Parses an update document made of operators (`$set`, `$addToSet`, ...).
///
/// # Errors
/// Returns `DbError::Query` when the document is empty, contains plain fields
/// (that is a replacement, not an update), or uses an unsupported operator.
pub fn parse_update(doc: &BsonDocument) -> Result<UpdateDoc, DbError> {
    if doc.is_empty() {
        return Err(DbError::query("update document must not be empty"));
    }
    let mut out = UpdateDoc::default();
    for (op, fields) in doc {
        let Bson::Document(fields) = fields else {
            return Err(DbError::query(format!("{op} requires a document of fields")));
        };
        if fields.len() > MAX_UPDATE_FIELDS {
            return Err(DbError::query(format!("too many update fields under {op}")));
        }
        for (path, value) in fields {
            let path = path.clone();
            let parsed = match op.as_str() {
                "$set" => UpdateOp::Set { path, value: value.clone() },
                "$unset" => UpdateOp::Unset { path },
                "$inc" => {
                    if as_f64(value).is_none() {
                        return Err(DbError::query("$inc requires a numeric operand"));
                    }
                    UpdateOp::Inc { path, by: value.clone() }
                }
                "$push" => UpdateOp::Push { path, values: each_values(value) },
                "$addToSet" => UpdateOp::AddToSet { path, values: each_values(value) },
                "$pull" => UpdateOp::Pull { path, cond: pull_cond(value)? },
                other if other.starts_with('$') => {
                    return Err(DbError::query(format!("unsupported update operator {other}")));
                }
                other => {
                    return Err(DbError::query(format!(
                        "update documents require operators; found plain field {other}"
                    )));
                }
            };
            out.ops.push(parsed);
        }
    }
    Ok(out)
}

/// Rejects replacement documents that carry update operators.
///
/// # Errors
/// Returns `DbError::Query` if any top-level key starts with `$`.
pub fn check_replacement(doc: &BsonDocument) -> Result<(), DbError> {
    match doc.keys().find(|k| k.starts_with('$')) {
        Some(k) => Err(DbError::query(format!("replacement document may not contain {k}"))),
        None => Ok(()),
    }
}

fn each_values(value: &Bson) -> Vec<Bson> {
    match value {
        Bson::Document(d) => match d.get("$each") {
            Some(Bson::Array(items)) => items.clone(),
            _ => vec![value.clone()],
        },
        _ => vec![value.clone()],
    }
}

fn pull_cond(value: &Bson) -> Result<PullCond, DbError> {
    match value {
        Bson::Document(d) if d.keys().next().is_some_and(|k| k.starts_with('$')) => {
            Ok(PullCond::Matches(parse_field(PULL_PROBE, value)?))
        }
        Bson::Document(d) => Ok(PullCond::Query(parse_filter(d)?)),
        other => Ok(PullCond::Equals(other.clone())),
    }
}

/// Applies every operator in order. Returns whether the document changed.
///
/// # Errors
/// Returns `DbError::Query` when an operator targets a field of the wrong type,
/// for example `$addToSet` on a string.
pub fn apply_update(doc: &mut Document, upd: &UpdateDoc) -> Result<bool, DbError> {
    let mut modified = false;
    for op in &upd.ops {
        modified |= apply_op(&mut doc.data, op)?;
    }
    Ok(modified)
}

fn apply_op(root: &mut BsonDocument, op: &UpdateOp) -> Result<bool, DbError> {
    match op {
        UpdateOp::Set { path, value } => set_path(root, path, value.clone()),
        UpdateOp::Unset { path } => Ok(unset_path(root, path)),
        UpdateOp::Inc { path, by } => {
            let next = match lookup(root, path) {
                None => by.clone(),
                Some(cur) => add_numbers(cur, by).ok_or_else(|| {
                    DbError::query(format!("cannot $inc non-numeric field {path}"))
                })?,
            };
            set_path(root, path, next)
        }
        UpdateOp::Push { path, values } => {
            let arr = array_at(root, path)?;
            arr.extend(values.iter().cloned());
            Ok(!values.is_empty())
        }
        UpdateOp::AddToSet { path, values } => {
            let arr = array_at(root, path)?;
            let mut changed = false;
            for v in values {
                if !arr.iter().any(|x| bson_equal(x, v)) {
                    arr.push(v.clone());
                    changed = true;
                }
            }
            Ok(changed)
        }
        UpdateOp::Pull { path, cond } => {
            let Some(Bson::Array(arr)) = lookup_mut(root, path) else {
                // Pulling from a missing field is a no-op
                return Ok(false);
            };
            let before = arr.len();
            arr.retain(|x| !pull_matches(x, cond));
            Ok(arr.len() != before)
        }
    }
}

fn pull_matches(elem: &Bson, cond: &PullCond) -> bool {
    match cond {
        PullCond::Equals(v) => bson_equal(elem, v),
        PullCond::Matches(f) => {
            let mut probe = BsonDocument::new();
            probe.insert(PULL_PROBE, elem.clone());
            eval_filter(&probe, f)
        }
        PullCond::Query(f) => matches!(elem, Bson::Document(d) if eval_filter(d, f)),
    }
}

fn add_numbers(a: &Bson, b: &Bson) -> Option<Bson> {
    Some(match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => match x.checked_add(*y) {
            Some(s) => Bson::Int32(s),
            None => Bson::Int64(i64::from(*x) + i64::from(*y)),
        },
        (Bson::Int32(x), Bson::Int64(y)) => Bson::Int64(i64::from(*x).checked_add(*y)?),
        (Bson::Int64(x), Bson::Int32(y)) => Bson::Int64(x.checked_add(i64::from(*y))?),
        (Bson::Int64(x), Bson::Int64(y)) => Bson::Int64(x.checked_add(*y)?),
        _ => Bson::Double(as_f64(a)? + as_f64(b)?),
    })
}

fn split_path(path: &str) -> Result<Vec<&str>, DbError> {
    let parts: Vec<&str> = path.split('.').collect();
    if path.is_empty() || parts.iter().any(|p| p.is_empty()) || parts.len() > MAX_PATH_DEPTH {
        return Err(DbError::query(format!("invalid field path {path:?}")));
    }
    Ok(parts)
}

fn lookup<'a>(root: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut cur = root.get(parts.next()?)?;
    for part in parts {
        cur = match cur {
            Bson::Document(d) => d.get(part)?,
            _ => return None,
        };
    }
    Some(cur)
}

fn lookup_mut<'a>(root: &'a mut BsonDocument, path: &str) -> Option<&'a mut Bson> {
    let mut parts = path.split('.');
    let mut cur = root.get_mut(parts.next()?)?;
    for part in parts {
        cur = match cur {
            Bson::Document(d) => d.get_mut(part)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Walks to the parent of the last segment, creating sub-documents as needed.
fn parent_mut<'a>(
    root: &'a mut BsonDocument,
    parts: &[&str],
) -> Result<&'a mut BsonDocument, DbError> {
    let mut cur = root;
    for key in &parts[..parts.len() - 1] {
        if !cur.contains_key(*key) {
            cur.insert(*key, BsonDocument::new());
        }
        cur = match cur.get_mut(*key) {
            Some(Bson::Document(d)) => d,
            _ => return Err(DbError::query(format!("cannot traverse non-document field {key}"))),
        };
    }
    Ok(cur)
}

pub(crate) fn set_path(root: &mut BsonDocument, path: &str, value: Bson) -> Result<bool, DbError> {
    let parts = split_path(path)?;
    let parent = parent_mut(root, &parts)?;
    let last = parts[parts.len() - 1];
    let changed = parent.get(last).is_none_or(|prev| prev != &value);
    parent.insert(last, value);
    Ok(changed)
}

fn unset_path(root: &mut BsonDocument, path: &str) -> bool {
    match path.rsplit_once('.') {
        None => root.remove(path).is_some(),
        Some((parent, last)) => match lookup_mut(root, parent) {
            Some(Bson::Document(d)) => d.remove(last).is_some(),
            _ => false,
        },
    }
}

/// The array at `path`, created empty when the field is missing.
fn array_at<'a>(root: &'a mut BsonDocument, path: &str) -> Result<&'a mut Vec<Bson>, DbError> {
    let parts = split_path(path)?;
    let parent = parent_mut(root, &parts)?;
    let last = parts[parts.len() - 1];
    if !parent.contains_key(last) {
        parent.insert(last, Bson::Array(Vec::new()));
    }
    match parent.get_mut(last) {
        Some(Bson::Array(arr)) => Ok(arr),
        _ => Err(DbError::query(format!("field {path} is not an array"))),
    }
}
