use crate::errors::DbError;
use bson::{Bson, Document as BsonDocument};

use super::types::{CmpOp, Filter, MAX_IN_SET, MAX_PATTERN_LEN, MAX_SORT_FIELDS, Order, SortSpec};

/// Parses a Mongo-syntax query document.
///
/// # Errors
/// Returns `DbError::Query` for unknown or malformed operators.
pub fn parse_filter(doc: &BsonDocument) -> Result<Filter, DbError> {
    let mut clauses = Vec::with_capacity(doc.len());
    for (key, value) in doc {
        clauses.push(match key.as_str() {
            "$and" => Filter::And(parse_clause_list(key, value)?),
            "$or" => Filter::Or(parse_clause_list(key, value)?),
            "$nor" => Filter::Not(Box::new(Filter::Or(parse_clause_list(key, value)?))),
            k if k.starts_with('$') => {
                return Err(DbError::query(format!("unknown top-level operator {k}")));
            }
            path => parse_field(path, value)?,
        });
    }
    Ok(match clauses.len() {
        0 => Filter::True,
        1 => clauses.remove(0),
        _ => Filter::And(clauses),
    })
}

fn parse_clause_list(op: &str, value: &Bson) -> Result<Vec<Filter>, DbError> {
    let Bson::Array(items) = value else {
        return Err(DbError::query(format!("{op} requires an array")));
    };
    if items.is_empty() {
        return Err(DbError::query(format!("{op} requires a non-empty array")));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => parse_filter(d),
            _ => Err(DbError::query(format!("{op} entries must be documents"))),
        })
        .collect()
}

/// Parses the condition attached to one field: either a literal (implicit
/// equality) or an operator document such as `{ "$gte": 25, "$lt": 30 }`.
pub(crate) fn parse_field(path: &str, value: &Bson) -> Result<Filter, DbError> {
    match value {
        Bson::Document(d) if d.keys().next().is_some_and(|k| k.starts_with('$')) => {
            parse_operators(path, d)
        }
        Bson::RegularExpression(re) => build_regex(path, &re.pattern, &re.options),
        literal => {
            Ok(Filter::Cmp { path: path.to_string(), op: CmpOp::Eq, value: literal.clone() })
        }
    }
}

fn parse_operators(path: &str, ops: &BsonDocument) -> Result<Filter, DbError> {
    let mut clauses = Vec::with_capacity(ops.len());
    let options = ops.get_str("$options").unwrap_or("");
    for (op, operand) in ops {
        let p = path.to_string();
        let clause = match op.as_str() {
            "$eq" => Filter::Cmp { path: p, op: CmpOp::Eq, value: operand.clone() },
            "$ne" => {
                Filter::Not(Box::new(Filter::Cmp {
                    path: p,
                    op: CmpOp::Eq,
                    value: operand.clone(),
                }))
            }
            "$gt" => Filter::Cmp { path: p, op: CmpOp::Gt, value: operand.clone() },
            "$gte" => Filter::Cmp { path: p, op: CmpOp::Gte, value: operand.clone() },
            "$lt" => Filter::Cmp { path: p, op: CmpOp::Lt, value: operand.clone() },
            "$lte" => Filter::Cmp { path: p, op: CmpOp::Lte, value: operand.clone() },
            "$in" => Filter::In { path: p, values: value_set(op, operand)? },
            "$nin" => {
                Filter::Not(Box::new(Filter::In { path: p, values: value_set(op, operand)? }))
            }
            "$exists" => Filter::Exists { path: p, exists: truthy(operand) },
            "$regex" => match operand {
                Bson::String(pattern) => build_regex(path, pattern, options)?,
                Bson::RegularExpression(re) => build_regex(path, &re.pattern, &re.options)?,
                _ => return Err(DbError::query("$regex requires a string pattern")),
            },
            "$options" => continue,
            "$not" => match operand {
                Bson::Document(inner) => Filter::Not(Box::new(parse_operators(path, inner)?)),
                Bson::RegularExpression(re) => {
                    Filter::Not(Box::new(build_regex(path, &re.pattern, &re.options)?))
                }
                _ => return Err(DbError::query("$not requires a document or regex")),
            },
            other => return Err(DbError::query(format!("unsupported operator {other}"))),
        };
        clauses.push(clause);
    }
    Ok(match clauses.len() {
        1 => clauses.remove(0),
        _ => Filter::And(clauses),
    })
}

fn value_set(op: &str, operand: &Bson) -> Result<Vec<Bson>, DbError> {
    match operand {
        Bson::Array(values) => Ok(values.iter().take(MAX_IN_SET).cloned().collect()),
        _ => Err(DbError::query(format!("{op} requires an array"))),
    }
}

fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(f) => *f != 0.0,
        Bson::Null => false,
        _ => true,
    }
}

fn build_regex(path: &str, pattern: &str, options: &str) -> Result<Filter, DbError> {
    if pattern.len() > MAX_PATTERN_LEN {
        return Err(DbError::query("regex pattern too long"));
    }
    let mut builder = regex::RegexBuilder::new(pattern);
    builder
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .ignore_whitespace(options.contains('x'));
    let regex = builder.build().map_err(|e| DbError::query(format!("bad regex: {e}")))?;
    Ok(Filter::Regex { path: path.to_string(), regex })
}

/// Parses `{ field: 1 | -1, ... }` into sort keys.
///
/// # Errors
/// Returns `DbError::Query` when a direction is not `1` or `-1`.
pub fn parse_sort(doc: &BsonDocument) -> Result<Vec<SortSpec>, DbError> {
    if doc.len() > MAX_SORT_FIELDS {
        return Err(DbError::query(format!("sort accepts at most {MAX_SORT_FIELDS} keys")));
    }
    doc.iter()
        .map(|(field, dir)| {
            let order = match dir {
                Bson::Int32(1) | Bson::Int64(1) => Order::Asc,
                Bson::Int32(-1) | Bson::Int64(-1) => Order::Desc,
                Bson::Double(f) if *f == 1.0 => Order::Asc,
                Bson::Double(f) if *f == -1.0 => Order::Desc,
                other => {
                    return Err(DbError::query(format!("bad sort direction for {field}: {other}")));
                }
            };
            Ok(SortSpec { field: field.clone(), order })
        })
        .collect()
}

/// Parses a comma-separated sort spec such as `-age,+name` into a sort document.
#[must_use]
pub fn sort_from_spec(spec: &str) -> BsonDocument {
    let mut out = BsonDocument::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (dir, field) = if let Some(rest) = part.strip_prefix('-') {
            (-1, rest)
        } else if let Some(rest) = part.strip_prefix('+') {
            (1, rest)
        } else {
            (1, part)
        };
        out.insert(field, dir);
    }
    out
}

/// Parses a JSON object (as typed on a command line) into a BSON document.
///
/// # Errors
/// Returns an error if the string is not valid JSON or not an object.
pub fn parse_document_json(json: &str) -> Result<BsonDocument, DbError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    if !value.is_object() {
        return Err(DbError::query("expected a JSON object"));
    }
    Ok(bson::to_document(&value)?)
}
