use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::types::{CmpOp, Filter, MAX_IN_SET, MAX_PATH_DEPTH, MAX_SORT_FIELDS, Order, SortSpec};

#[must_use]
pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Not(f) => !eval_filter(doc, f),
        Filter::Exists { path, exists } => !resolve_path(doc, path).is_empty() == *exists,
        Filter::In { path, values } => {
            let found = resolve_path(doc, path);
            if found.is_empty() {
                // `{ f: { $in: [null] } }` matches documents lacking `f`
                return values.iter().any(|v| matches!(v, Bson::Null));
            }
            found
                .into_iter()
                .any(|v| expand(v).any(|x| is_in_set(x, values)) || is_in_set(v, values))
        }
        Filter::Cmp { path, op, value } => {
            let found = resolve_path(doc, path);
            if found.is_empty() {
                return *op == CmpOp::Eq && matches!(value, Bson::Null);
            }
            found.into_iter().any(|v| match op {
                CmpOp::Eq => bson_equal(v, value) || expand(v).any(|x| bson_equal(x, value)),
                _ => expand(v).any(|x| cmp_matches(x, *op, value)),
            })
        }
        Filter::Regex { path, regex } => resolve_path(doc, path)
            .into_iter()
            .any(|v| expand(v).any(|x| matches!(x, Bson::String(s) if regex.is_match(s)))),
    }
}

fn cmp_matches(v: &Bson, op: CmpOp, value: &Bson) -> bool {
    // Range operators only compare values of the same type class
    if !comparable(v, value) {
        return false;
    }
    let c = compare_bson(v, value);
    match op {
        CmpOp::Eq => c == Ordering::Equal,
        CmpOp::Gt => c == Ordering::Greater,
        CmpOp::Gte => c != Ordering::Less,
        CmpOp::Lt => c == Ordering::Less,
        CmpOp::Lte => c != Ordering::Greater,
    }
}

fn comparable(a: &Bson, b: &Bson) -> bool {
    (is_num(a) && is_num(b)) || std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// Yields the elements of an array, or the value itself otherwise.
fn expand(v: &Bson) -> Box<dyn Iterator<Item = &Bson> + '_> {
    match v {
        Bson::Array(items) => Box::new(items.iter()),
        other => Box::new(std::iter::once(other)),
    }
}

fn is_in_set(v: &Bson, set: &[Bson]) -> bool {
    set.iter().take(MAX_IN_SET).any(|x| bson_equal(x, v))
}

/// Resolves a dotted path, fanning out across arrays of sub-documents.
///
/// `scores.type` on `{scores: [{type: "a"}, {type: "b"}]}` yields both strings.
/// Numeric segments index into arrays.
#[must_use]
pub fn resolve_path<'a>(doc: &'a BsonDocument, path: &str) -> Vec<&'a Bson> {
    let parts: Vec<&str> = path.split('.').collect();
    if path.is_empty() || parts.len() > MAX_PATH_DEPTH {
        return Vec::new();
    }
    let mut out = Vec::new();
    if let Some(first) = doc.get(parts[0]) {
        walk(first, &parts[1..], &mut out);
    }
    out
}

fn walk<'a>(value: &'a Bson, rest: &[&str], out: &mut Vec<&'a Bson>) {
    let Some((head, tail)) = rest.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Bson::Document(d) => {
            if let Some(v) = d.get(*head) {
                walk(v, tail, out);
            }
        }
        Bson::Array(items) => {
            if let Ok(idx) = head.parse::<usize>() {
                if let Some(item) = items.get(idx) {
                    walk(item, tail, out);
                }
                return;
            }
            for item in items {
                if let Bson::Document(_) = item {
                    walk(item, rest, out);
                }
            }
        }
        _ => {}
    }
}

/// First value found at `path`, if any.
#[must_use]
pub fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    resolve_path(doc, path).into_iter().next()
}

pub fn compare_docs(a: &BsonDocument, b: &BsonDocument, sort: &[SortSpec]) -> Ordering {
    for s in sort.iter().take(MAX_SORT_FIELDS) {
        let va = get_path(a, &s.field);
        let vb = get_path(b, &s.field);
        let ord = match (va, vb) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

fn is_num(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn as_f64(x: &Bson) -> Option<f64> {
    match x {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

#[allow(clippy::float_cmp)]
pub fn bson_equal(a: &Bson, b: &Bson) -> bool {
    if is_num(a) && is_num(b) {
        return match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        };
    }
    match (a, b) {
        (Bson::Array(xs), Bson::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| bson_equal(x, y))
        }
        (Bson::Document(x), Bson::Document(y)) => {
            x.len() == y.len()
                && x.iter().zip(y.iter()).all(|((ka, va), (kb, vb))| ka == kb && bson_equal(va, vb))
        }
        _ => a == b,
    }
}

pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if is_num(a) && is_num(b) {
        let x = as_f64(a).unwrap_or(f64::NAN);
        let y = as_f64(b).unwrap_or(f64::NAN);
        return x.total_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

// Cross-type ordering follows the server's comparison order.
fn type_rank(v: &Bson) -> u8 {
    use bson::Bson as T;
    match v {
        T::MinKey => 0,
        T::Null | T::Undefined => 1,
        T::Int32(_) | T::Int64(_) | T::Double(_) | T::Decimal128(_) => 2,
        T::Symbol(_) | T::String(_) => 3,
        T::Document(_) => 4,
        T::Array(_) => 5,
        T::Binary(_) => 6,
        T::ObjectId(_) => 7,
        T::Boolean(_) => 8,
        T::DateTime(_) => 9,
        T::Timestamp(_) => 10,
        T::RegularExpression(_) => 11,
        T::DbPointer(_) => 12,
        T::JavaScriptCode(_) | T::JavaScriptCodeWithScope(_) => 13,
        T::MaxKey => 255,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn resolve_fans_out_over_sub_document_arrays() {
        let d = doc! {
            "scores": [ { "type": "exam", "score": 1 }, { "type": "quiz", "score": 2 } ]
        };
        let found = resolve_path(&d, "scores.type");
        assert_eq!(found, vec![&Bson::from("exam"), &Bson::from("quiz")]);
        assert_eq!(get_path(&d, "scores.1.score"), Some(&Bson::Int32(2)));
        assert!(resolve_path(&d, "scores.missing").is_empty());
    }

    #[test]
    fn numbers_compare_across_widths() {
        assert!(bson_equal(&Bson::Int32(3), &Bson::Double(3.0)));
        assert_eq!(compare_bson(&Bson::Int64(2), &Bson::Double(2.5)), Ordering::Less);
        assert_eq!(compare_bson(&Bson::Null, &Bson::Int32(0)), Ordering::Less);
    }
}
