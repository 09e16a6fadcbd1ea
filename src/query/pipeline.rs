use crate::errors::DbError;
use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::eval::{as_f64, bson_equal, compare_bson, compare_docs, eval_filter, get_path};
use super::expr::Expr;
use super::parse::{parse_filter, parse_sort};
use super::project::Projection;
use super::types::{Filter, SortSpec};

const MAX_PIPELINE_STAGES: usize = 64;

#[derive(Debug, Clone)]
pub enum Stage {
    Match(Filter),
    Unwind { path: String, preserve_empty: bool },
    Sort(Vec<SortSpec>),
    Skip(usize),
    Limit(usize),
    Project(Projection),
    Group { id: Expr, accumulators: Vec<(String, Accumulator)> },
    Count(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccOp {
    Avg,
    Sum,
    Min,
    Max,
    First,
    Last,
    Push,
}

#[derive(Debug, Clone)]
pub struct Accumulator {
    pub op: AccOp,
    pub expr: Expr,
}

/// Parses an aggregation pipeline.
///
/// # Errors
/// Returns `DbError::Query` for unsupported stages or malformed stage bodies.
pub fn parse_pipeline(stages: &[BsonDocument]) -> Result<Vec<Stage>, DbError> {
    if stages.len() > MAX_PIPELINE_STAGES {
        return Err(DbError::query("pipeline too long"));
    }
    stages.iter().map(parse_stage).collect()
}

fn parse_stage(stage: &BsonDocument) -> Result<Stage, DbError> {
    let mut it = stage.iter();
    let (Some((name, body)), None) = (it.next(), it.next()) else {
        return Err(DbError::query("each pipeline stage must have exactly one key"));
    };
    Ok(match (name.as_str(), body) {
        ("$match", Bson::Document(d)) => Stage::Match(parse_filter(d)?),
        ("$unwind", Bson::String(path)) => {
            Stage::Unwind { path: field_ref(path)?, preserve_empty: false }
        }
        ("$unwind", Bson::Document(d)) => Stage::Unwind {
            path: field_ref(
                d.get_str("path").map_err(|_| DbError::query("$unwind requires path"))?,
            )?,
            preserve_empty: d.get_bool("preserveNullAndEmptyArrays").unwrap_or(false),
        },
        ("$sort", Bson::Document(d)) => Stage::Sort(parse_sort(d)?),
        ("$skip", n) => Stage::Skip(count_arg("$skip", n)?),
        ("$limit", n) => Stage::Limit(count_arg("$limit", n)?),
        ("$project", Bson::Document(d)) => Stage::Project(Projection::parse(d)?),
        ("$group", Bson::Document(d)) => parse_group(d)?,
        ("$count", Bson::String(field)) if !field.is_empty() => Stage::Count(field.clone()),
        (other, _) => return Err(DbError::query(format!("unsupported or malformed stage {other}"))),
    })
}

fn field_ref(path: &str) -> Result<String, DbError> {
    path.strip_prefix('$')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DbError::query(format!("expected a $field reference, got {path:?}")))
}

fn count_arg(stage: &str, v: &Bson) -> Result<usize, DbError> {
    let n = match v {
        Bson::Int32(i) => i64::from(*i),
        Bson::Int64(i) => *i,
        _ => return Err(DbError::query(format!("{stage} requires an integer"))),
    };
    usize::try_from(n).map_err(|_| DbError::query(format!("{stage} must not be negative")))
}

fn parse_group(d: &BsonDocument) -> Result<Stage, DbError> {
    let id = d.get("_id").ok_or_else(|| DbError::query("$group requires _id"))?;
    let mut accumulators = Vec::new();
    for (field, spec) in d.iter().filter(|(k, _)| k.as_str() != "_id") {
        let Bson::Document(spec) = spec else {
            return Err(DbError::query(format!("accumulator for {field} must be a document")));
        };
        let mut it = spec.iter();
        let (Some((op, arg)), None) = (it.next(), it.next()) else {
            return Err(DbError::query(format!("accumulator for {field} must have one operator")));
        };
        let op = match op.as_str() {
            "$avg" => AccOp::Avg,
            "$sum" => AccOp::Sum,
            "$min" => AccOp::Min,
            "$max" => AccOp::Max,
            "$first" => AccOp::First,
            "$last" => AccOp::Last,
            "$push" => AccOp::Push,
            other => return Err(DbError::query(format!("unsupported accumulator {other}"))),
        };
        accumulators.push((field.clone(), Accumulator { op, expr: Expr::parse(arg)? }));
    }
    Ok(Stage::Group { id: Expr::parse(id)?, accumulators })
}

/// Runs parsed stages over `docs` in order.
#[must_use]
pub fn run_pipeline(mut docs: Vec<BsonDocument>, stages: &[Stage]) -> Vec<BsonDocument> {
    for stage in stages {
        docs = match stage {
            Stage::Match(f) => docs.into_iter().filter(|d| eval_filter(d, f)).collect(),
            Stage::Unwind { path, preserve_empty } => unwind(docs, path, *preserve_empty),
            Stage::Sort(specs) => {
                // Stable: equal keys keep their incoming order
                docs.sort_by(|a, b| compare_docs(a, b, specs));
                docs
            }
            Stage::Skip(n) => docs.into_iter().skip(*n).collect(),
            Stage::Limit(n) => docs.into_iter().take(*n).collect(),
            Stage::Project(p) => docs.iter().map(|d| p.apply(d)).collect(),
            Stage::Group { id, accumulators } => group(&docs, id, accumulators),
            Stage::Count(field) => {
                let n = i64::try_from(docs.len()).unwrap_or(i64::MAX);
                let mut out = BsonDocument::new();
                out.insert(field.clone(), i32::try_from(n).map_or(Bson::Int64(n), Bson::Int32));
                vec![out]
            }
        };
    }
    docs
}

fn unwind(docs: Vec<BsonDocument>, path: &str, preserve_empty: bool) -> Vec<BsonDocument> {
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        match get_path(&doc, path).cloned() {
            Some(Bson::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut row = doc.clone();
                    let _ = super::update::set_path(&mut row, path, item);
                    out.push(row);
                }
            }
            Some(Bson::Array(_)) | Some(Bson::Null) | None => {
                if preserve_empty {
                    out.push(doc);
                }
            }
            // A non-array value unwinds to itself
            Some(_) => out.push(doc),
        }
    }
    out
}

#[derive(Debug)]
struct GroupState {
    key: Bson,
    values: Vec<Vec<Bson>>,
}

fn group(
    docs: &[BsonDocument],
    id: &Expr,
    accumulators: &[(String, Accumulator)],
) -> Vec<BsonDocument> {
    // Linear scan keeps groups in first-encounter order
    let mut groups: Vec<GroupState> = Vec::new();
    for doc in docs {
        let key = id.eval(doc).unwrap_or(Bson::Null);
        let idx = match groups.iter().position(|g| bson_equal(&g.key, &key)) {
            Some(i) => i,
            None => {
                groups.push(GroupState { key, values: vec![Vec::new(); accumulators.len()] });
                groups.len() - 1
            }
        };
        for (slot, (_, acc)) in accumulators.iter().enumerate() {
            if let Some(v) = acc.expr.eval(doc) {
                groups[idx].values[slot].push(v);
            }
        }
    }
    groups
        .into_iter()
        .map(|g| {
            let mut out = BsonDocument::new();
            out.insert("_id", g.key);
            for ((field, acc), values) in accumulators.iter().zip(g.values) {
                out.insert(field.clone(), accumulate(acc.op, values));
            }
            out
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn accumulate(op: AccOp, values: Vec<Bson>) -> Bson {
    match op {
        AccOp::Avg => {
            let nums: Vec<f64> = values.iter().filter_map(as_f64).collect();
            if nums.is_empty() {
                Bson::Null
            } else {
                Bson::Double(nums.iter().sum::<f64>() / nums.len() as f64)
            }
        }
        AccOp::Sum => sum(&values),
        AccOp::Min => values
            .into_iter()
            .filter(|v| !matches!(v, Bson::Null))
            .min_by(compare_bson)
            .unwrap_or(Bson::Null),
        AccOp::Max => values
            .into_iter()
            .filter(|v| !matches!(v, Bson::Null))
            .max_by(compare_bson)
            .unwrap_or(Bson::Null),
        AccOp::First => values.into_iter().next().unwrap_or(Bson::Null),
        AccOp::Last => values.into_iter().last().unwrap_or(Bson::Null),
        AccOp::Push => Bson::Array(values),
    }
}

#[allow(clippy::cast_precision_loss)]
fn sum(values: &[Bson]) -> Bson {
    let mut int_total: i64 = 0;
    let mut float_total = 0.0;
    let mut saw_double = false;
    for v in values {
        match v {
            Bson::Int32(i) => int_total = int_total.saturating_add(i64::from(*i)),
            Bson::Int64(i) => int_total = int_total.saturating_add(*i),
            Bson::Double(f) => {
                saw_double = true;
                float_total += f;
            }
            _ => {}
        }
    }
    if saw_double {
        return Bson::Double(float_total + int_total as f64);
    }
    i32::try_from(int_total).map_or(Bson::Int64(int_total), Bson::Int32)
}

/// Ordering helper for callers that want to check a sorted result.
#[must_use]
pub fn is_sorted_by(docs: &[BsonDocument], specs: &[SortSpec]) -> bool {
    docs.windows(2).all(|w| compare_docs(&w[0], &w[1], specs) != Ordering::Greater)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn unwind_drops_empty_arrays_unless_preserved() {
        let docs = vec![doc! { "n": "a", "s": [1, 2] }, doc! { "n": "b", "s": [] }];
        let stages = parse_pipeline(&[doc! { "$unwind": "$s" }]).unwrap();
        let out = run_pipeline(docs.clone(), &stages);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].get_i32("s").unwrap(), 2);

        let keep = parse_pipeline(&[
            doc! { "$unwind": { "path": "$s", "preserveNullAndEmptyArrays": true } },
        ])
        .unwrap();
        assert_eq!(run_pipeline(docs, &keep).len(), 3);
    }

    #[test]
    fn sum_counts_with_literal_one() {
        let docs = vec![doc! { "k": "x" }, doc! { "k": "x" }, doc! { "k": "y" }];
        let stages =
            parse_pipeline(&[doc! { "$group": { "_id": "$k", "n": { "$sum": 1 } } }]).unwrap();
        let out = run_pipeline(docs, &stages);
        assert_eq!(out, vec![doc! { "_id": "x", "n": 2 }, doc! { "_id": "y", "n": 1 }]);
    }

    #[test]
    fn unknown_stage_is_an_error() {
        assert!(parse_pipeline(&[doc! { "$lookup": {} }]).is_err());
    }
}
