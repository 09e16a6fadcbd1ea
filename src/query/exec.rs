use crate::document::Document;
use crate::errors::DbError;
use bson::{Bson, Document as BsonDocument};
use std::time::Instant;

use super::eval::{compare_docs, eval_filter};
use super::parse::{parse_filter, parse_sort};
use super::pipeline::{parse_pipeline, run_pipeline};
use super::project::Projection;
use super::types::{
    BulkWriteReport, DeleteReport, FindOptions, ReturnDocument, UpdateDoc, UpdateReport, WriteModel,
};
use super::update::{apply_update, check_replacement, parse_update};

const MAX_LIMIT: usize = 10_000;

fn bench(op: &str, started: Instant, detail: std::fmt::Arguments<'_>) {
    log::debug!(
        target: "docops::query",
        "{{\"op\":\"{op}\",\"duration_us\":{},{detail}}}",
        started.elapsed().as_micros()
    );
}

/// Filters, sorts, slices and projects `docs`.
///
/// # Errors
/// Returns `DbError::Query` when the filter, sort or projection is malformed.
pub fn find_docs(
    docs: &[Document],
    filter: &BsonDocument,
    opts: &FindOptions,
) -> Result<Vec<BsonDocument>, DbError> {
    let started = Instant::now();
    let filter = parse_filter(filter)?;
    let projection = opts.projection.as_ref().map(Projection::parse).transpose()?;
    let sort = opts.sort.as_ref().map(parse_sort).transpose()?;

    let mut hits: Vec<&BsonDocument> =
        docs.iter().map(|d| &d.data).filter(|d| eval_filter(d, &filter)).collect();
    if let Some(specs) = &sort {
        hits.sort_by(|a, b| compare_docs(a, b, specs));
    }
    let skip = usize::try_from(opts.skip.unwrap_or(0)).unwrap_or(usize::MAX);
    // Zero means no limit; a negative limit caps at its absolute value, as on the server
    let limit = match opts.limit {
        Some(n) if n != 0 => usize::try_from(n.unsigned_abs()).unwrap_or(MAX_LIMIT).min(MAX_LIMIT),
        _ => MAX_LIMIT,
    };
    let out: Vec<BsonDocument> = hits
        .into_iter()
        .skip(skip)
        .take(limit)
        .map(|d| projection.as_ref().map_or_else(|| d.clone(), |p| p.apply(d)))
        .collect();
    bench("find", started, format_args!("\"result_count\":{}", out.len()));
    Ok(out)
}

/// # Errors
/// Returns `DbError::Query` when the filter is malformed.
pub fn count_docs(docs: &[Document], filter: &BsonDocument) -> Result<u64, DbError> {
    let filter = parse_filter(filter)?;
    Ok(docs.iter().filter(|d| eval_filter(&d.data, &filter)).count() as u64)
}

fn first_match(docs: &[Document], filter: &BsonDocument) -> Result<Option<usize>, DbError> {
    let filter = parse_filter(filter)?;
    Ok(docs.iter().position(|d| eval_filter(&d.data, &filter)))
}

// Applies to a copy so a failing operator leaves the stored document untouched.
fn update_at(docs: &mut [Document], idx: usize, update: &UpdateDoc) -> Result<bool, DbError> {
    let mut next = docs[idx].clone();
    let changed = apply_update(&mut next, update)?;
    if changed {
        docs[idx] = next;
    }
    Ok(changed)
}

/// # Errors
/// Returns `DbError::Query` for malformed documents or type-mismatched operators.
/// Documents updated before the failing one keep their changes.
pub fn update_many(
    docs: &mut [Document],
    filter: &BsonDocument,
    update: &BsonDocument,
) -> Result<UpdateReport, DbError> {
    let started = Instant::now();
    let filter = parse_filter(filter)?;
    let update = parse_update(update)?;
    let mut report = UpdateReport::default();
    for idx in 0..docs.len() {
        if !eval_filter(&docs[idx].data, &filter) {
            continue;
        }
        report.matched += 1;
        if update_at(docs, idx, &update)? {
            report.modified += 1;
        }
    }
    bench(
        "update_many",
        started,
        format_args!("\"matched\":{},\"modified\":{}", report.matched, report.modified),
    );
    Ok(report)
}

/// # Errors
/// Returns `DbError::Query` for malformed documents or type-mismatched operators.
pub fn update_one(
    docs: &mut [Document],
    filter: &BsonDocument,
    update: &BsonDocument,
) -> Result<UpdateReport, DbError> {
    let update = parse_update(update)?;
    let Some(idx) = first_match(docs, filter)? else {
        return Ok(UpdateReport::default());
    };
    let changed = update_at(docs, idx, &update)?;
    Ok(UpdateReport { matched: 1, modified: u64::from(changed) })
}

/// # Errors
/// Returns `DbError::Query` for malformed documents or type-mismatched operators.
pub fn find_one_and_update(
    docs: &mut [Document],
    filter: &BsonDocument,
    update: &BsonDocument,
    ret: ReturnDocument,
) -> Result<Option<BsonDocument>, DbError> {
    let update = parse_update(update)?;
    let Some(idx) = first_match(docs, filter)? else {
        return Ok(None);
    };
    let before = docs[idx].data.clone();
    update_at(docs, idx, &update)?;
    Ok(Some(match ret {
        ReturnDocument::Before => before,
        ReturnDocument::After => docs[idx].data.clone(),
    }))
}

/// # Errors
/// Returns `DbError::Query` when the replacement contains update operators.
pub fn find_one_and_replace(
    docs: &mut [Document],
    filter: &BsonDocument,
    replacement: &BsonDocument,
    ret: ReturnDocument,
) -> Result<Option<BsonDocument>, DbError> {
    check_replacement(replacement)?;
    let Some(idx) = first_match(docs, filter)? else {
        return Ok(None);
    };
    let before = docs[idx].data.clone();
    docs[idx].replace(replacement.clone());
    Ok(Some(match ret {
        ReturnDocument::Before => before,
        ReturnDocument::After => docs[idx].data.clone(),
    }))
}

fn replace_one(
    docs: &mut [Document],
    filter: &BsonDocument,
    replacement: &BsonDocument,
) -> Result<UpdateReport, DbError> {
    check_replacement(replacement)?;
    let Some(idx) = first_match(docs, filter)? else {
        return Ok(UpdateReport::default());
    };
    let before = docs[idx].data.clone();
    docs[idx].replace(replacement.clone());
    Ok(UpdateReport { matched: 1, modified: u64::from(before != docs[idx].data) })
}

/// # Errors
/// Returns `DbError::Query` when the filter is malformed.
pub fn delete_many(
    docs: &mut Vec<Document>,
    filter: &BsonDocument,
) -> Result<DeleteReport, DbError> {
    let started = Instant::now();
    let filter = parse_filter(filter)?;
    let before = docs.len();
    docs.retain(|d| !eval_filter(&d.data, &filter));
    let deleted = (before - docs.len()) as u64;
    bench("delete_many", started, format_args!("\"deleted\":{deleted}"));
    Ok(DeleteReport { deleted })
}

/// # Errors
/// Returns `DbError::Query` when the filter is malformed.
pub fn delete_one(
    docs: &mut Vec<Document>,
    filter: &BsonDocument,
) -> Result<DeleteReport, DbError> {
    let Some(idx) = first_match(docs, filter)? else {
        return Ok(DeleteReport::default());
    };
    docs.remove(idx);
    Ok(DeleteReport { deleted: 1 })
}

/// Appends `doc`, assigning an `_id` when missing. Returns the id.
///
/// # Errors
/// Returns `DbError::Query` when the `_id` is already taken.
pub fn insert_doc(docs: &mut Vec<Document>, doc: BsonDocument) -> Result<Bson, DbError> {
    let stored = Document::new(doc);
    let id = stored.id().cloned().unwrap_or(Bson::Null);
    if docs.iter().any(|d| d.id() == Some(&id)) {
        return Err(DbError::query(format!("duplicate key _id: {id}")));
    }
    docs.push(stored);
    Ok(id)
}

/// Applies `models` in order, stopping at the first failure.
///
/// Effects of the steps before the failing one are kept, matching an ordered
/// bulk write on the server.
///
/// # Errors
/// Returns the first step's error.
pub fn bulk_write(
    docs: &mut Vec<Document>,
    models: &[WriteModel],
) -> Result<BulkWriteReport, DbError> {
    let started = Instant::now();
    let mut report = BulkWriteReport::default();
    for (step, model) in models.iter().enumerate() {
        let outcome = match model {
            WriteModel::InsertOne { document } => {
                insert_doc(docs, document.clone()).map(|id| report.absorb_insert(id))
            }
            WriteModel::UpdateOne { filter, update } => {
                update_one(docs, filter, update).map(|r| report.absorb_update(&r))
            }
            WriteModel::UpdateMany { filter, update } => {
                update_many(docs, filter, update).map(|r| report.absorb_update(&r))
            }
            WriteModel::ReplaceOne { filter, replacement } => {
                replace_one(docs, filter, replacement).map(|r| report.absorb_update(&r))
            }
            WriteModel::DeleteOne { filter } => {
                delete_one(docs, filter).map(|r| report.absorb_delete(&r))
            }
            WriteModel::DeleteMany { filter } => {
                delete_many(docs, filter).map(|r| report.absorb_delete(&r))
            }
        };
        if let Err(e) = outcome {
            log::warn!(target: "docops::query", "bulk write stopped at step {step}: {e}");
            return Err(e);
        }
    }
    bench(
        "bulk_write",
        started,
        format_args!(
            "\"steps\":{},\"inserted\":{},\"modified\":{}",
            models.len(),
            report.inserted,
            report.modified
        ),
    );
    Ok(report)
}

/// # Errors
/// Returns `DbError::Query` for unsupported or malformed stages.
pub fn aggregate(
    docs: &[Document],
    pipeline: &[BsonDocument],
) -> Result<Vec<BsonDocument>, DbError> {
    let started = Instant::now();
    let stages = parse_pipeline(pipeline)?;
    let out = run_pipeline(docs.iter().map(|d| d.data.clone()).collect(), &stages);
    bench(
        "aggregate",
        started,
        format_args!("\"stages\":{},\"result_count\":{}", stages.len(), out.len()),
    );
    Ok(out)
}
