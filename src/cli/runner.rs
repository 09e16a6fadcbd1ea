use crate::catalog::{self, OPERATIONS, OperationId};
use crate::database::Database;
use crate::errors::DbError;
use crate::query::FindOptions;
use crate::seed;
use bson::Bson;
use std::io::Write;

use super::command::Command;
use super::util::{parse_filter_arg, parse_projection_arg, parse_sort_arg};

/// Tally of a `run` command. Failures without `--fail-fast` end up here
/// instead of in an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub succeeded: usize,
    pub failed: Vec<String>,
}

/// Writes the registry as one JSON object per line.
pub fn list_operations(out: &mut impl Write) -> std::io::Result<()> {
    for o in &OPERATIONS {
        let line = serde_json::json!({
            "name": o.name,
            "alias": o.alias,
            "collection": o.collection,
            "summary": o.summary,
        });
        writeln!(out, "{line}")?;
    }
    Ok(())
}

fn selected(names: &[String], all: bool) -> Result<Vec<OperationId>, DbError> {
    if all {
        return Ok(OPERATIONS.iter().map(|o| o.id).collect());
    }
    if names.is_empty() {
        return Err(DbError::UnknownOperation(
            "no operation given (use --all to run every one)".into(),
        ));
    }
    names.iter().map(|n| catalog::resolve(n)).collect()
}

/// Executes `cmd`, writing results to `out` as JSON lines.
///
/// # Errors
/// Store and output failures. For `run`, operation failures are only returned
/// with `fail_fast`; otherwise they are logged and counted in the report.
pub async fn run(
    db: &Database,
    cmd: Command,
    out: &mut impl Write,
) -> Result<RunReport, Box<dyn std::error::Error>> {
    let mut report = RunReport::default();
    match cmd {
        Command::List => list_operations(out)?,
        Command::Run { names, all, fail_fast } => {
            // Unknown names abort before anything touches the store
            for id in selected(&names, all)? {
                match catalog::run_logged(db, id).await {
                    Ok(outcome) => {
                        let mut line = serde_json::to_value(&outcome)?;
                        if let Some(obj) = line.as_object_mut() {
                            obj.insert("operation".into(), id.name().into());
                        }
                        writeln!(out, "{line}")?;
                        report.succeeded += 1;
                    }
                    Err(e) if fail_fast => return Err(e.into()),
                    Err(_) => report.failed.push(id.name().to_string()),
                }
            }
            if !report.failed.is_empty() {
                log::warn!(
                    "{} operation(s) failed: {}",
                    report.failed.len(),
                    report.failed.join(", ")
                );
            }
        }
        Command::Seed { users, students, extra_users } => {
            let both = !users && !students;
            if users || both {
                let n = seed::seed_users(db, extra_users).await?;
                writeln!(out, "{}", serde_json::json!({ "seeded": "users", "inserted": n }))?;
            }
            if students || both {
                let n = seed::seed_students(db).await?;
                writeln!(out, "{}", serde_json::json!({ "seeded": "students", "inserted": n }))?;
            }
        }
        Command::Find { collection, filter_json, sort, limit, project } => {
            let filter = parse_filter_arg(filter_json.as_deref())?;
            let opts = FindOptions {
                projection: parse_projection_arg(project.as_deref()),
                sort: parse_sort_arg(sort.as_deref()),
                limit,
                skip: None,
            };
            for doc in db.collection(&collection).find(filter, opts).await? {
                writeln!(out, "{}", Bson::Document(doc).into_relaxed_extjson())?;
            }
        }
        Command::Count { collection, filter_json } => {
            let filter = parse_filter_arg(filter_json.as_deref())?;
            let n = db.collection(&collection).count(filter).await?;
            writeln!(out, "{}", serde_json::json!({ "collection": collection, "count": n }))?;
        }
        Command::Ping => {
            db.ping().await?;
            writeln!(out, "{}", serde_json::json!({ "ok": 1, "backend": db.backend().as_str() }))?;
        }
    }
    Ok(report)
}
