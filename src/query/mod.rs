// Submodules for separation of concerns
mod eval;
mod exec;
mod expr;
mod parse;
mod pipeline;
mod project;
mod types;
mod update;

pub use eval::{bson_equal, compare_bson, compare_docs, eval_filter, get_path, resolve_path};
pub use exec::{
    aggregate, bulk_write, count_docs, delete_many, delete_one, find_docs, find_one_and_replace,
    find_one_and_update, insert_doc, update_many, update_one,
};
pub use expr::Expr;
pub use parse::{parse_document_json, parse_filter, parse_sort, sort_from_spec};
pub use pipeline::{AccOp, Accumulator, Stage, is_sorted_by, parse_pipeline, run_pipeline};
pub use project::Projection;
pub use types::{
    BulkWriteReport, CmpOp, DeleteReport, Filter, FindOptions, Order, PullCond, ReturnDocument,
    SortSpec, UpdateDoc, UpdateOp, UpdateReport, WriteModel,
};
pub use update::{apply_update, check_replacement, parse_update};
