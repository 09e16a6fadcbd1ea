pub mod catalog;
pub mod cli;
pub mod collection;
pub mod config;
pub mod database;
pub mod document;
pub mod errors;
pub mod logger;
pub mod model;
pub mod query;
pub mod seed;
pub mod store;

pub use collection::Collection;
pub use database::Database;
pub use errors::DbError;
