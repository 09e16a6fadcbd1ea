mod command;
mod runner;
mod util;

pub use command::Command;
pub use runner::{RunReport, list_operations, run};
pub use util::{parse_filter_arg, parse_projection_arg, parse_sort_arg};
