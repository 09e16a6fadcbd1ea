use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use once_cell::sync::OnceCell;
use std::path::Path;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_RETENTION: u32 = 7;
const QUERY_TARGET: &str = "docops::query";

static HANDLE: OnceCell<log4rs::Handle> = OnceCell::new();

/// Maps `error|warn|info|debug|trace` to a filter; anything else is `Info`.
#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(
    dir: &Path,
    stem: &str,
    keep: u32,
) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", dir.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(dir.join(format!("{stem}.log")), Box::new(policy))?)
}

/// Builds the logging config: stderr always, plus rolling `docops.log` and
/// `query.log` files when `dir` is given.
///
/// # Errors
/// Returns an error if the log directory cannot be created or an appender fails to build.
pub fn build_config(
    dir: Option<&Path>,
    level: &str,
    retention: Option<u32>,
) -> Result<Config, Box<dyn std::error::Error>> {
    let lvl = parse_level(level);
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();
    let mut builder =
        Config::builder().appender(Appender::builder().build("stderr", Box::new(stderr)));
    let mut root = Root::builder().appender("stderr");

    if let Some(dir) = dir {
        std::fs::create_dir_all(dir)?;
        let keep = retention.unwrap_or(DEFAULT_RETENTION);
        builder = builder
            .appender(Appender::builder().build("app", Box::new(rolling(dir, "docops", keep)?)))
            .appender(Appender::builder().build("query", Box::new(rolling(dir, "query", keep)?)))
            .logger(Logger::builder().appender("query").build(QUERY_TARGET, lvl));
        root = root.appender("app");
    }
    Ok(builder.build(root.build(lvl))?)
}

/// Configures logging for the process. A second call swaps in the new config.
///
/// # Errors
/// See [`build_config`]; also fails if another logger owns the `log` facade.
pub fn configure_logging(
    dir: Option<&Path>,
    level: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(dir, level, None)?;
    if let Some(handle) = HANDLE.get() {
        handle.set_config(config);
        return Ok(());
    }
    let handle = log4rs::init_config(config)?;
    let _ = HANDLE.set(handle);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing_defaults_to_info() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level("warn"), LevelFilter::Warn);
        assert_eq!(parse_level("loud"), LevelFilter::Info);
    }

    #[test]
    fn file_appenders_create_their_directory() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        build_config(Some(&logs), "debug", Some(2)).unwrap();
        assert!(logs.is_dir());
    }
}
