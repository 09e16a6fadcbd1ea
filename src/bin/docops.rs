use clap::{Parser, Subcommand};
use docops::cli::{self as prog_cli, Command};
use docops::config::{self, ConfigLayer};
use docops::{Database, logger};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "docops",
    version,
    about = "Catalog of document-database operations over users, articles and students",
    long_about = None
)]
struct Cli {
    #[arg(long, global = true, help = "Path to a config file (TOML)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Connection URI: mongodb://, mongodb+srv:// or memory://")]
    uri: Option<String>,
    #[arg(long, global = true, help = "Database name")]
    database: Option<String>,
    #[arg(long, global = true, help = "Directory for rolling log files; stderr only when omitted")]
    log_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "error|warn|info|debug|trace")]
    log_level: Option<String>,
    #[arg(long, global = true, help = "Server selection and connect timeout in seconds")]
    connect_timeout: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "List operations with their aliases")]
    List,
    #[command(about = "Run operations by name or alias (e.g. task1 add-tag-b)")]
    Run {
        #[arg(help = "Operation names or aliases, run in the given order")]
        names: Vec<String>,
        #[arg(long, conflicts_with = "names", help = "Run every operation in registry order")]
        all: bool,
        #[arg(long, help = "Stop at the first failing operation and exit non-zero")]
        fail_fast: bool,
    },
    #[command(
        about = "Replace users and/or students with fixture data (both when neither flag is set)"
    )]
    Seed {
        #[arg(long)]
        users: bool,
        #[arg(long)]
        students: bool,
        #[arg(long, default_value_t = 0, help = "Generated users appended to the fixtures")]
        extra_users: usize,
    },
    #[command(about = "Print matching documents as JSON lines")]
    Find {
        collection: String,
        #[arg(help = "Filter as a JSON object")]
        filter: Option<String>,
        #[arg(long, help = "Sort keys, e.g. -age,firstName")]
        sort: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long, help = "Projection, e.g. firstName,age,-_id")]
        project: Option<String>,
    },
    #[command(about = "Count matching documents")]
    Count {
        collection: String,
        #[arg(help = "Filter as a JSON object")]
        filter: Option<String>,
    },
    #[command(about = "Check that the store answers")]
    Ping,
}

impl From<Commands> for Command {
    fn from(c: Commands) -> Self {
        match c {
            Commands::List => Self::List,
            Commands::Run { names, all, fail_fast } => Self::Run { names, all, fail_fast },
            Commands::Seed { users, students, extra_users } => {
                Self::Seed { users, students, extra_users }
            }
            Commands::Find { collection, filter, sort, limit, project } => {
                Self::Find { collection, filter_json: filter, sort, limit, project }
            }
            Commands::Count { collection, filter } => {
                Self::Count { collection, filter_json: filter }
            }
            Commands::Ping => Self::Ping,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let overrides = ConfigLayer {
        uri: cli.uri,
        database: cli.database,
        log_dir: cli.log_dir,
        log_level: cli.log_level,
        connect_timeout_secs: cli.connect_timeout,
    };
    let cfg = match config::load(overrides, cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };
    if let Err(e) = logger::configure_logging(cfg.log_dir.as_deref(), &cfg.log_level) {
        eprintln!("warning: logging not configured: {e}");
    }
    for w in &cfg.warnings {
        log::warn!("{w}");
    }

    let cmd = Command::from(cli.command);
    let mut stdout = std::io::stdout().lock();
    if !cmd.needs_store() {
        return match prog_cli::list_operations(&mut stdout) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let db = match Database::connect(&cfg.store_config()).await {
        Ok(db) => db,
        Err(e) => {
            log::error!("connect: {e}");
            return ExitCode::FAILURE;
        }
    };
    let result = prog_cli::run(&db, cmd, &mut stdout).await;
    if let Err(e) = db.close().await {
        log::warn!("close: {e}");
    }
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
