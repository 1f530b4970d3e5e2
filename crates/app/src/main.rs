use std::fmt;
use std::path::PathBuf;

use services::DEFAULT_MAX_ITEMS;
use storage::repository::Storage;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

mod commands;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArg { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArg { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number<T: std::str::FromStr>(flag: &'static str, raw: String) -> Result<T, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  tbs seed     --area <key> --file <items.json> [--db <sqlite_url>]");
    eprintln!("  tbs practice --area <key> [--answers <answers.json>] [--max-items <n>] [--db <sqlite_url>]");
    eprintln!("  tbs history  [--limit <n>] [--db <sqlite_url>]");
    eprintln!("  tbs areas    [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://tbs.sqlite3");
    eprintln!("  --max-items {DEFAULT_MAX_ITEMS}");
    eprintln!("  --limit 10");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  TBS_DB_URL, TBS_AREA, TBS_MAX_ITEMS, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Seed {
        area: String,
        file: PathBuf,
    },
    Practice {
        area: String,
        answers: Option<PathBuf>,
        max_items: usize,
    },
    History {
        limit: u32,
    },
    Areas,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Args {
    db_url: String,
    command: Command,
}

/// Values read from the environment before flags are applied.
#[derive(Debug, Clone, Default)]
struct EnvDefaults {
    db_url: Option<String>,
    area: Option<String>,
    max_items: Option<String>,
}

impl EnvDefaults {
    fn from_env() -> Self {
        Self {
            db_url: std::env::var("TBS_DB_URL").ok(),
            area: std::env::var("TBS_AREA").ok(),
            max_items: std::env::var("TBS_MAX_ITEMS").ok(),
        }
    }
}

impl Args {
    fn parse(
        subcommand: &str,
        args: &mut impl Iterator<Item = String>,
        env: EnvDefaults,
    ) -> Result<Self, ArgsError> {
        let mut db_url = env
            .db_url
            .map_or_else(|| "sqlite://tbs.sqlite3".into(), normalize_sqlite_url);
        let mut area = env.area.filter(|value| !value.trim().is_empty());
        let mut max_items = match env.max_items {
            Some(raw) => parse_number("TBS_MAX_ITEMS", raw)?,
            None => DEFAULT_MAX_ITEMS,
        };
        let mut file = None;
        let mut answers = None;
        let mut limit = 10_u32;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--area" => area = Some(require_value(args, "--area")?),
                "--file" => file = Some(PathBuf::from(require_value(args, "--file")?)),
                "--answers" => answers = Some(PathBuf::from(require_value(args, "--answers")?)),
                "--max-items" => {
                    max_items = parse_number("--max-items", require_value(args, "--max-items")?)?;
                }
                "--limit" => limit = parse_number("--limit", require_value(args, "--limit")?)?,
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let command = match subcommand {
            "seed" => Command::Seed {
                area: area.ok_or(ArgsError::MissingArg { flag: "--area" })?,
                file: file.ok_or(ArgsError::MissingArg { flag: "--file" })?,
            },
            "practice" => Command::Practice {
                area: area.ok_or(ArgsError::MissingArg { flag: "--area" })?,
                answers,
                max_items,
            },
            "history" => Command::History { limit },
            "areas" => Command::Areas,
            other => return Err(ArgsError::UnknownCommand(other.to_owned())),
        };

        Ok(Self { db_url, command })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let subcommand = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => first,
    };

    let parsed = Args::parse(&subcommand, &mut argv, EnvDefaults::from_env()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite here so core/services stay storage-agnostic.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;

    match parsed.command {
        Command::Seed { area, file } => commands::seed(&storage, &area, &file).await,
        Command::Practice {
            area,
            answers,
            max_items,
        } => commands::practice(&storage, &area, answers.as_deref(), max_items).await,
        Command::History { limit } => commands::history(&storage, limit).await,
        Command::Areas => commands::areas(&storage).await,
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // Binary glue: report once and exit.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
