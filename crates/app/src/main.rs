use std::fmt;

use exam_core::model::{StoredRecoveryData, TestKind};
use exam_core::timer::format_remaining;
use services::{Clock, RecoveryStore};
use storage::repository::Storage;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidKind { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidKind { raw } => {
                write!(f, "invalid --kind value: {raw} (expected speaking or writing)")
            }
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- status  [--db <sqlite_url>] [--kind <speaking|writing>]");
    eprintln!("  cargo run -p app -- discard [--db <sqlite_url>] [--kind <speaking|writing>]");
    eprintln!();
    eprintln!("Without --kind, every test kind is shown (status) or cleared (discard).");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://exam.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_DB_URL, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Status,
    Discard,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "status" => Some(Self::Status),
            "discard" => Some(Self::Discard),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    db_url: String,
    kinds: Vec<TestKind>,
}

impl Args {
    fn parse(
        args: &mut impl Iterator<Item = String>,
        env_db_url: Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut db_url =
            env_db_url.map_or_else(|| "sqlite://exam.sqlite3".into(), normalize_sqlite_url);
        let mut kinds = vec![TestKind::Speaking, TestKind::Writing];

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--kind" => {
                    let value = require_value(args, "--kind")?;
                    let kind = value
                        .parse::<TestKind>()
                        .map_err(|_| ArgsError::InvalidKind { raw: value.clone() })?;
                    kinds = vec![kind];
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, kinds })
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
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn describe(kind: TestKind, key: &str, stored: Option<&StoredRecoveryData>) -> String {
    let Some(stored) = stored else {
        return format!("{kind}: no recovery checkpoint ({key})");
    };
    let checkpoint = &stored.checkpoint;
    let attempt = checkpoint
        .test_attempt_id
        .as_ref()
        .map_or_else(|| "-".to_string(), ToString::to_string);
    let remaining = checkpoint
        .remaining_ms
        .map_or_else(|| "-".to_string(), format_remaining);
    format!(
        "{kind}: test {}, question index {} (part {}), attempt {attempt}, {remaining} left, saved {} ({key})",
        checkpoint.test_id,
        checkpoint.current_question_index,
        checkpoint.current_part_index,
        stored.last_saved_at.to_rfc3339(),
    )
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Without a subcommand, show status.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Status,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Status,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter, std::env::var("EXAM_DB_URL").ok()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    tracing::debug!(db_url = %parsed.db_url, "recovery storage ready");

    for kind in parsed.kinds {
        let store = RecoveryStore::new(Clock::default_clock(), storage.recovery.clone(), kind);
        match cmd {
            Command::Status => {
                let stored = store.load().await;
                println!("{}", describe(kind, store.key(), stored.as_ref()));
            }
            Command::Discard => {
                store.clear().await;
                tracing::info!(%kind, key = store.key(), "recovery checkpoint discarded");
                println!("{kind}: discarded ({})", store.key());
            }
        }
    }

    Ok(())
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

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{AttemptId, RecoveryCheckpoint, TestId};
    use exam_core::time::fixed_now;

    fn parse(args: &[&str], env: Option<&str>) -> Result<Args, ArgsError> {
        let mut iter = args.iter().map(|arg| (*arg).to_string());
        Args::parse(&mut iter, env.map(str::to_string))
    }

    #[test]
    fn defaults_cover_every_kind() {
        let args = parse(&[], None).unwrap();
        assert_eq!(args.db_url, "sqlite://exam.sqlite3");
        assert_eq!(args.kinds, vec![TestKind::Speaking, TestKind::Writing]);
    }

    #[test]
    fn flags_override_environment() {
        let args = parse(
            &["--db", "sqlite:///tmp/exam.db", "--kind", "Writing"],
            Some("sqlite:///var/other.db"),
        )
        .unwrap();
        assert_eq!(args.db_url, "sqlite:///tmp/exam.db");
        assert_eq!(args.kinds, vec![TestKind::Writing]);
    }

    #[test]
    fn rejects_unknown_kind_and_missing_values() {
        assert!(matches!(
            parse(&["--kind", "listening"], None),
            Err(ArgsError::InvalidKind { .. })
        ));
        assert!(matches!(
            parse(&["--db"], None),
            Err(ArgsError::MissingValue { flag: "--db" })
        ));
        assert!(matches!(
            parse(&["--verbose"], None),
            Err(ArgsError::UnknownArg(_))
        ));
    }

    #[test]
    fn describes_stored_checkpoint() {
        let stored = StoredRecoveryData::stamp(
            RecoveryCheckpoint {
                test_id: TestId::new("toeic-speaking-01"),
                started_at: fixed_now(),
                current_question_index: 9,
                current_part_index: 1,
                test_attempt_id: Some(AttemptId::new("att-7")),
                remaining_ms: Some(754_000),
            },
            fixed_now(),
        );
        let line = describe(TestKind::Speaking, "exam_recovery:speaking", Some(&stored));
        assert!(line.starts_with("speaking: test toeic-speaking-01, question index 9 (part 1), attempt att-7, 12:34 left"));

        let empty = describe(TestKind::Writing, "exam_recovery:writing", None);
        assert_eq!(empty, "writing: no recovery checkpoint (exam_recovery:writing)");
    }
}
