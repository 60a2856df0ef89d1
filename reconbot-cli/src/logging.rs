use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing::{info, warn, Level};
use tracing_appender::rolling;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

pub const LOG_FILE: &str = "reconbot.log";
const RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Logs to stderr and to a daily file in `log_dir`, after deleting files
/// past the retention period.
pub fn init_logging(level: &str, log_dir: &Path) -> Result<()> {
    let level = parse_level(level);
    fs::create_dir_all(log_dir)
        .with_context(|| format!("cannot create log folder {}", log_dir.display()))?;

    let file_appender = rolling::daily(log_dir, LOG_FILE);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(EnvFilter::from_default_env().add_directive(level.into())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(EnvFilter::from_default_env().add_directive(level.into())),
        )
        .try_init()
        .context("cannot install the log subscriber")?;

    let cutoff = SystemTime::now()
        .checked_sub(RETENTION)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let removed = remove_logs_older_than(log_dir, cutoff);
    if removed > 0 {
        info!("deleted {removed} expired log file(s)");
    }
    Ok(())
}

/// Deletes this program's log files last written before `cutoff`.
pub fn remove_logs_older_than(log_dir: &Path, cutoff: SystemTime) -> usize {
    let Ok(entries) = fs::read_dir(log_dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_ours = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(LOG_FILE))
            .unwrap_or(false);
        if !is_ours {
            continue;
        }
        let expired = entry
            .metadata()
            .and_then(|m| m.modified())
            .map(|modified| modified < cutoff)
            .unwrap_or(false);
        if !expired {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("cannot delete {}: {e}", path.display()),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_expired_log_files_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("reconbot.log.2024-01-01"), "old").unwrap();
        fs::write(dir.path().join("keep.txt"), "not ours").unwrap();

        let yesterday = SystemTime::now() - Duration::from_secs(24 * 60 * 60);
        assert_eq!(remove_logs_older_than(dir.path(), yesterday), 0);

        let later = SystemTime::now() + Duration::from_secs(60 * 60);
        assert_eq!(remove_logs_older_than(dir.path(), later), 1);
        assert!(dir.path().join("keep.txt").exists());
    }

    #[test]
    fn unknown_levels_fall_back_to_info() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }
}
