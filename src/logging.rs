use crate::config::Config;
use std::fs::{self, OpenOptions};
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
///
/// The returned guard must live until exit or buffered lines are lost.
pub fn init(config: &Config) -> Option<WorkerGuard> {
    if !config.log_enabled {
        return None;
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level_directive(&config.log_level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (writer, guard) = open_writer(config.log_file.trim());

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_level(true)
        .with_target(true)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .compact()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
    Some(guard)
}

fn level_directive(level: &str) -> &str {
    match level.trim() {
        "" => "info",
        other => other,
    }
}

/// Appends to `path`, falling back to stderr when it is empty or cannot be opened.
fn open_writer(path: &str) -> (NonBlocking, WorkerGuard) {
    if path.is_empty() {
        return tracing_appender::non_blocking(std::io::stderr());
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = fs::create_dir_all(parent);
        }
    }
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => tracing_appender::non_blocking(file),
        Err(err) => {
            eprintln!("cannot open log file {path}: {err}; logging to stderr");
            tracing_appender::non_blocking(std::io::stderr())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_level_defaults_to_info() {
        assert_eq!(level_directive("  "), "info");
        assert_eq!(level_directive(" debug "), "debug");
        assert_eq!(level_directive("mission_plan=trace"), "mission_plan=trace");
    }

    #[test]
    fn disabled_logging_installs_nothing() {
        let mut config = Config::defaults(std::path::PathBuf::new());
        config.log_enabled = false;
        assert!(init(&config).is_none());
    }
}
