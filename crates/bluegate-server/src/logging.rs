//! Logging initialization.
//!
//! - **Production**: JSON logs to a daily rolling file plus compact stdout
//! - **Development**: pretty stdout with span open/close events
//!
//! The filter comes from `RUST_LOG` when set, else `BLUEGATE_LOG_LEVEL`, else
//! the configured level.

use std::path::PathBuf;
use std::sync::OnceLock;

use bluegate_core::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable overriding the configured log level.
pub const LOG_LEVEL_ENV: &str = "BLUEGATE_LOG_LEVEL";

// Dropping a guard stops its writer thread; keep them for the whole run.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static STDOUT_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns an error if the filter directive cannot be parsed.
pub fn init(settings: &LoggingConfig) -> anyhow::Result<()> {
    let level = filter_directive(std::env::var(LOG_LEVEL_ENV).ok(), &settings.level);
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&level))?;

    if settings.production {
        init_production(env_filter);
    } else {
        init_development(env_filter);
    }

    Ok(())
}

fn filter_directive(from_env: Option<String>, configured: &str) -> String {
    from_env
        .filter(|level| !level.trim().is_empty())
        .unwrap_or_else(|| configured.to_string())
}

fn init_production(env_filter: EnvFilter) {
    let log_dir = log_directory();
    if !log_dir.exists() {
        // Best effort; the appender reports its own failures on write.
        std::fs::create_dir_all(&log_dir).ok();
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "bluegate");
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
    let (non_blocking_stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking_file)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    // No ANSI colors for journald
    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(non_blocking_stdout)
        .with_target(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    let _ = FILE_GUARD.set(file_guard);
    let _ = STDOUT_GUARD.set(stdout_guard);
}

fn init_development(env_filter: EnvFilter) {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .pretty()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .init();
}

/// Where production log files go.
fn log_directory() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/log/bluegate")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "bluegate")
            .map_or_else(|| PathBuf::from("./logs"), |dirs| dirs.data_dir().join("logs"))
    }
}
