use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::Config;
use std::path::{Path, PathBuf};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. The returned guard must be kept
/// alive for file output to be flushed.
pub fn setup_logging(config: &Config) -> Option<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level()));

    match config.log_file_path() {
        None => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .finish();
            install(subscriber);
            None
        }
        Some(path) => {
            let (file_writer, guard) = create_file_logger(Path::new(path));
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(env_filter)
                .with_ansi(false)
                .with_writer(file_writer)
                .finish();
            install(subscriber);
            Some(guard)
        }
    }
}

fn install<S>(subscriber: S)
where
    S: tracing::Subscriber + Send + Sync + 'static,
{
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global tracing subscriber: {}", e);
    }
}

fn create_file_logger(log_path: &Path) -> (NonBlocking, WorkerGuard) {
    let log_dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(default_log_dir);

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create log directory {:?}: {}", log_dir, e);
    }

    let log_file_name = log_path
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("kbadmin.log"));

    let file_appender = RollingFileAppender::new(
        tracing_appender::rolling::Rotation::NEVER,
        log_dir,
        log_file_name,
    );
    tracing_appender::non_blocking(file_appender)
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kbadmin")
        .join("logs")
}
