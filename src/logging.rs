use std::path::PathBuf;

use anyhow::Context;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_log::LogTracer;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    /// Emit one JSON object per event instead of text lines
    pub json_format: bool,
    /// Directory for daily-rotated log files; stdout only when unset
    pub log_dir: Option<String>,
    pub colorize: bool,
    pub log_file_name: String,
    /// Targets the level applies to when `RUST_LOG` is not set
    pub log_targets: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            log_dir: None,
            colorize: true,
            log_file_name: "sgl-http-balancer".to_string(),
            log_targets: vec!["sgl_http_balancer".to_string()],
        }
    }
}

impl LoggingConfig {
    fn filter_directives(&self) -> String {
        let level = self.level.to_string().to_lowercase();
        self.log_targets
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Keeps the non-blocking file writer alive; hold it until shutdown
#[allow(dead_code)]
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// A subscriber that is already installed is left in place, so calling this
/// more than once (e.g. from tests) is harmless.
pub fn init_logging(config: LoggingConfig) -> anyhow::Result<LogGuard> {
    let _ = LogTracer::init();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_ansi(config.colorize)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()));
    let stdout_layer = if config.json_format {
        stdout_layer.json().flatten_event(true).boxed()
    } else {
        stdout_layer.boxed()
    };
    let mut layers = vec![stdout_layer];

    let mut file_guard = None;
    if let Some(log_dir) = &config.log_dir {
        let log_dir = PathBuf::from(log_dir);
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

        let file_appender =
            RollingFileAppender::new(Rotation::DAILY, log_dir, config.log_file_name.clone());
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        file_guard = Some(guard);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()))
            .with_writer(non_blocking);
        let file_layer = if config.json_format {
            file_layer.json().flatten_event(true).boxed()
        } else {
            file_layer.boxed()
        };
        layers.push(file_layer);
    }

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init();

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_cover_every_target() {
        let config = LoggingConfig {
            level: Level::DEBUG,
            log_targets: vec!["sgl_http_balancer".to_string(), "reqwest".to_string()],
            ..Default::default()
        };
        assert_eq!(
            config.filter_directives(),
            "sgl_http_balancer=debug,reqwest=debug"
        );
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let _first = init_logging(LoggingConfig::default()).unwrap();
        let _second = init_logging(LoggingConfig {
            json_format: true,
            ..Default::default()
        })
        .unwrap();
        tracing::info!("logging initialised twice");
    }
}
