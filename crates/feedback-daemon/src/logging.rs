//! Tracing subscriber setup.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LOG_FORMAT` | `text` | `json` or `text` |
//! | `LOG_FILE` | unset | Log to this file (rotated daily) instead of stdout |
//! | `LOG_ANSI` | auto | `true`/`1` or `false`/`0` |
//! | `RUST_LOG` | [`DEFAULT_FILTER`] | Standard env filter |

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

pub const DEFAULT_FILTER: &str = "feedback_daemon=debug,feedback_jobs=debug,tower_http=info";

const DEFAULT_FILE_NAME: &str = "feedback-daemon.log";

/// Output settings for the daemon's log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub json: bool,
    pub file: Option<PathBuf>,
    /// Explicit ANSI override; unset means colors on stdout only.
    pub ansi: Option<bool>,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let json = lookup("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json"));
        let file = lookup("LOG_FILE")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let ansi = lookup("LOG_ANSI").map(|v| v == "true" || v == "1");
        Self { json, file, ansi }
    }

    pub fn ansi_enabled(&self) -> bool {
        self.ansi.unwrap_or(self.file.is_none())
    }

    pub fn format_name(&self) -> &'static str {
        if self.json {
            "json"
        } else {
            "text"
        }
    }
}

/// Install the global subscriber. The returned guard flushes the file
/// writer on drop and must live as long as the process logs.
pub fn init_tracing(settings: &LogSettings) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (writer, guard) = match &settings.file {
        Some(path) => {
            let (dir, name) = split_log_path(path);
            let appender = tracing_appender::rolling::daily(dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if settings.json {
        registry.with(fmt::layer().json().with_writer(writer)).init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(settings.ansi_enabled())
                    .with_writer(writer),
            )
            .init();
    }
    guard
}

/// Directory and file name for the rolling appender.
fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let name = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(DEFAULT_FILE_NAME)
        .to_string();
    (dir, name)
}
