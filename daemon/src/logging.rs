use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::DaemonConfig;
use crate::error::{DaemonError, Result};

/// Overrides `log_level` from the configuration when set.
const LOG_FILTER_ENV: &str = "GRADEBOOK_LOG";

/// Installs the JSON subscriber. Records from the `log` facade used by the
/// core crate are bridged into it.
pub fn init_logging(config: &DaemonConfig) -> Result<()> {
    let filter = build_env_filter(config)?;
    let json = fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(false)
        .with_span_list(false)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(make_writer(config)?);

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .try_init()
        .map_err(|err| DaemonError::Logger(err.to_string()))
}

fn make_writer(config: &DaemonConfig) -> Result<BoxMakeWriter> {
    match config.log_file() {
        Some(path) => {
            let file = LogFile::open(path)?;
            Ok(BoxMakeWriter::new(move || file.clone()))
        }
        None => Ok(BoxMakeWriter::new(io::stdout)),
    }
}

/// Append-only log file shared by every writer the subscriber hands out.
#[derive(Clone)]
struct LogFile {
    file: Arc<Mutex<File>>,
}

impl LogFile {
    fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }

    fn with_file<T>(&self, op: impl FnOnce(&mut File) -> io::Result<T>) -> io::Result<T> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
        op(&mut file)
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_file(|file| file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_file(File::flush)
    }
}

fn build_env_filter(config: &DaemonConfig) -> Result<EnvFilter> {
    let from_env = std::env::var(LOG_FILTER_ENV).ok().filter(|v| !v.trim().is_empty());
    let directive = from_env
        .as_deref()
        .or(config.log_level.as_deref())
        .unwrap_or("info");
    EnvFilter::try_new(directive)
        .map_err(|err| DaemonError::Logger(format!("invalid log filter '{directive}': {err}")))
}

/// Error event tagged `severity = "FATAL"`, for failures that end the process.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)+) => {
        tracing::event!(tracing::Level::ERROR, severity = "FATAL", $($arg)+)
    };
}
