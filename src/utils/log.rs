use std::fs::File;
use std::io::stderr;
use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::Local;
use miette::{Context, IntoDiagnostic};
use parking_lot::Mutex;
use tracing::level_filters::LevelFilter;
use tracing::{Level, debug, warn};
use tracing_appender::non_blocking;
use tracing_subscriber::reload;
use tracing_subscriber::{
    EnvFilter, Layer, fmt, layer::SubscriberExt, reload::Handle, util::SubscriberInitExt,
};

use crate::board::zobrist::ZOBRIST;

pub trait LogHandle: Send + Sync {
    fn set_filter(&self, new_filter: EnvFilter) -> miette::Result<()>;
}

impl<S> LogHandle for Handle<EnvFilter, S>
where
    S: tracing::Subscriber + Send + Sync + 'static,
{
    fn set_filter(&self, new_filter: EnvFilter) -> miette::Result<()> {
        self.modify(|current| *current = new_filter)
            .into_diagnostic()
    }
}

pub struct LogHandles {
    console_handle: Mutex<Box<dyn LogHandle>>,
    file_handle: Mutex<Box<dyn LogHandle>>,
}

pub fn log_dir() -> PathBuf {
    std::env::temp_dir().join("tandem_logs")
}

/// Timestamped log file under [`log_dir`]. `None` if it cannot be created,
/// file logging is then a no-op.
fn open_log_file() -> Option<(File, PathBuf)> {
    let dir = log_dir();
    std::fs::create_dir_all(&dir).ok()?;
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let path = dir.join(format!("tandem_{timestamp}.log"));
    File::create(&path).ok().map(|file| (file, path))
}

static LOG_HANDLES: LazyLock<LogHandles> = LazyLock::new(|| {
    #[cfg(feature = "dev-tools")]
    color_backtrace::install();

    // Console Layer with its own reloadable filter
    let console_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    let (console_filter, console_handle) = reload::Layer::new(console_filter);
    let console_layer = fmt::layer()
        .without_time()
        .with_writer(stderr)
        .with_filter(console_filter);

    // File Layer with its own reloadable filter (initially off)
    let file_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::OFF.into())
        .from_env_lossy();
    let (file_filter, file_handle) = reload::Layer::new(file_filter);

    let log_file = open_log_file();
    let file_layer = log_file.as_ref().and_then(|(file, _)| {
        let file = file.try_clone().ok()?;
        let (non_blocking_writer, guard) = non_blocking(file);
        std::mem::forget(guard); // Keep the worker alive for the whole process
        Some(
            fmt::layer()
                .with_writer(non_blocking_writer)
                .with_ansi(false) // No colors in file
                .with_filter(file_filter),
        )
    });

    let installed = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init();

    match (&installed, &log_file) {
        (Err(e), _) => warn!("Global subscriber already set: {e}"),
        (Ok(()), Some((_, path))) => debug!("File logs go to {}", path.display()),
        (Ok(()), None) => warn!("Could not create a log file in {}", log_dir().display()),
    }

    LogHandles {
        console_handle: Mutex::new(Box::new(console_handle)),
        file_handle: Mutex::new(Box::new(file_handle)),
    }
});

pub fn set_log_level(level: Level) -> miette::Result<()> {
    let new_filter = EnvFilter::new(level.to_string());

    LOG_HANDLES
        .console_handle
        .lock()
        .set_filter(new_filter)
        .with_context(|| format!("Failed to modify log filter to level: {level}"))
}

pub fn toggle_file_logging(enable: bool) -> miette::Result<()> {
    let new_filter = if enable {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("off")
    };

    LOG_HANDLES
        .file_handle
        .lock()
        .set_filter(new_filter)
        .context("Failed to modify log filter")
}

/// Initialize tracing, backtraces and the Zobrist keys. Safe to call more than once.
pub fn init() {
    LazyLock::force(&LOG_HANDLES);
    LazyLock::force(&ZOBRIST);
}
