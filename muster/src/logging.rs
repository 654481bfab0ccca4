// Logging for Muster
//
// A single logging entry point for pool owners and worker threads, built on the
// `tracing` ecosystem.
//
// # Usage Examples
//
// ## Basic Initialization
//
// ```rust
// use muster::logging;
//
// // INFO level, console output
// logging::init_default();
//
// // Or with custom settings
// let config = logging::LogConfig {
//     level: tracing::Level::DEBUG,
//     json_format: false,
//     ..Default::default()
// };
// logging::init(config);
// ```
//
// ## Development / Production
//
// ```rust
// use muster::logging;
//
// // DEBUG level, colored output, file/line info, handshake traces
// logging::init_development();
//
// // INFO level, JSON lines, no file/line info
// logging::init_production();
// ```
//
// ## Worker Threads
//
// Worker threads are plain OS threads. `ThreadWorkerSpawner` captures the
// dispatcher that is current when it spawns and installs it in the worker, so
// worker logs land in the same subscriber as the owner's.

use std::io;
use std::sync::Once;
use tracing::{Level, Subscriber};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Configuration for the logging system
///
/// # Examples
///
/// ```rust
/// use muster::logging::LogConfig;
/// use tracing::Level;
///
/// let custom_config = LogConfig {
///     level: Level::DEBUG,
///     json_format: true,
///     show_file_line: false,
///     show_thread_info: true,
///     show_time: true,
///     target_filters: Some("muster=debug,muster::thread::handshake=trace".to_string()),
/// };
/// assert!(custom_config.json_format);
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id (worker threads are named after their slot)
    pub show_thread_info: bool,
    /// Whether to include timestamps
    pub show_time: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

// Initialization guard to ensure we only initialize once
static INIT: Once = Once::new();

fn build_filter(config: &LogConfig) -> EnvFilter {
    let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());

    if let Some(filters) = &config.target_filters {
        for filter in filters.split(',') {
            if let Ok(directive) = filter.parse() {
                env_filter = env_filter.add_directive(directive);
            }
        }
    }

    env_filter
}

/// Initialize the logging system with the given configuration
///
/// Safe to call multiple times; only the first call takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let env_filter = build_filter(&config);
        let registry = tracing_subscriber::registry().with(env_filter);

        let subscriber: Box<dyn Subscriber + Send + Sync> = match (config.json_format, config.show_time) {
            (true, _) => Box::new(registry.with(fmt::layer().json().flatten_event(true))),
            (false, true) => Box::new(registry.with(
                fmt::layer()
                    .with_ansi(atty::is(atty::Stream::Stdout))
                    .with_file(config.show_file_line)
                    .with_line_number(config.show_file_line)
                    .with_thread_names(config.show_thread_info)
                    .with_thread_ids(config.show_thread_info),
            )),
            (false, false) => Box::new(registry.with(
                fmt::layer()
                    .without_time()
                    .with_ansi(atty::is(atty::Stream::Stdout))
                    .with_file(config.show_file_line)
                    .with_line_number(config.show_file_line)
                    .with_thread_names(config.show_thread_info)
                    .with_thread_ids(config.show_thread_info),
            )),
        };

        set_global_subscriber(subscriber);
    });
}

fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// Open a log file in append mode, creating it if needed.
pub fn file_writer(path: &str) -> io::Result<Box<dyn io::Write + Send + Sync + 'static>> {
    use std::fs::OpenOptions;

    let file = OpenOptions::new().create(true).append(true).open(path)?;

    Ok(Box::new(file))
}

/// Initialize logging with both console and file output
///
/// Console output respects the terminal's color support, file output is always
/// plain text with file/line and thread information.
///
/// # Errors
/// Returns an error if the log file cannot be opened or created.
pub fn init_with_file(config: LogConfig, log_file: &str) -> Result<(), io::Error> {
    // Fail early instead of silently falling back to stderr on every write
    file_writer(log_file)?;

    INIT.call_once(|| {
        let env_filter = build_filter(&config);

        let console_layer = fmt::layer()
            .with_ansi(atty::is(atty::Stream::Stdout))
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_thread_names(config.show_thread_info)
            .with_thread_ids(config.show_thread_info);

        let log_file_path = log_file.to_string();

        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(move || match file_writer(&log_file_path) {
                Ok(writer) => writer,
                Err(_) => Box::new(std::io::stderr()),
            })
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_thread_ids(true);

        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer);

        set_global_subscriber(subscriber);
    });

    Ok(())
}

/// INFO level, human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// Development settings: DEBUG everywhere, TRACE for the handshake machinery.
pub fn init_development() {
    let config = LogConfig {
        level: Level::DEBUG,
        json_format: false,
        show_file_line: true,
        show_thread_info: true,
        show_time: true,
        target_filters: Some("muster=debug,muster::thread::handshake=trace".to_string()),
    };
    init(config);
}

/// Production settings
///
/// - INFO level (overridable through `RUST_LOG`)
/// - JSON lines for log aggregators
/// - No file/line information
pub fn init_production() {
    let config = LogConfig {
        level: Level::INFO,
        json_format: true,
        show_file_line: false,
        show_thread_info: true,
        show_time: true,
        target_filters: None,
    };
    init(config);
}

/// Only warnings and errors, compact output. For tests.
pub fn init_test() {
    let config = LogConfig {
        level: Level::WARN,
        json_format: false,
        show_file_line: true,
        show_thread_info: false,
        show_time: false,
        target_filters: None,
    };
    init(config);
}

/// Create a span for one bootstrap run
///
/// ```rust
/// let span = muster::pool_span!("2f1c", 4);
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! pool_span {
    ($pool_id:expr, $workers:expr) => {
        tracing::info_span!("bootstrap", pool = %$pool_id, workers = $workers)
    };
    ($pool_id:expr, $workers:expr, $($fields:tt)*) => {
        tracing::info_span!("bootstrap", pool = %$pool_id, workers = $workers, $($fields)*)
    };
}

/// Create a span for code running inside a worker thread
#[macro_export]
macro_rules! worker_span {
    ($worker_id:expr) => {
        tracing::debug_span!("worker", worker = %$worker_id)
    };
    ($worker_id:expr, $($fields:tt)*) => {
        tracing::debug_span!("worker", worker = %$worker_id, $($fields)*)
    };
}

/// Log worker lifecycle events (spawned, ready, terminated, ...)
///
/// ```rust
/// muster::log_worker!(3, "ready");
/// muster::log_worker!(3, "terminated", reason = "pool failure");
/// ```
#[macro_export]
macro_rules! log_worker {
    ($worker_id:expr, $event:expr) => {
        tracing::info!(worker = %$worker_id, event = $event)
    };
    ($worker_id:expr, $event:expr, $($fields:tt)*) => {
        tracing::info!(worker = %$worker_id, event = $event, $($fields)*)
    };
}

/// Log handshake progress; noisier than lifecycle events
#[macro_export]
macro_rules! log_handshake {
    ($worker_id:expr, $status:expr) => {
        tracing::debug!(worker = %$worker_id, handshake = $status)
    };
    ($worker_id:expr, $status:expr, $($fields:tt)*) => {
        tracing::debug!(worker = %$worker_id, handshake = $status, $($fields)*)
    };
}

/// Log error events
#[macro_export]
macro_rules! log_error {
    ($error:expr) => {
        tracing::error!(error = %$error)
    };
    ($error:expr, $($fields:tt)*) => {
        tracing::error!(error = %$error, $($fields)*)
    };
}

/// The dispatcher that is current on this thread.
///
/// Worker threads install it with `tracing::dispatcher::with_default` so their
/// logs follow the owner's configuration, including scoped test subscribers.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}

// Re-export the most commonly used tracing macros for convenience
pub use tracing::{debug, error, info, trace, warn};
