#![deny(missing_docs)]
//! Shared logging utilities for the courseware workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase,
//! a per-thread course/unit context that every record is prefixed with, and the
//! initializers for the global logger.

use std::cell::RefCell;
use std::fs::File;
use std::path::Path;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

thread_local! {
    /// Course and unit currently being processed on this thread.
    static CONTEXT: RefCell<(Option<String>, Option<String>)> = const { RefCell::new((None, None)) };
}

/// Guard that installs a course/unit logging context for its lifetime.
///
/// Guards nest: dropping a unit guard restores the enclosing course context.
#[must_use = "the context is cleared as soon as the guard is dropped"]
pub struct LogContext {
    previous: (Option<String>, Option<String>),
}

impl LogContext {
    /// Enters the context of a course. Any unit context is cleared.
    pub fn course(name: &str) -> Self {
        Self::replace((Some(name.to_string()), None))
    }

    /// Enters the context of a unit within the current course.
    pub fn unit(name: &str) -> Self {
        let course = CONTEXT.with(|ctx| ctx.borrow().0.clone());
        Self::replace((course, Some(name.to_string())))
    }

    fn replace(next: (Option<String>, Option<String>)) -> Self {
        let previous = CONTEXT.with(|ctx| std::mem::replace(&mut *ctx.borrow_mut(), next));
        Self { previous }
    }
}

impl Drop for LogContext {
    fn drop(&mut self) {
        let previous = std::mem::take(&mut self.previous);
        CONTEXT.with(|ctx| *ctx.borrow_mut() = previous);
    }
}

/// Returns the `[course / unit] ` prefix for the current thread, or an empty
/// string outside of any context.
pub fn context_prefix() -> String {
    CONTEXT.with(|ctx| match &*ctx.borrow() {
        (Some(course), Some(unit)) => format!("[{course} / {unit}] "),
        (Some(course), None) => format!("[{course}] "),
        (None, Some(unit)) => format!("[{unit}] "),
        (None, None) => String::new(),
    })
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        log::trace!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!("{}{}", $crate::context_prefix(), format_args!($($arg)*));
    }};
}

/// Destination for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDestination {
    /// Write to the log file only.
    File,
    /// Write to terminal (stdout).
    Terminal,
    /// Write to both file and terminal.
    Both,
}

/// Initializes the global logger.
///
/// For `LogDestination::File` or `Both`, `log_path` is truncated and written.
/// A log file that cannot be created degrades to terminal-only output.
pub fn initialize(destination: LogDestination, log_path: &Path, level: LevelFilter) {
    let config = build_config();

    let loggers: Vec<Box<dyn SharedLogger>> = match destination {
        LogDestination::File => match create_file_logger(log_path, level, config.clone()) {
            Some(file_logger) => vec![file_logger],
            None => vec![term_logger(level, config)],
        },
        LogDestination::Terminal => vec![term_logger(level, config)],
        LogDestination::Both => {
            let mut loggers: Vec<Box<dyn SharedLogger>> =
                vec![term_logger(level, config.clone())];
            if let Some(file_logger) = create_file_logger(log_path, level, config) {
                loggers.push(file_logger);
            }
            loggers
        }
    };

    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        // WebDriver and HTTP internals are far too chatty at debug level.
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .add_filter_ignore_str("thirtyfour")
        .build()
}

fn term_logger(level: LevelFilter, config: Config) -> Box<TermLogger> {
    TermLogger::new(level, config, TerminalMode::Mixed, ColorChoice::Auto)
}

fn create_file_logger(
    log_path: &Path,
    level: LevelFilter,
    config: Config,
) -> Option<Box<WriteLogger<File>>> {
    match File::create(log_path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", log_path, err);
            None
        }
    }
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
