/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Keel Logging Module
//!
//! A `log` facade backend shared by the keel crates.
//!
//! Library code logs through the prelude:
//!
//! ```
//! use keel_utils::logging::prelude::*;
//!
//! info!("collected status from {} agents", 3);
//! ```
//!
//! The binary initializes the logger once from [`crate::config::Log`]:
//!
//! ```
//! keel_utils::logging::init_with_format("info", "json").expect("logger");
//! ```
//!
//! Records go to stderr either as a single human-readable line or as one JSON
//! object per line. The level can be changed at runtime with
//! [`update_log_level`]; unknown level names fall back to "info".

use log::{LevelFilter, Metadata, Record, SetLoggerError};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub use log::{debug, error, info, trace, warn};

static LOGGER: KeelLogger = KeelLogger;
static CURRENT_LEVEL: AtomicUsize = AtomicUsize::new(LevelFilter::Info as usize);
static JSON_FORMAT: AtomicBool = AtomicBool::new(false);
static INIT: OnceCell<()> = OnceCell::new();

/// Logger backing the `log` macros in every keel crate
pub struct KeelLogger;

impl log::Log for KeelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= current_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!("{}", format_record(record, JSON_FORMAT.load(Ordering::Relaxed)));
    }

    fn flush(&self) {}
}

fn format_record(record: &Record, json: bool) -> String {
    if json {
        serde_json::json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "level": record.level().to_string().to_lowercase(),
            "target": record.target(),
            "message": record.args().to_string(),
            "module": record.module_path(),
            "line": record.line()
        })
        .to_string()
    } else {
        format!(
            "{} - {} [{}]: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            record.args()
        )
    }
}

/// Initializes the logger with the given level and the text format.
pub fn init(level: &str) -> Result<(), SetLoggerError> {
    init_with_format(level, "text")
}

/// Initializes the logger with the given level and output format.
///
/// # Arguments
/// * `level` - "off", "error", "warn", "info", "debug" or "trace"
/// * `format` - "text" for human-readable lines, "json" for structured lines
///
/// Calling this more than once only updates the level and format.
pub fn init_with_format(level: &str, format: &str) -> Result<(), SetLoggerError> {
    let mut installed = Ok(());
    INIT.get_or_init(|| {
        installed = log::set_logger(&LOGGER);
    });
    installed?;

    JSON_FORMAT.store(format.eq_ignore_ascii_case("json"), Ordering::Relaxed);
    update_log_level(level);
    Ok(())
}

/// Updates the current log level.
///
/// Unknown level names are treated as "info".
pub fn update_log_level(level: &str) {
    let filter = str_to_level_filter(level);
    CURRENT_LEVEL.store(filter as usize, Ordering::Relaxed);
    log::set_max_level(filter);
}

fn current_level() -> LevelFilter {
    match CURRENT_LEVEL.load(Ordering::Relaxed) {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        5 => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

fn str_to_level_filter(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

pub mod prelude {
    pub use log::{debug, error, info, trace, warn};
}
