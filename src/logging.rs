use std::sync::OnceLock;

use chrono::Local;
use log::{LevelFilter, Metadata, Record, SetLoggerError};
use serde::Serialize;
use tokio::sync::broadcast;

static LOGGER: OnceLock<BridgeLogger> = OnceLock::new();

const LOG_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Serialize, Clone)]
pub struct LogMessage {
    pub level: String,
    pub message: String,
    pub timestamp: String,
}

/// Writes records to stderr and forwards them to whoever renders logs
pub struct BridgeLogger {
    level: LevelFilter,
    tx: broadcast::Sender<LogMessage>,
}

impl BridgeLogger {
    pub fn new(level: LevelFilter) -> Self {
        let (tx, _) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        Self { level, tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogMessage> {
        self.tx.subscribe()
    }

    /// Installs the global logger. Fails if any logger is already set.
    pub fn init(level: LevelFilter) -> Result<broadcast::Receiver<LogMessage>, SetLoggerError> {
        let logger = LOGGER.get_or_init(|| BridgeLogger::new(level));
        log::set_logger(logger).map(|()| log::set_max_level(logger.level))?;
        Ok(logger.subscribe())
    }

    fn emit_log(&self, record: &Record) {
        let log_message = LogMessage {
            level: record.level().to_string(),
            message: record.args().to_string(),
            timestamp: Local::now().to_rfc3339(),
        };

        // Nobody listening is fine; stderr already has it.
        let _ = self.tx.send(log_message);
    }
}

impl log::Log for BridgeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
            self.emit_log(record);
        }
    }

    fn flush(&self) {}
}

/// Parses a configured level name, defaulting to info
pub fn parse_level(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or(LevelFilter::Info)
}

/// Installs the bridge logger, or env_logger if a logger cannot be set.
/// Returns the log stream only when the bridge logger is active.
pub fn init(level: &str) -> Option<broadcast::Receiver<LogMessage>> {
    let level_filter = parse_level(level);
    match BridgeLogger::init(level_filter) {
        Ok(rx) => Some(rx),
        Err(_) => {
            // Only fall back when the bridge logger could not be installed
            let _ = env_logger::builder().filter_level(level_filter).try_init();
            None
        }
    }
}
