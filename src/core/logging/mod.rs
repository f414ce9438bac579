use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: i64,
    pub level: LogLevel,
    pub module: String,
    pub message: String,
    pub metadata: Option<serde_json::Value>,
}

/// Leveled logger writing colored lines to the console and JSON lines to an
/// optional log file.
pub struct Logger {
    log_file_path: Option<PathBuf>,
    console_output: bool,
    min_level: LogLevel,
}

impl Logger {
    pub fn new(log_file_path: Option<&str>, console_output: bool, min_level: LogLevel) -> Self {
        Self {
            log_file_path: log_file_path.map(PathBuf::from),
            console_output,
            min_level,
        }
    }

    pub fn log(&self, level: LogLevel, module: &str, message: &str, metadata: Option<serde_json::Value>) {
        if !self.should_log(&level) {
            return;
        }

        let entry = LogEntry {
            timestamp: Utc::now().timestamp(),
            level,
            module: module.to_string(),
            message: message.to_string(),
            metadata,
        };

        if self.console_output {
            self.print_to_console(&entry);
        }

        if let Err(e) = self.write_to_file(&entry) {
            eprintln!("Failed to write to log file: {}", e);
        }
    }

    pub fn debug(&self, module: &str, message: &str) {
        self.log(LogLevel::Debug, module, message, None);
    }

    pub fn info(&self, module: &str, message: &str) {
        self.log(LogLevel::Info, module, message, None);
    }

    pub fn warning(&self, module: &str, message: &str) {
        self.log(LogLevel::Warning, module, message, None);
    }

    pub fn error(&self, module: &str, message: &str) {
        self.log(LogLevel::Error, module, message, None);
    }

    fn should_log(&self, level: &LogLevel) -> bool {
        use LogLevel::*;
        match (&self.min_level, level) {
            (Debug, _) => true,
            (Info, Debug) => false,
            (Info, _) => true,
            (Warning, Debug | Info) => false,
            (Warning, _) => true,
            (Error, Error) => true,
            (Error, _) => false,
        }
    }

    fn print_to_console(&self, entry: &LogEntry) {
        let local_time: DateTime<Local> = DateTime::from_timestamp(entry.timestamp, 0)
            .unwrap_or_default()
            .with_timezone(&Local);

        let level_str = match entry.level {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
        };

        let color_code = match entry.level {
            LogLevel::Debug => "\x1b[36m",
            LogLevel::Info => "\x1b[32m",
            LogLevel::Warning => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
        };

        // stderr keeps stdout clean for JSON results
        eprintln!(
            "{}[{}] [{}] {}: {}\x1b[0m",
            color_code,
            local_time.format("%Y-%m-%d %H:%M:%S"),
            level_str,
            entry.module,
            entry.message
        );

        if let Some(ref metadata) = entry.metadata {
            eprintln!("  Metadata: {}", serde_json::to_string(metadata).unwrap_or_default());
        }
    }

    fn write_to_file(&self, entry: &LogEntry) -> io::Result<()> {
        let Some(path) = self.log_file_path.as_deref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        let json_entry = serde_json::to_string(entry)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        writeln!(file, "{}", json_entry)?;
        file.flush()?;

        Ok(())
    }

    pub fn get_recent_logs(&self, count: usize) -> io::Result<Vec<LogEntry>> {
        let Some(path) = self.log_file_path.as_deref() else {
            return Ok(Vec::new());
        };
        if !Path::new(path).exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(path)?;
        let mut entries: Vec<LogEntry> = content
            .lines()
            .rev()
            .take(count)
            .filter_map(|line| serde_json::from_str::<LogEntry>(line).ok())
            .collect();

        entries.reverse();
        Ok(entries)
    }
}

// Global logger instance
use std::sync::{Arc, Mutex, OnceLock};

static GLOBAL_LOGGER: OnceLock<Arc<Mutex<Logger>>> = OnceLock::new();

/// Installs the process-wide logger. Later calls are ignored.
pub fn init_logger(logger: Logger) {
    GLOBAL_LOGGER.set(Arc::new(Mutex::new(logger))).ok();
}

pub fn log(level: LogLevel, module: &str, message: &str, metadata: Option<serde_json::Value>) {
    if let Some(logger) = GLOBAL_LOGGER.get() {
        if let Ok(logger) = logger.lock() {
            logger.log(level, module, message, metadata);
        }
    }
}

pub fn log_debug(module: &str, message: &str) {
    log(LogLevel::Debug, module, message, None);
}

pub fn log_info(module: &str, message: &str) {
    log(LogLevel::Info, module, message, None);
}

pub fn log_warning(module: &str, message: &str) {
    log(LogLevel::Warning, module, message, None);
}

pub fn log_error(module: &str, message: &str) {
    log(LogLevel::Error, module, message, None);
}

#[macro_export]
macro_rules! log_debug {
    ($module:expr, $($arg:tt)*) => {
        $crate::core::logging::log_debug($module, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($module:expr, $($arg:tt)*) => {
        $crate::core::logging::log_info($module, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warning {
    ($module:expr, $($arg:tt)*) => {
        $crate::core::logging::log_warning($module, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($module:expr, $($arg:tt)*) => {
        $crate::core::logging::log_error($module, &format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filtering_and_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("opskit.log");
        let logger = Logger::new(path.to_str(), false, LogLevel::Info);

        logger.debug("test", "dropped");
        logger.info("test", "kept");
        logger.log(
            LogLevel::Error,
            "test",
            "with metadata",
            Some(serde_json::json!({ "host": "a" })),
        );

        let entries = logger.get_recent_logs(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "kept");
        assert_eq!(entries[1].level, LogLevel::Error);
        assert_eq!(entries[1].metadata, Some(serde_json::json!({ "host": "a" })));
    }

    #[test]
    fn test_parse_level() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_no_file_configured() {
        let logger = Logger::new(None, false, LogLevel::Debug);
        logger.info("test", "console only");
        assert!(logger.get_recent_logs(5).unwrap().is_empty());
    }
}
