pub mod config;
pub mod files;
pub mod logging;
pub mod operator;
pub mod structures;

// Re-export for convenience
pub use config::{AppConfig, ConfigManager};
pub use logging::{LogLevel, Logger};
pub use operator::{Operator, SystemOperator};
