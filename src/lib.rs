//! Administrative helpers: a parallel ping prober, a local-MTA mail wrapper,
//! file/YAML/JSON helpers and JSON structure utilities.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use opskit::core::{LogLevel, Logger, SystemOperator};
//! use opskit::modules::network_tools::{ProbeConfig, Prober};
//!
//! let operator = Arc::new(SystemOperator::new(Logger::new(None, true, LogLevel::Info), "ping"));
//! let prober = Prober::new(operator, ProbeConfig::new(false, None, 3, 4));
//! prober.probe(&["127.0.0.1", "::1"]);
//! println!("{:?}", prober.status());
//! ```

pub mod core;
pub mod modules;
