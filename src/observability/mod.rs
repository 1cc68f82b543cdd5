//! # Observability Infrastructure
//!
//! Structured logging for the compiler and its command line tool.

pub mod logging;

pub use logging::{init_logging, log_config_info};
