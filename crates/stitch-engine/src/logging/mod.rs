//! Logging utilities.
//!
//! Library code only talks to the `log` facade. The studio binary installs
//! `env_logger` through [`init_logging`]; module dumps go to [`MODULE_TARGET`]
//! so they can be filtered apart from the host's own records.

mod init;

pub use init::{init_logging, LoggingConfig, MODULE_TARGET};
