//! svcwrap - run any executable as a Windows service
//!
//! The wrapper registers with the Service Control Manager, launches the
//! configured executable with its output captured to per-start log files,
//! and stops the service when the process exits or the SCM asks it to.

pub mod config;
pub mod error;
pub mod logs;
pub mod mode;
pub mod process;
pub mod service;

pub use error::{ConfigError, Result, WrapperError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
