//! Shared utilities for the Plotline services.

pub mod logging;
pub mod time;

pub use logging::{init_logging, LogFormat, LogFormatError};
pub use time::format_duration;
