//! Observability utilities.

mod tracing;

pub use self::tracing::{init_tracing, LogFormat, StageTimer, DEFAULT_LOG_FILTER};
