//! Remote task polling.
//!
//! A [`TaskPoller`] repeatedly queries a provider's status endpoint for a
//! [`RemoteTask`], waiting between queries on a linear, capped backoff,
//! until the task succeeds, fails, or its wait budget runs out. Provider
//! response layouts are handled by the decoders in [`shape`].

mod backoff;
mod engine;
pub mod shape;
mod task;

pub use backoff::{BackoffConfig, BackoffSchedule};
pub use engine::{PollStats, TaskPoller};
pub use task::{ProviderDialect, RemoteTask};
