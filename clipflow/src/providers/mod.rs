//! Provider clients.
//!
//! This module provides:
//! - An HTTP transport seam with a reqwest implementation
//! - Queue-style work submission producing [`RemoteTask`](crate::poller::RemoteTask)s
//! - A chat-completions text generator

mod queue;
mod text;
mod transport;

pub use queue::{QueueClient, QueueEndpoint};
pub use text::{ChatCompletionsGenerator, TextGenerator, TextRequest};
pub use transport::{Credential, HttpReply, HttpTransport, ReqwestTransport};
