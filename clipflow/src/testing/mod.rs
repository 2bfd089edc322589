//! Testing utilities for clipflow pipelines.
//!
//! This module provides:
//! - A scripted HTTP transport and text generator
//! - An in-memory artifact store
//! - Canned provider responses and a test configuration

pub mod fixtures;
mod mocks;

pub use mocks::{
    MemoryArtifactStore, Method, RecordedRequest, ScriptedTextGenerator, ScriptedTransport,
};
