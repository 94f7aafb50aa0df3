//! Granska: chunked document analysis across AI providers.
//!
//! An in-process pipeline that runs user prompts against loaded documents:
//! documents too large for one call are split into chunks, analyzed
//! sequentially and consolidated; follow-up prompts reuse a per-document
//! conversation thread; every successful provider call is metered into an
//! append-only cost log.

pub mod chunking;
pub mod config;
pub mod cost;
pub mod document;
pub mod error;
pub mod library;
pub mod orchestrator;
pub mod pricing;
pub mod provider;
pub mod thread;

pub use error::{GranskaError, Result};
