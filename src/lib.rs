//! prompt-relay - Streaming relay for a single chat-completion endpoint
//!
//! This library provides the core functionality for the prompt-relay
//! service: configuration, the streaming relay pipeline, and the HTTP
//! surface around it.

pub mod config;
pub mod error;
pub mod proxy;
pub mod relay;

pub use config::Config;
pub use error::{Error, Result};
