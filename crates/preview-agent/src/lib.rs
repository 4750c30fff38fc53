//! Command-line harness for the verification pipeline, plus the HTTP
//! regeneration collaborator used by `heal`.

#![allow(clippy::uninlined_format_args)]

pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod loader;

pub use config::AgentConfig;
pub use error::LoadError;
pub use generator::HttpCodeGenerator;
