/// Error types.
pub mod error;

/// Virtual machine records and requests.
pub mod models;

/// Configuration serialization and deserialization.
pub mod config;

/// SSH related functionality.
pub mod ssh;

/// VM operations over virsh and its output parsers.
pub mod virsh;

/// Session-authenticated Web API client.
pub mod webapi;

/// Utility functions for common operations.
pub mod utils;

/// CLI interface and commands.
pub mod cli;

pub use error::{Error, Result};
