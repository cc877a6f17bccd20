//! Command line interface module
//!
//! Argument parsing, validation into an [`OperationConfig`] and the
//! [`Runner`] that drives one IIB operation end to end.

pub mod args;
pub mod config;
pub mod runner;

pub use args::{Cli, Commands};
pub use config::OperationConfig;
pub use runner::Runner;
