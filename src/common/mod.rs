//! Common module - shared plumbing used across the codebase

pub mod command;

pub use command::{CommandOptions, CommandOutput, CommandRunner, RealCommandRunner};
