//! IIB push library
//!
//! Submits add-bundles / remove-operators builds to IIB, waits for them,
//! publishes the resulting index image to Pulp and Quay and reports push
//! items along the way.

pub mod cli;
pub mod common;
pub mod error;
pub mod iib;
pub mod image;
pub mod logging;
pub mod publish;
pub mod push;

pub use error::{IibPushError, Result};
pub use logging::Logger;
