//! Image reference handling
//!
//! Parses the index image references IIB hands back so Pulp syncs and Quay
//! tags can be derived from them.

pub mod reference;

pub use reference::{ImageReference, has_tag_or_digest};
