//! Publishing of a finished index image to Pulp and Quay

pub mod pulp;
pub mod quay;

pub use pulp::{ContainerSyncOptions, PulpClient, PulpPublisher};
pub use quay::QuayTagger;
