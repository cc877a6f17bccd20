//! IIB module for index image build interactions
//!
//! This module provides the request/response models, Kerberos handling and
//! the HTTP client for the IIB REST API, including waiting for a build to
//! finish.

pub mod auth;
pub mod client;
pub mod models;

pub use auth::KerberosAuth;
pub use client::{BuildWaiter, HttpIibClient, IibClient, IibClientBuilder};
pub use models::{BuildDetails, BuildRequest, BuildState, BundleMapping, FailureReport, Operation};
