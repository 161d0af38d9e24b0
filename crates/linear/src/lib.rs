//! Linear GraphQL client for provisioning.
//!
//! This crate provides:
//! - An authenticated GraphQL client for the Linear API
//! - Cursor pagination over Linear connections
//! - Type definitions for projects, issues, labels, relations and links
//! - Schema introspection for input types whose shape varies by workspace

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Every API method can fail

pub mod client;
pub mod models;

pub use client::{LinearClient, LINEAR_API_URL};
pub use models::*;
