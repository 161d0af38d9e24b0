//! Sales-order phase provisioning for Linear.
//!
//! For each sales order this crate creates one project per pipeline phase with
//! staggered date windows, clones the phase's template issues into it, links
//! the projects by dependency relations and attaches the order's resource
//! link. Every step looks before it creates, so re-running a job converges.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod directory;
pub mod error;
pub mod issues;
pub mod links;
pub mod projects;
pub mod provision;
pub mod relations;
pub mod schedule;
pub mod teardown;
pub mod templates;

#[cfg(test)]
mod testing;

pub use config::{Credentials, JobConfig, PhaseConfig, SalesOrder};
pub use directory::{Directory, DryRun};
pub use error::{ProvisionError, ProvisionResult};
pub use provision::{plan, OrderReport, Provisioner, RunReport};
pub use schedule::{PhaseWindow, Schedule, ScheduleWindow};
pub use teardown::{teardown, TeardownEntry, TeardownOutcome};
