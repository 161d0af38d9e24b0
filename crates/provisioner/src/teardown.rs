//! Removal of provisioned phase-projects.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{PhaseConfig, SalesOrder};
use crate::directory::Directory;
use crate::projects::project_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownOutcome {
    Deleted,
    /// Deletion was refused, the project was archived instead
    Archived,
    Missing,
    WouldDelete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownEntry {
    pub project: String,
    pub outcome: TeardownOutcome,
}

/// Delete every phase-project of `orders`, archiving the ones that cannot be
/// deleted.
pub async fn teardown(
    dir: &dyn Directory,
    orders: &[SalesOrder],
    phases: &[PhaseConfig],
    dry_run: bool,
) -> Vec<TeardownEntry> {
    let mut entries = Vec::with_capacity(orders.len() * phases.len());

    for order in orders {
        for phase in phases {
            let project = project_name(&order.id, &phase.name);
            let outcome = remove(dir, &project, dry_run).await;
            entries.push(TeardownEntry { project, outcome });
        }
    }

    entries
}

async fn remove(dir: &dyn Directory, project: &str, dry_run: bool) -> TeardownOutcome {
    let id = match dir.find_project(project).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            info!(project = %project, "Project not found");
            return TeardownOutcome::Missing;
        }
        Err(e) => {
            warn!(project = %project, error = %e, "Project lookup failed");
            return TeardownOutcome::Failed;
        }
    };

    if dry_run {
        info!(project = %project, project_id = %id, "Dry run: would delete project");
        return TeardownOutcome::WouldDelete;
    }

    match dir.delete_project(&id).await {
        Ok(true) => {
            info!(project = %project, "Deleted project");
            return TeardownOutcome::Deleted;
        }
        Ok(false) => warn!(project = %project, "Delete refused, archiving"),
        Err(e) => warn!(project = %project, error = %e, "Delete failed, archiving"),
    }

    match dir.archive_project(&id).await {
        Ok(true) => {
            info!(project = %project, "Archived project");
            TeardownOutcome::Archived
        }
        Ok(false) => {
            warn!(project = %project, "Archive refused");
            TeardownOutcome::Failed
        }
        Err(e) => {
            warn!(project = %project, error = %e, "Archive failed");
            TeardownOutcome::Failed
        }
    }
}
