//! Find-or-create of phase-projects.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::directory::{Directory, ProjectDraft};
use crate::schedule::ScheduleWindow;

/// Exact name of the project for `order` in `phase`
pub fn project_name(order: &str, phase: &str) -> String {
    format!("{order} {phase}")
}

/// Result of reconciling one phase-project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    Existing(String),
    Created(String),
}

impl Reconciled {
    pub fn id(&self) -> &str {
        match self {
            Self::Existing(id) | Self::Created(id) => id,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Projects of one order that resolved, keyed by phase name.
#[derive(Debug, Clone, Default)]
pub struct OrderProjects {
    ids: HashMap<String, String>,
    /// Phase names in pipeline order
    phases: Vec<String>,
}

impl OrderProjects {
    pub fn insert(&mut self, phase: &str, id: &str) {
        if self.ids.insert(phase.to_string(), id.to_string()).is_none() {
            self.phases.push(phase.to_string());
        }
    }

    pub fn get(&self, phase: &str) -> Option<&str> {
        self.ids.get(phase).map(String::as_str)
    }

    /// `(phase, project id)` in pipeline order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.phases
            .iter()
            .filter_map(|p| self.ids.get(p).map(|id| (p.as_str(), id.as_str())))
    }

    pub fn by_phase(&self) -> &HashMap<String, String> {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

/// Creates phase-projects that do not exist yet; never touches existing ones.
pub struct ProjectReconciler<'a> {
    dir: &'a dyn Directory,
    team_id: &'a str,
    lead_id: Option<&'a str>,
}

impl<'a> ProjectReconciler<'a> {
    pub fn new(dir: &'a dyn Directory, team_id: &'a str, lead_id: Option<&'a str>) -> Self {
        Self {
            dir,
            team_id,
            lead_id,
        }
    }

    /// Look up the project for (`order`, `phase`) by exact name, creating it
    /// with `window` when absent.
    ///
    /// Returns `None` when the lookup or the creation fails; the caller skips
    /// everything downstream for that phase.
    pub async fn reconcile(
        &self,
        order: &str,
        phase: &str,
        window: ScheduleWindow,
    ) -> Option<Reconciled> {
        let name = project_name(order, phase);

        match self.dir.find_project(&name).await {
            Ok(Some(id)) => {
                info!(project = %name, "Project exists");
                return Some(Reconciled::Existing(id));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(project = %name, error = %e, "Project lookup failed");
                return None;
            }
        }

        let draft = ProjectDraft {
            name: name.clone(),
            description: format!("{order} - {phase}"),
            start_date: window.start,
            target_date: window.end,
            team_id: self.team_id.to_string(),
            lead_id: self.lead_id.map(ToString::to_string),
        };

        match self.dir.create_project(&draft).await {
            Ok(id) => {
                info!(project = %name, start = %window.start, target = %window.end, "Created project");
                Some(Reconciled::Created(id))
            }
            Err(e) => {
                warn!(project = %name, error = %e, "Failed to create project");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDirectory;
    use chrono::NaiveDate;

    fn window() -> ScheduleWindow {
        ScheduleWindow {
            start: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 5, 15).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_creates_with_window_and_description() {
        let fake = FakeDirectory::new();
        let reconciler = ProjectReconciler::new(&fake, "team-1", Some("lead-1"));

        let result = reconciler.reconcile("SO1", "Sales", window()).await.unwrap();
        assert!(result.was_created());

        let drafts = fake.project_drafts();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].name, "SO1 Sales");
        assert_eq!(drafts[0].description, "SO1 - Sales");
        assert_eq!(drafts[0].start_date, window().start);
        assert_eq!(drafts[0].target_date, window().end);
        assert_eq!(drafts[0].team_id, "team-1");
        assert_eq!(drafts[0].lead_id.as_deref(), Some("lead-1"));
    }

    #[tokio::test]
    async fn test_second_reconcile_reuses_project() {
        let fake = FakeDirectory::new();
        let reconciler = ProjectReconciler::new(&fake, "team-1", None);

        let first = reconciler.reconcile("SO1", "Sales", window()).await.unwrap();
        let second = reconciler.reconcile("SO1", "Sales", window()).await.unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(second, Reconciled::Existing(first.id().to_string()));
        assert_eq!(fake.project_drafts().len(), 1);
    }

    #[tokio::test]
    async fn test_create_failure_skips_phase() {
        let fake = FakeDirectory::new();
        fake.fail_project("SO1 Sales");
        let reconciler = ProjectReconciler::new(&fake, "team-1", None);

        assert!(reconciler.reconcile("SO1", "Sales", window()).await.is_none());
    }

    #[test]
    fn test_order_projects_keep_pipeline_order() {
        let mut projects = OrderProjects::default();
        projects.insert("Sales", "p1");
        projects.insert("Production", "p3");
        projects.insert("Sales", "p1");

        let phases: Vec<_> = projects.iter().map(|(phase, _)| phase).collect();
        assert_eq!(phases, vec!["Sales", "Production"]);
        assert_eq!(projects.get("Production"), Some("p3"));
        assert_eq!(projects.len(), 2);
    }
}
