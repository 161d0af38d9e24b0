//! Template issue cloning and label resolution.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::directory::{Directory, IssueDraft};
use crate::templates::TemplateIssue;

/// Workspace label name → ID, filled at startup and on demand.
#[derive(Debug, Default)]
pub struct LabelCache {
    by_name: HashMap<String, String>,
}

impl LabelCache {
    /// Load every existing label; returns how many are cached.
    pub async fn warm(&mut self, dir: &dyn Directory) -> Result<usize> {
        let labels = dir.list_labels().await?;
        for label in labels {
            self.by_name.entry(label.name).or_insert(label.id);
        }
        Ok(self.by_name.len())
    }

    /// ID of the label called `name`, creating the label if needed.
    ///
    /// A label that cannot be created yields `None` and is retried the next
    /// time it is asked for.
    pub async fn resolve(&mut self, dir: &dyn Directory, name: &str) -> Option<String> {
        if let Some(id) = self.by_name.get(name) {
            return Some(id.clone());
        }

        match dir.create_label(name).await {
            Ok(label) => {
                info!(label = %name, "Created label");
                self.by_name.insert(name.to_string(), label.id.clone());
                Some(label.id)
            }
            Err(e) => {
                warn!(label = %name, error = %e, "Failed to create label, dropping it");
                None
            }
        }
    }

    /// IDs for `names`, in order, without the ones that could not be resolved
    pub async fn resolve_all(&mut self, dir: &dyn Directory, names: &[String]) -> Vec<String> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            if let Some(id) = self.resolve(dir, name).await {
                ids.push(id);
            }
        }
        ids
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Counters for one project's clone pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CloneStats {
    pub created: usize,
    pub existing: usize,
    pub failed: usize,
    /// Existing issues could not be listed, so nothing was created
    pub skipped: bool,
}

/// Copies template issues into phase-projects, once per title.
pub struct IssueCloner<'a> {
    dir: &'a dyn Directory,
    team_id: &'a str,
    assignee_id: Option<&'a str>,
    labels: LabelCache,
}

impl<'a> IssueCloner<'a> {
    pub fn new(dir: &'a dyn Directory, team_id: &'a str, assignee_id: Option<&'a str>) -> Self {
        Self {
            dir,
            team_id,
            assignee_id,
            labels: LabelCache::default(),
        }
    }

    /// Pre-load the workspace labels. Failure only costs extra lookups later.
    pub async fn warm_labels(&mut self) {
        match self.labels.warm(self.dir).await {
            Ok(count) => info!(count, "Cached workspace labels"),
            Err(e) => warn!(error = %e, "Failed to list labels, resolving on demand"),
        }
    }

    pub fn labels(&self) -> &LabelCache {
        &self.labels
    }

    /// Create every template issue missing from the project, in template order.
    pub async fn clone_into(&mut self, project_id: &str, templates: &[TemplateIssue]) -> CloneStats {
        let mut stats = CloneStats::default();
        if templates.is_empty() {
            return stats;
        }

        let mut existing: HashSet<String> = match self.dir.list_issues(project_id).await {
            Ok(issues) => issues.into_iter().map(|i| i.title).collect(),
            Err(e) => {
                warn!(project_id = %project_id, error = %e, "Failed to list existing issues, skipping clone");
                stats.skipped = true;
                return stats;
            }
        };

        for template in templates {
            if existing.contains(&template.title) {
                debug!(title = %template.title, "Issue exists");
                stats.existing += 1;
                continue;
            }

            let label_ids = self.labels.resolve_all(self.dir, &template.labels).await;
            let draft = IssueDraft {
                project_id: project_id.to_string(),
                team_id: self.team_id.to_string(),
                title: template.title.clone(),
                description: template.description.clone(),
                assignee_id: self.assignee_id.map(ToString::to_string),
                priority: 0,
                label_ids,
            };

            match self.dir.create_issue(&draft).await {
                Ok(id) => {
                    debug!(issue_id = %id, title = %template.title, "Created issue");
                    existing.insert(template.title.clone());
                    stats.created += 1;
                }
                Err(e) => {
                    warn!(title = %template.title, error = %e, "Failed to create issue");
                    stats.failed += 1;
                }
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDirectory;

    fn template(title: &str, labels: &[&str]) -> TemplateIssue {
        TemplateIssue {
            title: title.to_string(),
            description: format!("{title} details"),
            labels: labels.iter().map(ToString::to_string).collect(),
        }
    }

    #[tokio::test]
    async fn test_label_cache_creates_once() {
        let fake = FakeDirectory::new();
        fake.add_label("l-bug", "Bug");
        let mut cache = LabelCache::default();
        assert_eq!(cache.warm(&fake).await.unwrap(), 1);

        assert_eq!(cache.resolve(&fake, "Bug").await.as_deref(), Some("l-bug"));
        let first = cache.resolve(&fake, "Customer").await.unwrap();
        let again = cache.resolve(&fake, "Customer").await.unwrap();

        assert_eq!(first, again);
        assert_eq!(fake.label_creates(), vec!["Customer"]);
    }

    #[tokio::test]
    async fn test_clone_is_idempotent() {
        let fake = FakeDirectory::new();
        let templates = vec![template("Kickoff", &["Customer"]), template("Quote", &[])];
        let mut cloner = IssueCloner::new(&fake, "team-1", Some("lead-1"));

        let first = cloner.clone_into("p1", &templates).await;
        assert_eq!(first.created, 2);

        let second = cloner.clone_into("p1", &templates).await;
        assert_eq!(second.created, 0);
        assert_eq!(second.existing, 2);
        assert_eq!(fake.issue_drafts().len(), 2);
    }

    #[tokio::test]
    async fn test_repeated_template_title_cloned_once() {
        let fake = FakeDirectory::new();
        let templates = vec![
            template("Kickoff", &[]),
            template("Quote", &[]),
            template("Kickoff", &[]),
        ];
        let mut cloner = IssueCloner::new(&fake, "team-1", None);

        let stats = cloner.clone_into("p1", &templates).await;

        assert_eq!(stats.created, 2);
        assert_eq!(stats.existing, 1);
        let titles: Vec<_> = fake.issue_drafts().into_iter().map(|d| d.title).collect();
        assert_eq!(titles, vec!["Kickoff", "Quote"]);
    }

    #[tokio::test]
    async fn test_clone_copies_fields_in_template_order() {
        let fake = FakeDirectory::new();
        fake.add_label("l-cust", "Customer");
        let templates = vec![
            template("Kickoff", &["Customer", "Finance"]),
            template("Quote", &[]),
        ];
        let mut cloner = IssueCloner::new(&fake, "team-1", Some("lead-1"));
        cloner.warm_labels().await;

        cloner.clone_into("p1", &templates).await;

        let drafts = fake.issue_drafts();
        assert_eq!(drafts[0].title, "Kickoff");
        assert_eq!(drafts[0].description, "Kickoff details");
        assert_eq!(drafts[0].label_ids.len(), 2);
        assert_eq!(drafts[0].label_ids[0], "l-cust");
        assert_eq!(drafts[0].assignee_id.as_deref(), Some("lead-1"));
        assert_eq!(drafts[0].priority, 0);
        assert_eq!(drafts[1].title, "Quote");
    }

    #[tokio::test]
    async fn test_unresolvable_label_is_dropped() {
        let fake = FakeDirectory::new();
        fake.fail_label("Broken");
        let mut cloner = IssueCloner::new(&fake, "team-1", None);

        let stats = cloner
            .clone_into("p1", &[template("Kickoff", &["Broken", "Fine"])])
            .await;

        assert_eq!(stats.created, 1);
        assert_eq!(fake.issue_drafts()[0].label_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_listing_failure_skips_project() {
        let fake = FakeDirectory::new();
        fake.fail_issue_listing("p1");
        let mut cloner = IssueCloner::new(&fake, "team-1", None);

        let stats = cloner.clone_into("p1", &[template("Kickoff", &[])]).await;

        assert!(stats.skipped);
        assert!(fake.issue_drafts().is_empty());
    }
}
