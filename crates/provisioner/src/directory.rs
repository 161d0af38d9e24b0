//! Remote directory abstraction.
//!
//! The provisioning engine only talks to the project tracker through the
//! [`Directory`] trait. [`LinearClient`] implements it for the real service and
//! [`DryRun`] wraps any directory to suppress mutations.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use linear::{
    IssueCreateInput, Label, LinearClient, ProjectCreateInput, ProjectRelationCreateInput,
    RelationSide,
};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Raw input object for `entityExternalLinkCreate`
pub type LinkInput = Map<String, Value>;

/// Prefix of the synthetic IDs handed out during a dry run
pub const DRY_RUN_PREFIX: &str = "dry-run:";

/// Issue as listed in a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIssue {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub labels: Vec<String>,
}

/// Project relation, oriented as it was declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRelation {
    /// `dependency`, `blocks` or `blockedBy`
    pub kind: String,
    pub project_id: String,
    pub project_name: String,
    pub related_id: String,
    pub related_name: String,
}

/// External link attached to a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLink {
    pub url: String,
    pub label: Option<String>,
}

/// Fields of a project to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDraft {
    pub name: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub target_date: NaiveDate,
    pub team_id: String,
    pub lead_id: Option<String>,
}

/// Fields of an issue to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDraft {
    pub project_id: String,
    pub team_id: String,
    pub title: String,
    pub description: String,
    pub assignee_id: Option<String>,
    pub priority: i32,
    pub label_ids: Vec<String>,
}

/// Dependency relation between two projects, anchored end → start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDraft {
    pub predecessor_id: String,
    pub successor_id: String,
}

/// Project-tracker operations the provisioning engine depends on.
///
/// Every listing method returns the complete result set; implementations are
/// responsible for walking pagination to the end.
#[async_trait]
pub trait Directory: Send + Sync {
    /// ID of the project whose name equals `name` exactly
    async fn find_project(&self, name: &str) -> Result<Option<String>>;

    /// All issues of a project, in the order the service returns them
    async fn list_issues(&self, project_id: &str) -> Result<Vec<RemoteIssue>>;

    /// All workspace labels
    async fn list_labels(&self) -> Result<Vec<Label>>;

    /// Relations declared on one side of a project
    async fn list_relations(
        &self,
        project_id: &str,
        side: RelationSide,
    ) -> Result<Vec<RemoteRelation>>;

    /// External links attached to a project
    async fn list_links(&self, project_id: &str) -> Result<Vec<RemoteLink>>;

    /// Field names of an input type; `None` if the type is not in the schema
    async fn introspect_input_fields(&self, type_name: &str) -> Result<Option<Vec<String>>>;

    /// Current description of an issue
    async fn issue_description(&self, issue_id: &str) -> Result<String>;

    async fn create_project(&self, draft: &ProjectDraft) -> Result<String>;

    async fn create_issue(&self, draft: &IssueDraft) -> Result<String>;

    async fn create_label(&self, name: &str) -> Result<Label>;

    async fn update_description(&self, issue_id: &str, text: &str) -> Result<()>;

    async fn create_relation(&self, draft: &RelationDraft) -> Result<()>;

    /// Attach an external link; the input shape varies between workspaces
    async fn create_external_link(&self, input: &LinkInput) -> Result<()>;

    /// `Ok(false)` when the service refuses the deletion
    async fn delete_project(&self, project_id: &str) -> Result<bool>;

    /// `Ok(false)` when the service refuses the archive
    async fn archive_project(&self, project_id: &str) -> Result<bool>;
}

// =============================================================================
// Linear
// =============================================================================

#[async_trait]
impl Directory for LinearClient {
    async fn find_project(&self, name: &str) -> Result<Option<String>> {
        Ok(self.find_project_by_name(name).await?.map(|p| p.id))
    }

    async fn list_issues(&self, project_id: &str) -> Result<Vec<RemoteIssue>> {
        let issues = self.list_project_issues(project_id).await?;
        Ok(issues
            .into_iter()
            .map(|issue| RemoteIssue {
                labels: issue.label_names(),
                id: issue.id,
                title: issue.title,
                description: issue.description,
            })
            .collect())
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        LinearClient::list_labels(self).await
    }

    async fn list_relations(
        &self,
        project_id: &str,
        side: RelationSide,
    ) -> Result<Vec<RemoteRelation>> {
        let relations = self.list_project_relations(project_id, side).await?;
        Ok(relations
            .into_iter()
            .map(|r| RemoteRelation {
                kind: r.relation_type,
                project_id: r.project.id,
                project_name: r.project.name,
                related_id: r.related_project.id,
                related_name: r.related_project.name,
            })
            .collect())
    }

    async fn list_links(&self, project_id: &str) -> Result<Vec<RemoteLink>> {
        let links = self.list_project_links(project_id).await?;
        Ok(links
            .into_iter()
            .map(|l| RemoteLink {
                url: l.url,
                label: l.label,
            })
            .collect())
    }

    async fn introspect_input_fields(&self, type_name: &str) -> Result<Option<Vec<String>>> {
        self.input_type_fields(type_name).await
    }

    async fn issue_description(&self, issue_id: &str) -> Result<String> {
        self.get_issue_description(issue_id).await
    }

    async fn create_project(&self, draft: &ProjectDraft) -> Result<String> {
        let input = ProjectCreateInput {
            name: draft.name.clone(),
            description: Some(draft.description.clone()),
            state: Some("planned".to_string()),
            priority: 0,
            start_date: Some(draft.start_date.to_string()),
            target_date: Some(draft.target_date.to_string()),
            lead_id: draft.lead_id.clone(),
            team_ids: vec![draft.team_id.clone()],
        };
        let project = LinearClient::create_project(self, input).await?;
        if let Some(url) = &project.url {
            debug!(project = %project.name, url = %url, "Project URL");
        }
        Ok(project.id)
    }

    async fn create_issue(&self, draft: &IssueDraft) -> Result<String> {
        let input = IssueCreateInput {
            team_id: draft.team_id.clone(),
            title: draft.title.clone(),
            description: Some(draft.description.clone()),
            project_id: Some(draft.project_id.clone()),
            assignee_id: draft.assignee_id.clone(),
            priority: draft.priority,
            label_ids: draft.label_ids.clone(),
        };
        LinearClient::create_issue(self, input).await
    }

    async fn create_label(&self, name: &str) -> Result<Label> {
        LinearClient::create_label(self, name).await
    }

    async fn update_description(&self, issue_id: &str, text: &str) -> Result<()> {
        self.update_issue_description(issue_id, text).await
    }

    async fn create_relation(&self, draft: &RelationDraft) -> Result<()> {
        let input = ProjectRelationCreateInput {
            project_id: draft.predecessor_id.clone(),
            related_project_id: draft.successor_id.clone(),
            relation_type: "dependency".to_string(),
            anchor_type: "end".to_string(),
            related_anchor_type: "start".to_string(),
        };
        self.create_project_relation(input).await
    }

    async fn create_external_link(&self, input: &LinkInput) -> Result<()> {
        LinearClient::create_external_link(self, input).await
    }

    async fn delete_project(&self, project_id: &str) -> Result<bool> {
        LinearClient::delete_project(self, project_id).await
    }

    async fn archive_project(&self, project_id: &str) -> Result<bool> {
        LinearClient::archive_project(self, project_id).await
    }
}

// =============================================================================
// Dry run
// =============================================================================

/// Directory decorator that performs every read and suppresses every write.
///
/// Suppressed creates return synthetic `dry-run:` IDs so the rest of the run
/// can log what it would do with them. Reads against a synthetic ID return
/// nothing instead of reaching the service.
pub struct DryRun<D> {
    inner: D,
    suppressed: AtomicUsize,
}

impl<D: Directory> DryRun<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            suppressed: AtomicUsize::new(0),
        }
    }

    /// Number of mutations suppressed so far
    pub fn suppressed(&self) -> usize {
        self.suppressed.load(Ordering::Relaxed)
    }

    fn suppress(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }
}

fn is_synthetic(id: &str) -> bool {
    id.starts_with(DRY_RUN_PREFIX)
}

#[async_trait]
impl<D: Directory> Directory for DryRun<D> {
    async fn find_project(&self, name: &str) -> Result<Option<String>> {
        self.inner.find_project(name).await
    }

    async fn list_issues(&self, project_id: &str) -> Result<Vec<RemoteIssue>> {
        if is_synthetic(project_id) {
            return Ok(Vec::new());
        }
        self.inner.list_issues(project_id).await
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        self.inner.list_labels().await
    }

    async fn list_relations(
        &self,
        project_id: &str,
        side: RelationSide,
    ) -> Result<Vec<RemoteRelation>> {
        if is_synthetic(project_id) {
            return Ok(Vec::new());
        }
        self.inner.list_relations(project_id, side).await
    }

    async fn list_links(&self, project_id: &str) -> Result<Vec<RemoteLink>> {
        if is_synthetic(project_id) {
            return Ok(Vec::new());
        }
        self.inner.list_links(project_id).await
    }

    async fn introspect_input_fields(&self, type_name: &str) -> Result<Option<Vec<String>>> {
        self.inner.introspect_input_fields(type_name).await
    }

    async fn issue_description(&self, issue_id: &str) -> Result<String> {
        if is_synthetic(issue_id) {
            return Ok(String::new());
        }
        self.inner.issue_description(issue_id).await
    }

    async fn create_project(&self, draft: &ProjectDraft) -> Result<String> {
        self.suppress();
        info!(
            project = %draft.name,
            start = %draft.start_date,
            target = %draft.target_date,
            "Dry run: would create project"
        );
        Ok(format!("{DRY_RUN_PREFIX}project:{}", draft.name))
    }

    async fn create_issue(&self, draft: &IssueDraft) -> Result<String> {
        self.suppress();
        info!(
            project_id = %draft.project_id,
            title = %draft.title,
            labels = draft.label_ids.len(),
            "Dry run: would create issue"
        );
        Ok(format!("{DRY_RUN_PREFIX}issue:{}", draft.title))
    }

    async fn create_label(&self, name: &str) -> Result<Label> {
        self.suppress();
        info!(label = %name, "Dry run: would create label");
        Ok(Label {
            id: format!("{DRY_RUN_PREFIX}label:{name}"),
            name: name.to_string(),
        })
    }

    async fn update_description(&self, issue_id: &str, _text: &str) -> Result<()> {
        self.suppress();
        info!(issue_id = %issue_id, "Dry run: would update issue description");
        Ok(())
    }

    async fn create_relation(&self, draft: &RelationDraft) -> Result<()> {
        self.suppress();
        info!(
            from = %draft.predecessor_id,
            to = %draft.successor_id,
            "Dry run: would create dependency relation"
        );
        Ok(())
    }

    async fn create_external_link(&self, input: &LinkInput) -> Result<()> {
        self.suppress();
        let input = Value::Object(input.clone());
        info!(input = %input, "Dry run: would attach external link");
        Ok(())
    }

    async fn delete_project(&self, project_id: &str) -> Result<bool> {
        self.suppress();
        info!(project_id = %project_id, "Dry run: would delete project");
        Ok(true)
    }

    async fn archive_project(&self, project_id: &str) -> Result<bool> {
        self.suppress();
        info!(project_id = %project_id, "Dry run: would archive project");
        Ok(true)
    }
}
