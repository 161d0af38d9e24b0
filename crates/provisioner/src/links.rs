//! Resource link attachment.
//!
//! The input accepted by `entityExternalLinkCreate` differs between
//! workspaces, so the applier probes a list of input shapes and remembers the
//! first one the service accepts.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::directory::{Directory, IssueDraft, LinkInput};

/// Schema type describing the external link input
pub const LINK_INPUT_TYPE: &str = "EntityExternalLinkCreateInput";

/// Title of the issue that collects links when no shape is accepted
pub const RESOURCES_ISSUE_TITLE: &str = "Resources";

const ID_FIELDS: [&str; 4] = ["projectId", "id", "targetId", "entityId"];

/// Field names used to build one external link input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkShape {
    pub id_field: String,
    pub label_field: Option<String>,
    pub url_field: String,
}

impl LinkShape {
    fn conventional(id_field: &str) -> Self {
        Self {
            id_field: id_field.to_string(),
            label_field: Some("label".to_string()),
            url_field: "url".to_string(),
        }
    }

    /// Pick the shape out of an introspected field list.
    ///
    /// Only the id field has to be found; url and label fall back to the
    /// conventional names.
    pub fn from_input_fields(fields: &[String]) -> Option<Self> {
        let has = |name: &str| fields.iter().any(|f| f == name);

        let id_field = ID_FIELDS.into_iter().find(|f| has(f))?;
        let url_field = ["url", "link"].into_iter().find(|f| has(f)).unwrap_or("url");
        let label_field = ["label", "title"]
            .into_iter()
            .find(|f| has(f))
            .unwrap_or("label");

        Some(Self {
            id_field: id_field.to_string(),
            label_field: Some(label_field.to_string()),
            url_field: url_field.to_string(),
        })
    }

    pub fn build(&self, target_id: &str, label: &str, url: &str) -> LinkInput {
        let mut input = LinkInput::new();
        input.insert(self.id_field.clone(), Value::from(target_id));
        input.insert(self.url_field.clone(), Value::from(url));
        if let Some(field) = &self.label_field {
            input.insert(field.clone(), Value::from(label));
        }
        input
    }

    fn describe(&self) -> String {
        match &self.label_field {
            Some(label) => format!("{{{},{},{}}}", self.id_field, self.url_field, label),
            None => format!("{{{},{}}}", self.id_field, self.url_field),
        }
    }
}

/// Shapes to try, most specific first, without duplicates.
pub fn candidate_shapes(
    preferred: Option<&LinkShape>,
    introspected: Option<&LinkShape>,
) -> Vec<LinkShape> {
    let mut shapes: Vec<LinkShape> = Vec::new();
    let conventional = ID_FIELDS.iter().map(|f| LinkShape::conventional(f));

    for shape in preferred
        .cloned()
        .into_iter()
        .chain(introspected.cloned())
        .chain(conventional)
    {
        if !shapes.contains(&shape) {
            shapes.push(shape);
        }
    }
    shapes
}

/// Label and URL attached to each of an order's projects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLink {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkOutcome {
    Attached,
    AlreadyPresent,
    RecordedInIssue,
    Failed,
}

/// Attaches resource links, learning the accepted input shape as it goes.
pub struct ResourceLinkApplier<'a> {
    dir: &'a dyn Directory,
    team_id: &'a str,
    issue_fallback: bool,
    /// `None` until introspection has run once
    introspected: Option<Option<LinkShape>>,
    preferred: Option<LinkShape>,
}

impl<'a> ResourceLinkApplier<'a> {
    pub fn new(dir: &'a dyn Directory, team_id: &'a str, issue_fallback: bool) -> Self {
        Self {
            dir,
            team_id,
            issue_fallback,
            introspected: None,
            preferred: None,
        }
    }

    /// Shape the service accepted most recently
    pub fn preferred(&self) -> Option<&LinkShape> {
        self.preferred.as_ref()
    }

    async fn introspected_shape(&mut self) -> Option<LinkShape> {
        if self.introspected.is_none() {
            let shape = match self.dir.introspect_input_fields(LINK_INPUT_TYPE).await {
                Ok(Some(fields)) => LinkShape::from_input_fields(&fields),
                Ok(None) => {
                    debug!("Link input type not in schema");
                    None
                }
                Err(e) => {
                    debug!(error = %e, "Schema introspection unavailable");
                    None
                }
            };
            if let Some(shape) = &shape {
                debug!(shape = %shape.describe(), "Introspected link input shape");
            }
            self.introspected = Some(shape);
        }
        self.introspected.clone().flatten()
    }

    /// Attach `link` to `project_id` unless a link with the same URL is there.
    pub async fn attach(&mut self, project_id: &str, link: &ResourceLink) -> LinkOutcome {
        match self.dir.list_links(project_id).await {
            Ok(existing) if existing.iter().any(|l| l.url == link.url) => {
                debug!(project_id = %project_id, url = %link.url, "Link already attached");
                return LinkOutcome::AlreadyPresent;
            }
            Ok(_) => {}
            Err(e) => debug!(project_id = %project_id, error = %e, "Could not list links"),
        }

        let introspected = self.introspected_shape().await;
        let shapes = candidate_shapes(self.preferred.as_ref(), introspected.as_ref());

        let mut last_error = None;
        for shape in &shapes {
            let input = shape.build(project_id, &link.label, &link.url);
            match self.dir.create_external_link(&input).await {
                Ok(()) => {
                    info!(project_id = %project_id, url = %link.url, "Attached resource link");
                    self.preferred = Some(shape.clone());
                    return LinkOutcome::Attached;
                }
                Err(e) => {
                    debug!(shape = %shape.describe(), error = %e, "Link shape rejected");
                    last_error = Some(e);
                }
            }
        }

        let tried: Vec<_> = shapes.iter().map(LinkShape::describe).collect();
        warn!(
            project_id = %project_id,
            tried = %tried.join(" "),
            error = %last_error.map(|e| e.to_string()).unwrap_or_default(),
            "Failed to attach resource link"
        );

        if self.issue_fallback {
            return self.record_in_issue(project_id, link).await;
        }
        LinkOutcome::Failed
    }

    /// Append the link as a markdown line to the project's Resources issue.
    async fn record_in_issue(&self, project_id: &str, link: &ResourceLink) -> LinkOutcome {
        let line = format!("- [{}]({})", link.label, link.url);

        let issues = match self.dir.list_issues(project_id).await {
            Ok(issues) => issues,
            Err(e) => {
                warn!(project_id = %project_id, error = %e, "Failed to list issues for Resources fallback");
                return LinkOutcome::Failed;
            }
        };

        let Some(issue) = issues.into_iter().find(|i| i.title == RESOURCES_ISSUE_TITLE) else {
            let draft = IssueDraft {
                project_id: project_id.to_string(),
                team_id: self.team_id.to_string(),
                title: RESOURCES_ISSUE_TITLE.to_string(),
                description: line,
                assignee_id: None,
                priority: 0,
                label_ids: Vec::new(),
            };
            return match self.dir.create_issue(&draft).await {
                Ok(_) => {
                    info!(project_id = %project_id, "Recorded link in new Resources issue");
                    LinkOutcome::RecordedInIssue
                }
                Err(e) => {
                    warn!(project_id = %project_id, error = %e, "Failed to create Resources issue");
                    LinkOutcome::Failed
                }
            };
        };

        let description = match self.dir.issue_description(&issue.id).await {
            Ok(text) => text,
            Err(e) => {
                warn!(issue_id = %issue.id, error = %e, "Failed to read Resources issue");
                return LinkOutcome::Failed;
            }
        };
        if description.lines().any(|l| l.trim() == line) {
            return LinkOutcome::RecordedInIssue;
        }

        let updated = if description.trim().is_empty() {
            line
        } else {
            format!("{}\n{line}", description.trim_end())
        };
        match self.dir.update_description(&issue.id, &updated).await {
            Ok(()) => {
                info!(issue_id = %issue.id, "Recorded link in Resources issue");
                LinkOutcome::RecordedInIssue
            }
            Err(e) => {
                warn!(issue_id = %issue.id, error = %e, "Failed to update Resources issue");
                LinkOutcome::Failed
            }
        }
    }
}
