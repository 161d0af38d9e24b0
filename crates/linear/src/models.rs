//! Linear entity and input type definitions.

use serde::{Deserialize, Serialize};

/// Cursor information returned with every Linear connection
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Whether another page follows this one
    pub has_next_page: bool,
    /// Cursor to pass as `after` for the next page
    #[serde(default)]
    pub end_cursor: Option<String>,
}

/// A single page of a Linear connection
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    /// Nodes on this page
    pub nodes: Vec<T>,
    /// Paging cursor
    #[serde(default)]
    pub page_info: PageInfo,
}

/// Node list without paging info (nested connections such as issue labels)
#[derive(Debug, Clone, Deserialize)]
pub struct Nodes<T> {
    /// Nodes
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
}

impl<T> Default for Nodes<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

/// Linear project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Unique identifier
    pub id: String,
    /// Project name
    pub name: String,
    /// URL to the project
    #[serde(default)]
    pub url: Option<String>,
}

/// Linear label
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Label {
    /// Unique identifier
    pub id: String,
    /// Label name
    pub name: String,
}

/// Label reference as nested under an issue (name only)
#[derive(Debug, Clone, Deserialize)]
pub struct LabelName {
    /// Label name
    pub name: String,
}

/// Linear issue as listed inside a project
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Unique identifier
    pub id: String,
    /// Issue title
    pub title: String,
    /// Issue description (markdown)
    #[serde(default)]
    pub description: Option<String>,
    /// Labels attached to the issue
    #[serde(default)]
    pub labels: Nodes<LabelName>,
}

impl Issue {
    /// Names of the attached labels, in the order Linear returned them
    #[must_use]
    pub fn label_names(&self) -> Vec<String> {
        self.labels.nodes.iter().map(|l| l.name.clone()).collect()
    }
}

/// Name-only project reference used inside relations
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRef {
    /// Unique identifier
    pub id: String,
    /// Project name
    pub name: String,
}

/// Project relation as declared on one of its endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRelation {
    /// Relation type (`dependency`, or legacy `blocks` / `blockedBy`)
    #[serde(rename = "type")]
    pub relation_type: String,
    /// Project the relation is declared from
    pub project: ProjectRef,
    /// Project on the other end
    pub related_project: ProjectRef,
}

/// Which side of a project's relations to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationSide {
    /// Relations declared from this project (`relations`)
    Outgoing,
    /// Relations declared from the other project (`inverseRelations`)
    Incoming,
}

impl RelationSide {
    /// GraphQL field name on `Project`
    #[must_use]
    pub const fn field_name(self) -> &'static str {
        match self {
            Self::Outgoing => "relations",
            Self::Incoming => "inverseRelations",
        }
    }
}

/// External link attached to an entity (shows under a project's Resources)
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalLink {
    /// Unique identifier
    pub id: String,
    /// Link URL
    pub url: String,
    /// Link label
    #[serde(default)]
    pub label: Option<String>,
}

/// Input for creating a Linear project
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCreateInput {
    /// Project name
    pub name: String,
    /// Project description (Linear caps this at 255 characters)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Project state (e.g. `planned`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Priority (0 = none)
    pub priority: i32,
    /// Planned start date (`YYYY-MM-DD`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// Target completion date (`YYYY-MM-DD`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<String>,
    /// Lead user ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
    /// Team IDs to associate with the project
    pub team_ids: Vec<String>,
}

/// Input for creating an issue
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCreateInput {
    /// Team ID
    pub team_id: String,
    /// Issue title
    pub title: String,
    /// Issue description (markdown)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Project ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Assignee user ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    /// Priority (0 = none)
    pub priority: i32,
    /// Label IDs to apply
    pub label_ids: Vec<String>,
}

/// Input for creating a project relation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRelationCreateInput {
    /// Predecessor project ID
    pub project_id: String,
    /// Successor project ID
    pub related_project_id: String,
    /// Relation type
    #[serde(rename = "type")]
    pub relation_type: String,
    /// Anchor on the predecessor (`start` or `end`)
    pub anchor_type: String,
    /// Anchor on the successor (`start` or `end`)
    pub related_anchor_type: String,
}
