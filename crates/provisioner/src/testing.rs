//! In-memory directory used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use linear::{Label, RelationSide};

use crate::directory::{
    Directory, IssueDraft, LinkInput, ProjectDraft, RelationDraft, RemoteIssue, RemoteLink,
    RemoteRelation,
};

#[derive(Default)]
struct State {
    projects: Vec<(String, String)>,
    issues: HashMap<String, Vec<RemoteIssue>>,
    descriptions: HashMap<String, String>,
    labels: Vec<Label>,
    relations: Vec<RemoteRelation>,
    links: HashMap<String, Vec<RemoteLink>>,
    next_id: usize,

    // Recorded calls
    reads: usize,
    project_drafts: Vec<ProjectDraft>,
    issue_drafts: Vec<IssueDraft>,
    label_creates: Vec<String>,
    relation_drafts: Vec<RelationDraft>,
    link_attempts: Vec<LinkInput>,
    description_updates: Vec<(String, String)>,
    deletes: Vec<String>,
    archives: Vec<String>,

    // Failure injection
    failing_projects: HashSet<String>,
    failing_labels: HashSet<String>,
    failing_issue_lists: HashSet<String>,
    failing_relation_sides: HashSet<(String, bool)>,
    fail_relation_creates: bool,
    link_id_field: Option<String>,
    introspection: Option<Option<Vec<String>>>,
    refuse_delete: bool,
    refuse_archive: bool,
}

/// Shared-state fake of the remote directory.
#[derive(Clone, Default)]
pub struct FakeDirectory {
    state: Arc<Mutex<State>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        let fake = Self::default();
        // Accept the conventional link shape unless a test says otherwise
        fake.lock().link_id_field = Some("projectId".to_string());
        fake
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    // ---- seeding -----------------------------------------------------------

    pub fn add_project(&self, id: &str, name: &str) {
        self.lock()
            .projects
            .push((id.to_string(), name.to_string()));
    }

    pub fn add_issue(&self, project_id: &str, title: &str, description: &str, labels: &[&str]) {
        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("seed-issue-{}", state.next_id);
        state
            .issues
            .entry(project_id.to_string())
            .or_default()
            .push(RemoteIssue {
                id,
                title: title.to_string(),
                description: Some(description.to_string()).filter(|d| !d.is_empty()),
                labels: labels.iter().map(ToString::to_string).collect(),
            });
    }

    pub fn add_label(&self, id: &str, name: &str) {
        self.lock().labels.push(Label {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    /// Declare `kind` from project `from` to project `to` (both by ID).
    pub fn add_relation(&self, kind: &str, from: &str, to: &str) {
        let mut state = self.lock();
        let name_of = |id: &str| {
            state
                .projects
                .iter()
                .find(|(pid, _)| pid == id)
                .map(|(_, name)| name.clone())
                .unwrap_or_else(|| id.to_string())
        };
        let relation = RemoteRelation {
            kind: kind.to_string(),
            project_id: from.to_string(),
            project_name: name_of(from),
            related_id: to.to_string(),
            related_name: name_of(to),
        };
        state.relations.push(relation);
    }

    pub fn add_link(&self, project_id: &str, url: &str) {
        self.lock()
            .links
            .entry(project_id.to_string())
            .or_default()
            .push(RemoteLink {
                url: url.to_string(),
                label: None,
            });
    }

    // ---- failure injection ---------------------------------------------------

    pub fn fail_project(&self, name: &str) {
        self.lock().failing_projects.insert(name.to_string());
    }

    pub fn fail_label(&self, name: &str) {
        self.lock().failing_labels.insert(name.to_string());
    }

    pub fn fail_issue_listing(&self, project_id: &str) {
        self.lock()
            .failing_issue_lists
            .insert(project_id.to_string());
    }

    pub fn fail_relation_listing(&self, project_id: &str, side: RelationSide) {
        self.lock()
            .failing_relation_sides
            .insert((project_id.to_string(), side == RelationSide::Outgoing));
    }

    pub fn fail_relation_creates(&self) {
        self.lock().fail_relation_creates = true;
    }

    /// Only link inputs keyed by `field` are accepted; `None` rejects all.
    pub fn accept_link_id_field(&self, field: Option<&str>) {
        self.lock().link_id_field = field.map(ToString::to_string);
    }

    /// `None` makes introspection fail; `Some(None)` reports an unknown type.
    pub fn set_introspection(&self, result: Option<Option<Vec<&str>>>) {
        self.lock().introspection =
            result.map(|r| r.map(|fields| fields.iter().map(ToString::to_string).collect()));
    }

    pub fn refuse_delete(&self) {
        self.lock().refuse_delete = true;
    }

    pub fn refuse_archive(&self) {
        self.lock().refuse_archive = true;
    }

    // ---- inspection ----------------------------------------------------------

    pub fn read_count(&self) -> usize {
        self.lock().reads
    }

    pub fn mutation_count(&self) -> usize {
        let state = self.lock();
        state.project_drafts.len()
            + state.issue_drafts.len()
            + state.label_creates.len()
            + state.relation_drafts.len()
            + state.link_attempts.len()
            + state.description_updates.len()
            + state.deletes.len()
            + state.archives.len()
    }

    pub fn project_drafts(&self) -> Vec<ProjectDraft> {
        self.lock().project_drafts.clone()
    }

    pub fn issue_drafts(&self) -> Vec<IssueDraft> {
        self.lock().issue_drafts.clone()
    }

    pub fn label_creates(&self) -> Vec<String> {
        self.lock().label_creates.clone()
    }

    pub fn relation_drafts(&self) -> Vec<RelationDraft> {
        self.lock().relation_drafts.clone()
    }

    pub fn link_attempts(&self) -> Vec<LinkInput> {
        self.lock().link_attempts.clone()
    }

    pub fn description(&self, issue_id: &str) -> Option<String> {
        self.lock().descriptions.get(issue_id).cloned()
    }

    pub fn issues(&self, project_id: &str) -> Vec<RemoteIssue> {
        self.lock()
            .issues
            .get(project_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.lock().deletes.clone()
    }

    pub fn archives(&self) -> Vec<String> {
        self.lock().archives.clone()
    }
}

#[async_trait]
impl Directory for FakeDirectory {
    async fn find_project(&self, name: &str) -> Result<Option<String>> {
        let mut state = self.lock();
        state.reads += 1;
        Ok(state
            .projects
            .iter()
            .find(|(_, n)| n == name)
            .map(|(id, _)| id.clone()))
    }

    async fn list_issues(&self, project_id: &str) -> Result<Vec<RemoteIssue>> {
        let mut state = self.lock();
        state.reads += 1;
        if state.failing_issue_lists.contains(project_id) {
            return Err(anyhow!("issue listing failed for {project_id}"));
        }
        Ok(state.issues.get(project_id).cloned().unwrap_or_default())
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        let mut state = self.lock();
        state.reads += 1;
        Ok(state.labels.clone())
    }

    async fn list_relations(
        &self,
        project_id: &str,
        side: RelationSide,
    ) -> Result<Vec<RemoteRelation>> {
        let mut state = self.lock();
        state.reads += 1;
        let key = (project_id.to_string(), side == RelationSide::Outgoing);
        if state.failing_relation_sides.contains(&key) {
            return Err(anyhow!("relations unsupported"));
        }
        Ok(state
            .relations
            .iter()
            .filter(|r| match side {
                RelationSide::Outgoing => r.project_id == project_id,
                RelationSide::Incoming => r.related_id == project_id,
            })
            .cloned()
            .collect())
    }

    async fn list_links(&self, project_id: &str) -> Result<Vec<RemoteLink>> {
        let mut state = self.lock();
        state.reads += 1;
        Ok(state.links.get(project_id).cloned().unwrap_or_default())
    }

    async fn introspect_input_fields(&self, _type_name: &str) -> Result<Option<Vec<String>>> {
        let mut state = self.lock();
        state.reads += 1;
        state
            .introspection
            .clone()
            .ok_or_else(|| anyhow!("introspection disabled"))
    }

    async fn issue_description(&self, issue_id: &str) -> Result<String> {
        let mut state = self.lock();
        state.reads += 1;
        Ok(state.descriptions.get(issue_id).cloned().unwrap_or_default())
    }

    async fn create_project(&self, draft: &ProjectDraft) -> Result<String> {
        let mut state = self.lock();
        state.project_drafts.push(draft.clone());
        if state.failing_projects.contains(&draft.name) {
            return Err(anyhow!("project create rejected"));
        }
        state.next_id += 1;
        let id = format!("project-{}", state.next_id);
        state.projects.push((id.clone(), draft.name.clone()));
        Ok(id)
    }

    async fn create_issue(&self, draft: &IssueDraft) -> Result<String> {
        let mut state = self.lock();
        state.issue_drafts.push(draft.clone());
        state.next_id += 1;
        let id = format!("issue-{}", state.next_id);
        state
            .issues
            .entry(draft.project_id.clone())
            .or_default()
            .push(RemoteIssue {
                id: id.clone(),
                title: draft.title.clone(),
                description: Some(draft.description.clone()),
                labels: Vec::new(),
            });
        state.descriptions.insert(id.clone(), draft.description.clone());
        Ok(id)
    }

    async fn create_label(&self, name: &str) -> Result<Label> {
        let mut state = self.lock();
        state.label_creates.push(name.to_string());
        if state.failing_labels.contains(name) {
            return Err(anyhow!("label create rejected"));
        }
        state.next_id += 1;
        let label = Label {
            id: format!("label-{}", state.next_id),
            name: name.to_string(),
        };
        state.labels.push(label.clone());
        Ok(label)
    }

    async fn update_description(&self, issue_id: &str, text: &str) -> Result<()> {
        let mut state = self.lock();
        state
            .description_updates
            .push((issue_id.to_string(), text.to_string()));
        state
            .descriptions
            .insert(issue_id.to_string(), text.to_string());
        Ok(())
    }

    async fn create_relation(&self, draft: &RelationDraft) -> Result<()> {
        let fail = {
            let mut state = self.lock();
            state.relation_drafts.push(draft.clone());
            state.fail_relation_creates
        };
        if fail {
            return Err(anyhow!("relation create rejected"));
        }
        self.add_relation("dependency", &draft.predecessor_id, &draft.successor_id);
        Ok(())
    }

    async fn create_external_link(&self, input: &LinkInput) -> Result<()> {
        let mut state = self.lock();
        state.link_attempts.push(input.clone());
        let accepted = state
            .link_id_field
            .as_ref()
            .and_then(|field| input.get(field))
            .and_then(|v| v.as_str())
            .map(ToString::to_string);
        let Some(project_id) = accepted else {
            return Err(anyhow!("Argument Validation Error"));
        };
        let url = input
            .get("url")
            .or_else(|| input.get("link"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        state
            .links
            .entry(project_id)
            .or_default()
            .push(RemoteLink { url, label: None });
        Ok(())
    }

    async fn delete_project(&self, project_id: &str) -> Result<bool> {
        let mut state = self.lock();
        state.deletes.push(project_id.to_string());
        if state.refuse_delete {
            return Ok(false);
        }
        state.projects.retain(|(id, _)| id != project_id);
        Ok(true)
    }

    async fn archive_project(&self, project_id: &str) -> Result<bool> {
        let mut state = self.lock();
        state.archives.push(project_id.to_string());
        if state.refuse_archive {
            return Err(anyhow!("archive rejected"));
        }
        state.projects.retain(|(id, _)| id != project_id);
        Ok(true)
    }
}
