//! Template catalog loaded once per run.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::PhaseConfig;
use crate::directory::Directory;

/// Issue content copied into every order's phase-project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateIssue {
    pub title: String,
    /// Empty when the template has no description
    pub description: String,
    pub labels: Vec<String>,
}

/// Template project resolved for a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSource {
    pub phase: String,
    pub project_name: String,
    pub project_id: String,
}

/// Template issues per phase, plus the source projects they came from.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    issues: HashMap<String, Vec<TemplateIssue>>,
    sources: Vec<TemplateSource>,
}

impl TemplateCatalog {
    /// Read the template issues of every phase.
    ///
    /// A missing template project or a failed fetch leaves that phase without
    /// templates; it never fails the run.
    pub async fn load(dir: &dyn Directory, phases: &[PhaseConfig]) -> Self {
        let mut catalog = Self::default();

        for phase in phases {
            let project_id = match dir.find_project(&phase.template).await {
                Ok(Some(id)) => id,
                Ok(None) => {
                    warn!(phase = %phase.name, template = %phase.template, "Template project not found");
                    continue;
                }
                Err(e) => {
                    warn!(phase = %phase.name, template = %phase.template, error = %e, "Template project lookup failed");
                    continue;
                }
            };

            catalog.sources.push(TemplateSource {
                phase: phase.name.clone(),
                project_name: phase.template.clone(),
                project_id: project_id.clone(),
            });

            match dir.list_issues(&project_id).await {
                Ok(issues) => {
                    let templates: Vec<_> = issues
                        .into_iter()
                        .map(|issue| TemplateIssue {
                            title: issue.title,
                            description: issue.description.unwrap_or_default(),
                            labels: issue.labels,
                        })
                        .collect();
                    info!(phase = %phase.name, count = templates.len(), "Loaded template issues");
                    catalog.issues.insert(phase.name.clone(), templates);
                }
                Err(e) => {
                    warn!(phase = %phase.name, error = %e, "Failed to fetch template issues");
                }
            }
        }

        catalog
    }

    /// Template issues of `phase`, in source order
    pub fn issues(&self, phase: &str) -> &[TemplateIssue] {
        self.issues.get(phase).map(Vec::as_slice).unwrap_or_default()
    }

    /// Template projects that were found, in phase order
    pub fn sources(&self) -> &[TemplateSource] {
        &self.sources
    }
}
