//! Phase ordering: inference from template relations and application to an
//! order's projects.

use std::collections::{HashMap, HashSet};

use linear::RelationSide;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::PhaseConfig;
use crate::directory::{Directory, RelationDraft, RemoteRelation};
use crate::templates::TemplateCatalog;

/// End of `predecessor` anchors the start of `successor`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DependencyEdge {
    pub predecessor: String,
    pub successor: String,
}

impl DependencyEdge {
    pub fn new(predecessor: impl Into<String>, successor: impl Into<String>) -> Self {
        Self {
            predecessor: predecessor.into(),
            successor: successor.into(),
        }
    }
}

/// Relation types that carry an ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Dependency,
    Blocks,
    BlockedBy,
}

impl RelationKind {
    /// `None` for relation types without an ordering (e.g. `related`)
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "dependency" => Some(Self::Dependency),
            "blocks" => Some(Self::Blocks),
            "blockedBy" => Some(Self::BlockedBy),
            _ => None,
        }
    }
}

/// Where the edges of a run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSource {
    Inherited,
    DefaultChain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredEdges {
    pub edges: Vec<DependencyEdge>,
    pub source: EdgeSource,
}

/// Normalize relations declared between template projects into phase edges.
///
/// `phase_of` maps template project IDs to phase names. Relations touching any
/// other project, self-relations and unordered relation types are dropped.
/// The result keeps first-seen order without duplicates.
pub fn edges_from_relations<'a>(
    relations: impl IntoIterator<Item = &'a RemoteRelation>,
    phase_of: &HashMap<String, String>,
) -> Vec<DependencyEdge> {
    let mut seen = HashSet::new();
    let mut edges = Vec::new();

    for relation in relations {
        let Some(kind) = RelationKind::parse(&relation.kind) else {
            continue;
        };
        let (Some(from), Some(to)) = (
            phase_of.get(&relation.project_id),
            phase_of.get(&relation.related_id),
        ) else {
            continue;
        };

        let edge = match kind {
            RelationKind::Dependency | RelationKind::Blocks => DependencyEdge::new(from, to),
            RelationKind::BlockedBy => DependencyEdge::new(to, from),
        };
        if edge.predecessor == edge.successor {
            continue;
        }
        if seen.insert(edge.clone()) {
            edges.push(edge);
        }
    }

    edges
}

/// Each phase depends on the one before it.
pub fn default_chain(phases: &[PhaseConfig]) -> Vec<DependencyEdge> {
    phases
        .windows(2)
        .map(|pair| DependencyEdge::new(&pair[0].name, &pair[1].name))
        .collect()
}

/// Work out the phase edges for this run.
///
/// Reads both relation directions of every template project; a direction that
/// cannot be read is skipped. Falls back to [`default_chain`] when nothing
/// usable is found or inheritance is disabled.
pub async fn infer_edges(
    dir: &dyn Directory,
    catalog: &TemplateCatalog,
    phases: &[PhaseConfig],
    inherit: bool,
) -> InferredEdges {
    if inherit {
        let phase_of: HashMap<String, String> = catalog
            .sources()
            .iter()
            .map(|s| (s.project_id.clone(), s.phase.clone()))
            .collect();

        let mut relations = Vec::new();
        for source in catalog.sources() {
            for side in [RelationSide::Outgoing, RelationSide::Incoming] {
                match dir.list_relations(&source.project_id, side).await {
                    Ok(found) => relations.extend(found),
                    Err(e) => debug!(
                        template = %source.project_name,
                        side = side.field_name(),
                        error = %e,
                        "Could not read template relations"
                    ),
                }
            }
        }

        let edges = edges_from_relations(&relations, &phase_of);
        if !edges.is_empty() {
            info!(count = edges.len(), "Inherited phase dependencies from templates");
            return InferredEdges {
                edges,
                source: EdgeSource::Inherited,
            };
        }
    }

    let edges = default_chain(phases);
    info!(count = edges.len(), "Using default phase chain");
    InferredEdges {
        edges,
        source: EdgeSource::DefaultChain,
    }
}

/// Counters for one order's relation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelationStats {
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Create a dependency relation for every edge whose phases both resolved.
///
/// `projects` maps phase names to the order's project IDs. Relations already
/// present on the predecessor are left alone.
pub async fn apply_relations(
    dir: &dyn Directory,
    edges: &[DependencyEdge],
    projects: &HashMap<String, String>,
) -> RelationStats {
    let mut stats = RelationStats::default();

    for edge in edges {
        let (Some(from), Some(to)) = (
            projects.get(&edge.predecessor),
            projects.get(&edge.successor),
        ) else {
            continue;
        };

        let existing = match dir.list_relations(from, RelationSide::Outgoing).await {
            Ok(relations) => relations,
            Err(e) => {
                debug!(project_id = %from, error = %e, "Could not read existing relations");
                Vec::new()
            }
        };
        if existing.iter().any(|r| r.related_id == *to) {
            debug!(from = %edge.predecessor, to = %edge.successor, "Relation already present");
            stats.skipped += 1;
            continue;
        }

        let draft = RelationDraft {
            predecessor_id: from.clone(),
            successor_id: to.clone(),
        };
        match dir.create_relation(&draft).await {
            Ok(()) => {
                info!(from = %edge.predecessor, to = %edge.successor, "Linked phases");
                stats.created += 1;
            }
            Err(e) => {
                warn!(from = %edge.predecessor, to = %edge.successor, error = %e, "Failed to create relation");
                stats.failed += 1;
            }
        }
    }

    stats
}
