//! Job runner: provisions every configured sales order.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{JobConfig, SalesOrder};
use crate::directory::Directory;
use crate::error::ProvisionResult;
use crate::issues::IssueCloner;
use crate::links::{LinkOutcome, ResourceLink, ResourceLinkApplier};
use crate::projects::{OrderProjects, ProjectReconciler};
use crate::relations::{apply_relations, infer_edges, DependencyEdge, EdgeSource, RelationStats};
use crate::schedule::{PhaseWindow, Schedule};
use crate::templates::TemplateCatalog;

/// What happened to one sales order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderReport {
    pub order: String,
    pub projects_created: usize,
    pub projects_existing: usize,
    pub projects_failed: usize,
    pub issues_created: usize,
    pub issues_existing: usize,
    pub issues_failed: usize,
    /// Projects whose issues could not be listed, so none were cloned
    pub clone_skipped: usize,
    pub relations: RelationStats,
    pub links: Vec<LinkOutcome>,
}

impl OrderReport {
    fn new(order: &str) -> Self {
        Self {
            order: order.to_string(),
            ..Self::default()
        }
    }
}

/// Result of a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub edge_source: EdgeSource,
    pub edges: Vec<DependencyEdge>,
    pub orders: Vec<OrderReport>,
}

impl RunReport {
    pub fn projects_created(&self) -> usize {
        self.orders.iter().map(|o| o.projects_created).sum()
    }

    pub fn issues_created(&self) -> usize {
        self.orders.iter().map(|o| o.issues_created).sum()
    }

    /// Count of entities that failed and were skipped
    pub fn failures(&self) -> usize {
        self.orders
            .iter()
            .map(|o| {
                o.projects_failed
                    + o.issues_failed
                    + o.clone_skipped
                    + o.relations.failed
                    + o.links.iter().filter(|l| **l == LinkOutcome::Failed).count()
            })
            .sum()
    }
}

/// Provisions phase-projects, issues, relations and links for a job.
pub struct Provisioner<'a> {
    dir: &'a dyn Directory,
    config: &'a JobConfig,
    team_id: &'a str,
    base_date: NaiveDate,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        dir: &'a dyn Directory,
        config: &'a JobConfig,
        team_id: &'a str,
        base_date: NaiveDate,
    ) -> Self {
        Self {
            dir,
            config,
            team_id,
            base_date,
        }
    }

    /// Windows of every configured order, by position.
    pub fn plan(&self) -> ProvisionResult<Vec<(SalesOrder, Vec<PhaseWindow>)>> {
        plan(self.config, self.base_date)
    }

    /// Run the job.
    ///
    /// Only scheduling errors abort, and those are detected before anything
    /// is written. Every per-entity failure is logged, counted and skipped.
    pub async fn run(&self) -> ProvisionResult<RunReport> {
        let plan = self.plan()?;
        let lead = self.config.lead_id.as_deref();

        info!(
            orders = plan.len(),
            phases = self.config.phases.len(),
            base_date = %self.base_date,
            "Starting provisioning run"
        );

        let mut cloner = IssueCloner::new(self.dir, self.team_id, lead);
        cloner.warm_labels().await;

        let catalog = TemplateCatalog::load(self.dir, &self.config.phases).await;
        let inferred = infer_edges(
            self.dir,
            &catalog,
            &self.config.phases,
            self.config.inherit_relations,
        )
        .await;

        let reconciler = ProjectReconciler::new(self.dir, self.team_id, lead);
        let mut links =
            ResourceLinkApplier::new(self.dir, self.team_id, self.config.resources_issue_fallback);

        let mut orders = Vec::with_capacity(plan.len());
        for (order, windows) in &plan {
            info!(order = %order.id, "Provisioning sales order");
            let mut report = OrderReport::new(&order.id);

            let mut projects = OrderProjects::default();
            for phase in windows {
                match reconciler
                    .reconcile(&order.id, &phase.phase, phase.window)
                    .await
                {
                    Some(result) => {
                        if result.was_created() {
                            report.projects_created += 1;
                        } else {
                            report.projects_existing += 1;
                        }
                        projects.insert(&phase.phase, result.id());
                    }
                    None => report.projects_failed += 1,
                }
            }

            for (phase, project_id) in projects.iter() {
                let stats = cloner.clone_into(project_id, catalog.issues(phase)).await;
                report.issues_created += stats.created;
                report.issues_existing += stats.existing;
                report.issues_failed += stats.failed;
                if stats.skipped {
                    report.clone_skipped += 1;
                }
            }

            report.relations = apply_relations(self.dir, &inferred.edges, projects.by_phase()).await;

            if let Some(url) = &order.resource_link {
                let link = ResourceLink {
                    label: self.config.link_label.clone(),
                    url: url.clone(),
                };
                for (_, project_id) in projects.iter() {
                    report.links.push(links.attach(project_id, &link).await);
                }
            }

            log_order(&report);
            orders.push(report);
        }

        let report = RunReport {
            edge_source: inferred.source,
            edges: inferred.edges,
            orders,
        };
        info!(
            orders = report.orders.len(),
            projects_created = report.projects_created(),
            issues_created = report.issues_created(),
            labels_cached = cloner.labels().len(),
            failures = report.failures(),
            "Provisioning run complete"
        );
        Ok(report)
    }
}

/// Windows of every configured order, computed without touching the network.
pub fn plan(
    config: &JobConfig,
    base_date: NaiveDate,
) -> ProvisionResult<Vec<(SalesOrder, Vec<PhaseWindow>)>> {
    let schedule = Schedule::new(base_date, config.stagger_months, &config.phases);
    config
        .sales_orders
        .iter()
        .enumerate()
        .map(|(index, order)| Ok((order.clone(), schedule.windows(index)?)))
        .collect()
}

fn log_order(report: &OrderReport) {
    let links_failed = report
        .links
        .iter()
        .filter(|l| **l == LinkOutcome::Failed)
        .count();

    if report.projects_failed > 0 || report.issues_failed > 0 || links_failed > 0 {
        warn!(
            order = %report.order,
            projects_created = report.projects_created,
            projects_failed = report.projects_failed,
            issues_created = report.issues_created,
            issues_failed = report.issues_failed,
            relations_created = report.relations.created,
            links_failed,
            "Sales order provisioned with failures"
        );
    } else {
        info!(
            order = %report.order,
            projects_created = report.projects_created,
            projects_existing = report.projects_existing,
            issues_created = report.issues_created,
            issues_existing = report.issues_existing,
            relations_created = report.relations.created,
            links = report.links.len(),
            "Sales order provisioned"
        );
    }
}
