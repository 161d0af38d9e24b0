//! Job configuration and credentials.
//!
//! A job is described by a YAML file (sales orders, phases, stagger, lead)
//! while credentials always come from the environment or CLI flags.

use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ProvisionError, ProvisionResult};

/// Environment variable holding the Linear API key.
pub const API_KEY_VAR: &str = "LINEAR_API_KEY";

/// Environment variable holding the owning team ID.
pub const TEAM_ID_VAR: &str = "LINEAR_TEAM_ID";

/// A sales order to provision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrder {
    /// Opaque order identifier (e.g. `SO109616`)
    pub id: String,
    /// URL attached to every phase-project of this order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_link: Option<String>,
}

impl SalesOrder {
    /// Create an order without a resource link
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource_link: None,
        }
    }
}

/// A phase of the production pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Phase name, also the suffix of every phase-project name
    pub name: String,
    /// Duration in whole months
    pub months: u32,
    /// Exact name of the canonical template project
    pub template: String,
}

impl PhaseConfig {
    pub fn new(name: impl Into<String>, months: u32, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            months,
            template: template.into(),
        }
    }
}

/// Provisioning job configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Orders in provisioning order; position drives the stagger
    #[serde(default)]
    pub sales_orders: Vec<SalesOrder>,
    /// Ordered phase pipeline
    #[serde(default = "default_phases")]
    pub phases: Vec<PhaseConfig>,
    /// Months between successive orders' base dates
    #[serde(default = "default_stagger_months")]
    pub stagger_months: u32,
    /// Base date of the first order (defaults to today, UTC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_date: Option<NaiveDate>,
    /// Project lead and default issue assignee
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
    /// Label of the per-order resource link
    #[serde(default = "default_link_label")]
    pub link_label: String,
    /// Pause after every Linear call, in milliseconds
    #[serde(default = "default_call_delay_ms")]
    pub call_delay_ms: u64,
    /// Read phase ordering from relations between template projects
    #[serde(default = "default_true")]
    pub inherit_relations: bool,
    /// Record the resource link in a `Resources` issue when no link shape works
    #[serde(default)]
    pub resources_issue_fallback: bool,
}

fn default_phases() -> Vec<PhaseConfig> {
    vec![
        PhaseConfig::new("Sales", 2, "SO999999 Sales"),
        PhaseConfig::new("Material Planning", 1, "SO999999 Material Planning"),
        PhaseConfig::new("Production", 2, "SO999999 Production"),
        PhaseConfig::new("Quality Control", 1, "SO999999 Quality"),
        PhaseConfig::new("Shipping", 1, "SO999999 Shipping"),
    ]
}

const fn default_stagger_months() -> u32 {
    2
}

fn default_link_label() -> String {
    "Dynamics link".to_string()
}

const fn default_call_delay_ms() -> u64 {
    150
}

const fn default_true() -> bool {
    true
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            sales_orders: Vec::new(),
            phases: default_phases(),
            stagger_months: default_stagger_months(),
            base_date: None,
            lead_id: None,
            link_label: default_link_label(),
            call_delay_ms: default_call_delay_ms(),
            inherit_relations: true,
            resources_issue_fallback: false,
        }
    }
}

impl JobConfig {
    /// Load and validate a YAML job file.
    pub fn load(path: &Path) -> ProvisionResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| ProvisionError::ConfigRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_yaml(&raw)
    }

    /// Parse and validate a YAML job description.
    pub fn from_yaml(raw: &str) -> ProvisionResult<Self> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the engine relies on.
    pub fn validate(&self) -> ProvisionResult<()> {
        let mut names = HashSet::new();
        let mut templates = HashSet::new();
        for phase in &self.phases {
            if phase.name.trim().is_empty() {
                return Err(ProvisionError::InvalidConfig {
                    reason: "phase name must not be empty".to_string(),
                });
            }
            if !names.insert(phase.name.as_str()) {
                return Err(ProvisionError::InvalidConfig {
                    reason: format!("duplicate phase '{}'", phase.name),
                });
            }
            // Template names map back to phases during relation inference
            if !templates.insert(phase.template.as_str()) {
                return Err(ProvisionError::InvalidConfig {
                    reason: format!("template project '{}' used by two phases", phase.template),
                });
            }
        }

        let mut orders = HashSet::new();
        for order in &self.sales_orders {
            if !orders.insert(order.id.as_str()) {
                return Err(ProvisionError::InvalidConfig {
                    reason: format!("duplicate sales order '{}'", order.id),
                });
            }
        }

        Ok(())
    }

    /// Replace the configured orders with `ids`, keeping any resource link
    /// the file declares for an order of the same id.
    ///
    /// An empty `ids` keeps the configured orders.
    pub fn select_orders(&mut self, ids: &[String]) -> ProvisionResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        self.sales_orders = ids
            .iter()
            .map(|id| {
                self.sales_orders
                    .iter()
                    .find(|o| &o.id == id)
                    .cloned()
                    .unwrap_or_else(|| SalesOrder::new(id.clone()))
            })
            .collect();

        self.validate()
    }

    /// Fail when there is nothing to provision.
    pub fn require_orders(&self) -> ProvisionResult<()> {
        if self.sales_orders.is_empty() {
            return Err(ProvisionError::InvalidConfig {
                reason: "no sales orders configured (use --order or sales_orders)".to_string(),
            });
        }
        Ok(())
    }
}

/// Credentials for the Linear API.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub team_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("team_id", &self.team_id)
            .finish()
    }
}

impl Credentials {
    /// Build credentials, failing on the first missing value.
    pub fn resolve(api_key: Option<String>, team_id: Option<String>) -> ProvisionResult<Self> {
        Ok(Self {
            api_key: required(API_KEY_VAR, api_key)?,
            team_id: required(TEAM_ID_VAR, team_id)?,
        })
    }
}

/// Unwrap a credential, treating blank values as missing.
pub fn required(name: &'static str, value: Option<String>) -> ProvisionResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ProvisionError::MissingCredential { name })
}
