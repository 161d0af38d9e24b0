//! Error types for the provisioner crate.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that abort a whole provisioning run.
///
/// Per-entity failures (a project, issue, label, relation or link that could
/// not be created) are logged and skipped instead; they never surface here.
#[derive(Error, Debug, Clone)]
pub enum ProvisionError {
    // Startup errors
    #[error("{name} not set")]
    MissingCredential { name: &'static str },

    #[error("Failed to read config file '{path}': {reason}")]
    ConfigRead { path: String, reason: String },

    #[error("Failed to parse config: {reason}")]
    ConfigParse { reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Scheduling errors
    #[error("Date out of range: {base} + {months} months")]
    DateOutOfRange { base: NaiveDate, months: u64 },
}

impl From<serde_yaml::Error> for ProvisionError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::ConfigParse {
            reason: err.to_string(),
        }
    }
}

/// Result type alias for provisioning operations
pub type ProvisionResult<T> = Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_names_variable() {
        let err = ProvisionError::MissingCredential {
            name: "LINEAR_TEAM_ID",
        };
        assert_eq!(err.to_string(), "LINEAR_TEAM_ID not set");
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_err = serde_yaml::from_str::<Vec<String>>("{ not: a list").unwrap_err();
        let err: ProvisionError = yaml_err.into();
        assert!(matches!(err, ProvisionError::ConfigParse { .. }));
    }
}
