//! Per-stage and whole-run outcome types.
//!
//! Every fan-out stage reports both its successes and its failures; an
//! instance that fails a stage is excluded from later stages but never
//! silently dropped from the report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Instance, VolumeMapping};

/// The stage at which a per-instance or per-volume failure happened.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Audit,
    Resize,
    Grow,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Audit => write!(f, "audit"),
            Self::Resize => write!(f, "resize"),
            Self::Grow => write!(f, "grow"),
        }
    }
}

/// One recorded failure: the subject (instance or volume id), the stage it
/// failed at, and the rendered reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageFailure {
    pub subject: String,
    pub stage: Stage,
    pub reason: String,
}

impl StageFailure {
    #[must_use]
    pub fn new(stage: Stage, subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { subject: subject.into(), stage, reason: reason.into() }
    }
}

/// An instance whose root filesystem usage exceeded the threshold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlaggedInstance {
    pub instance: Instance,
    pub usage_percent: u8,
}

/// Outcome of the audit stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditReport {
    /// Number of instances scheduled for probing.
    pub audited: usize,
    /// Instances over the threshold, sorted by instance id.
    pub flagged: Vec<FlaggedInstance>,
    /// Instances whose probe failed or timed out; excluded from `flagged`.
    pub failures: Vec<StageFailure>,
}

/// Outcome of the volume-resize stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResizeOutcome {
    /// Volumes the provider applied a resize for, paired with their owners.
    pub mappings: Vec<VolumeMapping>,
    /// Volumes that failed to resize or whose modification never applied.
    pub failures: Vec<StageFailure>,
}

/// One filesystem successfully grown on a target instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrownInstance {
    pub instance_id: String,
    pub volume_id: String,
    /// Private address echoed back by the grow operation.
    pub confirmed_ip: String,
}

/// Outcome of the filesystem-grow stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrowReport {
    pub grown: Vec<GrownInstance>,
    pub failures: Vec<StageFailure>,
}

/// Everything one orchestration run produced, across all stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    /// `"check"` or `"expand"`.
    pub mode: String,
    pub threshold_percent: u8,
    pub increment_percent: u32,
    pub audit: AuditReport,
    /// Whether the operator confirmed expansion (always false in check mode).
    pub confirmed: bool,
    pub resized: Vec<VolumeMapping>,
    pub grown: Vec<GrownInstance>,
    /// Failures from the resize and grow stages.
    pub failures: Vec<StageFailure>,
}

impl RunReport {
    /// A report for a run that stopped after the audit stage.
    #[must_use]
    pub fn audit_only(
        mode: &str,
        threshold_percent: u8,
        increment_percent: u32,
        audit: AuditReport,
    ) -> Self {
        Self {
            started_at: Utc::now(),
            mode: mode.to_string(),
            threshold_percent,
            increment_percent,
            audit,
            confirmed: false,
            resized: Vec::new(),
            grown: Vec::new(),
            failures: Vec::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failure_round_trips_through_json() {
        let failure = StageFailure::new(Stage::Resize, "vol-1", "modify rejected");
        let json = serde_json::to_string(&failure).expect("serialize");
        let back: StageFailure = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, failure);
        assert!(json.contains("\"resize\""));
    }

    #[test]
    fn test_audit_only_report_has_no_downstream_results() {
        let report = RunReport::audit_only("check", 80, 30, AuditReport::default());
        assert!(!report.confirmed);
        assert!(report.resized.is_empty());
        assert!(report.grown.is_empty());
        assert!(report.failures.is_empty());
    }
}
