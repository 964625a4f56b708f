//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, or any SDK crate. All error types
//! implement `thiserror::Error` and convert to `anyhow::Error` via the `?`
//! operator.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

// ── Per-unit errors ───────────────────────────────────────────────────────────

/// Failure of one unit of per-instance work (key resolution, dial, tunnel,
/// remote command). A unit error excludes its instance from later stages and
/// never aborts the batch it ran in.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("ssh key not found at {}", path.display())]
    KeyMissing { path: PathBuf },

    #[error("unusable ssh key {}: {reason}", path.display())]
    KeyUnusable { path: PathBuf, reason: String },

    #[error("dialing {host} failed after {attempts} attempts: {reason}")]
    Dial { host: String, attempts: u32, reason: String },

    /// Handshake and authentication failures are configuration errors and
    /// are never retried.
    #[error("ssh handshake with {host} failed: {reason}")]
    Handshake { host: String, reason: String },

    #[error("publickey authentication rejected by {host}")]
    AuthRejected { host: String },

    #[error("ssh session error: {0}")]
    Session(String),

    #[error("remote command exited with status {status}")]
    CommandFailed { status: u32 },

    #[error("unparseable probe output {output:?}")]
    UnparseableOutput { output: String },

    #[error(transparent)]
    UsageOutOfRange(#[from] swell_common::UsageOutOfRange),

    /// The unit exceeded its own deadline. Distinct from [`UnitError::Cancelled`].
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The governing stage was cancelled from above. Distinct from a unit
    /// that ran out its own deadline.
    #[error("operation cancelled")]
    Cancelled,
}

impl UnitError {
    /// True for deadline expiry of the unit itself.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

// ── Per-volume cloud errors ───────────────────────────────────────────────────

/// Failure to resize or wait on a single volume. Accumulated by the resize
/// stage; never fatal to sibling volumes.
#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("modify volume {volume_id}: {reason}")]
    Modify { volume_id: String, reason: String },

    #[error("waiting for volume {volume_id}: {reason}")]
    Wait { volume_id: String, reason: String },

    #[error("cancelled while waiting for volume {volume_id}")]
    Cancelled { volume_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_distinguishable_from_cancellation() {
        assert!(UnitError::Timeout(Duration::from_secs(10)).is_timeout());
        assert!(!UnitError::Cancelled.is_timeout());
    }

    #[test]
    fn test_dial_error_reports_attempts() {
        let err = UnitError::Dial {
            host: "10.0.0.7".to_string(),
            attempts: 3,
            reason: "connection refused".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("10.0.0.7"));
        assert!(rendered.contains("3 attempts"));
    }
}
