//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and `swell_common` — never
//! from `crate::infra`, `crate::commands`, or `crate::output`.

use std::future::Future;

use anyhow::Result;
use swell_common::{AttachedVolume, Instance, UsageSample};

use crate::domain::UnitError;

// ── Cloud control plane ───────────────────────────────────────────────────────

/// Provider-reported state of an in-flight volume modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeModState {
    Modifying,
    Optimizing,
    Completed,
    Failed,
    /// No modification record, or a state this crate does not track.
    Unknown,
}

impl VolumeModState {
    /// True once the size change has been applied and the volume is usable
    /// at its new capacity (the provider keeps optimizing in the background).
    #[must_use]
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Optimizing | Self::Completed)
    }
}

/// Cloud control-plane operations consumed by the core: batched, paginated
/// and polled exactly as the provider's API shape demands. The core never
/// sees SDK types.
#[allow(async_fn_in_trait)]
pub trait CloudApi: Send + Sync {
    /// All running instances, fully paginated. `Name` and `Server-Group`
    /// tags map onto the instance's `name` and `group` fields.
    async fn running_instances(&self) -> Result<Vec<Instance>>;

    /// Every volume id visible to the session, fully paginated.
    async fn all_volume_ids(&self) -> Result<Vec<String>>;

    /// Attached volumes for the given ids. Callers are responsible for
    /// chunking `volume_ids` at the provider's filter-values-per-call limit.
    async fn attached_volumes(&self, volume_ids: &[String]) -> Result<Vec<AttachedVolume>>;

    /// Request a resize of one volume to `new_size_gib`.
    async fn resize_volume(&self, volume_id: &str, new_size_gib: i64) -> Result<()>;

    /// Current modification state of one volume.
    async fn modification_state(&self, volume_id: &str) -> Result<VolumeModState>;
}

// ── Remote fleet access ───────────────────────────────────────────────────────

/// Remote disk operations against a single fleet instance, reached through
/// the bastion hop. Implemented by the SSH stack; faked in tests.
///
/// Methods are declared as `impl Future + Send` (rather than `async fn`)
/// because the audit and grow stages spawn them onto worker tasks;
/// implementations still write plain `async fn`.
pub trait FleetConnector: Send + Sync {
    /// Root filesystem usage of `instance` as a validated sample in
    /// 0..=100. Out-of-range or non-numeric probe output is an error.
    fn disk_usage(
        &self,
        instance: &Instance,
    ) -> impl Future<Output = Result<UsageSample, UnitError>> + Send;

    /// Detect the filesystem on `volume`'s device and grow partition and
    /// filesystem in place. Returns the instance's private address as
    /// acknowledgement.
    fn grow_filesystem(
        &self,
        instance: &Instance,
        volume: &AttachedVolume,
    ) -> impl Future<Output = Result<String, UnitError>> + Send;
}

// ── Progress Reporting ────────────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait — no async needed.
#[cfg_attr(test, mockall::automock)]
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
