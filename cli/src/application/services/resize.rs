//! Application service — block-volume resize through the cloud control plane.
//!
//! Resolves the attached volumes of flagged instances with chunked lookups,
//! requests the size change, and polls the provider until each modification
//! is applied. Per-volume failures accumulate and never stop siblings; only
//! a failure to list volumes at all is fatal to the stage.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::{Context, Result};
use swell_common::{
    AttachedVolume, Instance, ResizeOutcome, Stage, StageFailure, VolumeMapping, grown_size,
};

use crate::application::ports::{CloudApi, VolumeModState};
use crate::domain::VolumeError;

/// The provider caps filter values per describe call; lookups are chunked
/// at this documented limit.
pub const FILTER_VALUES_PER_CALL: usize = 199;

/// Fixed interval between modification-status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Percentage added to each volume's current size.
pub const DEFAULT_INCREMENT: u32 = 30;

/// How long one volume's modification may stay unapplied before the wait is
/// abandoned.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct ResizeOptions {
    pub increment_percent: u32,
    pub poll_interval: Duration,
    pub wait_timeout: Duration,
}

impl Default for ResizeOptions {
    fn default() -> Self {
        Self {
            increment_percent: DEFAULT_INCREMENT,
            poll_interval: POLL_INTERVAL,
            wait_timeout: WAIT_TIMEOUT,
        }
    }
}

/// Grow the attached volume of every flagged instance by the configured
/// increment.
///
/// # Errors
///
/// Returns an error only when the volume inventory itself cannot be listed
/// or described; per-volume failures are recorded in the outcome instead.
pub async fn resize_volumes<C: CloudApi>(
    cloud: &C,
    instances: &[Instance],
    flagged: &[Instance],
    opts: &ResizeOptions,
) -> Result<ResizeOutcome> {
    let by_id: HashMap<&str, &Instance> = instances.iter().map(|i| (i.id.as_str(), i)).collect();
    let flagged_ids: HashSet<&str> = flagged.iter().map(|i| i.id.as_str()).collect();

    let all_ids = cloud.all_volume_ids().await.context("listing volumes")?;
    let mut volumes: Vec<AttachedVolume> = Vec::new();
    for chunk in all_ids.chunks(FILTER_VALUES_PER_CALL) {
        let described = cloud.attached_volumes(chunk).await.context("describing volumes")?;
        volumes
            .extend(described.into_iter().filter(|v| flagged_ids.contains(v.instance_id.as_str())));
    }
    // One volume per instance; the first attachment is the root device.
    let mut seen = HashSet::new();
    volumes.retain(|v| seen.insert(v.instance_id.clone()));

    let mut outcome = ResizeOutcome::default();
    for mut volume in volumes {
        let new_size = grown_size(volume.size_gib, opts.increment_percent);
        if let Err(err) = cloud.resize_volume(&volume.id, new_size).await {
            let err =
                VolumeError::Modify { volume_id: volume.id.clone(), reason: format!("{err:#}") };
            tracing::warn!(volume = %volume.id, error = %err, "volume resize failed");
            outcome.failures.push(StageFailure::new(Stage::Resize, &volume.id, err.to_string()));
            continue;
        }
        if let Err(err) = wait_until_applied(cloud, &volume.id, opts).await {
            tracing::warn!(volume = %volume.id, error = %err, "volume modification never applied");
            outcome.failures.push(StageFailure::new(Stage::Resize, &volume.id, err.to_string()));
            continue;
        }
        volume.new_size_gib = Some(new_size);
        let Some(instance) = by_id.get(volume.instance_id.as_str()) else {
            outcome.failures.push(StageFailure::new(
                Stage::Resize,
                &volume.id,
                format!("owning instance {} is not part of this run", volume.instance_id),
            ));
            continue;
        };
        outcome.mappings.push(VolumeMapping { instance: (*instance).clone(), volume });
    }
    Ok(outcome)
}

/// Poll the modification state at a fixed interval until the change is
/// applied, the provider reports failure, or the wait ceiling expires.
async fn wait_until_applied<C: CloudApi>(
    cloud: &C,
    volume_id: &str,
    opts: &ResizeOptions,
) -> Result<(), VolumeError> {
    let poll = async {
        loop {
            tokio::time::sleep(opts.poll_interval).await;
            let state = cloud.modification_state(volume_id).await.map_err(|err| {
                VolumeError::Wait { volume_id: volume_id.to_string(), reason: format!("{err:#}") }
            })?;
            match state {
                VolumeModState::Failed => {
                    return Err(VolumeError::Wait {
                        volume_id: volume_id.to_string(),
                        reason: "provider reported the modification as failed".to_string(),
                    });
                }
                state if state.is_applied() => return Ok(()),
                _ => {}
            }
        }
    };
    match tokio::time::timeout(opts.wait_timeout, poll).await {
        Ok(result) => result,
        Err(_) => Err(VolumeError::Cancelled { volume_id: volume_id.to_string() }),
    }
}
