//! Application service — filesystem growth on successfully resized instances.
//!
//! Same fan-out discipline as the audit stage: bounded concurrency, a hard
//! per-unit deadline, per-instance failure isolation, and a full join before
//! returning.

use std::sync::Arc;
use std::time::Duration;

use swell_common::{GrowReport, GrownInstance, Stage, StageFailure, VolumeMapping};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::application::ports::FleetConnector;
use crate::application::services::audit::MAX_IN_FLIGHT;
use crate::domain::UnitError;
use crate::retry::{UNIT_TIMEOUT, with_deadline};

#[derive(Debug, Clone)]
pub struct GrowOptions {
    pub max_in_flight: usize,
    pub unit_timeout: Duration,
}

impl Default for GrowOptions {
    fn default() -> Self {
        Self { max_in_flight: MAX_IN_FLIGHT, unit_timeout: UNIT_TIMEOUT }
    }
}

/// Grow the filesystem behind every resized volume. Only mappings produced
/// by a completed resize are eligible; a failure here is recorded against
/// its instance and never affects siblings.
pub async fn grow_filesystems<C>(
    connector: &Arc<C>,
    mappings: Vec<VolumeMapping>,
    opts: &GrowOptions,
) -> GrowReport
where
    C: FleetConnector + 'static,
{
    let semaphore = Arc::new(Semaphore::new(opts.max_in_flight));
    let mut units: JoinSet<(VolumeMapping, Result<String, UnitError>)> = JoinSet::new();

    for mapping in mappings {
        let connector = Arc::clone(connector);
        let semaphore = Arc::clone(&semaphore);
        let unit_timeout = opts.unit_timeout;
        units.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (mapping, Err(UnitError::Cancelled));
            };
            let confirmed = with_deadline(
                unit_timeout,
                connector.grow_filesystem(&mapping.instance, &mapping.volume),
            )
            .await;
            (mapping, confirmed)
        });
    }

    let mut report = GrowReport::default();
    while let Some(joined) = units.join_next().await {
        match joined {
            Ok((mapping, Ok(confirmed_ip))) => {
                tracing::debug!(instance = %mapping.instance.id, "filesystem grown");
                report.grown.push(GrownInstance {
                    instance_id: mapping.instance.id,
                    volume_id: mapping.volume.id,
                    confirmed_ip,
                });
            }
            Ok((mapping, Err(err))) => {
                tracing::warn!(instance = %mapping.instance.id, error = %err, "filesystem grow failed");
                report.failures.push(StageFailure::new(
                    Stage::Grow,
                    mapping.instance.id,
                    err.to_string(),
                ));
            }
            Err(join_err) => {
                tracing::error!(error = %join_err, "grow unit panicked");
                report.failures.push(StageFailure::new(Stage::Grow, "unknown", join_err.to_string()));
            }
        }
    }

    report.grown.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
    report.failures.sort_by(|a, b| a.subject.cmp(&b.subject));
    report
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::application::services::test_support::{CannedConnector, instance, volume};

    fn mapping(id: &str, vol: &str) -> VolumeMapping {
        VolumeMapping { instance: instance(id, "fleet"), volume: volume(vol, id, 130) }
    }

    #[tokio::test]
    async fn test_grow_confirms_with_the_private_address() {
        let connector = Arc::new(CannedConnector::new());
        let mappings = vec![mapping("i-a", "vol-a")];
        let expected_ip = mappings[0].instance.private_ip.clone();
        let report = grow_filesystems(&connector, mappings, &GrowOptions::default()).await;

        assert_eq!(report.grown.len(), 1);
        assert_eq!(report.grown[0].confirmed_ip, expected_ip);
        assert_eq!(report.grown[0].volume_id, "vol-a");
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_grow_failure_is_isolated_to_its_instance() {
        let connector = Arc::new(CannedConnector::new().grow_failing("i-bad", "growpart exited 2"));
        let mappings = vec![mapping("i-bad", "vol-bad"), mapping("i-ok", "vol-ok")];
        let report = grow_filesystems(&connector, mappings, &GrowOptions::default()).await;

        assert_eq!(report.grown.len(), 1);
        assert_eq!(report.grown[0].instance_id, "i-ok");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].subject, "i-bad");
        assert!(report.failures[0].reason.contains("growpart exited 2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_grow_times_out_alone() {
        let connector = Arc::new(CannedConnector::new().grow_hanging("i-stuck"));
        let mappings = vec![mapping("i-stuck", "vol-stuck"), mapping("i-ok", "vol-ok")];
        let opts = GrowOptions { unit_timeout: Duration::from_millis(100), ..Default::default() };
        let report = grow_filesystems(&connector, mappings, &opts).await;

        assert_eq!(report.grown.len(), 1);
        assert_eq!(report.grown[0].instance_id, "i-ok");
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].reason.contains("timed out"));
    }

    #[tokio::test]
    async fn test_every_mapping_is_attempted() {
        let connector = Arc::new(CannedConnector::new());
        let mappings: Vec<VolumeMapping> =
            (0..8).map(|i| mapping(&format!("i-{i}"), &format!("vol-{i}"))).collect();
        let report = grow_filesystems(&connector, mappings, &GrowOptions::default()).await;

        assert_eq!(report.grown.len(), 8);
        assert_eq!(connector.grow_calls().len(), 8);
    }
}
