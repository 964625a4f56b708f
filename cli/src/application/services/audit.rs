//! Application service — fleet disk-usage audit.
//!
//! Fans one usage probe out per instance through the bastion, bounded by a
//! fixed-size semaphore and a per-unit deadline. A probe failure or timeout
//! excludes that instance from the flagged set and never aborts the batch;
//! every spawned unit is joined before the call returns.

use std::sync::Arc;
use std::time::Duration;

use swell_common::{AuditReport, FlaggedInstance, Instance, Stage, StageFailure, UsageSample};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::application::ports::FleetConnector;
use crate::domain::UnitError;
use crate::retry::{UNIT_TIMEOUT, with_deadline};

/// Probes allowed in flight at once.
pub const MAX_IN_FLIGHT: usize = 20;

/// Usage percentage above which an instance is flagged.
pub const DEFAULT_THRESHOLD: u8 = 80;

#[derive(Debug, Clone)]
pub struct AuditOptions {
    pub threshold_percent: u8,
    pub max_in_flight: usize,
    pub unit_timeout: Duration,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            threshold_percent: DEFAULT_THRESHOLD,
            max_in_flight: MAX_IN_FLIGHT,
            unit_timeout: UNIT_TIMEOUT,
        }
    }
}

/// Probe every instance and return the ones strictly over the threshold,
/// along with per-instance failures. Infallible at the batch level: probe
/// errors only ever remove their own instance from the flagged set.
pub async fn audit_fleet<C>(
    connector: &Arc<C>,
    instances: &[Instance],
    opts: &AuditOptions,
) -> AuditReport
where
    C: FleetConnector + 'static,
{
    let semaphore = Arc::new(Semaphore::new(opts.max_in_flight));
    let mut units: JoinSet<(Instance, Result<UsageSample, UnitError>)> = JoinSet::new();

    for instance in instances.iter().cloned() {
        let connector = Arc::clone(connector);
        let semaphore = Arc::clone(&semaphore);
        let unit_timeout = opts.unit_timeout;
        units.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (instance, Err(UnitError::Cancelled));
            };
            let usage = with_deadline(unit_timeout, connector.disk_usage(&instance)).await;
            (instance, usage)
        });
    }

    let mut report = AuditReport { audited: instances.len(), ..AuditReport::default() };
    while let Some(joined) = units.join_next().await {
        match joined {
            Ok((instance, Ok(sample))) => {
                tracing::debug!(instance = %instance.id, usage = sample.percent, "usage probe complete");
                if sample.percent > opts.threshold_percent {
                    report
                        .flagged
                        .push(FlaggedInstance { instance, usage_percent: sample.percent });
                }
            }
            Ok((instance, Err(err))) => {
                tracing::warn!(instance = %instance.id, error = %err, "usage probe failed");
                report.failures.push(StageFailure::new(Stage::Audit, instance.id, err.to_string()));
            }
            Err(join_err) => {
                tracing::error!(error = %join_err, "audit unit panicked");
                report.failures.push(StageFailure::new(
                    Stage::Audit,
                    "unknown",
                    join_err.to_string(),
                ));
            }
        }
    }

    report.flagged.sort_by(|a, b| a.instance.id.cmp(&b.instance.id));
    report.failures.sort_by(|a, b| a.subject.cmp(&b.subject));
    report
}
