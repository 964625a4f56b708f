//! Application service — the whole-run state machine.
//!
//! `Audit → (none flagged? stop) → [confirm] → Resize → Grow → Report`.
//! Check mode stops after the audit; expand mode proceeds once confirmed.
//! Only volumes that actually resized feed the grow stage, and the
//! resize-and-grow phase runs under an overall ceiling so a runaway poll
//! loop cannot pin the run forever.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use swell_common::{AuditReport, Instance, RunReport};

use crate::application::ports::{CloudApi, FleetConnector, ProgressReporter};
use crate::application::services::audit::{self, AuditOptions};
use crate::application::services::grow::{self, GrowOptions};
use crate::application::services::resize::{self, ResizeOptions};

/// Ceiling over the whole resize-and-grow phase.
pub const RUN_CEILING: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Stop after the audit and report flagged instances.
    Check,
    /// Audit, then resize flagged volumes and grow their filesystems.
    Expand,
}

impl Mode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::Expand => "expand",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: Mode,
    pub audit: AuditOptions,
    pub resize: ResizeOptions,
    pub grow: GrowOptions,
    pub run_ceiling: Duration,
}

impl RunOptions {
    #[must_use]
    pub fn for_mode(mode: Mode) -> Self {
        Self {
            mode,
            audit: AuditOptions::default(),
            resize: ResizeOptions::default(),
            grow: GrowOptions::default(),
            run_ceiling: RUN_CEILING,
        }
    }
}

/// Drive one run over an already-discovered instance catalog.
///
/// `confirm` is consulted once, in expand mode, after the audit; callers
/// pass an interactive prompt or a constant.
///
/// # Errors
///
/// Returns an error for batch-level failures only: the volume inventory
/// could not be listed, or the resize-and-grow phase outran its ceiling.
/// Per-instance and per-volume failures are recorded in the report.
pub async fn run<Cl, Co, R, F>(
    cloud: &Cl,
    connector: &Arc<Co>,
    instances: &[Instance],
    reporter: &R,
    confirm: F,
    opts: &RunOptions,
) -> Result<RunReport>
where
    Cl: CloudApi,
    Co: FleetConnector + 'static,
    R: ProgressReporter,
    F: FnOnce(&AuditReport) -> Result<bool>,
{
    let started_at = Utc::now();
    reporter.step(&format!(
        "auditing {} instances (threshold {}%)",
        instances.len(),
        opts.audit.threshold_percent
    ));
    let audit_report = audit::audit_fleet(connector, instances, &opts.audit).await;
    if !audit_report.failures.is_empty() {
        reporter.warn(&format!("{} instances could not be probed", audit_report.failures.len()));
    }

    let mut report = RunReport::audit_only(
        opts.mode.as_str(),
        opts.audit.threshold_percent,
        opts.resize.increment_percent,
        audit_report,
    );
    report.started_at = started_at;

    if report.audit.flagged.is_empty() {
        reporter.success("no instance is over the usage threshold");
        return Ok(report);
    }
    reporter.success(&format!("{} instances over the threshold", report.audit.flagged.len()));

    if opts.mode == Mode::Check {
        return Ok(report);
    }

    if !confirm(&report.audit)? {
        reporter.warn("expansion declined; stopping after audit");
        return Ok(report);
    }
    report.confirmed = true;

    let flagged: Vec<Instance> =
        report.audit.flagged.iter().map(|f| f.instance.clone()).collect();

    let staged = tokio::time::timeout(opts.run_ceiling, async {
        reporter.step(&format!(
            "expanding volumes on {} instances by {}%",
            flagged.len(),
            opts.resize.increment_percent
        ));
        let resize_outcome = resize::resize_volumes(cloud, instances, &flagged, &opts.resize).await?;
        if !resize_outcome.failures.is_empty() {
            reporter.warn(&format!("{} volumes failed to resize", resize_outcome.failures.len()));
        }
        reporter.step(&format!(
            "growing filesystems on {} instances",
            resize_outcome.mappings.len()
        ));
        let grow_report =
            grow::grow_filesystems(connector, resize_outcome.mappings.clone(), &opts.grow).await;
        Ok::<_, anyhow::Error>((resize_outcome, grow_report))
    })
    .await;

    let (resize_outcome, grow_report) = match staged {
        Ok(result) => result?,
        Err(_) => anyhow::bail!(
            "run cancelled: exceeded its {}s ceiling",
            opts.run_ceiling.as_secs()
        ),
    };

    report.resized = resize_outcome.mappings;
    report.failures.extend(resize_outcome.failures);
    report.grown = grow_report.grown;
    report.failures.extend(grow_report.failures);
    reporter.success(&format!("{} filesystems grown", report.grown.len()));
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::application::ports::MockProgressReporter;
    use crate::application::services::test_support::{
        CannedCloud, CannedConnector, instance, volume,
    };

    fn quiet_reporter() -> MockProgressReporter {
        let mut reporter = MockProgressReporter::new();
        reporter.expect_step().returning(|_| ());
        reporter.expect_success().returning(|_| ());
        reporter.expect_warn().returning(|_| ());
        reporter
    }

    fn fast_opts(mode: Mode) -> RunOptions {
        let mut opts = RunOptions::for_mode(mode);
        opts.resize.poll_interval = Duration::from_millis(10);
        opts.resize.wait_timeout = Duration::from_millis(200);
        opts
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_mode_stops_after_audit() {
        let instances = vec![instance("i-hot", "fleet")];
        let cloud = CannedCloud::new(instances.clone(), vec![volume("vol-a", "i-hot", 100)]);
        let connector = Arc::new(CannedConnector::new().usage("i-hot", 95));
        let report = run(
            &cloud,
            &connector,
            &instances,
            &quiet_reporter(),
            |_| panic!("confirm must not be consulted in check mode"),
            &fast_opts(Mode::Check),
        )
        .await
        .expect("report");

        assert_eq!(report.mode, "check");
        assert_eq!(report.audit.flagged.len(), 1);
        assert!(!report.confirmed);
        assert!(report.resized.is_empty());
        assert!(report.grown.is_empty());
        assert!(cloud.resized().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_flagged_instances_stops_even_in_expand_mode() {
        let instances = vec![instance("i-cool", "fleet")];
        let cloud = CannedCloud::new(instances.clone(), vec![volume("vol-a", "i-cool", 100)]);
        let connector = Arc::new(CannedConnector::new().usage("i-cool", 40));
        let report = run(
            &cloud,
            &connector,
            &instances,
            &quiet_reporter(),
            |_| Ok(true),
            &fast_opts(Mode::Expand),
        )
        .await
        .expect("report");

        assert!(report.audit.flagged.is_empty());
        assert!(report.resized.is_empty());
        assert!(cloud.resized().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expand_runs_audit_resize_grow_end_to_end() {
        let instances = vec![
            instance("i-low", "fleet"),
            instance("i-mid", "fleet"),
            instance("i-high", "fleet"),
        ];
        let cloud = CannedCloud::new(
            instances.clone(),
            vec![
                volume("vol-low", "i-low", 100),
                volume("vol-mid", "i-mid", 100),
                volume("vol-high", "i-high", 100),
            ],
        );
        let connector = Arc::new(
            CannedConnector::new().usage("i-low", 60).usage("i-mid", 85).usage("i-high", 90),
        );
        let report = run(
            &cloud,
            &connector,
            &instances,
            &quiet_reporter(),
            |audit| {
                assert_eq!(audit.flagged.len(), 2);
                Ok(true)
            },
            &fast_opts(Mode::Expand),
        )
        .await
        .expect("report");

        assert!(report.confirmed);
        assert_eq!(report.resized.len(), 2);
        assert_eq!(report.grown.len(), 2);
        assert!(report.failures.is_empty());
        for mapping in &report.resized {
            assert_eq!(mapping.volume.new_size_gib, Some(130));
        }
        let resized: Vec<String> = cloud.resized().into_iter().map(|(id, _)| id).collect();
        assert!(resized.contains(&"vol-mid".to_string()));
        assert!(resized.contains(&"vol-high".to_string()));
        assert!(!resized.contains(&"vol-low".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_declined_confirmation_skips_resize_and_grow() {
        let instances = vec![instance("i-hot", "fleet")];
        let cloud = CannedCloud::new(instances.clone(), vec![volume("vol-a", "i-hot", 100)]);
        let connector = Arc::new(CannedConnector::new().usage("i-hot", 95));
        let report = run(
            &cloud,
            &connector,
            &instances,
            &quiet_reporter(),
            |_| Ok(false),
            &fast_opts(Mode::Expand),
        )
        .await
        .expect("report");

        assert!(!report.confirmed);
        assert!(report.resized.is_empty());
        assert!(cloud.resized().is_empty());
        assert!(connector.grow_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resize_failures_never_reach_the_grow_stage() {
        let instances = vec![instance("i-a", "fleet"), instance("i-b", "fleet")];
        let cloud = CannedCloud::new(
            instances.clone(),
            vec![volume("vol-a", "i-a", 100), volume("vol-b", "i-b", 100)],
        )
        .modify_failing("vol-a", "rate exceeded");
        let connector = Arc::new(CannedConnector::new().default_usage(99));
        let report = run(
            &cloud,
            &connector,
            &instances,
            &quiet_reporter(),
            |_| Ok(true),
            &fast_opts(Mode::Expand),
        )
        .await
        .expect("report");

        let grow_targets: Vec<String> =
            connector.grow_calls().into_iter().map(|(id, _)| id).collect();
        assert_eq!(grow_targets, vec!["i-b".to_string()]);
        assert_eq!(report.grown.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].subject, "vol-a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ceiling_cancels_a_runaway_poll_loop() {
        use crate::application::ports::VolumeModState::Modifying;
        let instances = vec![instance("i-hot", "fleet")];
        let cloud = CannedCloud::new(instances.clone(), vec![volume("vol-a", "i-hot", 100)])
            .states("vol-a", &[Modifying]);
        let connector = Arc::new(CannedConnector::new().usage("i-hot", 95));
        let mut opts = fast_opts(Mode::Expand);
        opts.resize.wait_timeout = Duration::from_secs(3600);
        opts.run_ceiling = Duration::from_millis(100);

        let result =
            run(&cloud, &connector, &instances, &quiet_reporter(), |_| Ok(true), &opts).await;
        let err = result.expect_err("ceiling should cancel the run");
        assert!(err.to_string().contains("cancelled"));
    }
}
