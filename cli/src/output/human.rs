//! Human-readable run report rendering.

use swell_common::RunReport;

use crate::output::OutputContext;

/// Render a full run report: flagged instances, expanded volumes, grown
/// filesystems, and every recorded failure with its reason.
pub fn render(ctx: &OutputContext, report: &RunReport) {
    if report.audit.flagged.is_empty() {
        ctx.success("all audited instances are below the usage threshold");
    } else {
        ctx.header(&format!("Instances over {}% usage", report.threshold_percent));
        for flagged in &report.audit.flagged {
            ctx.kv(&flagged.instance.label(), &format!("{}%", flagged.usage_percent));
        }
    }

    if !report.resized.is_empty() {
        ctx.header("Volumes expanded");
        for mapping in &report.resized {
            let new_size = mapping.volume.new_size_gib.unwrap_or(mapping.volume.size_gib);
            ctx.kv(
                &mapping.instance.label(),
                &format!("{} {} GiB → {} GiB", mapping.volume.id, mapping.volume.size_gib, new_size),
            );
        }
    }

    if !report.grown.is_empty() {
        ctx.header("Filesystems grown");
        for grown in &report.grown {
            ctx.success(&format!(
                "{} ({}) confirmed at {}",
                grown.instance_id, grown.volume_id, grown.confirmed_ip
            ));
        }
    }

    let failure_count = report.audit.failures.len() + report.failures.len();
    if failure_count > 0 {
        ctx.header(&format!("Failures ({failure_count})"));
        for failure in report.audit.failures.iter().chain(&report.failures) {
            ctx.error(&format!("{} [{}]: {}", failure.subject, failure.stage, failure.reason));
        }
    }
}
