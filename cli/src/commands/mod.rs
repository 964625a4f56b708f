//! Command handlers: thin wiring from parsed arguments to the services.

pub mod check;
pub mod expand;
pub mod version;

use std::sync::Arc;

use anyhow::{Context, Result};
use swell_common::{AuditReport, Instance};

use crate::application::ports::CloudApi as _;
use crate::application::services::orchestrate::{self, RunOptions};
use crate::infra::cloud::Ec2Cloud;
use crate::infra::keys::KeyStore;
use crate::infra::ssh::pool::{
    ConnectionPool, DEFAULT_CAPACITY, DEFAULT_IDLE_AFTER, PoolKey, SWEEP_INTERVAL,
};
use crate::infra::ssh::{BastionDialer, SshConnector};
use crate::output::reporter::TerminalReporter;
use crate::output::{OutputContext, human, json, progress};

/// Global flags shared by every command.
pub struct Globals {
    pub json: bool,
    pub region: Option<String>,
    pub profile: Option<String>,
    pub ssh_user: String,
}

/// Discover the fleet, let the operator pick a bastion, wire up the SSH
/// stack, and drive one orchestration run.
pub(crate) async fn run_flow(
    ctx: &OutputContext,
    globals: &Globals,
    opts: RunOptions,
    assume_yes: bool,
) -> Result<()> {
    let cloud = Ec2Cloud::from_env(globals.region.clone(), globals.profile.clone()).await?;

    let spinner = ctx.show_progress().then(|| progress::spinner("discovering running instances"));
    let instances = cloud.running_instances().await.context("discovering instances")?;
    if let Some(spinner) = &spinner {
        progress::finish_ok(spinner, &format!("{} running instances", instances.len()));
    }
    anyhow::ensure!(!instances.is_empty(), "no running instances found");

    let bastion = select_bastion(&instances)?;
    ctx.info(&format!("bastion: {}", bastion.label()));
    let bastion_host =
        bastion.public_ip.clone().context("selected bastion has no public address")?;

    let keys = Arc::new(KeyStore::new()?);
    let dialer = BastionDialer::new(Arc::clone(&keys), globals.ssh_user.clone());
    let pool = Arc::new(ConnectionPool::new(dialer, DEFAULT_CAPACITY, DEFAULT_IDLE_AFTER));
    let sweeper = ConnectionPool::spawn_sweeper(Arc::clone(&pool), SWEEP_INTERVAL);
    let connector = Arc::new(SshConnector::new(
        Arc::clone(&pool),
        PoolKey { host: bastion_host, key_name: bastion.key_name.clone() },
        keys,
        globals.ssh_user.clone(),
    ));

    let reporter = TerminalReporter::new(ctx);
    let increment = opts.resize.increment_percent;
    let result = orchestrate::run(
        &cloud,
        &connector,
        &instances,
        &reporter,
        |audit| confirm_expansion(audit, increment, assume_yes),
        &opts,
    )
    .await;

    sweeper.abort();
    pool.shutdown().await;
    let report = result?;

    if globals.json {
        println!("{}", json::render_report(&report)?);
    } else {
        human::render(ctx, &report);
    }
    Ok(())
}

/// Interactive bastion selection over the instances that carry a public
/// address, sorted by name for a stable listing.
fn select_bastion(instances: &[Instance]) -> Result<Instance> {
    let mut reachable: Vec<&Instance> =
        instances.iter().filter(|i| i.public_ip.is_some()).collect();
    anyhow::ensure!(!reachable.is_empty(), "no instance with a public address can act as bastion");
    reachable.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

    let items: Vec<String> = reachable.iter().map(|i| i.label()).collect();
    let picked = dialoguer::Select::new()
        .with_prompt("Choose a bastion instance")
        .items(&items)
        .default(0)
        .interact()
        .context("bastion selection cancelled")?;
    Ok(reachable[picked].clone())
}

fn confirm_expansion(audit: &AuditReport, increment: u32, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(format!(
            "Expand volumes on {} instances by {increment}%?",
            audit.flagged.len()
        ))
        .default(false)
        .interact()
        .context("confirmation cancelled")
}
