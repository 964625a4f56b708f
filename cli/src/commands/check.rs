//! `check` command — audit only, report instances over the threshold.

use anyhow::Result;
use clap::Args;

use crate::application::services::orchestrate::{Mode, RunOptions};
use crate::output::OutputContext;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Flag instances whose root filesystem usage exceeds this percentage
    #[arg(long, default_value_t = 80, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub threshold: u8,
}

pub async fn run(ctx: &OutputContext, globals: &super::Globals, args: &CheckArgs) -> Result<()> {
    let mut opts = RunOptions::for_mode(Mode::Check);
    opts.audit.threshold_percent = args.threshold;
    super::run_flow(ctx, globals, opts, false).await
}
