//! `expand` command — audit, resize flagged volumes, grow filesystems.

use anyhow::Result;
use clap::Args;

use crate::application::services::orchestrate::{Mode, RunOptions};
use crate::output::OutputContext;

#[derive(Args, Debug)]
pub struct ExpandArgs {
    /// Flag instances whose root filesystem usage exceeds this percentage
    #[arg(long, default_value_t = 80, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub threshold: u8,

    /// Grow each volume by this percentage of its current size
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..=400))]
    pub increment: u32,

    /// Skip the interactive confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub async fn run(ctx: &OutputContext, globals: &super::Globals, args: &ExpandArgs) -> Result<()> {
    let mut opts = RunOptions::for_mode(Mode::Expand);
    opts.audit.threshold_percent = args.threshold;
    opts.resize.increment_percent = args.increment;
    super::run_flow(ctx, globals, opts, args.yes).await
}
