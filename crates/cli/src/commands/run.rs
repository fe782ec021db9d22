use anyhow::Result;
use camsweep_core::capture::producers_for;
use camsweep_core::config::Config;
use camsweep_core::scheduler::Scheduler;
use camsweep_core::Pipeline;
use tracing::info;

use crate::prompt::TerminalPrompter;

pub fn run(config: Config) -> Result<()> {
    info!("Starting camsweep");
    // Authenticate up front so an interactive login happens before the loop.
    let drive = super::sync::connect(&config)?;
    let producers = producers_for(&config, Box::new(TerminalPrompter));
    let mut pipeline = Pipeline::new(config, producers, drive);

    Scheduler::default().run(&mut pipeline)
}
