use anyhow::Result;
use camsweep_core::capture::{capture_all, producers_for};
use camsweep_core::config::Config;

use crate::prompt::TerminalPrompter;

pub fn run(config: Config) -> Result<()> {
    let mut producers = producers_for(&config, Box::new(TerminalPrompter));
    let report = capture_all(&config.output_root, &mut producers)?;

    println!(
        "Captured {} image(s), {} failure(s) into {}",
        report.captured,
        report.failed,
        config.output_root.display()
    );
    Ok(())
}
