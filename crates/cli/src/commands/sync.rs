use anyhow::{Context, Result};
use camsweep_core::config::Config;
use camsweep_core::sync::{drive::DriveClient, mirror};

use crate::prompt::TerminalPrompter;

pub fn run(config: Config) -> Result<()> {
    let mut drive = connect(&config)?;
    let report = mirror(&mut drive, &config.output_root, &config.drive_folder)?;

    if !report.parent_found {
        println!(
            "Remote folder '{}' not found. Create it first; nothing was uploaded.",
            config.drive_folder
        );
        return Ok(());
    }
    println!(
        "{} uploaded, {} already present, {} folder(s) created",
        report.uploaded, report.skipped, report.folders_created
    );
    Ok(())
}

pub(crate) fn connect(config: &Config) -> Result<DriveClient> {
    DriveClient::authenticate(
        &config.drive_credentials,
        &config.drive_token_path(),
        Box::new(TerminalPrompter),
    )
    .context("cloud storage authentication failed")
}
