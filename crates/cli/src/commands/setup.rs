use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use camsweep_core::config::{
    write_env_file, CAMERA_CREDENTIALS_KEY, DEFAULT_DEVICE_USER, DEVICE_PREFIX,
    DRIVE_CREDENTIALS_KEY, DRIVE_FOLDER_KEY, OUTPUT_FOLDER_KEY,
};
use dialoguer::{Confirm, Input, Password};

const WIZARD_REMOTE_PATH: &str = "/tmp/capture.jpg";
const WIZARD_CAPTURE_FLAGS: &str = "--nopreview -t 500";

/// (key, prompt, fallback default)
const FIELDS: [(&str, &str, &str); 4] = [
    (
        CAMERA_CREDENTIALS_KEY,
        "Path to save/load the camera service session JSON",
        "credentials/blink_cred.json",
    ),
    (OUTPUT_FOLDER_KEY, "Local folder for collected images", "collected_images"),
    (
        DRIVE_CREDENTIALS_KEY,
        "Path to the Google Drive client secrets JSON",
        "credentials/drive_client_secrets.json",
    ),
    (
        DRIVE_FOLDER_KEY,
        "Google Drive folder name for uploads",
        "BabyCarePhotos",
    ),
];

pub fn run(env_file: &Path) -> Result<()> {
    println!();
    println!("  camsweep setup");
    println!("  ==============");
    println!("  Writing {}", env_file.display());
    println!();

    let mut entries: Vec<(String, String)> = Vec::new();
    for (key, prompt, fallback) in FIELDS {
        let default = std::env::var(key).unwrap_or_else(|_| fallback.to_string());
        let value: String = Input::new()
            .with_prompt(prompt)
            .default(default)
            .interact_text()?;
        entries.push((key.to_string(), value.trim().to_string()));
    }

    println!();
    println!("  Raspberry Pi cameras");
    println!("  --------------------");
    let add_devices = Confirm::new()
        .with_prompt("Configure Raspberry Pi cameras?")
        .default(false)
        .interact()?;
    if add_devices {
        let mut ordinal = 1;
        while let Some(device) = prompt_device(ordinal)? {
            entries.extend(device);
            println!("Device {ordinal} configured.");
            ordinal += 1;
        }
    }

    write_env_file(env_file, &entries)
        .with_context(|| format!("failed to write {}", env_file.display()))?;
    println!();
    println!("[+] {} written", env_file.display());

    let value = |key: &str| {
        entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or_default()
    };
    if let Some(dir) = Path::new(value(CAMERA_CREDENTIALS_KEY))
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        create_dir(dir)?;
    }
    create_dir(Path::new(value(OUTPUT_FOLDER_KEY)))?;

    println!();
    println!("Setup complete. Start the pipeline with `camsweep run`.");
    Ok(())
}

/// Prompt for one device group. An empty host ends the list.
fn prompt_device(ordinal: u32) -> Result<Option<Vec<(String, String)>>> {
    println!();
    println!("Device {ordinal}");
    let host: String = Input::new()
        .with_prompt("Host/IP (leave empty to stop adding devices)")
        .allow_empty(true)
        .interact_text()?;
    let host = host.trim().to_string();
    if host.is_empty() {
        return Ok(None);
    }

    let user: String = Input::new()
        .with_prompt("SSH username")
        .default(DEFAULT_DEVICE_USER.to_string())
        .interact_text()?;
    let password = Password::new()
        .with_prompt("SSH password (empty for key authentication)")
        .allow_empty_password(true)
        .interact()?;
    let name: String = Input::new()
        .with_prompt("Device name")
        .default(format!("rpi_device_{ordinal}"))
        .interact_text()?;
    let noir = Confirm::new()
        .with_prompt("Is this a NoIR camera?")
        .default(false)
        .interact()?;
    let remote_path: String = Input::new()
        .with_prompt("Capture file path on the device")
        .default(WIZARD_REMOTE_PATH.to_string())
        .interact_text()?;
    let flags: String = Input::new()
        .with_prompt("Additional rpicam-still options")
        .default(WIZARD_CAPTURE_FLAGS.to_string())
        .interact_text()?;

    let key = |param: &str| format!("{DEVICE_PREFIX}{ordinal}_{param}");
    Ok(Some(vec![
        (key("HOST"), host),
        (key("USER_NAME"), user),
        (key("PASSWORD"), password),
        (key("NAME"), name),
        (key("IS_NOIR"), noir.to_string()),
        (key("LOCAL_FILE_PATH"), remote_path),
        (key("RPICAM_CONFIG"), flags),
    ]))
}

fn create_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    println!("[+] Created directory: {}", dir.display());
    Ok(())
}
