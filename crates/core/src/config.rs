use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const CAMERA_CREDENTIALS_KEY: &str = "CONFIG_JSON_PATH";
pub const OUTPUT_FOLDER_KEY: &str = "OUTPUT_FOLDER";
pub const DRIVE_CREDENTIALS_KEY: &str = "GOOGLE_DRIVE_CREDENTIALS_PATH";
pub const DRIVE_FOLDER_KEY: &str = "GOOGLE_DRIVE_PHOTO_FOLDER_NAME";
pub const DEVICE_PREFIX: &str = "RPI_DEVICE_";

pub const DEFAULT_DEVICE_USER: &str = "pi";
pub const DEFAULT_REMOTE_PATH: &str = "/tmp/image.jpg";

/// Process-wide configuration, loaded once at startup and handed to each
/// component at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Camera-service session file (read and rewritten on re-authentication).
    pub camera_credentials: PathBuf,
    /// Root of the local `<source_id>/<timestamp>.jpg` tree.
    pub output_root: PathBuf,
    /// OAuth client secrets for cloud storage.
    pub drive_credentials: PathBuf,
    /// Name of the remote parent folder mirrored into.
    pub drive_folder: String,
    /// Remote camera devices, ordered by ordinal.
    pub devices: Vec<DeviceConfig>,
}

/// One `RPI_DEVICE_<n>_*` parameter group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub ordinal: u32,
    pub host: String,
    pub user: String,
    pub password: Option<String>,
    /// Display name; normalized into the source id.
    pub name: String,
    /// NoIR camera module, captured with the NoIR tuning file.
    pub noir: bool,
    /// Where the capture tool writes on the device.
    pub remote_path: String,
    /// Extra flags passed to the capture tool.
    pub capture_flags: String,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(utf8_vars(std::env::vars_os()))
    }

    /// Load from any key/value source. Missing required keys are fatal.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let required = |key: &str| -> Result<String> {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::MissingConfig(key.to_string()))
        };

        Ok(Self {
            camera_credentials: PathBuf::from(required(CAMERA_CREDENTIALS_KEY)?),
            output_root: PathBuf::from(required(OUTPUT_FOLDER_KEY)?),
            drive_credentials: PathBuf::from(required(DRIVE_CREDENTIALS_KEY)?),
            drive_folder: required(DRIVE_FOLDER_KEY)?,
            devices: parse_devices(&vars)?,
        })
    }

    /// Token file kept next to the cloud client secrets.
    pub fn drive_token_path(&self) -> PathBuf {
        self.drive_credentials
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("google_drive_token.json")
    }
}

/// Entries whose key or value is not valid UTF-8 are skipped; a required key
/// lost this way still surfaces as `MissingConfig`.
fn utf8_vars(
    vars: impl IntoIterator<Item = (OsString, OsString)>,
) -> impl Iterator<Item = (String, String)> {
    vars.into_iter()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
}

fn parse_devices(vars: &HashMap<String, String>) -> Result<Vec<DeviceConfig>> {
    let mut groups: BTreeMap<u32, HashMap<&str, &str>> = BTreeMap::new();

    for (key, value) in vars {
        let Some(rest) = key.strip_prefix(DEVICE_PREFIX) else {
            continue;
        };
        let (ordinal, param) = rest.split_once('_').ok_or_else(|| Error::InvalidConfig {
            key: key.clone(),
            message: "expected RPI_DEVICE_<n>_<PARAM>".to_string(),
        })?;
        let ordinal: u32 = ordinal.parse().map_err(|_| Error::InvalidConfig {
            key: key.clone(),
            message: format!("device ordinal `{ordinal}` is not a number"),
        })?;
        groups.entry(ordinal).or_default().insert(param, value.as_str());
    }

    groups
        .into_iter()
        .map(|(ordinal, params)| {
            let get = |param: &str| params.get(param).map(|v| v.trim()).filter(|v| !v.is_empty());
            let host = get("HOST").ok_or_else(|| {
                Error::MissingConfig(format!("{DEVICE_PREFIX}{ordinal}_HOST"))
            })?;
            Ok(DeviceConfig {
                ordinal,
                host: host.to_string(),
                user: get("USER_NAME").unwrap_or(DEFAULT_DEVICE_USER).to_string(),
                password: get("PASSWORD").map(str::to_string),
                name: get("NAME")
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("rpi_device_{ordinal}")),
                noir: get("IS_NOIR").is_some_and(|v| v.eq_ignore_ascii_case("true")),
                remote_path: get("LOCAL_FILE_PATH")
                    .unwrap_or(DEFAULT_REMOTE_PATH)
                    .to_string(),
                capture_flags: get("RPICAM_CONFIG").unwrap_or_default().to_string(),
            })
        })
        .collect()
}

/// Render `KEY="value"` lines in the given order.
pub fn render_env(entries: &[(String, String)]) -> String {
    let mut out = String::new();
    for (key, value) in entries {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        out.push_str(&format!("{key}=\"{escaped}\"\n"));
    }
    out
}

/// Write a `.env` file, replacing any existing one.
pub fn write_env_file(path: &Path, entries: &[(String, String)]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render_env(entries))?;
    Ok(())
}
