use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ImageProducer;
use crate::error::{Error, Result};
use crate::http::check_status;
use crate::prompt::Prompter;

const LOGIN_URL: &str = "https://rest-prod.immedia-semi.com/api/v5/account/login";
const CLIENT_NAME: &str = "camsweep";

/// Polls of the homescreen while waiting for a fresh thumbnail after a snap.
const SNAP_POLL_ATTEMPTS: u32 = 5;
const SNAP_POLL_DELAY: Duration = Duration::from_secs(2);

/// Persisted camera-service session. Written back to disk after every
/// successful (re-)authentication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkSession {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Stable per-installation identifier sent on login.
    pub uid: String,
    pub token: Option<String>,
    /// Regional API host, e.g. `rest-u011.immedia-semi.com`.
    pub host: Option<String>,
    pub account_id: Option<u64>,
    pub client_id: Option<u64>,
}

impl BlinkSession {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Assign an installation id on first login; kept across re-logins.
    fn ensure_uid(&mut self) {
        if self.uid.is_empty() {
            self.uid = Uuid::new_v4().to_string();
        }
    }

    fn is_usable(&self) -> bool {
        self.token.is_some() && self.host.is_some() && self.account_id.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    account: LoginAccount,
    auth: LoginAuth,
}

#[derive(Debug, Deserialize)]
struct LoginAccount {
    account_id: u64,
    client_id: u64,
    tier: String,
    #[serde(default)]
    client_verification_required: bool,
}

#[derive(Debug, Deserialize)]
struct LoginAuth {
    token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceKind {
    Camera,
    Mini,
}

#[derive(Debug, Clone, Deserialize)]
struct HomescreenDevice {
    id: u64,
    name: String,
    network_id: u64,
    #[serde(default)]
    thumbnail: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Homescreen {
    #[serde(default)]
    cameras: Vec<HomescreenDevice>,
    #[serde(default)]
    owls: Vec<HomescreenDevice>,
}

impl Homescreen {
    fn find(&self, name: &str) -> Option<(DeviceKind, &HomescreenDevice)> {
        self.cameras
            .iter()
            .map(|d| (DeviceKind::Camera, d))
            .chain(self.owls.iter().map(|d| (DeviceKind::Mini, d)))
            .find(|(_, d)| d.name == name)
    }

    fn names(&self) -> Vec<String> {
        self.cameras
            .iter()
            .chain(self.owls.iter())
            .map(|d| d.name.clone())
            .collect()
    }
}

/// Network cameras behind the Blink cloud API.
///
/// The session is established lazily on first use, then reused for the
/// lifetime of the process. The operator is prompted only when the stored
/// session is missing or rejected.
pub struct BlinkCameras {
    http: Client,
    session_path: PathBuf,
    session: Option<BlinkSession>,
    prompter: Box<dyn Prompter>,
}

impl BlinkCameras {
    pub fn new(session_path: PathBuf, prompter: Box<dyn Prompter>) -> Self {
        Self {
            http: Client::new(),
            session_path,
            session: None,
            prompter,
        }
    }

    /// Fetch the homescreen, re-authenticating once if the session is rejected.
    fn homescreen(&mut self) -> Result<Homescreen> {
        let stored = match self.session.take() {
            Some(session) => session,
            None => BlinkSession::load(&self.session_path)?,
        };

        if stored.is_usable() {
            match self.fetch_homescreen(&stored) {
                Ok(home) => {
                    self.session = Some(stored);
                    return Ok(home);
                }
                Err(Error::AuthRequired(reason)) => {
                    warn!("Camera session rejected ({reason}); re-authenticating");
                }
                Err(e) => {
                    self.session = Some(stored);
                    return Err(e);
                }
            }
        }

        let session = self.login(stored)?;
        session.save(&self.session_path)?;
        let home = self.fetch_homescreen(&session)?;
        self.session = Some(session);
        Ok(home)
    }

    fn login(&self, mut session: BlinkSession) -> Result<BlinkSession> {
        info!("Authenticating with camera service...");
        session.ensure_uid();
        let username = match session.username.clone() {
            Some(u) => u,
            None => self.prompter.input("Camera service username (email)")?,
        };
        let password = match session.password.clone() {
            Some(p) => p,
            None => self.prompter.secret("Camera service password")?,
        };

        let resp = self
            .http
            .post(LOGIN_URL)
            .json(&json!({
                "email": username,
                "password": password,
                "unique_id": session.uid,
                "device_identifier": CLIENT_NAME,
                "client_name": CLIENT_NAME,
                "reauth": true,
            }))
            .send()?;
        let login: LoginResponse = check_status(resp)?.json()?;

        let host = format!("rest-{}.immedia-semi.com", login.account.tier);
        if login.account.client_verification_required {
            let pin = self
                .prompter
                .input("Enter the verification code sent to your email or phone")?;
            let url = format!(
                "https://{host}/api/v4/account/{}/client/{}/pin/verify",
                login.account.account_id, login.account.client_id
            );
            let resp = self
                .http
                .post(url)
                .header("TOKEN_AUTH", login.auth.token.as_str())
                .json(&json!({ "pin": pin.trim() }))
                .send()?;
            check_status(resp)?;
        }

        session.username = Some(username);
        session.password = Some(password);
        session.token = Some(login.auth.token);
        session.host = Some(host);
        session.account_id = Some(login.account.account_id);
        session.client_id = Some(login.account.client_id);
        info!("Camera service authentication successful");
        Ok(session)
    }

    fn fetch_homescreen(&self, session: &BlinkSession) -> Result<Homescreen> {
        let (host, token, account) = credentials(session)?;
        let url = format!("https://{host}/api/v3/accounts/{account}/homescreen");
        let resp = self.http.get(url).header("TOKEN_AUTH", token).send()?;
        Ok(check_status(resp)?.json()?)
    }

    fn request_snapshot(
        &self,
        session: &BlinkSession,
        kind: DeviceKind,
        device: &HomescreenDevice,
    ) -> Result<()> {
        let (host, token, account) = credentials(session)?;
        let url = match kind {
            DeviceKind::Camera => format!(
                "https://{host}/network/{}/camera/{}/thumbnail",
                device.network_id, device.id
            ),
            DeviceKind::Mini => format!(
                "https://{host}/api/v1/accounts/{account}/networks/{}/owls/{}/thumbnail",
                device.network_id, device.id
            ),
        };
        let resp = self.http.post(url).header("TOKEN_AUTH", token).send()?;
        check_status(resp)?;
        Ok(())
    }

    fn download(&self, session: &BlinkSession, thumbnail: &str, target: &Path) -> Result<()> {
        let (host, token, _) = credentials(session)?;
        let url = thumbnail_url(host, thumbnail);
        debug!(%url, "Downloading thumbnail");
        let resp = self.http.get(url).header("TOKEN_AUTH", token).send()?;
        let bytes = check_status(resp)?.bytes()?;
        fs::write(target, &bytes)?;
        Ok(())
    }
}

impl ImageProducer for BlinkCameras {
    fn label(&self) -> String {
        "blink".to_string()
    }

    fn sources(&mut self) -> Result<Vec<String>> {
        Ok(self.homescreen()?.names())
    }

    fn capture(&mut self, source: &str, target: &Path) -> Result<()> {
        let home = self.homescreen()?;
        let (kind, device) = home
            .find(source)
            .map(|(kind, d)| (kind, d.clone()))
            .ok_or_else(|| Error::CameraNotFound(source.to_string()))?;
        let session = self
            .session
            .clone()
            .ok_or_else(|| Error::AuthRequired("no camera session".to_string()))?;

        self.request_snapshot(&session, kind, &device)?;

        // Wait for the service to publish the new thumbnail; fall back to the
        // latest one if it never changes.
        let mut thumbnail = device.thumbnail.clone();
        for _ in 0..SNAP_POLL_ATTEMPTS {
            thread::sleep(SNAP_POLL_DELAY);
            let refreshed = self.fetch_homescreen(&session)?;
            let latest = refreshed.find(source).and_then(|(_, d)| d.thumbnail.clone());
            if latest.is_some() && latest != device.thumbnail {
                thumbnail = latest;
                break;
            }
            thumbnail = latest.or(thumbnail);
        }

        let thumbnail = thumbnail.ok_or_else(|| Error::RemoteApi {
            status: 404,
            body: format!("no thumbnail available for {source}"),
        })?;
        self.download(&session, &thumbnail, target)
    }
}

fn credentials(session: &BlinkSession) -> Result<(&str, &str, u64)> {
    match (&session.host, &session.token, session.account_id) {
        (Some(host), Some(token), Some(account)) => Ok((host.as_str(), token.as_str(), account)),
        _ => Err(Error::AuthRequired("incomplete camera session".to_string())),
    }
}

/// Absolute URL of a thumbnail path, ensuring a `.jpg` suffix.
fn thumbnail_url(host: &str, thumbnail: &str) -> String {
    if thumbnail.starts_with("http://") || thumbnail.starts_with("https://") {
        return thumbnail.to_string();
    }
    if thumbnail.contains(".jpg") {
        format!("https://{host}{thumbnail}")
    } else {
        format!("https://{host}{thumbnail}.jpg")
    }
}
