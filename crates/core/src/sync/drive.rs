//! Google Drive v3 client over blocking reqwest.
//!
//! Authentication is OAuth2 with a persisted refresh token, so the pipeline
//! can run unattended for long periods. The operator is prompted only when no
//! usable token exists or the refresh is rejected.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{RemoteEntry, RemoteStore};
use crate::config::DRIVE_CREDENTIALS_KEY;
use crate::domain::ImageFormat;
use crate::error::{Error, Result};
use crate::http::check_status;
use crate::prompt::Prompter;

const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const DEFAULT_REDIRECT: &str = "http://localhost";
const MULTIPART_BOUNDARY: &str = "camsweep-upload-boundary";

/// Tokens are refreshed this long before they actually expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// OAuth client as downloaded from the cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    fn parse(raw: &str) -> Result<Self> {
        let file: SecretsFile = serde_json::from_str(raw)?;
        file.installed.or(file.web).ok_or_else(|| Error::InvalidConfig {
            key: DRIVE_CREDENTIALS_KEY.to_string(),
            message: "client secrets have neither an \"installed\" nor a \"web\" section"
                .to_string(),
        })
    }

    fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_REDIRECT)
    }

    fn authorization_url(&self) -> Result<Url> {
        Url::parse_with_params(
            &self.auth_uri,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri()),
                ("response_type", "code"),
                ("scope", DRIVE_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| Error::InvalidConfig {
            key: "auth_uri".to_string(),
            message: e.to_string(),
        })
    }
}

/// Persisted OAuth tokens (`google_drive_token.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    /// Stored token at `path`. A missing, unreadable or foreign-format file
    /// yields `None` so the caller falls back to interactive consent; the
    /// file is overwritten on the next successful authentication.
    pub fn load(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let parsed = fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|raw| serde_json::from_str::<StoredToken>(&raw).map_err(Error::from));
        match parsed {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(path = %path.display(), "Ignoring unusable token file: {e}");
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

impl TokenResponse {
    /// Google omits the refresh token on refresh; keep the previous one.
    fn into_stored(self, previous_refresh: Option<String>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: Utc::now() + Duration::seconds(self.expires_in),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: String,
}

impl From<DriveFile> for RemoteEntry {
    fn from(f: DriveFile) -> Self {
        Self {
            is_folder: f.mime_type == FOLDER_MIME,
            id: f.id,
            name: f.name,
        }
    }
}

#[derive(Deserialize)]
struct CreatedFile {
    id: String,
}

/// An authenticated Drive session.
pub struct DriveClient {
    http: Client,
    secrets: ClientSecrets,
    token: StoredToken,
    token_path: PathBuf,
    prompter: Box<dyn Prompter>,
}

impl DriveClient {
    /// Load stored tokens, refreshing or re-running the consent flow as
    /// needed, and persist the result to `token_path`.
    pub fn authenticate(
        secrets_path: &Path,
        token_path: &Path,
        prompter: Box<dyn Prompter>,
    ) -> Result<Self> {
        info!("Authenticating cloud storage...");
        let http = Client::new();
        let secrets = ClientSecrets::load(secrets_path)?;

        let token = match StoredToken::load(token_path) {
            Some(token) if !token.is_expired(Utc::now()) => {
                info!("Stored credentials are valid");
                token
            }
            Some(token) => match refresh(&http, &secrets, &token) {
                Ok(fresh) => {
                    info!("Refreshed access token");
                    fresh
                }
                Err(e) => {
                    warn!("Token refresh failed ({e}); performing manual authentication");
                    interactive_consent(&http, &secrets, prompter.as_ref())?
                }
            },
            None => {
                info!("No stored credentials; performing manual authentication");
                interactive_consent(&http, &secrets, prompter.as_ref())?
            }
        };
        token.save(token_path)?;
        info!("Cloud storage authentication successful");

        Ok(Self {
            http,
            secrets,
            token,
            token_path: token_path.to_path_buf(),
            prompter,
        })
    }

    fn ensure_fresh(&mut self) -> Result<()> {
        if !self.token.is_expired(Utc::now()) {
            return Ok(());
        }
        self.token = match refresh(&self.http, &self.secrets, &self.token) {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!("Token refresh failed ({e}); performing manual authentication");
                interactive_consent(&self.http, &self.secrets, self.prompter.as_ref())?
            }
        };
        self.token.save(&self.token_path)?;
        debug!("Access token renewed");
        Ok(())
    }

    fn list(&mut self, query: &str) -> Result<Vec<RemoteEntry>> {
        self.ensure_fresh()?;
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self
                .http
                .get(FILES_URL)
                .bearer_auth(&self.token.access_token)
                .query(&[
                    ("q", query),
                    ("fields", "nextPageToken, files(id, name, mimeType)"),
                    ("pageSize", "1000"),
                ]);
            if let Some(ref t) = page_token {
                req = req.query(&[("pageToken", t.as_str())]);
            }
            let page: FileList = check_status(req.send()?)?.json()?;
            entries.extend(page.files.into_iter().map(RemoteEntry::from));
            match page.next_page_token {
                Some(t) => page_token = Some(t),
                None => break,
            }
        }
        Ok(entries)
    }
}

impl RemoteStore for DriveClient {
    fn find_folder(&mut self, name: &str) -> Result<Option<String>> {
        info!(folder = name, "Searching for remote folder");
        let query = format!(
            "name = '{}' and mimeType = '{FOLDER_MIME}' and trashed = false",
            escape_query(name)
        );
        Ok(self.list(&query)?.into_iter().next().map(|e| e.id))
    }

    fn list_children(&mut self, parent_id: &str) -> Result<Vec<RemoteEntry>> {
        self.list(&children_query(parent_id))
    }

    fn create_folder(&mut self, name: &str, parent_id: &str) -> Result<String> {
        self.ensure_fresh()?;
        let resp = self
            .http
            .post(FILES_URL)
            .bearer_auth(&self.token.access_token)
            .query(&[("fields", "id")])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME,
                "parents": [parent_id],
            }))
            .send()?;
        let created: CreatedFile = check_status(resp)?.json()?;
        Ok(created.id)
    }

    fn upload_file(&mut self, local: &Path, parent_id: &str) -> Result<String> {
        self.ensure_fresh()?;
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::SourceNotFound(local.to_path_buf()))?;
        let mime = ImageFormat::from_path(local)
            .map(|f| f.mime_type())
            .unwrap_or("application/octet-stream");
        let content = fs::read(local)?;
        let metadata = json!({ "name": name, "parents": [parent_id] });

        let resp = self
            .http
            .post(UPLOAD_URL)
            .bearer_auth(&self.token.access_token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(multipart_body(&metadata, mime, &content))
            .send()?;
        let created: CreatedFile = check_status(resp)?.json()?;
        Ok(created.id)
    }
}

fn refresh(http: &Client, secrets: &ClientSecrets, token: &StoredToken) -> Result<StoredToken> {
    let refresh_token = token
        .refresh_token
        .clone()
        .ok_or_else(|| Error::AuthRequired("no refresh token stored".to_string()))?;
    let resp = http
        .post(&secrets.token_uri)
        .form(&[
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ])
        .send()?;
    let fresh: TokenResponse = check_status(resp)?.json()?;
    Ok(fresh.into_stored(Some(refresh_token)))
}

fn interactive_consent(
    http: &Client,
    secrets: &ClientSecrets,
    prompter: &dyn Prompter,
) -> Result<StoredToken> {
    let url = secrets.authorization_url()?;
    prompter.notify(&format!(
        "Open this URL in a browser and grant access:\n\n  {url}\n\n\
         Then paste the code, or the full address you were redirected to."
    ));
    let answer = prompter.input("Authorization code")?;
    let code = extract_code(&answer)
        .ok_or_else(|| Error::AuthRequired("no authorization code supplied".to_string()))?;

    let resp = http
        .post(&secrets.token_uri)
        .form(&[
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("code", code.as_str()),
            ("redirect_uri", secrets.redirect_uri()),
            ("grant_type", "authorization_code"),
        ])
        .send()?;
    let token: TokenResponse = check_status(resp)?.json()?;
    Ok(token.into_stored(None))
}

/// Accept either a bare authorization code or the redirect URL carrying it.
fn extract_code(answer: &str) -> Option<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return None;
    }
    match Url::parse(answer) {
        Ok(url) => url
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.into_owned()),
        Err(_) => Some(answer.to_string()),
    }
}

/// Children of a folder, trashed ones included: a trashed file still counts as
/// already uploaded.
fn children_query(parent_id: &str) -> String {
    format!("'{}' in parents", escape_query(parent_id))
}

/// Escape a literal for the Drive query language.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn multipart_body(metadata: &serde_json::Value, mime: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 512);
    body.extend_from_slice(
        format!(
            "--{MULTIPART_BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n\
             --{MULTIPART_BOUNDARY}\r\nContent-Type: {mime}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}
