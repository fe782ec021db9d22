use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("image resize error: {0}")]
    Resize(String),

    #[error("walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required configuration key: {0}")]
    MissingConfig(String),

    #[error("invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    #[error("source path does not exist: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("command `{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("authentication required: {0}")]
    AuthRequired(String),

    #[error("remote API returned {status}: {body}")]
    RemoteApi { status: u16, body: String },

    #[error("camera not found: {0}")]
    CameraNotFound(String),

    #[error("interactive prompt failed: {0}")]
    Prompt(String),
}

pub type Result<T> = std::result::Result<T, Error>;
