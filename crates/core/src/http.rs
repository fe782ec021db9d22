use reqwest::blocking::Response;
use reqwest::StatusCode;

use crate::error::{Error, Result};

/// Map an HTTP response to `Ok` on 2xx, `AuthRequired` on 401/403 and
/// `RemoteApi` otherwise.
pub fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Error::AuthRequired(format!("{status}: {body}")));
    }
    Err(Error::RemoteApi {
        status: status.as_u16(),
        body,
    })
}
