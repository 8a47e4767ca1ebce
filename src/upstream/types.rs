//! Wire types and routes of the upstream REST API.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

pub const HEALTH_PATH: &str = "/api/v1/health";
pub const KEY_INFO_PATH: &str = "/api/v1/auth/keyinfo";
pub const SCAN_CV_PATH: &str = "/api/v1/scraper/scanCV";
pub const SOCKET_PATH: &str = "/api/v1/scraper/ws";

/// References the upstream saw during the last `days` days.
pub fn scanned_references_path(days: u32) -> String {
    format!("/api/v1/scraper/scannedReferenceNrs/since/days/{days}")
}

/// A role attached to an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiRole {
    pub role: u64,
}

impl ApiRole {
    /// The role that allows submitting records and receiving commands.
    pub const SCRAPER: u64 = 1;
}

/// Response of `GET /auth/keyinfo`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiKeyInfo {
    #[serde(default)]
    pub roles: Vec<ApiRole>,
}

impl ApiKeyInfo {
    pub fn has_role(&self, role: u64) -> bool {
        self.roles.iter().any(|r| r.role == role)
    }
}

/// Body of `POST /scraper/scanCV`.
#[derive(Debug, Serialize)]
pub struct ScanCvRequest<'a> {
    pub cv: &'a RawValue,
}

/// Response of `POST /scraper/scanCV`.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanCvResponse {
    #[serde(default)]
    pub has_matches: bool,
}
