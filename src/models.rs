//! Data models for the Google Drive API and the local credential cache.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Safety margin applied when deciding whether a cached token is still usable.
const EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Metadata for a file or folder in Google Drive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Response from the files.list API endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<FileMetadata>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
}

/// OAuth client secrets file as downloaded from the Google Cloud console.
///
/// Only the `installed` application type is supported.
#[derive(Debug, Deserialize)]
pub struct ClientSecretsFile {
    pub installed: InstalledClientSecrets,
}

/// The `installed` section of a client secrets file.
#[derive(Debug, Deserialize)]
pub struct InstalledClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Token material persisted to the local cache file between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Expiry as seconds since the unix epoch.
    pub expires_at: u64,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl StoredToken {
    /// Whether the access token is still usable, with a safety buffer
    /// before the recorded expiry.
    pub fn is_valid(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        now + EXPIRY_BUFFER < Duration::from_secs(self.expires_at)
    }

    /// Whether the granted scopes cover every scope in `required`.
    pub fn covers_scopes(&self, required: &[&str]) -> bool {
        required
            .iter()
            .all(|scope| self.scopes.iter().any(|granted| granted == scope))
    }
}

/// OAuth2 token endpoint response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unix_now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    #[test]
    fn test_file_metadata_deserialize() {
        let json = r#"{
            "id": "abc123",
            "name": "report.pdf",
            "mimeType": "application/pdf"
        }"#;

        let metadata: FileMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.id, "abc123");
        assert_eq!(metadata.name, "report.pdf");
        assert_eq!(metadata.mime_type, Some("application/pdf".to_string()));
    }

    #[test]
    fn test_file_list_response_defaults() {
        let response: FileListResponse = serde_json::from_str("{}").unwrap();
        assert!(response.files.is_empty());
        assert!(response.next_page_token.is_none());
    }

    #[test]
    fn test_client_secrets_fill_default_uris() {
        let json = r#"{
            "installed": {
                "client_id": "id.apps.googleusercontent.com",
                "client_secret": "secret"
            }
        }"#;

        let secrets: ClientSecretsFile = serde_json::from_str(json).unwrap();
        assert_eq!(
            secrets.installed.auth_uri,
            "https://accounts.google.com/o/oauth2/auth"
        );
        assert_eq!(
            secrets.installed.token_uri,
            "https://oauth2.googleapis.com/token"
        );
    }

    #[test]
    fn test_stored_token_validity() {
        let mut token = StoredToken {
            access_token: "at".to_string(),
            refresh_token: None,
            expires_at: unix_now() + 3600,
            scopes: Vec::new(),
        };
        assert!(token.is_valid());

        token.expires_at = unix_now().saturating_sub(10);
        assert!(!token.is_valid());

        // Inside the safety buffer counts as expired.
        token.expires_at = unix_now() + 30;
        assert!(!token.is_valid());
    }

    #[test]
    fn test_stored_token_scope_cover() {
        let token = StoredToken {
            access_token: "at".to_string(),
            refresh_token: None,
            expires_at: 0,
            scopes: vec![
                "https://www.googleapis.com/auth/drive.file".to_string(),
                "openid".to_string(),
            ],
        };

        assert!(token.covers_scopes(&["https://www.googleapis.com/auth/drive.file"]));
        assert!(!token.covers_scopes(&["https://www.googleapis.com/auth/drive"]));
        assert!(token.covers_scopes(&[]));
    }

    #[test]
    fn test_token_response_without_refresh_token() {
        let json = r#"{
            "access_token": "at",
            "token_type": "Bearer",
            "expires_in": 3599
        }"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "at");
        assert!(response.refresh_token.is_none());
        assert_eq!(response.expires_in, 3599);
    }
}
