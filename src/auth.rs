//! OAuth2 installed-app authentication for the Google Drive API.
//!
//! Tokens are cached in a `token.json` file beside the executable. A cached
//! token is reused while valid, silently refreshed when expired, and
//! recreated through an interactive browser consent flow otherwise.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::{Client, Url};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::debug;

use crate::error::{DriveError, Result};
use crate::models::{ClientSecretsFile, InstalledClientSecrets, StoredToken, TokenResponse};

/// Scope granting access to files created or opened by this application.
/// If this list changes, delete the token cache file to re-authenticate.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

const REQUIRED_SCOPES: &[&str] = &[DRIVE_FILE_SCOPE];

/// Name of the token cache file stored beside the executable.
const TOKEN_FILE_NAME: &str = "token.json";

const CONSENT_RESPONSE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body>Authorization complete. You can close this tab and return to the terminal.</body></html>";

/// Authenticator for the Google Drive API using OAuth installed-app
/// credentials.
#[derive(Debug)]
pub struct Authenticator {
    secrets: InstalledClientSecrets,
    token_path: PathBuf,
    http: Client,
}

impl Authenticator {
    /// Create a new authenticator from a client secrets JSON file.
    ///
    /// Fails without touching the network if the secrets file does not
    /// exist.
    pub fn from_file<P: AsRef<Path>>(secrets_path: P, token_path: PathBuf) -> Result<Self> {
        let secrets_path = secrets_path.as_ref();
        if !secrets_path.is_file() {
            return Err(DriveError::CredentialsNotFound(
                secrets_path.display().to_string(),
            ));
        }

        let content = fs::read_to_string(secrets_path)?;
        let secrets: ClientSecretsFile = serde_json::from_str(&content)?;

        Ok(Self {
            secrets: secrets.installed,
            token_path,
            http: Client::new(),
        })
    }

    /// Default location of the token cache: `token.json` beside the
    /// executable, or in the working directory if that cannot be resolved.
    pub fn default_token_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(TOKEN_FILE_NAME)))
            .unwrap_or_else(|| PathBuf::from(TOKEN_FILE_NAME))
    }

    /// Obtain a valid access token, reusing or refreshing the cached token
    /// when possible and driving the interactive consent flow otherwise.
    pub async fn authorize(&self) -> Result<String> {
        if let Some(cached) = self.load_cached_token() {
            if cached.is_valid() {
                debug!("using cached access token from {}", self.token_path.display());
                return Ok(cached.access_token);
            }

            if let Some(refresh_token) = cached.refresh_token.clone() {
                debug!("cached access token expired, refreshing");
                let refreshed = self.refresh(&refresh_token).await?;
                self.store_token(&refreshed)?;
                return Ok(refreshed.access_token);
            }
        }

        let token = self.interactive_flow().await?;
        self.store_token(&token)?;
        Ok(token.access_token)
    }

    /// Build the consent URL the user must open to grant access.
    pub fn consent_url(&self, redirect_uri: &str) -> Result<String> {
        let url = Url::parse_with_params(
            &self.secrets.auth_uri,
            &[
                ("client_id", self.secrets.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", DRIVE_FILE_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| DriveError::AuthFlowError(format!("invalid auth URI: {}", e)))?;
        Ok(url.to_string())
    }

    /// Load the cached token, discarding it if its granted scopes do not
    /// cover what this program needs.
    fn load_cached_token(&self) -> Option<StoredToken> {
        let content = fs::read_to_string(&self.token_path).ok()?;
        let token: StoredToken = serde_json::from_str(&content).ok()?;
        if !token.covers_scopes(REQUIRED_SCOPES) {
            debug!("cached token is missing required scopes, ignoring it");
            return None;
        }
        Some(token)
    }

    fn store_token(&self, token: &StoredToken) -> Result<()> {
        let content = serde_json::to_string_pretty(token)?;
        fs::write(&self.token_path, content)?;
        debug!("wrote token cache to {}", self.token_path.display());
        Ok(())
    }

    /// Exchange a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<StoredToken> {
        let params = [
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let response = self
            .http
            .post(&self.secrets.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::TokenRefreshError(format!(
                "Status {}: {}",
                status, body
            )));
        }

        let granted: TokenResponse = response.json().await?;
        Ok(stored_token(granted, Some(refresh_token.to_string())))
    }

    /// Run the interactive consent flow: listen on a loopback port, send the
    /// user to the consent page, and exchange the returned code for a token.
    async fn interactive_flow(&self) -> Result<StoredToken> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{}", port);

        let url = self.consent_url(&redirect_uri)?;
        println!("Open this URL in your browser to authorize access:\n\n{}\n", url);
        println!("Waiting for the authorization redirect...");

        let (mut stream, _) = listener.accept().await?;
        let mut buffer = vec![0u8; 4096];
        let read = stream.read(&mut buffer).await?;
        let request = String::from_utf8_lossy(&buffer[..read]).into_owned();

        let code = auth_code_from_redirect(&request);
        // Answer the browser before surfacing any error from the redirect.
        stream.write_all(CONSENT_RESPONSE.as_bytes()).await?;
        stream.shutdown().await?;

        self.exchange_code(&code?, &redirect_uri).await
    }

    /// Exchange an authorization code for the initial token.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<StoredToken> {
        let params = [
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(&self.secrets.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::AuthFlowError(format!(
                "token exchange failed with status {}: {}",
                status, body
            )));
        }

        let granted: TokenResponse = response.json().await?;
        Ok(stored_token(granted, None))
    }
}

/// Convert a token endpoint response into cacheable token material.
///
/// The token endpoint omits the refresh token on refresh grants, so the
/// previous one is carried over.
fn stored_token(response: TokenResponse, previous_refresh: Option<String>) -> StoredToken {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs();

    let scopes = match response.scope.as_deref() {
        Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
        None => REQUIRED_SCOPES.iter().map(|s| s.to_string()).collect(),
    };

    StoredToken {
        access_token: response.access_token,
        refresh_token: response.refresh_token.or(previous_refresh),
        expires_at: now + response.expires_in,
        scopes,
    }
}

/// Extract the authorization code from the browser's redirect request.
fn auth_code_from_redirect(request: &str) -> Result<String> {
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .ok_or_else(|| DriveError::AuthFlowError("malformed redirect request".to_string()))?;

    let url = Url::parse(&format!("http://127.0.0.1{}", path))
        .map_err(|e| DriveError::AuthFlowError(format!("malformed redirect request: {}", e)))?;

    if let Some((_, reason)) = url.query_pairs().find(|(key, _)| key == "error") {
        return Err(DriveError::AuthFlowError(format!(
            "authorization was denied: {}",
            reason
        )));
    }

    url.query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| {
            DriveError::AuthFlowError("redirect did not include an authorization code".to_string())
        })
}
