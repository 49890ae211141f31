//! Google Drive API client: folder resolution and file upserts.

use std::path::Path;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Body, Client, RequestBuilder, Response};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::{DriveError, Result};
use crate::models::{ApiErrorResponse, FileListResponse, FileMetadata};

/// Base URL for Google Drive API v3.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Upload URL for Google Drive API v3.
const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// MIME type Drive uses to mark folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// What an upsert did to the remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    /// A new remote file was created.
    Uploaded,
    /// An existing remote file's content was replaced in place.
    Updated,
}

/// Client for interacting with Google Drive, bound to one access token.
pub struct DriveClient {
    access_token: String,
    api_base: String,
    upload_base: String,
    http: Client,
}

impl DriveClient {
    /// Create a new DriveClient bound to `access_token`.
    pub fn new(access_token: String) -> Self {
        Self::with_base_urls(
            access_token,
            DRIVE_API_BASE.to_string(),
            UPLOAD_API_BASE.to_string(),
        )
    }

    /// Create a DriveClient against alternate API endpoints. Used by tests
    /// to point at a mock server.
    pub fn with_base_urls(access_token: String, api_base: String, upload_base: String) -> Self {
        Self {
            access_token,
            api_base,
            upload_base,
            http: Client::new(),
        }
    }

    /// Query files using Google Drive query syntax, following pagination.
    pub async fn query_files(&self, query: &str) -> Result<Vec<FileMetadata>> {
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(format!("{}/files", self.api_base))
                .bearer_auth(&self.access_token)
                .query(&[
                    ("q", query),
                    ("spaces", "drive"),
                    ("fields", "nextPageToken, files(id, name, mimeType)"),
                ]);

            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(api_error(response).await);
            }

            let list_response: FileListResponse = response.json().await?;
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_files)
    }

    /// Find a folder named `name` under `parent_id` (or at the drive root),
    /// creating it if it does not exist. Returns the folder ID.
    ///
    /// Duplicate folders with the same name are not detected; the first
    /// match wins.
    pub async fn resolve_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
        let mut query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            escape_query_term(name),
            FOLDER_MIME_TYPE
        );
        if let Some(parent) = parent_id {
            query.push_str(&format!(" and '{}' in parents", parent));
        }

        let folders = self.query_files(&query).await?;
        if let Some(existing) = folders.into_iter().next() {
            debug!("folder '{}' already exists with id {}", name, existing.id);
            return Ok(existing.id);
        }

        self.create_folder(name, parent_id).await
    }

    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
        let mut metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
        });
        if let Some(parent) = parent_id {
            metadata["parents"] = serde_json::json!([parent]);
        }

        let response = self
            .http
            .post(format!("{}/files", self.api_base))
            .bearer_auth(&self.access_token)
            .query(&[("fields", "id, name")])
            .json(&metadata)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let created: FileMetadata = response.json().await?;
        debug!("created folder '{}' with id {}", name, created.id);
        Ok(created.id)
    }

    /// Find a file by name in a folder. The first match wins.
    pub async fn find_file(&self, name: &str, folder_id: &str) -> Result<Option<FileMetadata>> {
        let query = format!(
            "name = '{}' and trashed = false and '{}' in parents",
            escape_query_term(name),
            folder_id
        );
        let files = self.query_files(&query).await?;
        Ok(files.into_iter().next())
    }

    /// Upload `local_path` into `folder_id`, replacing the content of an
    /// existing remote file with the same name in place.
    pub async fn upsert_file<P: AsRef<Path>>(
        &self,
        folder_id: &str,
        local_path: P,
    ) -> Result<(UpsertAction, FileMetadata)> {
        let local_path = local_path.as_ref();
        let filename = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DriveError::InvalidFileName(local_path.display().to_string()))?;

        let mime_type = mime_guess::from_path(local_path)
            .first_or_octet_stream()
            .to_string();
        let size = tokio::fs::metadata(local_path).await?.len();

        match self.find_file(filename, folder_id).await? {
            Some(existing) => {
                let updated = self
                    .replace_content(&existing.id, local_path, &mime_type, size)
                    .await?;
                Ok((UpsertAction::Updated, updated))
            }
            None => {
                let created = self
                    .create_file(folder_id, filename, local_path, &mime_type, size)
                    .await?;
                Ok((UpsertAction::Uploaded, created))
            }
        }
    }

    async fn create_file(
        &self,
        folder_id: &str,
        filename: &str,
        local_path: &Path,
        mime_type: &str,
        size: u64,
    ) -> Result<FileMetadata> {
        let metadata = serde_json::json!({
            "name": filename,
            "parents": [folder_id],
        });

        let request = self.http.post(format!("{}/files", self.upload_base));
        let upload_url = self
            .start_resumable_session(request, &metadata, mime_type, size)
            .await?;

        self.put_content(&upload_url, local_path, mime_type, size).await
    }

    async fn replace_content(
        &self,
        file_id: &str,
        local_path: &Path,
        mime_type: &str,
        size: u64,
    ) -> Result<FileMetadata> {
        // No metadata changes; only the content is replaced.
        let metadata = serde_json::json!({});

        let request = self
            .http
            .patch(format!("{}/files/{}", self.upload_base, file_id));
        let upload_url = self
            .start_resumable_session(request, &metadata, mime_type, size)
            .await?;

        self.put_content(&upload_url, local_path, mime_type, size).await
    }

    /// Initiate a resumable upload session and return the session URL.
    async fn start_resumable_session(
        &self,
        request: RequestBuilder,
        metadata: &serde_json::Value,
        mime_type: &str,
        size: u64,
    ) -> Result<String> {
        let response = request
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "resumable"), ("fields", "id, name")])
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", size.to_string())
            .json(metadata)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| DriveError::ApiError {
                status: 500,
                message: "resumable session response had no upload URL".to_string(),
            })
    }

    /// Stream the file's bytes to a resumable session URL.
    async fn put_content(
        &self,
        upload_url: &str,
        local_path: &Path,
        mime_type: &str,
        size: u64,
    ) -> Result<FileMetadata> {
        let file = File::open(local_path).await?;
        let stream = ReaderStream::new(file);

        let response = self
            .http
            .put(upload_url)
            .bearer_auth(&self.access_token)
            .header(CONTENT_TYPE, mime_type)
            .header(CONTENT_LENGTH, size)
            .body(Body::wrap_stream(stream))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let metadata: FileMetadata = response.json().await?;
        Ok(metadata)
    }
}

/// Map a non-2xx response to an error, decoding the Google error envelope
/// when the body carries one.
async fn api_error(response: Response) -> DriveError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&body) {
        return DriveError::ApiError {
            status: api_error.error.code,
            message: api_error.error.message,
        };
    }
    DriveError::ApiError {
        status: status.as_u16(),
        message: body,
    }
}

/// Escape a value for interpolation into a Drive query string.
fn escape_query_term(term: &str) -> String {
    term.replace('\\', "\\\\").replace('\'', "\\'")
}
