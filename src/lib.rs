//! drive_mirror - Mirror a local directory tree into Google Drive.
//!
//! This library provides functionality to:
//! - Authenticate against the Drive API (cached token, silent refresh, or
//!   interactive consent flow)
//! - Find or create remote folders matching the local directory structure
//! - Upload files, replacing the content of files that already exist by name
//!
//! # Example
//!
//! ```no_run
//! use drive_mirror::{mirror_tree, Authenticator, DriveClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = Authenticator::from_file(
//!         "credentials.json",
//!         Authenticator::default_token_path(),
//!     )?;
//!     let client = DriveClient::new(auth.authorize().await?);
//!
//!     mirror_tree(&client, std::path::Path::new("./my-project")).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod mirror;
pub mod models;

// Re-exports for convenience
pub use auth::Authenticator;
pub use client::{DriveClient, UpsertAction};
pub use error::{DriveError, Result};
pub use mirror::mirror_tree;
pub use models::FileMetadata;
