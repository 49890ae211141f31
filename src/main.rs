//! drive_mirror CLI - mirror a local directory tree into Google Drive.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use drive_mirror::{mirror_tree, Authenticator, DriveClient};

/// Mirror a local directory tree into a Google Drive folder hierarchy.
#[derive(Parser)]
#[command(name = "drive_mirror")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Local directory to mirror. Defaults to the current working directory.
    path: Option<String>,

    /// Path to the OAuth client secrets JSON file.
    #[arg(long, env = "GDRIVE_CREDENTIALS_PATH", default_value = "credentials.json")]
    credentials: PathBuf,

    /// Enable debug logging.
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let local_root = match cli.path.as_deref() {
        Some(raw) => PathBuf::from(strip_quotes(raw)),
        None => std::env::current_dir().context("Failed to resolve the current working directory")?,
    };

    if !local_root.is_dir() {
        eprintln!("Error: '{}' is not a valid directory.", local_root.display());
        process::exit(1);
    }

    println!("Uploading files from: {}", local_root.display());

    let auth = Authenticator::from_file(&cli.credentials, Authenticator::default_token_path())?;
    let token = auth
        .authorize()
        .await
        .context("Failed to authenticate with Google Drive")?;

    let client = DriveClient::new(token);
    mirror_tree(&client, &local_root)
        .await
        .with_context(|| format!("Failed to mirror {}", local_root.display()))?;

    Ok(())
}

/// Strip surrounding quote characters a shell may have left on the argument.
fn strip_quotes(raw: &str) -> &str {
    raw.trim_matches('"').trim_matches('\'')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_quotes_double() {
        assert_eq!(strip_quotes("\"/tmp/my dir\""), "/tmp/my dir");
    }

    #[test]
    fn test_strip_quotes_single() {
        assert_eq!(strip_quotes("'/tmp/my dir'"), "/tmp/my dir");
    }

    #[test]
    fn test_strip_quotes_unquoted() {
        assert_eq!(strip_quotes("/tmp/plain"), "/tmp/plain");
    }
}
