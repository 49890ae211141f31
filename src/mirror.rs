//! Mirrors a local directory tree into a Google Drive folder hierarchy.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::client::{DriveClient, UpsertAction};
use crate::error::{DriveError, Result};

/// Mirror `local_root` into Drive: a top-level folder named after the root's
/// final path segment, the local folder structure recreated beneath it, and
/// every file uploaded or replaced by name.
///
/// The walk is top-down and depth-first, with directory entries processed in
/// lexicographic order. Each visited directory re-resolves its folder chain
/// from the top-level folder; remote folder lookup is idempotent, so shared
/// ancestors resolve to the same identifiers.
pub async fn mirror_tree(client: &DriveClient, local_root: &Path) -> Result<()> {
    let root_name = root_folder_name(local_root)?;
    let top_level_id = client.resolve_folder(&root_name, None).await?;
    debug!("mirroring '{}' into folder {}", root_name, top_level_id);

    let mut pending = vec![local_root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut folder_id = top_level_id.clone();
        for segment in relative_segments(local_root, &dir)? {
            folder_id = client.resolve_folder(&segment, Some(&folder_id)).await?;
        }

        let (subdirs, files) = directory_entries(&dir)?;

        for file in &files {
            let (action, metadata) = client.upsert_file(&folder_id, file).await?;
            let name = file.file_name().unwrap_or_default().to_string_lossy();
            match action {
                UpsertAction::Updated => println!("Updated: {} (File ID: {})", name, metadata.id),
                UpsertAction::Uploaded => println!("Uploaded: {} (File ID: {})", name, metadata.id),
            }
        }

        // LIFO stack: push in reverse so subdirectories are visited in
        // lexicographic order.
        for subdir in subdirs.into_iter().rev() {
            pending.push(subdir);
        }
    }

    println!("\nAll files uploaded/replaced successfully!");
    Ok(())
}

/// Name for the top-level remote folder: the root's final path segment.
/// Canonicalizes first so `.` and trailing separators resolve to a real
/// directory name.
fn root_folder_name(local_root: &Path) -> Result<String> {
    let normalized = local_root.canonicalize()?;
    normalized
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| DriveError::InvalidFileName(local_root.display().to_string()))
}

/// Path segments of `dir` relative to `root`, as folder names.
fn relative_segments(root: &Path, dir: &Path) -> Result<Vec<String>> {
    let relative = dir
        .strip_prefix(root)
        .map_err(|_| DriveError::InvalidFileName(dir.display().to_string()))?;

    relative
        .components()
        .map(|component| match component {
            Component::Normal(part) => part
                .to_str()
                .map(str::to_string)
                .ok_or_else(|| DriveError::InvalidFileName(dir.display().to_string())),
            _ => Err(DriveError::InvalidFileName(dir.display().to_string())),
        })
        .collect()
}

/// Split a directory's entries into subdirectories and files, each sorted by
/// name. Filesystem enumeration order is not stable across platforms.
fn directory_entries(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut subdirs = Vec::new();
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            subdirs.push(entry.path());
        } else {
            files.push(entry.path());
        }
    }

    subdirs.sort();
    files.sort();
    Ok((subdirs, files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_relative_segments_of_root() {
        let root = Path::new("/tmp/proj");
        assert_eq!(relative_segments(root, root).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_relative_segments_nested() {
        let root = Path::new("/tmp/proj");
        let dir = Path::new("/tmp/proj/sub/inner");
        assert_eq!(relative_segments(root, dir).unwrap(), vec!["sub", "inner"]);
    }

    #[test]
    fn test_relative_segments_outside_root() {
        let root = Path::new("/tmp/proj");
        let dir = Path::new("/tmp/other");
        assert!(relative_segments(root, dir).is_err());
    }

    #[test]
    fn test_root_folder_name_resolves_dot_components() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("proj");
        fs::create_dir(&dir).unwrap();

        assert_eq!(root_folder_name(&dir).unwrap(), "proj");
        assert_eq!(root_folder_name(&dir.join(".")).unwrap(), "proj");
    }

    #[test]
    fn test_directory_entries_sorted() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("zeta")).unwrap();
        fs::create_dir(tmp.path().join("alpha")).unwrap();
        fs::write(tmp.path().join("b.txt"), "b").unwrap();
        fs::write(tmp.path().join("a.txt"), "a").unwrap();

        let (subdirs, files) = directory_entries(tmp.path()).unwrap();

        let subdir_names: Vec<_> = subdirs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        let file_names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(subdir_names, vec!["alpha", "zeta"]);
        assert_eq!(file_names, vec!["a.txt", "b.txt"]);
    }
}
