//! Verbatim copy of the public directory.

use std::{fs, io, path::Path};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::routes::is_hidden;

/// Copy every file under `source` into `dest`, preserving structure.
///
/// Symlinks are followed and their target content copied. Dot-prefixed
/// files and directories are skipped. A missing source copies nothing, a
/// symlink cycle fails the copy.
pub fn copy_public(source: &Path, dest: &Path) -> io::Result<usize> {
    if !source.exists() {
        debug!(source = %source.display(), "public directory missing, skipping");
        return Ok(0);
    }

    info!(
        source = %source.display(),
        dest = %dest.display(),
        "copying public files"
    );

    fs::create_dir_all(dest)?;
    let mut copied = 0;
    let walker = WalkDir::new(source)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.loop_ancestor().is_none() && is_dangling(&e) => {
                warn!(error = %e, "skipping dangling symlink");
                continue;
            }
            Err(e) => return Err(io::Error::from(e)),
        };

        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
            debug!(src = %entry.path().display(), dest = %target.display(), "copied file");
            copied += 1;
        }
    }

    info!(count = copied, "public files copied");
    Ok(copied)
}

fn is_dangling(err: &walkdir::Error) -> bool {
    err.io_error()
        .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_copy_preserves_structure() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::create_dir_all(source.path().join("a/b")).unwrap();
        fs::write(source.path().join("top.txt"), "top").unwrap();
        fs::write(source.path().join("a/b/deep.txt"), "deep").unwrap();

        let copied = copy_public(source.path(), dest.path()).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(
            fs::read_to_string(dest.path().join("a/b/deep.txt")).unwrap(),
            "deep"
        );
    }

    #[test]
    fn test_skips_dot_entries() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::create_dir_all(source.path().join(".git")).unwrap();
        fs::write(source.path().join(".git/HEAD"), "ref").unwrap();
        fs::write(source.path().join(".env"), "SECRET=1").unwrap();
        fs::write(source.path().join("keep.txt"), "keep").unwrap();

        assert_eq!(copy_public(source.path(), dest.path()).unwrap(), 1);
        assert!(!dest.path().join(".git").exists());
        assert!(!dest.path().join(".env").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_fails() {
        let site = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let public = site.path().join("public");
        fs::create_dir_all(&public).unwrap();
        fs::write(public.join("a.txt"), "a").unwrap();
        std::os::unix::fs::symlink("..", public.join("up")).unwrap();

        let err = copy_public(&public, dest.path()).unwrap_err();

        assert!(err.to_string().contains("loop"));
        assert!(!dest.path().join("up/public/up").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_skipped() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        fs::write(source.path().join("keep.txt"), "keep").unwrap();
        std::os::unix::fs::symlink("gone.txt", source.path().join("broken.txt")).unwrap();

        assert_eq!(copy_public(source.path(), dest.path()).unwrap(), 1);
        assert!(!dest.path().join("broken.txt").exists());
    }

    #[test]
    fn test_missing_source() {
        let dest = TempDir::new().unwrap();
        let missing = dest.path().join("missing");
        assert_eq!(copy_public(&missing, dest.path()).unwrap(), 0);
    }
}
