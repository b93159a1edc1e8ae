// SPDX-License-Identifier: MIT OR Apache-2.0
//! Safe, collision-avoiding, atomic materialization of a received file.
//!
//! Guards the invariant that materialized filenames never escape the
//! configured receive directory: only the basename of the claimed
//! filename is ever used, and the write lands via a temp file + rename
//! within that same directory so a crash mid-write never leaves a
//! partial file at the final path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Writes `data` under `dir` using the basename of `claimed_name`,
/// appending `_1`, `_2`, ... before the extension on collision. Returns
/// the path actually written.
pub fn materialize(dir: &Path, claimed_name: &str, data: &[u8]) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let basename = basename_of(claimed_name);
    let target = unique_path(dir, &basename);

    let tmp_path = dir.join(format!(".{basename}.partial"));
    fs::write(&tmp_path, data)?;
    fs::rename(&tmp_path, &target)?;
    Ok(target)
}

/// Extracts a filesystem-safe basename: no directory components, no `..`.
fn basename_of(claimed_name: &str) -> String {
    let name = Path::new(claimed_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." {
        "received_file".to_string()
    } else {
        name
    }
}

/// Finds the first non-existing path for `basename` under `dir`, trying
/// `name`, `name_1`, `name_2`, ... before the extension.
fn unique_path(dir: &Path, basename: &str) -> PathBuf {
    let candidate = dir.join(basename);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(basename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| basename.to_string());
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut counter = 1u32;
    loop {
        let candidate_name = match &ext {
            Some(ext) => format!("{stem}_{counter}.{ext}"),
            None => format!("{stem}_{counter}"),
        };
        let candidate = dir.join(candidate_name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_file_with_exact_bytes() {
        let dir = tempdir().unwrap();
        let path = materialize(dir.path(), "hello.txt", b"hello").unwrap();
        assert_eq!(path, dir.path().join("hello.txt"));
        assert_eq!(fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn rejects_path_traversal_in_claimed_name() {
        let dir = tempdir().unwrap();
        let path = materialize(dir.path(), "../../etc/passwd", b"pwned").unwrap();
        assert_eq!(path, dir.path().join("passwd"));
        assert!(path.starts_with(dir.path()));
    }

    #[test]
    fn collision_gets_numeric_suffix_before_extension() {
        let dir = tempdir().unwrap();
        let first = materialize(dir.path(), "report.pdf", b"one").unwrap();
        let second = materialize(dir.path(), "report.pdf", b"two").unwrap();
        assert_eq!(first, dir.path().join("report.pdf"));
        assert_eq!(second, dir.path().join("report_1.pdf"));
        assert_eq!(fs::read(first).unwrap(), b"one");
        assert_eq!(fs::read(second).unwrap(), b"two");
    }

    #[test]
    fn multiple_collisions_increment_suffix() {
        let dir = tempdir().unwrap();
        materialize(dir.path(), "a.bin", b"1").unwrap();
        materialize(dir.path(), "a.bin", b"2").unwrap();
        let third = materialize(dir.path(), "a.bin", b"3").unwrap();
        assert_eq!(third, dir.path().join("a_2.bin"));
    }

    #[test]
    fn unicode_and_space_filenames_are_preserved() {
        let dir = tempdir().unwrap();
        let path = materialize(dir.path(), "résumé final.txt", b"x").unwrap();
        assert_eq!(path, dir.path().join("résumé final.txt"));
    }

    #[test]
    fn empty_claimed_name_falls_back_to_placeholder() {
        let dir = tempdir().unwrap();
        let path = materialize(dir.path(), "", b"x").unwrap();
        assert_eq!(path, dir.path().join("received_file"));
    }
}
