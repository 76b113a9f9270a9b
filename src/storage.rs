//
// storage.rs
// Lab-Deidentify-rs
//
// Upload area for lab exports and their anonymized outputs, with path sanitization and content-hash naming.
//
// Thales Matheus Mendonça Santos - October 2026

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};

use crate::surrogate::DIGEST_LEN;

const FALLBACK_STEM: &str = "dataset";

#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).context("Failed to create upload directory")?;
        Ok(Self { root })
    }

    /// Stores an uploaded export as `<stem>-<hash>.txt` and returns that name.
    pub fn save(&self, original_name: Option<&str>, bytes: &[u8]) -> Result<String> {
        let stem = original_name
            .map(safe_stem)
            .unwrap_or_else(|| FALLBACK_STEM.to_string());

        let hash = hex::encode(Sha256::digest(bytes));
        let filename = format!("{}-{}.txt", stem, &hash[..DIGEST_LEN]);
        let path = self.root.join(&filename);
        fs::write(&path, bytes).context("Failed to persist uploaded file")?;
        Ok(filename)
    }

    /// Path of a stored file. Only bare file names that exist in the store are
    /// accepted; separators, `..` and absolute paths are refused outright.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => bail!("{:?} is not a stored file name", name),
        }
        let path = self.root.join(name);
        if !path.is_file() {
            bail!("Stored file {:?} not found", name);
        }
        Ok(path)
    }

    /// Deletes stored files last modified more than `max_age` ago and returns
    /// how many were removed.
    pub fn purge_older_than(&self, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        for entry in fs::read_dir(&self.root).context("Failed to list upload directory")? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let age = now
                .duration_since(meta.modified()?)
                .unwrap_or(Duration::ZERO);
            if age >= max_age {
                fs::remove_file(entry.path())
                    .with_context(|| format!("Failed to remove {:?}", entry.path()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Name and path for an output derived from a stored upload, e.g.
    /// `export-ab12-anonymized.csv`.
    pub fn derived_path(
        &self,
        source_name: &str,
        suffix: &str,
        extension: &str,
    ) -> (String, PathBuf) {
        let filename = format!("{}-{}.{}", safe_stem(source_name), suffix, extension);
        let path = self.root.join(&filename);
        (filename, path)
    }
}

fn safe_stem(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(sanitize_filename)
        .unwrap_or_default();
    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem
    }
}

fn sanitize_filename(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sanitize_strips_dangerous_characters() {
        let cleaned = sanitize_filename("../lab export 2024.txt");
        assert_eq!(cleaned, "labexport2024txt");
    }

    #[test]
    fn upload_name_carries_content_hash() {
        let root = tempdir().expect("tmpdir");
        let store = FileStore::new(root.path()).expect("store");

        let name = store.save(Some("All Dataset.txt"), b"abc").expect("save");
        assert_eq!(name, "AllDataset-ba7816bf8f01.txt");

        let unnamed = store.save(None, b"abc").expect("save");
        assert_eq!(unnamed, "dataset-ba7816bf8f01.txt");
    }

    #[test]
    fn derived_names_reuse_the_source_stem() {
        let root = tempdir().expect("tmpdir");
        let store = FileStore::new(root.path()).expect("store");
        let (name, path) = store.derived_path("export-ba7816bf8f01.txt", "mappings", "json");
        assert_eq!(name, "export-ba7816bf8f01-mappings.json");
        assert_eq!(path, root.path().join(&name));
    }

    #[test]
    fn only_bare_stored_names_resolve() {
        let root = tempdir().expect("tmpdir");
        let uploads = root.path().join("uploads");
        let store = FileStore::new(&uploads).expect("store");
        fs::write(root.path().join("AllDataset.txt"), b"1001\t55").expect("sibling export");

        let stored = store.save(Some("AllDataset.txt"), b"1001\t55").expect("save");
        assert_eq!(store.resolve(&stored).expect("stored"), uploads.join(&stored));

        for name in [
            "../AllDataset.txt",
            "nested/AllDataset.txt",
            "/etc/passwd",
            "..",
            "",
            "missing-ba7816bf8f01.txt",
        ] {
            assert!(store.resolve(name).is_err(), "{name:?} should not resolve");
        }
    }

    #[test]
    fn purge_removes_only_expired_files() {
        let root = tempdir().expect("tmpdir");
        let store = FileStore::new(root.path()).expect("store");
        let upload = store.save(Some("export.txt"), b"abc").expect("save");
        let (_, mappings) = store.derived_path(&upload, "mappings", "json");
        fs::write(&mappings, b"{}").expect("mappings");

        assert_eq!(store.purge_older_than(Duration::from_secs(3600)).expect("purge"), 0);
        assert!(store.resolve(&upload).is_ok());

        assert_eq!(store.purge_older_than(Duration::ZERO).expect("purge"), 2);
        assert!(store.resolve(&upload).is_err());
        assert!(!mappings.exists());
    }
}
