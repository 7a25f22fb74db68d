use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Result, StoreError};
use crate::models::Document;

/// A single JSON file standing in for a database.
///
/// One reader/writer lock guards every access to the file: reads share it,
/// writes, clears and read-modify-write transactions hold it exclusively.
/// There is no coordination with other processes using the same file.
pub struct FlatStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FlatStore {
    /// Open the store at `path`, creating an empty file if none exists.
    pub fn open(path: &Path) -> Result<Self> {
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            return Err(StoreError::InvalidPath(path.to_path_buf()));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            lock: RwLock::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file contents. An empty vector means nothing has been written yet.
    pub fn read(&self) -> Result<Vec<u8>> {
        let _guard = self.shared()?;
        self.read_bytes()
    }

    /// Parsed document, or `None` while the file is still empty.
    pub fn read_document(&self) -> Result<Option<Document>> {
        let _guard = self.shared()?;
        self.load()
    }

    /// Replace the whole file with `doc`.
    ///
    /// Last write wins. Prefer [`FlatStore::update`], which reads the current
    /// document under the same lock before writing it back.
    pub fn write(&self, doc: &Document) -> Result<()> {
        let _guard = self.exclusive()?;
        self.persist(doc)
    }

    /// Truncate the file back to the "no data yet" state.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.exclusive()?;
        fs::File::create(&self.path)?;
        Ok(())
    }

    /// Run `f` against the current document under the shared lock.
    pub fn view<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Option<&Document>) -> Result<T>,
    {
        let _guard = self.shared()?;
        let doc = self.load()?;
        f(doc.as_ref())
    }

    /// Read-merge-write transaction.
    ///
    /// Holds the exclusive lock across the whole cycle: the current document
    /// (or an empty one) is handed to `f`, and is written back only if `f`
    /// succeeds. Collections `f` does not touch are written back unchanged.
    pub fn update<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Document) -> Result<T>,
    {
        let _guard = self.exclusive()?;
        let mut doc = self.load()?.unwrap_or_default();
        let out = f(&mut doc)?;
        self.persist(&doc)?;
        Ok(out)
    }

    fn shared(&self) -> Result<RwLockReadGuard<'_, ()>> {
        self.lock.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn exclusive(&self) -> Result<RwLockWriteGuard<'_, ()>> {
        self.lock.write().map_err(|_| StoreError::LockPoisoned)
    }

    fn read_bytes(&self) -> Result<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn load(&self) -> Result<Option<Document>> {
        let bytes = self.read_bytes()?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    // Write to a sibling file and rename over the target so readers never
    // observe a half-written document.
    fn persist(&self, doc: &Document) -> Result<()> {
        let data = serde_json::to_vec(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&data)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chirp, RevokedToken, User};

    fn open_temp() -> (tempfile::TempDir, FlatStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatStore::open(&dir.path().join("db.json")).unwrap();
        (dir, store)
    }

    fn sample_document() -> Document {
        Document {
            chirps: vec![
                Chirp { id: 1, author_id: 1, body: "first".into() },
                Chirp { id: 2, author_id: 2, body: "second".into() },
            ],
            users: vec![User {
                id: 1,
                email: "a@example.com".into(),
                password_hash: "hash".into(),
                is_chirpy_red: true,
            }],
            tokens: vec![RevokedToken {
                id: "tok".into(),
                revoked_at: chrono::Utc::now(),
            }],
            other: Default::default(),
        }
    }

    #[test]
    fn new_store_is_empty() {
        let (_dir, store) = open_temp();
        assert!(store.read().unwrap().is_empty());
        assert!(store.read_document().unwrap().is_none());
    }

    #[test]
    fn rejects_non_json_path() {
        let dir = tempfile::tempdir().unwrap();
        let result = FlatStore::open(&dir.path().join("db.txt"));
        assert!(matches!(result, Err(StoreError::InvalidPath(_))));
    }

    #[test]
    fn creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("db.json");
        FlatStore::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn write_then_read_roundtrip() {
        let (_dir, store) = open_temp();
        let doc = sample_document();
        store.write(&doc).unwrap();

        assert_eq!(store.read_document().unwrap(), Some(doc));
    }

    #[test]
    fn reopen_sees_persisted_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let doc = sample_document();
        FlatStore::open(&path).unwrap().write(&doc).unwrap();

        let reopened = FlatStore::open(&path).unwrap();
        assert_eq!(reopened.read_document().unwrap(), Some(doc));
    }

    #[test]
    fn clear_truncates() {
        let (_dir, store) = open_temp();
        store.write(&sample_document()).unwrap();
        store.clear().unwrap();
        assert!(store.read_document().unwrap().is_none());
    }

    #[test]
    fn update_preserves_untouched_collections() {
        let (_dir, store) = open_temp();
        store.write(&sample_document()).unwrap();

        store
            .update(|doc| {
                doc.chirps.clear();
                Ok(())
            })
            .unwrap();

        let doc = store.read_document().unwrap().unwrap();
        assert!(doc.chirps.is_empty());
        assert_eq!(doc.users.len(), 1);
        assert_eq!(doc.tokens.len(), 1);
    }

    #[test]
    fn update_keeps_unknown_top_level_keys() {
        let (_dir, store) = open_temp();
        fs::write(store.path(), br#"{"chirps":[],"settings":{"theme":"dark"}}"#).unwrap();

        store
            .update(|doc| {
                doc.chirps.push(Chirp { id: 1, author_id: 1, body: "hi".into() });
                Ok(())
            })
            .unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&store.read().unwrap()).unwrap();
        assert_eq!(raw["settings"]["theme"], "dark");
        assert_eq!(raw["chirps"][0]["body"], "hi");
    }

    #[test]
    fn failed_update_does_not_write() {
        let (_dir, store) = open_temp();
        let result: Result<()> = store.update(|doc| {
            doc.chirps.push(Chirp { id: 1, author_id: 1, body: "lost".into() });
            Err(StoreError::Invalid("nope"))
        });
        assert!(result.is_err());
        assert!(store.read().unwrap().is_empty());
    }

    #[test]
    fn malformed_json_is_reported() {
        let (_dir, store) = open_temp();
        fs::write(store.path(), b"{not json").unwrap();
        assert!(matches!(store.read_document(), Err(StoreError::Json(_))));
    }

    #[test]
    fn legacy_password_field_is_accepted() {
        let (_dir, store) = open_temp();
        fs::write(
            store.path(),
            br#"{"users":[{"id":1,"email":"a@example.com","password":"h"}]}"#,
        )
        .unwrap();

        let doc = store.read_document().unwrap().unwrap();
        assert_eq!(doc.users[0].password_hash, "h");
        assert!(!doc.users[0].is_chirpy_red);
        assert!(doc.chirps.is_empty());
    }
}
