//! Blob persistence for the encrypted secret record.
//!
//! Two fixed files in the app's private data directory: `secret.enc` holds
//! the ciphertext, `secret.iv` the IV. The pair is opaque to everything but
//! the keystore that produced it, and is only ever read back as a pair — a
//! record with either file missing does not exist.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::keystore::EncryptedSecret;

/// Ciphertext file name.
pub const SECRET_FILE_NAME: &str = "secret.enc";

/// IV file name.
pub const IV_FILE_NAME: &str = "secret.iv";

/// Storage for a single encrypted secret record.
pub trait SecretPersistence: Send + Sync {
    /// Persist ciphertext and IV together.
    fn write(&self, record: &EncryptedSecret) -> io::Result<()>;

    /// Read the record back. `Ok(None)` when either blob is missing.
    fn read(&self) -> io::Result<Option<EncryptedSecret>>;

    /// Remove both blobs. Removing an absent record succeeds.
    fn clear(&self) -> io::Result<()>;
}

/// File-backed record storage.
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    /// Store records under `dir`. The directory must already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn secret_path(&self) -> PathBuf {
        self.dir.join(SECRET_FILE_NAME)
    }

    fn iv_path(&self) -> PathBuf {
        self.dir.join(IV_FILE_NAME)
    }
}

/// Write a blob atomically: temp file in the same directory, then rename.
fn write_blob(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);
    std::fs::write(&temp_path, data)?;
    std::fs::rename(&temp_path, path)?;

    // Restrict to the owning user on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(path, perms)?;
    }

    Ok(())
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

impl SecretPersistence for FileSecretStore {
    fn write(&self, record: &EncryptedSecret) -> io::Result<()> {
        write_blob(&self.iv_path(), &record.iv)?;
        write_blob(&self.secret_path(), &record.ciphertext)?;
        debug!(
            "persisted secret record ({} ciphertext bytes) to {:?}",
            record.ciphertext.len(),
            self.dir
        );
        Ok(())
    }

    fn read(&self) -> io::Result<Option<EncryptedSecret>> {
        let secret_path = self.secret_path();
        let iv_path = self.iv_path();
        if !secret_path.exists() || !iv_path.exists() {
            warn!("no persisted secret record in {:?}", self.dir);
            return Ok(None);
        }

        let ciphertext = std::fs::read(&secret_path)?;
        let iv = std::fs::read(&iv_path)?;
        Ok(Some(EncryptedSecret { ciphertext, iv }))
    }

    fn clear(&self) -> io::Result<()> {
        remove_if_exists(&self.secret_path())?;
        remove_if_exists(&self.iv_path())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> EncryptedSecret {
        EncryptedSecret {
            ciphertext: vec![1, 2, 3, 4],
            iv: vec![9; 12],
        }
    }

    #[test]
    fn roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(dir.path());

        store.write(&record()).unwrap();
        let loaded = store.read().unwrap().unwrap();
        assert_eq!(loaded, record());
    }

    #[test]
    fn missing_record_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(dir.path());
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn partial_record_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(dir.path());
        store.write(&record()).unwrap();

        // Drop one half of the pair; the record no longer exists.
        std::fs::remove_file(dir.path().join(IV_FILE_NAME)).unwrap();
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(dir.path());
        store.write(&record()).unwrap();

        store.clear().unwrap();
        assert!(store.read().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn overwrite_replaces_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(dir.path());
        store.write(&record()).unwrap();

        let newer = EncryptedSecret {
            ciphertext: vec![5, 6],
            iv: vec![7; 12],
        };
        store.write(&newer).unwrap();
        assert_eq!(store.read().unwrap().unwrap(), newer);
    }
}
