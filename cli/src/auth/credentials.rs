//! Account-keyed credential storage in a single JSON file.
//!
//! All accounts share one file, so every write reads the current file, merges
//! the change, and rewrites it. A missing directory is created with mode `0700` and
//! the file with mode `0600` on Unix. Concurrent writers from different
//! processes are not coordinated.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::tokens::Credential;
use crate::error::{AuthError, Result};

/// Raw file contents: account identifier to stored entry.
///
/// Entries stay as raw JSON so an entry this build cannot parse survives
/// writes to other accounts.
type StoreFile = BTreeMap<String, serde_json::Value>;

/// Credential storage backed by a JSON file shared between accounts.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Creates a store backed by the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the credential stored for `account`.
    ///
    /// A missing, unreadable or malformed file behaves like an empty store.
    #[must_use]
    pub fn load(&self, account: &str) -> Option<Credential> {
        let value = self.read_all().remove(account)?;
        match serde_json::from_value(value) {
            Ok(credential) => Some(credential),
            Err(e) => {
                tracing::warn!(account, "Ignoring unreadable credential entry: {e}");
                None
            }
        }
    }

    /// Lists the accounts that have an entry in the store.
    #[must_use]
    pub fn accounts(&self) -> Vec<String> {
        self.read_all().into_keys().collect()
    }

    /// Saves `credential` for `account`, preserving every other account.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, account: &str, credential: &Credential) -> Result<()> {
        let mut all = self.read_all();
        all.insert(account.to_string(), serde_json::to_value(credential)?);
        self.write_all(&all)?;
        tracing::debug!(account, kind = credential.kind(), "Saved credential");
        Ok(())
    }

    /// Removes the entry for `account`.
    ///
    /// Deletes the backing file when no accounts remain. No-op if the account
    /// has no entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be rewritten or removed.
    pub fn clear(&self, account: &str) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }

        let mut all = self.read_all();
        all.remove(account);

        if all.is_empty() {
            match fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(AuthError::CredentialStorage(format!(
                        "cannot remove {}: {e}",
                        self.path.display()
                    )))
                }
            }
            tracing::debug!(account, "Removed last credential, deleted store file");
        } else {
            self.write_all(&all)?;
            tracing::debug!(account, "Cleared credential");
        }

        Ok(())
    }

    fn read_all(&self) -> StoreFile {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StoreFile::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Cannot read credential store: {e}");
                return StoreFile::new();
            }
        };

        serde_json::from_str(&contents).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), "Credential store is malformed: {e}");
            StoreFile::new()
        })
    }

    fn write_all(&self, all: &StoreFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            // Only a directory created here is restricted; existing ones keep their mode.
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| self.storage_error(&e))?;
                restrict_permissions(parent, 0o700)?;
            }
        }

        let json = serde_json::to_string_pretty(all)?;
        fs::write(&self.path, json).map_err(|e| self.storage_error(&e))?;
        restrict_permissions(&self.path, 0o600)
    }

    fn storage_error(&self, err: &std::io::Error) -> AuthError {
        AuthError::CredentialStorage(format!("{}: {err}", self.path.display()))
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| AuthError::CredentialStorage(format!("{}: {e}", path.display())))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
const fn restrict_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tokens::TokenSet;
    use chrono::DateTime;
    use tempfile::TempDir;

    fn oauth_credential(token: &str) -> Credential {
        Credential::OAuth2(TokenSet {
            access_token: token.to_string(),
            refresh_token: Some(format!("{token}-refresh")),
            expires_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        })
    }

    fn store_in(dir: &TempDir) -> CredentialStore {
        CredentialStore::new(dir.path().join("nested").join("credentials.json"))
    }

    #[test]
    fn load_from_missing_file_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        assert!(store.load("a@example.ac.uk").is_none());
        assert!(store.accounts().is_empty());
    }

    #[test]
    fn saves_preserve_other_accounts() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);

        let a = oauth_credential("token-a");
        let b = Credential::Basic {
            password: "pw-b".to_string(),
        };
        store.save("a@example.ac.uk", &a).unwrap();
        store.save("b@example.ac.uk", &b).unwrap();

        assert_eq!(store.load("a@example.ac.uk"), Some(a));
        assert_eq!(store.load("b@example.ac.uk"), Some(b));
        assert_eq!(store.accounts(), vec!["a@example.ac.uk", "b@example.ac.uk"]);
    }

    #[test]
    fn clear_keeps_remaining_accounts() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);

        store.save("a", &oauth_credential("token-a")).unwrap();
        store.save("b", &oauth_credential("token-b")).unwrap();
        store.clear("a").unwrap();

        assert!(store.load("a").is_none());
        assert_eq!(store.load("b"), Some(oauth_credential("token-b")));
        assert!(store.path().exists());
    }

    #[test]
    fn clearing_last_account_removes_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);

        store.save("a", &oauth_credential("token-a")).unwrap();
        store.clear("a").unwrap();

        assert!(!store.path().exists());
        store.clear("a").unwrap();
    }

    #[test]
    fn malformed_file_is_treated_as_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();

        assert!(store.load("a").is_none());

        store.save("a", &oauth_credential("token-a")).unwrap();
        assert_eq!(store.load("a"), Some(oauth_credential("token-a")));
    }

    #[test]
    fn unknown_entries_survive_other_writes() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), r#"{"legacy": {"auth_type": "kerberos"}}"#).unwrap();

        assert!(store.load("legacy").is_none());
        store.save("a", &oauth_credential("token-a")).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["legacy"]["auth_type"], "kerberos");
    }

    #[cfg(unix)]
    #[test]
    fn files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        store.save("a", &oauth_credential("token-a")).unwrap();

        let file_mode = fs::metadata(store.path()).unwrap().permissions().mode();
        let dir_mode = fs::metadata(store.path().parent().unwrap())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(file_mode & 0o777, 0o600);
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[cfg(unix)]
    #[test]
    fn existing_directory_keeps_its_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let shared = temp_dir.path().join("shared");
        fs::create_dir(&shared).unwrap();
        fs::set_permissions(&shared, fs::Permissions::from_mode(0o755)).unwrap();

        let store = CredentialStore::new(shared.join("credentials.json"));
        store.save("a", &oauth_credential("token-a")).unwrap();
        store.save("b", &oauth_credential("token-b")).unwrap();

        let dir_mode = fs::metadata(&shared).unwrap().permissions().mode();
        let file_mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o755);
        assert_eq!(file_mode & 0o777, 0o600);
    }
}
