//! Credential rotation: pick which API key to present on each model call.
//!
//! Keys live in a JSON file shared by every conversion running in the process.
//! Selection is deterministic: the wall clock is divided into buckets (one hour
//! or one minute) and the bucket index, modulo the number of eligible keys,
//! picks the key. Two requests in the same bucket use the same key.
//!
//! ## Concurrency
//!
//! The file is the source of truth. Every read and every read-modify-write
//! reloads it under the handle's lock, so a key flagged by another handle or
//! another process (e.g. `pdf2docx keys flag`) is never served again and is
//! not overwritten by this handle's next mutation. A mutation is applied to a
//! copy of the freshly loaded state, written to disk (temp file + rename), and
//! only then committed in memory; a failed write leaves file and memory
//! untouched. Writers in different processes serialise on an advisory lock
//! held on a `<store>.lock` file next to the store.

use crate::error::Pdf2DocxError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Supplies the credential to present for a provider on the next call.
pub trait KeyRotationProvider: Send + Sync {
    /// The current credential for `provider`, or `None` when no eligible
    /// key exists.
    fn current_credential(&self, provider: &str) -> Option<String>;
}

/// Size of the time bucket used for rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    /// Rotate once per hour. (default)
    #[default]
    Hourly,
    /// Rotate once per minute.
    PerMinute,
}

impl RotationStrategy {
    /// Bucket length in seconds.
    pub fn interval_secs(self) -> u64 {
        match self {
            RotationStrategy::Hourly => 3600,
            RotationStrategy::PerMinute => 60,
        }
    }
}

/// One stored API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: String,
    /// Provider name, e.g. `"gemini"` or `"openai"`.
    pub provider: String,
    pub key: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Set when the key is known to be compromised. Flagged keys are never
    /// selected.
    #[serde(default)]
    pub leaked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Credential {
    pub fn new(id: impl Into<String>, provider: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            key: key.into(),
            enabled: true,
            leaked: false,
            label: None,
        }
    }

    /// Enabled and not flagged.
    pub fn is_eligible(&self) -> bool {
        self.enabled && !self.leaked
    }

    /// The key with all but the last four characters hidden.
    pub fn masked_key(&self) -> String {
        let chars: Vec<char> = self.key.chars().collect();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - 4), tail)
    }
}

/// On-disk layout of the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub strategy: RotationStrategy,
    #[serde(default)]
    pub credentials: Vec<Credential>,
}

/// Index into `eligible` keys for the bucket containing `unix_secs`.
pub fn bucket_index(unix_secs: u64, strategy: RotationStrategy, eligible: usize) -> Option<usize> {
    if eligible == 0 {
        return None;
    }
    let bucket = unix_secs / strategy.interval_secs();
    Some((bucket % eligible as u64) as usize)
}

/// File-backed credential store with serialised access.
pub struct CredentialStore {
    path: Option<PathBuf>,
    state: Mutex<StoreState>,
}

impl CredentialStore {
    /// An in-memory store, never persisted.
    pub fn in_memory(state: StoreState) -> Self {
        Self {
            path: None,
            state: Mutex::new(state),
        }
    }

    /// Open the store at `path`. A missing file yields an empty store that is
    /// created on the first mutation.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Pdf2DocxError> {
        let path = path.as_ref().to_path_buf();
        let state = load(&path)?;
        info!(
            "Loaded {} credential(s) from {}",
            state.credentials.len(),
            path.display()
        );
        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// The backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// A snapshot of every stored credential.
    pub fn list(&self) -> Vec<Credential> {
        self.snapshot().credentials
    }

    pub fn strategy(&self) -> RotationStrategy {
        self.snapshot().strategy
    }

    /// The current state, reloaded from disk.
    ///
    /// An unreadable file keeps the last good state, with a warning.
    fn snapshot(&self) -> StoreState {
        let mut guard = self.state.lock();
        if let Some(ref path) = self.path {
            match load(path) {
                Ok(fresh) => *guard = fresh,
                Err(e) => warn!("Keeping cached credentials: {}", e),
            }
        }
        guard.clone()
    }

    /// Add a credential. Ids must be unique.
    pub fn add(&self, credential: Credential) -> Result<(), Pdf2DocxError> {
        self.update(|state| {
            if state.credentials.iter().any(|c| c.id == credential.id) {
                return Err(Pdf2DocxError::DuplicateCredential {
                    id: credential.id.clone(),
                });
            }
            state.credentials.push(credential);
            Ok(())
        })
    }

    /// Remove a credential by id.
    pub fn remove(&self, id: &str) -> Result<Credential, Pdf2DocxError> {
        self.update(|state| {
            let pos = state
                .credentials
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| Pdf2DocxError::CredentialNotFound { id: id.to_string() })?;
            Ok(state.credentials.remove(pos))
        })
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), Pdf2DocxError> {
        self.update(|state| {
            find_mut(state, id)?.enabled = enabled;
            Ok(())
        })
    }

    /// Flag a credential as leaked; it is never selected again until cleared.
    pub fn flag_leaked(&self, id: &str, leaked: bool) -> Result<(), Pdf2DocxError> {
        self.update(|state| {
            find_mut(state, id)?.leaked = leaked;
            Ok(())
        })?;
        if leaked {
            warn!("Credential '{}' flagged as leaked", id);
        }
        Ok(())
    }

    pub fn set_strategy(&self, strategy: RotationStrategy) -> Result<(), Pdf2DocxError> {
        self.update(|state| {
            state.strategy = strategy;
            Ok(())
        })
    }

    /// The credential selected for `provider` at time `now`.
    pub fn current_credential_at(&self, provider: &str, now: SystemTime) -> Option<Credential> {
        let state = self.snapshot();
        let eligible: Vec<&Credential> = state
            .credentials
            .iter()
            .filter(|c| c.provider.eq_ignore_ascii_case(provider) && c.is_eligible())
            .collect();
        let secs = now.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
        let idx = bucket_index(secs, state.strategy, eligible.len())?;
        let chosen = eligible[idx];
        debug!(
            "Rotation picked credential '{}' ({}/{}) for {}",
            chosen.id,
            idx + 1,
            eligible.len(),
            provider
        );
        Some(chosen.clone())
    }

    /// Reload, apply `f` to a copy of the state, persist it, then commit.
    ///
    /// The handle's mutex and an advisory lock on `<store>.lock` are held from
    /// the reload through the rename, so mutations from any thread or process
    /// are applied one after another.
    fn update<T>(
        &self,
        f: impl FnOnce(&mut StoreState) -> Result<T, Pdf2DocxError>,
    ) -> Result<T, Pdf2DocxError> {
        let mut guard = self.state.lock();
        let Some(ref path) = self.path else {
            let mut next = guard.clone();
            let out = f(&mut next)?;
            *guard = next;
            return Ok(out);
        };

        // Released on drop, after the rename.
        let _file_lock = lock_exclusive(path)?;
        let mut next = load(path)?;
        let out = f(&mut next)?;
        persist(path, &next)?;
        *guard = next;
        Ok(out)
    }
}

impl KeyRotationProvider for CredentialStore {
    fn current_credential(&self, provider: &str) -> Option<String> {
        self.current_credential_at(provider, SystemTime::now())
            .map(|c| c.key)
    }
}

fn find_mut<'a>(state: &'a mut StoreState, id: &str) -> Result<&'a mut Credential, Pdf2DocxError> {
    state
        .credentials
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or_else(|| Pdf2DocxError::CredentialNotFound { id: id.to_string() })
}

/// Read the store file. Missing or blank files are an empty store.
fn load(path: &Path) -> Result<StoreState, Pdf2DocxError> {
    match std::fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Ok(StoreState::default()),
        Ok(text) => {
            serde_json::from_str(&text).map_err(|e| Pdf2DocxError::CredentialStoreCorrupt {
                path: path.to_path_buf(),
                source: e,
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Credential store {} does not exist yet", path.display());
            Ok(StoreState::default())
        }
        Err(e) => Err(Pdf2DocxError::CredentialStoreIo {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Take the advisory lock guarding read-modify-write of the store at `path`.
fn lock_exclusive(path: &Path) -> Result<std::fs::File, Pdf2DocxError> {
    let mut lock_path = path.as_os_str().to_owned();
    lock_path.push(".lock");
    let lock_path = PathBuf::from(lock_path);
    let io_err = |e: std::io::Error| Pdf2DocxError::CredentialStoreIo {
        path: lock_path.clone(),
        source: e,
    };

    if let Some(dir) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(io_err)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(io_err)?;
    file.lock().map_err(io_err)?;
    Ok(file)
}

/// Atomic write: temp file in the same directory, then rename.
fn persist(path: &Path, state: &StoreState) -> Result<(), Pdf2DocxError> {
    let io_err = |e: std::io::Error| Pdf2DocxError::CredentialStoreIo {
        path: path.to_path_buf(),
        source: e,
    };
    let json = serde_json::to_vec_pretty(state)
        .map_err(|e| Pdf2DocxError::Internal(format!("serialise credential store: {e}")))?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(io_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
    std::io::Write::write_all(&mut tmp, &json).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
