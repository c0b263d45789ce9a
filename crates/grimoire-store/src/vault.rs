//! Content-addressable vault.
//!
//! Canonical bytes are stored at `{root}/objects/{prefix}/{hash}.json`,
//! where `prefix` is the first two hex characters of the hash. Puts are
//! idempotent: identical hash means identical content.
//!
//! Deletion is deferred to [`Vault::collect_garbage`], a mark-and-sweep
//! pass. Writers hold a [`VaultPin`] from the vault put until the store
//! commit that references the hash; the sweep takes the gate exclusively,
//! so it never observes a blob whose reference is still being written.

use grimoire_canonical::ContentHash;
use parking_lot::{RwLock, RwLockReadGuard};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::VaultError;
use crate::locks::{KeyedLocks, LockKey};

/// Default path-length limit: the most restrictive common target.
pub const DEFAULT_MAX_PATH_LEN: usize = 260;

/// Vault configuration.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Root directory.
    pub root: PathBuf,
    /// Longest entry path the target filesystems accept.
    pub max_path_len: usize,
}

impl VaultConfig {
    /// Configuration rooted at `root` with the default path limit.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_path_len: DEFAULT_MAX_PATH_LEN,
        }
    }
}

/// Source of the hashes that still have a live reference.
pub trait ReferenceSource {
    /// Every hash some record refers to.
    fn live_hashes(&self) -> BTreeSet<ContentHash>;
}

/// Rebuilds canonical bytes for a hash from the authoritative record.
pub trait Regenerator {
    /// Canonical bytes hashing to `hash`, if they can be rebuilt.
    fn regenerate(&self, hash: &ContentHash) -> Option<Vec<u8>>;
}

/// Shared hold on the vault gate. While any pin is held, garbage
/// collection waits.
pub struct VaultPin<'a> {
    _gate: RwLockReadGuard<'a, ()>,
}

/// What a mark-and-sweep pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GcReport {
    /// Entries examined.
    pub scanned: usize,
    /// Entries still referenced.
    pub kept: usize,
    /// Entries deleted.
    pub removed: Vec<ContentHash>,
}

/// Kind of integrity problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Stored bytes hash to something other than their key.
    Mismatch,
    /// A referenced hash has no stored entry.
    Missing,
    /// The entry could not be read.
    Unreadable,
}

/// One integrity problem and whether it was repaired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityIssue {
    /// Entry key.
    pub hash: ContentHash,
    /// Problem found.
    pub kind: IssueKind,
    /// Whether regeneration fixed it.
    pub repaired: bool,
    /// Detail for operators.
    pub detail: String,
}

/// Result of [`Vault::check_integrity`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VaultReport {
    /// Stored entries checked.
    pub checked: usize,
    /// Entries whose bytes match their key.
    pub healthy: usize,
    /// Problems found.
    pub issues: Vec<IntegrityIssue>,
}

impl VaultReport {
    /// Problems fixed by regeneration.
    pub fn repaired(&self) -> usize {
        self.issues.iter().filter(|i| i.repaired).count()
    }

    /// Problems left in place.
    pub fn unrecoverable(&self) -> usize {
        self.issues.len() - self.repaired()
    }
}

/// Filesystem content-addressable store.
pub struct Vault {
    config: VaultConfig,
    objects: PathBuf,
    gate: RwLock<()>,
    locks: KeyedLocks,
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

impl Vault {
    /// Opens the vault, creating its directories.
    ///
    /// Logs a warning when the longest entry path would exceed
    /// `max_path_len`.
    pub fn open(config: VaultConfig) -> Result<Self, VaultError> {
        let objects = config.root.join("objects");
        fs::create_dir_all(&objects)?;
        let vault = Self {
            config,
            objects,
            gate: RwLock::new(()),
            locks: KeyedLocks::new(),
        };
        let longest = vault.longest_path_len();
        if vault.path_too_long() {
            warn!(
                root = %vault.config.root.display(),
                longest,
                limit = vault.config.max_path_len,
                "vault entry paths exceed the path-length limit; move the vault root closer to the filesystem root"
            );
        }
        Ok(vault)
    }

    /// Vault configuration.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Length of the longest possible entry path.
    pub fn longest_path_len(&self) -> usize {
        let sample = ContentHash::of(b"");
        self.path_for(&sample).as_os_str().len()
    }

    /// Whether entry paths exceed the configured limit.
    pub fn path_too_long(&self) -> bool {
        self.longest_path_len() > self.config.max_path_len
    }

    /// Path of the entry for `hash`.
    pub fn path_for(&self, hash: &ContentHash) -> PathBuf {
        self.objects
            .join(hash.prefix())
            .join(format!("{}.json", hash.as_str()))
    }

    /// Holds off garbage collection until the pin is dropped.
    pub fn pin(&self) -> VaultPin<'_> {
        VaultPin {
            _gate: self.gate.read_recursive(),
        }
    }

    /// Stores `bytes` under `hash`. Returns whether a new entry was written.
    pub fn put(&self, hash: &ContentHash, bytes: &[u8]) -> Result<bool, VaultError> {
        let actual = ContentHash::of(bytes);
        if &actual != hash {
            return Err(VaultError::HashMismatch {
                expected: hash.clone(),
                actual,
            });
        }
        let _pin = self.pin();
        let _key = self.locks.lock(LockKey::Hash(hash.clone()));

        let path = self.path_for(hash);
        if path.exists() {
            return Ok(false);
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        write_atomic(&path, bytes)?;
        debug!(hash = %hash, bytes = bytes.len(), "stored vault entry");
        Ok(true)
    }

    /// Bytes stored under `hash`.
    pub fn get(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>, VaultError> {
        match fs::read(self.path_for(hash)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether an entry exists for `hash`.
    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.path_for(hash).is_file()
    }

    /// Every stored hash, sorted.
    pub fn list(&self) -> Result<Vec<ContentHash>, VaultError> {
        let mut hashes = Vec::new();
        for prefix in fs::read_dir(&self.objects)? {
            let prefix = prefix?.path();
            if !prefix.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&prefix)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                if let Some(hash) = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| ContentHash::new(s).ok())
                {
                    hashes.push(hash);
                }
            }
        }
        hashes.sort();
        Ok(hashes)
    }

    /// Deletes every entry `refs` no longer refers to.
    ///
    /// Runs with the gate held exclusively: no put or pinned store write
    /// can create a reference between reading the live set and deleting.
    pub fn collect_garbage(&self, refs: &dyn ReferenceSource) -> Result<GcReport, VaultError> {
        let _exclusive = self.gate.write();
        let live = refs.live_hashes();
        let mut report = GcReport::default();
        for hash in self.list()? {
            report.scanned += 1;
            if live.contains(&hash) {
                report.kept += 1;
                continue;
            }
            match fs::remove_file(self.path_for(&hash)) {
                Ok(()) => report.removed.push(hash),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        info!(scanned = report.scanned, kept = report.kept, removed = report.removed.len(), "vault garbage collected");
        Ok(report)
    }

    fn repair(&self, hash: &ContentHash, regen: &dyn Regenerator) -> Result<(), String> {
        let bytes = regen
            .regenerate(hash)
            .ok_or_else(|| "no record can regenerate this entry".to_string())?;
        if &ContentHash::of(&bytes) != hash {
            return Err("regenerated bytes hash differently".into());
        }
        let path = self.path_for(hash);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| e.to_string())?;
        }
        write_atomic(&path, &bytes).map_err(|e| e.to_string())
    }

    fn record_issue(
        &self,
        report: &mut VaultReport,
        hash: ContentHash,
        kind: IssueKind,
        detail: String,
        regen: &dyn Regenerator,
    ) {
        let (repaired, detail) = match self.repair(&hash, regen) {
            Ok(()) => (true, detail),
            Err(why) => (false, format!("{}; {}", detail, why)),
        };
        if repaired {
            info!(hash = %hash, ?kind, "vault entry regenerated");
        } else {
            warn!(hash = %hash, ?kind, detail = %detail, "vault entry unrecoverable");
        }
        report.issues.push(IntegrityIssue {
            hash,
            kind,
            repaired,
            detail,
        });
    }

    /// Recomputes every entry's hash and checks every referenced hash has
    /// an entry. Damaged or missing entries are regenerated where `regen`
    /// can rebuild them; the rest are reported. Per-entry failures never
    /// abort the pass.
    pub fn check_integrity(
        &self,
        refs: &dyn ReferenceSource,
        regen: &dyn Regenerator,
    ) -> Result<VaultReport, VaultError> {
        let _exclusive = self.gate.write();
        let mut report = VaultReport::default();
        let stored = self.list()?;

        for hash in &stored {
            report.checked += 1;
            match fs::read(self.path_for(hash)) {
                Ok(bytes) => {
                    let actual = ContentHash::of(&bytes);
                    if &actual == hash {
                        report.healthy += 1;
                    } else {
                        let detail = format!("stored bytes hash to {}", actual);
                        self.record_issue(&mut report, hash.clone(), IssueKind::Mismatch, detail, regen);
                    }
                }
                Err(e) => {
                    let detail = format!("read failed: {}", e);
                    self.record_issue(&mut report, hash.clone(), IssueKind::Unreadable, detail, regen);
                }
            }
        }

        let stored: BTreeSet<ContentHash> = stored.into_iter().collect();
        for hash in refs.live_hashes() {
            if !stored.contains(&hash) {
                self.record_issue(&mut report, hash, IssueKind::Missing, "no stored entry".into(), regen);
            }
        }

        info!(
            checked = report.checked,
            healthy = report.healthy,
            repaired = report.repaired(),
            unrecoverable = report.unrecoverable(),
            "vault integrity checked"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Refs(BTreeSet<ContentHash>);

    impl ReferenceSource for Refs {
        fn live_hashes(&self) -> BTreeSet<ContentHash> {
            self.0.clone()
        }
    }

    #[test]
    fn put_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let vault = Vault::open(VaultConfig::new(dir.path())).unwrap();
        let bytes = br#"{"name":"Sleep"}"#;
        let hash = ContentHash::of(bytes);
        assert!(vault.put(&hash, bytes).unwrap());
        assert!(!vault.put(&hash, bytes).unwrap());
        assert_eq!(vault.get(&hash).unwrap().unwrap(), bytes.to_vec());
        assert_eq!(vault.list().unwrap(), vec![hash.clone()]);
        assert!(vault.path_for(&hash).ends_with(format!("{}/{}.json", hash.prefix(), hash)));
    }

    #[test]
    fn put_rejects_wrong_key() {
        let dir = TempDir::new().unwrap();
        let vault = Vault::open(VaultConfig::new(dir.path())).unwrap();
        let hash = ContentHash::of(b"one");
        assert!(matches!(
            vault.put(&hash, b"two"),
            Err(VaultError::HashMismatch { .. })
        ));
        assert!(vault.get(&hash).unwrap().is_none());
    }

    #[test]
    fn long_root_is_flagged() {
        let dir = TempDir::new().unwrap();
        let config = VaultConfig {
            root: dir.path().to_path_buf(),
            max_path_len: 40,
        };
        let vault = Vault::open(config).unwrap();
        assert!(vault.path_too_long());

        let roomy = Vault::open(VaultConfig::new(dir.path())).unwrap();
        assert!(!roomy.path_too_long());
    }

    #[test]
    fn gc_keeps_live_entries() {
        let dir = TempDir::new().unwrap();
        let vault = Vault::open(VaultConfig::new(dir.path())).unwrap();
        let live = ContentHash::of(b"live");
        let dead = ContentHash::of(b"dead");
        vault.put(&live, b"live").unwrap();
        vault.put(&dead, b"dead").unwrap();

        let report = vault
            .collect_garbage(&Refs([live.clone()].into_iter().collect()))
            .unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.removed, vec![dead.clone()]);
        assert!(vault.contains(&live));
        assert!(!vault.contains(&dead));
    }
}
