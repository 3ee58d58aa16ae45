use crate::descriptor::DescriptorError;
use crate::resolve::{Input, ResolvedDescriptor};
use crate::types::{InputName, Revision, ShortId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub const LOCK_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),
    #[error("lock file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("lock file parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("lock file serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("unsupported lock_version: {0}, expected {LOCK_VERSION}")]
    UnsupportedVersion(u32),
    #[error("input '{0}' is not pinned and no revision was supplied")]
    Unpinned(String),
    #[error("input '{input}' is already pinned to '{declared}' in the descriptor, refusing '{requested}'")]
    AlreadyPinned {
        input: String,
        declared: String,
        requested: String,
    },
    #[error("input '{0}' does not take a revision")]
    RevisionUnsupported(String),
    #[error("lock file lock_id mismatch: lock has '{lock_id}', recomputed '{computed_id}'")]
    LockIdMismatch {
        lock_id: String,
        computed_id: String,
    },
    #[error("lock file descriptor drift: {0}")]
    DescriptorDrift(String),
}

/// One input as recorded in the lock file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockedInput {
    pub name: String,
    /// Declared locator with any revision stripped.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub follows: BTreeMap<String, String>,
}

/// The lock file records the exact revision of every input.
///
/// Revisions come from the descriptor itself or, for inputs declared without
/// one, from the caller (typically the external resolver that fetched them).
/// The lock id is a hash over the locked inputs only, so editing shells or
/// overlays does not invalidate a lock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockFile {
    pub lock_version: u32,
    pub lock_id: String,
    pub short_id: String,
    pub inputs: Vec<LockedInput>,
}

impl LockFile {
    /// Lock every input of `descriptor`.
    ///
    /// `revisions` supplies revisions for inputs the descriptor leaves
    /// unpinned. Supplying one for an input that already declares a
    /// different revision is an error, as is naming an undeclared input.
    pub fn from_descriptor(
        descriptor: &ResolvedDescriptor,
        revisions: &BTreeMap<InputName, Revision>,
    ) -> Result<Self, LockError> {
        for name in revisions.keys() {
            if descriptor.input(name).is_none() {
                return Err(DescriptorError::UnresolvedInput {
                    input: name.to_string(),
                    referrer: "lock revisions".to_owned(),
                }
                .into());
            }
        }

        let mut inputs = Vec::new();
        for input in descriptor.inputs() {
            inputs.push(lock_input(input, revisions.get(&input.name))?);
        }

        let lock = LockFile {
            lock_version: LOCK_VERSION,
            lock_id: String::new(), // computed below
            short_id: String::new(),
            inputs,
        };

        let (lock_id, short_id) = lock.compute_lock_id();
        debug!("locked {} inputs as {short_id}", lock.inputs.len());
        Ok(LockFile {
            lock_id,
            short_id: short_id.into_inner(),
            ..lock
        })
    }

    /// Hash the locked inputs in name order, whatever order the file lists them in.
    pub fn compute_lock_id(&self) -> (String, ShortId) {
        let mut inputs: Vec<&LockedInput> = self.inputs.iter().collect();
        inputs.sort_by(|a, b| a.name.cmp(&b.name));

        let mut hasher = blake3::Hasher::new();
        hasher.update(format!("lock_version:{}", self.lock_version).as_bytes());
        for input in inputs {
            hasher.update(format!("input:{}:{}", input.name, input.url).as_bytes());
            if let Some(rev) = &input.rev {
                hasher.update(format!("rev:{}:{rev}", input.name).as_bytes());
            }
            for (sub_input, target) in &input.follows {
                hasher.update(format!("follows:{}:{sub_input}:{target}", input.name).as_bytes());
            }
        }
        let hex = hasher.finalize().to_hex().to_string();
        let short = ShortId::new(&hex[..12]);
        (hex, short)
    }

    /// Check that the stored lock id matches its contents.
    pub fn verify_integrity(&self) -> Result<(), LockError> {
        if self.lock_version != LOCK_VERSION {
            return Err(LockError::UnsupportedVersion(self.lock_version));
        }
        let (computed, _) = self.compute_lock_id();
        if self.lock_id != computed {
            return Err(LockError::LockIdMismatch {
                lock_id: self.lock_id.clone(),
                computed_id: computed,
            });
        }
        Ok(())
    }

    /// Check that the descriptor still declares what this lock recorded.
    ///
    /// Catches inputs that were added, removed, moved to another locator,
    /// re-pinned, or had their follows changed since the lock was written.
    pub fn verify_descriptor_intent(
        &self,
        descriptor: &ResolvedDescriptor,
    ) -> Result<(), LockError> {
        for locked in &self.inputs {
            if descriptor.input(&locked.name).is_none() {
                return Err(LockError::DescriptorDrift(format!(
                    "input '{}' is in the lock file but no longer declared. Run 'envflake lock' to refresh.",
                    locked.name
                )));
            }
        }

        for input in descriptor.inputs() {
            let Some(locked) = self.inputs.iter().find(|l| l.name == input.name) else {
                return Err(LockError::DescriptorDrift(format!(
                    "input '{}' is declared but not in the lock file. Run 'envflake lock' to refresh.",
                    input.name
                )));
            };

            let url = input.locator.without_rev().to_string();
            if locked.url != url {
                return Err(LockError::DescriptorDrift(format!(
                    "input '{}' locator changed: lock has '{}', descriptor has '{url}'",
                    input.name, locked.url
                )));
            }

            if let Some(declared) = input.rev() {
                if locked.rev.as_deref() != Some(declared.as_str()) {
                    return Err(LockError::DescriptorDrift(format!(
                        "input '{}' revision changed: lock has '{}', descriptor has '{declared}'",
                        input.name,
                        locked.rev.as_deref().unwrap_or("none")
                    )));
                }
            }

            if locked.follows != follows_map(input) {
                return Err(LockError::DescriptorDrift(format!(
                    "input '{}' follows changed. Run 'envflake lock' to refresh.",
                    input.name
                )));
            }
        }

        Ok(())
    }

    pub fn input(&self, name: &str) -> Option<&LockedInput> {
        self.inputs.iter().find(|l| l.name == name)
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), LockError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| LockError::Io(e.error))?;
        // Fsync parent directory to ensure rename durability on power loss.
        if let Ok(f) = fs::File::open(dir) {
            let _ = f.sync_all();
        }
        Ok(())
    }

    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

fn follows_map(input: &Input) -> BTreeMap<String, String> {
    input
        .follows
        .iter()
        .map(|(sub_input, target)| (sub_input.clone(), target.to_string()))
        .collect()
}

fn lock_input(input: &Input, supplied: Option<&Revision>) -> Result<LockedInput, LockError> {
    let rev = match (input.rev(), supplied) {
        (Some(declared), Some(requested)) if declared != requested => {
            return Err(LockError::AlreadyPinned {
                input: input.name.to_string(),
                declared: declared.to_string(),
                requested: requested.to_string(),
            });
        }
        (Some(declared), _) => Some(declared.to_string()),
        (None, Some(_)) if !input.locator.supports_rev() => {
            return Err(LockError::RevisionUnsupported(input.name.to_string()));
        }
        (None, Some(requested)) => Some(requested.to_string()),
        (None, None) if input.locator.supports_rev() => {
            return Err(LockError::Unpinned(input.name.to_string()));
        }
        (None, None) => None,
    };

    Ok(LockedInput {
        name: input.name.to_string(),
        url: input.locator.without_rev().to_string(),
        rev,
        follows: follows_map(input),
    })
}
