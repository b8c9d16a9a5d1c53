//! Keyed JSON folder storage.
//!
//! One directory per object kind; each object lives in `obj_<uid>.json`
//! (file names matching `^obj_([0-9]+)\.json$` are recognised on reload).
//! Adding an existing UID overwrites, deleting a missing UID is a no-op.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, warn};

use crate::configuration::{
    ConfigObject, Experiment, ExperimentTemplate, HardwareConfig, Led, TinkerforgeBricklet,
};

/// Errors of the folder store.  Rejected at the external boundary with a
/// user-visible reason; never propagated into the controller.
#[derive(Debug)]
pub enum ConfigFolderError {
    /// No object stored under the UID.
    NotFound(u64),
    /// The payload is not valid JSON for the object kind.
    Malformed(serde_json::Error),
    /// Underlying filesystem error.
    Io(io::Error),
}

impl fmt::Display for ConfigFolderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(uid) => write!(f, "no object with uid {uid}"),
            Self::Malformed(e) => write!(f, "malformed json: {e}"),
            Self::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for ConfigFolderError {}

impl From<io::Error> for ConfigFolderError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ConfigFolderError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e)
    }
}

/// Parse `obj_<uid>.json`.
fn uid_from_file_name(name: &str) -> Option<u64> {
    let digits = name.strip_prefix("obj_")?.strip_suffix(".json")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// One directory of JSON objects of a single kind.
pub struct ConfigFolder<T: ConfigObject> {
    workspace: PathBuf,
    uids: Mutex<BTreeSet<u64>>,
    _kind: PhantomData<fn() -> T>,
}

impl<T: ConfigObject> ConfigFolder<T> {
    /// Open (or create) the folder and index the objects already on disk.
    pub fn new(workspace: impl Into<PathBuf>) -> Result<Self, ConfigFolderError> {
        let workspace = workspace.into();
        fs::create_dir_all(&workspace)?;

        let mut uids = BTreeSet::new();
        for entry in fs::read_dir(&workspace)? {
            let entry = entry?;
            let name = entry.file_name();
            match name.to_str().and_then(uid_from_file_name) {
                Some(uid) => {
                    uids.insert(uid);
                }
                None => warn!(
                    "ignoring stray file {:?} in config folder {:?}",
                    name, workspace
                ),
            }
        }
        debug!("config folder {:?} indexed {} objects", workspace, uids.len());

        Ok(Self {
            workspace,
            uids: Mutex::new(uids),
            _kind: PhantomData,
        })
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    fn path_for(&self, uid: u64) -> PathBuf {
        self.workspace.join(format!("obj_{uid}.json"))
    }

    /// Store (or overwrite) one object.
    pub fn add(&self, object: &T) -> Result<(), ConfigFolderError> {
        let uid = object.uid();
        let json = serde_json::to_string_pretty(object)?;
        fs::write(self.path_for(uid), json)?;
        self.uids.lock().unwrap().insert(uid);
        Ok(())
    }

    /// Validate a raw JSON payload and store it under its own `uid` field.
    pub fn add_from_json(&self, payload: &[u8]) -> Result<u64, ConfigFolderError> {
        let object: T = serde_json::from_slice(payload)?;
        self.add(&object)?;
        Ok(object.uid())
    }

    pub fn load(&self, uid: u64) -> Result<T, ConfigFolderError> {
        if !self.uids.lock().unwrap().contains(&uid) {
            return Err(ConfigFolderError::NotFound(uid));
        }
        let json = fs::read(self.path_for(uid)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ConfigFolderError::NotFound(uid),
            _ => ConfigFolderError::Io(e),
        })?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// Delete one object.  Deleting a UID that was never stored is a no-op.
    pub fn delete(&self, uid: u64) -> Result<(), ConfigFolderError> {
        if !self.uids.lock().unwrap().remove(&uid) {
            return Ok(());
        }
        match fs::remove_file(self.path_for(uid)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Stored UIDs in ascending order.
    pub fn uids(&self) -> Vec<u64> {
        self.uids.lock().unwrap().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.uids.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.uids.lock().unwrap().is_empty()
    }

    /// Load every stored object; objects that fail to parse are skipped
    /// with a warning.
    pub fn load_all(&self) -> Vec<T> {
        self.uids()
            .into_iter()
            .filter_map(|uid| match self.load(uid) {
                Ok(object) => Some(object),
                Err(e) => {
                    warn!("skipping object {uid}: {e}");
                    None
                }
            })
            .collect()
    }

    /// `{uid, description}` pairs for listings.
    pub fn list(&self) -> Vec<(u64, String)> {
        self.load_all()
            .iter()
            .map(|object| (object.uid(), object.description()))
            .collect()
    }
}

/// The five object folders of the rig under one base directory.
pub struct ConfigManager {
    pub leds: ConfigFolder<Led>,
    pub bricklets: ConfigFolder<TinkerforgeBricklet>,
    pub configs: ConfigFolder<HardwareConfig>,
    pub experiment_templates: ConfigFolder<ExperimentTemplate>,
    pub experiments: ConfigFolder<Experiment>,
}

impl ConfigManager {
    pub fn new(base: impl AsRef<Path>) -> Result<Self, ConfigFolderError> {
        let base = base.as_ref();
        Ok(Self {
            leds: ConfigFolder::new(base.join("leds"))?,
            bricklets: ConfigFolder::new(base.join("bricklets"))?,
            configs: ConfigFolder::new(base.join("configs"))?,
            experiment_templates: ConfigFolder::new(base.join("experiment_templates"))?,
            experiments: ConfigFolder::new(base.join("experiments"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_parsing() {
        assert_eq!(uid_from_file_name("obj_0.json"), Some(0));
        assert_eq!(uid_from_file_name("obj_1234.json"), Some(1234));
        assert_eq!(uid_from_file_name("obj_.json"), None);
        assert_eq!(uid_from_file_name("obj_12.json.bak"), None);
        assert_eq!(uid_from_file_name("object_12.json"), None);
        assert_eq!(uid_from_file_name("obj_-3.json"), None);
    }
}
