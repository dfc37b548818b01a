//! On-disk persistence for nodetree profile slots, preferences, and
//! rejected-import side files, matching `spec.md` §6's "Persisted state".

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::nodetree::{NodeTreeN, Preferences};

/// The number of profile slots (`nodetree_0.json` .. `nodetree_9.json`).
pub const PROFILE_SLOTS: u8 = 10;

/// Owns the per-user data directory and reads/writes the JSON files that
/// live there.
#[derive(Debug, Clone)]
pub struct PersistStore {
    data_dir: PathBuf,
}

impl PersistStore {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn nodetree_path(&self, profile: u8) -> PathBuf {
        self.data_dir
            .join("nodetrees")
            .join(format!("nodetree_{profile}.json"))
    }

    fn rejected_path(&self, profile: u8) -> PathBuf {
        self.data_dir
            .join("nodetrees")
            .join(format!("nodetree_{profile}.rejected.json"))
    }

    fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("preferences.json")
    }

    fn calibration_dir(&self) -> PathBuf {
        self.data_dir.join("calibration")
    }

    pub fn ensure_dirs(&self) -> Result<(), Error> {
        fs::create_dir_all(self.data_dir.join("nodetrees")).map_err(|source| {
            Error::FileReadError {
                path: self.data_dir.display().to_string(),
                source,
            }
        })?;
        fs::create_dir_all(self.calibration_dir()).map_err(|source| Error::FileReadError {
            path: self.calibration_dir().display().to_string(),
            source,
        })?;
        Ok(())
    }

    pub fn load_nodetree(&self, profile: u8) -> Result<NodeTreeN, Error> {
        let path = self.nodetree_path(profile);
        if !path.exists() {
            return Ok(NodeTreeN::default());
        }
        read_json(&path)
    }

    pub fn save_nodetree(&self, profile: u8, tree: &NodeTreeN) -> Result<(), Error> {
        write_json(&self.nodetree_path(profile), tree)
    }

    /// Persists a rejected nodetree to a side file (the `force_save` path in
    /// `spec.md` §4.4 step 7) without disturbing the canonical, previously
    /// good tree served by `GET /api/nodes`.
    pub fn save_rejected_nodetree(&self, profile: u8, tree: &NodeTreeN) -> Result<(), Error> {
        write_json(&self.rejected_path(profile), tree)
    }

    pub fn load_preferences(&self) -> Result<Preferences, Error> {
        let path = self.preferences_path();
        if !path.exists() {
            return Ok(Preferences::default());
        }
        read_json(&path)
    }

    pub fn save_preferences(&self, prefs: &Preferences) -> Result<(), Error> {
        write_json(&self.preferences_path(), prefs)
    }

    pub fn save_calibration(&self, name: &str, contents: &[u8]) -> Result<PathBuf, Error> {
        let path = self.calibration_dir().join(name);
        fs::write(&path, contents).map_err(|source| Error::FileReadError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(path)
    }

    /// Stages an upgrade tarball for the supervisor to apply after shutdown
    /// (`spec.md` §6 `POST /api/upgrade`).
    pub fn stage_upgrade(&self, contents: &[u8]) -> Result<PathBuf, Error> {
        let path = self.data_dir.join("upgrade.tar.gz");
        fs::write(&path, contents).map_err(|source| Error::FileReadError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(path)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let data = fs::read_to_string(path).map_err(|source| Error::FileReadError {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| Error::DeserializationError {
        path: path.display().to_string(),
        source,
    })
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| Error::FileReadError {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let data = serde_json::to_string_pretty(value).map_err(|source| Error::DeserializationError {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(path, data).map_err(|source| Error::FileReadError {
        path: path.display().to_string(),
        source,
    })
}
