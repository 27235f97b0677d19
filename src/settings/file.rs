use std::io::Write;
use std::path::{Path, PathBuf};

use super::{decode, encode, Settings, SettingsError, SettingsStore, UserId};

/// Settings held in a JSON document on the local filesystem.
///
/// Saves write a sibling temp file and rename it over the target, so a
/// crash mid-write leaves the previous document intact.
pub struct FileStore {
    path: PathBuf,
    owner: UserId,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P, owner: UserId) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            owner,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }
}

impl SettingsStore for FileStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => decode(&self.path.to_string_lossy(), &bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::defaults(self.owner)),
            Err(e) => Err(SettingsError::Io(e)),
        }
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let data = encode(settings)?;
        let dir = self.parent_dir();
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| SettingsError::Io(e.error))?;
        Ok(())
    }
}
