use std::sync::Mutex;

use super::{Settings, SettingsError, SettingsStore, UserId};

/// In-process settings store, used by tests and dry runs.
pub struct MemoryStore {
    owner: UserId,
    current: Mutex<Option<Settings>>,
}

impl MemoryStore {
    pub fn new(owner: UserId) -> Self {
        Self {
            owner,
            current: Mutex::new(None),
        }
    }

    pub fn with_settings(owner: UserId, settings: Settings) -> Self {
        Self {
            owner,
            current: Mutex::new(Some(settings)),
        }
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        Ok(current
            .clone()
            .unwrap_or_else(|| Settings::defaults(self.owner)))
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = Some(settings.clone());
        Ok(())
    }
}
