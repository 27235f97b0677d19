use std::sync::Arc;

use crate::settings::{SettingsError, SettingsStore, UserId};

/// Approval and ownership checks over the persisted approved-user set.
#[derive(Clone)]
pub struct AccessControl {
    owner: UserId,
    settings: Arc<dyn SettingsStore>,
}

impl AccessControl {
    pub fn new(owner: UserId, settings: Arc<dyn SettingsStore>) -> Self {
        Self { owner, settings }
    }

    /// The owner is always approved, even if a stored document omits them.
    pub fn is_approved(&self, user: UserId) -> Result<bool, SettingsError> {
        if self.is_owner(user) {
            return Ok(true);
        }
        Ok(self.settings.load()?.approved_users.contains(&user))
    }

    pub fn is_owner(&self, user: UserId) -> bool {
        user == self.owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{MemoryStore, Settings};

    #[test]
    fn test_owner_always_approved() {
        let store = MemoryStore::with_settings(UserId(1), Settings::default());
        let access = AccessControl::new(UserId(1), Arc::new(store));
        assert!(access.is_approved(UserId(1)).unwrap());
        assert!(access.is_owner(UserId(1)));
    }

    #[test]
    fn test_approval_follows_store() {
        let store: Arc<dyn SettingsStore> = Arc::new(MemoryStore::new(UserId(1)));
        let access = AccessControl::new(UserId(1), Arc::clone(&store));

        assert!(!access.is_approved(UserId(555)).unwrap());
        store.approve(UserId(555)).unwrap();
        assert!(access.is_approved(UserId(555)).unwrap());
        assert!(!access.is_owner(UserId(555)));
    }
}
