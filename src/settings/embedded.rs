use std::path::Path;

use redb::{Database, TableDefinition};

use super::{decode, encode, Settings, SettingsError, SettingsStore, UserId};

/// Settings document keyed by slot name. Only [`SETTINGS_KEY`] is used.
const SETTINGS: TableDefinition<&str, &[u8]> = TableDefinition::new("settings");

const SETTINGS_KEY: &str = "current";

/// Settings held as a single JSON row in an embedded redb database.
pub struct RedbStore {
    db: Database,
    owner: UserId,
}

impl RedbStore {
    /// Open or create the database under `data_dir`
    pub fn open<P: AsRef<Path>>(data_dir: P, owner: UserId) -> Result<Self, SettingsError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("file-renamer.redb");
        let db = Database::create(db_path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SETTINGS)?;
        }
        write_txn.commit()?;

        Ok(Self { db, owner })
    }
}

impl SettingsStore for RedbStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SETTINGS)?;

        let result = match table.get(SETTINGS_KEY)? {
            Some(data) => decode("redb:settings/current", data.value()),
            None => Ok(Settings::defaults(self.owner)),
        };
        result
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let data = encode(settings)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SETTINGS)?;
            table.insert(SETTINGS_KEY, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
