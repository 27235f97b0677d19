//! Files waiting for the user to reply with a new name.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::models::{IncomingFile, SessionId};

/// Longest accepted TTL, one hundred years.
pub const MAX_TTL_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone)]
struct PendingEntry {
    file: IncomingFile,
    staged_at: DateTime<Utc>,
}

/// At most one pending file per session; a newer file replaces an older one.
///
/// Entries older than the TTL are treated as absent. Nothing is downloaded
/// while a file is pending, so an abandoned entry holds no local resources.
pub struct PendingRenameRegistry {
    entries: Mutex<HashMap<SessionId, PendingEntry>>,
    ttl: Option<Duration>,
}

impl PendingRenameRegistry {
    /// `ttl_seconds == 0` keeps entries until they are consumed. Values above
    /// [`MAX_TTL_SECONDS`] are capped.
    pub fn new(ttl_seconds: u64) -> Self {
        let ttl = (ttl_seconds > 0)
            .then(|| i64::try_from(ttl_seconds.min(MAX_TTL_SECONDS)).ok())
            .flatten()
            .and_then(Duration::try_seconds);
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn stage(&self, session: SessionId, file: IncomingFile) {
        self.stage_at(session, file, Utc::now());
    }

    pub fn consume(&self, session: SessionId) -> Option<IncomingFile> {
        self.consume_at(session, Utc::now())
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    pub fn is_pending(&self, session: SessionId) -> bool {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&session)
            .is_some_and(|entry| !self.is_expired(entry, Utc::now()))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn stage_at(&self, session: SessionId, file: IncomingFile, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let previous = entries.insert(
            session,
            PendingEntry {
                file,
                staged_at: now,
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(
                %session,
                replaced = %previous.file.original_name,
                "Replaced pending file"
            );
        }
    }

    pub(crate) fn consume_at(&self, session: SessionId, now: DateTime<Utc>) -> Option<IncomingFile> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.remove(&session)?;
        if self.is_expired(&entry, now) {
            tracing::debug!(%session, file_name = %entry.file.original_name, "Pending file expired");
            return None;
        }
        Some(entry.file)
    }

    pub(crate) fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        before - entries.len()
    }

    fn is_expired(&self, entry: &PendingEntry, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => now - entry.staged_at > ttl,
            None => false,
        }
    }
}
