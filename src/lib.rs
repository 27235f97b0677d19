//! file-renamer - A chat bot that renames uploaded files
//!
//! A user sends a file, replies with a new base name, and gets the file back
//! as `prefix + name + suffix + extension`. When enabled, MKV uploads are
//! remuxed to MP4 (stream copy) before delivery. Settings persist in a JSON
//! document or an embedded redb database.

pub mod access;
pub mod api;
pub mod bot;
pub mod config;
pub mod gateway;
pub mod models;
pub mod pending;
pub mod pipeline;
pub mod settings;
#[cfg(test)]
pub mod testutil;
pub mod transcoder;

use std::sync::Arc;

use bot::SessionRouter;
use config::Config;
use pending::PendingRenameRegistry;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub pending: Arc<PendingRenameRegistry>,
    pub router: SessionRouter,
}
