mod telegram;
pub mod types;

pub use telegram::TelegramGateway;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ChatId, RemoteHandle};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Bot API call {method} failed: {description}")]
    Api {
        method: &'static str,
        code: Option<i64>,
        description: String,
    },
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        // Bot API URLs embed the token.
        GatewayError::Http(e.without_url())
    }
}

/// Outbound side of the chat transport.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Fetches the file behind `handle` into `dest`, returning the byte count.
    async fn download(&self, handle: &RemoteHandle, dest: &Path) -> Result<u64, GatewayError>;
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), GatewayError>;
    /// Uploads the file at `path`, presenting it to the user as `file_name`.
    async fn send_document(
        &self,
        chat: ChatId,
        path: &Path,
        file_name: &str,
    ) -> Result<(), GatewayError>;
}
