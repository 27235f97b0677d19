use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use super::types::{
    ApiResponse, GetFileRequest, GetUpdatesRequest, RemoteFile, SendMessageRequest,
    SetWebhookRequest, Update,
};
use super::{Gateway, GatewayError};
use crate::models::{ChatId, RemoteHandle};

const ALLOWED_UPDATES: [&str; 1] = ["message"];

/// Telegram Bot API client.
pub struct TelegramGateway {
    api_url: String,
    client: Client,
    token: String,
}

impl TelegramGateway {
    pub fn new(api_url: &str, token: &str) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            client,
            token: token.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_url, self.token, file_path)
    }

    async fn call<B, T>(&self, method: &'static str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await?;

        Self::parse(method, resp).await
    }

    async fn parse<T: DeserializeOwned>(
        method: &'static str,
        resp: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = resp.status();
        let body: ApiResponse<T> = match resp.json().await {
            Ok(body) => body,
            Err(e) if !status.is_success() => {
                return Err(GatewayError::Api {
                    method,
                    code: Some(i64::from(status.as_u16())),
                    description: format!("unexpected response ({status}): {e}"),
                });
            }
            Err(e) => return Err(e.into()),
        };

        match (body.ok, body.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(GatewayError::Api {
                method,
                code: body.error_code,
                description: body
                    .description
                    .unwrap_or_else(|| format!("request failed ({status})")),
            }),
        }
    }

    /// Long-polls for new updates. `offset` is one past the last update seen.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_seconds: u64,
    ) -> Result<Vec<Update>, GatewayError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_seconds,
            allowed_updates: ALLOWED_UPDATES.to_vec(),
        };

        let resp = self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(Duration::from_secs(timeout_seconds + 10))
            .json(&request)
            .send()
            .await?;

        Self::parse("getUpdates", resp).await
    }

    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<(), GatewayError> {
        let request = SetWebhookRequest {
            url,
            secret_token: secret,
            allowed_updates: ALLOWED_UPDATES.to_vec(),
        };
        let _: bool = self.call("setWebhook", &request).await?;
        Ok(())
    }

    /// Required before long polling when a webhook was previously set.
    pub async fn delete_webhook(&self) -> Result<(), GatewayError> {
        let _: bool = self
            .call("deleteWebhook", &serde_json::json!({}))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Gateway for TelegramGateway {
    async fn download(&self, handle: &RemoteHandle, dest: &Path) -> Result<u64, GatewayError> {
        let remote: RemoteFile = self
            .call("getFile", &GetFileRequest { file_id: &handle.0 })
            .await?;

        let file_path = remote.file_path.ok_or_else(|| GatewayError::Api {
            method: "getFile",
            code: None,
            description: format!("no download path for file {}", remote.file_id),
        })?;

        let mut resp = self.client.get(self.file_url(&file_path)).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(GatewayError::Api {
                method: "download",
                code: Some(i64::from(status.as_u16())),
                description: format!("file download failed ({status})"),
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), GatewayError> {
        let request = SendMessageRequest {
            chat_id: chat.0,
            text,
        };
        let _: serde_json::Value = self.call("sendMessage", &request).await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat: ChatId,
        path: &Path,
        file_name: &str,
    ) -> Result<(), GatewayError> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();

        let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), len)
            .file_name(file_name.to_string())
            .mime_str(mime.as_ref())?;
        let form = Form::new()
            .text("chat_id", chat.0.to_string())
            .part("document", part);

        let resp = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;

        let _: serde_json::Value = Self::parse("sendDocument", resp).await?;
        Ok(())
    }
}
