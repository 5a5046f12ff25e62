use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::error::{ErrorCode, RelayError, Result};
use super::types::{ApiResponse, OutgoingMessage, Update, User};
use super::ChatApi;

const API_BASE: &str = "https://api.telegram.org";

/// Extra time granted on top of the long-poll window before the HTTP client gives up
const POLL_SLACK: Duration = Duration::from_secs(10);

/// Bot API client over HTTPS
pub struct BotClient {
    http: reqwest::Client,
    base: String,
    debug: bool,
}

impl BotClient {
    pub fn new(token: &str, debug: bool) -> Self {
        Self::with_base_url(API_BASE, token, debug)
    }

    pub fn with_base_url(base_url: &str, token: &str, debug: bool) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: format!("{}/bot{}", base_url.trim_end_matches('/'), token),
            debug,
        }
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Option<Duration>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        if self.debug {
            debug!("Bot API request {}: {}", method, serde_json::to_string(body)?);
        }

        let mut request = self.http.post(format!("{}/{}", self.base, method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RelayError::new(ErrorCode::TransportFailed, format!("{} failed: {}", method, e)))?;
        let raw = response
            .bytes()
            .await
            .map_err(|e| RelayError::new(ErrorCode::TransportFailed, format!("{} body failed: {}", method, e)))?;

        if self.debug {
            debug!("Bot API response {}: {}", method, String::from_utf8_lossy(&raw));
        }

        let parsed: ApiResponse<T> = serde_json::from_slice(&raw)?;
        match (parsed.ok, parsed.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(RelayError::new(
                ErrorCode::ApiRejected,
                format!(
                    "{} rejected ({}): {}",
                    method,
                    parsed.error_code.unwrap_or_default(),
                    parsed.description.unwrap_or_else(|| "no description".to_string()),
                ),
            )),
        }
    }
}

#[async_trait]
impl ChatApi for BotClient {
    async fn get_me(&self) -> Result<User> {
        self.call("getMe", &json!({}), None).await.map_err(|e| match e.code() {
            Some(ErrorCode::ApiRejected) => RelayError::new(ErrorCode::InvalidCredential, e.message()),
            _ => e,
        })
    }

    async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>> {
        let body = json!({
            "offset": offset,
            "timeout": timeout.as_secs(),
        });
        self.call("getUpdates", &body, Some(timeout + POLL_SLACK)).await
    }

    async fn send_message(&self, msg: OutgoingMessage) -> Result<()> {
        let chat_id = msg.chat_id;
        let _: serde_json::Value = self.call("sendMessage", &msg, None).await.map_err(|e| {
            RelayError::new(ErrorCode::SendFailed, format!("to {}: {}", chat_id, e.message()))
        })?;
        Ok(())
    }

    async fn leave_chat(&self, chat_id: i64) -> Result<()> {
        let _: bool = self.call("leaveChat", &json!({ "chat_id": chat_id }), None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_embeds_token() {
        let client = BotClient::with_base_url("http://localhost:8081/", "123:abc", false);
        assert_eq!(client.base, "http://localhost:8081/bot123:abc");
    }

    #[test]
    fn rejected_response_carries_description() {
        let parsed: ApiResponse<User> = serde_json::from_str(
            r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#,
        )
        .unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.description.as_deref(), Some("Unauthorized"));
        assert!(parsed.result.is_none());
    }
}
