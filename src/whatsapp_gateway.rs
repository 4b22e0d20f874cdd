use crate::config::GatewayConfig;
use crate::errors::AppError;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// The capability the dispatch sequencer sends through.
///
/// `warm_up`, `close_session` and `teardown` are best effort: callers log their
/// errors and carry on.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn warm_up(&self) -> Result<(), AppError>;

    /// Delivers one text message. Any error marks the message as failed.
    async fn send(&self, phone: &str, body: &str) -> Result<(), AppError>;

    async fn close_session(&self, _phone: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn teardown(&self) -> Result<(), AppError>;
}

/// Client for the HTTP WhatsApp gateway.
#[derive(Clone)]
pub struct WhatsAppGatewayClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl WhatsAppGatewayClient {
    /// Creates a new `WhatsAppGatewayClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Gateway root, without a trailing slash.
    /// * `token` - Optional bearer token.
    pub fn new(base_url: String, token: Option<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create WhatsApp client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, AppError> {
        let base_url = config.base_url.clone().ok_or_else(|| {
            AppError::ConfigError(
                "WHATSAPP_GATEWAY_URL is required to send messages".to_string(),
            )
        })?;
        Self::new(base_url, config.token.clone())
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), AppError> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|e| {
            AppError::ExternalApiError(format!("WhatsApp gateway request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "WhatsApp gateway returned {} for {}: {}",
                status, path, error_text
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl MessageSender for WhatsAppGatewayClient {
    async fn warm_up(&self) -> Result<(), AppError> {
        tracing::info!("Starting WhatsApp session");
        self.post("/session/start", json!({})).await
    }

    async fn send(&self, phone: &str, body: &str) -> Result<(), AppError> {
        tracing::info!("⏳ Sending message to {}", phone);

        self.post(
            "/messages/text",
            json!({
                "phone": phone,
                "message": body
            }),
        )
        .await?;

        tracing::info!("✓ Message sent to {}", phone);
        Ok(())
    }

    async fn teardown(&self) -> Result<(), AppError> {
        tracing::info!("🔒 Closing WhatsApp session");
        self.post("/session/close", json!({})).await
    }
}
