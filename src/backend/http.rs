//! HTTP chat gateway
//!
//! Posts commands to a chat endpoint that speaks the
//! `{message, conversationHistory, language}` → `{response}` contract.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use super::{classify_failure, parse_reply, BackendError, BackendGateway, ChatReply, ChatRequest};
use crate::config::Config;

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpGateway {
    pub fn new(config: &Config) -> Self {
        Self::with_url(
            &config.backend_url,
            Duration::from_secs(config.backend_timeout_secs),
        )
    }

    pub fn with_url(url: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl BackendGateway for HttpGateway {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        debug!("Sending message to AI: {}", request.message);

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        debug!("API response status: {}", status);
        if !status.is_success() {
            warn!("❌ Chat API error ({}): {}", status, body);
            return Err(classify_failure(status.as_u16(), &body));
        }
        parse_reply(&body)
    }

    async fn health_check(&self) -> bool {
        // Any HTTP answer means the network path works
        self.client
            .head(&self.url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .is_ok()
    }

    fn name(&self) -> &str {
        "http"
    }
}
