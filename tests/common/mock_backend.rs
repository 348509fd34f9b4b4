//! Mock Backend Gateway for Testing
//!
//! Returns queued replies after a fixed latency and records every request.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use krrish::backend::{BackendError, BackendGateway, ChatReply, ChatRequest};

pub struct MockGateway {
    replies: Mutex<VecDeque<Result<ChatReply, BackendError>>>,
    latency: Duration,
    online: AtomicBool,
    /// All requests received (for verification)
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            latency: Duration::from_millis(200),
            online: AtomicBool::new(true),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful reply
    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(ChatReply {
            response: text.to_string(),
        }));
        self
    }

    /// Queue a failure
    pub fn fail(self, error: BackendError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn offline(self) -> Self {
        self.online.store(false, Ordering::SeqCst);
        self
    }

    pub fn get_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendGateway for MockGateway {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        tokio::time::sleep(self.latency).await;
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Ok(ChatReply {
                response: "Mock reply".to_string(),
            })
        })
    }

    async fn health_check(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
