//! Language-model collaborator contract.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tandem_core::error::{Result, TandemError};

/// Service for generating reply text from a composed prompt.
///
/// The real model lives behind a provider API; implementations fail with
/// `Generation` errors which the orchestrator recovers from by presenting
/// the configured fallback utterance.
pub trait ModelService: Send + Sync {
    /// Generate text for the given prompt under the given sampling budget.
    fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Mock model returning a canned reply.
///
/// Records every prompt it receives, and can be configured to fail or to
/// stall so deadline handling can be exercised.
#[derive(Debug, Clone)]
pub struct MockModel {
    reply: String,
    fail: bool,
    delay: Option<Duration>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockModel {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            fail: false,
            delay: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    /// A model that takes `delay` before answering.
    pub fn with_delay(reply: impl Into<String>, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(reply)
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl ModelService for MockModel {
    async fn generate(&self, prompt: &str, _temperature: f32, max_tokens: u32) -> Result<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if self.fail {
            return Err(TandemError::Generation("provider unavailable".to_string()));
        }
        if max_tokens == 0 {
            return Err(TandemError::Generation("max_tokens must be positive".to_string()));
        }
        Ok(self.reply.clone())
    }
}
