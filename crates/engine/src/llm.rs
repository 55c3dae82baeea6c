//! Language model boundary

use async_trait::async_trait;
use citeforge_common::errors::Result;

/// Completes a rendered prompt.
///
/// The async variant defaults to the blocking one; implementations backed by
/// network calls should override it.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a prompt, blocking the caller
    fn predict(&self, prompt: &str) -> Result<String>;

    /// Complete a prompt without blocking the scheduler
    async fn apredict(&self, prompt: &str) -> Result<String> {
        self.predict(prompt)
    }

    /// Model name for logging
    fn model_name(&self) -> &str;
}
