//! LLM provider trait for generating answers

use async_trait::async_trait;

use crate::error::Result;
use crate::types::GenerationOptions;

/// Trait for LLM text generation
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for a fully built prompt
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
