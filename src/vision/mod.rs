use async_trait::async_trait;

pub mod client;
pub mod dto;
pub mod handlers;
pub mod identifier;

pub use identifier::ImageIdentifier;

/// Decides whether an image satisfies a hunt prompt.
#[async_trait]
pub trait PromptJudge: Send + Sync {
    async fn judge(&self, image: &[u8], mime: &str, prompt: &str) -> anyhow::Result<bool>;
}
