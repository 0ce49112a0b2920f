use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    config::ClassifierMode,
    limit::Limiter,
    vision::{
        client::{ImageSource, VisionClient},
        dto::Verdict,
        PromptJudge,
    },
};

const LIMITER_KEY: &str = "vision";

fn normalize(names: &[String]) -> HashSet<String> {
    names
        .iter()
        .map(|n| n.trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .collect()
}

/// Answers "does this image show X?" through the external vision service.
/// Every outbound call first waits on the shared limiter.
#[derive(Clone)]
pub struct ImageIdentifier {
    client: Arc<dyn VisionClient>,
    limiter: Arc<dyn Limiter>,
    mode: ClassifierMode,
}

impl ImageIdentifier {
    pub fn new(client: Arc<dyn VisionClient>, limiter: Arc<dyn Limiter>, mode: ClassifierMode) -> Self {
        Self {
            client,
            limiter,
            mode,
        }
    }

    /// True when any candidate name occurs inside a label of the remote image.
    pub async fn check_photo_url(&self, image_url: &str, valid_names: &[String]) -> anyhow::Result<bool> {
        self.limiter.acquire(LIMITER_KEY).await;
        let valid = normalize(valid_names);
        let labels = self.client.detect_labels(ImageSource::Url(image_url)).await?;

        let mut found = false;
        for label in &labels {
            let name = label.description.to_lowercase();
            if valid.iter().any(|v| name.contains(v.as_str())) {
                info!(label = %label.description, score = label.score, "partial label match");
                found = true;
            }
        }
        Ok(found)
    }

    /// The last label whose text occurs inside one of the candidate names.
    pub async fn check_image_file(
        &self,
        content: &[u8],
        valid_names: &[String],
    ) -> anyhow::Result<Option<String>> {
        self.limiter.acquire(LIMITER_KEY).await;
        let valid = normalize(valid_names);
        let labels = self.client.detect_labels(ImageSource::Bytes(content)).await?;

        let mut matched = None;
        for label in labels {
            let name = label.description.to_lowercase();
            if !name.is_empty() && valid.iter().any(|v| v.contains(name.as_str())) {
                info!(label = %label.description, score = label.score, "partial label match");
                matched = Some(label.description);
            }
        }
        Ok(matched)
    }

    pub async fn check_description(
        &self,
        content: &[u8],
        mime: &str,
        description: &str,
    ) -> anyhow::Result<Verdict> {
        self.limiter.acquire(LIMITER_KEY).await;
        let question = format!(
            "Does this image match the following description? Description: {description}. \
             Reply with finalAnswer Yes or No and a one-sentence explanation."
        );
        let verdict = self.client.ask(content, mime, &question).await?;
        debug!(matched = verdict.is_match(), explanation = %verdict.explanation, "description check");
        Ok(verdict)
    }
}

#[async_trait]
impl PromptJudge for ImageIdentifier {
    async fn judge(&self, image: &[u8], mime: &str, prompt: &str) -> anyhow::Result<bool> {
        match self.mode {
            ClassifierMode::Llm => Ok(self.check_description(image, mime, prompt).await?.is_match()),
            ClassifierMode::Labels => Ok(self
                .check_image_file(image, &[prompt.to_string()])
                .await?
                .is_some()),
        }
    }
}
