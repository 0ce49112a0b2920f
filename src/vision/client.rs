use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use serde_json::json;
use tracing::debug;

use crate::{
    config::ClassifierConfig,
    vision::dto::{
        AnnotateImageRequest, AnnotateRequest, AnnotateResponse, Content, Feature,
        GenerateRequest, GenerateResponse, GenerationConfig, ImageUri, InlineData, Label, Part,
        Verdict, VisionImage,
    },
};

/// Where the image to classify comes from.
#[derive(Debug, Clone, Copy)]
pub enum ImageSource<'a> {
    Url(&'a str),
    Bytes(&'a [u8]),
}

/// The external vision/LLM service.
#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn detect_labels(&self, image: ImageSource<'_>) -> anyhow::Result<Vec<Label>>;
    async fn ask(&self, image: &[u8], mime: &str, question: &str) -> anyhow::Result<Verdict>;
}

/// Cloud Vision for labels, Gemini for yes/no questions.
#[derive(Clone)]
pub struct GoogleClient {
    http: reqwest::Client,
    api_key: String,
    vision_endpoint: String,
    gemini_endpoint: String,
    model: String,
}

impl GoogleClient {
    pub fn new(cfg: &ClassifierConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            vision_endpoint: cfg.vision_endpoint.clone(),
            gemini_endpoint: cfg.gemini_endpoint.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
        })
    }
}

fn answer_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "finalAnswer": { "type": "STRING", "enum": ["Yes", "No"] },
            "explanation": { "type": "STRING" }
        },
        "required": ["finalAnswer", "explanation"]
    })
}

#[async_trait]
impl VisionClient for GoogleClient {
    async fn detect_labels(&self, image: ImageSource<'_>) -> anyhow::Result<Vec<Label>> {
        let image = match image {
            ImageSource::Url(url) => VisionImage {
                content: None,
                source: Some(ImageUri { image_uri: url }),
            },
            ImageSource::Bytes(bytes) => VisionImage {
                content: Some(Base64::encode_string(bytes)),
                source: None,
            },
        };
        let body = AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image,
                features: vec![Feature::labels()],
            }],
        };

        let res: AnnotateResponse = self
            .http
            .post(&self.vision_endpoint)
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await
            .context("vision annotate request")?
            .error_for_status()
            .context("vision annotate status")?
            .json()
            .await
            .context("vision annotate body")?;

        let first = res
            .responses
            .into_iter()
            .next()
            .context("vision annotate returned no responses")?;
        if let Some(err) = first.error {
            anyhow::bail!("vision api error {}: {}", err.code, err.message);
        }
        debug!(labels = first.label_annotations.len(), "vision labels received");
        Ok(first.label_annotations)
    }

    async fn ask(&self, image: &[u8], mime: &str, question: &str) -> anyhow::Result<Verdict> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: question.to_string(),
                    },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: mime.to_string(),
                            data: Base64::encode_string(image),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: answer_schema(),
            },
        };

        let url = format!("{}/models/{}:generateContent", self.gemini_endpoint, self.model);
        let res: GenerateResponse = self
            .http
            .post(url)
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await
            .context("gemini request")?
            .error_for_status()
            .context("gemini status")?
            .json()
            .await
            .context("gemini body")?;

        let text = res.first_text().context("gemini returned no text")?;
        let verdict: Verdict = serde_json::from_str(text).context("parse gemini verdict")?;
        debug!(answer = ?verdict.final_answer, "gemini verdict received");
        Ok(verdict)
    }
}

#[cfg(test)]
pub mod fake {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use super::*;
    use crate::vision::dto::Answer;

    /// Canned vision responses; counts calls.
    #[derive(Default)]
    pub struct FakeVision {
        pub labels: Mutex<Vec<&'static str>>,
        pub answer_yes_when_contains: Option<&'static str>,
        pub fail: bool,
        pub calls: AtomicUsize,
    }

    impl FakeVision {
        pub fn with_labels(labels: &[&'static str]) -> Self {
            Self {
                labels: Mutex::new(labels.to_vec()),
                ..Default::default()
            }
        }

        pub fn yes_when(word: &'static str) -> Self {
            Self {
                answer_yes_when_contains: Some(word),
                ..Default::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VisionClient for FakeVision {
        async fn detect_labels(&self, _image: ImageSource<'_>) -> anyhow::Result<Vec<Label>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("vision unavailable");
            }
            Ok(self
                .labels
                .lock()
                .unwrap()
                .iter()
                .map(|d| Label {
                    description: d.to_string(),
                    score: 0.9,
                })
                .collect())
        }

        async fn ask(&self, _image: &[u8], _mime: &str, question: &str) -> anyhow::Result<Verdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("gemini unavailable");
            }
            let yes = self
                .answer_yes_when_contains
                .is_some_and(|w| question.contains(w));
            Ok(Verdict {
                final_answer: if yes { Answer::Yes } else { Answer::No },
                explanation: "canned".into(),
            })
        }
    }
}
