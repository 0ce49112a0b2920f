//! Wire types for the Cloud Vision `images:annotate` and Gemini
//! `generateContent` endpoints.

use serde::{Deserialize, Serialize};

// ---- Cloud Vision ----

#[derive(Debug, Serialize)]
pub struct AnnotateRequest<'a> {
    pub requests: Vec<AnnotateImageRequest<'a>>,
}

#[derive(Debug, Serialize)]
pub struct AnnotateImageRequest<'a> {
    pub image: VisionImage<'a>,
    pub features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
pub struct VisionImage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ImageUri<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUri<'a> {
    pub image_uri: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub max_results: u32,
}

impl Feature {
    pub fn labels() -> Self {
        Self {
            kind: "LABEL_DETECTION",
            max_results: 20,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnnotateResponse {
    #[serde(default)]
    pub responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateImageResponse {
    #[serde(default)]
    pub label_annotations: Vec<Label>,
    pub error: Option<RpcStatus>,
}

/// A descriptive label the vision API attached to an image.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Label {
    pub description: String,
    #[serde(default)]
    pub score: f32,
}

#[derive(Debug, Deserialize)]
pub struct RpcStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

// ---- Gemini ----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: &'static str,
    pub response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
pub struct CandidatePart {
    pub text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate part that has any.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .find_map(|p| p.text.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Answer {
    Yes,
    No,
}

/// The model's structured answer to "does this image match X?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(rename = "finalAnswer")]
    pub final_answer: Answer,
    #[serde(default)]
    pub explanation: String,
}

impl Verdict {
    pub fn is_match(&self) -> bool {
        self.final_answer == Answer::Yes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn annotate_request_shape() {
        let req = AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: VisionImage {
                    content: None,
                    source: Some(ImageUri {
                        image_uri: "https://img.test/a.jpg",
                    }),
                },
                features: vec![Feature::labels()],
            }],
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "requests": [{
                    "image": { "source": { "imageUri": "https://img.test/a.jpg" } },
                    "features": [{ "type": "LABEL_DETECTION", "maxResults": 20 }]
                }]
            })
        );
    }

    #[test]
    fn annotate_response_tolerates_missing_labels() {
        let res: AnnotateResponse = serde_json::from_value(json!({
            "responses": [
                { "labelAnnotations": [{ "description": "Grass", "score": 0.97 }] },
                {}
            ]
        }))
        .unwrap();
        assert_eq!(res.responses[0].label_annotations[0].description, "Grass");
        assert!(res.responses[1].label_annotations.is_empty());
    }

    #[test]
    fn inline_part_uses_camel_case() {
        let part = Part::Inline {
            inline_data: InlineData {
                mime_type: "image/png".into(),
                data: "AAAA".into(),
            },
        };
        assert_eq!(
            serde_json::to_value(&part).unwrap(),
            json!({ "inlineData": { "mimeType": "image/png", "data": "AAAA" } })
        );
    }

    #[test]
    fn verdict_parses_from_candidate_text() {
        let res: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "{\"finalAnswer\":\"No\",\"explanation\":\"a cat\"}" }] }
            }]
        }))
        .unwrap();
        let verdict: Verdict = serde_json::from_str(res.first_text().unwrap()).unwrap();
        assert!(!verdict.is_match());
        assert_eq!(verdict.explanation, "a cat");
    }
}
