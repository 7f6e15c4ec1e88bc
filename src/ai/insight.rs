use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::parsing::{insight_points, parse_keywords, truncate_chars, NO_POINTS_EXTRACTED};
use super::GEMINI_API_URL;

/// Upper bound on article text sent with each request.
pub const MAX_BODY_CHARS: usize = 1500;

/// Text-model capability used by both pipelines.
#[async_trait]
pub trait InsightSource: Send + Sync {
    /// Engagement points for an article. Never empty and never an error: failures come
    /// back as a single human-readable entry.
    async fn extract(&self, title: &str, body: &str) -> Vec<String>;

    /// Short keyword list for an image prompt. May be empty.
    async fn extract_keywords(&self, title: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateContentResponse {
    fn text(self) -> Option<String> {
        let text = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join("\n");

        (!text.trim().is_empty()).then_some(text)
    }
}

/// Gemini-backed [`InsightSource`].
pub struct InsightExtractor {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl InsightExtractor {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model,
            base_url: GEMINI_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: String) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url,
            urlencoding::encode(&self.model)
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: Some(prompt) }],
            }],
        };

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(AppError::TextModel(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let body: GenerateContentResponse = response.json().await?;
        body.text()
            .ok_or_else(|| AppError::TextModel("response contained no text".to_string()))
    }
}

#[async_trait]
impl InsightSource for InsightExtractor {
    async fn extract(&self, title: &str, body: &str) -> Vec<String> {
        if title.trim().is_empty() && body.trim().is_empty() {
            tracing::warn!("Nothing to extract points from: empty title and body");
            return vec![NO_POINTS_EXTRACTED.to_string()];
        }

        let prompt = insight_prompt(title, body);
        tracing::debug!("Insight prompt:\n{}", prompt);

        match self.generate(prompt).await {
            Ok(text) => {
                tracing::debug!("Insight response:\n{}", text);
                let points = insight_points(&text);
                if points == [NO_POINTS_EXTRACTED] {
                    tracing::warn!("Could not parse any points from response: {:?}", text);
                }
                points
            }
            Err(e) => {
                tracing::error!("Text model ({}) call failed for '{}': {}", self.model, title, e);
                vec![format!("AI processing error: {}", e)]
            }
        }
    }

    async fn extract_keywords(&self, title: &str) -> Result<Vec<String>> {
        let text = self.generate(keyword_prompt(title)).await?;
        tracing::debug!("Keyword response:\n{}", text);
        Ok(parse_keywords(&text))
    }
}

fn insight_prompt(title: &str, body: &str) -> String {
    format!(
        r#"Analyze the title and content of the following news article and extract exactly 2 "engagement points": the hooks most likely to spark a reader's curiosity and hold their attention.

Each point should concisely capture the article's central conflict, open question, or most surprising fact, phrased in a punchy, attention-grabbing way. For example:
"Star chef steps back from TV to focus on the business: damage control, or a response to mounting criticism?"

Write the points as a numbered list (1., 2.) with no other text.

Title: {}

Content summary:
{}...

Engagement points:
"#,
        title,
        truncate_chars(body, MAX_BODY_CHARS)
    )
}

fn keyword_prompt(title: &str) -> String {
    format!(
        r#"Pick 3 to 5 short English keywords naming concrete, visually recognizable objects that would illustrate the following news headline. Avoid abstract concepts, names of people, and brand names.

Reply with a single comma-separated line of keywords and nothing else.

Headline: {}
"#,
        title
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_title_and_truncated_body() {
        let body = "x".repeat(MAX_BODY_CHARS + 500);
        let prompt = insight_prompt("Big news", &body);

        assert!(prompt.contains("Title: Big news"));
        assert!(prompt.contains(&"x".repeat(MAX_BODY_CHARS)));
        assert!(!prompt.contains(&"x".repeat(MAX_BODY_CHARS + 1)));
    }

    #[test]
    fn keyword_prompt_embeds_title() {
        assert!(keyword_prompt("Rocket lands on barge").contains("Headline: Rocket lands on barge"));
    }

    #[test]
    fn response_text_joins_first_candidate_parts() {
        let body: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"1. A"},{"text":"2. B"}]}},
                              {"content":{"parts":[{"text":"ignored"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(body.text().as_deref(), Some("1. A\n2. B"));
    }

    #[test]
    fn response_without_text_is_none() {
        let empty: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.text().is_none());

        let blocked: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert!(blocked.text().is_none());
    }

    #[test]
    fn request_serializes_to_gemini_shape() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some("hi".to_string()),
                }],
            }],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"contents":[{"role":"user","parts":[{"text":"hi"}]}]})
        );
    }

    #[tokio::test]
    async fn empty_input_short_circuits_to_sentinel() {
        let extractor = InsightExtractor::new("key".into(), "model".into())
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        assert_eq!(extractor.extract("", "  ").await, vec![NO_POINTS_EXTRACTED]);
    }

    #[tokio::test]
    async fn call_failure_becomes_single_error_entry() {
        let extractor = InsightExtractor::new("key".into(), "model".into())
            .unwrap()
            .with_base_url("http://127.0.0.1:9/");
        let points = extractor.extract("Title", "Body").await;

        assert_eq!(points.len(), 1);
        assert!(points[0].starts_with("AI processing error"));
        assert!(extractor.extract_keywords("Title").await.is_err());
    }
}
