use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AuthError, Result};

/// Narrow interface to the generative-AI service answering diet questions.
#[async_trait]
pub trait DietAdviceClient: Send + Sync {
    async fn advise(&self, question: &str) -> Result<String>;
}

pub struct GenAiHttpClient {
    http: reqwest::Client,
    url: String,
}

impl GenAiHttpClient {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl DietAdviceClient for GenAiHttpClient {
    async fn advise(&self, question: &str) -> Result<String> {
        let response = self
            .http
            .post(&self.url)
            .json(&serde_json::json!({ "question": question }))
            .send()
            .await
            .map_err(|e| AuthError::Internal(format!("advice service request failed: {e}")))?
            .error_for_status()
            .map_err(|e| AuthError::Internal(format!("advice service error: {e}")))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| AuthError::Internal(format!("advice service returned bad JSON: {e}")))?;

        body.get("advice")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AuthError::Internal("advice service returned no advice text".into()))
    }
}
