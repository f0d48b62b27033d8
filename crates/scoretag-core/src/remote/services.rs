//! HTTP adapters for the classifier and the generative fallback.
//!
//! Wire format (JSON, camelCase):
//! - `POST {base}/classify` `{features, context}` → `ClassifierOutput`
//! - `POST {base}/generate` `{rawLabel, category, context}` → `{term}`

use super::client::HttpClient;
use crate::error::{Result, ScoretagError};
use crate::models::ClassificationContext;
use crate::pipeline::{Classifier, ClassifierOutput, FeatureVector};
use crate::vocabulary::TermGenerator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassifyRequest<'a> {
    features: &'a FeatureVector,
    context: &'a ClassificationContext,
}

/// Classifier reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: HttpClient,
}

impl HttpClassifier {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new("classifier", base_url)?,
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(
        &self,
        features: &FeatureVector,
        context: &ClassificationContext,
    ) -> Result<ClassifierOutput> {
        self.client
            .post_json(&["classify"], &ClassifyRequest { features, context })
            .await
            .map_err(|e| match e {
                ScoretagError::Json { message, .. } => ScoretagError::Classifier {
                    message: format!("Malformed classifier response: {}", message),
                },
                other => other,
            })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    raw_label: &'a str,
    category: &'a str,
    context: &'a ClassificationContext,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    term: Option<String>,
}

/// Generative fallback reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTermGenerator {
    client: HttpClient,
}

impl HttpTermGenerator {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new("generator", base_url)?,
        })
    }
}

#[async_trait]
impl TermGenerator for HttpTermGenerator {
    async fn generate(
        &self,
        raw_label: &str,
        category: &str,
        context: &ClassificationContext,
    ) -> Result<Option<String>> {
        let response: GenerateResponse = self
            .client
            .post_json(
                &["generate"],
                &GenerateRequest {
                    raw_label,
                    category,
                    context,
                },
            )
            .await
            .map_err(|e| match e {
                ScoretagError::Json { message, .. } => ScoretagError::Generation {
                    message: format!("Malformed generator response: {}", message),
                },
                other => other,
            })?;
        Ok(response.term.filter(|t| !t.trim().is_empty()))
    }
}
