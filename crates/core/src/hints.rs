use crate::error::AiError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";

/// Seam for the external embedding service: a batch of strings in,
/// fixed-dimension vectors out.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AiError>;
}

#[derive(Debug, Clone, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

/// HTTP implementation of [`Embedder`] against a single embedding
/// endpoint with optional bearer auth.
pub struct HttpEmbedder {
    endpoint: Url,
    api_key: Option<String>,
    model: String,
    client: Client,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        model: Option<String>,
    ) -> Result<Self, AiError> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            model: model.unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            client: Client::new(),
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AiError> {
        let payload = EmbedRequest {
            model: &self.model,
            texts,
        };

        let mut request = self.client.post(self.endpoint.clone()).json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AiError::BackendResponse {
                backend: "embedding".to_string(),
                details: response.status().to_string(),
            });
        }

        let body: EmbedResponse = response.json().await?;
        if body.embeddings.len() != texts.len() {
            return Err(AiError::BackendResponse {
                backend: "embedding".to_string(),
                details: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    body.embeddings.len()
                ),
            });
        }
        Ok(body.embeddings)
    }
}

/// In-memory exact nearest-neighbor index over a fixed set of hint
/// strings. Small enough (tens of hints per user context) that a linear
/// scan beats carrying a vector-store dependency.
pub struct HintIndex {
    items: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl HintIndex {
    pub async fn from_texts(embedder: &dyn Embedder, items: Vec<String>) -> Result<Self, AiError> {
        let vectors = if items.is_empty() {
            Vec::new()
        } else {
            embedder.embed(&items).await?
        };
        Ok(Self { items, vectors })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The `k` stored hints closest to `query` by L2 distance, closest
    /// first.
    pub async fn search(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        k: usize,
    ) -> Result<Vec<(String, f32)>, AiError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vectors = embedder.embed(&[query.to_string()]).await?;
        let Some(query_vector) = query_vectors.first() else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(String, f32)> = self
            .items
            .iter()
            .zip(self.vectors.iter())
            .map(|(item, vector)| (item.clone(), squared_l2(query_vector, vector)))
            .collect();
        scored.sort_by(|left, right| left.1.total_cmp(&right.1));
        scored.truncate(k);
        Ok(scored)
    }
}

fn squared_l2(left: &[f32], right: &[f32]) -> f32 {
    let shared = left.len().min(right.len());
    let mut distance = 0.0;
    for index in 0..shared {
        let delta = left[index] - right[index];
        distance += delta * delta;
    }
    // Dimension mismatches count the unshared tail as distance from zero.
    for value in &left[shared..] {
        distance += value * value;
    }
    for value in &right[shared..] {
        distance += value * value;
    }
    distance
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Maps each text onto a 2d vector from its length and vowel count;
    /// deterministic and cheap, which is all the index tests need.
    struct ToyEmbedder;

    #[async_trait]
    impl Embedder for ToyEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AiError> {
            Ok(texts
                .iter()
                .map(|text| {
                    let vowels = text.chars().filter(|c| "aeiou".contains(*c)).count();
                    vec![text.len() as f32, vowels as f32]
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn nearest_hints_come_back_closest_first() {
        let hints = vec![
            "aa".to_string(),
            "aaaaaa".to_string(),
            "bbbbbbbbbbbb".to_string(),
        ];
        let index = HintIndex::from_texts(&ToyEmbedder, hints)
            .await
            .expect("index builds");

        let results = index
            .search(&ToyEmbedder, "aaa", 2)
            .await
            .expect("search succeeds");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "aa");
        assert_eq!(results[1].0, "aaaaaa");
        assert!(results[0].1 <= results[1].1);
    }

    #[tokio::test]
    async fn empty_index_returns_no_hits() {
        let index = HintIndex::from_texts(&ToyEmbedder, Vec::new())
            .await
            .expect("index builds");
        assert!(index.is_empty());

        let results = index
            .search(&ToyEmbedder, "anything", 3)
            .await
            .expect("search succeeds");
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn k_larger_than_index_returns_everything() {
        let index = HintIndex::from_texts(&ToyEmbedder, vec!["one".to_string()])
            .await
            .expect("index builds");
        let results = index
            .search(&ToyEmbedder, "one", 10)
            .await
            .expect("search succeeds");
        assert_eq!(results.len(), 1);
    }
}
