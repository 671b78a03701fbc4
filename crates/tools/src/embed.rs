// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embeddings client and brute-force cosine ranking.
//!
//! The corpus sizes here (project names, spec document names) are a few
//! hundred strings, so an O(n·d) scan beats maintaining a vector index.

use dd_core::config::EmbeddingConfig;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("embedding service unavailable")]
    Unavailable,

    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding response malformed: {0}")]
    Malformed(String),
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// OpenAI-style `/embeddings` client with a health-check feature flag.
pub struct EmbeddingClient {
    http: reqwest::Client,
    config: EmbeddingConfig,
    available: AtomicBool,
}

impl EmbeddingClient {
    pub fn new(http: reqwest::Client, config: EmbeddingConfig) -> Self {
        Self { http, config, available: AtomicBool::new(false) }
    }

    /// Probe the endpoint with a one-word embedding; records the result as
    /// the availability flag every tool consults.
    pub async fn health_check(&self) -> bool {
        if self.config.url.is_empty() {
            warn!("embedding url not configured");
            self.available.store(false, Ordering::Relaxed);
            return false;
        }
        let ok = match self.request(vec!["ping".to_string()], Duration::from_secs(5)).await {
            Ok(vectors) => !vectors.is_empty(),
            Err(e) => {
                warn!(error = %e, "embedding health check failed");
                false
            }
        };
        self.available.store(ok, Ordering::Relaxed);
        info!(available = ok, "embedding health check");
        ok
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    #[doc(hidden)]
    pub fn force_available(&self, value: bool) {
        self.available.store(value, Ordering::Relaxed);
    }

    /// Embed a batch of texts, in input order.
    pub async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbedError> {
        if !self.is_available() {
            return Err(EmbedError::Unavailable);
        }
        self.request(texts, Duration::from_secs(30)).await
    }

    async fn request(
        &self,
        texts: Vec<String>,
        timeout: Duration,
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        let url = format!("{}/embeddings", self.config.url.trim_end_matches('/'));
        let expected = texts.len();
        let response = self
            .http
            .post(&url)
            .timeout(timeout)
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({ "model": self.config.model, "input": texts }))
            .send()
            .await?
            .error_for_status()?;
        let body: EmbeddingResponse = response.json().await?;
        if body.data.len() != expected {
            return Err(EmbedError::Malformed(format!(
                "expected {expected} vectors, got {}",
                body.data.len()
            )));
        }
        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }

    /// Rank `candidates` against `query` by cosine similarity, best first.
    /// One batched embedding call: candidates plus the query at the end.
    pub async fn rank_by_similarity(
        &self,
        query: &str,
        candidates: &[String],
        top_k: usize,
    ) -> Result<Vec<(String, f32)>, EmbedError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let mut texts: Vec<String> = candidates.to_vec();
        texts.push(query.to_string());
        let mut vectors = self.embed(texts).await?;
        let query_vec = vectors.pop().ok_or_else(|| {
            EmbedError::Malformed("empty embedding batch".to_string())
        })?;

        let mut scored: Vec<(String, f32)> = candidates
            .iter()
            .zip(vectors.iter())
            .map(|(name, vec)| (name.clone(), cosine_similarity(&query_vec, vec)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}

/// Cosine similarity; zero for mismatched or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
#[path = "embed_tests.rs"]
mod tests;
