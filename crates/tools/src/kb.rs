// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client for the external vector knowledge base (Dify-compatible).
//!
//! Two calls per retrieval: resolve the dataset id by name, then retrieve
//! with optional rerank. Timeouts follow the upstream's observed latency
//! profile (lookup is cheap, retrieval is not).

use dd_core::config::KbConfig;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
const RETRIEVE_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, thiserror::Error)]
pub enum KbError {
    #[error("knowledge base '{0}' not found")]
    DatasetNotFound(String),

    #[error("knowledge base request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// One retrieved record, flattened for display.
#[derive(Debug, Clone, PartialEq)]
pub struct KbRecord {
    pub document_name: String,
    pub score: Option<f64>,
    pub content: String,
}

pub struct KbClient {
    http: reqwest::Client,
    config: KbConfig,
}

impl KbClient {
    pub fn new(http: reqwest::Client, config: KbConfig) -> Self {
        Self { http, config }
    }

    /// Retrieve `top_k` records for `query` from the named knowledge base.
    pub async fn retrieve(
        &self,
        query: &str,
        kb_name: &str,
        top_k: usize,
    ) -> Result<Vec<KbRecord>, KbError> {
        let dataset_id = self.lookup_dataset_id(kb_name).await?;
        debug!(kb = %kb_name, dataset = %dataset_id, "retrieving");

        let url = format!("{}/datasets/{dataset_id}/retrieve", self.base());
        let mut retrieval_model = serde_json::json!({
            "search_method": "semantic_search",
            "reranking_enable": self.config.rerank_enable,
            "top_k": top_k,
            "score_threshold_enabled": false,
        });
        if self.config.rerank_enable {
            retrieval_model["reranking_model"] = serde_json::json!({
                "reranking_provider_name": self.config.rerank_provider,
                "reranking_model_name": self.config.rerank_model,
            });
        }
        let body: Value = self
            .http
            .post(&url)
            .timeout(RETRIEVE_TIMEOUT)
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({ "query": query, "retrieval_model": retrieval_model }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let records: Vec<KbRecord> = body
            .get("records")
            .and_then(Value::as_array)
            .map(|records| records.iter().map(parse_record).collect())
            .unwrap_or_default();
        info!(kb = %kb_name, count = records.len(), "knowledge base retrieval done");
        Ok(records)
    }

    async fn lookup_dataset_id(&self, kb_name: &str) -> Result<String, KbError> {
        let url = format!("{}/datasets", self.base());
        let body: Value = self
            .http
            .get(&url)
            .timeout(LOOKUP_TIMEOUT)
            .bearer_auth(&self.config.api_key)
            .query(&[("keyword", kb_name), ("page", "1"), ("limit", "10")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        body.pointer("/data/0/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| KbError::DatasetNotFound(kb_name.to_string()))
    }

    fn base(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }
}

fn parse_record(record: &Value) -> KbRecord {
    KbRecord {
        document_name: record
            .pointer("/segment/document/name")
            .and_then(Value::as_str)
            .unwrap_or("未知文档")
            .to_string(),
        score: record.get("score").and_then(Value::as_f64),
        content: record
            .pointer("/segment/content")
            .and_then(Value::as_str)
            .unwrap_or("无内容")
            .to_string(),
    }
}

/// Human-readable block the tool hands back to the model.
pub fn format_records(records: &[KbRecord]) -> String {
    let mut out = String::new();
    for (index, record) in records.iter().enumerate() {
        let score = record
            .score
            .map(|s| format!("{s}"))
            .unwrap_or_else(|| "N/A".to_string());
        out.push_str(&format!(
            "\n检索结果 {}\n来自源文档：{}\n相似度分数：{}\n内容如下：\n{}\n\n",
            index + 1,
            record.document_name,
            score,
            record.content
        ));
    }
    out
}

#[cfg(test)]
#[path = "kb_tests.rs"]
mod tests;
