// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn cosine_of_identical_vectors_is_one() {
    let v = [0.3f32, -0.5, 0.8];
    assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
}

#[test]
fn cosine_of_orthogonal_vectors_is_zero() {
    assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
}

#[test]
fn cosine_of_opposite_vectors_is_minus_one() {
    let sim = cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]);
    assert!((sim + 1.0).abs() < 1e-6);
}

#[parameterized(
    mismatched = { &[1.0, 2.0][..], &[1.0][..] },
    empty = { &[][..], &[][..] },
    zero_norm = { &[0.0, 0.0][..], &[1.0, 1.0][..] },
)]
fn degenerate_inputs_score_zero(a: &[f32], b: &[f32]) {
    assert_eq!(cosine_similarity(a, b), 0.0);
}

#[test]
fn scale_invariance() {
    let a = [0.1f32, 0.7, -0.2];
    let b: Vec<f32> = a.iter().map(|x| x * 42.0).collect();
    assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn embed_refuses_when_unavailable() {
    let client = EmbeddingClient::new(
        reqwest::Client::new(),
        dd_core::config::EmbeddingConfig::default(),
    );
    assert!(!client.is_available());
    let err = client.embed(vec!["x".to_string()]).await.unwrap_err();
    assert!(matches!(err, EmbedError::Unavailable));
}

#[tokio::test]
async fn health_check_fails_without_url() {
    let client = EmbeddingClient::new(
        reqwest::Client::new(),
        dd_core::config::EmbeddingConfig::default(),
    );
    assert!(!client.health_check().await);
    assert!(!client.is_available());
}

#[tokio::test]
async fn rank_with_no_candidates_is_empty() {
    let client = EmbeddingClient::new(
        reqwest::Client::new(),
        dd_core::config::EmbeddingConfig::default(),
    );
    client.force_available(true);
    let ranked = client.rank_by_similarity("q", &[], 5).await.unwrap();
    assert!(ranked.is_empty());
}
