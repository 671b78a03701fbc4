// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn until_next_is_within_a_day() {
    let wait = until_next(23, 0);
    assert!(wait <= Duration::from_secs(24 * 3600));
    // degenerate inputs clamp instead of panicking
    let wait = until_next(99, 99);
    assert!(wait <= Duration::from_secs(24 * 3600));
}

#[tokio::test(flavor = "multi_thread")]
async fn kernel_starts_and_stops_with_minimal_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = dd_core::test_support::test_config(dir.path());

    let kernel = AppKernel::start(config).await.unwrap();
    // embeddings endpoint is unset, so the feature flag must be off
    assert_eq!(kernel.state().tools.names().len(), 6);
    assert!(!kernel.state().config.server.session_secret.is_empty());
    kernel.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn kernel_generates_secret_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = dd_core::test_support::test_config(dir.path());
    config.server.session_secret = String::new();

    let kernel = AppKernel::start(config).await.unwrap();
    assert!(!kernel.state().config.server.session_secret.is_empty());
    kernel.shutdown().await;
}
