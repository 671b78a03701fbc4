// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dd-index: content-addressed index over the document roots.
//!
//! A full scan populates the store at startup; recursive filesystem
//! watchers keep it live, with creates/modifies debounced and deletes
//! applied immediately. Queries are typed and run off the reactor.

mod meta;
mod service;
mod store;
mod watcher;

pub use meta::{extract_metadata, md5_file};
pub use service::IndexService;
pub use store::{IndexError, IndexStore, Query};
