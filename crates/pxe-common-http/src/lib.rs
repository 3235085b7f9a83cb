// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for pxeserver.
//!
//! Remote boot files are fetched from synchronous pipeline code, so the
//! clients built here are `reqwest::blocking` clients. They must be created,
//! used and dropped off the async runtime (e.g. inside `spawn_blocking`).

mod client;

pub use client::{builder, new_client_with_timeout, user_agent};
