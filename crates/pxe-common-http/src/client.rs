// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Blocking HTTP client with consistent User-Agent header.

use reqwest::blocking::{Client, ClientBuilder};
use std::time::Duration;

/// Creates a blocking client builder with the standard pxeserver User-Agent.
///
/// Use this when you need to customize the client beyond a timeout.
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a blocking client whose requests (connect + full body) are bounded
/// by `timeout`.
pub fn new_client_with_timeout(timeout: Duration) -> reqwest::Result<Client> {
	tracing::trace!(timeout_secs = timeout.as_secs(), "building HTTP client");
	builder().timeout(timeout).build()
}

/// Returns the standard User-Agent string.
///
/// Format: `pxeserver/{version} ({os}-{arch})`
pub fn user_agent() -> String {
	format!(
		"pxeserver/{} ({}-{})",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}
