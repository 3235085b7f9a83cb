// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP route handlers for the boot API.

pub mod boot;
pub mod files;
pub mod health;

use std::sync::Arc;

use axum::{routing::get, Router};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::Provisioner;

/// Everything but RFC 3986 unreserved characters, so an id stays one path
/// segment.
const FILE_ID: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
	pub provisioner: Arc<Provisioner>,
	/// Externally reachable base URL, without a trailing slash.
	pub base_url: String,
}

impl AppState {
	pub fn new(provisioner: Arc<Provisioner>, base_url: impl Into<String>) -> Self {
		let base_url = base_url.into().trim_end_matches('/').to_string();
		Self {
			provisioner,
			base_url,
		}
	}

	/// Absolute URL at which file `id` is served.
	pub fn file_url(&self, id: &str) -> String {
		format!("{}/v1/files/{}", self.base_url, utf8_percent_encode(id, FILE_ID))
	}
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health::health))
		.route("/v1/boot/{mac}", get(boot::boot))
		.route("/v1/files/{*id}", get(files::file))
		.with_state(state)
}


#[cfg(test)]
mod tests {
	use super::test_support::{state, BASE_URL, MAC};

	#[test]
	fn file_url_percent_encodes_id() {
		let (_dir, state) = state();
		assert_eq!(
			state.file_url(&format!("{MAC}-__kernel__")),
			format!("{BASE_URL}/v1/files/52%3A54%3A00%3A12%3A34%3A56-__kernel__")
		);
		assert_eq!(
			state.file_url("a b+c/d"),
			format!("{BASE_URL}/v1/files/a%20b%2Bc%2Fd")
		);
	}
}
