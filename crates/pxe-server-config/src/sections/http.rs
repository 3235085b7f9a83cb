// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP boot API settings.

use serde::Deserialize;

/// HTTP settings (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct HttpSettings {
	pub host: String,
	pub port: u16,
	/// Prefix of the file URLs handed to booting machines.
	pub base_url: String,
}

impl Default for HttpSettings {
	fn default() -> Self {
		HttpSettingsLayer::default().finalize()
	}
}

/// HTTP settings layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpSettingsLayer {
	#[serde(default)]
	pub host: Option<String>,
	#[serde(default)]
	pub port: Option<u16>,
	#[serde(default)]
	pub base_url: Option<String>,
}

impl HttpSettingsLayer {
	pub fn merge(&mut self, other: HttpSettingsLayer) {
		if other.host.is_some() {
			self.host = other.host;
		}
		if other.port.is_some() {
			self.port = other.port;
		}
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
	}

	pub fn finalize(self) -> HttpSettings {
		let host = self.host.unwrap_or_else(|| "0.0.0.0".to_string());
		let port = self.port.unwrap_or(8080);
		let base_url = self
			.base_url
			.unwrap_or_else(|| format!("http://{host}:{port}"));
		HttpSettings {
			base_url: base_url.trim_end_matches('/').to_string(),
			host,
			port,
		}
	}
}
