// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! File pipeline settings.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300;
const DEFAULT_CONVERT_TIMEOUT_SECS: u64 = 1800;
const DEFAULT_QEMU_IMG: &str = "qemu-img";

/// File pipeline settings (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq)]
pub struct FilesSettings {
	/// Directory for intermediate temp files.
	pub temp_dir: PathBuf,
	pub fetch_timeout_secs: u64,
	pub convert_timeout_secs: u64,
	/// Path or name of the `qemu-img` executable.
	pub qemu_img: String,
}

impl FilesSettings {
	pub fn fetch_timeout(&self) -> Duration {
		Duration::from_secs(self.fetch_timeout_secs)
	}

	pub fn convert_timeout(&self) -> Duration {
		Duration::from_secs(self.convert_timeout_secs)
	}
}

impl Default for FilesSettings {
	fn default() -> Self {
		FilesSettingsLayer::default().finalize()
	}
}

/// File pipeline settings layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilesSettingsLayer {
	#[serde(default)]
	pub temp_dir: Option<PathBuf>,
	#[serde(default)]
	pub fetch_timeout_secs: Option<u64>,
	#[serde(default)]
	pub convert_timeout_secs: Option<u64>,
	#[serde(default)]
	pub qemu_img: Option<String>,
}

impl FilesSettingsLayer {
	pub fn merge(&mut self, other: FilesSettingsLayer) {
		if other.temp_dir.is_some() {
			self.temp_dir = other.temp_dir;
		}
		if other.fetch_timeout_secs.is_some() {
			self.fetch_timeout_secs = other.fetch_timeout_secs;
		}
		if other.convert_timeout_secs.is_some() {
			self.convert_timeout_secs = other.convert_timeout_secs;
		}
		if other.qemu_img.is_some() {
			self.qemu_img = other.qemu_img;
		}
	}

	pub fn finalize(self) -> FilesSettings {
		FilesSettings {
			temp_dir: self.temp_dir.unwrap_or_else(std::env::temp_dir),
			fetch_timeout_secs: self
				.fetch_timeout_secs
				.unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
			convert_timeout_secs: self
				.convert_timeout_secs
				.unwrap_or(DEFAULT_CONVERT_TIMEOUT_SECS),
			qemu_img: self
				.qemu_img
				.unwrap_or_else(|| DEFAULT_QEMU_IMG.to_string()),
		}
	}
}
