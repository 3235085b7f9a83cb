// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Settings layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{FilesSettingsLayer, HttpSettingsLayer, LoggingSettingsLayer};

/// Settings layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsLayer {
	#[serde(default)]
	pub http: Option<HttpSettingsLayer>,
	#[serde(default)]
	pub files: Option<FilesSettingsLayer>,
	#[serde(default)]
	pub logging: Option<LoggingSettingsLayer>,
}

impl SettingsLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: SettingsLayer) {
		merge_option(&mut self.http, other.http, HttpSettingsLayer::merge);
		merge_option(&mut self.files, other.files, FilesSettingsLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingSettingsLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}
