// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration error types.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("config file was not valid YAML/JSON: {0}")]
	CatalogParse(#[source] serde_yaml::Error),

	#[error("Failed to read host catalog: {0}")]
	CatalogRead(#[source] std::io::Error),

	#[error("Failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse TOML config at {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("Invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	#[error("could not find host '{0}' in config file")]
	UnknownHost(String),

	#[error("Validation error: {0}")]
	Validation(String),
}
