// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the secret store.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for secrets operations.
pub type SecretsResult<T> = Result<T, SecretsError>;

/// Errors that can occur during secrets operations.
#[derive(Debug, Error)]
pub enum SecretsError {
	// =========================================================================
	// Lookup Errors
	// =========================================================================
	#[error("could not find host '{0}' in secrets")]
	HostNotFound(String),

	#[error("could not find secret '{id}' for host '{host}'")]
	SecretNotFound { host: String, id: String },

	#[error("secret '{id}' for host '{host}' has no field '{field}'")]
	FieldNotFound {
		host: String,
		id: String,
		field: String,
	},

	#[error("no secret definitions registered for host '{0}'")]
	NoDefinitions(String),

	// =========================================================================
	// Generation Errors
	// =========================================================================
	#[error("invalid option '{option}' for secret '{id}': {message}")]
	InvalidOption {
		id: String,
		option: String,
		message: String,
	},

	#[error("key generation failed for secret '{id}': {message}")]
	KeyGeneration { id: String, message: String },

	// =========================================================================
	// Persistence Errors
	// =========================================================================
	#[error("failed to read secrets file {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("secrets file {path} was not valid YAML: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_yaml::Error,
	},

	#[error("failed to write secrets file {path}: {source}")]
	Write {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to serialize secrets: {0}")]
	Serialize(#[source] serde_yaml::Error),
}

impl SecretsError {
	/// Returns true if the error means the requested secret does not exist.
	pub fn is_not_found(&self) -> bool {
		matches!(
			self,
			SecretsError::HostNotFound(_)
				| SecretsError::SecretNotFound { .. }
				| SecretsError::FieldNotFound { .. }
				| SecretsError::NoDefinitions(_)
		)
	}
}
