// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the file pipeline.

use std::path::PathBuf;

use pxe_server_template::TemplateError;
use thiserror::Error;

pub type FileResult<T> = Result<T, FileError>;

#[derive(Debug, Error)]
pub enum FileError {
	#[error("could not find file with ID '{0}'")]
	NotFound(String),

	#[error("file ID '{0}' is declared more than once")]
	DuplicateId(String),

	#[error("built-in asset '{path}' for file '{id}' does not exist")]
	BuiltinNotFound { id: String, path: String },

	#[error("failed to fetch '{url}': {source}")]
	Fetch {
		url: String,
		#[source]
		source: reqwest::Error,
	},

	#[error("failed to download '{url}': {source}")]
	Download {
		url: String,
		#[source]
		source: std::io::Error,
	},

	#[error("bad status '{status}' when downloading remote file '{url}'")]
	BadStatus { url: String, status: u16 },

	#[error("expected '{id}' to have checksum '{expected}' but was '{actual}'")]
	ChecksumMismatch {
		id: String,
		expected: String,
		actual: String,
	},

	#[error("image conversion of '{id}' failed: {message}")]
	Conversion { id: String, message: String },

	#[error("gzip compression of '{id}' failed: {source}")]
	Compression {
		id: String,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to read {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("temporary file error: {0}")]
	TempFile(#[source] std::io::Error),

	#[error("failed to render '{id}': {source}")]
	Render {
		id: String,
		#[source]
		source: TemplateError,
	},
}

impl FileError {
	pub fn is_not_found(&self) -> bool {
		matches!(self, FileError::NotFound(_))
	}
}
