// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server error types and HTTP response conversions.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use pxe_server_config::ConfigError;
use pxe_server_files::FileError;
use pxe_server_secrets::SecretsError;
use pxe_server_template::TemplateError;
use serde::Serialize;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Secrets(#[from] SecretsError),

	#[error(transparent)]
	Template(#[from] TemplateError),

	#[error(transparent)]
	Files(#[from] FileError),

	/// No boot entry for this MAC address.
	#[error("no boot entry for host '{0}'")]
	UnknownHost(String),

	#[error("Internal error: {0}")]
	Internal(String),
}

impl ServerError {
	pub fn is_not_found(&self) -> bool {
		match self {
			ServerError::UnknownHost(_) => true,
			ServerError::Config(ConfigError::UnknownHost(_)) => true,
			ServerError::Files(e) => e.is_not_found(),
			ServerError::Secrets(e) => e.is_not_found(),
			_ => false,
		}
	}

	pub fn status_code(&self) -> StatusCode {
		if self.is_not_found() {
			StatusCode::NOT_FOUND
		} else {
			StatusCode::INTERNAL_SERVER_ERROR
		}
	}

	fn code(&self) -> &'static str {
		if self.is_not_found() {
			"not_found"
		} else {
			"internal_error"
		}
	}
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let status = self.status_code();
		if status.is_server_error() {
			tracing::warn!(error = %self, "request failed");
		}
		let body = ErrorResponse {
			error: self.code().to_string(),
			message: self.to_string(),
		};
		(status, Json(body)).into_response()
	}
}
