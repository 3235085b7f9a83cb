// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Template error types.

use thiserror::Error;

pub type TemplateResult<T> = Result<T, TemplateError>;

/// Boxed error returned by injected capabilities.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum TemplateError {
	#[error("template syntax error: {0}")]
	Syntax(#[source] minijinja::Error),

	#[error("template references missing variable '{name}'")]
	MissingVariable {
		name: String,
		#[source]
		source: minijinja::Error,
	},

	#[error("template rendering failed: {0}")]
	Render(#[source] minijinja::Error),
}

/// Failure inside a template function, attached to the render error as its
/// source.
#[derive(Debug, Error)]
#[error("{function}(\"{argument}\") failed: {source}")]
pub(crate) struct FunctionError {
	pub function: &'static str,
	pub argument: String,
	#[source]
	pub source: BoxError,
}
