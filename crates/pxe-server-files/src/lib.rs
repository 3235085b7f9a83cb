// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! File resolution pipeline for pxeserver.
//!
//! A read resolves a file id through up to three stages:
//!
//! 1. **Source**: a built-in asset, an HTTP(S) download (optionally
//!    SHA-256 verified) or a local file (optionally rendered as a template)
//! 2. **Conversion**: `qemu-img convert` to a raw image
//! 3. **Compression**: gzip
//!
//! Intermediate data lives in `pxeserver-*` temp files that are removed as
//! soon as the value owning them is dropped.

mod artifact;
mod assets;
mod catalog;
mod compress;
mod convert;
pub mod error;
mod source;

pub use artifact::FileArtifact;
pub use assets::{builtin_asset, builtin_assets};
pub use catalog::FileCatalog;
pub use error::{FileError, FileResult};

use pxe_server_config::Vars;
use pxe_server_template::{Renderer, TemplateResult};

/// Template expansion needed by the pipeline.
pub trait FileRenderer: Send + Sync {
	fn render_file(&self, host: &str, template: &str, vars: &Vars) -> TemplateResult<String>;
	fn render_path(&self, template: &str) -> TemplateResult<String>;
}

impl FileRenderer for Renderer {
	fn render_file(&self, host: &str, template: &str, vars: &Vars) -> TemplateResult<String> {
		Renderer::render_file(self, host, template, vars)
	}

	fn render_path(&self, template: &str) -> TemplateResult<String> {
		Renderer::render_path(self, template)
	}
}
