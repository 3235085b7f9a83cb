// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use md5::Md5;
use pxe_server_config::{FileDescriptor, FileSource, FilesSettings};
use pxe_server_template::{BoxError, FileDigests, BUILTIN_PREFIX};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::artifact::FileArtifact;
use crate::compress::gzip;
use crate::convert::convert_to_raw;
use crate::error::{FileError, FileResult};
use crate::source::{read_builtin, read_local, read_remote};
use crate::FileRenderer;

/// Immutable catalog of servable files, keyed by global id.
///
/// Every [`read`](FileCatalog::read) runs the whole pipeline from scratch;
/// nothing is cached.
pub struct FileCatalog {
	files: HashMap<String, FileDescriptor>,
	renderer: Arc<dyn FileRenderer>,
	settings: FilesSettings,
}

impl FileCatalog {
	/// Build the catalog, expanding every path and URL with the path render
	/// surface.
	pub fn load(
		descriptors: impl IntoIterator<Item = FileDescriptor>,
		renderer: Arc<dyn FileRenderer>,
		settings: FilesSettings,
	) -> FileResult<Self> {
		let mut files = HashMap::new();
		for mut descriptor in descriptors {
			let render_error = |source| FileError::Render {
				id: descriptor.id.clone(),
				source,
			};
			descriptor.source = match &descriptor.source {
				FileSource::Path(path) => FileSource::Path(renderer.render_path(path).map_err(render_error)?),
				FileSource::Url(url) => FileSource::Url(renderer.render_path(url).map_err(render_error)?),
			};
			if files.contains_key(&descriptor.id) {
				return Err(FileError::DuplicateId(descriptor.id));
			}
			files.insert(descriptor.id.clone(), descriptor);
		}
		debug!(files = files.len(), "file catalog loaded");
		Ok(Self {
			files,
			renderer,
			settings,
		})
	}

	pub fn contains(&self, id: &str) -> bool {
		self.files.contains_key(id)
	}

	pub fn len(&self) -> usize {
		self.files.len()
	}

	pub fn is_empty(&self) -> bool {
		self.files.is_empty()
	}

	pub fn descriptor(&self, id: &str) -> Option<&FileDescriptor> {
		self.files.get(id)
	}

	/// Resolve `id` to a byte stream.
	#[instrument(skip(self))]
	pub fn read(&self, id: &str) -> FileResult<FileArtifact> {
		let descriptor = self
			.files
			.get(id)
			.ok_or_else(|| FileError::NotFound(id.to_string()))?;

		let mut artifact = match &descriptor.source {
			FileSource::Path(path) if path.starts_with(BUILTIN_PREFIX) => read_builtin(id, path)?,
			FileSource::Url(url) => read_remote(id, url, descriptor.sha256.as_deref(), &self.settings)?,
			FileSource::Path(path) => read_local(descriptor, path, self.renderer.as_ref())?,
		};

		if let Some(convert) = &descriptor.image_convert {
			artifact = convert_to_raw(id, artifact, &convert.input_format, &self.settings)?;
		}

		if descriptor.gzip {
			artifact = gzip(id, artifact, &self.settings)?;
		}

		debug!(id, len = artifact.len(), "file resolved");
		Ok(artifact)
	}

	/// Lowercase hex SHA-256 of the fully resolved file.
	pub fn sha256(&self, id: &str) -> FileResult<String> {
		self.digest::<Sha256>(id)
	}

	/// Lowercase hex MD5 of the fully resolved file.
	pub fn md5(&self, id: &str) -> FileResult<String> {
		self.digest::<Md5>(id)
	}

	fn digest<D: Digest + io::Write>(&self, id: &str) -> FileResult<String> {
		let mut artifact = self.read(id)?;
		let mut hasher = D::new();
		io::copy(&mut artifact, &mut hasher).map_err(|source| FileError::Io {
			path: id.into(),
			source,
		})?;
		Ok(hex::encode(hasher.finalize()))
	}
}

impl FileDigests for FileCatalog {
	fn sha256(&self, id: &str) -> Result<String, BoxError> {
		FileCatalog::sha256(self, id).map_err(Into::into)
	}

	fn md5(&self, id: &str) -> Result<String, BoxError> {
		FileCatalog::md5(self, id).map_err(Into::into)
	}
}
