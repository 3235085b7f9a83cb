// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! First pipeline stage: produce the raw bytes of a file.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use pxe_server_config::{FileDescriptor, FilesSettings};
use pxe_server_template::BUILTIN_PREFIX;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::artifact::{temp_file, FileArtifact};
use crate::assets::builtin_asset;
use crate::error::{FileError, FileResult};
use crate::FileRenderer;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

pub(crate) fn read_builtin(id: &str, path: &str) -> FileResult<FileArtifact> {
	let asset = path.strip_prefix(BUILTIN_PREFIX).unwrap_or(path);
	let data = builtin_asset(asset).ok_or_else(|| FileError::BuiltinNotFound {
		id: id.to_string(),
		path: asset.to_string(),
	})?;
	debug!(id, asset, len = data.len(), "serving built-in asset");
	Ok(FileArtifact::from_bytes(data))
}

/// Download `url` into a temp file, verifying `expected_sha256` if given.
pub(crate) fn read_remote(
	id: &str,
	url: &str,
	expected_sha256: Option<&str>,
	settings: &FilesSettings,
) -> FileResult<FileArtifact> {
	let fetch_error = |source| FileError::Fetch {
		url: url.to_string(),
		source,
	};

	let client = pxe_common_http::new_client_with_timeout(settings.fetch_timeout()).map_err(fetch_error)?;
	let mut response = client.get(url).send().map_err(fetch_error)?;

	let status = response.status().as_u16();
	if status >= 300 {
		return Err(FileError::BadStatus {
			url: url.to_string(),
			status,
		});
	}

	let mut file = temp_file(&settings.temp_dir)?;
	let mut hasher = expected_sha256.map(|_| Sha256::new());
	let mut buf = vec![0u8; COPY_BUFFER_SIZE];
	let mut total = 0u64;
	loop {
		let n = response.read(&mut buf).map_err(|source| FileError::Download {
			url: url.to_string(),
			source,
		})?;
		if n == 0 {
			break;
		}
		if let Some(hasher) = hasher.as_mut() {
			hasher.update(&buf[..n]);
		}
		file.write_all(&buf[..n]).map_err(FileError::TempFile)?;
		total += n as u64;
	}
	file.flush().map_err(FileError::TempFile)?;
	debug!(id, url, bytes = total, "downloaded remote file");

	if let (Some(expected), Some(hasher)) = (expected_sha256, hasher) {
		let actual = hex::encode(hasher.finalize());
		if !actual.eq_ignore_ascii_case(expected) {
			return Err(FileError::ChecksumMismatch {
				id: id.to_string(),
				expected: expected.to_string(),
				actual,
			});
		}
	}

	file.seek(SeekFrom::Start(0)).map_err(FileError::TempFile)?;
	FileArtifact::from_temp_file(file)
}

/// Open a local file, rendering it first when it is a template.
pub(crate) fn read_local(
	descriptor: &FileDescriptor,
	path: &str,
	renderer: &dyn FileRenderer,
) -> FileResult<FileArtifact> {
	let io_error = |source| FileError::Io {
		path: Path::new(path).to_path_buf(),
		source,
	};

	let mut file = File::open(path).map_err(io_error)?;

	if !descriptor.template {
		let len = file.metadata().map_err(io_error)?.len();
		return Ok(FileArtifact::new(file, len));
	}

	let mut template = String::new();
	file.read_to_string(&mut template).map_err(io_error)?;
	let rendered = renderer
		.render_file(&descriptor.host, &template, &descriptor.vars)
		.map_err(|source| FileError::Render {
			id: descriptor.id.clone(),
			source,
		})?;
	debug!(id = %descriptor.id, len = rendered.len(), "rendered template file");
	Ok(FileArtifact::from_bytes(rendered))
}
