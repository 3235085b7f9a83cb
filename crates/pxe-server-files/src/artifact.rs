// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resolved file streams.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{FileError, FileResult};

/// Byte stream of a resolved file plus its exact length.
///
/// Owns every temporary file backing the stream; dropping the artifact
/// deletes them.
pub struct FileArtifact {
	reader: Box<dyn Read + Send>,
	len: u64,
}

impl FileArtifact {
	pub(crate) fn new(reader: impl Read + Send + 'static, len: u64) -> Self {
		Self {
			reader: Box::new(reader),
			len,
		}
	}

	pub(crate) fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
		let data = data.into();
		let len = data.len() as u64;
		Self::new(io::Cursor::new(data), len)
	}

	/// Wrap a temp file positioned at its start; the file is deleted when the
	/// artifact is dropped.
	pub(crate) fn from_temp_file(file: NamedTempFile) -> FileResult<Self> {
		let len = file
			.as_file()
			.metadata()
			.map_err(FileError::TempFile)?
			.len();
		Ok(Self::new(file, len))
	}

	/// Reopen a temp file that an external process wrote by path.
	pub(crate) fn reopen_temp_file(guard: NamedTempFile) -> FileResult<Self> {
		let file = File::open(guard.path()).map_err(FileError::TempFile)?;
		let len = file.metadata().map_err(FileError::TempFile)?.len();
		Ok(Self::new(TempFileStream { file, _guard: guard }, len))
	}

	pub fn len(&self) -> u64 {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Read the whole artifact into memory.
	pub fn into_bytes(mut self) -> io::Result<Vec<u8>> {
		let mut buf = Vec::with_capacity(self.len as usize);
		self.read_to_end(&mut buf)?;
		Ok(buf)
	}
}

impl Read for FileArtifact {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		self.reader.read(buf)
	}
}

impl fmt::Debug for FileArtifact {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FileArtifact").field("len", &self.len).finish()
	}
}

struct TempFileStream {
	file: File,
	_guard: NamedTempFile,
}

impl Read for TempFileStream {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		self.file.read(buf)
	}
}

/// Create an empty `pxeserver-` temp file in `dir`.
pub(crate) fn temp_file(dir: &Path) -> FileResult<NamedTempFile> {
	tempfile::Builder::new()
		.prefix("pxeserver-")
		.tempfile_in(dir)
		.map_err(FileError::TempFile)
}
