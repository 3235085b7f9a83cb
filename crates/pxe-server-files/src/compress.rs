// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Gzip stage.

use std::io::{self, Seek, SeekFrom};

use flate2::write::GzEncoder;
use flate2::Compression;
use pxe_server_config::FilesSettings;
use tracing::debug;

use crate::artifact::{temp_file, FileArtifact};
use crate::error::{FileError, FileResult};

pub(crate) fn gzip(id: &str, mut input: FileArtifact, settings: &FilesSettings) -> FileResult<FileArtifact> {
	let compression_error = |source| FileError::Compression {
		id: id.to_string(),
		source,
	};

	let mut output = temp_file(&settings.temp_dir)?;
	let mut encoder = GzEncoder::new(output.as_file_mut(), Compression::default());
	io::copy(&mut input, &mut encoder).map_err(compression_error)?;
	encoder.finish().map_err(compression_error)?;
	drop(input);

	output.seek(SeekFrom::Start(0)).map_err(FileError::TempFile)?;
	let artifact = FileArtifact::from_temp_file(output)?;
	debug!(id, compressed_len = artifact.len(), "gzipped file");
	Ok(artifact)
}

#[cfg(test)]
mod tests {
	use super::*;
	use flate2::read::GzDecoder;
	use std::io::Read;

	#[test]
	fn output_decompresses_to_input() {
		let dir = tempfile::tempdir().unwrap();
		let settings = FilesSettings {
			temp_dir: dir.path().to_path_buf(),
			..FilesSettings::default()
		};
		let original = "some-text\n".repeat(1000);

		let artifact = gzip("initrd", FileArtifact::from_bytes(original.clone()), &settings).unwrap();
		assert!(artifact.len() < original.len() as u64);

		let mut decoded = String::new();
		GzDecoder::new(artifact).read_to_string(&mut decoded).unwrap();
		assert_eq!(decoded, original);
		assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
	}
}
