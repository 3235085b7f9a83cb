// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Disk image conversion through `qemu-img`.

use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use pxe_server_config::FilesSettings;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::artifact::{temp_file, FileArtifact};
use crate::error::{FileError, FileResult};

/// Convert `input` from `input_format` to a raw image.
pub(crate) fn convert_to_raw(
	id: &str,
	mut input: FileArtifact,
	input_format: &str,
	settings: &FilesSettings,
) -> FileResult<FileArtifact> {
	let conversion_error = |message: String| FileError::Conversion {
		id: id.to_string(),
		message,
	};

	if input_format.is_empty() || !input_format.chars().all(|c| c.is_ascii_alphanumeric()) {
		return Err(conversion_error(format!("invalid input format '{input_format}'")));
	}

	let mut staged = temp_file(&settings.temp_dir)?;
	io::copy(&mut input, &mut staged).map_err(FileError::TempFile)?;
	staged.flush().map_err(FileError::TempFile)?;
	drop(input);

	let output = temp_file(&settings.temp_dir)?;

	debug!(
		id,
		qemu_img = %settings.qemu_img,
		input_format,
		"converting image to raw"
	);
	let mut child = Command::new(&settings.qemu_img)
		.arg("convert")
		.args(["-f", input_format, "-O", "raw"])
		.arg(staged.path())
		.arg(output.path())
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::piped())
		.spawn()
		.map_err(|e| conversion_error(format!("failed to run '{}': {e}", settings.qemu_img)))?;

	let stderr = child.stderr.take().map(|mut pipe| {
		thread::spawn(move || {
			let mut text = String::new();
			let _ = pipe.read_to_string(&mut text);
			text
		})
	});

	let status = wait_with_timeout(&mut child, settings.convert_timeout());
	let stderr = stderr
		.and_then(|handle| handle.join().ok())
		.unwrap_or_default();

	match status {
		Ok(Some(status)) if status.success() => {}
		Ok(Some(status)) => {
			return Err(conversion_error(format!(
				"qemu-img exited with {status}: {}",
				stderr.trim()
			)))
		}
		Ok(None) => {
			warn!(id, timeout_secs = settings.convert_timeout_secs, "qemu-img timed out");
			return Err(conversion_error(format!(
				"qemu-img did not finish within {}s",
				settings.convert_timeout_secs
			)));
		}
		Err(e) => return Err(conversion_error(format!("failed waiting for qemu-img: {e}"))),
	}

	drop(staged);
	FileArtifact::reopen_temp_file(output)
}

/// Wait for `child`, killing it once `timeout` elapses. `Ok(None)` means it
/// was killed.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
	if let Some(status) = child.wait_timeout(timeout)? {
		return Ok(Some(status));
	}
	child.kill()?;
	child.wait()?;
	Ok(None)
}
