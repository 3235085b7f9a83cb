// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! `GET /v1/files/{*id}`: stream a resolved file.

use std::io::{self, Read};

use axum::{
	body::Body,
	extract::{Path, State},
	http::{header, StatusCode},
	response::Response,
};
use bytes::Bytes;
use pxe_server_files::FileArtifact;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::AppState;
use crate::error::{ServerError, ServerResult};

const CHUNK_SIZE: usize = 64 * 1024;
const CHANNEL_DEPTH: usize = 4;

pub async fn file(State(state): State<AppState>, Path(id): Path<String>) -> ServerResult<Response> {
	let provisioner = state.provisioner.clone();
	let artifact = {
		let id = id.clone();
		tokio::task::spawn_blocking(move || provisioner.read_boot_file(&id))
			.await
			.map_err(|e| ServerError::Internal(format!("file task failed: {e}")))??
	};
	let len = artifact.len();
	info!(id = %id, len, "serving file");

	Response::builder()
		.status(StatusCode::OK)
		.header(header::CONTENT_TYPE, "application/octet-stream")
		.header(header::CONTENT_LENGTH, len)
		.body(Body::from_stream(stream_artifact(id, artifact)))
		.map_err(|e| ServerError::Internal(e.to_string()))
}

/// Pump the artifact on the blocking pool into a bounded channel. The
/// artifact, and with it any temp files, is dropped once the body ends or the
/// client goes away.
fn stream_artifact(
	id: String,
	mut artifact: FileArtifact,
) -> impl futures::Stream<Item = io::Result<Bytes>> + Send + 'static {
	let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(CHANNEL_DEPTH);

	tokio::task::spawn_blocking(move || {
		let mut buf = vec![0u8; CHUNK_SIZE];
		loop {
			let chunk = match artifact.read(&mut buf) {
				Ok(0) => break,
				Ok(n) => Ok(Bytes::copy_from_slice(&buf[..n])),
				Err(e) => Err(e),
			};
			let failed = chunk.is_err();
			if tx.blocking_send(chunk).is_err() {
				debug!(id = %id, "client went away mid-stream");
				break;
			}
			if failed {
				break;
			}
		}
	});

	futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|chunk| (chunk, rx)) })
}

#[cfg(test)]
mod tests {
	use axum::{
		body::{to_bytes, Body},
		http::{header, Request, StatusCode},
	};
	use tower::ServiceExt;

	use crate::routes::{
		create_router,
		test_support::{state, MAC},
	};

	fn get(path: String) -> Request<Body> {
		Request::get(path).body(Body::empty()).unwrap()
	}

	#[tokio::test]
	async fn streams_file_with_length() {
		let (_dir, state) = state();
		let url = state.file_url(&format!("{MAC}-__initrd0__"));
		let path = url.trim_start_matches(state.base_url.as_str()).to_string();

		let response = create_router(state).oneshot(get(path)).await.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(response.headers()[header::CONTENT_LENGTH], "10");
		let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		assert_eq!(&body[..], b"some-text\n");
	}

	#[tokio::test]
	async fn id_with_space_plus_and_slash_round_trips() {
		let (_dir, state) = state();
		let url = state.file_url(&format!("{MAC}-my notes+v2/draft"));
		let path = url.trim_start_matches(state.base_url.as_str()).to_string();
		assert!(!path.contains(' ') && !path.contains('+'));

		let response = create_router(state).oneshot(get(path)).await.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		assert_eq!(&body[..], b"odd id");
	}

	#[tokio::test]
	async fn accepts_unencoded_id() {
		let (_dir, state) = state();
		let response = create_router(state)
			.oneshot(get(format!("/v1/files/{MAC}-__kernel__")))
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		assert_eq!(&body[..], b"kernel-bytes");
	}

	#[tokio::test]
	async fn unknown_id_is_404() {
		let (_dir, state) = state();
		let response = create_router(state)
			.oneshot(get("/v1/files/nope".to_string()))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn pipeline_failure_is_500_with_message() {
		let (_dir, state) = state();
		let response = create_router(state)
			.oneshot(get(format!("/v1/files/{MAC}-broken")))
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
		let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
		assert_eq!(body["error"], "internal_error");
		assert!(body["message"].as_str().unwrap().contains("broken"));
	}
}
