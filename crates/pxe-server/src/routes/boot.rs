// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! `GET /v1/boot/{mac}`, the Pixiecore API-mode boot endpoint.

use std::sync::Arc;

use axum::{
	extract::{Path, State},
	Json,
};
use serde::Serialize;
use tracing::info;

use super::AppState;
use crate::error::{ServerError, ServerResult};

#[derive(Debug, Serialize)]
pub struct BootResponse {
	pub kernel: String,
	pub initrd: Vec<String>,
	pub cmdline: String,
	pub force_pxelinux: bool,
}

pub async fn boot(State(state): State<AppState>, Path(mac): Path<String>) -> ServerResult<Json<BootResponse>> {
	// Cmdline expansion may generate secrets or hash whole images.
	let response = tokio::task::spawn_blocking(move || resolve(&state, &mac))
		.await
		.map_err(|e| ServerError::Internal(format!("boot task failed: {e}")))??;
	Ok(Json(response))
}

fn resolve(state: &AppState, mac: &str) -> ServerResult<BootResponse> {
	let spec = state.provisioner.boot_spec(mac)?;
	let urls = {
		let state = state.clone();
		Arc::new(move |id: &str| state.file_url(id))
	};
	let cmdline = state.provisioner.expand_cmdline(&spec.cmdline, mac, urls)?;
	info!(mac, kernel = %spec.kernel, "serving boot entry");
	Ok(BootResponse {
		kernel: state.file_url(&spec.kernel),
		initrd: spec.initrds.iter().map(|id| state.file_url(id)).collect(),
		cmdline,
		force_pxelinux: spec.force_pxelinux,
	})
}

#[cfg(test)]
mod tests {
	use axum::{
		body::{to_bytes, Body},
		http::{Request, StatusCode},
	};
	use serde_json::json;
	use tower::ServiceExt;

	use crate::routes::{
		create_router,
		test_support::{state, BASE_URL, MAC},
	};

	#[tokio::test]
	async fn returns_urls_and_expanded_cmdline() {
		let (_dir, state) = state();
		let response = create_router(state)
			.oneshot(
				Request::get("/v1/boot/52:54:00:12:34:56")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
		let prefix = format!("{BASE_URL}/v1/files/52%3A54%3A00%3A12%3A34%3A56");
		assert_eq!(
			body,
			json!({
				"kernel": format!("{prefix}-__kernel__"),
				"initrd": [format!("{prefix}-__initrd0__")],
				"cmdline": format!("console=ttyS0 initrd={prefix}-__initrd0__"),
				"force_pxelinux": true,
			})
		);
	}

	#[tokio::test]
	async fn accepts_uppercase_mac() {
		let (_dir, state) = state();
		let response = create_router(state)
			.oneshot(
				Request::get(format!("/v1/boot/{}", MAC.to_uppercase()))
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
	}

	#[tokio::test]
	async fn unknown_mac_is_404() {
		let (_dir, state) = state();
		let response = create_router(state)
			.oneshot(
				Request::get("/v1/boot/aa:bb:cc:dd:ee:ff")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::NOT_FOUND);
		let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
		assert_eq!(body["error"], "not_found");
		assert!(body["message"].as_str().unwrap().contains("aa:bb:cc:dd:ee:ff"));
	}
}
