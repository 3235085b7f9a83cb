// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Provisioning facade and HTTP boot API.
//!
//! [`Provisioner`] owns the host catalog, the secret store, the renderer and
//! the file pipeline. The boot API exposes it in the shape Pixiecore's API
//! mode expects, so any Pixiecore-compatible DHCP/TFTP front end can boot
//! machines from it:
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /v1/boot/{mac}` | `{kernel, initrd[], cmdline, force_pxelinux}` |
//! | `GET /v1/files/{*id}` | file bytes |
//! | `GET /health` | `{status, hosts, files}` |

pub mod error;
pub mod provisioner;
pub mod routes;

pub use error::{ErrorResponse, ServerError, ServerResult};
pub use provisioner::{BootSpec, Provisioner};
pub use routes::{create_router, AppState};

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Serve the boot API on `addr` until ctrl-c.
pub async fn serve(state: AppState, addr: &str) -> std::io::Result<()> {
	let app = create_router(state).layer(TraceLayer::new_for_http());
	let listener = TcpListener::bind(addr).await?;
	tracing::info!(addr = %listener.local_addr()?, "boot API listening");

	tokio::select! {
		result = axum::serve(listener, app) => result,
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
			Ok(())
		}
	}
}
