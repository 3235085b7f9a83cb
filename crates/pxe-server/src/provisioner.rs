// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wires the host catalog, secret store, renderer and file pipeline together.

use std::path::Path;
use std::sync::Arc;

use pxe_server_config::{FilesSettings, HostCatalog};
use pxe_server_files::{FileArtifact, FileCatalog};
use pxe_server_secrets::{LocalSecretStore, Secrets};
use pxe_server_template::{FileDigests, Renderer, UrlBuilder};
use tracing::{debug, info, instrument};

use crate::error::{ServerError, ServerResult};

/// Boot entry for one machine, with file ids still unresolved to URLs.
#[derive(Debug, Clone, PartialEq)]
pub struct BootSpec {
	pub kernel: String,
	pub initrds: Vec<String>,
	/// Unexpanded cmdline template.
	pub cmdline: String,
	pub force_pxelinux: bool,
}

/// The provisioning engine, built once per process.
pub struct Provisioner {
	catalog: HostCatalog,
	secrets: Arc<dyn Secrets>,
	renderer: Renderer,
	files: Arc<FileCatalog>,
}

impl Provisioner {
	pub fn new(catalog: HostCatalog, secrets: Arc<dyn Secrets>, settings: FilesSettings) -> ServerResult<Self> {
		let renderer = Renderer::new(secrets.clone());
		let files = FileCatalog::load(catalog.files().to_vec(), Arc::new(renderer.clone()), settings)?;
		info!(
			hosts = catalog.hosts().count(),
			files = files.len(),
			"provisioner ready"
		);
		Ok(Self {
			catalog,
			secrets,
			renderer,
			files: Arc::new(files),
		})
	}

	/// Load the host catalog at `catalog_path` and the secret store at
	/// `secrets_path`, seeding the store with the catalog's definitions.
	#[instrument(skip_all, fields(catalog = %catalog_path.display(), secrets = %secrets_path.display()))]
	pub fn open(catalog_path: &Path, secrets_path: &Path, settings: FilesSettings) -> ServerResult<Self> {
		let catalog = HostCatalog::load(catalog_path)?;
		let store = LocalSecretStore::load(secrets_path, catalog.secret_definitions().clone())?;
		Self::new(catalog, Arc::new(store), settings)
	}

	pub fn host_count(&self) -> usize {
		self.catalog.hosts().count()
	}

	pub fn file_count(&self) -> usize {
		self.files.len()
	}

	pub fn secrets(&self) -> &Arc<dyn Secrets> {
		&self.secrets
	}

	pub fn boot_spec(&self, mac: &str) -> ServerResult<BootSpec> {
		let host = self
			.catalog
			.host(mac)
			.ok_or_else(|| ServerError::UnknownHost(mac.to_string()))?;
		Ok(BootSpec {
			kernel: host.kernel.clone(),
			initrds: host.initrds.clone(),
			cmdline: host.cmdline.clone(),
			force_pxelinux: host.force_pxelinux,
		})
	}

	/// Run the file pipeline for `id`.
	pub fn read_boot_file(&self, id: &str) -> ServerResult<FileArtifact> {
		Ok(self.files.read(id)?)
	}

	/// Expand a cmdline template for `mac`. `file_url` calls resolve through
	/// `url_builder`.
	#[instrument(skip(self, template, url_builder))]
	pub fn expand_cmdline(&self, template: &str, mac: &str, url_builder: UrlBuilder) -> ServerResult<String> {
		let host = self
			.catalog
			.host(mac)
			.ok_or_else(|| ServerError::UnknownHost(mac.to_string()))?;
		let digests: Arc<dyn FileDigests> = self.files.clone();
		let cmdline = self
			.renderer
			.render_cmdline(&host.mac, template, &host.vars, url_builder, digests)?;
		debug!(len = cmdline.len(), "cmdline expanded");
		Ok(cmdline)
	}
}
