// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Host catalog: the declarative description of machines, the files they
//! boot from, and the secrets their templates may ask for.
//!
//! The catalog file is YAML (JSON is accepted as a subset). Loading
//! normalizes it into the read-only shapes the rest of the workspace
//! consumes:
//!
//! - every file gets a globally unique id namespaced by its host
//!   (`<mac>-<id>`, `<mac>-__kernel__`, `<mac>-__initrd<N>__`)
//! - host vars are layered over the global vars, file vars under host vars
//! - secret definitions are grouped by host, shared ones under `""`

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::error::ConfigError;

/// Variable tree attached to hosts and files.
pub type Vars = Map<String, Value>;

/// Host key of the shared secret namespace.
pub const SHARED_HOST: &str = "";

/// Kinds of secret the store knows how to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretKind {
	Password,
	SshKey,
}

impl SecretKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			SecretKind::Password => "password",
			SecretKind::SshKey => "ssh_key",
		}
	}
}

/// Declaration that `id` must resolve to a generated value of `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretDefinition {
	pub id: String,
	#[serde(rename = "type")]
	pub kind: SecretKind,
	#[serde(default, alias = "options")]
	pub opts: Vars,
}

impl SecretDefinition {
	pub fn new(id: impl Into<String>, kind: SecretKind) -> Self {
		Self {
			id: id.into(),
			kind,
			opts: Vars::new(),
		}
	}

	pub fn with_opt(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.opts.insert(key.into(), value.into());
		self
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConvert {
	pub input_format: String,
}

/// Where a file's bytes come from before any conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
	/// Filesystem path, or a `__builtin__/` asset path.
	Path(String),
	/// HTTP(S) URL.
	Url(String),
}

/// A servable file, keyed by its globally unique id.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDescriptor {
	pub id: String,
	pub host: String,
	pub source: FileSource,
	/// Expected SHA-256 (hex) of remote content.
	pub sha256: Option<String>,
	pub template: bool,
	pub vars: Vars,
	pub image_convert: Option<ImageConvert>,
	pub gzip: bool,
}

impl FileDescriptor {
	pub fn local(id: impl Into<String>, path: impl Into<String>) -> Self {
		Self::with_source(id, FileSource::Path(path.into()))
	}

	pub fn remote(id: impl Into<String>, url: impl Into<String>) -> Self {
		Self::with_source(id, FileSource::Url(url.into()))
	}

	fn with_source(id: impl Into<String>, source: FileSource) -> Self {
		Self {
			id: id.into(),
			host: String::new(),
			source,
			sha256: None,
			template: false,
			vars: Vars::new(),
			image_convert: None,
			gzip: false,
		}
	}

	pub fn for_host(mut self, host: impl Into<String>) -> Self {
		self.host = host.into();
		self
	}

	/// Marks the file as a template rendered with `vars`.
	pub fn templated(mut self, vars: Vars) -> Self {
		self.template = true;
		self.vars = vars;
		self
	}

	pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
		self.sha256 = Some(sha256.into());
		self
	}

	pub fn with_image_convert(mut self, input_format: impl Into<String>) -> Self {
		self.image_convert = Some(ImageConvert {
			input_format: input_format.into(),
		});
		self
	}

	pub fn with_gzip(mut self) -> Self {
		self.gzip = true;
		self
	}
}

/// Per-machine boot entry.
#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
	pub mac: String,
	pub kernel: String,
	pub initrds: Vec<String>,
	/// Cmdline template: the host's `boot_args` joined by spaces.
	pub cmdline: String,
	pub force_pxelinux: bool,
	pub vars: Vars,
}

/// Namespaces a host-local id into the global file id space.
pub fn namespaced_id(host: &str, id: &str) -> String {
	format!("{host}-{id}")
}

/// Normalizes a MAC address for use as a host key.
pub fn normalize_mac(mac: &str) -> String {
	mac.trim().to_ascii_lowercase()
}

/// Overlays `overlay` onto `base`. Mappings merge recursively; any other
/// value in `overlay` replaces the one in `base`.
pub fn merge_vars(base: &mut Vars, overlay: &Vars) {
	for (key, value) in overlay {
		match (base.get_mut(key), value) {
			(Some(Value::Object(existing)), Value::Object(incoming)) => merge_vars(existing, incoming),
			_ => {
				base.insert(key.clone(), value.clone());
			}
		}
	}
}

#[derive(Debug, Default, Deserialize)]
struct CatalogDocument {
	#[serde(default)]
	hosts: Vec<HostDocument>,
	#[serde(default)]
	vars: Option<Vars>,
	#[serde(default)]
	shared_secrets: Vec<SecretDefinition>,
}

#[derive(Debug, Deserialize)]
struct HostDocument {
	mac: String,
	kernel: FileDocument,
	#[serde(default)]
	initrds: Vec<FileDocument>,
	#[serde(default)]
	files: Vec<FileDocument>,
	#[serde(default)]
	boot_args: Vec<String>,
	#[serde(default)]
	force_pxelinux: bool,
	#[serde(default)]
	vars: Option<Vars>,
	#[serde(default)]
	secrets: Vec<SecretDefinition>,
}

#[derive(Debug, Deserialize)]
struct FileDocument {
	#[serde(default)]
	id: String,
	#[serde(default)]
	path: Option<String>,
	#[serde(default)]
	url: Option<String>,
	#[serde(default, alias = "checksum")]
	sha256: Option<String>,
	#[serde(default)]
	template: bool,
	#[serde(default)]
	vars: Option<Vars>,
	#[serde(default)]
	image_convert: Option<ImageConvert>,
	#[serde(default)]
	gzip: bool,
}

impl FileDocument {
	fn into_descriptor(self, id: String, host: &str, vars: Vars) -> Result<FileDescriptor, ConfigError> {
		let source = match (self.path, self.url) {
			(Some(path), None) => FileSource::Path(path),
			(None, Some(url)) => FileSource::Url(url),
			(Some(_), Some(_)) => {
				return Err(ConfigError::Validation(format!(
					"file with ID '{id}' must set only one of 'path' or 'url'"
				)))
			}
			(None, None) => {
				return Err(ConfigError::Validation(format!(
					"file with ID '{id}' must set 'path' or 'url'"
				)))
			}
		};
		Ok(FileDescriptor {
			id,
			host: host.to_string(),
			source,
			sha256: self.sha256.filter(|s| !s.is_empty()),
			template: self.template,
			vars,
			image_convert: self.image_convert.filter(|c| !c.input_format.is_empty()),
			gzip: self.gzip,
		})
	}
}

/// Normalized, read-only host catalog.
#[derive(Debug, Clone, Default)]
pub struct HostCatalog {
	hosts: BTreeMap<String, HostConfig>,
	files: Vec<FileDescriptor>,
	secret_definitions: HashMap<String, Vec<SecretDefinition>>,
}

impl HostCatalog {
	/// Load a catalog from a YAML/JSON file.
	#[instrument(skip(path), fields(path = %path.display()))]
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
			path: path.to_path_buf(),
			source,
		})?;
		Self::parse(&content)
	}

	/// Load a catalog from any reader.
	pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, ConfigError> {
		let mut content = String::new();
		reader
			.read_to_string(&mut content)
			.map_err(ConfigError::CatalogRead)?;
		Self::parse(&content)
	}

	/// Parse catalog text.
	pub fn parse(content: &str) -> Result<Self, ConfigError> {
		let document: CatalogDocument = if content.trim().is_empty() {
			CatalogDocument::default()
		} else {
			serde_yaml::from_str(content).map_err(ConfigError::CatalogParse)?
		};
		Self::from_document(document)
	}

	fn from_document(document: CatalogDocument) -> Result<Self, ConfigError> {
		let global_vars = document.vars.unwrap_or_default();
		let mut catalog = HostCatalog::default();
		let mut seen_files = HashSet::new();

		if !document.shared_secrets.is_empty() {
			check_unique_secrets(SHARED_HOST, &document.shared_secrets)?;
			catalog
				.secret_definitions
				.insert(SHARED_HOST.to_string(), document.shared_secrets);
		}

		for host in document.hosts {
			let mac = normalize_mac(&host.mac);
			if mac.is_empty() {
				return Err(ConfigError::Validation("host entry is missing 'mac'".to_string()));
			}
			if catalog.hosts.contains_key(&mac) {
				return Err(ConfigError::Validation(format!("host '{mac}' is declared more than once")));
			}

			let mut host_vars = global_vars.clone();
			merge_vars(&mut host_vars, &host.vars.unwrap_or_default());

			let mut host_files = Vec::new();

			let kernel_id = namespaced_id(&mac, "__kernel__");
			let kernel_vars = boot_file_vars(&host.kernel, &host_vars);
			host_files.push(host.kernel.into_descriptor(kernel_id.clone(), &mac, kernel_vars)?);

			let mut initrd_ids = Vec::with_capacity(host.initrds.len());
			for (index, initrd) in host.initrds.into_iter().enumerate() {
				let id = namespaced_id(&mac, &format!("__initrd{index}__"));
				initrd_ids.push(id.clone());
				let vars = boot_file_vars(&initrd, &host_vars);
				host_files.push(initrd.into_descriptor(id, &mac, vars)?);
			}

			for file in host.files {
				if file.id.is_empty() {
					return Err(ConfigError::Validation(format!(
						"host '{mac}' declares a file without an 'id'"
					)));
				}
				let file_vars = file.vars.clone().unwrap_or_default();
				if !file_vars.is_empty() && !file.template {
					return Err(ConfigError::Validation(format!(
						"file with ID '{}' must have 'template: true' if 'vars' are non-empty",
						file.id
					)));
				}
				let mut vars = file_vars;
				if file.template {
					merge_vars(&mut vars, &host_vars);
				}
				let id = namespaced_id(&mac, &file.id);
				host_files.push(file.into_descriptor(id, &mac, vars)?);
			}

			for file in &host_files {
				if !seen_files.insert(file.id.clone()) {
					return Err(ConfigError::Validation(format!(
						"file ID '{}' is declared more than once",
						file.id
					)));
				}
			}

			if !host.secrets.is_empty() {
				check_unique_secrets(&mac, &host.secrets)?;
				catalog.secret_definitions.insert(mac.clone(), host.secrets);
			}

			debug!(
				mac = %mac,
				files = host_files.len(),
				"loaded host"
			);

			catalog.files.extend(host_files);
			catalog.hosts.insert(
				mac.clone(),
				HostConfig {
					mac,
					kernel: kernel_id,
					initrds: initrd_ids,
					cmdline: host.boot_args.join(" "),
					force_pxelinux: host.force_pxelinux,
					vars: host_vars,
				},
			);
		}

		info!(
			hosts = catalog.hosts.len(),
			files = catalog.files.len(),
			secret_hosts = catalog.secret_definitions.len(),
			"host catalog loaded"
		);

		Ok(catalog)
	}

	pub fn host(&self, mac: &str) -> Option<&HostConfig> {
		self.hosts.get(&normalize_mac(mac))
	}

	pub fn hosts(&self) -> impl Iterator<Item = &HostConfig> {
		self.hosts.values()
	}

	pub fn files(&self) -> &[FileDescriptor] {
		&self.files
	}

	/// Merged vars for a host (global vars overlaid by the host's own).
	pub fn vars_for_host(&self, mac: &str) -> Result<&Vars, ConfigError> {
		self
			.host(mac)
			.map(|host| &host.vars)
			.ok_or_else(|| ConfigError::UnknownHost(mac.to_string()))
	}

	pub fn secret_definitions(&self) -> &HashMap<String, Vec<SecretDefinition>> {
		&self.secret_definitions
	}
}

/// Kernels and initrds carry no vars of their own; templated ones see the
/// host's vars.
fn boot_file_vars(file: &FileDocument, host_vars: &Vars) -> Vars {
	if file.template {
		host_vars.clone()
	} else {
		Vars::new()
	}
}

fn check_unique_secrets(host: &str, definitions: &[SecretDefinition]) -> Result<(), ConfigError> {
	let mut seen = HashSet::new();
	for definition in definitions {
		if !seen.insert(definition.id.as_str()) {
			return Err(ConfigError::Validation(format!(
				"secret '{}' is declared more than once for host '{host}'",
				definition.id
			)));
		}
	}
	Ok(())
}
