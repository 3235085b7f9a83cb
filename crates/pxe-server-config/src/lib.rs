// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for pxeserver.
//!
//! This crate provides:
//! - The host catalog: machines, their boot files and secret definitions
//! - Layered runtime settings from multiple sources (defaults, TOML file,
//!   environment, command line)
//! - Consistent environment variable naming (`PXE_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use pxe_server_config::{load_settings, HostCatalog, SettingsLayer};
//!
//! let catalog = HostCatalog::load("hosts.yaml".as_ref())?;
//! let settings = load_settings(None, SettingsLayer::default())?;
//! println!("listening on {}", settings.socket_addr());
//! ```

pub mod catalog;
pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use catalog::{
	merge_vars, namespaced_id, normalize_mac, FileDescriptor, FileSource, HostCatalog, HostConfig,
	ImageConvert, SecretDefinition, SecretKind, Vars, SHARED_HOST,
};
pub use error::ConfigError;
pub use layer::SettingsLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, OverridesSource, Precedence, TomlSource};

use std::path::Path;

use tracing::debug;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Fully resolved runtime settings.
#[derive(Debug, Clone, Default)]
pub struct ServerSettings {
	pub http: HttpSettings,
	pub files: FilesSettings,
	pub logging: LoggingSettings,
}

impl ServerSettings {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load settings from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Command-line `overrides`
/// 2. Environment variables (`PXE_SERVER_*`)
/// 3. Settings file at `settings_path`, if given and present
/// 4. Built-in defaults
pub fn load_settings(
	settings_path: Option<&Path>,
	overrides: SettingsLayer,
) -> ConfigResult<ServerSettings> {
	let mut sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(EnvSource::process()),
		Box::new(OverridesSource::new(overrides)),
	];
	if let Some(path) = settings_path {
		sources.push(Box::new(TomlSource::new(path)));
	}
	load_from_sources(sources)
}

/// Merge the given sources in precedence order and resolve the result.
pub fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> ConfigResult<ServerSettings> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = SettingsLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading settings source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

fn finalize(layer: SettingsLayer) -> ConfigResult<ServerSettings> {
	let settings = ServerSettings {
		http: layer.http.unwrap_or_default().finalize(),
		files: layer.files.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	validate_settings(&settings)?;
	Ok(settings)
}

fn validate_settings(settings: &ServerSettings) -> ConfigResult<()> {
	if settings.files.fetch_timeout_secs == 0 {
		return Err(ConfigError::InvalidValue {
			key: "files.fetch_timeout_secs".to_string(),
			message: "must be greater than zero".to_string(),
		});
	}
	if settings.files.convert_timeout_secs == 0 {
		return Err(ConfigError::InvalidValue {
			key: "files.convert_timeout_secs".to_string(),
			message: "must be greater than zero".to_string(),
		});
	}
	if !settings.http.base_url.starts_with("http://") && !settings.http.base_url.starts_with("https://") {
		return Err(ConfigError::InvalidValue {
			key: "http.base_url".to_string(),
			message: format!("'{}' is not an http(s) URL", settings.http.base_url),
		});
	}
	Ok(())
}
