// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Settings sources: defaults, TOML files, environment variables and
//! command-line overrides.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::SettingsLayer;
use crate::sections::{FilesSettingsLayer, HttpSettingsLayer, LogFormat, LoggingSettingsLayer};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
	CommandLine = 60,
}

/// Trait for settings sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<SettingsLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<SettingsLayer, ConfigError> {
		debug!("loading defaults");
		Ok(SettingsLayer::default())
	}
}

/// TOML file settings source. A missing file is skipped.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<SettingsLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "settings file not found, skipping");
			return Ok(SettingsLayer::default());
		}

		debug!(path = %self.path.display(), "loading settings file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: SettingsLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!("parsed settings layer from TOML");
		Ok(layer)
	}
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment variable source.
///
/// Convention: PXE_SERVER_<FIELD>
pub struct EnvSource {
	lookup: EnvLookup,
}

impl EnvSource {
	/// Reads the process environment.
	pub fn process() -> Self {
		Self {
			lookup: Box::new(|name| std::env::var(name).ok()),
		}
	}

	/// Reads from a fixed set of variables instead of the process environment.
	pub fn from_vars(vars: HashMap<String, String>) -> Self {
		Self {
			lookup: Box::new(move |name| vars.get(name).cloned()),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		(self.lookup)(name).filter(|s| !s.is_empty())
	}

	fn parsed<T: std::str::FromStr>(&self, name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid {kind} value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn load_http(&self) -> Result<HttpSettingsLayer, ConfigError> {
		Ok(HttpSettingsLayer {
			host: self.var("PXE_SERVER_HOST"),
			port: self.parsed("PXE_SERVER_PORT", "u16")?,
			base_url: self.var("PXE_SERVER_BASE_URL"),
		})
	}

	fn load_files(&self) -> Result<FilesSettingsLayer, ConfigError> {
		Ok(FilesSettingsLayer {
			temp_dir: self.var("PXE_SERVER_TEMP_DIR").map(PathBuf::from),
			fetch_timeout_secs: self.parsed("PXE_SERVER_FETCH_TIMEOUT_SECS", "u64")?,
			convert_timeout_secs: self.parsed("PXE_SERVER_CONVERT_TIMEOUT_SECS", "u64")?,
			qemu_img: self.var("PXE_SERVER_QEMU_IMG"),
		})
	}

	fn load_logging(&self) -> Result<LoggingSettingsLayer, ConfigError> {
		let format = match self.var("PXE_SERVER_LOG_FORMAT") {
			Some(v) => Some(
				v.parse::<LogFormat>()
					.map_err(|message| ConfigError::InvalidValue {
						key: "PXE_SERVER_LOG_FORMAT".to_string(),
						message,
					})?,
			),
			None => None,
		};
		Ok(LoggingSettingsLayer {
			level: self.var("PXE_SERVER_LOG_LEVEL"),
			format,
		})
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<SettingsLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(SettingsLayer {
			http: Some(self.load_http()?),
			files: Some(self.load_files()?),
			logging: Some(self.load_logging()?),
		})
	}
}

/// Values given explicitly on the command line.
pub struct OverridesSource {
	layer: SettingsLayer,
}

impl OverridesSource {
	pub fn new(layer: SettingsLayer) -> Self {
		Self { layer }
	}
}

impl ConfigSource for OverridesSource {
	fn name(&self) -> &'static str {
		"command-line"
	}

	fn precedence(&self) -> Precedence {
		Precedence::CommandLine
	}

	fn load(&self) -> Result<SettingsLayer, ConfigError> {
		Ok(self.layer.clone())
	}
}
