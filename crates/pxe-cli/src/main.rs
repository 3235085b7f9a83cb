// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pxe_server::{AppState, Provisioner};
use pxe_server_config::{
	load_settings, namespaced_id, normalize_mac, HttpSettingsLayer, LogFormat, LoggingSettings,
	LoggingSettingsLayer, ServerSettings, SettingsLayer,
};
use pxe_server_secrets::{LocalSecretStore, Secrets};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pxeserver", version, about, long_about = None)]
struct Args {
	/// Path to a TOML settings file
	#[arg(long, global = true)]
	settings: Option<PathBuf>,

	/// Log level or filter directive (e.g. debug, pxe_server=trace)
	#[arg(long, global = true)]
	log_level: Option<String>,

	/// Emit logs as JSON
	#[arg(long, global = true)]
	json_logs: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Serve the boot API
	Boot {
		/// Host catalog (YAML or JSON)
		#[arg(long)]
		config: PathBuf,
		/// Secret store file
		#[arg(long)]
		secrets: PathBuf,
		/// Address to listen on
		#[arg(long, value_name = "HOST:PORT", value_parser = parse_listen)]
		listen: Option<(String, u16)>,
		/// Base URL clients use to reach this server
		#[arg(long)]
		base_url: Option<String>,
	},
	/// Print a stored secret
	Secrets {
		/// Secret store file
		#[arg(long)]
		secrets: PathBuf,
		/// Host MAC address; empty for shared secrets
		#[arg(long)]
		host: String,
		#[arg(long)]
		id: String,
		/// Field of a structured secret (e.g. public_key)
		#[arg(long)]
		field: Option<String>,
	},
	/// Write a resolved file to stdout
	Files {
		/// Host catalog (YAML or JSON)
		#[arg(long)]
		config: PathBuf,
		/// Secret store file
		#[arg(long)]
		secrets: PathBuf,
		/// Host MAC address
		#[arg(long)]
		host: String,
		/// File id as declared under the host
		#[arg(long)]
		id: String,
	},
}

impl Args {
	fn overrides(&self) -> SettingsLayer {
		let mut layer = SettingsLayer {
			logging: Some(LoggingSettingsLayer {
				level: self.log_level.clone(),
				format: self.json_logs.then_some(LogFormat::Json),
			}),
			..SettingsLayer::default()
		};
		if let Command::Boot {
			listen, base_url, ..
		} = &self.command
		{
			layer.http = Some(HttpSettingsLayer {
				host: listen.as_ref().map(|(host, _)| host.clone()),
				port: listen.as_ref().map(|(_, port)| *port),
				base_url: base_url.clone(),
			});
		}
		layer
	}
}

fn parse_listen(value: &str) -> Result<(String, u16), String> {
	let (host, port) = value
		.rsplit_once(':')
		.ok_or_else(|| format!("expected HOST:PORT, got '{value}'"))?;
	let port = port.parse().map_err(|e| format!("invalid port '{port}': {e}"))?;
	let host = host.trim_start_matches('[').trim_end_matches(']');
	if host.is_empty() {
		return Err(format!("missing host in '{value}'"));
	}
	Ok((host.to_string(), port))
}

fn init_tracing(logging: &LoggingSettings) -> Result<()> {
	let filter = match EnvFilter::try_from_default_env() {
		Ok(filter) => filter,
		Err(_) => EnvFilter::try_new(&logging.level)
			.with_context(|| format!("invalid log level '{}'", logging.level))?,
	};

	// stdout carries `files` output.
	match logging.format {
		LogFormat::Json => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().json().with_writer(io::stderr))
				.init();
		}
		LogFormat::Compact => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().compact().with_writer(io::stderr))
				.init();
		}
		LogFormat::Pretty => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().pretty().with_writer(io::stderr))
				.init();
		}
	}
	Ok(())
}

/// Settings are resolved before the subscriber exists, so they are logged here.
fn log_settings(settings: &ServerSettings) {
	info!(
		listen = %settings.socket_addr(),
		base_url = %settings.http.base_url,
		temp_dir = %settings.files.temp_dir.display(),
		qemu_img = %settings.files.qemu_img,
		convert_timeout_secs = settings.files.convert_timeout_secs,
		log_level = %settings.logging.level,
		"settings loaded"
	);
}

async fn run_boot(settings: ServerSettings, config: PathBuf, secrets: PathBuf) -> Result<()> {
	let files = settings.files.clone();
	let provisioner = tokio::task::spawn_blocking(move || Provisioner::open(&config, &secrets, files))
		.await
		.context("provisioner setup task failed")?
		.context("failed to load provisioner")?;

	if settings.http.base_url.contains("://0.0.0.0") {
		warn!(
			base_url = %settings.http.base_url,
			"base URL is not routable from clients; pass --base-url"
		);
	}

	info!(
		listen = %settings.socket_addr(),
		base_url = %settings.http.base_url,
		"starting pxeserver"
	);
	let state = AppState::new(Arc::new(provisioner), settings.http.base_url.clone());
	pxe_server::serve(state, &settings.socket_addr())
		.await
		.context("boot API failed")
}

fn run_secrets(path: &Path, host: &str, id: &str, field: Option<&str>) -> Result<String> {
	let store = LocalSecretStore::load(path, HashMap::new())
		.with_context(|| format!("failed to open secret store {}", path.display()))?;
	let host = normalize_mac(host);
	let value = match field {
		Some(field) => store.get_field(&host, id, field),
		None => store.get(&host, id),
	}?;
	format_value(&value)
}

/// Strings print raw; anything else as YAML.
fn format_value(value: &serde_json::Value) -> Result<String> {
	match value {
		serde_json::Value::String(s) => Ok(format!("{s}\n")),
		other => serde_yaml::to_string(other).context("failed to format secret"),
	}
}

fn run_files(settings: ServerSettings, config: &Path, secrets: &Path, host: &str, id: &str) -> Result<()> {
	let provisioner =
		Provisioner::open(config, secrets, settings.files).context("failed to load provisioner")?;
	let id = namespaced_id(&normalize_mac(host), id);
	let mut artifact = provisioner
		.read_boot_file(&id)
		.with_context(|| format!("failed to resolve file '{id}'"))?;

	let mut stdout = io::stdout().lock();
	io::copy(&mut artifact, &mut stdout).context("failed to write file to stdout")?;
	stdout.flush().context("failed to flush stdout")?;
	Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();
	let settings =
		load_settings(args.settings.as_deref(), args.overrides()).context("failed to load settings")?;
	init_tracing(&settings.logging)?;
	log_settings(&settings);

	match args.command {
		Command::Boot {
			config, secrets, ..
		} => run_boot(settings, config, secrets).await,
		Command::Secrets {
			secrets,
			host,
			id,
			field,
		} => {
			let output = run_secrets(&secrets, &host, &id, field.as_deref())?;
			io::stdout()
				.write_all(output.as_bytes())
				.context("failed to write to stdout")
		}
		// Remote sources use a blocking HTTP client, which must stay off the
		// async runtime.
		Command::Files {
			config,
			secrets,
			host,
			id,
		} => tokio::task::spawn_blocking(move || run_files(settings, &config, &secrets, &host, &id))
			.await
			.context("file task failed")?,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;
	use serde_json::json;
	use std::sync::Mutex;
	use tempfile::TempDir;

	#[derive(Clone, Default)]
	struct Captured(Arc<Mutex<Vec<u8>>>);

	impl Write for Captured {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			self.0.lock().unwrap().extend_from_slice(buf);
			Ok(buf.len())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	impl<'a> fmt::MakeWriter<'a> for Captured {
		type Writer = Captured;

		fn make_writer(&'a self) -> Self::Writer {
			self.clone()
		}
	}

	#[test]
	fn cli_definition_is_valid() {
		Args::command().debug_assert();
	}

	#[test]
	fn resolved_settings_reach_installed_subscriber() {
		let captured = Captured::default();
		let subscriber = tracing_subscriber::registry()
			.with(fmt::layer().with_ansi(false).with_writer(captured.clone()));
		let mut settings = ServerSettings::default();
		settings.http.base_url = "http://boot.lan:8080".to_string();

		tracing::subscriber::with_default(subscriber, || log_settings(&settings));

		let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
		assert!(output.contains("settings loaded"));
		assert!(output.contains("base_url=http://boot.lan:8080"));
		assert!(output.contains(&format!("listen={}", settings.socket_addr())));
	}

	#[test]
	fn listen_parses_host_and_port() {
		assert_eq!(parse_listen("10.0.0.1:8080"), Ok(("10.0.0.1".to_string(), 8080)));
		assert_eq!(parse_listen("[::1]:69"), Ok(("::1".to_string(), 69)));
		assert!(parse_listen("10.0.0.1").is_err());
		assert!(parse_listen(":80").is_err());
		assert!(parse_listen("host:http").is_err());
	}

	#[test]
	fn boot_flags_become_overrides() {
		let args = Args::parse_from([
			"pxeserver",
			"--json-logs",
			"boot",
			"--config",
			"hosts.yaml",
			"--secrets",
			"secrets.yaml",
			"--listen",
			"127.0.0.1:9000",
			"--base-url",
			"http://boot.lan:9000",
		]);
		let layer = args.overrides();
		let http = layer.http.unwrap();
		assert_eq!(http.host.as_deref(), Some("127.0.0.1"));
		assert_eq!(http.port, Some(9000));
		assert_eq!(http.base_url.as_deref(), Some("http://boot.lan:9000"));
		assert_eq!(layer.logging.unwrap().format, Some(LogFormat::Json));
	}

	#[test]
	fn secrets_subcommand_leaves_http_alone() {
		let args = Args::parse_from([
			"pxeserver",
			"secrets",
			"--secrets",
			"s.yaml",
			"--host",
			"aa",
			"--id",
			"root",
			"--log-level",
			"debug",
		]);
		let layer = args.overrides();
		assert!(layer.http.is_none());
		assert_eq!(layer.logging.unwrap().level.as_deref(), Some("debug"));
	}

	#[test]
	fn strings_print_raw_and_mappings_as_yaml() {
		assert_eq!(format_value(&json!("hunter2")).unwrap(), "hunter2\n");
		let yaml = format_value(&json!({"public_key": "ssh-rsa AAAA"})).unwrap();
		assert_eq!(yaml, "public_key: ssh-rsa AAAA\n");
	}

	#[test]
	fn secrets_reads_stored_value_by_uppercase_mac() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("secrets.yaml");
		std::fs::write(
			&path,
			"hosts:\n  - mac: \"aa:bb:cc:dd:ee:ff\"\n    secrets:\n      - id: root\n        value: hunter2\n      - id: key\n        value:\n          public_key: ssh-rsa AAAA\n",
		)
		.unwrap();

		assert_eq!(
			run_secrets(&path, "AA:BB:CC:DD:EE:FF", "root", None).unwrap(),
			"hunter2\n"
		);
		assert_eq!(
			run_secrets(&path, "aa:bb:cc:dd:ee:ff", "key", Some("public_key")).unwrap(),
			"ssh-rsa AAAA\n"
		);
		let err = run_secrets(&path, "aa:bb:cc:dd:ee:ff", "missing", None).unwrap_err();
		assert!(err.to_string().contains("missing"));
	}

	#[test]
	fn files_resolves_namespaced_id() {
		let dir = TempDir::new().unwrap();
		std::fs::write(dir.path().join("motd"), "hello\n").unwrap();
		let config = dir.path().join("hosts.yaml");
		std::fs::write(
			&config,
			format!(
				"hosts:\n  - mac: \"aa:bb:cc:dd:ee:ff\"\n    kernel:\n      path: \"{0}/motd\"\n    files:\n      - id: motd\n        path: \"{0}/motd\"\n",
				dir.path().display()
			),
		)
		.unwrap();

		let settings = ServerSettings::default();
		let secrets = dir.path().join("secrets.yaml");
		run_files(settings.clone(), &config, &secrets, "AA:BB:CC:DD:EE:FF", "motd").unwrap();
		let err = run_files(settings, &config, &secrets, "aa:bb:cc:dd:ee:ff", "nope").unwrap_err();
		assert!(format!("{err:#}").contains("aa:bb:cc:dd:ee:ff-nope"));
	}
}
