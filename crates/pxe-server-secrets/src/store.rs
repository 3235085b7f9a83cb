// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! File-backed secret store.
//!
//! State is a map of host key to secret id to value, held behind one mutex.
//! Every generation pass writes the whole store to a sibling temp file and
//! renames it over the backing file before the new values become visible.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use pxe_server_config::{normalize_mac, SecretDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::error::{SecretsError, SecretsResult};
use crate::generate::generate;

/// Lookup and on-demand generation of per-host secrets.
pub trait Secrets: Send + Sync {
	/// Existing value for `(host, id)`. Never generates.
	fn get(&self, host: &str, id: &str) -> SecretsResult<Value>;

	/// Existing value, or generate every missing secret defined for `host`
	/// and return the requested one.
	fn get_or_generate(&self, host: &str, id: &str) -> SecretsResult<Value>;

	/// One field of a mapping-valued secret.
	fn get_field(&self, host: &str, id: &str, field: &str) -> SecretsResult<Value> {
		let value = self.get(host, id)?;
		value
			.as_object()
			.and_then(|map| map.get(field))
			.cloned()
			.ok_or_else(|| SecretsError::FieldNotFound {
				host: host.to_string(),
				id: id.to_string(),
				field: field.to_string(),
			})
	}
}

type SecretState = BTreeMap<String, BTreeMap<String, Value>>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct SecretsDocument {
	#[serde(default)]
	hosts: Vec<HostSecrets>,
}

#[derive(Debug, Serialize, Deserialize)]
struct HostSecrets {
	mac: String,
	#[serde(default)]
	secrets: Vec<SecretRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SecretRecord {
	id: String,
	value: Value,
}

impl SecretsDocument {
	/// Host keys are normalized like catalog MACs. When two spellings of one
	/// MAC collide, the first record for an id is kept.
	fn into_state(self) -> SecretState {
		let mut state = SecretState::new();
		for host in self.hosts {
			let entry = state.entry(normalize_mac(&host.mac)).or_default();
			for record in host.secrets {
				entry.entry(record.id).or_insert(record.value);
			}
		}
		state
	}

	fn from_state(state: &SecretState) -> Self {
		Self {
			hosts: state
				.iter()
				.map(|(mac, secrets)| HostSecrets {
					mac: mac.clone(),
					secrets: secrets
						.iter()
						.map(|(id, value)| SecretRecord {
							id: id.clone(),
							value: value.clone(),
						})
						.collect(),
				})
				.collect(),
		}
	}
}

/// Secret store persisted to a local YAML file.
pub struct LocalSecretStore {
	path: PathBuf,
	definitions: HashMap<String, Vec<SecretDefinition>>,
	state: Mutex<SecretState>,
}

impl LocalSecretStore {
	/// Open the store at `path`. A missing or empty file is an empty store.
	#[instrument(skip(path, definitions), fields(path = %path.as_ref().display()))]
	pub fn load(
		path: impl AsRef<Path>,
		definitions: HashMap<String, Vec<SecretDefinition>>,
	) -> SecretsResult<Self> {
		let path = path.as_ref().to_path_buf();
		let state = read_state(&path)?;
		let definitions = definitions
			.into_iter()
			.map(|(host, defs)| (normalize_mac(&host), defs))
			.collect::<HashMap<_, _>>();
		debug!(
			hosts = state.len(),
			defined_hosts = definitions.len(),
			"secret store loaded"
		);
		Ok(Self {
			path,
			definitions,
			state: Mutex::new(state),
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn lock(&self) -> MutexGuard<'_, SecretState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn save(&self, state: &SecretState) -> SecretsResult<()> {
		let write_error = |source| SecretsError::Write {
			path: self.path.clone(),
			source,
		};

		let yaml = serde_yaml::to_string(&SecretsDocument::from_state(state))
			.map_err(SecretsError::Serialize)?;

		let dir = match self.path.parent() {
			Some(parent) if !parent.as_os_str().is_empty() => parent,
			_ => Path::new("."),
		};
		// NamedTempFile is created with mode 0600.
		let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;
		tmp.write_all(yaml.as_bytes()).map_err(write_error)?;
		tmp.as_file().sync_all().map_err(write_error)?;
		tmp.persist(&self.path).map_err(|e| write_error(e.error))?;

		debug!(path = %self.path.display(), "secret store saved");
		Ok(())
	}
}

fn lookup(state: &SecretState, host: &str, id: &str) -> SecretsResult<Value> {
	let secrets = state
		.get(host)
		.ok_or_else(|| SecretsError::HostNotFound(host.to_string()))?;
	secrets
		.get(id)
		.cloned()
		.ok_or_else(|| SecretsError::SecretNotFound {
			host: host.to_string(),
			id: id.to_string(),
		})
}

fn read_state(path: &Path) -> SecretsResult<SecretState> {
	let content = match std::fs::read_to_string(path) {
		Ok(content) => content,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
			debug!(path = %path.display(), "secrets file not found, starting empty");
			return Ok(SecretState::new());
		}
		Err(source) => {
			return Err(SecretsError::Read {
				path: path.to_path_buf(),
				source,
			})
		}
	};
	if content.trim().is_empty() {
		return Ok(SecretState::new());
	}
	let document: SecretsDocument =
		serde_yaml::from_str(&content).map_err(|source| SecretsError::Parse {
			path: path.to_path_buf(),
			source,
		})?;
	Ok(document.into_state())
}

impl Secrets for LocalSecretStore {
	fn get(&self, host: &str, id: &str) -> SecretsResult<Value> {
		lookup(&self.lock(), &normalize_mac(host), id)
	}

	#[instrument(skip(self), fields(path = %self.path.display()))]
	fn get_or_generate(&self, host: &str, id: &str) -> SecretsResult<Value> {
		let host = normalize_mac(host);
		let host = host.as_str();
		if let Ok(value) = self.get(host, id) {
			return Ok(value);
		}

		let mut state = self.lock();
		let definitions = self
			.definitions
			.get(host)
			.ok_or_else(|| SecretsError::NoDefinitions(host.to_string()))?;

		let existing = state.get(host);
		let missing: Vec<&SecretDefinition> = definitions
			.iter()
			.filter(|d| existing.map_or(true, |secrets| !secrets.contains_key(&d.id)))
			.collect();

		if !missing.is_empty() {
			let mut generated = BTreeMap::new();
			for definition in &missing {
				debug!(secret = %definition.id, kind = definition.kind.as_str(), "generating secret");
				generated.insert(definition.id.clone(), generate(definition)?);
			}

			let mut next = state.clone();
			next.entry(host.to_string()).or_default().extend(generated);
			self.save(&next)?;
			*state = next;

			let ids: Vec<&str> = missing.iter().map(|d| d.id.as_str()).collect();
			info!(host, ids = ?ids, "generated secrets");
		}

		lookup(&state, host, id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::generate::PASSWORD_ALPHABET;
	use pxe_server_config::SecretKind;
	use regex::Regex;
	use std::sync::Arc;
	use tempfile::TempDir;

	const HOST: &str = "52:54:00:12:34:56";

	fn defs(host: &str, definitions: Vec<SecretDefinition>) -> HashMap<String, Vec<SecretDefinition>> {
		HashMap::from([(host.to_string(), definitions)])
	}

	fn store_with(dir: &TempDir, definitions: HashMap<String, Vec<SecretDefinition>>) -> LocalSecretStore {
		LocalSecretStore::load(dir.path().join("secrets.yaml"), definitions).unwrap()
	}

	#[test]
	fn password_is_generated_once() {
		let dir = TempDir::new().unwrap();
		let store = store_with(
			&dir,
			defs(HOST, vec![SecretDefinition::new("root-password", SecretKind::Password)]),
		);

		let first = store.get_or_generate(HOST, "root-password").unwrap();
		let password = first.as_str().unwrap();
		assert_eq!(password.len(), 20);
		assert!(password.bytes().all(|b| PASSWORD_ALPHABET.contains(&b)));

		let second = store.get_or_generate(HOST, "root-password").unwrap();
		assert_eq!(first, second);
		assert_eq!(store.get(HOST, "root-password").unwrap(), first);
	}

	#[test]
	fn configured_length_is_honoured() {
		let dir = TempDir::new().unwrap();
		let store = store_with(
			&dir,
			defs(
				HOST,
				vec![SecretDefinition::new("token", SecretKind::Password).with_opt("length", 64)],
			),
		);
		let value = store.get_or_generate(HOST, "token").unwrap();
		assert_eq!(value.as_str().unwrap().len(), 64);
	}

	#[test]
	fn hosts_get_distinct_passwords() {
		let dir = TempDir::new().unwrap();
		let hosts: Vec<String> = (0..10).map(|i| format!("52:54:00:00:00:{i:02x}")).collect();
		let definitions = hosts
			.iter()
			.map(|h| (h.clone(), vec![SecretDefinition::new("root-password", SecretKind::Password)]))
			.collect();
		let store = store_with(&dir, definitions);

		let mut seen = std::collections::HashSet::new();
		for host in &hosts {
			let value = store.get_or_generate(host, "root-password").unwrap();
			assert!(seen.insert(value.as_str().unwrap().to_string()));
		}
	}

	#[test]
	fn secrets_survive_reload_without_definitions() {
		let dir = TempDir::new().unwrap();
		let store = store_with(
			&dir,
			defs(HOST, vec![SecretDefinition::new("root-password", SecretKind::Password)]),
		);
		let generated = store.get_or_generate(HOST, "root-password").unwrap();
		drop(store);

		let reloaded = store_with(&dir, HashMap::new());
		assert_eq!(reloaded.get(HOST, "root-password").unwrap(), generated);
		assert_eq!(reloaded.get_or_generate(HOST, "root-password").unwrap(), generated);
	}

	#[test]
	fn ssh_key_fields() {
		let dir = TempDir::new().unwrap();
		let store = store_with(
			&dir,
			defs(
				HOST,
				vec![SecretDefinition::new("ssh-host-key", SecretKind::SshKey)
					.with_opt("bits", 2048)
					.with_opt("comment", "root@node1")],
			),
		);
		store.get_or_generate(HOST, "ssh-host-key").unwrap();

		let private_key = store.get_field(HOST, "ssh-host-key", "private_key").unwrap();
		assert!(private_key.as_str().unwrap().contains("BEGIN RSA PRIVATE KEY"));

		let public_key = store.get_field(HOST, "ssh-host-key", "public_key").unwrap();
		let re = Regex::new(r"^ssh-rsa [A-Za-z0-9+/=]+ root@node1$").unwrap();
		assert!(re.is_match(public_key.as_str().unwrap()));

		let err = store.get_field(HOST, "ssh-host-key", "fingerprint").unwrap_err();
		assert!(err.to_string().contains("fingerprint"));
	}

	#[test]
	fn get_field_on_scalar_fails() {
		let dir = TempDir::new().unwrap();
		let store = store_with(
			&dir,
			defs(HOST, vec![SecretDefinition::new("root-password", SecretKind::Password)]),
		);
		store.get_or_generate(HOST, "root-password").unwrap();
		let err = store.get_field(HOST, "root-password", "public_key").unwrap_err();
		assert!(matches!(err, SecretsError::FieldNotFound { .. }));
	}

	#[test]
	fn missing_siblings_are_generated_together() {
		let dir = TempDir::new().unwrap();
		let store = store_with(
			&dir,
			defs(
				HOST,
				vec![
					SecretDefinition::new("root-password", SecretKind::Password),
					SecretDefinition::new("admin-password", SecretKind::Password),
				],
			),
		);

		store.get_or_generate(HOST, "root-password").unwrap();
		let sibling = store.get(HOST, "admin-password").unwrap();

		let on_disk = std::fs::read_to_string(store.path()).unwrap();
		assert!(on_disk.contains("admin-password"));
		assert!(on_disk.contains("root-password"));
		assert_eq!(store.get_or_generate(HOST, "admin-password").unwrap(), sibling);
	}

	#[test]
	fn existing_records_are_left_alone() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("secrets.yaml");
		std::fs::write(
			&path,
			format!("hosts:\n- mac: \"{HOST}\"\n  secrets:\n  - id: root-password\n    value: hunter2\n"),
		)
		.unwrap();

		let store = LocalSecretStore::load(
			&path,
			defs(
				HOST,
				vec![
					SecretDefinition::new("root-password", SecretKind::Password),
					SecretDefinition::new("admin-password", SecretKind::Password),
				],
			),
		)
		.unwrap();

		store.get_or_generate(HOST, "admin-password").unwrap();
		assert_eq!(store.get(HOST, "root-password").unwrap(), Value::from("hunter2"));

		let reloaded = LocalSecretStore::load(&path, HashMap::new()).unwrap();
		assert_eq!(reloaded.get(HOST, "root-password").unwrap(), Value::from("hunter2"));
	}

	#[test]
	fn shared_namespace_is_separate() {
		let dir = TempDir::new().unwrap();
		let mut definitions = defs(HOST, vec![SecretDefinition::new("token", SecretKind::Password)]);
		definitions.insert(String::new(), vec![SecretDefinition::new("token", SecretKind::Password)]);
		let store = store_with(&dir, definitions);

		let host_value = store.get_or_generate(HOST, "token").unwrap();
		let shared_value = store.get_or_generate("", "token").unwrap();
		assert_ne!(host_value, shared_value);
	}

	#[test]
	fn lookups_name_what_is_missing() {
		let dir = TempDir::new().unwrap();
		let store = store_with(
			&dir,
			defs(HOST, vec![SecretDefinition::new("root-password", SecretKind::Password)]),
		);

		let err = store.get("aa:bb:cc:dd:ee:ff", "root-password").unwrap_err();
		assert!(err.to_string().contains("aa:bb:cc:dd:ee:ff"));

		store.get_or_generate(HOST, "root-password").unwrap();
		let err = store.get(HOST, "other").unwrap_err();
		assert!(err.to_string().contains("other"));
		assert!(err.is_not_found());

		let err = store.get_or_generate("aa:bb:cc:dd:ee:ff", "x").unwrap_err();
		assert!(matches!(err, SecretsError::NoDefinitions(ref h) if h == "aa:bb:cc:dd:ee:ff"));
	}

	#[test]
	fn undefined_id_for_known_host_fails_after_generation() {
		let dir = TempDir::new().unwrap();
		let store = store_with(
			&dir,
			defs(HOST, vec![SecretDefinition::new("root-password", SecretKind::Password)]),
		);
		let err = store.get_or_generate(HOST, "not-declared").unwrap_err();
		assert!(err.to_string().contains("not-declared"));
		assert!(store.get(HOST, "root-password").is_ok());
	}

	#[test]
	fn failed_generation_persists_nothing() {
		let dir = TempDir::new().unwrap();
		let store = store_with(
			&dir,
			defs(
				HOST,
				vec![
					SecretDefinition::new("ok", SecretKind::Password),
					SecretDefinition::new("bad", SecretKind::Password).with_opt("length", "long"),
				],
			),
		);
		let err = store.get_or_generate(HOST, "ok").unwrap_err();
		assert!(matches!(err, SecretsError::InvalidOption { .. }));
		assert!(store.get(HOST, "ok").is_err());
		assert!(!store.path().exists());
	}

	#[test]
	fn empty_file_is_empty_store() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("secrets.yaml");
		std::fs::write(&path, "").unwrap();
		let store = LocalSecretStore::load(&path, HashMap::new()).unwrap();
		assert!(store.get(HOST, "x").is_err());
	}

	#[test]
	fn malformed_file_names_path() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("secrets.yaml");
		std::fs::write(&path, "hosts: [unclosed").unwrap();
		let err = LocalSecretStore::load(&path, HashMap::new()).err().unwrap();
		assert!(matches!(err, SecretsError::Parse { .. }));
		assert!(err.to_string().contains("secrets.yaml"));
	}

	#[test]
	fn uppercase_stored_mac_is_not_regenerated() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("secrets.yaml");
		std::fs::write(
			&path,
			"hosts:\n  - mac: \"AA:BB:CC:DD:EE:FF\"\n    secrets:\n      - id: root\n        value: hunter2\n  - mac: \"aa:bb:cc:dd:ee:ff\"\n    secrets:\n      - id: root\n        value: shadowed\n",
		)
		.unwrap();
		let store = LocalSecretStore::load(
			&path,
			defs(
				"aa:bb:cc:dd:ee:ff",
				vec![
					SecretDefinition::new("root", SecretKind::Password),
					SecretDefinition::new("admin", SecretKind::Password),
				],
			),
		)
		.unwrap();

		assert_eq!(store.get_or_generate("aa:bb:cc:dd:ee:ff", "root").unwrap(), "hunter2");
		assert_eq!(store.get("AA:BB:CC:DD:EE:FF", "root").unwrap(), "hunter2");

		// Generating a sibling rewrites the file with one merged host record.
		store.get_or_generate("aa:bb:cc:dd:ee:ff", "admin").unwrap();
		let saved = std::fs::read_to_string(&path).unwrap();
		assert_eq!(saved.matches("mac:").count(), 1);
		assert!(saved.contains("aa:bb:cc:dd:ee:ff"));
		assert!(saved.contains("hunter2"));
		assert!(!saved.contains("shadowed"));
	}

	#[cfg(unix)]
	#[test]
	fn saved_file_is_private() {
		use std::os::unix::fs::PermissionsExt;

		let dir = TempDir::new().unwrap();
		let store = store_with(
			&dir,
			defs(HOST, vec![SecretDefinition::new("root-password", SecretKind::Password)]),
		);
		store.get_or_generate(HOST, "root-password").unwrap();
		let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
		assert_eq!(mode & 0o777, 0o600);
	}

	#[test]
	fn concurrent_requests_see_one_value() {
		let dir = TempDir::new().unwrap();
		let store = Arc::new(store_with(
			&dir,
			defs(HOST, vec![SecretDefinition::new("root-password", SecretKind::Password)]),
		));

		let values: Vec<Value> = std::thread::scope(|scope| {
			let handles: Vec<_> = (0..8)
				.map(|_| {
					let store = Arc::clone(&store);
					scope.spawn(move || store.get_or_generate(HOST, "root-password").unwrap())
				})
				.collect();
			handles.into_iter().map(|h| h.join().unwrap()).collect()
		});

		assert!(values.windows(2).all(|w| w[0] == w[1]));
	}
}
