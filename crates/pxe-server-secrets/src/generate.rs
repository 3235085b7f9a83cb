// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret value generators.
//!
//! - `password`: random characters from [`PASSWORD_ALPHABET`]
//! - `ssh_key`: RSA keypair as `{public_key, private_key}`

use pxe_server_config::{SecretDefinition, SecretKind, Vars};
use rand::rngs::OsRng;
use rand::Rng;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use ssh_key::private::RsaKeypair;
use ssh_key::public::KeyData;
use ssh_key::PublicKey;
use zeroize::Zeroizing;

use crate::error::{SecretsError, SecretsResult};

/// Characters a generated password is drawn from.
pub const PASSWORD_ALPHABET: &[u8] =
	b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 !\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

pub const DEFAULT_PASSWORD_LENGTH: usize = 20;
pub const DEFAULT_RSA_BITS: usize = 4096;

const MIN_RSA_BITS: usize = 1024;
const MAX_RSA_BITS: usize = 16384;

/// Generate a fresh value for `definition`.
pub fn generate(definition: &SecretDefinition) -> SecretsResult<Value> {
	match definition.kind {
		SecretKind::Password => {
			let length = usize_opt(definition, "length")?.unwrap_or(DEFAULT_PASSWORD_LENGTH);
			if length == 0 {
				return Err(invalid(definition, "length", "must be greater than zero".to_string()));
			}
			Ok(Value::String(generate_password(length).to_string()))
		}
		SecretKind::SshKey => {
			let bits = usize_opt(definition, "bits")?.unwrap_or(DEFAULT_RSA_BITS);
			if !(MIN_RSA_BITS..=MAX_RSA_BITS).contains(&bits) {
				return Err(invalid(
					definition,
					"bits",
					format!("must be between {MIN_RSA_BITS} and {MAX_RSA_BITS}, got {bits}"),
				));
			}
			let comment = str_opt(definition, "comment")?;
			generate_ssh_key(&definition.id, bits, comment)
		}
	}
}

/// Random password of `length` characters; one bounded draw from the OS
/// CSPRNG per character.
pub fn generate_password(length: usize) -> Zeroizing<String> {
	let mut rng = OsRng;
	let mut password = Zeroizing::new(String::with_capacity(length));
	for _ in 0..length {
		let index = rng.gen_range(0..PASSWORD_ALPHABET.len());
		password.push(char::from(PASSWORD_ALPHABET[index]));
	}
	password
}

fn generate_ssh_key(id: &str, bits: usize, comment: Option<&str>) -> SecretsResult<Value> {
	let key_error = |message: String| SecretsError::KeyGeneration {
		id: id.to_string(),
		message,
	};

	let private_key = RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| key_error(e.to_string()))?;
	let private_pem = private_key
		.to_pkcs1_pem(LineEnding::LF)
		.map_err(|e| key_error(e.to_string()))?;
	let public_key = authorized_key(&private_key, comment).map_err(|e| key_error(e.to_string()))?;

	Ok(json!({
		"public_key": public_key,
		"private_key": private_pem.as_str(),
	}))
}

/// OpenSSH authorized-keys line for the public half of `key`.
pub fn authorized_key(key: &RsaPrivateKey, comment: Option<&str>) -> ssh_key::Result<String> {
	let keypair = RsaKeypair::try_from(key)?;
	let mut line = PublicKey::from(KeyData::Rsa(keypair.public)).to_openssh()?;
	if let Some(comment) = comment.filter(|c| !c.is_empty()) {
		line.push(' ');
		line.push_str(comment);
	}
	Ok(line)
}

fn opt<'a>(opts: &'a Vars, key: &str) -> Option<&'a Value> {
	opts.get(key).filter(|v| !v.is_null())
}

fn usize_opt(definition: &SecretDefinition, key: &str) -> SecretsResult<Option<usize>> {
	match opt(&definition.opts, key) {
		None => Ok(None),
		Some(value) => value
			.as_u64()
			.and_then(|n| usize::try_from(n).ok())
			.map(Some)
			.ok_or_else(|| invalid(definition, key, format!("expected a non-negative integer, got {value}"))),
	}
}

fn str_opt<'a>(definition: &'a SecretDefinition, key: &str) -> SecretsResult<Option<&'a str>> {
	match opt(&definition.opts, key) {
		None => Ok(None),
		Some(value) => value
			.as_str()
			.map(Some)
			.ok_or_else(|| invalid(definition, key, format!("expected a string, got {value}"))),
	}
}

fn invalid(definition: &SecretDefinition, option: &str, message: String) -> SecretsError {
	SecretsError::InvalidOption {
		id: definition.id.clone(),
		option: option.to_string(),
		message,
	}
}
