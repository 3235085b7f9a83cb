// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use minijinja::{AutoEscape, Environment, Error, ErrorKind, UndefinedBehavior, Value};
use pxe_server_config::{namespaced_id, Vars, SHARED_HOST};
use pxe_server_secrets::Secrets;
use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

use crate::context::{MissTracker, TrackedMap};
use crate::error::{BoxError, FunctionError, TemplateError, TemplateResult};

/// Path prefix marking an embedded asset.
pub const BUILTIN_PREFIX: &str = "__builtin__/";

/// Value of the file helpers when rendering file contents.
pub const NO_VALUE: &str = "<no value>";

/// Digest lookup for cmdline templates, keyed by global file id.
pub trait FileDigests: Send + Sync {
	fn sha256(&self, id: &str) -> Result<String, BoxError>;
	fn md5(&self, id: &str) -> Result<String, BoxError>;
}

/// Maps a global file id to the URL a booting machine fetches it from.
pub type UrlBuilder = Arc<dyn Fn(&str) -> String + Send + Sync>;

enum Surface {
	File,
	Cmdline {
		urls: UrlBuilder,
		digests: Arc<dyn FileDigests>,
	},
	Path,
}

/// Expands templates for the three render surfaces.
#[derive(Clone, Default)]
pub struct Renderer {
	secrets: Option<Arc<dyn Secrets>>,
}

impl Renderer {
	pub fn new(secrets: Arc<dyn Secrets>) -> Self {
		Self {
			secrets: Some(secrets),
		}
	}

	/// Renderer whose `secret` functions always fail.
	pub fn without_secrets() -> Self {
		Self::default()
	}

	/// Render file contents. File helpers yield `<no value>`.
	#[instrument(skip(self, template, vars), fields(len = template.len()))]
	pub fn render_file(&self, host: &str, template: &str, vars: &Vars) -> TemplateResult<String> {
		self.render(host, template, vars, Surface::File)
	}

	/// Render a kernel command line with live file helpers.
	#[instrument(skip(self, template, vars, urls, digests))]
	pub fn render_cmdline(
		&self,
		host: &str,
		template: &str,
		vars: &Vars,
		urls: UrlBuilder,
		digests: Arc<dyn FileDigests>,
	) -> TemplateResult<String> {
		self.render(host, template, vars, Surface::Cmdline { urls, digests })
	}

	/// Render a file path or URL. Only `builtin()` is available.
	pub fn render_path(&self, template: &str) -> TemplateResult<String> {
		self.render(SHARED_HOST, template, &Vars::new(), Surface::Path)
	}

	fn render(&self, host: &str, template: &str, vars: &Vars, surface: Surface) -> TemplateResult<String> {
		let env = self.environment(host, surface);
		let misses = MissTracker::default();

		let vars = expand_map(&env, vars, &misses)?;
		let rendered = env
			.render_str(template, TrackedMap::root(vars, misses.clone()))
			.map_err(|e| classify(e, &misses, template))?;

		debug!(host, template_len = template.len(), rendered_len = rendered.len(), "rendered template");
		Ok(rendered)
	}

	fn environment(&self, host: &str, surface: Surface) -> Environment<'static> {
		let mut env = Environment::new();
		env.set_undefined_behavior(UndefinedBehavior::Strict);
		env.set_keep_trailing_newline(true);
		env.set_auto_escape_callback(|_| AutoEscape::None);

		match surface {
			Surface::Path => {
				env.add_function("builtin", |path: String| format!("{BUILTIN_PREFIX}{path}"));
				return env;
			}
			Surface::File => {
				for name in ["file_url", "file_sha256", "file_md5"] {
					env.add_function(name, |_id: String| NO_VALUE.to_string());
				}
			}
			Surface::Cmdline { urls, digests } => {
				let file_host = host.to_string();
				env.add_function("file_url", move |id: String| urls(&namespaced_id(&file_host, &id)));

				let file_host = host.to_string();
				let sha256 = Arc::clone(&digests);
				env.add_function("file_sha256", move |id: String| -> Result<String, Error> {
					sha256
						.sha256(&namespaced_id(&file_host, &id))
						.map_err(|e| function_error("file_sha256", id, e))
				});

				let file_host = host.to_string();
				env.add_function("file_md5", move |id: String| -> Result<String, Error> {
					digests
						.md5(&namespaced_id(&file_host, &id))
						.map_err(|e| function_error("file_md5", id, e))
				});
			}
		}

		let secrets = self.secrets.clone();
		let secret_host = host.to_string();
		env.add_function("secret", move |id: String| {
			lookup_secret(secrets.as_deref(), "secret", &secret_host, id)
		});

		let secrets = self.secrets.clone();
		env.add_function("shared_secret", move |id: String| {
			lookup_secret(secrets.as_deref(), "shared_secret", SHARED_HOST, id)
		});

		env
	}
}

fn lookup_secret(
	secrets: Option<&dyn Secrets>,
	function: &'static str,
	host: &str,
	id: String,
) -> Result<Value, Error> {
	let Some(secrets) = secrets else {
		return Err(Error::new(
			ErrorKind::InvalidOperation,
			format!("{function}(\"{id}\"): no secret store configured"),
		));
	};
	secrets
		.get_or_generate(host, &id)
		.map(|value| Value::from_serialize(&value))
		.map_err(|e| function_error(function, id, Box::new(e)))
}

fn function_error(function: &'static str, argument: String, source: BoxError) -> Error {
	let failure = FunctionError {
		function,
		argument,
		source,
	};
	Error::new(ErrorKind::InvalidOperation, failure.to_string()).with_source(failure)
}

/// Undefined errors are named by the tracked lookup, else by the source span
/// minijinja reports.
fn classify(err: Error, misses: &MissTracker, source: &str) -> TemplateError {
	match err.kind() {
		ErrorKind::UndefinedError => {
			let name = misses
				.take()
				.or_else(|| {
					err.range()
						.and_then(|range| source.get(range))
						.map(|span| span.trim().to_string())
						.filter(|span| !span.is_empty())
				})
				.unwrap_or_else(|| "<unknown>".to_string());
			TemplateError::MissingVariable { name, source: err }
		}
		ErrorKind::SyntaxError => TemplateError::Syntax(err),
		_ => TemplateError::Render(err),
	}
}

fn has_markup(text: &str) -> bool {
	text.contains("{{") || text.contains("{%") || text.contains("{#")
}

/// Each string is rendered as its own template with an empty `vars`.
fn expand_string(env: &Environment<'_>, text: &str, misses: &MissTracker) -> TemplateResult<String> {
	if !has_markup(text) {
		return Ok(text.to_string());
	}
	env.render_str(text, TrackedMap::root(Vars::new(), misses.clone()))
		.map_err(|e| classify(e, misses, text))
}

fn expand_map(env: &Environment<'_>, map: &Vars, misses: &MissTracker) -> TemplateResult<Vars> {
	let mut expanded = Vars::new();
	for (key, value) in map {
		expanded.insert(
			expand_string(env, key, misses)?,
			expand_value(env, value, misses)?,
		);
	}
	Ok(expanded)
}

fn expand_value(env: &Environment<'_>, value: &JsonValue, misses: &MissTracker) -> TemplateResult<JsonValue> {
	Ok(match value {
		JsonValue::String(text) => JsonValue::String(expand_string(env, text, misses)?),
		JsonValue::Array(items) => JsonValue::Array(
			items
				.iter()
				.map(|item| expand_value(env, item, misses))
				.collect::<TemplateResult<_>>()?,
		),
		JsonValue::Object(map) => JsonValue::Object(expand_map(env, map, misses)?),
		other => other.clone(),
	})
}
