// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Template context objects.
//!
//! Mappings and sequences are exposed to templates as [`TrackedMap`] and
//! [`TrackedSeq`] objects. A failed lookup records its dotted path; any
//! successful lookup clears it, so after a strict undefined error the tracker
//! holds the lookup that caused it. The path names the variable in
//! [`TemplateError::MissingVariable`].
//!
//! [`TemplateError::MissingVariable`]: crate::TemplateError::MissingVariable

use std::sync::{Arc, Mutex, PoisonError};

use minijinja::value::{Enumerator, Object, ObjectRepr, Value};
use pxe_server_config::Vars;

/// Most recent missed lookup, shared by every object of one render.
#[derive(Debug, Clone, Default)]
pub(crate) struct MissTracker(Arc<Mutex<Option<String>>>);

impl MissTracker {
	fn set(&self, path: Option<String>) {
		*self.0.lock().unwrap_or_else(PoisonError::into_inner) = path;
	}

	pub(crate) fn take(&self) -> Option<String> {
		self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
	}
}

fn wrap(path: String, value: &serde_json::Value, misses: &MissTracker) -> Value {
	match value {
		serde_json::Value::Object(map) => Value::from_object(TrackedMap {
			path,
			map: map.clone(),
			misses: misses.clone(),
		}),
		serde_json::Value::Array(items) => Value::from_object(TrackedSeq {
			path,
			items: items.clone(),
			misses: misses.clone(),
		}),
		other => Value::from_serialize(other),
	}
}

#[derive(Debug)]
pub(crate) struct TrackedMap {
	path: String,
	map: Vars,
	misses: MissTracker,
}

impl TrackedMap {
	/// Template root exposing `vars` as the only name.
	pub(crate) fn root(vars: Vars, misses: MissTracker) -> Value {
		let mut root = Vars::new();
		root.insert("vars".to_string(), serde_json::Value::Object(vars));
		Value::from_object(TrackedMap {
			path: String::new(),
			map: root,
			misses,
		})
	}

	fn child_path(&self, key: &str) -> String {
		if self.path.is_empty() {
			key.to_string()
		} else {
			format!("{}.{key}", self.path)
		}
	}
}

impl Object for TrackedMap {
	fn repr(self: &Arc<Self>) -> ObjectRepr {
		ObjectRepr::Map
	}

	fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
		let key = key.as_str()?;
		match self.map.get(key) {
			Some(value) => {
				self.misses.set(None);
				Some(wrap(self.child_path(key), value, &self.misses))
			}
			None => {
				self.misses.set(Some(self.child_path(key)));
				None
			}
		}
	}

	fn enumerate(self: &Arc<Self>) -> Enumerator {
		Enumerator::Values(self.map.keys().map(|k| Value::from(k.as_str())).collect())
	}
}

#[derive(Debug)]
pub(crate) struct TrackedSeq {
	path: String,
	items: Vec<serde_json::Value>,
	misses: MissTracker,
}

impl Object for TrackedSeq {
	fn repr(self: &Arc<Self>) -> ObjectRepr {
		ObjectRepr::Seq
	}

	fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
		let raw = i64::try_from(key.clone()).ok()?;
		let index = if raw < 0 {
			i64::try_from(self.items.len()).ok()? + raw
		} else {
			raw
		};
		let item = usize::try_from(index).ok().and_then(|i| self.items.get(i));
		match item {
			Some(value) => {
				self.misses.set(None);
				Some(wrap(format!("{}[{raw}]", self.path), value, &self.misses))
			}
			None => {
				self.misses.set(Some(format!("{}[{raw}]", self.path)));
				None
			}
		}
	}

	fn enumerate(self: &Arc<Self>) -> Enumerator {
		Enumerator::Seq(self.items.len())
	}
}
