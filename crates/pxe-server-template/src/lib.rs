// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Template rendering for pxeserver.
//!
//! Templates use Jinja syntax. Variables live under `vars`, and functions
//! depend on the surface being rendered:
//!
//! | function          | file contents | cmdline | path |
//! |-------------------|---------------|---------|------|
//! | `secret(id)`      | yes           | yes     | no   |
//! | `shared_secret(id)` | yes         | yes     | no   |
//! | `file_url(id)`    | `<no value>`  | yes     | no   |
//! | `file_sha256(id)` | `<no value>`  | yes     | no   |
//! | `file_md5(id)`    | `<no value>`  | yes     | no   |
//! | `builtin(path)`   | no            | no      | yes  |
//!
//! String values in `vars` (and mapping keys) are templates too; they are
//! expanded before the main template runs. Undefined variables are errors.

mod context;
pub mod error;
mod renderer;

pub use error::{BoxError, TemplateError, TemplateResult};
pub use renderer::{FileDigests, Renderer, UrlBuilder, BUILTIN_PREFIX, NO_VALUE};
