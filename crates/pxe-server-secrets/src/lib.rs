// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-host secret store for pxeserver.
//!
//! - **Lookup**: values keyed by host (MAC) and secret id; the empty host key
//!   is the shared namespace
//! - **Generation**: missing secrets are generated from their definitions on
//!   first request, at most once per `(host, id)`
//! - **Persistence**: the whole store is rewritten atomically to a YAML file
//!   after every generation pass
//!
//! Secret values are never logged.

pub mod error;
pub mod generate;
pub mod store;

pub use error::{SecretsError, SecretsResult};
pub use generate::{generate_password, DEFAULT_PASSWORD_LENGTH, DEFAULT_RSA_BITS, PASSWORD_ALPHABET};
pub use store::{LocalSecretStore, Secrets};
