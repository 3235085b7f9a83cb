// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runtime settings sections.

pub mod files;
pub mod http;
pub mod logging;

pub use files::{FilesSettings, FilesSettingsLayer};
pub use http::{HttpSettings, HttpSettingsLayer};
pub use logging::{LogFormat, LoggingSettings, LoggingSettingsLayer};
