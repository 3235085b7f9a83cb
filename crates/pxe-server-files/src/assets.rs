// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Assets compiled into the binary, addressed as `__builtin__/<path>`.

/// Built-in assets by path relative to the `__builtin__/` prefix.
const BUILTIN_ASSETS: &[(&str, &[u8])] = &[
	("ipxe/boot.ipxe", include_bytes!("../assets/ipxe/boot.ipxe")),
	("ipxe/shell.ipxe", include_bytes!("../assets/ipxe/shell.ipxe")),
];

/// Bytes of the asset at `path`, if bundled.
pub fn builtin_asset(path: &str) -> Option<&'static [u8]> {
	BUILTIN_ASSETS
		.iter()
		.find(|(name, _)| *name == path)
		.map(|(_, data)| *data)
}

/// Paths of every bundled asset.
pub fn builtin_assets() -> impl Iterator<Item = &'static str> {
	BUILTIN_ASSETS.iter().map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bundled_assets_resolve() {
		for path in builtin_assets() {
			let data = builtin_asset(path).unwrap();
			assert!(data.starts_with(b"#!ipxe"), "{path} is not an iPXE script");
		}
	}

	#[test]
	fn unknown_asset_is_none() {
		assert!(builtin_asset("ipxe/undionly.kpxe").is_none());
		assert!(builtin_asset("").is_none());
	}
}
