// SPDX-License-Identifier: Apache-2.0

use crate::{
	checksum::Checksummer,
	error::{Error, Result},
	version::compare_versions,
};
use std::path::PathBuf;

/// Target platform filter applied when choosing a binary to install or list.
#[derive(Clone, Debug)]
pub struct BinaryInstallationOptions {
	/// Plugin API major version the host speaks; candidates must match it
	/// exactly.
	pub api_version_major: u64,
	/// Plugin API minor version the host speaks; candidates may be older
	/// (lower minor) but never newer.
	pub api_version_minor: u64,
	pub os: String,
	pub arch: String,
	/// Extension appended to on-disk binary filenames (e.g. `.exe`); empty
	/// on unix-likes. Never part of remote archive names.
	pub ext: String,
	pub checksummers: Vec<Checksummer>,
}

impl BinaryInstallationOptions {
	/// The host-plugin protocol rule: equal major, plugin minor no newer
	/// than ours.
	pub(crate) fn api_compatible(&self, api_major: u64, api_minor: u64) -> bool {
		api_major == self.api_version_major && api_minor <= self.api_version_minor
	}

	/// `ext` without its leading dot, as it appears in a parsed filename.
	pub(crate) fn ext_token(&self) -> &str {
		self.ext.strip_prefix('.').unwrap_or(&self.ext)
	}
}

/// Structured form of a released binary filename,
/// `<prefix><version>_x<major>.<minor>_<os>_<arch>[.<ext>]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct BinaryFilename {
	pub version: String,
	pub api_major: u64,
	pub api_minor: u64,
	pub os: String,
	pub arch: String,
	pub ext: String,
}

/// The one filename parser shared by on-disk discovery and remote manifest
/// validation. Pure; rejects anything that does not fit the grammar.
pub(crate) fn parse_binary_filename(filename: &str, prefix: &str) -> Result<BinaryFilename> {
	let malformed = || Error::MalformedFilename {
		filename: filename.to_owned(),
	};

	let rest = filename.strip_prefix(prefix).ok_or_else(malformed)?;
	let fields: Vec<&str> = rest.split('_').collect();
	let [version, api, os, arch] = fields[..] else {
		return Err(malformed());
	};
	if version.is_empty() {
		return Err(malformed());
	}

	let (api_major, api_minor) = api
		.strip_prefix('x')
		.and_then(|api| api.split_once('.'))
		.ok_or_else(malformed)?;
	let api_major: u64 = api_major.parse().map_err(|_| malformed())?;
	let api_minor: u64 = api_minor.parse().map_err(|_| malformed())?;

	let (arch, ext) = match arch.rsplit_once('.') {
		Some((arch, ext)) => (arch, ext),
		None => (arch, ""),
	};
	if os.is_empty() || arch.is_empty() {
		return Err(malformed());
	}

	Ok(BinaryFilename {
		version: version.to_owned(),
		api_major,
		api_minor,
		os: os.to_owned(),
		arch: arch.to_owned(),
		ext: ext.to_owned(),
	})
}

/// A plugin binary present on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Installation {
	/// Absolute or caller-relative path of the executable.
	pub binary_path: PathBuf,
	/// The binary's version, in its conventional `v`-prefixed spelling.
	pub version: String,
}

/// Installations ordered by semantic version, oldest first; the newest
/// acceptable plugin is always the last element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstallList(Vec<Installation>);

impl InstallList {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, installation: Installation) {
		self.0.push(installation);
	}

	pub fn sort(&mut self) {
		self.0
			.sort_by(|a, b| compare_versions(&a.version, &b.version));
	}

	/// Strict version order between elements `i` and `j`; equal versions are
	/// less in neither direction.
	pub fn less(&self, i: usize, j: usize) -> bool {
		compare_versions(&self.0[i].version, &self.0[j].version).is_lt()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Installation> {
		self.0.iter()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl IntoIterator for InstallList {
	type Item = Installation;
	type IntoIter = std::vec::IntoIter<Installation>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}

impl<'list> IntoIterator for &'list InstallList {
	type Item = &'list Installation;
	type IntoIter = std::slice::Iter<'list, Installation>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.iter()
	}
}
