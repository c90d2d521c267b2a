// SPDX-License-Identifier: Apache-2.0

use crate::{
	checksum::HashAlgorithm, error::Result, install::BinaryInstallationOptions,
	requirement::Requirement,
};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, io::Read};

/// A versioned plugin release, as reported by a remote source. The version
/// is conventionally `v`-prefixed; pre-release suffixes participate in
/// ordering.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Release {
	pub version: String,
}

/// The resources a [`Getter`] can be asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PluginAsset {
	/// A JSON array of [`Release`] objects, in any order.
	Releases,
	/// A JSON array of [`ChecksumFileEntry`] objects produced with the named
	/// algorithm. Sources that host the canonical two-column `SHA256SUMS`
	/// text are expected to transform it before delivery.
	///
	/// [`ChecksumFileEntry`]: crate::ChecksumFileEntry
	Checksums(HashAlgorithm),
	/// The raw bytes of the release archive named by
	/// [`GetOptions::expected_zip_filename`].
	Archive,
}

impl Display for PluginAsset {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			PluginAsset::Releases => write!(f, "releases"),
			PluginAsset::Checksums(algorithm) => write!(f, "{}", algorithm),
			PluginAsset::Archive => write!(f, "zip"),
		}
	}
}

/// Everything a [`Getter`] needs to locate one resource of one plugin.
pub struct GetOptions<'req> {
	pub plugin_requirement: &'req Requirement,
	pub binary_installation_options: &'req BinaryInstallationOptions,
	version: Option<Version>,
	expected_zip_filename: Option<String>,
}

impl<'req> GetOptions<'req> {
	pub(crate) fn new(
		plugin_requirement: &'req Requirement,
		binary_installation_options: &'req BinaryInstallationOptions,
		version: Option<Version>,
	) -> Self {
		Self {
			plugin_requirement,
			binary_installation_options,
			version,
			expected_zip_filename: None,
		}
	}

	/// The version currently being processed; `None` only while listing
	/// releases, before any candidate is chosen.
	pub fn version(&self) -> Option<&Version> {
		self.version.as_ref()
	}

	/// The archive filename the resolver expects for the entry it selected,
	/// e.g. `packer-plugin-amazon_v2.10.0_x6.0_darwin_amd64.zip`. Set only
	/// for [`PluginAsset::Archive`] requests.
	pub fn expected_zip_filename(&self) -> Option<&str> {
		self.expected_zip_filename.as_deref()
	}

	pub(crate) fn set_expected_zip_filename(&mut self, filename: String) {
		self.expected_zip_filename = Some(filename);
	}
}

/// A source of plugin metadata and archives.
///
/// Implementations today are HTTP-backed (a public release archive, a
/// registry API); the resolver composes them as an ordered sequence and
/// tries each in turn. Transport failures are reported as
/// [`Error::RemoteUnavailable`], caller-driven aborts as
/// [`Error::Cancelled`]; the stream a successful call returns is either
/// fully consumed or dropped by the resolver on every exit path.
///
/// [`Error::RemoteUnavailable`]: crate::Error::RemoteUnavailable
/// [`Error::Cancelled`]: crate::Error::Cancelled
pub trait Getter {
	/// Fetch one resource for the plugin described by `opts`.
	fn get(&self, what: PluginAsset, opts: &GetOptions<'_>) -> Result<Box<dyn Read>>;

	/// Short name identifying this source in logs.
	fn name(&self) -> &str;
}
