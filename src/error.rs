// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// An enumeration of the ways plugin resolution and installation can fail.
///
/// The variants are stable categories: callers are expected to match on them
/// to distinguish, say, a tampered binary from an unreachable release host.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// A binary filename did not fit the release filename grammar. Never
	/// fatal on its own; the resolver drops the offending entry.
	#[error("malformed plugin binary filename '{filename}'")]
	MalformedFilename { filename: String },

	/// A release has no checksum entry compatible with the target platform
	/// and plugin API version. Never fatal; the resolver moves on to the
	/// next older release.
	#[error("no compatible checksum entry for version {version}")]
	NoCompatibleChecksum { version: String },

	/// A remote source failed to deliver a requested resource.
	#[error("plugin source failed fetching '{what}'")]
	RemoteUnavailable {
		what: String,
		#[source]
		source: Box<dyn std::error::Error + Send + Sync>,
	},

	/// Computed digest of a file or stream disagrees with the recorded one.
	#[error("checksum mismatch for '{file}': expected {expected}, got {actual}")]
	ChecksumMismatch {
		file: String,
		expected: String,
		actual: String,
	},

	/// The downloaded archive is unreadable or lacks the expected entry.
	#[error("unusable plugin archive '{archive}'")]
	ArchiveMalformed {
		archive: String,
		#[source]
		source: zip::result::ZipError,
	},

	/// A filesystem mutation under the plugin directory failed.
	#[error("failed writing '{path}'")]
	WriteFailure {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// The caller aborted an in-flight operation.
	#[error("plugin installation cancelled")]
	Cancelled,

	#[error("plugin identifier field '{field}' is empty")]
	InvalidIdentifier { field: &'static str },

	#[error("invalid version constraints '{raw}'")]
	InvalidVersionConstraints {
		raw: String,
		#[source]
		source: semver::Error,
	},

	#[error("invalid plugin version '{raw}'")]
	InvalidVersion {
		raw: String,
		#[source]
		source: semver::Error,
	},

	#[error("malformed release list")]
	MalformedReleaseList {
		#[source]
		source: serde_json::Error,
	},

	#[error("malformed checksum manifest: {reason}")]
	MalformedChecksumManifest { reason: String },

	#[error("{context}")]
	Io {
		context: String,
		#[source]
		source: std::io::Error,
	},
}
