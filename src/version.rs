// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use semver::{Version, VersionReq};
use std::{cmp::Ordering, fmt::Display};

/// Parse a plugin version string, tolerating the conventional `v` prefix.
pub fn parse_version(raw: &str) -> Result<Version> {
	let stripped = raw.strip_prefix(['v', 'V']).unwrap_or(raw);
	Version::parse(stripped).map_err(|source| Error::InvalidVersion {
		raw: raw.to_owned(),
		source,
	})
}

/// Total order over plugin version strings, used for "newest wins".
///
/// Pre-release versions sort before their corresponding release
/// (`v1.2.2-dev < v1.2.2`) and after the previous release
/// (`v1.2.1 < v1.2.2-dev`). Callers only feed versions that already passed
/// the filename grammar; anything unparseable falls back to string order.
pub(crate) fn compare_versions(a: &str, b: &str) -> Ordering {
	match (parse_version(a), parse_version(b)) {
		(Ok(a), Ok(b)) => a.cmp(&b),
		_ => a.cmp(b),
	}
}

/// A conjunction of semantic version predicates, e.g. `>= v1, < v2`.
///
/// An empty constraint set matches every version, pre-releases included. A
/// bare version (`v1.2.3`) is an exact requirement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionConstraints(Option<VersionReq>);

impl VersionConstraints {
	/// The empty constraint set; matches everything.
	pub fn any() -> Self {
		VersionConstraints(None)
	}

	pub fn parse(raw: &str) -> Result<Self> {
		let raw = raw.trim();
		if raw.is_empty() {
			return Ok(Self::any());
		}
		let normalized = raw
			.split(',')
			.map(normalize_comparator)
			.collect::<Vec<_>>()
			.join(", ");
		let req =
			VersionReq::parse(&normalized).map_err(|source| Error::InvalidVersionConstraints {
				raw: raw.to_owned(),
				source,
			})?;
		Ok(VersionConstraints(Some(req)))
	}

	pub fn matches(&self, version: &Version) -> bool {
		match &self.0 {
			None => true,
			Some(req) => req.matches(version),
		}
	}
}

impl Display for VersionConstraints {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match &self.0 {
			None => write!(f, "*"),
			Some(req) => write!(f, "{}", req),
		}
	}
}

/// Strip the conventional `v` off the version part of one comparator, and
/// turn a bare version into an exact requirement.
fn normalize_comparator(raw: &str) -> String {
	let trimmed = raw.trim();
	let version_start = trimmed
		.find(|c: char| !matches!(c, '>' | '<' | '=' | '~' | '^'))
		.unwrap_or(trimmed.len());
	let (op, version) = trimmed.split_at(version_start);
	let version = version.trim_start();
	let version = version.strip_prefix(['v', 'V']).unwrap_or(version);
	if op.is_empty() && Version::parse(version).is_ok() {
		format!("={version}")
	} else {
		format!("{op}{version}")
	}
}
