// SPDX-License-Identifier: Apache-2.0

use crate::{
	error::{Error, Result},
	install::parse_binary_filename,
	requirement::Requirement,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
	fmt::Display,
	fs::File,
	io::{Read, Write},
	path::Path,
};

/// The hash algorithms a checksum manifest may be produced with.
///
/// The lowercase name doubles as the remote resource key a [`Getter`] is
/// asked for, and the uppercase name as the sidecar file suffix.
///
/// [`Getter`]: crate::Getter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlgorithm {
	Sha256,
	Blake3,
}

impl Display for HashAlgorithm {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			HashAlgorithm::Sha256 => write!(f, "sha256"),
			HashAlgorithm::Blake3 => write!(f, "blake3"),
		}
	}
}

impl TryFrom<&str> for HashAlgorithm {
	type Error = Error;

	fn try_from(value: &str) -> Result<Self> {
		match value {
			"sha256" => Ok(HashAlgorithm::Sha256),
			"blake3" => Ok(HashAlgorithm::Blake3),
			_ => Err(Error::MalformedChecksumManifest {
				reason: format!("unknown hash algorithm '{}'", value),
			}),
		}
	}
}

/// A streaming digester; fresh per use, so one [`Checksummer`] can verify
/// any number of files.
pub(crate) enum Digester {
	Sha256(Box<Sha256>),
	Blake3(Box<blake3::Hasher>),
}

impl Digester {
	pub(crate) fn update(&mut self, bytes: &[u8]) {
		match self {
			Digester::Sha256(hasher) => hasher.update(bytes),
			Digester::Blake3(hasher) => {
				hasher.update(bytes);
			}
		}
	}

	pub(crate) fn finalize(self) -> Vec<u8> {
		match self {
			Digester::Sha256(hasher) => hasher.finalize().to_vec(),
			Digester::Blake3(hasher) => hasher.finalize().as_bytes().to_vec(),
		}
	}

	pub(crate) fn finalize_hex(self) -> String {
		hex::encode(self.finalize())
	}
}

/// Where a byte went missing during a hashed copy: the reading side or the
/// writing side. Callers map the two to different error categories.
pub(crate) enum CopyError {
	Read(std::io::Error),
	Write(std::io::Error),
}

/// A named hash algorithm used to verify archives and installed binaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checksummer {
	algorithm: HashAlgorithm,
}

impl Checksummer {
	pub fn new(algorithm: HashAlgorithm) -> Self {
		Self { algorithm }
	}

	/// The standard configuration everywhere: a single SHA-256 checksummer.
	pub fn sha256() -> Self {
		Self::new(HashAlgorithm::Sha256)
	}

	pub fn algorithm(&self) -> HashAlgorithm {
		self.algorithm
	}

	/// Suffix of sidecar checksum files, e.g. `_SHA256SUM`.
	pub fn file_ext(&self) -> String {
		format!("_{}SUM", self.algorithm.to_string().to_uppercase())
	}

	pub(crate) fn digester(&self) -> Digester {
		match self.algorithm {
			HashAlgorithm::Sha256 => Digester::Sha256(Box::new(Sha256::new())),
			HashAlgorithm::Blake3 => Digester::Blake3(Box::new(blake3::Hasher::new())),
		}
	}

	/// Consume `reader` and return the raw digest of its bytes.
	pub fn sum<R: Read>(&self, mut reader: R) -> Result<Vec<u8>> {
		let mut digester = self.digester();
		let mut buf = [0u8; 8192];
		loop {
			let n = reader.read(&mut buf).map_err(|source| Error::Io {
				context: format!("failed reading stream for {} digest", self.algorithm),
				source,
			})?;
			if n == 0 {
				break;
			}
			digester.update(&buf[..n]);
		}
		Ok(digester.finalize())
	}

	/// Stream `reader` into `writer`, returning the hex digest of the bytes
	/// copied. Single pass; nothing is buffered beyond one block.
	pub(crate) fn copy_and_sum<R: Read, W: Write>(
		&self,
		reader: &mut R,
		writer: &mut W,
	) -> std::result::Result<String, CopyError> {
		let mut digester = self.digester();
		let mut buf = [0u8; 8192];
		loop {
			let n = reader.read(&mut buf).map_err(CopyError::Read)?;
			if n == 0 {
				break;
			}
			digester.update(&buf[..n]);
			writer.write_all(&buf[..n]).map_err(CopyError::Write)?;
		}
		Ok(digester.finalize_hex())
	}

	/// Stream the file at `path` through the hash and compare against
	/// `expected`, a hex digest, case-insensitively.
	pub fn checksum_file(&self, expected: &str, path: &Path) -> Result<()> {
		let file = File::open(path).map_err(|source| Error::Io {
			context: format!("failed opening '{}' for verification", path.display()),
			source,
		})?;
		let actual = hex::encode(self.sum(file)?);
		if actual.eq_ignore_ascii_case(expected) {
			Ok(())
		} else {
			Err(Error::ChecksumMismatch {
				file: path.display().to_string(),
				expected: expected.to_lowercase(),
				actual,
			})
		}
	}
}

/// One `(filename, digest)` pair from a remote checksum manifest.
///
/// Only `filename` and `checksum` travel on the wire; the remaining fields
/// are filled by [`ChecksumFileEntry::init`] from the filename itself.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ChecksumFileEntry {
	pub filename: String,
	pub checksum: String,
	#[serde(skip)]
	bin_version: String,
	#[serde(skip)]
	api_major: u64,
	#[serde(skip)]
	api_minor: u64,
	#[serde(skip)]
	os: String,
	#[serde(skip)]
	arch: String,
	#[serde(skip)]
	ext: String,
}

impl ChecksumFileEntry {
	pub fn new(filename: &str, checksum: &str) -> Self {
		Self {
			filename: filename.to_owned(),
			checksum: checksum.to_owned(),
			..Self::default()
		}
	}

	/// Validate the filename against the requirement's filename grammar and
	/// fill the derived fields. Idempotent: re-running re-derives the same
	/// values with no other effect.
	pub fn init(&mut self, requirement: &Requirement) -> Result<()> {
		let prefix = requirement.identifier.filename_prefix();
		let parsed = parse_binary_filename(&self.filename, &prefix)?;
		self.bin_version = parsed.version;
		self.api_major = parsed.api_major;
		self.api_minor = parsed.api_minor;
		self.os = parsed.os;
		self.arch = parsed.arch;
		self.ext = parsed.ext;
		Ok(())
	}

	/// The `<version>` token of the filename, e.g. `v1.2.3`.
	pub fn bin_version(&self) -> &str {
		&self.bin_version
	}

	/// Everything after the last `.` of the filename; empty if none.
	pub fn ext(&self) -> &str {
		&self.ext
	}

	pub(crate) fn api_version(&self) -> (u64, u64) {
		(self.api_major, self.api_minor)
	}

	pub(crate) fn os(&self) -> &str {
		&self.os
	}

	pub(crate) fn arch(&self) -> &str {
		&self.arch
	}

	/// The canonical two-column checksum file line: `<hex>  <filename>`.
	pub fn checksum_line(&self) -> String {
		format!("{}  {}", self.checksum, self.filename)
	}

	/// Parse a line in the canonical two-column format. Inverse of
	/// [`ChecksumFileEntry::checksum_line`].
	pub fn from_checksum_line(line: &str) -> Result<Self> {
		let mut fields = line.split_whitespace();
		match (fields.next(), fields.next()) {
			(Some(checksum), Some(filename)) => Ok(Self::new(filename, checksum)),
			_ => Err(Error::MalformedChecksumManifest {
				reason: format!("expected '<digest>  <filename>', got '{}'", line.trim_end()),
			}),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{identifier::PluginIdentifier, version::VersionConstraints};

	fn requirement(plugin_type: &str) -> Requirement {
		Requirement {
			identifier: PluginIdentifier::new("github.com", "ddelnano", plugin_type).unwrap(),
			version_constraints: VersionConstraints::any(),
		}
	}

	#[test]
	fn file_ext_is_uppercased_suffix() {
		assert_eq!(Checksummer::sha256().file_ext(), "_SHA256SUM");
		assert_eq!(
			Checksummer::new(HashAlgorithm::Blake3).file_ext(),
			"_BLAKE3SUM"
		);
	}

	#[test]
	fn sum_streams_whole_reader() {
		let digest = Checksummer::sha256().sum("hello world".as_bytes()).unwrap();
		assert_eq!(
			hex::encode(digest),
			"b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
		);
	}

	#[test]
	fn entry_init_extracts_version_and_ext() {
		let mut entry = ChecksumFileEntry::new(
			"packer-plugin-xenserver_v0.3.0_x5.0_darwin_amd64.zip",
			"0f5969b069b9c0a58f2d5786c422341c70dfe17bd68f896fcbd46677e8c913f1",
		);
		entry.init(&requirement("xenserver")).unwrap();
		assert_eq!(entry.bin_version(), "v0.3.0");
		assert_eq!(entry.ext(), "zip");
		assert_eq!(entry.os(), "darwin");
		assert_eq!(entry.arch(), "amd64");
		assert_eq!(entry.api_version(), (5, 0));
	}

	#[test]
	fn entry_init_is_idempotent() {
		let mut entry = ChecksumFileEntry::new(
			"packer-plugin-xenserver_v0.3.0_x5.0_darwin_amd64.zip",
			"0f5969b069b9c0a58f2d5786c422341c70dfe17bd68f896fcbd46677e8c913f1",
		);
		entry.init(&requirement("xenserver")).unwrap();
		let first = entry.clone();
		entry.init(&requirement("xenserver")).unwrap();
		assert_eq!(entry, first);
	}

	#[test]
	fn entry_init_rejects_wrong_prefix() {
		let mut entry = ChecksumFileEntry::new(
			"packer-plugin-amazon_v0.3.0_x5.0_darwin_amd64.zip",
			"0f5969b0",
		);
		assert!(matches!(
			entry.init(&requirement("xenserver")),
			Err(Error::MalformedFilename { .. })
		));
	}

	#[test]
	fn entry_init_rejects_missing_separators() {
		for filename in [
			"packer-plugin-xenserver_v0.3.0_x5.0_darwin.zip",
			"packer-plugin-xenserver_v0.3.0_darwin_amd64.zip",
			"packer-plugin-xenserver_v0.3.0_x5_darwin_amd64.zip",
			"packer-plugin-xenserver_",
		] {
			let mut entry = ChecksumFileEntry::new(filename, "0f5969b0");
			assert!(
				entry.init(&requirement("xenserver")).is_err(),
				"'{}' should be rejected",
				filename
			);
		}
	}

	#[test]
	fn checksum_line_round_trip() {
		let entry = ChecksumFileEntry::new(
			"packer-plugin-amazon_v1.2.3_x5.0_darwin_amd64.zip",
			"1337c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
		);
		let line = entry.checksum_line();
		assert_eq!(
			line,
			"1337c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855  \
			 packer-plugin-amazon_v1.2.3_x5.0_darwin_amd64.zip"
		);
		let reparsed = ChecksumFileEntry::from_checksum_line(&line).unwrap();
		assert_eq!(reparsed.filename, entry.filename);
		assert_eq!(reparsed.checksum, entry.checksum);
	}

	#[test]
	fn wire_form_carries_only_filename_and_checksum() {
		let mut entry = ChecksumFileEntry::new(
			"packer-plugin-xenserver_v0.3.0_x5.0_darwin_amd64.zip",
			"0f5969b0",
		);
		entry.init(&requirement("xenserver")).unwrap();
		let json = serde_json::to_string(&entry).unwrap();
		assert_eq!(
			json,
			r#"{"filename":"packer-plugin-xenserver_v0.3.0_x5.0_darwin_amd64.zip","checksum":"0f5969b0"}"#
		);
	}
}
