// SPDX-License-Identifier: Apache-2.0

use crate::{
	checksum::{ChecksumFileEntry, Checksummer, CopyError},
	error::{Error, Result},
	getter::{GetOptions, Getter, PluginAsset, Release},
	identifier::PluginIdentifier,
	install::{parse_binary_filename, BinaryInstallationOptions, InstallList, Installation},
	util::fs::{create_dir_all, read_string_if_exists},
	version::{parse_version, VersionConstraints},
};
use pathbuf::pathbuf;
use semver::Version;
use std::{
	fs,
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

/// A declared plugin dependency: which plugin, and which versions of it are
/// acceptable. The unit of resolution.
#[derive(Clone, Debug)]
pub struct Requirement {
	pub identifier: PluginIdentifier,
	pub version_constraints: VersionConstraints,
}

/// Options for enumerating (and removing) installed plugin binaries.
#[derive(Clone, Debug)]
pub struct ListInstallationsOptions {
	pub plugin_directory: PathBuf,
	pub binary_installation_options: BinaryInstallationOptions,
}

/// Options for resolving and installing the newest acceptable version.
pub struct InstallOptions {
	/// Remote sources, tried in order.
	pub getters: Vec<Box<dyn Getter>>,
	pub plugin_directory: PathBuf,
	/// Reinstall even when a matching binary is already present and
	/// verifies.
	pub force: bool,
	pub binary_installation_options: BinaryInstallationOptions,
}

impl Requirement {
	/// Enumerate installed binaries matching this requirement's identifier,
	/// constraints, and platform, newest last.
	///
	/// Binaries whose filename does not fit the grammar are skipped
	/// silently; binaries without a sidecar checksum file are skipped with a
	/// warning (unverifiable); a binary that fails verification against its
	/// own sidecar is fatal.
	pub fn list_installations(&self, opts: &ListInstallationsOptions) -> Result<InstallList> {
		let bin_opts = &opts.binary_installation_options;
		let dir = self.plugin_dir(&opts.plugin_directory);
		let prefix = self.identifier.filename_prefix();
		let mut list = InstallList::new();

		let dir_entries = match fs::read_dir(&dir) {
			Ok(entries) => entries,
			Err(err) if err.kind() == ErrorKind::NotFound => return Ok(list),
			Err(source) => {
				return Err(Error::Io {
					context: format!("failed to read plugin directory '{}'", dir.display()),
					source,
				})
			}
		};

		for dir_entry in dir_entries {
			let dir_entry = dir_entry.map_err(|source| Error::Io {
				context: format!("failed to read plugin directory '{}'", dir.display()),
				source,
			})?;
			let file_name = dir_entry.file_name();
			let Some(name) = file_name.to_str() else {
				continue;
			};
			if bin_opts
				.checksummers
				.iter()
				.any(|checksummer| name.ends_with(&checksummer.file_ext()))
			{
				continue;
			}

			let parsed = match parse_binary_filename(name, &prefix) {
				Ok(parsed) => parsed,
				Err(err) => {
					log::debug!("skipping '{}' [err={}]", name, err);
					continue;
				}
			};
			if parsed.os != bin_opts.os
				|| parsed.arch != bin_opts.arch
				|| parsed.ext != bin_opts.ext_token()
			{
				continue;
			}
			if !bin_opts.api_compatible(parsed.api_major, parsed.api_minor) {
				continue;
			}
			let version = match parse_version(&parsed.version) {
				Ok(version) => version,
				Err(err) => {
					log::debug!("skipping '{}' [err={}]", name, err);
					continue;
				}
			};
			if !self.version_constraints.matches(&version) {
				continue;
			}

			let binary_path = dir.join(name);
			if self.verify_sidecar(&binary_path, name, &dir, bin_opts)? {
				list.push(Installation {
					binary_path,
					version: parsed.version,
				});
			}
		}

		list.sort();
		Ok(list)
	}

	/// Verify `binary_path` against the first sidecar checksum file found
	/// for it. `Ok(false)` means no sidecar exists: the binary cannot be
	/// vouched for and is left out. A digest mismatch is fatal.
	fn verify_sidecar(
		&self,
		binary_path: &Path,
		name: &str,
		dir: &Path,
		bin_opts: &BinaryInstallationOptions,
	) -> Result<bool> {
		for checksummer in &bin_opts.checksummers {
			let sidecar = dir.join(format!("{}{}", name, checksummer.file_ext()));
			let Some(contents) = read_string_if_exists(&sidecar)? else {
				continue;
			};
			let Some(expected) = contents.split_whitespace().next() else {
				log::warn!("empty checksum file '{}'", sidecar.display());
				continue;
			};
			checksummer.checksum_file(expected, binary_path)?;
			return Ok(true);
		}
		log::warn!(
			"no checksum file found for '{}', ignoring unverifiable binary",
			binary_path.display()
		);
		Ok(false)
	}

	/// Choose the newest version satisfying the constraints and make sure it
	/// is installed.
	///
	/// Returns `Ok(None)` when there is nothing to do: either a verified
	/// local binary already satisfies the newest acceptable version, or no
	/// remote source offers anything usable. Returns the new [`Installation`]
	/// after an actual download.
	pub fn install_latest(&self, opts: &InstallOptions) -> Result<Option<Installation>> {
		let bin_opts = &opts.binary_installation_options;
		let local = self.list_installations(&ListInstallationsOptions {
			plugin_directory: opts.plugin_directory.clone(),
			binary_installation_options: bin_opts.clone(),
		})?;

		let versions = self.candidate_versions(opts)?;
		let dir = self.plugin_dir(&opts.plugin_directory);

		for version in &versions {
			for getter in &opts.getters {
				let (entry, checksummer) =
					match self.pick_checksum_entry(getter.as_ref(), version, bin_opts) {
						Ok(picked) => picked,
						Err(err) => {
							log::debug!(
								"no usable checksum entry for {} {} from '{}' [err={}]",
								self.identifier,
								version,
								getter.name(),
								err
							);
							continue;
						}
					};

				let stem = entry
					.filename
					.strip_suffix(".zip")
					.unwrap_or(&entry.filename);
				let binary_filename = format!("{}{}", stem, bin_opts.ext);
				let binary_path = dir.join(&binary_filename);

				if !opts.force && local.iter().any(|i| i.binary_path == binary_path) {
					// An installed binary whose bytes disagree with the
					// remote digest is a tampering signal, not a cache miss;
					// it must never be silently re-downloaded.
					checksummer.checksum_file(&entry.checksum, &binary_path)?;
					log::debug!("plugin already installed [path='{}']", binary_path.display());
					return Ok(None);
				}

				let installation = self.download_and_install(
					getter.as_ref(),
					version,
					&entry,
					checksummer,
					bin_opts,
					&dir,
					stem,
					&binary_filename,
				)?;
				return Ok(Some(installation));
			}
			log::debug!(
				"no compatible binary for {} {} on {}/{}, trying older versions",
				self.identifier,
				version,
				bin_opts.os,
				bin_opts.arch
			);
		}

		Ok(None)
	}

	/// Gather releases from every getter, keep those satisfying the version
	/// constraints, and order them newest first.
	fn candidate_versions(&self, opts: &InstallOptions) -> Result<Vec<Version>> {
		let bin_opts = &opts.binary_installation_options;
		let mut versions: Vec<Version> = Vec::new();
		let mut last_err = None;
		let mut any_succeeded = false;

		for getter in &opts.getters {
			let get_opts = GetOptions::new(self, bin_opts, None);
			let releases: Result<Vec<Release>> = getter
				.get(PluginAsset::Releases, &get_opts)
				.and_then(|stream| {
					serde_json::from_reader(stream)
						.map_err(|source| Error::MalformedReleaseList { source })
				});
			match releases {
				Ok(releases) => {
					any_succeeded = true;
					for release in releases {
						match parse_version(&release.version) {
							Ok(version) => versions.push(version),
							Err(err) => {
								log::debug!(
									"skipping release '{}' from '{}' [err={}]",
									release.version,
									getter.name(),
									err
								);
							}
						}
					}
				}
				Err(err) => {
					log::debug!(
						"getter '{}' failed listing releases for {} [err={}]",
						getter.name(),
						self.identifier,
						err
					);
					last_err = Some(err);
				}
			}
		}

		match last_err {
			Some(err) if !any_succeeded => return Err(err),
			_ => {}
		}

		versions.retain(|version| self.version_constraints.matches(version));
		versions.sort_unstable();
		versions.dedup();
		versions.reverse();
		Ok(versions)
	}

	/// Fetch this getter's checksum manifest for `version` and pick the
	/// first entry compatible with the target platform and plugin API.
	/// Manifests are requested once per configured checksummer, in order;
	/// the first match wins.
	fn pick_checksum_entry(
		&self,
		getter: &dyn Getter,
		version: &Version,
		bin_opts: &BinaryInstallationOptions,
	) -> Result<(ChecksumFileEntry, Checksummer)> {
		let get_opts = GetOptions::new(self, bin_opts, Some(version.clone()));
		for checksummer in &bin_opts.checksummers {
			let stream = getter.get(PluginAsset::Checksums(checksummer.algorithm()), &get_opts)?;
			let entries: Vec<ChecksumFileEntry> =
				serde_json::from_reader(stream).map_err(|err| Error::MalformedChecksumManifest {
					reason: err.to_string(),
				})?;
			for mut entry in entries {
				if let Err(err) = entry.init(self) {
					log::debug!("dropping manifest entry [err={}]", err);
					continue;
				}
				let (api_major, api_minor) = entry.api_version();
				if entry.os() == bin_opts.os
					&& entry.arch() == bin_opts.arch
					&& bin_opts.api_compatible(api_major, api_minor)
				{
					return Ok((entry, *checksummer));
				}
			}
		}
		Err(Error::NoCompatibleChecksum {
			version: version.to_string(),
		})
	}

	/// Download the archive for `entry`, verifying its digest as the bytes
	/// stream past, then extract the one expected binary and write it with
	/// its sidecar. The binary lands first; a failure before the sidecar
	/// lands removes the binary again so an unverifiable install is never
	/// left behind.
	#[allow(clippy::too_many_arguments)]
	fn download_and_install(
		&self,
		getter: &dyn Getter,
		version: &Version,
		entry: &ChecksumFileEntry,
		checksummer: Checksummer,
		bin_opts: &BinaryInstallationOptions,
		dir: &Path,
		archive_entry_name: &str,
		binary_filename: &str,
	) -> Result<Installation> {
		let mut get_opts = GetOptions::new(self, bin_opts, Some(version.clone()));
		get_opts.set_expected_zip_filename(entry.filename.clone());
		let mut stream = getter.get(PluginAsset::Archive, &get_opts)?;

		create_dir_all(dir)?;

		// Stream the archive to a temporary sibling, hashing in the same
		// pass. The temp file is deleted on drop, which covers every error
		// exit below. A read cut off by caller cancellation surfaces as
		// `Interrupted`.
		let mut archive_tmp = new_temp_file(dir)?;
		let actual = checksummer
			.copy_and_sum(&mut stream, &mut archive_tmp)
			.map_err(|err| match err {
				CopyError::Read(source) if source.kind() == ErrorKind::Interrupted => {
					Error::Cancelled
				}
				CopyError::Read(source) => Error::RemoteUnavailable {
					what: PluginAsset::Archive.to_string(),
					source: Box::new(source),
				},
				CopyError::Write(source) => Error::WriteFailure {
					path: dir.to_path_buf(),
					source,
				},
			})?;
		drop(stream);
		if !actual.eq_ignore_ascii_case(&entry.checksum) {
			return Err(Error::ChecksumMismatch {
				file: entry.filename.clone(),
				expected: entry.checksum.to_lowercase(),
				actual,
			});
		}

		let archive_malformed = |source| Error::ArchiveMalformed {
			archive: entry.filename.clone(),
			source,
		};
		let archive_file = archive_tmp.reopen().map_err(|source| Error::Io {
			context: format!("failed to reopen downloaded '{}'", entry.filename),
			source,
		})?;
		let mut archive = zip::ZipArchive::new(archive_file).map_err(archive_malformed)?;
		let mut zip_entry = archive.by_name(archive_entry_name).map_err(archive_malformed)?;

		// Write the binary through a temporary sibling as well, hashing it
		// for the sidecar, then fsync and rename into place.
		let binary_path = dir.join(binary_filename);
		let mut binary_tmp = new_temp_file(dir)?;
		let digest = checksummer
			.copy_and_sum(&mut zip_entry, &mut binary_tmp)
			.map_err(|err| match err {
				CopyError::Read(source) => archive_malformed(zip::result::ZipError::Io(source)),
				CopyError::Write(source) => Error::WriteFailure {
					path: binary_path.clone(),
					source,
				},
			})?;
		set_executable(&binary_tmp)?;
		persist_temp_file(binary_tmp, &binary_path)?;

		let sidecar_path = dir.join(format!("{}{}", binary_filename, checksummer.file_ext()));
		let sidecar_line = format!("{}  {}\n", digest, binary_filename);
		if let Err(err) = write_sidecar(dir, &sidecar_path, &sidecar_line) {
			// never leave a binary behind without its sidecar
			let _ = fs::remove_file(&binary_path);
			return Err(err);
		}

		log::info!(
			"installed plugin {} [path='{}']",
			self.identifier,
			binary_path.display()
		);
		Ok(Installation {
			binary_path,
			version: format!("v{}", version),
		})
	}

	/// Remove every installed binary matching this requirement, along with
	/// its sidecar checksum files. Returns the removed binary paths. A
	/// sidecar that cannot be removed is logged and left for the operator; a
	/// binary that cannot be removed is fatal.
	pub fn remove_installations(&self, opts: &ListInstallationsOptions) -> Result<Vec<PathBuf>> {
		let installations = self.list_installations(opts)?;
		let mut removed = Vec::with_capacity(installations.len());

		for installation in &installations {
			fs::remove_file(&installation.binary_path).map_err(|source| Error::WriteFailure {
				path: installation.binary_path.clone(),
				source,
			})?;
			for checksummer in &opts.binary_installation_options.checksummers {
				let mut sidecar = installation.binary_path.clone().into_os_string();
				sidecar.push(checksummer.file_ext());
				let sidecar = PathBuf::from(sidecar);
				match fs::remove_file(&sidecar) {
					Ok(()) => {}
					Err(err) if err.kind() == ErrorKind::NotFound => {}
					Err(err) => {
						log::warn!(
							"failed to remove '{}', remove it manually [err={}]",
							sidecar.display(),
							err
						);
					}
				}
			}
			removed.push(installation.binary_path.clone());
		}

		Ok(removed)
	}

	/// `<plugin_directory>/<hostname>/<namespace>/<type>`
	fn plugin_dir(&self, plugin_directory: &Path) -> PathBuf {
		pathbuf![
			plugin_directory,
			self.identifier.hostname(),
			self.identifier.namespace(),
			self.identifier.plugin_type()
		]
	}
}

fn new_temp_file(dir: &Path) -> Result<NamedTempFile> {
	NamedTempFile::new_in(dir).map_err(|source| Error::WriteFailure {
		path: dir.to_path_buf(),
		source,
	})
}

fn persist_temp_file(tmp: NamedTempFile, path: &Path) -> Result<()> {
	tmp.as_file().sync_all().map_err(|source| Error::WriteFailure {
		path: path.to_path_buf(),
		source,
	})?;
	tmp.persist(path).map_err(|err| Error::WriteFailure {
		path: path.to_path_buf(),
		source: err.error,
	})?;
	Ok(())
}

fn write_sidecar(dir: &Path, sidecar_path: &Path, line: &str) -> Result<()> {
	let mut tmp = new_temp_file(dir)?;
	tmp.write_all(line.as_bytes())
		.map_err(|source| Error::WriteFailure {
			path: sidecar_path.to_path_buf(),
			source,
		})?;
	persist_temp_file(tmp, sidecar_path)
}

#[cfg(unix)]
fn set_executable(tmp: &NamedTempFile) -> Result<()> {
	use std::os::unix::fs::PermissionsExt;
	fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o755)).map_err(|source| {
		Error::WriteFailure {
			path: tmp.path().to_path_buf(),
			source,
		}
	})
}

#[cfg(not(unix))]
fn set_executable(_tmp: &NamedTempFile) -> Result<()> {
	Ok(())
}
