// SPDX-License-Identifier: Apache-2.0

//! Resolution and installation of packer-style plugin binaries.
//!
//! A [`Requirement`] (plugin identifier plus version constraints) is
//! resolved against one or more remote [`Getter`]s into a verified
//! executable under the plugin directory. Binaries are distributed as
//! single-entry zip archives whose filenames carry the version, the plugin
//! API version, and the target platform; every installed binary keeps a
//! sidecar checksum file that is re-verified on each enumeration.

mod checksum;
mod error;
mod getter;
mod identifier;
mod install;
mod requirement;
mod util;
mod version;

pub use checksum::{ChecksumFileEntry, Checksummer, HashAlgorithm};
pub use error::{Error, Result};
pub use getter::{GetOptions, Getter, PluginAsset, Release};
pub use identifier::PluginIdentifier;
pub use install::{BinaryInstallationOptions, InstallList, Installation};
pub use requirement::{InstallOptions, ListInstallationsOptions, Requirement};
pub use version::{parse_version, VersionConstraints};
