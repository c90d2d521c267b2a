// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use std::{fs, io::ErrorKind, path::Path};

/// Read a file to a string, distinguishing "not there" from real failures.
pub(crate) fn read_string_if_exists(path: &Path) -> Result<Option<String>> {
	match fs::read_to_string(path) {
		Ok(contents) => Ok(Some(contents)),
		Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
		Err(source) => Err(Error::Io {
			context: format!("failed to read '{}'", path.display()),
			source,
		}),
	}
}

/// Create a directory and missing parents.
pub(crate) fn create_dir_all(path: &Path) -> Result<()> {
	fs::create_dir_all(path).map_err(|source| Error::WriteFailure {
		path: path.to_path_buf(),
		source,
	})
}
