// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use std::fmt::Display;

/// The parsed source address of a plugin: `<hostname>/<namespace>/<type>`,
/// e.g. `github.com/hashicorp/amazon`.
///
/// Parsing the source string itself is the concern of the host tool; this
/// type only holds the already-split fields. All three fields are compared
/// case-sensitively.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct PluginIdentifier {
	hostname: String,
	namespace: String,
	plugin_type: String,
}

impl PluginIdentifier {
	pub fn new(hostname: &str, namespace: &str, plugin_type: &str) -> Result<Self> {
		for (field, value) in [
			("hostname", hostname),
			("namespace", namespace),
			("type", plugin_type),
		] {
			if value.is_empty() {
				return Err(Error::InvalidIdentifier { field });
			}
		}
		Ok(Self {
			hostname: hostname.to_owned(),
			namespace: namespace.to_owned(),
			plugin_type: plugin_type.to_owned(),
		})
	}

	pub fn hostname(&self) -> &str {
		&self.hostname
	}

	pub fn namespace(&self) -> &str {
		&self.namespace
	}

	pub fn plugin_type(&self) -> &str {
		&self.plugin_type
	}

	/// Path of the plugin's release repository relative to its host, e.g.
	/// `hashicorp/packer-plugin-amazon`.
	pub fn real_relative_path(&self) -> String {
		format!("{}/packer-plugin-{}", self.namespace, self.plugin_type)
	}

	/// The prefix every released binary filename carries, e.g.
	/// `packer-plugin-amazon_`.
	pub fn filename_prefix(&self) -> String {
		format!("packer-plugin-{}_", self.plugin_type)
	}
}

impl Display for PluginIdentifier {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"{}/{}/{}",
			self.hostname, self.namespace, self.plugin_type
		)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn derived_forms() {
		let id = PluginIdentifier::new("github.com", "hashicorp", "amazon").unwrap();
		assert_eq!(id.real_relative_path(), "hashicorp/packer-plugin-amazon");
		assert_eq!(id.filename_prefix(), "packer-plugin-amazon_");
		assert_eq!(id.to_string(), "github.com/hashicorp/amazon");
	}

	#[test]
	fn empty_fields_rejected() {
		assert!(PluginIdentifier::new("", "hashicorp", "amazon").is_err());
		assert!(PluginIdentifier::new("github.com", "", "amazon").is_err());
		assert!(PluginIdentifier::new("github.com", "hashicorp", "").is_err());
	}
}
