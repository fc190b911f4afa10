//! Public model name to vendor deployment name mapping.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::config::ConfigError;

/// Aliases shipped with the binary.
const BUILTIN_ALIASES: [(&str, &str); 3] = [
    ("gpt-3.5-turbo", "gpt_35"),
    ("gpt-4", "gpt_4"),
    ("gpt-4-32k", "gpt_4_32k"),
];

/// On-disk alias file layout.
///
/// ```toml
/// [aliases]
/// "gpt-4o" = "gpt_4o_prod"
/// ```
#[derive(Debug, Deserialize)]
struct AliasFile {
    #[serde(default)]
    aliases: HashMap<String, String>,
}

/// Read-only model alias table.
///
/// Built once at startup and shared behind an `Arc`; lookups that miss
/// fall back to the public name itself.
#[derive(Debug, Clone)]
pub struct ModelAliases {
    entries: HashMap<String, String>,
}

impl ModelAliases {
    /// Table with only the built-in aliases.
    pub fn builtin() -> Self {
        let entries = BUILTIN_ALIASES
            .iter()
            .map(|(model, deployment)| (model.to_string(), deployment.to_string()))
            .collect();
        Self { entries }
    }

    /// Built-in aliases with the entries of a TOML alias file layered on top.
    pub fn with_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        let mut table = Self::builtin();
        let added = table.merge_toml(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;

        tracing::info!(path = %path.display(), added, "Loaded model aliases");
        Ok(table)
    }

    /// Load the table described by configuration.
    pub fn load(aliases_file: Option<&Path>) -> Result<Self, ConfigError> {
        match aliases_file {
            Some(path) => Self::with_file(path),
            None => Ok(Self::builtin()),
        }
    }

    /// Merge entries from TOML text, overriding existing keys.
    fn merge_toml(&mut self, content: &str) -> Result<usize, toml::de::Error> {
        let file: AliasFile = toml::from_str(content)?;
        let added = file.aliases.len();
        self.entries.extend(file.aliases);
        Ok(added)
    }

    /// Resolve a public model name to its deployment name.
    pub fn resolve<'a>(&'a self, model: &'a str) -> &'a str {
        self.entries.get(model).map(String::as_str).unwrap_or(model)
    }

    /// Entries sorted by public model name.
    pub fn entries(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self
            .entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        entries.sort_unstable();
        entries
    }

    /// Number of alias entries, built-ins included.
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}
