//! Client configuration via `lodestore.toml`
//!
//! A `ClientConfig` names the project and optional namespace a client
//! operates in, plus the lookup retry ceiling. It can be built in code or
//! loaded from a small TOML file; to change settings, edit the file and
//! recreate the client.

use lodestore_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "lodestore.toml";

/// Default retry ceiling for the lookup deferred-key loop
pub const DEFAULT_MAX_LOOKUP_ATTEMPTS: usize = 128;

/// Client configuration
///
/// # Example
///
/// ```toml
/// project = "my-project"
/// # namespace = "staging"
/// # max_lookup_attempts = 128
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Project all keys and RPCs are scoped to
    pub project: String,

    /// Optional namespace new keys are created in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Retry ceiling for the lookup deferred-key loop.
    ///
    /// Zero disables lookups entirely: `get_multi` returns empty results
    /// without calling the backend.
    #[serde(default = "default_max_lookup_attempts")]
    pub max_lookup_attempts: usize,
}

fn default_max_lookup_attempts() -> usize {
    DEFAULT_MAX_LOOKUP_ATTEMPTS
}

impl ClientConfig {
    /// Config for a project with default settings
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            namespace: None,
            max_lookup_attempts: DEFAULT_MAX_LOOKUP_ATTEMPTS,
        }
    }

    /// Scope new keys to a namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Override the lookup retry ceiling
    pub fn with_max_lookup_attempts(mut self, attempts: usize) -> Self {
        self.max_lookup_attempts = attempts;
        self
    }

    /// Parse config from a TOML string
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid config TOML.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse client config: {}", e)))
    }

    /// Read and parse config from a file path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Returns the default config file content with comments
    pub fn default_toml() -> &'static str {
        r#"# Lodestore client configuration

# Project all keys and RPCs are scoped to (required).
project = "my-project"

# Namespace new keys are created in (default: none).
# namespace = "staging"

# Retry ceiling for the lookup deferred-key loop (default: 128).
# Zero disables lookups entirely.
# max_lookup_attempts = 128
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults() {
        let config = ClientConfig::new("my-project");
        assert_eq!(config.project, "my-project");
        assert_eq!(config.namespace, None);
        assert_eq!(config.max_lookup_attempts, 128);
    }

    #[test]
    fn test_builders() {
        let config = ClientConfig::new("p")
            .with_namespace("staging")
            .with_max_lookup_attempts(3);
        assert_eq!(config.namespace.as_deref(), Some("staging"));
        assert_eq!(config.max_lookup_attempts, 3);
    }

    #[test]
    fn test_from_toml_minimal() {
        let config = ClientConfig::from_toml("project = \"p\"").unwrap();
        assert_eq!(config.project, "p");
        assert_eq!(config.max_lookup_attempts, 128);
    }

    #[test]
    fn test_from_toml_full() {
        let content = r#"
project = "p"
namespace = "ns"
max_lookup_attempts = 7
"#;
        let config = ClientConfig::from_toml(content).unwrap();
        assert_eq!(config.namespace.as_deref(), Some("ns"));
        assert_eq!(config.max_lookup_attempts, 7);
    }

    #[test]
    fn test_from_toml_missing_project_fails() {
        let result = ClientConfig::from_toml("namespace = \"ns\"");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_toml_garbage_fails() {
        let result = ClientConfig::from_toml("not valid toml at all [");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_default_toml_parses() {
        let config = ClientConfig::from_toml(ClientConfig::default_toml()).unwrap();
        assert_eq!(config.project, "my-project");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "project = \"from-disk\"").unwrap();

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.project, "from-disk");
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = ClientConfig::from_file(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = ClientConfig::new("p").with_namespace("ns");
        let serialized = toml::to_string(&config).unwrap();
        let back = ClientConfig::from_toml(&serialized).unwrap();
        assert_eq!(config, back);
    }
}
