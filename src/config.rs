//! Configuration file loading.
//!
//! One document holds logging, client settings, default tree bounds and the
//! file system / file store records of a file-configured deployment. YAML
//! and JSON are both accepted; the format follows the file extension.

use crate::factory::ClientSettings;
use crate::logging::LoggingConfig;
use crate::repository::InMemoryRepository;
use netstore_core::{FileStore, NetResult, NetStoreError, RemoteFileSystem, TreeBounds};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetStoreConfig {
    pub logging: LoggingConfig,
    pub clients: ClientSettings,
    pub tree: TreeBounds,
    pub file_systems: Vec<RemoteFileSystem>,
    pub file_stores: Vec<FileStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Json,
}

impl NetStoreConfig {
    pub fn load(path: impl AsRef<Path>) -> NetResult<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let format = match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase) {
            Some(ext) if ext == "yaml" || ext == "yml" => Format::Yaml,
            Some(ext) if ext == "json" => Format::Json,
            other => {
                return Err(NetStoreError::ConfigFile {
                    path: display,
                    message: format!(
                        "unsupported extension {}; expected .yaml, .yml or .json",
                        other.map(|e| format!("'.{e}'")).unwrap_or_else(|| "(none)".to_string())
                    ),
                })
            }
        };
        let text = std::fs::read_to_string(path).map_err(|e| NetStoreError::ConfigFile {
            path: display.clone(),
            message: e.to_string(),
        })?;
        let parsed = match format {
            Format::Yaml => serde_yaml::from_str(&text).map_err(|e| e.to_string()),
            Format::Json => serde_json::from_str(&text).map_err(|e| e.to_string()),
        };
        let config: NetStoreConfig = parsed.map_err(|message| NetStoreError::ConfigFile {
            path: display.clone(),
            message,
        })?;
        log::info!(
            "loaded {} file systems and {} file stores from {}",
            config.file_systems.len(),
            config.file_stores.len(),
            display
        );
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> NetResult<Self> {
        serde_yaml::from_str(text).map_err(|e| NetStoreError::ConfigFile {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    pub fn from_json_str(text: &str) -> NetResult<Self> {
        serde_json::from_str(text).map_err(|e| NetStoreError::ConfigFile {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Repository holding the configured records. Every file system is
    /// validated on the way in.
    pub fn repository(&self) -> NetResult<InMemoryRepository> {
        InMemoryRepository::from_records(self.file_systems.iter().cloned(), self.file_stores.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netstore_core::ClientType;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = NetStoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, NetStoreConfig::default());
        assert_eq!(config.tree.max_depth, 1);
    }

    #[test]
    fn yaml_with_option_blob() {
        let yaml = r#"
fileSystems:
  - id: 1
    name: dept
    url: smb://test.url
    clientType: SMB2
    authType: PASSWORD
    options: |
      DOMAIN=WORKGROUP
      SHARE_NAME=testShare
"#;
        let config = NetStoreConfig::from_yaml_str(yaml).unwrap();
        let fs = &config.file_systems[0];
        assert_eq!(fs.client_type, Some(ClientType::Smb2));
        assert_eq!(fs.option("SHARE_NAME"), Some("testShare"));
    }

    #[test]
    fn parse_errors_are_config_file_errors() {
        let err = NetStoreConfig::from_json_str("{\"tree\": 3}").unwrap_err();
        assert!(matches!(err, NetStoreError::ConfigFile { .. }));
    }
}
