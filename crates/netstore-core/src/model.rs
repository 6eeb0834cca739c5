//! Configuration records describing remote endpoints and per-user mounts.
//!
//! Both records are owned by the persistence layer; this crate only reads
//! them. `RemoteFileSystem::validate` turns the loosely typed record into a
//! [`ProtocolConfig`] so misconfiguration is caught when a record is saved.

use crate::error::{NetResult, NetStoreError};
use crate::options::{self, ProtocolConfig};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type FileSystemId = u64;
pub type FileStoreId = u64;

/// Which protocol implementation talks to the remote server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientType {
    /// SMB1/CIFS dialect, share addressed through the URL path.
    #[serde(rename = "CIFS", alias = "SAMBA")]
    Cifs,
    /// SMB2/SMB3 dialects, share addressed through `SHARE_NAME`.
    #[serde(rename = "SMB2", alias = "SMBJ")]
    Smb2,
    #[serde(rename = "SFTP")]
    Sftp,
}

impl ClientType {
    pub fn default_port(self) -> u16 {
        match self {
            ClientType::Cifs | ClientType::Smb2 => 445,
            ClientType::Sftp => 22,
        }
    }

    pub fn supports(self, auth: AuthType) -> bool {
        match auth {
            AuthType::Password => true,
            AuthType::PublicKey => self == ClientType::Sftp,
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClientType::Cifs => "CIFS",
            ClientType::Smb2 => "SMB2",
            ClientType::Sftp => "SFTP",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthType {
    Password,
    PublicKey,
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthType::Password => "PASSWORD",
            AuthType::PublicKey => "PUBLIC_KEY",
        })
    }
}

// ── RemoteFileSystem ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFileSystem {
    pub id: FileSystemId,
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub client_type: Option<ClientType>,
    #[serde(default)]
    pub auth_type: Option<AuthType>,
    #[serde(default)]
    pub disabled: bool,
    /// Accepts either a map or the legacy newline-delimited `KEY=VALUE` blob.
    #[serde(default, deserialize_with = "deserialize_options")]
    pub options: BTreeMap<String, String>,
}

impl RemoteFileSystem {
    pub fn new(id: FileSystemId, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            url: url.into(),
            client_type: None,
            auth_type: None,
            disabled: false,
            options: BTreeMap::new(),
        }
    }

    pub fn with_client_type(mut self, client_type: ClientType) -> Self {
        self.client_type = Some(client_type);
        self
    }

    pub fn with_auth_type(mut self, auth_type: AuthType) -> Self {
        self.auth_type = Some(auth_type);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Merge options from a newline-delimited `KEY=VALUE` blob.
    pub fn with_option_blob(mut self, blob: &str) -> NetResult<Self> {
        self.options.extend(options::parse_option_blob(blob)?);
        Ok(self)
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Check url → client type → auth type → combination, then parse the
    /// protocol-specific options.
    pub fn validate(&self) -> NetResult<ProtocolConfig> {
        if self.url.trim().is_empty() {
            return Err(NetStoreError::MissingConfig { field: "url" });
        }
        let client = self
            .client_type
            .ok_or(NetStoreError::MissingConfig { field: "client" })?;
        let auth = self
            .auth_type
            .ok_or(NetStoreError::MissingConfig { field: "auth" })?;
        if !client.supports(auth) {
            return Err(NetStoreError::UnsupportedAuth { client, auth });
        }
        ProtocolConfig::from_file_system(self, client, auth)
    }
}

fn deserialize_options<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Map(BTreeMap<String, String>),
        Blob(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Map(map) => Ok(map),
        Repr::Blob(blob) => options::parse_option_blob(&blob).map_err(serde::de::Error::custom),
    }
}

// ── FileStore ────────────────────────────────────────────────────────────────

/// A user's mount point: a root path inside one remote file system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStore {
    pub id: FileStoreId,
    #[serde(default)]
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub path: String,
    pub file_system_id: FileSystemId,
}

impl FileStore {
    pub fn new(
        id: FileStoreId,
        owner: impl Into<String>,
        path: impl Into<String>,
        file_system_id: FileSystemId,
    ) -> Self {
        Self {
            id,
            name: String::new(),
            owner: owner.into(),
            path: path.into(),
            file_system_id,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sftp() -> RemoteFileSystem {
        RemoteFileSystem::new(1, "lab", "sftp://files.example.org")
    }

    #[test]
    fn validate_reports_url_first() {
        let fs = RemoteFileSystem::new(1, "empty", "");
        match fs.validate() {
            Err(NetStoreError::MissingConfig { field }) => assert_eq!(field, "url"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn validate_reports_client_then_auth() {
        let fs = sftp().with_auth_type(AuthType::Password);
        assert!(fs.validate().unwrap_err().to_string().contains("'client'"));

        let fs = sftp().with_client_type(ClientType::Sftp);
        assert!(fs.validate().unwrap_err().to_string().contains("'auth'"));
    }

    #[test]
    fn public_key_only_for_sftp() {
        for client in [ClientType::Cifs, ClientType::Smb2] {
            let fs = RemoteFileSystem::new(2, "smb", "smb://host/share")
                .with_client_type(client)
                .with_auth_type(AuthType::PublicKey);
            assert_eq!(fs.validate().unwrap_err().kind(), ErrorKind::Unsupported);
        }
        assert!(ClientType::Sftp.supports(AuthType::PublicKey));
    }

    #[test]
    fn deserializes_option_blob_and_legacy_names() {
        let json = r#"{
            "id": 3,
            "name": "dept",
            "url": "smb://test.url",
            "clientType": "SMBJ",
            "authType": "PASSWORD",
            "options": "DOMAIN=WORKGROUP\nSHARE_NAME=testShare"
        }"#;
        let fs: RemoteFileSystem = serde_json::from_str(json).unwrap();
        assert_eq!(fs.client_type, Some(ClientType::Smb2));
        assert_eq!(fs.option("DOMAIN"), Some("WORKGROUP"));
        assert_eq!(fs.option("SHARE_NAME"), Some("testShare"));
    }

    #[test]
    fn deserializes_option_map() {
        let json = r#"{"id":4,"name":"a","url":"smb://h/s","clientType":"CIFS","options":{"DOMAIN":"LAB"}}"#;
        let fs: RemoteFileSystem = serde_json::from_str(json).unwrap();
        assert_eq!(fs.client_type, Some(ClientType::Cifs));
        assert_eq!(fs.auth_type, None);
        assert_eq!(fs.option("DOMAIN"), Some("LAB"));
    }

    #[test]
    fn blank_option_values_are_absent() {
        let fs = sftp().with_option("SERVER_PUBLIC_KEY", "  ");
        assert_eq!(fs.option("SERVER_PUBLIC_KEY"), None);
    }

    #[test]
    fn file_store_serializes_camel_case() {
        let store = FileStore::new(9, "alice", "CSE", 1).with_name("CSE share");
        let json = serde_json::to_string(&store).unwrap();
        assert!(json.contains("\"fileSystemId\":1"));
    }
}
