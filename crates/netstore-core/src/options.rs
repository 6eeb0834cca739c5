//! Protocol options: the legacy `KEY=VALUE` blob, and the typed
//! [`ProtocolConfig`] each client type is built from.

use crate::error::{NetResult, NetStoreError};
use crate::model::{AuthType, ClientType, RemoteFileSystem};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine as _;
use percent_encoding::percent_decode_str;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

pub const OPTION_DOMAIN: &str = "DOMAIN";
pub const OPTION_SHARE_NAME: &str = "SHARE_NAME";
pub const OPTION_SERVER_PUBLIC_KEY: &str = "SERVER_PUBLIC_KEY";

/// Parse a newline-delimited `KEY=VALUE` blob. Blank lines and `#` comments
/// are skipped; keys are upper-cased.
pub fn parse_option_blob(blob: &str) -> NetResult<BTreeMap<String, String>> {
    let mut options = BTreeMap::new();
    for (index, line) in blob.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| {
            NetStoreError::invalid_option(
                line.to_string(),
                format!("line {} is not of the form KEY=VALUE", index + 1),
            )
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(NetStoreError::invalid_option(
                "",
                format!("line {} has an empty key", index + 1),
            ));
        }
        options.insert(key.to_ascii_uppercase(), value.trim().to_string());
    }
    Ok(options)
}

pub fn format_option_blob(options: &BTreeMap<String, String>) -> String {
    options
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Typed configuration ──────────────────────────────────────────────────────

/// Address of one SMB share, plus an optional directory inside it that all
/// client paths are relative to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmbShare {
    pub host: String,
    pub port: Option<u16>,
    pub share: String,
    pub base_path: String,
}

impl SmbShare {
    /// `//host/share`, the service name `smbclient` expects.
    pub fn service(&self) -> String {
        format!("//{}/{}", self.host, self.share)
    }
}

impl fmt::Display for SmbShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "smb://{}:{}/{}", self.host, port, self.share),
            None => write!(f, "smb://{}/{}", self.host, self.share),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SftpEndpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for SftpEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sftp://{}:{}", self.host, self.port)
    }
}

/// A server host key as configured in `SERVER_PUBLIC_KEY`
/// (`<algorithm> <base64 blob> [comment]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostKey {
    algorithm: String,
    blob: Vec<u8>,
}

impl HostKey {
    pub fn parse_openssh(line: &str) -> NetResult<Self> {
        let invalid = |reason: &str| NetStoreError::invalid_option(OPTION_SERVER_PUBLIC_KEY, reason);
        let mut parts = line.split_whitespace();
        let first = parts.next().ok_or_else(|| invalid("empty key"))?;
        // Either "<algorithm> <blob>" or a bare blob.
        let (declared, encoded) = match parts.next() {
            Some(blob) => (Some(first), blob),
            None => (None, first),
        };
        let blob = STANDARD
            .decode(encoded)
            .map_err(|e| invalid(&format!("key blob is not base64: {e}")))?;
        let algorithm = wire_algorithm(&blob).ok_or_else(|| invalid("key blob is truncated"))?;
        if let Some(declared) = declared {
            if declared != algorithm {
                return Err(invalid(&format!(
                    "key type '{declared}' does not match encoded type '{algorithm}'"
                )));
            }
        }
        Ok(Self { algorithm, blob })
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Compare against the wire-encoded key the server presented.
    pub fn matches(&self, presented: &[u8]) -> bool {
        self.blob == presented
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.blob)
    }

    pub fn to_openssh(&self) -> String {
        format!("{} {}", self.algorithm, STANDARD.encode(&self.blob))
    }
}

/// OpenSSH-style `SHA256:` fingerprint of a wire-encoded key.
pub fn fingerprint(blob: &[u8]) -> String {
    let digest = Sha256::digest(blob);
    format!("SHA256:{}", STANDARD_NO_PAD.encode(digest))
}

fn wire_algorithm(blob: &[u8]) -> Option<String> {
    let len_bytes: [u8; 4] = blob.get(..4)?.try_into().ok()?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    let name = blob.get(4..4 + len)?;
    if name.is_empty() || blob.len() <= 4 + len {
        return None;
    }
    String::from_utf8(name.to_vec()).ok()
}

/// Validated, protocol-specific configuration of one remote file system.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolConfig {
    Cifs {
        share: SmbShare,
        domain: Option<String>,
    },
    Smb2 {
        share: SmbShare,
        domain: Option<String>,
    },
    Sftp {
        endpoint: SftpEndpoint,
        auth: AuthType,
        server_key: Option<HostKey>,
    },
}

impl ProtocolConfig {
    pub(crate) fn from_file_system(
        fs: &RemoteFileSystem,
        client: ClientType,
        auth: AuthType,
    ) -> NetResult<Self> {
        let domain = fs.option(OPTION_DOMAIN).map(str::to_string);
        match client {
            ClientType::Cifs => {
                let (host, port, segments) = parse_smb_url(&fs.url)?;
                let mut segments = segments.into_iter();
                let share = segments.next().ok_or_else(|| {
                    NetStoreError::invalid_option("url", "CIFS urls must name a share: smb://host/share")
                })?;
                Ok(ProtocolConfig::Cifs {
                    share: SmbShare {
                        host,
                        port,
                        share,
                        base_path: segments.collect::<Vec<_>>().join("/"),
                    },
                    domain,
                })
            }
            ClientType::Smb2 => {
                let (host, port, segments) = parse_smb_url(&fs.url)?;
                let (share, base) = match fs.option(OPTION_SHARE_NAME) {
                    Some(name) => (name.to_string(), segments),
                    None => {
                        let mut segments = segments.into_iter();
                        let share = segments.next().ok_or_else(|| {
                            NetStoreError::invalid_option(
                                OPTION_SHARE_NAME,
                                "no share name in the options or the url",
                            )
                        })?;
                        (share, segments.collect())
                    }
                };
                if share.contains(['/', '\\']) {
                    return Err(NetStoreError::invalid_option(
                        OPTION_SHARE_NAME,
                        "share names cannot contain path separators",
                    ));
                }
                Ok(ProtocolConfig::Smb2 {
                    share: SmbShare {
                        host,
                        port,
                        share,
                        base_path: base.join("/"),
                    },
                    domain,
                })
            }
            ClientType::Sftp => {
                let endpoint = parse_sftp_url(&fs.url)?;
                let server_key = fs
                    .option(OPTION_SERVER_PUBLIC_KEY)
                    .map(HostKey::parse_openssh)
                    .transpose()?;
                Ok(ProtocolConfig::Sftp {
                    endpoint,
                    auth,
                    server_key,
                })
            }
        }
    }

    pub fn client_type(&self) -> ClientType {
        match self {
            ProtocolConfig::Cifs { .. } => ClientType::Cifs,
            ProtocolConfig::Smb2 { .. } => ClientType::Smb2,
            ProtocolConfig::Sftp { .. } => ClientType::Sftp,
        }
    }

    /// SMB clients only ever authenticate with a password.
    pub fn auth_type(&self) -> AuthType {
        match self {
            ProtocolConfig::Cifs { .. } | ProtocolConfig::Smb2 { .. } => AuthType::Password,
            ProtocolConfig::Sftp { auth, .. } => *auth,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            ProtocolConfig::Cifs { share, .. } | ProtocolConfig::Smb2 { share, .. } => &share.host,
            ProtocolConfig::Sftp { endpoint, .. } => &endpoint.host,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            ProtocolConfig::Cifs { share, .. } | ProtocolConfig::Smb2 { share, .. } => {
                share.port.unwrap_or(ClientType::Smb2.default_port())
            }
            ProtocolConfig::Sftp { endpoint, .. } => endpoint.port,
        }
    }
}

// ── URL parsing ──────────────────────────────────────────────────────────────

/// Accepts `smb://host[:port]/seg/…`, `cifs://…`, UNC `\\host\share` and a
/// bare `host/share`.
fn parse_smb_url(raw: &str) -> NetResult<(String, Option<u16>, Vec<String>)> {
    let raw = raw.trim();
    let normalized = if raw.starts_with("\\\\") {
        format!("smb:{}", raw.replace('\\', "/"))
    } else if raw.contains("://") {
        raw.to_string()
    } else {
        format!("smb://{raw}")
    };
    let url = Url::parse(&normalized).map_err(|e| NetStoreError::invalid_option("url", e.to_string()))?;
    if !matches!(url.scheme(), "smb" | "cifs") {
        return Err(NetStoreError::invalid_option(
            "url",
            format!("unsupported scheme '{}' for an SMB file system", url.scheme()),
        ));
    }
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| NetStoreError::invalid_option("url", "missing host"))?
        .to_string();
    let segments = url
        .path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    Ok((host, url.port(), segments))
}

/// Accepts `sftp://host[:port]`, `ssh://host[:port]` and bare `host[:port]`.
fn parse_sftp_url(raw: &str) -> NetResult<SftpEndpoint> {
    let raw = raw.trim();
    let normalized = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("sftp://{raw}")
    };
    let url = Url::parse(&normalized).map_err(|e| NetStoreError::invalid_option("url", e.to_string()))?;
    if !matches!(url.scheme(), "sftp" | "ssh") {
        return Err(NetStoreError::invalid_option(
            "url",
            format!("unsupported scheme '{}' for an SFTP file system", url.scheme()),
        ));
    }
    if !matches!(url.path(), "" | "/") {
        return Err(NetStoreError::invalid_option(
            "url",
            "SFTP urls address a host; put directories in the file store path",
        ));
    }
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| NetStoreError::invalid_option("url", "missing host"))?;
    Ok(SftpEndpoint {
        host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
        port: url.port().unwrap_or(ClientType::Sftp.default_port()),
    })
}
