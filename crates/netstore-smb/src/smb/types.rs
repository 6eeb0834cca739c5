use serde::{Deserialize, Serialize};
use std::fmt;

/// Settings shared by every SMB client the factory creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SmbSettings {
    /// Program invoked for every SMB operation.
    pub smbclient_path: String,
    /// Passed to `smbclient -t`; bounds each request to the server.
    pub timeout_secs: u64,
}

impl Default for SmbSettings {
    fn default() -> Self {
        Self {
            smbclient_path: "smbclient".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Protocol dialects as `smbclient` names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SmbDialect {
    #[serde(rename = "NT1")]
    Nt1,
    #[serde(rename = "SMB2_02")]
    Smb2_02,
    #[serde(rename = "SMB2_10")]
    Smb2_10,
    #[serde(rename = "SMB3")]
    Smb3,
}

impl SmbDialect {
    pub fn as_str(self) -> &'static str {
        match self {
            SmbDialect::Nt1 => "NT1",
            SmbDialect::Smb2_02 => "SMB2_02",
            SmbDialect::Smb2_10 => "SMB2_10",
            SmbDialect::Smb3 => "SMB3",
        }
    }
}

impl fmt::Display for SmbDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dialects a client is willing to negotiate, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectRange {
    pub min: SmbDialect,
    pub max: SmbDialect,
}

impl DialectRange {
    pub const CIFS: DialectRange = DialectRange {
        min: SmbDialect::Nt1,
        max: SmbDialect::Nt1,
    };

    pub const SMB2: DialectRange = DialectRange {
        min: SmbDialect::Smb2_02,
        max: SmbDialect::Smb3,
    };

    pub fn allows(&self, dialect: SmbDialect) -> bool {
        self.min <= dialect && dialect <= self.max
    }
}
