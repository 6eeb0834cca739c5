// ── Types ─────────────────────────────────────────────────────────────────────

use crate::sftp::keys::PrivateKeyMaterial;
use netstore_core::{AuthType, EntryKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use zeroize::Zeroizing;

fn default_connect_timeout_secs() -> u64 {
    30
}
fn default_io_timeout_secs() -> u64 {
    60
}
fn default_keepalive_secs() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

/// Settings shared by every SFTP client the factory creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SftpSettings {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Applied to every blocking libssh2 call once connected.
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
    /// `0` disables keep-alive messages.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_interval_secs: u64,
    /// Refuse servers whose file system has no `SERVER_PUBLIC_KEY`.
    #[serde(default = "default_true")]
    pub require_host_key: bool,
    #[serde(default)]
    pub compress: bool,
}

impl Default for SftpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            io_timeout_secs: default_io_timeout_secs(),
            keepalive_interval_secs: default_keepalive_secs(),
            require_host_key: true,
            compress: false,
        }
    }
}

impl SftpSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// libssh2 takes milliseconds as `u32`; `0` means no timeout.
    pub fn io_timeout_ms(&self) -> u32 {
        u32::try_from(self.io_timeout_secs.saturating_mul(1000)).unwrap_or(u32::MAX)
    }
}

/// How the client authenticates once the handshake is done.
pub enum SftpAuth {
    Password(Zeroizing<String>),
    PublicKey(PrivateKeyMaterial),
}

impl SftpAuth {
    pub fn password(password: impl Into<String>) -> Self {
        SftpAuth::Password(Zeroizing::new(password.into()))
    }

    pub fn auth_type(&self) -> AuthType {
        match self {
            SftpAuth::Password(_) => AuthType::Password,
            SftpAuth::PublicKey(_) => AuthType::PublicKey,
        }
    }
}

impl fmt::Debug for SftpAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SftpAuth::Password(_) => f.write_str("Password(****)"),
            SftpAuth::PublicKey(key) => f.debug_tuple("PublicKey").field(key).finish(),
        }
    }
}

/// Entry kind from the permission bits of an SFTP stat.
pub(crate) fn entry_kind_from_stat(stat: &ssh2::FileStat) -> EntryKind {
    match stat.perm.unwrap_or(0) & 0o170000 {
        0o040000 => EntryKind::Directory,
        0o120000 => EntryKind::Symlink,
        0o100000 => EntryKind::File,
        0 if stat.is_dir() => EntryKind::Directory,
        0 if stat.is_file() => EntryKind::File,
        _ => EntryKind::Other,
    }
}

/// Kind and size for a `readdir` entry. `readdir` reports a symlink itself;
/// `target` is the followed `stat`, absent when the link dangles.
pub(crate) fn resolve_entry(lstat: &ssh2::FileStat, target: Option<&ssh2::FileStat>) -> (EntryKind, Option<u64>) {
    let kind = entry_kind_from_stat(lstat);
    if let (EntryKind::Symlink, Some(target)) = (kind, target) {
        match entry_kind_from_stat(target) {
            EntryKind::Directory => return (EntryKind::Directory, None),
            EntryKind::File => return (EntryKind::File, target.size),
            _ => {}
        }
    }
    match kind {
        EntryKind::Directory => (kind, None),
        _ => (kind, lstat.size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(perm: Option<u32>) -> ssh2::FileStat {
        ssh2::FileStat {
            size: Some(10),
            uid: None,
            gid: None,
            perm,
            atime: None,
            mtime: Some(1_700_000_000),
        }
    }

    #[test]
    fn kinds_from_mode_bits() {
        assert_eq!(entry_kind_from_stat(&stat(Some(0o040755))), EntryKind::Directory);
        assert_eq!(entry_kind_from_stat(&stat(Some(0o100644))), EntryKind::File);
        assert_eq!(entry_kind_from_stat(&stat(Some(0o120777))), EntryKind::Symlink);
        assert_eq!(entry_kind_from_stat(&stat(Some(0o010644))), EntryKind::Other);
        assert_eq!(entry_kind_from_stat(&stat(None)), EntryKind::Other);
    }

    #[test]
    fn links_take_the_kind_and_size_of_their_target() {
        let link = stat(Some(0o120777));
        let dir = ssh2::FileStat { size: Some(4096), ..stat(Some(0o040755)) };
        let file = ssh2::FileStat { size: Some(2048), ..stat(Some(0o100644)) };

        assert_eq!(resolve_entry(&link, Some(&dir)), (EntryKind::Directory, None));
        assert_eq!(resolve_entry(&link, Some(&file)), (EntryKind::File, Some(2048)));
        assert_eq!(resolve_entry(&link, None), (EntryKind::Symlink, Some(10)));
        assert_eq!(resolve_entry(&link, Some(&stat(Some(0o010644)))), (EntryKind::Symlink, Some(10)));
        // only links are resolved
        assert_eq!(resolve_entry(&file, Some(&dir)), (EntryKind::File, Some(2048)));
        assert_eq!(resolve_entry(&dir, None), (EntryKind::Directory, None));
    }

    #[test]
    fn settings_defaults_and_overrides() {
        let settings: SftpSettings = serde_json::from_str(r#"{"requireHostKey": false}"#).unwrap();
        assert!(!settings.require_host_key);
        assert_eq!(settings.connect_timeout_secs, 30);
        assert_eq!(settings.io_timeout_ms(), 60_000);
        assert_eq!(SftpSettings::default(), serde_json::from_str("{}").unwrap());
    }

    #[test]
    fn password_auth_is_redacted() {
        let auth = SftpAuth::password("hunter2");
        assert_eq!(auth.auth_type(), AuthType::Password);
        assert!(!format!("{auth:?}").contains("hunter2"));
    }
}
