//! The connection to one SMB share, shared by both SMB client types.

use crate::smb::cli::{quote, AuthFile, SmbCli};
use crate::smb::parser;
use crate::smb::types::{DialectRange, SmbSettings};
use netstore_core::paths;
use netstore_core::{
    ClientType, ConnectionState, EntryKind, NetResult, NetStoreError, Operation, RemoteDownload,
    RemoteEntry, SmbShare,
};
use std::fs::File;
use std::io::{self, Read};
use tempfile::TempPath;
use zeroize::Zeroizing;

pub struct SmbShareClient {
    client_type: ClientType,
    share: SmbShare,
    domain: Option<String>,
    username: String,
    password: Zeroizing<String>,
    cli: SmbCli,
    auth: Option<AuthFile>,
    state: ConnectionState,
}

impl SmbShareClient {
    pub fn new(
        client_type: ClientType,
        dialects: DialectRange,
        share: SmbShare,
        domain: Option<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        settings: &SmbSettings,
    ) -> Self {
        Self {
            client_type,
            share,
            domain,
            username: username.into(),
            password: Zeroizing::new(password.into()),
            cli: SmbCli::new(settings, dialects),
            auth: None,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn client_type(&self) -> ClientType {
        self.client_type
    }

    pub fn share(&self) -> &SmbShare {
        &self.share
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn dialects(&self) -> DialectRange {
        self.cli.dialects()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn connect(&mut self) -> NetResult<()> {
        match self.state {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Closed => {
                return Err(NetStoreError::Closed {
                    target: self.share.to_string(),
                })
            }
            ConnectionState::Disconnected | ConnectionState::Connecting => {}
        }
        self.state = ConnectionState::Connecting;
        let result = AuthFile::create(&self.username, &self.password, self.domain.as_deref())
            .and_then(|auth| {
                self.cli
                    .run(&self.share, &auth, &self.username, "pwd", Operation::Connect, ".")
                    .map(|_| auth)
            });
        match result {
            Ok(auth) => {
                self.auth = Some(auth);
                self.state = ConnectionState::Connected;
                log::info!(
                    "{} connected to {} as '{}' (dialects {}..{})",
                    self.client_type,
                    self.share,
                    self.username,
                    self.cli.dialects().min,
                    self.cli.dialects().max
                );
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Closed;
                log::debug!("{} connect to {} failed: {e}", self.client_type, self.share);
                Err(e)
            }
        }
    }

    pub fn list(&mut self, remote_path: &str) -> NetResult<Vec<RemoteEntry>> {
        let dir = paths::sanitise_list_path(remote_path);
        check_smb_path(&dir)?;
        let smb_path = self.smb_path(&dir, "*");
        let output = self.run(&format!("ls {}", quote(&smb_path)), Operation::List, &dir)?;
        let entries = parser::parse_ls(&output, &dir);
        log::debug!("listed {} entries in {}:{}", entries.len(), self.share, dir);
        Ok(entries)
    }

    pub fn retrieve_for_download(&mut self, remote_path: &str) -> NetResult<RemoteDownload> {
        check_smb_path(remote_path)?;
        let name = paths::file_name_from_full_path(remote_path);
        let parent = paths::parent_path(remote_path);
        let smb_path = self.smb_path(remote_path, "");

        let output = self.run(&format!("ls {}", quote(&smb_path)), Operation::Retrieve, remote_path)?;
        let entry = parser::parse_ls(&output, &parent)
            .into_iter()
            .find(|e| e.name == name)
            .ok_or_else(|| NetStoreError::not_found(Operation::Retrieve, remote_path))?;
        if entry.kind == EntryKind::Directory {
            return Err(NetStoreError::InvalidPath {
                path: remote_path.to_string(),
                reason: "not a regular file",
            });
        }

        let local = tempfile::Builder::new()
            .prefix("netstore-get-")
            .tempfile()?
            .into_temp_path();
        let local_str = local.to_string_lossy().into_owned();
        check_smb_path(&local_str)?;
        let script = format!("get {} {}", quote(&smb_path), quote(&local_str));
        self.run(&script, Operation::Retrieve, remote_path)?;

        let file = File::open(&local)?;
        let size = file.metadata().map(|m| m.len()).ok().or(entry.size);
        log::debug!("spooled {}:{} ({:?} bytes)", self.share, remote_path, size);
        Ok(RemoteDownload::new(
            name,
            remote_path,
            size,
            Box::new(SpooledFile { file, _path: local }),
        ))
    }

    pub fn close(&mut self) {
        if self.state != ConnectionState::Closed {
            log::info!("{} closed connection to {}", self.client_type, self.share);
        }
        self.auth = None;
        self.state = ConnectionState::Closed;
    }

    /// Backslash path inside the share, with the configured base directory
    /// prepended and `leaf` appended when given.
    fn smb_path(&self, path: &str, leaf: &str) -> String {
        let full = paths::canonical_path_to_target(path.trim_start_matches('/'), &self.share.base_path);
        let mut smb = paths::to_smb_path(&full);
        if !leaf.is_empty() {
            if !smb.ends_with('\\') {
                smb.push('\\');
            }
            smb.push_str(leaf);
        }
        smb
    }

    fn run(&mut self, script: &str, op: Operation, path: &str) -> NetResult<String> {
        let auth = match (self.state, self.auth.as_ref()) {
            (ConnectionState::Connected, Some(auth)) => auth,
            (ConnectionState::Closed, _) => {
                return Err(NetStoreError::Closed {
                    target: self.share.to_string(),
                })
            }
            _ => {
                return Err(NetStoreError::NotConnected {
                    target: self.share.to_string(),
                })
            }
        };
        let result = self.cli.run(&self.share, auth, &self.username, script, op, path);
        if let Err(e) = &result {
            if e.is_fatal_to_session() {
                log::warn!("{} session to {} lost: {e}", self.client_type, self.share);
                self.auth = None;
                self.state = ConnectionState::Closed;
            }
        }
        result
    }
}

/// SMB names never hold `"`, and `\` is the SMB separator, so either one
/// in a caller path is an error rather than something to quote.
fn check_smb_path(path: &str) -> NetResult<()> {
    paths::check_relative_path(path)?;
    let reject = |reason: &'static str| NetStoreError::InvalidPath {
        path: path.to_string(),
        reason,
    };
    if path.contains('\\') {
        return Err(reject("use '/' as the path separator"));
    }
    if path.contains('"') {
        return Err(reject("quotes are not allowed in SMB names"));
    }
    Ok(())
}

/// A downloaded file in a temp location, removed when dropped.
struct SpooledFile {
    file: File,
    _path: TempPath,
}

impl Read for SpooledFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netstore_core::ErrorKind;
    use serial_test::serial;

    fn client(base_path: &str) -> SmbShareClient {
        let share = SmbShare {
            host: "test.url".into(),
            port: None,
            share: "testShare".into(),
            base_path: base_path.into(),
        };
        let settings = SmbSettings {
            smbclient_path: "/nonexistent/netstore/smbclient".into(),
            timeout_secs: 1,
        };
        SmbShareClient::new(
            ClientType::Smb2,
            DialectRange::SMB2,
            share,
            Some("WORKGROUP".into()),
            "alice",
            "pw",
            &settings,
        )
    }

    #[test]
    fn smb_paths_include_base() {
        let c = client("");
        assert_eq!(c.smb_path(".", "*"), "\\*");
        assert_eq!(c.smb_path("CSE/test", "*"), "\\CSE\\test\\*");
        assert_eq!(c.smb_path("/CSE/a.txt", ""), "\\CSE\\a.txt");

        let c = client("dept/shared");
        assert_eq!(c.smb_path(".", "*"), "\\dept\\shared\\*");
        assert_eq!(c.smb_path("CSE", ""), "\\dept\\shared\\CSE");
    }

    #[test]
    fn operations_require_connection() {
        let mut c = client("");
        assert_eq!(c.list(".").unwrap_err().kind(), ErrorKind::NotConnected);
        assert_eq!(c.retrieve_for_download("a.txt").unwrap_err().kind(), ErrorKind::NotConnected);
    }

    #[test]
    #[serial]
    fn failed_connect_closes_client() {
        let mut c = client("");
        let err = c.connect().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
        assert_eq!(c.state(), ConnectionState::Closed);
        assert_eq!(c.connect().unwrap_err().kind(), ErrorKind::Closed);
        assert_eq!(c.list(".").unwrap_err().kind(), ErrorKind::Closed);
    }

    #[test]
    fn close_is_repeatable() {
        let mut c = client("");
        c.close();
        c.close();
        assert_eq!(c.state(), ConnectionState::Closed);
    }

    #[test]
    fn traversal_is_rejected_before_running() {
        let mut c = client("");
        assert_eq!(c.list("../x").unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(c.list("a\\..\\b").unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(c.retrieve_for_download("a\"b").unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(c.list("a;b").unwrap_err().kind(), ErrorKind::NotConnected);
    }

    /// Stand-in for smbclient: lists one directory holding `notes;v2.txt`
    /// and `a;b`, and serves `get` by writing five bytes to the local path.
    #[cfg(unix)]
    const FAKE_SMBCLIENT: &str = r#"#!/bin/sh
script=$(cat)
printf 'smb: \\> '
case "$script" in
  get*)
    dest=$(printf '%s' "$script" | sed -n 's/^get ".*" "\(.*\)"$/\1/p')
    printf 'hello' > "$dest"
    ;;
  ls*)
    printf '  .                                   D        0  Mon Jan  8 10:12:01 2024\n'
    printf '  notes;v2.txt                        A        5  Tue Feb 13 09:05:11 2024\n'
    printf '  a;b                                 D        0  Tue Feb 13 09:05:11 2024\n'
    ;;
esac
printf 'smb: \\> '
"#;

    #[cfg(unix)]
    fn scripted_client(dir: &std::path::Path) -> SmbShareClient {
        use std::os::unix::fs::PermissionsExt;

        let program = dir.join("smbclient");
        std::fs::write(&program, FAKE_SMBCLIENT).unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
        let settings = SmbSettings {
            smbclient_path: program.to_string_lossy().into_owned(),
            timeout_secs: 1,
        };
        let share = SmbShare {
            host: "test.url".into(),
            port: None,
            share: "testShare".into(),
            base_path: String::new(),
        };
        SmbShareClient::new(ClientType::Smb2, DialectRange::SMB2, share, None, "alice", "pw", &settings)
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn semicolons_in_names_list_and_download() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = scripted_client(dir.path());
        c.connect().unwrap();

        let entries = c.list("a;b").unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["notes;v2.txt", "a;b"]);
        assert_eq!(entries[0].path, "a;b/notes;v2.txt");

        let mut download = c.retrieve_for_download("notes;v2.txt").unwrap();
        assert_eq!(download.size, Some(5));
        let mut text = String::new();
        download.read_to_string(&mut text).unwrap();
        assert_eq!(text, "hello");
    }
}
