//! Invocation of the `smbclient` tool.
//!
//! Secrets never appear on the command line: they are written to a
//! temporary auth file (created with mode 0600) that lives as long as the
//! connection and is removed when it is dropped.
//!
//! Commands go to smbclient's stdin, one per line. `-c` would split the
//! script on every `;`, quoted or not.

use crate::smb::parser::{self, StatusClass};
use crate::smb::types::{DialectRange, SmbSettings};
use netstore_core::{NetResult, NetStoreError, Operation, SmbShare};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;
use zeroize::Zeroizing;

/// `smbclient -A` credentials file.
pub struct AuthFile {
    file: NamedTempFile,
}

impl AuthFile {
    pub fn create(username: &str, password: &str, domain: Option<&str>) -> NetResult<Self> {
        if [username, password, domain.unwrap_or_default()]
            .iter()
            .any(|v| v.contains(['\n', '\r']))
        {
            return Err(NetStoreError::invalid_option(
                "credentials",
                "user name, password and domain must be single-line values",
            ));
        }
        let mut contents = Zeroizing::new(format!("username = {username}\npassword = {password}\n"));
        if let Some(domain) = domain {
            contents.push_str(&format!("domain = {domain}\n"));
        }
        let mut file = tempfile::Builder::new().prefix("netstore-smb-").tempfile()?;
        file.write_all(contents.as_bytes())?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// One `smbclient` program plus the flags every call shares.
#[derive(Debug, Clone)]
pub struct SmbCli {
    program: String,
    timeout_secs: u64,
    dialects: DialectRange,
}

impl SmbCli {
    pub fn new(settings: &SmbSettings, dialects: DialectRange) -> Self {
        Self {
            program: settings.smbclient_path.clone(),
            timeout_secs: settings.timeout_secs,
            dialects,
        }
    }

    pub fn dialects(&self) -> DialectRange {
        self.dialects
    }

    fn command(&self, share: &SmbShare, auth: &AuthFile) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(share.service())
            .arg("-A")
            .arg(auth.path())
            .arg("-t")
            .arg(self.timeout_secs.to_string())
            .arg("-m")
            .arg(self.dialects.max.as_str())
            .arg(format!("--option=client min protocol={}", self.dialects.min))
            .arg(format!("--option=client max protocol={}", self.dialects.max));
        if let Some(port) = share.port {
            cmd.arg("-p").arg(port.to_string());
        }
        cmd.env("LC_ALL", "C")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Run `script` against `share` and return stdout. `path` is the remote
    /// path the script touches, used for error context.
    pub fn run(
        &self,
        share: &SmbShare,
        auth: &AuthFile,
        username: &str,
        script: &str,
        op: Operation,
        path: &str,
    ) -> NetResult<String> {
        log::debug!("smbclient {} <<< '{}'", share.service(), script);
        let spawn_err = |e: std::io::Error| {
            NetStoreError::connection(op, share.to_string(), format!("could not run '{}': {e}", self.program))
        };
        let mut child = self.command(share, auth).spawn().map_err(&spawn_err)?;
        if let Some(mut stdin) = child.stdin.take() {
            // a client that exits early closes the pipe; its output says why
            if let Err(e) = stdin.write_all(format!("{script}\n").as_bytes()) {
                log::debug!("smbclient stdin closed early: {e}");
            }
        }
        let output = child.wait_with_output().map_err(&spawn_err)?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);

        let status = parser::nt_status(&stdout).or_else(|| parser::nt_status(&stderr));
        if let Some(status) = status {
            return Err(status_error(status, share, username, op, path));
        }
        if !output.status.success() {
            let detail = stderr
                .lines()
                .chain(stdout.lines())
                .map(|l| parser::strip_prompt(l).trim())
                .rfind(|l| !l.is_empty())
                .unwrap_or("smbclient exited with an error")
                .to_string();
            return Err(NetStoreError::connection(op, share.to_string(), detail));
        }
        Ok(stdout)
    }
}

fn status_error(status: &str, share: &SmbShare, username: &str, op: Operation, path: &str) -> NetStoreError {
    match parser::classify_status(status) {
        StatusClass::AuthRejected => NetStoreError::AuthRejected {
            target: share.to_string(),
            username: username.to_string(),
        },
        StatusClass::NotFound => NetStoreError::not_found(op, path),
        StatusClass::PermissionDenied => NetStoreError::permission_denied(op, path),
        StatusClass::Connectivity => NetStoreError::connection(op, share.to_string(), status),
        StatusClass::NotADirectory => NetStoreError::InvalidPath {
            path: path.to_string(),
            reason: "not a directory",
        },
        StatusClass::Protocol => NetStoreError::Protocol {
            target: share.to_string(),
            message: status.to_string(),
        },
    }
}

/// Quote a path for a script line. Callers reject paths holding `"`.
pub fn quote(path: &str) -> String {
    format!("\"{path}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use netstore_core::ErrorKind;
    use serial_test::serial;

    fn share() -> SmbShare {
        SmbShare {
            host: "test.url".into(),
            port: Some(1445),
            share: "testShare".into(),
            base_path: String::new(),
        }
    }

    #[test]
    fn auth_file_holds_credentials() {
        let auth = AuthFile::create("alice", "s3cret", Some("WORKGROUP")).unwrap();
        let text = std::fs::read_to_string(auth.path()).unwrap();
        assert_eq!(text, "username = alice\npassword = s3cret\ndomain = WORKGROUP\n");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(auth.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o077, 0);
        }
        let path = auth.path().to_path_buf();
        drop(auth);
        assert!(!path.exists());
    }

    #[test]
    fn auth_file_rejects_multiline_values() {
        assert!(AuthFile::create("alice", "pw\ndomain = EVIL", None).is_err());
    }

    #[test]
    fn command_carries_dialects_and_port() {
        let cli = SmbCli::new(&SmbSettings::default(), DialectRange::CIFS);
        let auth = AuthFile::create("alice", "pw", None).unwrap();
        let cmd = cli.command(&share(), &auth);
        let args: Vec<String> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args[0], "//test.url/testShare");
        assert!(args.contains(&"--option=client min protocol=NT1".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-p" && w[1] == "1445"));
        assert!(!args.iter().any(|a| a == "-c"));
        assert!(!args.iter().any(|a| a.contains("pw\n") || a == "pw"));
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn script_is_sent_on_stdin_verbatim() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("smbclient");
        std::fs::write(&program, "#!/bin/sh\ncat\n").unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        let settings = SmbSettings {
            smbclient_path: program.to_string_lossy().into_owned(),
            timeout_secs: 1,
        };
        let cli = SmbCli::new(&settings, DialectRange::SMB2);
        let auth = AuthFile::create("alice", "pw", None).unwrap();
        let script = format!("ls {}", quote("\\docs\\notes;v2.txt"));
        let out = cli
            .run(&share(), &auth, "alice", &script, Operation::List, "docs")
            .unwrap();
        assert_eq!(out, "ls \"\\docs\\notes;v2.txt\"\n");
    }

    #[test]
    #[serial]
    fn missing_program_is_a_connectivity_error() {
        let settings = SmbSettings {
            smbclient_path: "/nonexistent/netstore/smbclient".into(),
            timeout_secs: 1,
        };
        let cli = SmbCli::new(&settings, DialectRange::SMB2);
        let auth = AuthFile::create("alice", "pw", None).unwrap();
        let err = cli
            .run(&share(), &auth, "alice", "pwd", Operation::Connect, ".")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        let s = share();
        let kind = |status| status_error(status, &s, "alice", Operation::List, "x").kind();
        assert_eq!(kind("NT_STATUS_LOGON_FAILURE"), ErrorKind::AuthRejected);
        assert_eq!(kind("NT_STATUS_OBJECT_PATH_NOT_FOUND"), ErrorKind::NotFound);
        assert_eq!(kind("NT_STATUS_ACCESS_DENIED"), ErrorKind::PermissionDenied);
        assert_eq!(kind("NT_STATUS_CONNECTION_REFUSED"), ErrorKind::Connectivity);
        assert_eq!(kind("NT_STATUS_NOT_SUPPORTED"), ErrorKind::Protocol);
    }
}
