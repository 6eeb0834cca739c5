// ── SFTP client ───────────────────────────────────────────────────────────────

use crate::sftp::types::{entry_kind_from_stat, resolve_entry, SftpAuth, SftpSettings};
use chrono::{TimeZone, Utc};
use netstore_core::options::fingerprint;
use netstore_core::paths;
use netstore_core::{
    AuthType, ClientType, ConnectionState, EntryKind, HostKey, NetFileClient, NetResult,
    NetStoreError, Operation, RemoteDownload, RemoteEntry, SftpEndpoint,
};
use ssh2::{ErrorCode, Session, Sftp};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;

// libssh2 SFTP status codes
const FX_NO_SUCH_FILE: i32 = 2;
const FX_PERMISSION_DENIED: i32 = 3;
const FX_NO_SUCH_PATH: i32 = 10;

pub struct SftpClient {
    endpoint: SftpEndpoint,
    username: String,
    auth: SftpAuth,
    server_key: Option<HostKey>,
    settings: SftpSettings,
    state: ConnectionState,
    session: Option<Session>,
    sftp: Option<Sftp>,
}

impl SftpClient {
    pub fn new(
        endpoint: SftpEndpoint,
        username: impl Into<String>,
        auth: SftpAuth,
        server_key: Option<HostKey>,
        settings: &SftpSettings,
    ) -> Self {
        Self {
            endpoint,
            username: username.into(),
            auth,
            server_key,
            settings: settings.clone(),
            state: ConnectionState::Disconnected,
            session: None,
            sftp: None,
        }
    }

    pub fn port(&self) -> u16 {
        self.endpoint.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn auth_type(&self) -> AuthType {
        self.auth.auth_type()
    }

    /// The host key the server must present, if one is configured.
    pub fn server_key(&self) -> Option<&HostKey> {
        self.server_key.as_ref()
    }

    fn target(&self) -> String {
        self.endpoint.to_string()
    }

    // ── Connect ──────────────────────────────────────────────────────────────

    fn open_session(&self) -> NetResult<(Session, Sftp)> {
        let target = self.target();
        let conn_err = |message: String| NetStoreError::connection(Operation::Connect, target.clone(), message);

        let addr = (self.endpoint.host.as_str(), self.endpoint.port)
            .to_socket_addrs()
            .map_err(|e| conn_err(format!("cannot resolve {}: {e}", self.endpoint.host)))?
            .next()
            .ok_or_else(|| conn_err(format!("no address for {}", self.endpoint.host)))?;
        let tcp = TcpStream::connect_timeout(&addr, self.settings.connect_timeout())
            .map_err(|e| conn_err(format!("TCP connection to {addr} failed: {e}")))?;

        let mut session = Session::new().map_err(|e| conn_err(format!("failed to create SSH session: {e}")))?;
        if self.settings.compress {
            session.set_compress(true);
        }
        session.set_timeout(self.settings.io_timeout_ms());
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| conn_err(format!("SSH handshake failed: {e}")))?;

        self.verify_host_key(&session)?;
        let method = self.authenticate(&session)?;

        let interval = self.settings.keepalive_interval_secs;
        session.set_keepalive(interval > 0, u32::try_from(interval).unwrap_or(u32::MAX));
        let sftp = session
            .sftp()
            .map_err(|e| conn_err(format!("SFTP subsystem unavailable: {e}")))?;
        log::info!("SFTP connected to {} as '{}' via {}", target, self.username, method);
        Ok((session, sftp))
    }

    fn verify_host_key(&self, session: &Session) -> NetResult<()> {
        let (presented, _) = session.host_key().ok_or_else(|| NetStoreError::Protocol {
            target: self.target(),
            message: "server presented no host key".into(),
        })?;
        let presented_fp = fingerprint(presented);
        let reject = |reason: &'static str| NetStoreError::HostKeyRejected {
            target: self.target(),
            fingerprint: presented_fp.clone(),
            reason,
        };
        match &self.server_key {
            Some(expected) if expected.matches(presented) => Ok(()),
            Some(expected) => {
                log::warn!(
                    "host key mismatch for {}: expected {}, got {}",
                    self.target(),
                    expected.fingerprint(),
                    presented_fp
                );
                Err(reject("does not match the configured server public key"))
            }
            None if self.settings.require_host_key => Err(reject("no server public key is configured")),
            None => {
                log::warn!("accepting unverified host key {} for {}", presented_fp, self.target());
                Ok(())
            }
        }
    }

    fn authenticate(&self, session: &Session) -> NetResult<&'static str> {
        let rejected = || NetStoreError::AuthRejected {
            target: self.target(),
            username: self.username.clone(),
        };
        match &self.auth {
            SftpAuth::Password(password) => {
                if session.userauth_password(&self.username, password).is_ok() && session.authenticated() {
                    return Ok("password");
                }

                struct SimpleKbdHandler<'a> {
                    password: &'a str,
                }

                impl ssh2::KeyboardInteractivePrompt for SimpleKbdHandler<'_> {
                    fn prompt(
                        &mut self,
                        _username: &str,
                        _instructions: &str,
                        prompts: &[ssh2::Prompt],
                    ) -> Vec<String> {
                        prompts.iter().map(|_| self.password.to_string()).collect()
                    }
                }

                let mut handler = SimpleKbdHandler { password };
                if session
                    .userauth_keyboard_interactive(&self.username, &mut handler)
                    .is_ok()
                    && session.authenticated()
                {
                    return Ok("keyboard-interactive");
                }
                Err(rejected())
            }
            SftpAuth::PublicKey(key) => {
                match session.userauth_pubkey_memory(&self.username, key.public_key(), key.pem(), key.passphrase()) {
                    Ok(()) if session.authenticated() => Ok("publickey"),
                    Ok(()) => Err(rejected()),
                    Err(e) => {
                        log::debug!("{} public-key auth failed: {e}", self.target());
                        Err(rejected())
                    }
                }
            }
        }
    }

    // ── Operations ───────────────────────────────────────────────────────────

    fn channel(&self) -> NetResult<&Sftp> {
        match (self.state, self.sftp.as_ref()) {
            (ConnectionState::Connected, Some(sftp)) => Ok(sftp),
            (ConnectionState::Closed, _) => Err(NetStoreError::Closed { target: self.target() }),
            _ => Err(NetStoreError::NotConnected { target: self.target() }),
        }
    }

    /// Map an ssh2 failure. Session-level failures leave the client closed.
    fn fail(&mut self, error: ssh2::Error, op: Operation, path: &str) -> NetStoreError {
        match error.code() {
            ErrorCode::SFTP(FX_NO_SUCH_FILE) | ErrorCode::SFTP(FX_NO_SUCH_PATH) => NetStoreError::not_found(op, path),
            ErrorCode::SFTP(FX_PERMISSION_DENIED) => NetStoreError::permission_denied(op, path),
            ErrorCode::SFTP(code) => NetStoreError::Protocol {
                target: self.target(),
                message: format!("{op} '{path}': SFTP status {code}: {}", error.message()),
            },
            ErrorCode::Session(code) => {
                log::warn!("SFTP session to {} lost during {op} (code {code}): {}", self.target(), error.message());
                self.close();
                NetStoreError::connection(op, self.target(), error.message().to_string())
            }
        }
    }
}

impl NetFileClient for SftpClient {
    fn client_type(&self) -> ClientType {
        ClientType::Sftp
    }

    fn host(&self) -> &str {
        &self.endpoint.host
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn connect(&mut self) -> NetResult<()> {
        match self.state {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Closed => return Err(NetStoreError::Closed { target: self.target() }),
            ConnectionState::Disconnected | ConnectionState::Connecting => {}
        }
        self.state = ConnectionState::Connecting;
        match self.open_session() {
            Ok((session, sftp)) => {
                self.session = Some(session);
                self.sftp = Some(sftp);
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                log::debug!("SFTP connect to {} failed: {e}", self.target());
                self.state = ConnectionState::Closed;
                Err(e)
            }
        }
    }

    fn list(&mut self, remote_path: &str) -> NetResult<Vec<RemoteEntry>> {
        let dir = paths::sanitise_list_path(remote_path);
        paths::check_relative_path(&dir)?;
        let result = self.channel()?.readdir(Path::new(&dir));
        let raw = result.map_err(|e| self.fail(e, Operation::List, &dir))?;
        let sftp = self.channel()?;

        let entries: Vec<RemoteEntry> = raw
            .into_iter()
            .filter_map(|(entry_path, stat)| {
                let name = entry_path.file_name()?.to_string_lossy().into_owned();
                if name == "." || name == ".." {
                    return None;
                }
                let target = match entry_kind_from_stat(&stat) {
                    EntryKind::Symlink => match sftp.stat(&entry_path) {
                        Ok(target) => Some(target),
                        Err(e) => {
                            log::debug!("cannot follow link {}: {e}", entry_path.display());
                            None
                        }
                    },
                    _ => None,
                };
                let (kind, size) = resolve_entry(&stat, target.as_ref());
                Some(RemoteEntry {
                    path: paths::canonical_path_to_target(&name, &dir),
                    name,
                    kind,
                    size,
                    modified: stat
                        .mtime
                        .and_then(|t| Utc.timestamp_opt(t as i64, 0).single()),
                })
            })
            .collect();
        log::debug!("listed {} entries in {}:{}", entries.len(), self.target(), dir);
        Ok(entries)
    }

    fn retrieve_for_download(&mut self, remote_path: &str) -> NetResult<RemoteDownload> {
        paths::check_relative_path(remote_path)?;
        let path = Path::new(remote_path);

        let stat = self.channel()?.stat(path);
        let stat = stat.map_err(|e| self.fail(e, Operation::Retrieve, remote_path))?;
        if stat.is_dir() {
            return Err(NetStoreError::InvalidPath {
                path: remote_path.to_string(),
                reason: "not a regular file",
            });
        }
        let file = self.channel()?.open(path);
        let file = file.map_err(|e| self.fail(e, Operation::Retrieve, remote_path))?;

        log::debug!("opened {}:{} ({:?} bytes)", self.target(), remote_path, stat.size);
        Ok(RemoteDownload::new(
            paths::file_name_from_full_path(remote_path),
            remote_path,
            stat.size,
            Box::new(file),
        ))
    }

    fn close(&mut self) {
        self.sftp = None;
        if let Some(session) = self.session.take() {
            if let Err(e) = session.disconnect(None, "closing", None) {
                log::warn!("SFTP disconnect from {} failed: {e}", self.target());
            }
            log::info!("SFTP closed connection to {}", self.target());
        }
        self.state = ConnectionState::Closed;
    }
}

impl Drop for SftpClient {
    fn drop(&mut self) {
        if self.session.is_some() {
            self.close();
        }
    }
}
