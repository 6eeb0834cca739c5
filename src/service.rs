//! The facade callers browse and download through.
//!
//! Every call is addressed by (user, file store). Sessions are created on
//! first use and kept per key; each sits behind its own mutex so one user's
//! slow server never blocks another user.

use crate::config::NetStoreConfig;
use crate::factory::{ClientConnector, ClientFactory};
use crate::repository::{CredentialProvider, FileStoreRepository};
use crate::session::{ClientSession, SessionKey};
use netstore_core::diagnostics::{self, DiagnosticReport};
use netstore_core::tree::split_logic_path;
use netstore_core::{
    FileStoreId, FileSystemId, NetResult, NetStoreError, RemoteDownload, RemoteEntry, RemoteTreeNode,
    TreeBounds,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const DEFAULT_DIAGNOSTIC_TIMEOUT: Duration = Duration::from_secs(5);

type SessionHandle = Arc<Mutex<ClientSession>>;

pub struct NetStoreService {
    repository: Arc<dyn FileStoreRepository>,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn ClientConnector>,
    bounds: TreeBounds,
    diagnostic_timeout: Duration,
    sessions: Mutex<HashMap<SessionKey, SessionHandle>>,
}

impl NetStoreService {
    pub fn new(
        repository: Arc<dyn FileStoreRepository>,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn ClientConnector>,
    ) -> Self {
        Self {
            repository,
            credentials,
            connector,
            bounds: TreeBounds::default(),
            diagnostic_timeout: DEFAULT_DIAGNOSTIC_TIMEOUT,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Service over the records in `config`, connecting through a
    /// [`ClientFactory`] built from its client settings.
    pub fn from_config(config: &NetStoreConfig, credentials: Arc<dyn CredentialProvider>) -> NetResult<Self> {
        let repository = Arc::new(config.repository()?);
        let connector = Arc::new(ClientFactory::new(config.clients.clone()));
        Ok(Self::new(repository, credentials, connector).with_bounds(config.tree.clone()))
    }

    /// Bounds used by [`browse`](Self::browse).
    pub fn with_bounds(mut self, bounds: TreeBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_diagnostic_timeout(mut self, timeout: Duration) -> Self {
        self.diagnostic_timeout = timeout;
        self
    }

    pub fn bounds(&self) -> &TreeBounds {
        &self.bounds
    }

    pub fn repository(&self) -> &Arc<dyn FileStoreRepository> {
        &self.repository
    }

    // ── Browsing ─────────────────────────────────────────────────────────

    /// Tree under `relative_path` of the store, bounded by the service's
    /// default bounds.
    pub fn browse(&self, user: &str, file_store_id: FileStoreId, relative_path: &str) -> NetResult<RemoteTreeNode> {
        self.tree(user, file_store_id, relative_path, &self.bounds)
    }

    pub fn tree(
        &self,
        user: &str,
        file_store_id: FileStoreId,
        relative_path: &str,
        bounds: &TreeBounds,
    ) -> NetResult<RemoteTreeNode> {
        let _span = tracing::info_span!("browse", %user, file_store_id, path = %relative_path).entered();
        let handle = self.session(user, file_store_id)?;
        let tree = lock(&handle).browse(self.connector.as_ref(), relative_path, bounds)?;
        tracing::debug!(nodes = tree.node_count(), truncated = tree.truncated, "tree built");
        Ok(tree)
    }

    pub fn list(&self, user: &str, file_store_id: FileStoreId, relative_path: &str) -> NetResult<Vec<RemoteEntry>> {
        let _span = tracing::info_span!("list", %user, file_store_id, path = %relative_path).entered();
        let handle = self.session(user, file_store_id)?;
        let entries = lock(&handle).list(self.connector.as_ref(), relative_path)?;
        Ok(entries)
    }

    // ── Downloads ────────────────────────────────────────────────────────

    pub fn download(&self, user: &str, file_store_id: FileStoreId, relative_path: &str) -> NetResult<RemoteDownload> {
        let _span = tracing::info_span!("download", %user, file_store_id, path = %relative_path).entered();
        let handle = self.session(user, file_store_id)?;
        let download = lock(&handle).download(self.connector.as_ref(), relative_path)?;
        tracing::info!(name = %download.name, size = ?download.size, "download ready");
        Ok(download)
    }

    /// Download by the logical path a tree node carries.
    pub fn download_logic_path(&self, user: &str, logic_path: &str) -> NetResult<RemoteDownload> {
        let (file_store_id, relative) = split_logic_path(logic_path)?;
        self.download(user, file_store_id, relative)
    }

    // ── Checks ───────────────────────────────────────────────────────────

    /// Connect and list the store root; returns the number of root entries.
    pub fn verify(&self, user: &str, file_store_id: FileStoreId) -> NetResult<usize> {
        let _span = tracing::info_span!("verify", %user, file_store_id).entered();
        let handle = self.session(user, file_store_id)?;
        let count = lock(&handle).verify(self.connector.as_ref())?;
        tracing::info!(entries = count, "file store reachable");
        Ok(count)
    }

    /// Reachability probes against a file system's server. No credentials
    /// are used.
    pub fn diagnose(&self, file_system_id: FileSystemId) -> NetResult<DiagnosticReport> {
        let _span = tracing::info_span!("diagnose", file_system_id).entered();
        let config = self.repository.file_system(file_system_id)?.validate()?;
        let report = diagnostics::diagnose(&config, self.diagnostic_timeout);
        tracing::info!(reachable = report.reachable(), summary = %report.summary, "diagnosis finished");
        Ok(report)
    }

    // ── Session lifecycle ────────────────────────────────────────────────

    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }

    /// Close and forget every session of `user`. Returns how many there were.
    pub fn close_user_sessions(&self, user: &str) -> usize {
        let removed = self.take_user_sessions(user);
        for handle in &removed {
            lock(handle).close();
        }
        if !removed.is_empty() {
            tracing::info!(%user, sessions = removed.len(), "closed user sessions");
        }
        removed.len()
    }

    /// Remove `user`'s sessions for user-session storage. Live clients are
    /// closed; the returned sessions reconnect once attached again.
    pub fn detach_user_sessions(&self, user: &str) -> Vec<ClientSession> {
        self.take_user_sessions(user)
            .iter()
            .map(|handle| {
                let mut session = lock(handle);
                session.close();
                session.snapshot()
            })
            .collect()
    }

    /// Put back a session previously detached. The store must still exist
    /// and belong to the session's user; an existing session for the same
    /// key is closed and replaced.
    pub fn attach_session(&self, session: ClientSession) -> NetResult<()> {
        let store = self.repository.file_store(session.file_store().id)?;
        if store.owner != session.user() {
            return Err(NetStoreError::UnknownFileStore(store.id));
        }
        let key = session.key();
        let previous = self
            .sessions()
            .insert(key, Arc::new(Mutex::new(session)));
        if let Some(previous) = previous {
            lock(&previous).close();
        }
        Ok(())
    }

    fn take_user_sessions(&self, user: &str) -> Vec<SessionHandle> {
        let mut sessions = self.sessions();
        let keys: Vec<SessionKey> = sessions.keys().filter(|k| k.user == user).cloned().collect();
        keys.iter().filter_map(|k| sessions.remove(k)).collect()
    }

    fn session(&self, user: &str, file_store_id: FileStoreId) -> NetResult<SessionHandle> {
        let key = SessionKey::new(user, file_store_id);
        if let Some(handle) = self.sessions().get(&key) {
            return Ok(Arc::clone(handle));
        }

        let store = self.repository.file_store(file_store_id)?;
        if store.owner != user {
            return Err(NetStoreError::UnknownFileStore(file_store_id));
        }
        let file_system = self.repository.file_system(store.file_system_id)?;
        let credentials = self.credentials.credentials(user, &file_system)?;
        let session = ClientSession::new(user, store, file_system, credentials)?;
        tracing::debug!(session = %session.id(), "new session");

        let handle = self
            .sessions()
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(session)))
            .clone();
        Ok(handle)
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionKey, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for NetStoreService {
    fn drop(&mut self) {
        for handle in self.sessions().values() {
            lock(handle).close();
        }
    }
}

fn lock(handle: &SessionHandle) -> MutexGuard<'_, ClientSession> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}
