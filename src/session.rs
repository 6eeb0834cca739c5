//! One user's connection to one file store.
//!
//! The session owns everything needed to rebuild its client: the store,
//! the file system record and the credentials. The live client itself is
//! never serialised, so a session restored from user-session storage (or
//! one whose client was closed by a fatal error) reconnects on next use.

use crate::factory::ClientConnector;
use chrono::{DateTime, Utc};
use netstore_core::paths;
use netstore_core::{
    ConnectionState, Credentials, FileStore, FileStoreId, NetFileClient, NetResult, NetStoreError,
    Operation, RemoteDownload, RemoteEntry, RemoteFileSystem, RemoteTreeNode, TreeBounds,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Sessions are never shared between users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKey {
    pub user: String,
    pub file_store_id: FileStoreId,
}

impl SessionKey {
    pub fn new(user: impl Into<String>, file_store_id: FileStoreId) -> Self {
        Self {
            user: user.into(),
            file_store_id,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSession {
    id: Uuid,
    user: String,
    file_store: FileStore,
    file_system: RemoteFileSystem,
    credentials: Credentials,
    created_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
    /// Clients created over the session's lifetime.
    #[serde(default)]
    connects: u32,
    #[serde(skip)]
    client: Option<Box<dyn NetFileClient>>,
}

impl ClientSession {
    pub fn new(
        user: impl Into<String>,
        file_store: FileStore,
        file_system: RemoteFileSystem,
        credentials: Credentials,
    ) -> NetResult<Self> {
        let user = user.into();
        // Someone else's store is reported as unknown.
        if file_store.owner != user {
            return Err(NetStoreError::UnknownFileStore(file_store.id));
        }
        if file_store.file_system_id != file_system.id {
            return Err(NetStoreError::UnknownFileSystem(file_store.file_system_id));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user,
            file_store,
            file_system,
            credentials,
            created_at: now,
            last_used: now,
            connects: 0,
            client: None,
        })
    }

    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.user.clone(), self.file_store.id)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn file_store(&self) -> &FileStore {
        &self.file_store
    }

    pub fn file_system(&self) -> &RemoteFileSystem {
        &self.file_system
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_used(&self) -> DateTime<Utc> {
        self.last_used
    }

    /// Times a replacement client had to be created.
    pub fn reconnects(&self) -> u32 {
        self.connects.saturating_sub(1)
    }

    pub fn state(&self) -> ConnectionState {
        self.client
            .as_ref()
            .map(|c| c.state())
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// A connected client, created or replaced as needed.
    fn connected_client(&mut self, connector: &dyn ClientConnector) -> NetResult<&mut dyn NetFileClient> {
        let stale = self
            .client
            .as_ref()
            .map_or(true, |c| c.state() == ConnectionState::Closed);
        if stale {
            if self.client.take().is_some() {
                log::info!(
                    "session {} for '{}' on file store {} reconnecting",
                    self.id,
                    self.user,
                    self.file_store.id
                );
            }
            let client = connector.client_for(&self.credentials, &self.file_system)?;
            self.client = Some(client);
            self.connects += 1;
        }
        let target = self.file_system.url.clone();
        let client = self
            .client
            .as_mut()
            .ok_or(NetStoreError::NotConnected { target })?;
        client.connect()?;
        self.last_used = Utc::now();
        Ok(client.as_mut())
    }

    /// Run `f` against a connected client, tagging any error with this
    /// session's file store.
    pub fn with_client<T>(
        &mut self,
        connector: &dyn ClientConnector,
        op: Operation,
        relative_path: &str,
        f: impl FnOnce(&mut dyn NetFileClient) -> NetResult<T>,
    ) -> NetResult<T> {
        let store_id = self.file_store.id;
        self.connected_client(connector)
            .and_then(f)
            .map_err(|e| e.in_file_store(store_id, op, relative_path))
    }

    /// Resolve a store-relative path, rejecting traversal.
    fn remote_path(&self, op: Operation, relative_path: &str) -> NetResult<String> {
        paths::join_store_path(&self.file_store.path, relative_path)
            .map_err(|e| e.in_file_store(self.file_store.id, op, relative_path))
    }

    pub fn list(&mut self, connector: &dyn ClientConnector, relative_path: &str) -> NetResult<Vec<RemoteEntry>> {
        let remote = self.remote_path(Operation::List, relative_path)?;
        self.with_client(connector, Operation::List, relative_path, |c| c.list(&remote))
    }

    pub fn browse(
        &mut self,
        connector: &dyn ClientConnector,
        relative_path: &str,
        bounds: &TreeBounds,
    ) -> NetResult<RemoteTreeNode> {
        let remote = self.remote_path(Operation::BuildTree, relative_path)?;
        let store = self.file_store.clone();
        self.with_client(connector, Operation::BuildTree, relative_path, |c| {
            c.build_tree(&remote, &store, bounds)
        })
    }

    pub fn download(&mut self, connector: &dyn ClientConnector, relative_path: &str) -> NetResult<RemoteDownload> {
        let remote = self.remote_path(Operation::Retrieve, relative_path)?;
        self.with_client(connector, Operation::Retrieve, relative_path, |c| {
            c.retrieve_for_download(&remote)
        })
    }

    /// Connect and list the store root. Returns the number of entries.
    pub fn verify(&mut self, connector: &dyn ClientConnector) -> NetResult<usize> {
        self.list(connector, "").map(|entries| entries.len())
    }

    /// Swap credentials; the current client is closed and rebuilt on next use.
    pub fn update_credentials(&mut self, credentials: Credentials) {
        self.credentials = credentials;
        self.close();
    }

    /// Close and drop the live client. The session itself stays usable.
    pub fn close(&mut self) {
        if let Some(mut client) = self.client.take() {
            client.close();
            log::debug!("session {} closed its {} client", self.id, client.client_type());
        }
    }

    /// A copy without the live client, for user-session storage.
    pub fn snapshot(&self) -> ClientSession {
        ClientSession {
            id: self.id,
            user: self.user.clone(),
            file_store: self.file_store.clone(),
            file_system: self.file_system.clone(),
            credentials: self.credentials.clone(),
            created_at: self.created_at,
            last_used: self.last_used,
            connects: self.connects,
            client: None,
        }
    }
}

impl fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("user", &self.user)
            .field("file_store", &self.file_store.id)
            .field("file_system", &self.file_system.id)
            .field("credentials", &self.credentials)
            .field("state", &self.state())
            .field("connects", &self.connects)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netstore_core::{AuthType, ClientType, ErrorKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RefusingConnector {
        calls: AtomicUsize,
    }

    impl ClientConnector for RefusingConnector {
        fn client_for(&self, _: &Credentials, fs: &RemoteFileSystem) -> NetResult<Box<dyn NetFileClient>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(NetStoreError::connection(Operation::Connect, fs.url.clone(), "refused"))
        }
    }

    fn session() -> ClientSession {
        let fs = RemoteFileSystem::new(1, "nas", "smb://nas01/research")
            .with_client_type(ClientType::Cifs)
            .with_auth_type(AuthType::Password);
        ClientSession::new(
            "alice",
            FileStore::new(7, "alice", "CSE", 1),
            fs,
            Credentials::password("alice", "pw"),
        )
        .unwrap()
    }

    #[test]
    fn new_checks_owner_and_file_system() {
        let fs = RemoteFileSystem::new(1, "nas", "smb://nas01/research");
        let err = ClientSession::new(
            "bob",
            FileStore::new(7, "alice", "CSE", 1),
            fs.clone(),
            Credentials::password("bob", "pw"),
        )
        .unwrap_err();
        assert!(matches!(err, NetStoreError::UnknownFileStore(7)));

        let err = ClientSession::new(
            "alice",
            FileStore::new(7, "alice", "CSE", 2),
            fs,
            Credentials::password("alice", "pw"),
        )
        .unwrap_err();
        assert!(matches!(err, NetStoreError::UnknownFileSystem(2)));
    }

    #[test]
    fn traversal_is_rejected_without_connecting() {
        let connector = RefusingConnector { calls: AtomicUsize::new(0) };
        let mut s = session();
        let err = s.list(&connector, "../etc").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(matches!(err, NetStoreError::FileStore { file_store_id: 7, .. }));
        assert_eq!(connector.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn connector_errors_are_tagged_with_the_store() {
        let connector = RefusingConnector { calls: AtomicUsize::new(0) };
        let mut s = session();
        let err = s.download(&connector, "a.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
        assert!(err.to_string().contains("file store 7"));
        assert_eq!(s.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn serialises_without_client_and_redacts_debug() {
        let s = session();
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("\"client\""));
        let back: ClientSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), s.id());
        assert_eq!(back.key(), SessionKey::new("alice", 7));
        assert!(!format!("{back:?}").contains("\"pw\""));
    }

    #[test]
    fn close_is_repeatable() {
        let mut s = session();
        s.close();
        s.close();
        assert!(!s.is_connected());
        assert_eq!(s.reconnects(), 0);
    }
}
