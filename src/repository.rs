//! Collaborators the service reads records and credentials from.
//!
//! Persistence lives outside this layer. The in-memory implementations back
//! the tests and file-configured deployments.

use netstore_core::{
    Credentials, FileStore, FileStoreId, FileSystemId, NetResult, NetStoreError, RemoteFileSystem,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

/// Lookup and storage of file systems and the file stores mounted on them.
pub trait FileStoreRepository: Send + Sync {
    fn file_store(&self, id: FileStoreId) -> NetResult<FileStore>;

    fn file_system(&self, id: FileSystemId) -> NetResult<RemoteFileSystem>;

    /// Every file store `owner` has mounted, ordered by id.
    fn file_stores_for_user(&self, owner: &str) -> NetResult<Vec<FileStore>>;

    /// Validates the record before storing it.
    fn save_file_system(&self, file_system: RemoteFileSystem) -> NetResult<()>;

    /// The referenced file system must already exist.
    fn save_file_store(&self, file_store: FileStore) -> NetResult<()>;

    fn remove_file_store(&self, id: FileStoreId) -> NetResult<Option<FileStore>>;
}

/// Supplies the credentials `user` presents to a file system.
pub trait CredentialProvider: Send + Sync {
    fn credentials(&self, user: &str, file_system: &RemoteFileSystem) -> NetResult<Credentials>;
}

// ── In-memory repository ─────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Records {
    file_systems: BTreeMap<FileSystemId, RemoteFileSystem>,
    file_stores: BTreeMap<FileStoreId, FileStore>,
}

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    records: RwLock<Records>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load records in bulk, validating each file system and store reference.
    pub fn from_records(
        file_systems: impl IntoIterator<Item = RemoteFileSystem>,
        file_stores: impl IntoIterator<Item = FileStore>,
    ) -> NetResult<Self> {
        let repo = Self::new();
        for fs in file_systems {
            repo.save_file_system(fs)?;
        }
        for store in file_stores {
            repo.save_file_store(store)?;
        }
        Ok(repo)
    }

    pub fn file_system_count(&self) -> usize {
        self.read(|r| r.file_systems.len())
    }

    pub fn file_store_count(&self) -> usize {
        self.read(|r| r.file_stores.len())
    }

    fn read<T>(&self, f: impl FnOnce(&Records) -> T) -> T {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        f(&records)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Records) -> T) -> T {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut records)
    }
}

impl FileStoreRepository for InMemoryRepository {
    fn file_store(&self, id: FileStoreId) -> NetResult<FileStore> {
        self.read(|r| r.file_stores.get(&id).cloned())
            .ok_or(NetStoreError::UnknownFileStore(id))
    }

    fn file_system(&self, id: FileSystemId) -> NetResult<RemoteFileSystem> {
        self.read(|r| r.file_systems.get(&id).cloned())
            .ok_or(NetStoreError::UnknownFileSystem(id))
    }

    fn file_stores_for_user(&self, owner: &str) -> NetResult<Vec<FileStore>> {
        Ok(self.read(|r| {
            r.file_stores
                .values()
                .filter(|s| s.owner == owner)
                .cloned()
                .collect()
        }))
    }

    fn save_file_system(&self, file_system: RemoteFileSystem) -> NetResult<()> {
        file_system.validate()?;
        log::debug!("saving file system {} ('{}')", file_system.id, file_system.name);
        self.write(|r| r.file_systems.insert(file_system.id, file_system));
        Ok(())
    }

    fn save_file_store(&self, file_store: FileStore) -> NetResult<()> {
        self.write(|r| {
            if !r.file_systems.contains_key(&file_store.file_system_id) {
                return Err(NetStoreError::UnknownFileSystem(file_store.file_system_id));
            }
            r.file_stores.insert(file_store.id, file_store);
            Ok(())
        })
    }

    fn remove_file_store(&self, id: FileStoreId) -> NetResult<Option<FileStore>> {
        Ok(self.write(|r| r.file_stores.remove(&id)))
    }
}

// ── Static credentials ───────────────────────────────────────────────────────

/// Credentials registered up front per (user, file system).
#[derive(Debug, Default)]
pub struct StaticCredentials {
    entries: RwLock<HashMap<(String, FileSystemId), Credentials>>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: impl Into<String>, file_system_id: FileSystemId, credentials: Credentials) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((user.into(), file_system_id), credentials);
    }

    pub fn with(self, user: impl Into<String>, file_system_id: FileSystemId, credentials: Credentials) -> Self {
        self.insert(user, file_system_id, credentials);
        self
    }

    pub fn remove(&self, user: &str, file_system_id: FileSystemId) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(user.to_string(), file_system_id))
            .is_some()
    }
}

impl CredentialProvider for StaticCredentials {
    fn credentials(&self, user: &str, file_system: &RemoteFileSystem) -> NetResult<Credentials> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(user.to_string(), file_system.id))
            .cloned()
            .ok_or_else(|| NetStoreError::MissingCredentials {
                user: user.to_string(),
                file_system_id: file_system.id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netstore_core::{AuthType, ClientType, ErrorKind};

    fn smb() -> RemoteFileSystem {
        RemoteFileSystem::new(1, "nas", "smb://nas01/research")
            .with_client_type(ClientType::Cifs)
            .with_auth_type(AuthType::Password)
    }

    #[test]
    fn invalid_file_system_is_not_saved() {
        let repo = InMemoryRepository::new();
        let err = repo.save_file_system(RemoteFileSystem::new(2, "broken", "")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(repo.file_system_count(), 0);
    }

    #[test]
    fn stores_need_their_file_system() {
        let repo = InMemoryRepository::new();
        let err = repo.save_file_store(FileStore::new(1, "alice", "CSE", 1)).unwrap_err();
        assert!(matches!(err, NetStoreError::UnknownFileSystem(1)));

        repo.save_file_system(smb()).unwrap();
        repo.save_file_store(FileStore::new(1, "alice", "CSE", 1)).unwrap();
        assert_eq!(repo.file_store(1).unwrap().path, "CSE");
    }

    #[test]
    fn stores_by_owner() {
        let repo = InMemoryRepository::from_records(
            [smb()],
            [
                FileStore::new(3, "alice", "a", 1),
                FileStore::new(1, "alice", "b", 1),
                FileStore::new(2, "bob", "c", 1),
            ],
        )
        .unwrap();
        let ids: Vec<_> = repo.file_stores_for_user("alice").unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(repo.file_stores_for_user("carol").unwrap().is_empty());

        assert_eq!(repo.remove_file_store(3).unwrap().map(|s| s.id), Some(3));
        assert!(repo.remove_file_store(3).unwrap().is_none());
        assert!(matches!(repo.file_store(3), Err(NetStoreError::UnknownFileStore(3))));
    }

    #[test]
    fn credentials_are_per_user_and_file_system() {
        let creds = StaticCredentials::new().with("alice", 1, Credentials::password("alice", "pw"));
        assert_eq!(creds.credentials("alice", &smb()).unwrap().username(), "alice");
        let err = creds.credentials("bob", &smb()).unwrap_err();
        assert!(matches!(err, NetStoreError::MissingCredentials { .. }));
        assert!(creds.remove("alice", 1));
        assert!(creds.credentials("alice", &smb()).is_err());
    }
}
