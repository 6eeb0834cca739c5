//! # netstore
//!
//! Application layer of the remote file-store client:
//!
//! - **factory**: picks and configures the protocol client for a file system
//! - **session**: one reconnecting client handle per (user, file store)
//! - **service**: the `browse` / `tree` / `download` facade
//! - **repository**: collaborator traits plus in-memory implementations
//! - **config**: YAML / JSON configuration loading
//! - **logging**: `tracing-subscriber` initialisation

pub mod config;
pub mod factory;
pub mod logging;
pub mod repository;
pub mod service;
pub mod session;

pub use config::NetStoreConfig;
pub use factory::{ClientConnector, ClientFactory, ClientSettings};
pub use logging::LoggingConfig;
pub use repository::{CredentialProvider, FileStoreRepository, InMemoryRepository, StaticCredentials};
pub use service::NetStoreService;
pub use session::{ClientSession, SessionKey};

pub use netstore_core::diagnostics::DiagnosticReport;
pub use netstore_core::{
    AuthType, ClientType, ConnectionState, Credentials, EntryKind, ErrorKind, FileStore, FileStoreId,
    FileSystemId, NetFileClient, NetResult, NetStoreError, Operation, RemoteDownload, RemoteEntry,
    RemoteFileSystem, RemoteTreeNode, TreeBounds,
};
pub use netstore_sftp::SftpSettings;
pub use netstore_smb::SmbSettings;
