//! # netstore-core
//!
//! Shared building blocks for the remote file-store client layer:
//!
//! - **paths**: canonicalisation and sanitising of remote paths
//! - **model**: `RemoteFileSystem` / `FileStore` records and client/auth enums
//! - **options**: option map parsing and the typed `ProtocolConfig`
//! - **credentials**: per-request password or key-pair credentials
//! - **client**: the `NetFileClient` contract every protocol implements
//! - **tree**: logical paths and bounded tree building over a client
//! - **error**: the `NetStoreError` taxonomy
//! - **diagnostics**: DNS / TCP / banner reachability probes

pub mod client;
pub mod credentials;
pub mod diagnostics;
pub mod error;
pub mod model;
pub mod options;
pub mod paths;
pub mod tree;

pub use client::{ConnectionState, EntryKind, NetFileClient, RemoteDownload, RemoteEntry};
pub use credentials::{Credentials, KeyFormatError};
pub use error::{ErrorKind, NetResult, NetStoreError, Operation};
pub use model::{AuthType, ClientType, FileStore, FileStoreId, FileSystemId, RemoteFileSystem};
pub use options::{HostKey, ProtocolConfig, SftpEndpoint, SmbShare};
pub use tree::{RemoteTreeNode, TreeBounds};
