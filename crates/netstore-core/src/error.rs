//! Error taxonomy shared by every remote file-store component.

use crate::credentials::KeyFormatError;
use crate::model::{AuthType, ClientType, FileStoreId, FileSystemId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type NetResult<T> = Result<T, NetStoreError>;

/// The operation that was running when an error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Connect,
    List,
    Retrieve,
    BuildTree,
    Close,
    Diagnose,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Connect => "connect",
            Operation::List => "list",
            Operation::Retrieve => "retrieve",
            Operation::BuildTree => "build tree",
            Operation::Close => "close",
            Operation::Diagnose => "diagnose",
        };
        f.write_str(s)
    }
}

/// Coarse classification callers match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Static misconfiguration: missing field, bad option, unknown record.
    Configuration,
    /// The client type cannot honour the requested auth type.
    Unsupported,
    /// Malformed caller input: key material, credentials, paths.
    InvalidArgument,
    /// Host unreachable, timeouts, dropped sessions.
    Connectivity,
    /// The server refused the credentials.
    AuthRejected,
    /// The presented host key could not be verified.
    HostKeyRejected,
    NotFound,
    PermissionDenied,
    /// The remote side answered with something we could not interpret.
    Protocol,
    NotConnected,
    Closed,
}

impl ErrorKind {
    /// Whether retrying the whole operation later can succeed without a
    /// configuration change.
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            ErrorKind::Connectivity
                | ErrorKind::NotFound
                | ErrorKind::NotConnected
                | ErrorKind::Closed
        )
    }
}

#[derive(Debug, Error)]
pub enum NetStoreError {
    #[error("remote file system configuration is missing '{field}'")]
    MissingConfig { field: &'static str },

    #[error("invalid value for option '{key}': {reason}")]
    InvalidOption { key: String, reason: String },

    #[error("{auth} authentication is not supported by {client} clients")]
    UnsupportedAuth { client: ClientType, auth: AuthType },

    #[error("{message}")]
    InvalidArgument {
        message: String,
        #[source]
        source: KeyFormatError,
    },

    #[error("credentials for '{username}' cannot be used for {expected} authentication")]
    CredentialMismatch { username: String, expected: AuthType },

    #[error("remote file system '{name}' is disabled")]
    Disabled { name: String },

    #[error("remote path '{path}' rejected: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("{op} against {target} failed: {message}")]
    Connection {
        op: Operation,
        target: String,
        message: String,
    },

    #[error("{target} rejected the credentials of '{username}'")]
    AuthRejected { target: String, username: String },

    #[error("host key of {target} rejected ({fingerprint}): {reason}")]
    HostKeyRejected {
        target: String,
        fingerprint: String,
        reason: &'static str,
    },

    #[error("{op} '{path}': no such file or directory")]
    NotFound { op: Operation, path: String },

    #[error("{op} '{path}': permission denied")]
    PermissionDenied { op: Operation, path: String },

    #[error("unexpected response from {target}: {message}")]
    Protocol { target: String, message: String },

    #[error("client for {target} is not connected")]
    NotConnected { target: String },

    #[error("client for {target} has been closed")]
    Closed { target: String },

    #[error("file store {file_store_id} ({op} '{path}'): {source}")]
    FileStore {
        file_store_id: FileStoreId,
        op: Operation,
        path: String,
        #[source]
        source: Box<NetStoreError>,
    },

    #[error("file store {0} not found")]
    UnknownFileStore(FileStoreId),

    #[error("remote file system {0} not found")]
    UnknownFileSystem(FileSystemId),

    #[error("no credentials for '{user}' on remote file system {file_system_id}")]
    MissingCredentials {
        user: String,
        file_system_id: FileSystemId,
    },

    #[error("configuration file {path}: {message}")]
    ConfigFile { path: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl NetStoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NetStoreError::MissingConfig { .. }
            | NetStoreError::InvalidOption { .. }
            | NetStoreError::Disabled { .. }
            | NetStoreError::UnknownFileStore(_)
            | NetStoreError::UnknownFileSystem(_)
            | NetStoreError::MissingCredentials { .. }
            | NetStoreError::ConfigFile { .. } => ErrorKind::Configuration,
            NetStoreError::UnsupportedAuth { .. } => ErrorKind::Unsupported,
            NetStoreError::InvalidArgument { .. }
            | NetStoreError::CredentialMismatch { .. }
            | NetStoreError::InvalidPath { .. } => ErrorKind::InvalidArgument,
            NetStoreError::Connection { .. } | NetStoreError::Io(_) => ErrorKind::Connectivity,
            NetStoreError::AuthRejected { .. } => ErrorKind::AuthRejected,
            NetStoreError::HostKeyRejected { .. } => ErrorKind::HostKeyRejected,
            NetStoreError::NotFound { .. } => ErrorKind::NotFound,
            NetStoreError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            NetStoreError::Protocol { .. } => ErrorKind::Protocol,
            NetStoreError::NotConnected { .. } => ErrorKind::NotConnected,
            NetStoreError::Closed { .. } => ErrorKind::Closed,
            NetStoreError::FileStore { source, .. } => source.kind(),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind().is_recoverable()
    }

    // ── Convenience constructors ─────────────────────────────────

    pub fn connection(op: Operation, target: impl Into<String>, message: impl Into<String>) -> Self {
        NetStoreError::Connection {
            op,
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn not_found(op: Operation, path: impl Into<String>) -> Self {
        NetStoreError::NotFound {
            op,
            path: path.into(),
        }
    }

    pub fn permission_denied(op: Operation, path: impl Into<String>) -> Self {
        NetStoreError::PermissionDenied {
            op,
            path: path.into(),
        }
    }

    pub fn invalid_option(key: impl Into<String>, reason: impl Into<String>) -> Self {
        NetStoreError::InvalidOption {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_key(source: KeyFormatError) -> Self {
        NetStoreError::InvalidArgument {
            message: "private key material could not be used".to_string(),
            source,
        }
    }

    /// Attach file-store context for the caller-facing layer.
    pub fn in_file_store(self, file_store_id: FileStoreId, op: Operation, path: impl Into<String>) -> Self {
        if let NetStoreError::FileStore { .. } = self {
            return self;
        }
        NetStoreError::FileStore {
            file_store_id,
            op,
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// True for failures that leave the underlying session unusable.
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Connectivity
                | ErrorKind::AuthRejected
                | ErrorKind::HostKeyRejected
                | ErrorKind::Closed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn missing_config_names_the_field() {
        let err = NetStoreError::MissingConfig { field: "url" };
        assert!(err.to_string().contains("'url'"));
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn invalid_key_exposes_cause() {
        let err = NetStoreError::invalid_key(KeyFormatError::new("unexpected end of input"));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let cause = err.source().expect("cause");
        assert!(cause.to_string().contains("invalid privatekey"));
    }

    #[test]
    fn file_store_wrapper_preserves_kind() {
        let err = NetStoreError::not_found(Operation::List, "/CSE/missing")
            .in_file_store(7, Operation::List, "/missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.is_recoverable());
        let text = err.to_string();
        assert!(text.contains("file store 7"));
        assert!(text.contains("/missing"));
    }

    #[test]
    fn file_store_wrapper_is_not_nested() {
        let err = NetStoreError::connection(Operation::Connect, "sftp://host:22", "refused")
            .in_file_store(1, Operation::Connect, "/")
            .in_file_store(2, Operation::List, "/x");
        match err {
            NetStoreError::FileStore { file_store_id, source, .. } => {
                assert_eq!(file_store_id, 1);
                assert!(matches!(*source, NetStoreError::Connection { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn recoverable_kinds() {
        assert!(ErrorKind::Connectivity.is_recoverable());
        assert!(ErrorKind::Closed.is_recoverable());
        assert!(!ErrorKind::AuthRejected.is_recoverable());
        assert!(!ErrorKind::Unsupported.is_recoverable());
    }

    #[test]
    fn session_fatal_errors() {
        assert!(NetStoreError::connection(Operation::List, "h", "reset").is_fatal_to_session());
        assert!(!NetStoreError::not_found(Operation::List, "/a").is_fatal_to_session());
    }
}
