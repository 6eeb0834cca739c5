//! The contract every protocol client implements.

use crate::error::NetResult;
use crate::model::{ClientType, FileStore};
use crate::tree::{self, RemoteTreeNode, TreeBounds};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read};

/// Lifecycle of one protocol client. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Other,
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    pub name: String,
    /// Path as the client would accept it back in `list` or
    /// `retrieve_for_download`.
    pub path: String,
    pub kind: EntryKind,
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
}

impl RemoteEntry {
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

/// Readable file content plus its metadata. Dropping the handle releases
/// whatever backs it (remote file handle, spooled temp file).
pub struct RemoteDownload {
    pub name: String,
    pub path: String,
    pub size: Option<u64>,
    reader: Box<dyn Read + Send>,
}

impl RemoteDownload {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        size: Option<u64>,
        reader: Box<dyn Read + Send>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            size,
            reader,
        }
    }

    pub fn into_reader(self) -> Box<dyn Read + Send> {
        self.reader
    }
}

impl Read for RemoteDownload {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for RemoteDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteDownload")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for dyn NetFileClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetFileClient")
            .field("client_type", &self.client_type())
            .field("host", &self.host())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// A connection to one remote file system.
///
/// Implementations are chosen once by the client factory. All calls block;
/// a client is driven by one caller at a time.
pub trait NetFileClient: Send {
    fn client_type(&self) -> ClientType;

    /// Resolved host name of the remote server.
    fn host(&self) -> &str;

    fn state(&self) -> ConnectionState;

    /// Establish the session. Calling it on a connected client is a no-op;
    /// calling it on a closed client fails with `Closed`.
    fn connect(&mut self) -> NetResult<()>;

    /// Immediate children of `remote_path`, without `.` and `..`.
    fn list(&mut self, remote_path: &str) -> NetResult<Vec<RemoteEntry>>;

    fn retrieve_for_download(&mut self, remote_path: &str) -> NetResult<RemoteDownload>;

    /// Recursively list `root_path` into a tree addressed by logical paths
    /// of `file_store`.
    fn build_tree(
        &mut self,
        root_path: &str,
        file_store: &FileStore,
        bounds: &TreeBounds,
    ) -> NetResult<RemoteTreeNode> {
        tree::build_tree(self, root_path, file_store, bounds)
    }

    /// Release the connection. Safe to call any number of times.
    fn close(&mut self);

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}
