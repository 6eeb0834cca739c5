//! SMB1/CIFS client. The share is the first segment of the url path; the
//! dialect is pinned to NT1 for servers that never moved past it.

use crate::smb::share::SmbShareClient;
use crate::smb::types::{DialectRange, SmbSettings};
use netstore_core::{
    ClientType, ConnectionState, NetFileClient, NetResult, RemoteDownload, RemoteEntry, SmbShare,
};

pub struct CifsClient {
    inner: SmbShareClient,
}

impl CifsClient {
    pub fn new(
        share: SmbShare,
        domain: Option<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        settings: &SmbSettings,
    ) -> Self {
        Self {
            inner: SmbShareClient::new(
                ClientType::Cifs,
                DialectRange::CIFS,
                share,
                domain,
                username,
                password,
                settings,
            ),
        }
    }

    pub fn share(&self) -> &str {
        &self.inner.share().share
    }

    pub fn domain(&self) -> Option<&str> {
        self.inner.domain()
    }

    pub fn username(&self) -> &str {
        self.inner.username()
    }
}

impl NetFileClient for CifsClient {
    fn client_type(&self) -> ClientType {
        ClientType::Cifs
    }

    fn host(&self) -> &str {
        &self.inner.share().host
    }

    fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    fn connect(&mut self) -> NetResult<()> {
        self.inner.connect()
    }

    fn list(&mut self, remote_path: &str) -> NetResult<Vec<RemoteEntry>> {
        self.inner.list(remote_path)
    }

    fn retrieve_for_download(&mut self, remote_path: &str) -> NetResult<RemoteDownload> {
        self.inner.retrieve_for_download(remote_path)
    }

    fn close(&mut self) {
        self.inner.close()
    }
}
