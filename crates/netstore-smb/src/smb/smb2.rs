//! SMB2/SMB3 client. The url names the host; the share comes from the
//! `SHARE_NAME` option, or from the first url segment when that is unset.

use crate::smb::share::SmbShareClient;
use crate::smb::types::{DialectRange, SmbSettings};
use netstore_core::{
    ClientType, ConnectionState, NetFileClient, NetResult, RemoteDownload, RemoteEntry, SmbShare,
};

pub struct Smb2Client {
    inner: SmbShareClient,
}

impl Smb2Client {
    pub fn new(
        share: SmbShare,
        domain: Option<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        settings: &SmbSettings,
    ) -> Self {
        Self {
            inner: SmbShareClient::new(
                ClientType::Smb2,
                DialectRange::SMB2,
                share,
                domain,
                username,
                password,
                settings,
            ),
        }
    }

    pub fn share_name(&self) -> &str {
        &self.inner.share().share
    }

    pub fn domain(&self) -> Option<&str> {
        self.inner.domain()
    }

    pub fn port(&self) -> u16 {
        self.inner
            .share()
            .port
            .unwrap_or(ClientType::Smb2.default_port())
    }

    pub fn username(&self) -> &str {
        self.inner.username()
    }
}

impl NetFileClient for Smb2Client {
    fn client_type(&self) -> ClientType {
        ClientType::Smb2
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
