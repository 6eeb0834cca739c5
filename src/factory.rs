//! Chooses and configures the protocol client for a remote file system.
//!
//! Validation fails fast in a fixed order: url, client type, auth type,
//! client/auth combination, key material. Then the disabled flag and the
//! credential variant are checked, and finally the protocol options.

use netstore_core::{
    AuthType, Credentials, NetFileClient, NetResult, NetStoreError, ProtocolConfig, RemoteFileSystem,
};
use netstore_sftp::{parse_private_key, SftpAuth, SftpClient, SftpSettings};
use netstore_smb::{CifsClient, Smb2Client, SmbSettings};
use serde::{Deserialize, Serialize};

/// Settings shared by every client a factory creates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    pub smb: SmbSettings,
    pub sftp: SftpSettings,
}

/// Anything that can turn credentials and a file system record into a
/// ready-to-connect client.
pub trait ClientConnector: Send + Sync {
    fn client_for(
        &self,
        credentials: &Credentials,
        file_system: &RemoteFileSystem,
    ) -> NetResult<Box<dyn NetFileClient>>;
}

#[derive(Debug, Clone, Default)]
pub struct ClientFactory {
    settings: ClientSettings,
}

impl ClientFactory {
    pub fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Build an unconnected client for `file_system`.
    pub fn get_client(
        &self,
        credentials: &Credentials,
        file_system: &RemoteFileSystem,
    ) -> NetResult<Box<dyn NetFileClient>> {
        let config = file_system.validate()?;

        // Key material is checked ahead of the disabled flag.
        let key = match credentials {
            Credentials::KeyPair {
                private_key,
                passphrase,
                ..
            } if config.auth_type() == AuthType::PublicKey => Some(
                parse_private_key(private_key.as_bytes(), passphrase.as_deref())
                    .map_err(NetStoreError::invalid_key)?,
            ),
            _ => None,
        };

        if file_system.disabled {
            return Err(NetStoreError::Disabled {
                name: file_system.name.clone(),
            });
        }
        if credentials.auth_type() != config.auth_type() {
            return Err(NetStoreError::CredentialMismatch {
                username: credentials.username().to_string(),
                expected: config.auth_type(),
            });
        }

        let username = credentials.username().to_string();
        let client: Box<dyn NetFileClient> = match config {
            ProtocolConfig::Cifs { share, domain } => Box::new(CifsClient::new(
                share,
                domain,
                username,
                password_of(credentials),
                &self.settings.smb,
            )),
            ProtocolConfig::Smb2 { share, domain } => Box::new(Smb2Client::new(
                share,
                domain,
                username,
                password_of(credentials),
                &self.settings.smb,
            )),
            ProtocolConfig::Sftp {
                endpoint,
                server_key,
                ..
            } => {
                let auth = match key {
                    Some(key) => SftpAuth::PublicKey(key),
                    None => SftpAuth::password(password_of(credentials)),
                };
                Box::new(SftpClient::new(
                    endpoint,
                    username,
                    auth,
                    server_key,
                    &self.settings.sftp,
                ))
            }
        };
        log::debug!(
            "created {} client for file system {} ('{}') as '{}'",
            client.client_type(),
            file_system.id,
            file_system.name,
            credentials.username()
        );
        Ok(client)
    }

    pub fn get_password_client(
        &self,
        username: &str,
        password: &str,
        file_system: &RemoteFileSystem,
    ) -> NetResult<Box<dyn NetFileClient>> {
        self.get_client(&Credentials::password(username, password), file_system)
    }

    /// `key` holds an OpenSSH or PEM encoded private key.
    pub fn get_key_pair_client(
        &self,
        username: &str,
        key: &[u8],
        passphrase: Option<&str>,
        file_system: &RemoteFileSystem,
    ) -> NetResult<Box<dyn NetFileClient>> {
        // Configuration errors win over undecodable key bytes.
        file_system.validate()?;
        let private_key = std::str::from_utf8(key).map_err(|_| {
            NetStoreError::invalid_key(netstore_core::KeyFormatError::new("key is not UTF-8 text"))
        })?;
        let credentials = Credentials::key_pair(username, private_key, passphrase.map(str::to_string));
        self.get_client(&credentials, file_system)
    }
}

impl ClientConnector for ClientFactory {
    fn client_for(
        &self,
        credentials: &Credentials,
        file_system: &RemoteFileSystem,
    ) -> NetResult<Box<dyn NetFileClient>> {
        self.get_client(credentials, file_system)
    }
}

fn password_of(credentials: &Credentials) -> String {
    match credentials {
        Credentials::Password { password, .. } => password.clone(),
        Credentials::KeyPair { .. } => String::new(),
    }
}
