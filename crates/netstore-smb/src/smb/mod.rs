// ── netstore-smb / smb module ─────────────────────────────────────────────────
//
// Two SMB protocol clients over the Samba `smbclient` tool:
//   • CifsClient  – SMB1/CIFS dialect, share named in the url path
//   • Smb2Client  – SMB2/SMB3 dialects, share from SHARE_NAME or the url
//
// Both delegate to SmbShareClient, which owns the auth file, the command
// invocations and the connection state.

pub mod types;
pub mod parser;
pub mod cli;
pub mod share;
pub mod cifs;
pub mod smb2;

pub use types::*;
pub use share::SmbShareClient;
pub use cifs::CifsClient;
pub use smb2::Smb2Client;
