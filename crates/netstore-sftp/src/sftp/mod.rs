// ── netstore-sftp / sftp module ───────────────────────────────────────────────
//
// SFTP protocol client:
//   • TCP connect with timeout, SSH handshake, host-key verification
//   • password (with keyboard-interactive fallback) or in-memory key auth
//   • directory listing and streamed downloads over one SFTP channel

pub mod types;
pub mod keys;
pub mod client;

pub use types::*;
pub use keys::{parse_private_key, PrivateKeyMaterial};
pub use client::SftpClient;
