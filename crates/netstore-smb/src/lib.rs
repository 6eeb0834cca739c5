//! SMB/CIFS protocol clients for remote file stores.

pub mod smb;

pub use smb::*;
