//! SFTP protocol client for remote file stores.

pub mod sftp;

pub use sftp::*;
