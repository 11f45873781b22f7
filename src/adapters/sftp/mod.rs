//! SFTP delivery transport
//!
//! - [`transport`] - the synchronous session traits the uploader drives
//! - [`ssh`] - the `ssh2` implementation

pub mod ssh;
pub mod transport;

pub use ssh::Ssh2Transport;
pub use transport::{remote_path, AuthMethod, RemoteSession, SftpTransport};
