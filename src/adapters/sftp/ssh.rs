//! libssh2-backed SFTP transport

use super::transport::{AuthMethod, RemoteSession, SftpTransport};
use crate::config::{HostKeyPolicy, SftpConfig};
use crate::domain::{DeliveryError, SftpCredential};
use secrecy::ExposeSecret;
use ssh2::{CheckResult, KnownHostFileKind, Session, Sftp};
use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// SFTP transport over `ssh2`
#[derive(Debug, Clone)]
pub struct Ssh2Transport {
    host_key_policy: HostKeyPolicy,
    known_hosts_path: Option<PathBuf>,
    file_timeout: Duration,
}

impl Ssh2Transport {
    pub fn new(config: &SftpConfig) -> Self {
        Self {
            host_key_policy: config.host_key_policy,
            known_hosts_path: config.known_hosts_path.as_ref().map(PathBuf::from),
            file_timeout: Duration::from_secs(config.file_timeout_seconds),
        }
    }

    fn known_hosts_file(&self) -> Option<PathBuf> {
        self.known_hosts_path.clone().or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".ssh/known_hosts"))
        })
    }

    fn verify_host_key(
        &self,
        session: &Session,
        credential: &SftpCredential,
    ) -> Result<(), DeliveryError> {
        let host_key_err = |message: String| DeliveryError::HostKey {
            host: credential.address(),
            message,
        };

        let (key, _) = session
            .host_key()
            .ok_or_else(|| host_key_err("server sent no host key".to_string()))?;

        if self.host_key_policy == HostKeyPolicy::AcceptAny {
            tracing::warn!(
                host = %credential.address(),
                "Accepting host key without verification"
            );
            return Ok(());
        }

        let path = self
            .known_hosts_file()
            .ok_or_else(|| host_key_err("no known_hosts file configured".to_string()))?;
        let mut known_hosts = session
            .known_hosts()
            .map_err(|e| host_key_err(e.to_string()))?;
        known_hosts
            .read_file(&path, KnownHostFileKind::OpenSSH)
            .map_err(|e| host_key_err(format!("failed to read {}: {}", path.display(), e)))?;

        match known_hosts.check_port(&credential.host, credential.port, key) {
            CheckResult::Match => Ok(()),
            CheckResult::NotFound => Err(host_key_err(format!(
                "host not found in {}",
                path.display()
            ))),
            CheckResult::Mismatch => Err(host_key_err("host key does not match".to_string())),
            CheckResult::Failure => Err(host_key_err("host key check failed".to_string())),
        }
    }
}

fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

fn open_stream(credential: &SftpCredential, timeout: Duration) -> Result<TcpStream, DeliveryError> {
    let connect_err = |message: String| DeliveryError::Connect {
        host: credential.address(),
        message,
    };

    let addrs = (credential.host.as_str(), credential.port)
        .to_socket_addrs()
        .map_err(|e| connect_err(e.to_string()))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }

    Err(connect_err(
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "host did not resolve".to_string()),
    ))
}

impl SftpTransport for Ssh2Transport {
    fn connect(
        &self,
        credential: &SftpCredential,
        auth: &AuthMethod,
        timeout: Duration,
    ) -> Result<Box<dyn RemoteSession>, DeliveryError> {
        let connect_err = |message: String| DeliveryError::Connect {
            host: credential.address(),
            message,
        };

        let stream = open_stream(credential, timeout)?;
        let mut session = Session::new().map_err(|e| connect_err(e.to_string()))?;
        session.set_timeout(millis(timeout));
        session.set_tcp_stream(stream);
        session
            .handshake()
            .map_err(|e| connect_err(format!("SSH handshake failed: {e}")))?;

        self.verify_host_key(&session, credential)?;

        let auth_err = |message: String| DeliveryError::Auth {
            username: credential.username.clone(),
            message,
        };
        let attempt = match auth {
            AuthMethod::Password(password) => {
                let password: &str = password.expose_secret().as_ref();
                session.userauth_password(&credential.username, password)
            }
            AuthMethod::Key {
                private_key,
                passphrase,
            } => {
                let private_key: &str = private_key.expose_secret().as_ref();
                let passphrase: Option<&str> =
                    passphrase.as_ref().map(|p| p.expose_secret().as_ref());
                session.userauth_pubkey_memory(&credential.username, None, private_key, passphrase)
            }
        };
        attempt.map_err(|e| auth_err(e.message().to_string()))?;
        if !session.authenticated() {
            return Err(auth_err(format!("{} authentication rejected", auth.name())));
        }

        tracing::debug!(
            host = %credential.address(),
            method = auth.name(),
            "SFTP session authenticated"
        );

        session.set_timeout(millis(self.file_timeout));
        let sftp = session
            .sftp()
            .map_err(|e| connect_err(format!("failed to open SFTP subsystem: {e}")))?;

        Ok(Box::new(Ssh2Session { session, sftp }))
    }
}

struct Ssh2Session {
    session: Session,
    sftp: Sftp,
}

impl RemoteSession for Ssh2Session {
    fn create(&mut self, remote_path: &str) -> Result<Box<dyn Write + Send>, String> {
        self.sftp
            .create(Path::new(remote_path))
            .map(|file| Box::new(file) as Box<dyn Write + Send>)
            .map_err(|e| e.to_string())
    }

    fn size(&mut self, remote_path: &str) -> Result<u64, String> {
        let stat = self
            .sftp
            .stat(Path::new(remote_path))
            .map_err(|e| e.to_string())?;
        stat.size
            .ok_or_else(|| "server did not report a file size".to_string())
    }

    fn remove(&mut self, remote_path: &str) -> Result<(), String> {
        self.sftp
            .unlink(Path::new(remote_path))
            .map_err(|e| e.to_string())
    }

    fn disconnect(&mut self) {
        if let Err(e) = self.session.disconnect(None, "delivery complete", None) {
            tracing::debug!(error = %e, "SFTP disconnect failed");
        }
    }
}
