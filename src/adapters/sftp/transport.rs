//! SFTP transport trait definition
//!
//! The uploader drives a partner delivery through these traits. They are
//! synchronous: implementations block, and callers run them on a blocking
//! thread.

use crate::config::SecretString;
use crate::domain::{DeliveryError, SftpCredential};
use std::io::Write;
use std::time::Duration;

/// How a session authenticates
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Private key (PEM/OpenSSH text), with an optional passphrase
    Key {
        private_key: SecretString,
        passphrase: Option<SecretString>,
    },
    Password(SecretString),
}

impl AuthMethod {
    /// Picks the key when present, else the password
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::NoCredentials` when the credential holds
    /// neither.
    pub fn for_credential(credential: &SftpCredential) -> Result<Self, DeliveryError> {
        if let Some(key) = &credential.ssh_key {
            return Ok(AuthMethod::Key {
                private_key: key.clone(),
                passphrase: credential.ssh_key_passphrase.clone(),
            });
        }
        if let Some(password) = &credential.password {
            return Ok(AuthMethod::Password(password.clone()));
        }
        Err(DeliveryError::NoCredentials)
    }

    /// Method name for logging
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::Key { .. } => "publickey",
            AuthMethod::Password(_) => "password",
        }
    }
}

/// Opens authenticated sessions to partner servers
pub trait SftpTransport: Send + Sync {
    /// Connects, verifies the host key, authenticates and opens the SFTP
    /// subsystem
    ///
    /// # Errors
    ///
    /// Returns `Connect`, `HostKey` or `Auth` according to the failing step.
    fn connect(
        &self,
        credential: &SftpCredential,
        auth: &AuthMethod,
        timeout: Duration,
    ) -> Result<Box<dyn RemoteSession>, DeliveryError>;
}

/// An open SFTP session
///
/// Errors are plain messages; the uploader attaches the remote path.
pub trait RemoteSession: Send {
    /// Creates or truncates a remote file for writing
    fn create(&mut self, remote_path: &str) -> Result<Box<dyn Write + Send>, String>;

    /// Size of a remote file in bytes
    fn size(&mut self, remote_path: &str) -> Result<u64, String>;

    /// Removes a remote file
    fn remove(&mut self, remote_path: &str) -> Result<(), String>;

    /// Closes the session; errors are ignored
    fn disconnect(&mut self);
}

/// Joins an upload directory and a file name with `/`
///
/// A root directory (`/`, `//`) stays absolute; an empty directory leaves
/// the name relative to the session's working directory.
pub fn remote_path(directory: &str, file_name: &str) -> String {
    let trimmed = directory.trim_end_matches('/');
    if !trimmed.is_empty() {
        format!("{trimmed}/{file_name}")
    } else if directory.starts_with('/') {
        format!("/{file_name}")
    } else {
        file_name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;
    use crate::domain::{CredentialId, TeamId};
    use test_case::test_case;

    fn credential() -> SftpCredential {
        SftpCredential {
            id: CredentialId::new(1),
            team_id: TeamId::new(1),
            host: "localhost".to_string(),
            port: 22,
            username: "partner".to_string(),
            password: None,
            ssh_key: None,
            ssh_key_passphrase: None,
            upload_directory: "upload".to_string(),
            notification_email: None,
        }
    }

    #[test]
    fn test_key_preferred_over_password() {
        let mut c = credential();
        c.password = Some(secret_string("pw".to_string()));
        c.ssh_key = Some(secret_string("-----BEGIN KEY-----".to_string()));
        assert_eq!(AuthMethod::for_credential(&c).unwrap().name(), "publickey");
    }

    #[test]
    fn test_password_fallback() {
        let mut c = credential();
        c.password = Some(secret_string("pw".to_string()));
        assert_eq!(AuthMethod::for_credential(&c).unwrap().name(), "password");
    }

    #[test]
    fn test_no_credentials() {
        assert_eq!(
            AuthMethod::for_credential(&credential()).unwrap_err(),
            DeliveryError::NoCredentials
        );
    }

    #[test_case("upload", "a.csv", "upload/a.csv")]
    #[test_case("/inbound/", "a.csv", "/inbound/a.csv")]
    #[test_case("", "a.csv", "a.csv")]
    #[test_case("/", "a.csv", "/a.csv")]
    #[test_case("//", "a.csv", "/a.csv")]
    fn test_remote_path(dir: &str, name: &str, expected: &str) {
        assert_eq!(remote_path(dir, name), expected);
    }
}
