//! Partner file delivery
//!
//! Delivers one partner's files over a single session:
//!
//! ```text
//! Connect -> Authenticate -> for each file { open local -> create remote
//!   -> copy -> verify size } -> record outcome -> disconnect
//! ```
//!
//! Every file is attempted and every error is kept. The outcome is a
//! failure when any file failed. A remote file left by an aborted copy or
//! a failed size check is removed.

use crate::adapters::sftp::{remote_path, AuthMethod, RemoteSession, SftpTransport};
use crate::config::SftpConfig;
use crate::core::export::writer::ExportedFile;
use crate::domain::{DeliveryError, SftpCredential, UploadResult};
use std::fs::File;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Timeouts and buffer size for deliveries
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub connect_timeout: Duration,
    pub file_timeout: Duration,
    pub chunk_size: usize,
}

impl From<&SftpConfig> for UploadSettings {
    fn from(config: &SftpConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_seconds),
            file_timeout: Duration::from_secs(config.file_timeout_seconds),
            chunk_size: config.chunk_size_bytes,
        }
    }
}

/// Uploads files to partner servers
#[derive(Clone)]
pub struct Uploader {
    transport: Arc<dyn SftpTransport>,
    settings: UploadSettings,
    shutdown: watch::Receiver<bool>,
}

impl Uploader {
    pub fn new(
        transport: Arc<dyn SftpTransport>,
        settings: UploadSettings,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            transport,
            settings,
            shutdown,
        }
    }

    /// Delivers `files` to the partner described by `credential`
    ///
    /// Never fails: every problem is reported in the returned outcome.
    pub async fn deliver(&self, credential: SftpCredential, files: Vec<ExportedFile>) -> UploadResult {
        let team_id = credential.team_id;

        match tokio::task::spawn_blocking({
            let transport = Arc::clone(&self.transport);
            let settings = self.settings.clone();
            let shutdown = self.shutdown.clone();
            move || deliver_blocking(transport.as_ref(), &credential, &files, &settings, &shutdown)
        })
        .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(team_id = %team_id, error = %e, "Delivery task panicked");
                UploadResult::failure(team_id, format!("Delivery task failed: {e}"))
            }
        }
    }
}

fn deliver_blocking(
    transport: &dyn SftpTransport,
    credential: &SftpCredential,
    files: &[ExportedFile],
    settings: &UploadSettings,
    shutdown: &watch::Receiver<bool>,
) -> UploadResult {
    let team_id = credential.team_id;

    let auth = match AuthMethod::for_credential(credential) {
        Ok(auth) => auth,
        Err(e) => return UploadResult::from_errors(team_id, 0, vec![e]),
    };

    tracing::info!(
        team_id = %team_id,
        host = %credential.address(),
        method = auth.name(),
        files = files.len(),
        "Connecting to partner"
    );

    let mut session = match transport.connect(credential, &auth, settings.connect_timeout) {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(team_id = %team_id, error = %e, "Partner connection failed");
            return UploadResult::from_errors(team_id, 0, vec![e]);
        }
    };

    let mut errors = Vec::new();
    let mut uploaded = 0;

    for file in files {
        let remote = remote_path(&credential.upload_directory, &file.file_name());
        match upload_file(session.as_mut(), file, &remote, settings, shutdown) {
            Ok(bytes) => {
                uploaded += 1;
                tracing::info!(team_id = %team_id, remote = %remote, bytes, "Uploaded file");
            }
            Err(e) => {
                tracing::warn!(team_id = %team_id, remote = %remote, error = %e, "File upload failed");
                errors.push(e);
            }
        }
    }

    session.disconnect();
    UploadResult::from_errors(team_id, uploaded, errors)
}

/// Copies one file and verifies its remote size, returning the byte count
fn upload_file(
    session: &mut dyn RemoteSession,
    file: &ExportedFile,
    remote: &str,
    settings: &UploadSettings,
    shutdown: &watch::Receiver<bool>,
) -> Result<u64, DeliveryError> {
    let local_path = file.path.display().to_string();
    let local_err = |e: std::io::Error| DeliveryError::LocalIo {
        path: local_path.clone(),
        message: e.to_string(),
    };

    if *shutdown.borrow() {
        return Err(DeliveryError::Cancelled {
            path: remote.to_string(),
        });
    }

    let mut local = File::open(&file.path).map_err(local_err)?;
    let local_len = local.metadata().map_err(local_err)?.len();

    let mut writer = session.create(remote).map_err(|message| DeliveryError::Transfer {
        path: remote.to_string(),
        message,
    })?;

    if let Err(e) = copy_chunks(&mut local, &mut writer, remote, &local_path, settings, shutdown) {
        drop(writer);
        remove_partial(session, remote);
        return Err(e);
    }
    drop(writer);

    let remote_len = session.size(remote).map_err(|message| DeliveryError::Transfer {
        path: remote.to_string(),
        message: format!("stat failed: {message}"),
    })?;
    if remote_len != local_len {
        remove_partial(session, remote);
        return Err(DeliveryError::SizeMismatch {
            path: remote.to_string(),
            local: local_len,
            remote: remote_len,
        });
    }

    Ok(local_len)
}

fn remove_partial(session: &mut dyn RemoteSession, remote: &str) {
    if let Err(e) = session.remove(remote) {
        tracing::warn!(remote = %remote, error = %e, "Failed to remove partial file");
    }
}

fn copy_chunks(
    local: &mut File,
    writer: &mut Box<dyn Write + Send>,
    remote: &str,
    local_path: &str,
    settings: &UploadSettings,
    shutdown: &watch::Receiver<bool>,
) -> Result<(), DeliveryError> {
    let deadline = Instant::now() + settings.file_timeout;
    let mut buffer = vec![0u8; settings.chunk_size.max(1)];

    loop {
        if *shutdown.borrow() {
            return Err(DeliveryError::Cancelled {
                path: remote.to_string(),
            });
        }

        let n = local.read(&mut buffer).map_err(|e| DeliveryError::LocalIo {
            path: local_path.to_string(),
            message: e.to_string(),
        })?;
        if n == 0 {
            break;
        }

        if Instant::now() >= deadline {
            return Err(DeliveryError::Timeout {
                path: remote.to_string(),
                seconds: settings.file_timeout.as_secs(),
            });
        }

        writer
            .write_all(&buffer[..n])
            .map_err(|e| DeliveryError::Transfer {
                path: remote.to_string(),
                message: e.to_string(),
            })?;
    }

    writer.flush().map_err(|e| DeliveryError::Transfer {
        path: remote.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;
    use crate::domain::{CredentialId, TeamId};

    struct Refusing;

    impl SftpTransport for Refusing {
        fn connect(
            &self,
            credential: &SftpCredential,
            _auth: &AuthMethod,
            _timeout: Duration,
        ) -> Result<Box<dyn RemoteSession>, DeliveryError> {
            Err(DeliveryError::Connect {
                host: credential.address(),
                message: "connection refused".to_string(),
            })
        }
    }

    /// In-memory server; `reported_size` overrides the stat result
    #[derive(Default)]
    struct Memory {
        files: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
        removed: std::sync::Mutex<Vec<String>>,
        reported_size: Option<u64>,
        failing_writes: bool,
        write_delay: Option<Duration>,
    }

    struct MemoryTransport(Arc<Memory>);

    impl SftpTransport for MemoryTransport {
        fn connect(
            &self,
            _credential: &SftpCredential,
            _auth: &AuthMethod,
            _timeout: Duration,
        ) -> Result<Box<dyn RemoteSession>, DeliveryError> {
            Ok(Box::new(MemorySession(Arc::clone(&self.0))))
        }
    }

    struct MemorySession(Arc<Memory>);

    impl RemoteSession for MemorySession {
        fn create(&mut self, remote_path: &str) -> Result<Box<dyn Write + Send>, String> {
            self.0
                .files
                .lock()
                .unwrap()
                .insert(remote_path.to_string(), Vec::new());
            Ok(Box::new(MemoryWriter {
                server: Arc::clone(&self.0),
                path: remote_path.to_string(),
            }))
        }

        fn size(&mut self, remote_path: &str) -> Result<u64, String> {
            if let Some(size) = self.0.reported_size {
                return Ok(size);
            }
            self.0
                .files
                .lock()
                .unwrap()
                .get(remote_path)
                .map(|f| f.len() as u64)
                .ok_or_else(|| "no such file".to_string())
        }

        fn remove(&mut self, remote_path: &str) -> Result<(), String> {
            self.0.files.lock().unwrap().remove(remote_path);
            self.0.removed.lock().unwrap().push(remote_path.to_string());
            Ok(())
        }

        fn disconnect(&mut self) {}
    }

    struct MemoryWriter {
        server: Arc<Memory>,
        path: String,
    }

    impl Write for MemoryWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.server.failing_writes {
                return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe"));
            }
            if let Some(delay) = self.server.write_delay {
                std::thread::sleep(delay);
            }
            self.server
                .files
                .lock()
                .unwrap()
                .entry(self.path.clone())
                .or_default()
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn local_file(dir: &tempfile::TempDir, name: &str, len: usize) -> ExportedFile {
        let path = dir.path().join(name);
        std::fs::write(&path, vec![b'x'; len]).unwrap();
        ExportedFile {
            team_id: TeamId::new(3),
            path,
            rows: 1,
            bytes: len as u64,
            scan_ids: vec![],
            fair_ids: vec![],
        }
    }

    fn settings() -> UploadSettings {
        UploadSettings {
            connect_timeout: Duration::from_secs(1),
            file_timeout: Duration::from_secs(5),
            chunk_size: 1024,
        }
    }

    fn credential(password: bool) -> SftpCredential {
        SftpCredential {
            id: CredentialId::new(1),
            team_id: TeamId::new(3),
            host: "127.0.0.1".to_string(),
            port: 22,
            username: "partner".to_string(),
            password: password.then(|| secret_string("pw".to_string())),
            ssh_key: None,
            ssh_key_passphrase: None,
            upload_directory: "upload".to_string(),
            notification_email: None,
        }
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_without_connecting() {
        let (_tx, rx) = watch::channel(false);
        let uploader = Uploader::new(Arc::new(Refusing), settings(), rx);
        let result = uploader.deliver(credential(false), vec![]).await;
        assert!(!result.is_success());
        assert_eq!(result.errors, vec![DeliveryError::NoCredentials]);
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        let (_tx, rx) = watch::channel(false);
        let uploader = Uploader::new(Arc::new(Refusing), settings(), rx);
        let result = uploader.deliver(credential(true), vec![]).await;
        assert!(!result.is_success());
        assert_eq!(result.files_uploaded, 0);
        assert!(result
            .error_summary
            .as_deref()
            .unwrap_or_default()
            .contains("connection refused"));
    }

    #[tokio::test]
    async fn test_every_file_uploaded_and_verified() {
        let dir = tempfile::TempDir::new().unwrap();
        let server = Arc::new(Memory::default());
        let (_tx, rx) = watch::channel(false);
        let uploader = Uploader::new(Arc::new(MemoryTransport(Arc::clone(&server))), settings(), rx);

        let files = vec![local_file(&dir, "a.csv", 3000), local_file(&dir, "b.csv", 10)];
        let result = uploader.deliver(credential(true), files).await;

        assert!(result.is_success());
        assert_eq!(result.files_uploaded, 2);
        let stored = server.files.lock().unwrap();
        assert_eq!(stored["upload/a.csv"].len(), 3000);
        assert_eq!(stored["upload/b.csv"].len(), 10);
    }

    #[tokio::test]
    async fn test_size_mismatch_is_not_retried() {
        let dir = tempfile::TempDir::new().unwrap();
        let server = Arc::new(Memory {
            reported_size: Some(1000),
            ..Memory::default()
        });
        let (_tx, rx) = watch::channel(false);
        let uploader = Uploader::new(Arc::new(MemoryTransport(Arc::clone(&server))), settings(), rx);

        let result = uploader
            .deliver(credential(true), vec![local_file(&dir, "scans.csv", 1024)])
            .await;

        assert!(!result.is_success());
        assert_eq!(
            result.errors,
            vec![DeliveryError::SizeMismatch {
                path: "upload/scans.csv".to_string(),
                local: 1024,
                remote: 1000,
            }]
        );
        assert_eq!(*server.removed.lock().unwrap(), vec!["upload/scans.csv".to_string()]);
        assert!(server.files.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stalled_copy_times_out_and_removes_partial_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let server = Arc::new(Memory {
            write_delay: Some(Duration::from_millis(100)),
            ..Memory::default()
        });
        let (_tx, rx) = watch::channel(false);
        let settings = UploadSettings {
            file_timeout: Duration::from_millis(50),
            ..settings()
        };
        let uploader = Uploader::new(Arc::new(MemoryTransport(Arc::clone(&server))), settings, rx);

        let files = vec![local_file(&dir, "slow.csv", 4096), local_file(&dir, "next.csv", 10)];
        let result = uploader.deliver(credential(true), files).await;

        assert!(!result.is_success());
        assert_eq!(result.files_uploaded, 1);
        assert_eq!(
            result.errors,
            vec![DeliveryError::Timeout {
                path: "upload/slow.csv".to_string(),
                seconds: 0,
            }]
        );
        assert_eq!(*server.removed.lock().unwrap(), vec!["upload/slow.csv".to_string()]);
        assert_eq!(
            server.files.lock().unwrap().keys().collect::<Vec<_>>(),
            vec!["upload/next.csv"]
        );
    }

    #[tokio::test]
    async fn test_failed_write_removes_partial_file_and_continues() {
        let dir = tempfile::TempDir::new().unwrap();
        let server = Arc::new(Memory {
            failing_writes: true,
            ..Memory::default()
        });
        let (_tx, rx) = watch::channel(false);
        let uploader = Uploader::new(Arc::new(MemoryTransport(Arc::clone(&server))), settings(), rx);

        let files = vec![local_file(&dir, "a.csv", 10), local_file(&dir, "b.csv", 10)];
        let result = uploader.deliver(credential(true), files).await;

        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.iter().all(DeliveryError::is_transfer));
        assert_eq!(
            *server.removed.lock().unwrap(),
            vec!["upload/a.csv".to_string(), "upload/b.csv".to_string()]
        );
        assert!(server.files.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_local_file_is_local_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let server = Arc::new(Memory::default());
        let (_tx, rx) = watch::channel(false);
        let uploader = Uploader::new(Arc::new(MemoryTransport(Arc::clone(&server))), settings(), rx);

        let mut file = local_file(&dir, "gone.csv", 10);
        std::fs::remove_file(&file.path).unwrap();
        file.bytes = 0;
        let result = uploader.deliver(credential(true), vec![file]).await;

        assert!(matches!(
            result.errors.as_slice(),
            [DeliveryError::LocalIo { .. }]
        ));
    }
}
