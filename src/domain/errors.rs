//! Domain error types
//!
//! This module defines the error hierarchy for scanfeed. Each pipeline stage
//! maps onto one top-level variant so that callers can attribute a failure to
//! the stage that produced it. Third-party error types are converted to
//! strings at the boundary and never exposed.

use thiserror::Error;

/// Main scanfeed error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum ScanfeedError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Scan query failed (connectivity, SQL, or timeout)
    #[error("Query error: {0}")]
    Query(String),

    /// A record could not be rendered under its profile
    #[error("Transform error: {0}")]
    Transform(String),

    /// Database-related errors (generic)
    #[error("Database error: {0}")]
    Database(String),

    /// Credential loading or decryption errors
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// SFTP delivery errors
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Credential envelope errors
///
/// None of these variants carry plaintext or key material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Encryption key is not configured
    #[error("Encryption key is not configured")]
    MissingKey,

    /// Encryption key does not decode to 32 bytes
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    /// Envelope is not a JSON object with the required fields
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// A base64 field failed to decode
    #[error("Invalid base64 in {field}: {message}")]
    InvalidBase64 { field: &'static str, message: String },

    /// PKCS#7 padding failed validation
    #[error("Invalid padding")]
    InvalidPadding,

    /// MAC missing or did not match
    #[error("MAC verification failed")]
    MacMismatch,

    /// Plaintext is not valid UTF-8
    #[error("Decrypted value is not valid UTF-8")]
    InvalidUtf8,

    /// Stored port is not a valid port number
    #[error("Invalid port '{0}'")]
    InvalidPort(String),

    /// Credential rows could not be read
    #[error("Failed to load credentials: {0}")]
    LoadFailed(String),
}

/// SFTP delivery errors
///
/// One variant per state of the delivery state machine that can fail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// TCP connect or SSH handshake failed
    #[error("Failed to connect to {host}: {message}")]
    Connect { host: String, message: String },

    /// Server host key was not accepted
    #[error("Host key verification failed for {host}: {message}")]
    HostKey { host: String, message: String },

    /// Server rejected the supplied credentials
    #[error("Authentication failed for {username}: {message}")]
    Auth { username: String, message: String },

    /// Neither a key nor a password was available
    #[error("No authentication method available")]
    NoCredentials,

    /// Local file could not be opened or read
    #[error("Failed to read local file {path}: {message}")]
    LocalIo { path: String, message: String },

    /// Remote create or write failed
    #[error("Transfer of {path} failed: {message}")]
    Transfer { path: String, message: String },

    /// Remote size after copy differs from the local size
    #[error("Size mismatch for {path}: local {local} bytes, remote {remote} bytes")]
    SizeMismatch { path: String, local: u64, remote: u64 },

    /// Per-file copy deadline elapsed
    #[error("Transfer of {path} timed out after {seconds}s")]
    Timeout { path: String, seconds: u64 },

    /// Shutdown was requested mid-transfer
    #[error("Transfer of {path} cancelled")]
    Cancelled { path: String },
}

impl DeliveryError {
    /// Whether this error was produced by the authentication step
    pub fn is_auth(&self) -> bool {
        matches!(self, DeliveryError::Auth { .. } | DeliveryError::NoCredentials)
    }

    /// Whether this error was produced by the copy or verify step
    pub fn is_transfer(&self) -> bool {
        matches!(
            self,
            DeliveryError::Transfer { .. }
                | DeliveryError::SizeMismatch { .. }
                | DeliveryError::Timeout { .. }
                | DeliveryError::Cancelled { .. }
        )
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for ScanfeedError {
    fn from(err: std::io::Error) -> Self {
        ScanfeedError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for ScanfeedError {
    fn from(err: serde_json::Error) -> Self {
        ScanfeedError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for ScanfeedError {
    fn from(err: toml::de::Error) -> Self {
        ScanfeedError::Configuration(format!("TOML parse error: {err}"))
    }
}

// Conversion from csv writer errors
impl From<csv::Error> for ScanfeedError {
    fn from(err: csv::Error) -> Self {
        ScanfeedError::Io(format!("CSV write error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanfeed_error_display() {
        let err = ScanfeedError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_credential_error_conversion() {
        let err: ScanfeedError = CredentialError::InvalidPadding.into();
        assert!(matches!(err, ScanfeedError::Credential(_)));
        assert_eq!(err.to_string(), "Credential error: Invalid padding");
    }

    #[test]
    fn test_delivery_error_conversion() {
        let err: ScanfeedError = DeliveryError::NoCredentials.into();
        assert!(matches!(err, ScanfeedError::Delivery(_)));
    }

    #[test]
    fn test_delivery_error_classification() {
        let auth = DeliveryError::Auth {
            username: "partner".to_string(),
            message: "denied".to_string(),
        };
        assert!(auth.is_auth());
        assert!(!auth.is_transfer());

        let mismatch = DeliveryError::SizeMismatch {
            path: "scans.csv".to_string(),
            local: 1024,
            remote: 1000,
        };
        assert!(mismatch.is_transfer());
        assert_eq!(
            mismatch.to_string(),
            "Size mismatch for scans.csv: local 1024 bytes, remote 1000 bytes"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: ScanfeedError = io_err.into();
        assert!(matches!(err, ScanfeedError::Io(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: ScanfeedError = toml_err.into();
        assert!(matches!(err, ScanfeedError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_errors_implement_std_error() {
        let _: &dyn std::error::Error = &ScanfeedError::Validation("x".to_string());
        let _: &dyn std::error::Error = &CredentialError::MissingKey;
        let _: &dyn std::error::Error = &DeliveryError::NoCredentials;
    }
}
