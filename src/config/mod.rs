//! Configuration management for scanfeed.
//!
//! scanfeed uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `SCANFEED_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Example Configuration
//!
//! ```toml
//! environment = "production"
//!
//! [database]
//! connection_string = "${SCANFEED_DATABASE_DSN}"
//! statement_timeout_seconds = 21600
//!
//! [export]
//! output_dir = "output"
//! reference_timezone = "America/Chicago"
//! scan_types = ["student", "professional"]
//!
//! [encryption]
//! key = "${LARAVEL_ENCRYPTION_KEY}"
//!
//! [sftp]
//! host_key_policy = "known_hosts"
//! known_hosts_path = "/etc/scanfeed/known_hosts"
//! ```
//!
//! # Sections
//!
//! - [`ApplicationConfig`] - log level, dry run
//! - [`DatabaseConfig`] - PostgreSQL connection and statement timeout
//! - [`ExportConfig`] - output root, selection window, profiles
//! - [`EncryptionConfig`] - credential envelope key and MAC policy
//! - [`SftpConfig`] - delivery timeouts, concurrency, host key policy
//! - [`LoggingConfig`] - local JSON log files

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_config_unvalidated, parse_config};
pub use schema::{
    ApplicationConfig, DatabaseConfig, EncryptionConfig, Environment, ExportConfig,
    HostKeyPolicy, LoggingConfig, ScanfeedConfig, SftpConfig,
};
pub use secret::{non_empty_secret, redact_dsn, secret_string, SecretString, SecretValue};
