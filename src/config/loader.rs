//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{HostKeyPolicy, ScanfeedConfig};
use super::secret::secret_string;
use crate::domain::errors::ScanfeedError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Environment variable the external encryptor reads its key from
pub const LEGACY_KEY_VAR: &str = "LARAVEL_ENCRYPTION_KEY";

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into ScanfeedConfig
/// 4. Applies environment variable overrides (SCANFEED_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use scanfeed::config::loader::load_config;
///
/// let config = load_config("scanfeed.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<ScanfeedConfig> {
    let config = load_config_unvalidated(path)?;

    config.validate().map_err(|e| {
        ScanfeedError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Loads configuration without running validation
///
/// Used by callers that apply CLI overrides before validating.
pub fn load_config_unvalidated(path: impl AsRef<Path>) -> Result<ScanfeedConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ScanfeedError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        ScanfeedError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration text, applying substitution and overrides
pub fn parse_config(contents: &str) -> Result<ScanfeedConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: ScanfeedConfig = toml::from_str(&contents)
        .map_err(|e| ScanfeedError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| ScanfeedError::Other(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        let trimmed = line.trim_start();

        if trimmed.starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(ScanfeedError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using SCANFEED_* prefix
///
/// Environment variables follow the pattern: SCANFEED_<SECTION>_<KEY>
/// For example: SCANFEED_DATABASE_CONNECTION_STRING, SCANFEED_EXPORT_OUTPUT_DIR.
/// When no key is configured, `LARAVEL_ENCRYPTION_KEY` is used as a fallback.
fn apply_env_overrides(config: &mut ScanfeedConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("SCANFEED_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("SCANFEED_APPLICATION_DRY_RUN") {
        config.application.dry_run = val.parse().unwrap_or(false);
    }

    // Database overrides
    if let Ok(val) = std::env::var("SCANFEED_DATABASE_CONNECTION_STRING") {
        config.database.connection_string = secret_string(val);
    }
    if let Ok(val) = std::env::var("SCANFEED_DATABASE_MAX_CONNECTIONS") {
        if let Ok(max) = val.parse() {
            config.database.max_connections = max;
        }
    }
    if let Ok(val) = std::env::var("SCANFEED_DATABASE_STATEMENT_TIMEOUT_SECONDS") {
        if let Ok(secs) = val.parse() {
            config.database.statement_timeout_seconds = secs;
        }
    }
    if let Ok(val) = std::env::var("SCANFEED_DATABASE_SSL_MODE") {
        config.database.ssl_mode = val;
    }

    // Export overrides
    if let Ok(val) = std::env::var("SCANFEED_EXPORT_OUTPUT_DIR") {
        config.export.output_dir = val;
    }
    if let Ok(val) = std::env::var("SCANFEED_EXPORT_REFERENCE_TIMEZONE") {
        config.export.reference_timezone = val;
    }
    if let Ok(val) = std::env::var("SCANFEED_EXPORT_DEFAULT_WINDOW_DAYS") {
        if let Ok(days) = val.parse() {
            config.export.default_window_days = days;
        }
    }
    if let Ok(val) = std::env::var("SCANFEED_EXPORT_PARALLEL_PROFILES") {
        if let Ok(parallel) = val.parse() {
            config.export.parallel_profiles = parallel;
        }
    }

    // Encryption overrides
    if let Ok(val) = std::env::var("SCANFEED_ENCRYPTION_KEY") {
        config.encryption.key = Some(secret_string(val));
    } else if config.encryption.key.is_none() {
        if let Ok(val) = std::env::var(LEGACY_KEY_VAR) {
            config.encryption.key = Some(secret_string(val));
        }
    }
    if let Ok(val) = std::env::var("SCANFEED_ENCRYPTION_VERIFY_MAC") {
        config.encryption.verify_mac = val.parse().unwrap_or(false);
    }

    // SFTP overrides
    if let Ok(val) = std::env::var("SCANFEED_SFTP_ENABLED") {
        config.sftp.enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("SCANFEED_SFTP_DEFAULT_UPLOAD_DIRECTORY") {
        config.sftp.default_upload_directory = val;
    }
    if let Ok(val) = std::env::var("SCANFEED_SFTP_FILE_TIMEOUT_SECONDS") {
        if let Ok(secs) = val.parse() {
            config.sftp.file_timeout_seconds = secs;
        }
    }
    if let Ok(val) = std::env::var("SCANFEED_SFTP_MAX_CONCURRENT_PARTNERS") {
        if let Ok(max) = val.parse() {
            config.sftp.max_concurrent_partners = max;
        }
    }
    if let Ok(val) = std::env::var("SCANFEED_SFTP_HOST_KEY_POLICY") {
        config.sftp.host_key_policy = match val.as_str() {
            "known_hosts" => HostKeyPolicy::KnownHosts,
            "accept_any" => HostKeyPolicy::AcceptAny,
            other => {
                return Err(ScanfeedError::Configuration(format!(
                    "Invalid SCANFEED_SFTP_HOST_KEY_POLICY '{other}'. Must be one of: known_hosts, accept_any"
                )))
            }
        };
    }
    if let Ok(val) = std::env::var("SCANFEED_SFTP_KNOWN_HOSTS_PATH") {
        config.sftp.known_hosts_path = Some(val);
    }

    // Logging overrides
    if let Ok(val) = std::env::var("SCANFEED_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("SCANFEED_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
