//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the scanfeed configuration file.

use crate::config::{load_config_unvalidated, redact_dsn};
use crate::core::profile::ScanType;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config_unvalidated(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        if let Err(e) = config.validate() {
            println!("❌ Configuration validation failed");
            println!("   Error: {e}");
            println!();
            return Ok(2);
        }

        let scan_types = match ScanType::parse_list(&config.export.scan_types) {
            Ok(types) => types,
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                return Ok(2);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Environment: {:?}", config.environment);
        println!("  Log Level: {}", config.application.log_level);
        println!("  Database: {}", redact_dsn(&config.database.connection_string));
        println!("  SSL Mode: {}", config.database.ssl_mode);
        println!("  Max Connections: {}", config.database.max_connections);
        println!(
            "  Statement Timeout: {}s",
            config.database.statement_timeout_seconds
        );
        println!("  Output Directory: {}", config.export.output_dir);
        println!("  Reference Time Zone: {}", config.export.reference_timezone);
        println!("  Window: {} day(s)", config.export.default_window_days);
        println!(
            "  Scan Types: {}",
            scan_types
                .iter()
                .map(ScanType::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("  SFTP Delivery: {}", if config.sftp.enabled { "enabled" } else { "disabled" });
        println!("  Host Key Policy: {:?}", config.sftp.host_key_policy);
        println!("  Partners in Parallel: {}", config.sftp.max_concurrent_partners);
        println!(
            "  Encryption Key: {}",
            if config.encryption.key.is_some() { "configured" } else { "missing" }
        );
        println!("  Verify MAC: {}", config.encryption.verify_mac);
        println!();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_valid_config_exits_zero() {
        let file = write_config(
            r#"
[database]
connection_string = "postgresql://exporter:pw@localhost/fairs"

[sftp]
enabled = false
"#,
        );
        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_unknown_scan_type_exits_two() {
        let file = write_config(
            r#"
[database]
connection_string = "postgresql://exporter:pw@localhost/fairs"

[export]
scan_types = ["student", "visitor"]

[sftp]
enabled = false
"#,
        );
        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 2);
    }

    #[tokio::test]
    async fn test_missing_file_exits_two() {
        let code = ValidateArgs {}
            .execute("/nonexistent/scanfeed.toml")
            .await
            .unwrap();
        assert_eq!(code, 2);
    }
}
