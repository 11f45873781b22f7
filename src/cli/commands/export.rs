//! Export command implementation
//!
//! This module implements the `export` command: fetch scans for the
//! requested profiles, write per-team CSV files and deliver them to partners.

use crate::config::load_config_unvalidated;
use crate::core::export::{RunCoordinator, RunOptions, RunSummary, Services};
use crate::core::profile::ScanType;
use crate::domain::{TeamId, UploadStatus};
use crate::log_error_with_context;
use clap::{Args, ValueEnum};
use tokio::sync::watch;

/// Kind of data to export
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DataType {
    Scans,
    Connections,
}

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Type of data to process
    #[arg(long = "type", value_enum, default_value_t = DataType::Scans)]
    pub data_type: DataType,

    /// Scan type(s) to export; repeat or comma-separate, `all` for every type
    #[arg(long = "scan-type", value_delimiter = ',')]
    pub scan_types: Vec<String>,

    /// Number of days back to select fairs for
    #[arg(long)]
    pub days: Option<u32>,

    /// Export and deliver for one team only
    #[arg(long)]
    pub team: Option<i64>,

    /// Re-export scans that were already delivered
    #[arg(long)]
    pub force: bool,

    /// Log queries and per-row detail
    #[arg(long)]
    pub debug: bool,

    /// Write files but do not contact partners or the ledger
    #[arg(long)]
    pub dry_run: bool,

    /// Same as --dry-run
    #[arg(long)]
    pub skip_upload: bool,
}

impl ExportArgs {
    /// Execute the export command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting export command");

        if self.data_type == DataType::Connections {
            eprintln!("Exporting connections is not supported; use --type scans");
            return Ok(2);
        }

        let mut config = load_config_unvalidated(config_path)?;

        if let Some(days) = self.days {
            tracing::info!(days, "Overriding window length from CLI");
            config.export.default_window_days = days;
        }
        if !self.scan_types.is_empty() {
            tracing::info!(scan_types = ?self.scan_types, "Overriding scan types from CLI");
            config.export.scan_types = self.scan_types.clone();
        }
        let dry_run = self.dry_run || self.skip_upload || config.application.dry_run;

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        let scan_types = match ScanType::parse_list(&config.export.scan_types) {
            Ok(types) => types,
            Err(e) => {
                eprintln!("{e}");
                return Ok(2);
            }
        };

        let team = match self.team {
            Some(id) if id <= 0 => {
                eprintln!("--team must be a positive team id, got {id}");
                return Ok(2);
            }
            other => other.map(TeamId::new),
        };

        let options = RunOptions {
            scan_types,
            window_days: config.export.default_window_days,
            team,
            force: self.force,
            dry_run,
            as_of: None,
        };

        if dry_run {
            tracing::info!("Dry run mode enabled - no partner will be contacted");
            println!("🔍 DRY RUN MODE - Files are written, nothing is uploaded or recorded");
            println!();
        }
        if self.force {
            println!("⚠️  --force: scans already delivered will be exported again");
            println!();
        }

        let services = match Services::from_config(&config).await {
            Ok(s) => s,
            Err(e) => {
                log_error_with_context!(&e, "Failed to connect to the scan database");
                eprintln!("Failed to initialize export: {e}");
                return Ok(1);
            }
        };
        let coordinator = RunCoordinator::new(config, services, shutdown_signal);

        println!(
            "🚀 Exporting {} over the last {} day(s)...",
            options
                .scan_types
                .iter()
                .map(ScanType::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            options.window_days
        );
        println!();

        let summary = match coordinator.execute(&options).await {
            Ok(s) => s,
            Err(e) => {
                log_error_with_context!(&e, "Export run aborted");
                eprintln!("Export failed: {e}");
                return Ok(1);
            }
        };

        print_summary(&summary);
        Ok(exit_code(&summary))
    }
}

fn print_summary(summary: &RunSummary) {
    println!("📊 Export Summary (run {}):", summary.run_id);
    println!("  Profiles exported: {}", summary.profiles_exported);
    println!("  Profiles failed: {}", summary.profiles_failed);
    println!("  Records fetched: {}", summary.records_fetched);
    println!("  Files written: {}", summary.files.len());
    for file in &summary.files {
        println!(
            "    - [{}] team {} {} ({} rows, {} bytes)",
            file.scan_type,
            file.team_id,
            file.path.display(),
            file.rows,
            file.bytes
        );
    }

    if !summary.dry_run {
        println!(
            "  Deliveries: {} succeeded, {} failed, {} skipped",
            summary.successful_deliveries(),
            summary.failed_deliveries(),
            summary.partners_skipped
        );
        for delivery in &summary.deliveries {
            let marker = match delivery.status {
                UploadStatus::Success => "✅",
                UploadStatus::Failure => "❌",
            };
            println!(
                "    {marker} team {} (credential {}): {}/{} files, {} scans marked",
                delivery.team_id,
                delivery.credential_id,
                delivery.files_uploaded,
                delivery.files_total,
                delivery.scans_marked
            );
            if let Some(error) = &delivery.error_summary {
                println!("       {error}");
            }
        }
    }
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!();

    if !summary.errors.is_empty() {
        println!("⚠️  Errors encountered:");
        for error in &summary.errors {
            println!("  - {:?}: {}", error.error_type, error.message);
            if let Some(context) = &error.context {
                println!("    Context: {context}");
            }
        }
        println!();
    }
}

/// 130 when interrupted, 0 when every stage succeeded, 1 otherwise
fn exit_code(summary: &RunSummary) -> i32 {
    if summary.interrupted {
        println!("⚠️  Export interrupted. Undelivered scans stay selectable for the next run.");
        tracing::info!("Export interrupted by user signal");
        130
    } else if summary.is_successful() {
        println!("✅ Export completed successfully!");
        0
    } else {
        println!("⚠️  Export completed with failures");
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::export::{RunError, RunErrorType};
    use clap::Parser;
    use uuid::Uuid;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ExportArgs,
    }

    #[test]
    fn test_export_args_defaults() {
        let args = Harness::parse_from(["export"]).args;
        assert_eq!(args.data_type, DataType::Scans);
        assert!(args.scan_types.is_empty());
        assert!(args.days.is_none());
        assert!(!args.force);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_scan_types_repeat_and_split() {
        let args = Harness::parse_from([
            "export",
            "--scan-type",
            "student,parent",
            "--scan-type",
            "professional",
            "--type",
            "scans",
            "--days",
            "7",
            "--team",
            "42",
        ])
        .args;
        assert_eq!(args.scan_types, vec!["student", "parent", "professional"]);
        assert_eq!(args.days, Some(7));
        assert_eq!(args.team, Some(42));
    }

    #[test]
    fn test_connections_type_parses() {
        let args = Harness::parse_from(["export", "--type", "connections"]).args;
        assert_eq!(args.data_type, DataType::Connections);
    }

    #[test]
    fn test_exit_codes() {
        let mut summary = RunSummary::new(Uuid::new_v4());
        assert_eq!(exit_code(&summary), 0);

        summary.add_error(RunError::new(RunErrorType::Query, "timeout"));
        assert_eq!(exit_code(&summary), 1);

        summary.interrupted = true;
        assert_eq!(exit_code(&summary), 130);
    }
}
