//! Run coordinator - main orchestrator for one export run
//!
//! The coordinator drives every stage of a run:
//!
//! 1. Checks database connectivity and prepares the output root
//! 2. Exports each requested scan type concurrently (fetch, group, write)
//! 3. Loads and decrypts partner credentials
//! 4. Delivers each partner's files concurrently
//! 5. Records every delivery in the ledger and links the delivered scans
//!
//! Database connectivity, the output root and the credential query are
//! fatal. Everything else is recorded in the [`RunSummary`] and the run
//! carries on.

use crate::adapters::database::{CredentialSource, DeliveryLedger, ScanStore};
use crate::adapters::postgresql::PostgreSQLAdapter;
use crate::adapters::sftp::{SftpTransport, Ssh2Transport};
use crate::config::ScanfeedConfig;
use crate::core::credentials::{CredentialOutcome, CredentialStore, Envelope};
use crate::core::delivery::{UploadSettings, Uploader};
use crate::core::export::summary::{FileReport, PartnerOutcome, RunError, RunErrorType, RunSummary};
use crate::core::export::writer::{CsvWriter, ExportedFile};
use crate::core::fetch::{Fetcher, TimeWindow};
use crate::core::profile::ScanType;
use crate::core::transform;
use crate::domain::result::Result;
use crate::domain::{FairId, ScanId, ScanfeedError, TeamId, UploadResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

/// Collaborators the coordinator talks to
#[derive(Clone)]
pub struct Services {
    pub scans: Arc<dyn ScanStore>,
    pub credentials: Arc<dyn CredentialSource>,
    pub ledger: Arc<dyn DeliveryLedger>,
    pub transport: Arc<dyn SftpTransport>,
}

impl Services {
    /// Connects the PostgreSQL adapter and the ssh2 transport
    pub async fn from_config(config: &ScanfeedConfig) -> Result<Self> {
        let database = Arc::new(PostgreSQLAdapter::new(&config.database).await?);
        let transport = Arc::new(Ssh2Transport::new(&config.sftp));

        Ok(Self {
            scans: database.clone(),
            credentials: database.clone(),
            ledger: database,
            transport,
        })
    }
}

/// Per-run options taken from the command line
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub scan_types: Vec<ScanType>,
    pub window_days: u32,
    pub team: Option<TeamId>,

    /// Select scans that were already delivered
    pub force: bool,

    /// Write files without contacting partners or the ledger
    pub dry_run: bool,

    /// End of the selection window; the current time when unset
    pub as_of: Option<DateTime<Utc>>,
}

enum ProfileOutcome {
    Exported {
        records: usize,
        files: Vec<ExportedFile>,
    },
    Interrupted,
}

enum PartnerRun {
    Delivered {
        outcome: PartnerOutcome,
        errors: Vec<RunError>,
    },
    Skipped,
}

/// Run coordinator
pub struct RunCoordinator {
    config: ScanfeedConfig,
    services: Services,
    shutdown: watch::Receiver<bool>,
}

impl RunCoordinator {
    pub fn new(config: ScanfeedConfig, services: Services, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            config,
            services,
            shutdown,
        }
    }

    /// Execute one run
    ///
    /// # Errors
    ///
    /// Returns an error only for fatal conditions: the database is
    /// unreachable, the output root cannot be created, the encryption key
    /// is unusable, or the credential query fails. No ledger row is written
    /// in any of these cases.
    pub async fn execute(&self, options: &RunOptions) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", run_id = %run_id);
        self.run(run_id, options).instrument(span).await
    }

    async fn run(&self, run_id: Uuid, options: &RunOptions) -> Result<RunSummary> {
        let start_time = Instant::now();
        let mut summary = RunSummary::new(run_id);
        summary.dry_run = options.dry_run;

        tracing::info!(
            scan_types = ?options.scan_types.iter().map(ScanType::as_str).collect::<Vec<_>>(),
            days = options.window_days,
            team = ?options.team.map(|t| t.get()),
            dry_run = options.dry_run,
            "Starting export run"
        );
        if options.force {
            tracing::warn!("Force enabled: scans already delivered will be exported again");
        }

        self.services.scans.test_connection().await?;

        let timezone = self
            .config
            .export
            .timezone()
            .map_err(ScanfeedError::Configuration)?;
        let window = match options.as_of {
            Some(now) => TimeWindow::ending_at(now, options.window_days, timezone),
            None => TimeWindow::ending_now(options.window_days, timezone),
        };
        tracing::info!(
            start = %window.start,
            end = %window.end,
            timezone = window.timezone_name(),
            "Selection window"
        );

        let writer = CsvWriter::new(&self.config.export.output_dir);
        writer.prepare()?;

        let run_timestamp = chrono::Local::now().naive_local();
        let by_team = self
            .export_profiles(options, &window, &writer, run_timestamp, &mut summary)
            .await;

        if summary.interrupted {
            summary.partners_skipped = by_team.len();
            tracing::warn!(partners = by_team.len(), "Shutdown requested, skipping delivery");
        } else if options.dry_run {
            tracing::info!(teams = by_team.len(), "Dry run, skipping delivery");
        } else if !self.config.sftp.enabled {
            tracing::info!("SFTP delivery disabled, skipping delivery");
        } else if by_team.is_empty() {
            tracing::info!("No files written, nothing to deliver");
        } else {
            self.deliver_all(options, by_team, &mut summary).await?;
        }

        if *self.shutdown.borrow() {
            summary.interrupted = true;
        }

        summary = summary.with_duration(start_time.elapsed());
        summary.log_summary();

        Ok(summary)
    }

    /// Exports every requested profile, returning the written files by team
    async fn export_profiles(
        &self,
        options: &RunOptions,
        window: &TimeWindow,
        writer: &CsvWriter,
        run_timestamp: NaiveDateTime,
        summary: &mut RunSummary,
    ) -> BTreeMap<TeamId, Vec<ExportedFile>> {
        let fetcher = Fetcher::new(Arc::clone(&self.services.scans));
        let parallel = self.config.export.parallel_profiles.max(1);

        let results: Vec<(ScanType, Result<ProfileOutcome>)> =
            stream::iter(options.scan_types.iter().copied())
                .map(|scan_type| {
                    let fetcher = &fetcher;
                    async move {
                        let outcome = self
                            .export_profile(scan_type, fetcher, writer, window, options, run_timestamp)
                            .await;
                        (scan_type, outcome)
                    }
                })
                .buffer_unordered(parallel)
                .collect()
                .await;

        let mut by_team: BTreeMap<TeamId, Vec<ExportedFile>> = BTreeMap::new();

        for (scan_type, result) in results {
            match result {
                Ok(ProfileOutcome::Exported { records, files }) => {
                    summary.profiles_exported += 1;
                    summary.records_fetched += records;
                    for file in files {
                        summary.files.push(FileReport {
                            scan_type,
                            team_id: file.team_id,
                            path: file.path.clone(),
                            rows: file.rows,
                            bytes: file.bytes,
                        });
                        by_team.entry(file.team_id).or_default().push(file);
                    }
                }
                Ok(ProfileOutcome::Interrupted) => {
                    summary.interrupted = true;
                    tracing::warn!(scan_type = %scan_type, "Profile export interrupted");
                }
                Err(e) => {
                    tracing::error!(scan_type = %scan_type, error = %e, "Profile export failed");
                    summary.profiles_failed += 1;
                    summary.add_error(
                        RunError::new(error_type(&e), e.to_string())
                            .with_context(format!("scan_type={scan_type}")),
                    );
                }
            }
        }

        by_team
    }

    async fn export_profile(
        &self,
        scan_type: ScanType,
        fetcher: &Fetcher,
        writer: &CsvWriter,
        window: &TimeWindow,
        options: &RunOptions,
        run_timestamp: NaiveDateTime,
    ) -> Result<ProfileOutcome> {
        let mut shutdown = self.shutdown.clone();
        if *shutdown.borrow() {
            return Ok(ProfileOutcome::Interrupted);
        }

        let profile = scan_type.profile();
        let records = tokio::select! {
            fetched = fetcher.fetch(profile, window, options.team, options.force) => fetched?,
            _ = wait_for_shutdown(&mut shutdown) => return Ok(ProfileOutcome::Interrupted),
        };

        let grouped = transform::group(&records, profile)?;
        let files = writer.write(&grouped, profile, run_timestamp)?;

        tracing::info!(
            scan_type = %scan_type,
            records = records.len(),
            files = files.len(),
            "Exported profile"
        );

        Ok(ProfileOutcome::Exported {
            records: records.len(),
            files,
        })
    }

    /// Delivers every team's files to each of its partner credentials
    async fn deliver_all(
        &self,
        options: &RunOptions,
        mut by_team: BTreeMap<TeamId, Vec<ExportedFile>>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let envelope = Arc::new(Envelope::from_config(&self.config.encryption)?);
        let store = CredentialStore::new(
            Arc::clone(&self.services.credentials),
            envelope,
            self.config.sftp.default_upload_directory.clone(),
        );
        let outcomes = store.load(options.team).await?;

        let credentialed: BTreeSet<TeamId> = outcomes.iter().map(|o| o.team_id).collect();
        for team_id in by_team.keys().filter(|t| !credentialed.contains(t)) {
            tracing::warn!(team_id = %team_id, "No SFTP credentials for team, files kept locally");
        }
        by_team.retain(|team_id, _| credentialed.contains(team_id));

        let jobs: Vec<(CredentialOutcome, Vec<ExportedFile>)> = outcomes
            .into_iter()
            .filter_map(|outcome| {
                let files = by_team.get(&outcome.team_id)?.clone();
                Some((outcome, files))
            })
            .collect();

        let uploader = Uploader::new(
            Arc::clone(&self.services.transport),
            UploadSettings::from(&self.config.sftp),
            self.shutdown.clone(),
        );
        let parallel = self.config.sftp.max_concurrent_partners.max(1);

        tracing::info!(partners = jobs.len(), parallel, "Delivering to partners");

        let runs: Vec<PartnerRun> = stream::iter(jobs)
            .map(|(outcome, files)| {
                let uploader = &uploader;
                async move { self.deliver_partner(uploader, outcome, files).await }
            })
            .buffer_unordered(parallel)
            .collect()
            .await;

        for run in runs {
            match run {
                PartnerRun::Delivered { outcome, errors } => {
                    summary.deliveries.push(outcome);
                    summary.errors.extend(errors);
                }
                PartnerRun::Skipped => {
                    summary.partners_skipped += 1;
                    summary.interrupted = true;
                }
            }
        }

        Ok(())
    }

    async fn deliver_partner(
        &self,
        uploader: &Uploader,
        outcome: CredentialOutcome,
        files: Vec<ExportedFile>,
    ) -> PartnerRun {
        if *self.shutdown.borrow() {
            tracing::warn!(team_id = %outcome.team_id, "Shutdown requested, partner not contacted");
            return PartnerRun::Skipped;
        }

        let files_total = files.len();
        let scan_ids: Vec<ScanId> = files
            .iter()
            .flat_map(|f| f.scan_ids.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let fair_ids: Vec<FairId> = files
            .iter()
            .flat_map(|f| f.fair_ids.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let result = match outcome.credential {
            Ok(credential) => uploader.deliver(credential, files).await,
            Err(e) => UploadResult::failure(outcome.team_id, format!("Credential error: {e}")),
        };

        let mut partner = PartnerOutcome {
            team_id: outcome.team_id,
            credential_id: outcome.credential_id,
            status: result.status,
            files_uploaded: result.files_uploaded,
            files_total,
            error_summary: result.error_summary.clone(),
            ledger_id: None,
            scans_marked: 0,
        };
        let mut errors = Vec::new();
        let context = format!("team_id={}", outcome.team_id);

        if let Some(summary) = &result.error_summary {
            errors.push(RunError::new(RunErrorType::Delivery, summary.clone()).with_context(&context));
        }

        let ledger_id = match self.services.ledger.record(&result).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(team_id = %outcome.team_id, error = %e, "Failed to record delivery");
                errors.push(RunError::new(RunErrorType::Ledger, e.to_string()).with_context(&context));
                return PartnerRun::Delivered {
                    outcome: partner,
                    errors,
                };
            }
        };
        partner.ledger_id = Some(ledger_id);

        if result.is_success() {
            match self.services.ledger.mark_delivered(&scan_ids, ledger_id).await {
                Ok(marked) => partner.scans_marked = marked,
                Err(e) => {
                    tracing::error!(team_id = %outcome.team_id, error = %e, "Failed to link delivered scans");
                    errors.push(RunError::new(RunErrorType::Ledger, e.to_string()).with_context(&context));
                }
            }

            if let Err(e) = self.services.ledger.record_events(ledger_id, &fair_ids).await {
                tracing::error!(team_id = %outcome.team_id, error = %e, "Failed to record delivery events");
                errors.push(RunError::new(RunErrorType::Ledger, e.to_string()).with_context(&context));
            }
        }

        tracing::info!(
            team_id = %outcome.team_id,
            credential_id = %outcome.credential_id,
            status = %result.status,
            files_uploaded = result.files_uploaded,
            files_total,
            ledger_id = %ledger_id,
            scans_marked = partner.scans_marked,
            "Partner delivery finished"
        );

        PartnerRun::Delivered {
            outcome: partner,
            errors,
        }
    }
}

/// Resolves once shutdown has been requested; never resolves if the sender is gone
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn error_type(error: &ScanfeedError) -> RunErrorType {
    match error {
        ScanfeedError::Query(_) => RunErrorType::Query,
        ScanfeedError::Database(_) => RunErrorType::Connection,
        ScanfeedError::Transform(_) => RunErrorType::Transformation,
        ScanfeedError::Io(_) => RunErrorType::Io,
        ScanfeedError::Credential(_) => RunErrorType::Credential,
        ScanfeedError::Delivery(_) => RunErrorType::Delivery,
        ScanfeedError::Configuration(_) | ScanfeedError::Validation(_) => {
            RunErrorType::Configuration
        }
        ScanfeedError::Serialization(_) | ScanfeedError::Other(_) => RunErrorType::Transformation,
    }
}
