//! CSV file writer
//!
//! Writes one file per team under `<output_root>/<team>/`. Groups holding
//! only a header produce no file.

use crate::core::profile::ScanTypeProfile;
use crate::core::transform::{GroupedExport, TeamRows};
use crate::domain::result::Result;
use crate::domain::{FairId, ScanId, ScanfeedError, TeamId};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// A CSV file written for one team
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub team_id: TeamId,
    pub path: PathBuf,

    /// Data rows, excluding the header
    pub rows: usize,

    /// Size on disk after flush
    pub bytes: u64,

    pub scan_ids: Vec<ScanId>,
    pub fair_ids: Vec<FairId>,
}

impl ExportedFile {
    /// File name without the directory
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Writes grouped exports below an output root
#[derive(Debug, Clone)]
pub struct CsvWriter {
    output_root: PathBuf,
}

impl CsvWriter {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Creates the output root if needed
    ///
    /// # Errors
    ///
    /// Returns `ScanfeedError::Io` when the directory cannot be created.
    pub fn prepare(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_root).map_err(|e| {
            ScanfeedError::Io(format!(
                "Failed to create output directory {}: {}",
                self.output_root.display(),
                e
            ))
        })
    }

    /// Writes every non-empty group, returning the files in team order
    ///
    /// # Errors
    ///
    /// Returns `ScanfeedError::Io` on the first directory, write or flush
    /// failure. Files written before the failure stay on disk.
    pub fn write(
        &self,
        grouped: &GroupedExport,
        profile: &ScanTypeProfile,
        run_timestamp: NaiveDateTime,
    ) -> Result<Vec<ExportedFile>> {
        let file_name = profile.file_name(run_timestamp);
        let mut files = Vec::new();

        for (team_id, team) in grouped {
            if team.is_header_only() {
                tracing::debug!(team_id = %team_id, "Skipping team with no data rows");
                continue;
            }

            let dir = self.output_root.join(team_id.to_string());
            std::fs::create_dir_all(&dir).map_err(|e| {
                ScanfeedError::Io(format!(
                    "Failed to create output directory {} for team {}: {}",
                    dir.display(),
                    team_id,
                    e
                ))
            })?;

            let path = dir.join(&file_name);
            let bytes = write_table(&path, team)?;

            tracing::info!(
                team_id = %team_id,
                scan_type = %profile.scan_type,
                rows = team.data_rows(),
                bytes,
                path = %path.display(),
                "Wrote CSV file"
            );

            files.push(ExportedFile {
                team_id: *team_id,
                path,
                rows: team.data_rows(),
                bytes,
                scan_ids: team.scan_ids.clone(),
                fair_ids: team.fair_ids.iter().copied().collect(),
            });
        }

        Ok(files)
    }
}

fn write_table(path: &Path, team: &TeamRows) -> Result<u64> {
    let io_err = |e: &dyn std::fmt::Display| {
        ScanfeedError::Io(format!("Failed to write CSV file {}: {}", path.display(), e))
    };

    let mut writer = csv::Writer::from_path(path).map_err(|e| io_err(&e))?;
    for row in &team.rows {
        writer.write_record(row).map_err(|e| io_err(&e))?;
    }
    writer.flush().map_err(|e| io_err(&e))?;
    drop(writer);

    let metadata = std::fs::metadata(path).map_err(|e| io_err(&e))?;
    Ok(metadata.len())
}
