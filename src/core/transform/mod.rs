//! Grouping and rendering
//!
//! Turns fetched records into one CSV table per team. Each table starts with
//! the profile's header row; data rows keep fetch order. Alongside the rows
//! the group tracks which scans and fairs it contains, so a successful
//! delivery can link exactly those scans.
//!
//! Grouping is pure: the same records always produce the same tables.

use crate::core::profile::ScanTypeProfile;
use crate::domain::result::Result;
use crate::domain::{FairId, ScanId, ScanRecord, TeamId};
use std::collections::{BTreeMap, BTreeSet};

/// Rendered rows for one team
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRows {
    /// Header followed by data rows
    pub rows: Vec<Vec<String>>,

    /// Scan ids in row order
    pub scan_ids: Vec<ScanId>,

    /// Distinct fairs represented in the rows
    pub fair_ids: BTreeSet<FairId>,
}

impl TeamRows {
    fn new(header: Vec<String>) -> Self {
        Self {
            rows: vec![header],
            scan_ids: Vec::new(),
            fair_ids: BTreeSet::new(),
        }
    }

    /// Number of data rows, excluding the header
    pub fn data_rows(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    pub fn is_header_only(&self) -> bool {
        self.data_rows() == 0
    }
}

/// Team id to rendered rows, in ascending team order
pub type GroupedExport = BTreeMap<TeamId, TeamRows>;

/// Renders `records` under `profile` and groups them by team
///
/// # Errors
///
/// Returns `ScanfeedError::Transform` for the first record holding a value
/// of the wrong kind for its column.
pub fn group(records: &[ScanRecord], profile: &ScanTypeProfile) -> Result<GroupedExport> {
    let header = profile.header();
    let mut grouped = GroupedExport::new();

    for record in records {
        let row = profile.render_row(record)?;
        let team = grouped
            .entry(record.team_id)
            .or_insert_with(|| TeamRows::new(header.clone()));
        team.rows.push(row);
        team.scan_ids.push(record.scan_id);
        team.fair_ids.insert(record.fair_id);
    }

    tracing::debug!(
        scan_type = %profile.scan_type,
        records = records.len(),
        teams = grouped.len(),
        "Grouped records by team"
    );
    Ok(grouped)
}
