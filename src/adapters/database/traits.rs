//! Database abstraction traits
//!
//! This module defines the traits that database adapters must implement
//! to feed the export pipeline and record deliveries.

use crate::core::fetch::catalog::DemographicKind;
use crate::core::fetch::query::ScanQuery;
use crate::domain::delivery::UploadResult;
use crate::domain::ids::{CredentialId, FairId, LedgerId, ScanId, TeamId};
use crate::domain::record::ScanRecord;
use crate::domain::Result;
use async_trait::async_trait;

/// One row of the base scan query
#[derive(Debug, Clone)]
pub struct ScanRow {
    /// Student the scan belongs to, used to join attributes and flags
    pub student_id: i64,

    /// Record with every base column already set
    pub record: ScanRecord,
}

/// One free-form attribute value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRow {
    pub student_id: i64,
    pub key: String,
    pub value: Option<String>,
}

/// One ethnicity or race link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemographicRow {
    pub student_id: i64,
    pub kind: DemographicKind,
    pub code: i32,
}

/// Stored SFTP credential row, with secret columns still encrypted
#[derive(Debug, Clone, Default)]
pub struct CredentialRow {
    pub id: i64,
    pub team_id: i64,
    pub host: String,
    pub port: Option<String>,
    pub username: String,
    pub password: Option<String>,
    pub ssh_key: Option<String>,
    pub ssh_key_filename: Option<String>,
    pub passphrase: Option<String>,
    pub upload_directory: Option<String>,
    pub notification_email: Option<String>,
}

impl CredentialRow {
    pub fn credential_id(&self) -> CredentialId {
        CredentialId::new(self.id)
    }

    pub fn team(&self) -> TeamId {
        TeamId::new(self.team_id)
    }
}

/// Read side of the scan tables
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Test the database connection
    ///
    /// # Errors
    ///
    /// Returns an error if the connection test fails.
    async fn test_connection(&self) -> Result<()>;

    /// Run the base scan query
    ///
    /// # Errors
    ///
    /// Returns `ScanfeedError::Query` on SQL failure or statement timeout.
    async fn fetch_scans(&self, query: &ScanQuery) -> Result<Vec<ScanRow>>;

    /// Load attribute values for `student_ids` restricted to `keys`
    ///
    /// Rows must be ordered by student and then attribute value id.
    async fn fetch_attributes(
        &self,
        student_ids: &[i64],
        keys: &[&'static str],
    ) -> Result<Vec<AttributeRow>>;

    /// Load ethnicity and race links for `student_ids`
    async fn fetch_demographics(&self, student_ids: &[i64]) -> Result<Vec<DemographicRow>>;
}

/// Source of stored partner credentials
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Fetch credential rows, optionally for one team only
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails. Callers treat this as fatal.
    async fn fetch_credentials(&self, team: Option<TeamId>) -> Result<Vec<CredentialRow>>;
}

/// Append-only delivery ledger
#[async_trait]
pub trait DeliveryLedger: Send + Sync {
    /// Insert one outcome row and return its id
    async fn record(&self, result: &UploadResult) -> Result<LedgerId>;

    /// Link scans to a ledger row
    ///
    /// An empty `scan_ids` slice performs no write and returns 0.
    async fn mark_delivered(&self, scan_ids: &[ScanId], ledger_id: LedgerId) -> Result<u64>;

    /// Insert one `fair` event row per fair id
    ///
    /// An empty `fair_ids` slice performs no write and returns 0.
    async fn record_events(&self, ledger_id: LedgerId, fair_ids: &[FairId]) -> Result<u64>;
}
