//! PostgreSQL adapter implementing database traits
//!
//! This module implements [`ScanStore`], [`CredentialSource`] and
//! [`DeliveryLedger`] over one pooled [`PostgreSQLClient`].

use crate::adapters::database::traits::{
    AttributeRow, CredentialRow, CredentialSource, DeliveryLedger, DemographicRow, ScanRow,
    ScanStore,
};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::config::DatabaseConfig;
use crate::core::fetch::catalog::{DemographicKind, FieldDef};
use crate::core::fetch::query::{ScanQuery, ATTRIBUTE_SQL, DEMOGRAPHIC_SQL, KEY_COLUMNS};
use crate::domain::{
    FairId, FieldKind, LedgerId, Result, ScanId, ScanRecord, ScanfeedError, TeamId, UploadResult,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::Arc;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

const CREDENTIALS_SQL: &str = "SELECT id::bigint, team_id::bigint, host, port::text, username,
       password, ssh_key, ssh_key_filename, passphrase, upload_directory, notification_email
FROM sftp_credentials";

const INSERT_LEDGER_SQL: &str = "INSERT INTO sftp_updates
    (status, team_id, error, error_description, created_at, updated_at, type)
VALUES ($1::text, $2::bigint, $3::text, $4::text, $5::timestamp, $6::timestamp, $7::text)
RETURNING id::bigint";

const MARK_DELIVERED_SQL: &str = "UPDATE user_fair_students
SET sftp_update_id = $1::bigint
WHERE id = ANY($2::bigint[])";

const INSERT_EVENTS_SQL: &str = "INSERT INTO sftp_update_events
    (sftp_update_id, type, event_id, created_at, updated_at)
SELECT $1::bigint, 'fair', fair_id, now(), now()
FROM unnest($2::bigint[]) AS fair_id";

/// Ledger `error` column value for failed deliveries
const FAILURE_ERROR: &str = "Failed to upload files";

/// PostgreSQL implementation of database traits
pub struct PostgreSQLAdapter {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLAdapter {
    /// Create the pool and wrap it in an adapter
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let client = PostgreSQLClient::new(config.clone()).await?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

#[async_trait]
impl ScanStore for PostgreSQLAdapter {
    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn fetch_scans(&self, query: &ScanQuery) -> Result<Vec<ScanRow>> {
        let team = query.team.map(TeamId::get);
        let mut params: Vec<&(dyn ToSql + Sync)> = vec![
            &query.student_type,
            &query.timezone,
            &query.start,
            &query.end,
        ];
        if let Some(team) = &team {
            params.push(team);
        }

        let rows = self.client.query(&query.sql, &params).await?;
        rows.iter()
            .map(|row| decode_scan_row(row, &query.columns))
            .collect()
    }

    async fn fetch_attributes(
        &self,
        student_ids: &[i64],
        keys: &[&'static str],
    ) -> Result<Vec<AttributeRow>> {
        if student_ids.is_empty() || keys.is_empty() {
            return Ok(Vec::new());
        }

        let ids = student_ids.to_vec();
        let names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let rows = self.client.query(ATTRIBUTE_SQL, &[&ids, &names]).await?;

        rows.iter()
            .map(|row| {
                Ok(AttributeRow {
                    student_id: cell(row, 0)?,
                    key: cell(row, 1)?,
                    value: cell(row, 2)?,
                })
            })
            .collect()
    }

    async fn fetch_demographics(&self, student_ids: &[i64]) -> Result<Vec<DemographicRow>> {
        if student_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = student_ids.to_vec();
        let rows = self.client.query(DEMOGRAPHIC_SQL, &[&ids]).await?;

        rows.iter()
            .map(|row| {
                let kind: String = cell(row, 1)?;
                let kind = DemographicKind::parse(&kind).ok_or_else(|| {
                    ScanfeedError::Query(format!("Unknown demographic kind '{kind}'"))
                })?;
                Ok(DemographicRow {
                    student_id: cell(row, 0)?,
                    kind,
                    code: cell(row, 2)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl CredentialSource for PostgreSQLAdapter {
    async fn fetch_credentials(&self, team: Option<TeamId>) -> Result<Vec<CredentialRow>> {
        let rows = match team {
            Some(team) => {
                let sql = format!("{CREDENTIALS_SQL}\nWHERE team_id = $1::bigint\nORDER BY id");
                self.client.query(&sql, &[&team.get()]).await?
            }
            None => {
                let sql = format!("{CREDENTIALS_SQL}\nORDER BY id");
                self.client.query(&sql, &[]).await?
            }
        };

        rows.iter()
            .map(|row| {
                Ok(CredentialRow {
                    id: cell(row, 0)?,
                    team_id: cell(row, 1)?,
                    host: cell(row, 2)?,
                    port: cell(row, 3)?,
                    username: cell(row, 4)?,
                    password: cell(row, 5)?,
                    ssh_key: cell(row, 6)?,
                    ssh_key_filename: cell(row, 7)?,
                    passphrase: cell(row, 8)?,
                    upload_directory: cell(row, 9)?,
                    notification_email: cell(row, 10)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl DeliveryLedger for PostgreSQLAdapter {
    async fn record(&self, result: &UploadResult) -> Result<LedgerId> {
        let (error, description) = match &result.error_summary {
            Some(summary) if !result.is_success() => (FAILURE_ERROR, summary.as_str()),
            _ => ("", ""),
        };
        let status = result.status.as_str();
        let team = result.team_id.get();
        let kind = result.kind();

        let row = self
            .client
            .query_one(
                INSERT_LEDGER_SQL,
                &[
                    &status,
                    &team,
                    &error,
                    &description,
                    &result.created_at,
                    &result.updated_at,
                    &kind,
                ],
            )
            .await?;

        let id: i64 = cell(&row, 0)?;
        tracing::debug!(ledger_id = id, team_id = team, status, "Recorded delivery");
        Ok(LedgerId::new(id))
    }

    async fn mark_delivered(&self, scan_ids: &[ScanId], ledger_id: LedgerId) -> Result<u64> {
        if scan_ids.is_empty() {
            return Ok(0);
        }

        let ids: Vec<i64> = scan_ids.iter().map(|id| id.get()).collect();
        self.client
            .execute(MARK_DELIVERED_SQL, &[&ledger_id.get(), &ids])
            .await
    }

    async fn record_events(&self, ledger_id: LedgerId, fair_ids: &[FairId]) -> Result<u64> {
        if fair_ids.is_empty() {
            return Ok(0);
        }

        let ids: Vec<i64> = fair_ids.iter().map(|id| id.get()).collect();
        self.client
            .execute(INSERT_EVENTS_SQL, &[&ledger_id.get(), &ids])
            .await
    }
}

fn cell<'a, T>(row: &'a Row, index: usize) -> Result<T>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get(index)
        .map_err(|e| ScanfeedError::Query(format!("Failed to decode column {index}: {e}")))
}

/// Decodes the key columns followed by one column per field, in query order
fn decode_scan_row(row: &Row, columns: &[&'static FieldDef]) -> Result<ScanRow> {
    let mut record = ScanRecord::new(
        ScanId::new(cell(row, 0)?),
        TeamId::new(cell(row, 1)?),
        FairId::new(cell(row, 2)?),
    );
    let student_id: i64 = cell(row, 3)?;

    for (offset, def) in columns.iter().enumerate() {
        let index = KEY_COLUMNS + offset;
        match def.kind {
            FieldKind::Text => record.set_opt(def.name, cell::<Option<String>>(row, index)?),
            FieldKind::Integer => record.set_opt(def.name, cell::<Option<i64>>(row, index)?),
            FieldKind::Boolean => record.set_opt(def.name, cell::<Option<bool>>(row, index)?),
            FieldKind::Timestamp => {
                record.set_opt(def.name, cell::<Option<NaiveDateTime>>(row, index)?)
            }
        }
    }

    Ok(ScanRow { student_id, record })
}
