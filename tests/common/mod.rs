//! In-memory stand-ins for the scan database and partner SFTP servers

#![allow(dead_code)]

use async_trait::async_trait;
use scanfeed::adapters::database::{
    AttributeRow, CredentialRow, CredentialSource, DeliveryLedger, DemographicRow, ScanRow,
    ScanStore,
};
use scanfeed::adapters::sftp::{AuthMethod, RemoteSession, SftpTransport};
use scanfeed::config::{parse_config, secret_string, ScanfeedConfig};
use scanfeed::core::credentials::Envelope;
use scanfeed::core::export::Services;
use scanfeed::core::fetch::{ScanQuery, TimeWindow};
use scanfeed::domain::{
    DeliveryError, FairId, LedgerId, Result, ScanId, ScanRecord, ScanfeedError, SftpCredential,
    TeamId, UploadResult, UploadStatus,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const APP_KEY: &str = "base64:MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

/// Student type code of the student profile
pub const STUDENT_TYPE: i32 = 1;

/// Fixed end of the selection window: 12:00 on 2025-01-10 in Chicago
pub fn as_of() -> DateTime<Utc> {
    Utc.from_utc_datetime(&local(2025, 1, 10, 18, 0))
}

/// Wall-clock time without a zone
pub fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

/// Configuration pointing the output root at `output_dir`
pub fn test_config(output_dir: &Path) -> ScanfeedConfig {
    let toml = format!(
        r#"
environment = "development"

[database]
connection_string = "postgresql://exporter:pw@localhost:5432/fairs"

[export]
output_dir = "{}"
reference_timezone = "America/Chicago"
default_window_days = 3
parallel_profiles = 2

[encryption]
key = "{APP_KEY}"

[sftp]
enabled = true
connect_timeout_seconds = 5
file_timeout_seconds = 30
max_concurrent_partners = 2
chunk_size_bytes = 1024
host_key_policy = "accept_any"

[logging]
local_enabled = false
"#,
        output_dir.display().to_string().replace('\\', "/")
    );
    parse_config(&toml).expect("test config should parse")
}

pub fn envelope() -> Envelope {
    Envelope::new(&secret_string(APP_KEY.to_string()), true).expect("test key is valid")
}

/// One stored scan and its delivery link
#[derive(Debug, Clone)]
pub struct StoredScan {
    pub student_id: i64,
    pub student_type: i32,
    pub record: ScanRecord,
    pub delivered: Option<LedgerId>,

    /// Fair end time, in `fair_zone`
    pub ends_at: NaiveDateTime,
    pub fair_zone: Tz,
}

/// Ledger row written by the coordinator
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub id: LedgerId,
    pub team_id: TeamId,
    pub status: UploadStatus,
    pub error_summary: Option<String>,
}

/// Scan database honouring the delivery link
#[derive(Default)]
pub struct FakeDatabase {
    pub scans: Mutex<Vec<StoredScan>>,
    pub attributes: Mutex<Vec<AttributeRow>>,
    pub demographics: Mutex<Vec<DemographicRow>>,
    pub credentials: Mutex<Vec<CredentialRow>>,
    pub ledger: Mutex<Vec<LedgerEntry>>,
    pub events: Mutex<Vec<(LedgerId, FairId)>>,
    pub unreachable: bool,
}

impl FakeDatabase {
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// Adds a scan from a fair that ended a day before [`as_of`]
    pub fn add_scan(&self, student_id: i64, record: ScanRecord) {
        self.add_scan_ending(
            student_id,
            record,
            local(2025, 1, 9, 12, 0),
            chrono_tz::America::Chicago,
        );
    }

    pub fn add_scan_ending(
        &self,
        student_id: i64,
        record: ScanRecord,
        ends_at: NaiveDateTime,
        fair_zone: Tz,
    ) {
        self.scans.lock().unwrap().push(StoredScan {
            student_id,
            student_type: STUDENT_TYPE,
            record,
            delivered: None,
            ends_at,
            fair_zone,
        });
    }

    pub fn add_attribute(&self, student_id: i64, key: &str, value: &str) {
        self.attributes.lock().unwrap().push(AttributeRow {
            student_id,
            key: key.to_string(),
            value: Some(value.to_string()),
        });
    }

    pub fn add_demographic(&self, row: DemographicRow) {
        self.demographics.lock().unwrap().push(row);
    }

    /// Stores a password credential encrypted under [`APP_KEY`]
    pub fn add_credential(&self, id: i64, team_id: i64, password: &str) {
        let encrypted = envelope().encrypt(password).expect("encrypts");
        self.credentials.lock().unwrap().push(CredentialRow {
            id,
            team_id,
            host: "sftp.partner.test".to_string(),
            port: Some("22".to_string()),
            username: format!("team{team_id}"),
            password: Some(encrypted),
            ..CredentialRow::default()
        });
    }

    pub fn add_raw_credential(&self, row: CredentialRow) {
        self.credentials.lock().unwrap().push(row);
    }

    pub fn delivered(&self, scan_id: ScanId) -> Option<LedgerId> {
        self.scans
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.record.scan_id == scan_id)
            .and_then(|s| s.delivered)
    }

    pub fn ledger(&self) -> Vec<LedgerEntry> {
        self.ledger.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<(LedgerId, FairId)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScanStore for FakeDatabase {
    async fn test_connection(&self) -> Result<()> {
        if self.unreachable {
            return Err(ScanfeedError::Database(
                "Failed to get connection from pool: connection refused".to_string(),
            ));
        }
        Ok(())
    }

    async fn fetch_scans(&self, query: &ScanQuery) -> Result<Vec<ScanRow>> {
        let window = TimeWindow {
            start: query.start,
            end: query.end,
            timezone: query
                .timezone
                .parse()
                .map_err(|e| ScanfeedError::Database(format!("bad timezone: {e}")))?,
            days: 0,
        };
        let mut rows: Vec<ScanRow> = self
            .scans
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.student_type == query.student_type)
            .filter(|s| query.include_delivered || s.delivered.is_none())
            .filter(|s| query.team.map_or(true, |t| s.record.team_id == t))
            .filter(|s| window.selects(s.ends_at, s.fair_zone))
            .map(|s| ScanRow {
                student_id: s.student_id,
                record: s.record.clone(),
            })
            .collect();
        rows.sort_by_key(|r| (r.record.team_id, r.record.scan_id));
        Ok(rows)
    }

    async fn fetch_attributes(
        &self,
        student_ids: &[i64],
        keys: &[&'static str],
    ) -> Result<Vec<AttributeRow>> {
        Ok(self
            .attributes
            .lock()
            .unwrap()
            .iter()
            .filter(|a| student_ids.contains(&a.student_id) && keys.contains(&a.key.as_str()))
            .cloned()
            .collect())
    }

    async fn fetch_demographics(&self, student_ids: &[i64]) -> Result<Vec<DemographicRow>> {
        Ok(self
            .demographics
            .lock()
            .unwrap()
            .iter()
            .filter(|d| student_ids.contains(&d.student_id))
            .copied()
            .collect())
    }
}

#[async_trait]
impl CredentialSource for FakeDatabase {
    async fn fetch_credentials(&self, team: Option<TeamId>) -> Result<Vec<CredentialRow>> {
        Ok(self
            .credentials
            .lock()
            .unwrap()
            .iter()
            .filter(|c| team.map_or(true, |t| c.team() == t))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DeliveryLedger for FakeDatabase {
    async fn record(&self, result: &UploadResult) -> Result<LedgerId> {
        let mut ledger = self.ledger.lock().unwrap();
        let id = LedgerId::new(ledger.len() as i64 + 1);
        ledger.push(LedgerEntry {
            id,
            team_id: result.team_id,
            status: result.status,
            error_summary: result.error_summary.clone(),
        });
        Ok(id)
    }

    async fn mark_delivered(&self, scan_ids: &[ScanId], ledger_id: LedgerId) -> Result<u64> {
        let mut marked = 0;
        for scan in self.scans.lock().unwrap().iter_mut() {
            if scan_ids.contains(&scan.record.scan_id) {
                scan.delivered = Some(ledger_id);
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn record_events(&self, ledger_id: LedgerId, fair_ids: &[FairId]) -> Result<u64> {
        let mut events = self.events.lock().unwrap();
        for fair in fair_ids {
            events.push((ledger_id, *fair));
        }
        Ok(fair_ids.len() as u64)
    }
}

/// Partner SFTP server kept in memory
#[derive(Default)]
pub struct FakeServer {
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub removed: Mutex<Vec<String>>,
    pub connects: AtomicUsize,

    /// Password the server accepts; any password when `None`
    pub accepted_password: Option<String>,

    /// Size reported by stat instead of the stored length
    pub reported_size: Option<u64>,

    /// Pause before every write
    pub write_delay: Option<Duration>,
}

impl FakeServer {
    pub fn accepting(password: &str) -> Self {
        Self {
            accepted_password: Some(password.to_string()),
            ..Self::default()
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }
}

pub struct FakeTransport(pub Arc<FakeServer>);

impl SftpTransport for FakeTransport {
    fn connect(
        &self,
        credential: &SftpCredential,
        auth: &AuthMethod,
        _timeout: Duration,
    ) -> std::result::Result<Box<dyn RemoteSession>, DeliveryError> {
        use secrecy::ExposeSecret;

        self.0.connects.fetch_add(1, Ordering::SeqCst);

        if let (Some(accepted), AuthMethod::Password(supplied)) =
            (&self.0.accepted_password, auth)
        {
            if supplied.expose_secret().as_ref() != accepted.as_str() {
                return Err(DeliveryError::Auth {
                    username: credential.username.clone(),
                    message: "Authentication failed (password)".to_string(),
                });
            }
        }

        Ok(Box::new(FakeSession(Arc::clone(&self.0))))
    }
}

struct FakeSession(Arc<FakeServer>);

impl RemoteSession for FakeSession {
    fn create(&mut self, path: &str) -> std::result::Result<Box<dyn Write + Send>, String> {
        self.0
            .files
            .lock()
            .unwrap()
            .insert(path.to_string(), Vec::new());
        Ok(Box::new(FakeWriter {
            server: Arc::clone(&self.0),
            path: path.to_string(),
        }))
    }

    fn size(&mut self, path: &str) -> std::result::Result<u64, String> {
        if let Some(size) = self.0.reported_size {
            return Ok(size);
        }
        self.0
            .files
            .lock()
            .unwrap()
            .get(path)
            .map(|f| f.len() as u64)
            .ok_or_else(|| format!("no such file: {path}"))
    }

    fn remove(&mut self, path: &str) -> std::result::Result<(), String> {
        self.0.files.lock().unwrap().remove(path);
        self.0.removed.lock().unwrap().push(path.to_string());
        Ok(())
    }

    fn disconnect(&mut self) {}
}

struct FakeWriter {
    server: Arc<FakeServer>,
    path: String,
}

impl Write for FakeWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Some(delay) = self.server.write_delay {
            std::thread::sleep(delay);
        }
        self.server
            .files
            .lock()
            .unwrap()
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub fn services(database: &Arc<FakeDatabase>, server: &Arc<FakeServer>) -> Services {
    Services {
        scans: database.clone(),
        credentials: database.clone(),
        ledger: database.clone(),
        transport: Arc::new(FakeTransport(Arc::clone(server))),
    }
}
