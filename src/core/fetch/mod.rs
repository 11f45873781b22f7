//! Scan fetching
//!
//! The fetcher runs a profile's base query, then collapses attribute values
//! and demographic links onto each record. Attributes are loaded only for the
//! keys the profile reads, and only for students returned by the base query.

pub mod catalog;
pub mod query;
pub mod window;

pub use catalog::{DemographicKind, FieldDef, FieldSource};
pub use query::ScanQuery;
pub use window::TimeWindow;

use crate::adapters::database::{AttributeRow, DemographicRow, ScanStore};
use crate::core::profile::ScanTypeProfile;
use crate::domain::result::Result;
use crate::domain::{FieldValue, ScanRecord, TeamId};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Loads scan records for one profile
pub struct Fetcher {
    store: Arc<dyn ScanStore>,
}

impl Fetcher {
    pub fn new(store: Arc<dyn ScanStore>) -> Self {
        Self { store }
    }

    /// Fetches every selectable record for `profile` in `window`
    ///
    /// Records come back in `(team, scan)` order. With `include_delivered`
    /// scans already linked to a delivery are selected too.
    ///
    /// # Errors
    ///
    /// Returns `ScanfeedError::Query` when any of the queries fail.
    pub async fn fetch(
        &self,
        profile: &ScanTypeProfile,
        window: &TimeWindow,
        team: Option<TeamId>,
        include_delivered: bool,
    ) -> Result<Vec<ScanRecord>> {
        let query = ScanQuery::build(profile, window, team, include_delivered);
        tracing::debug!(
            scan_type = %profile.scan_type,
            sql = %query.sql,
            start = %query.start,
            end = %query.end,
            timezone = %query.timezone,
            "Executing scan query"
        );

        let rows = self.store.fetch_scans(&query).await?;
        if rows.is_empty() {
            tracing::info!(scan_type = %profile.scan_type, "No scans selected");
            return Ok(Vec::new());
        }

        let student_ids: Vec<i64> = rows
            .iter()
            .map(|r| r.student_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let fields = profile.fields();
        let keys: Vec<&'static str> = fields
            .iter()
            .filter_map(|f| f.attribute())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let needs_flags = fields
            .iter()
            .any(|f| matches!(f.source, FieldSource::Demographic(..)));

        let attributes = if keys.is_empty() {
            HashMap::new()
        } else {
            collapse_attributes(self.store.fetch_attributes(&student_ids, &keys).await?)
        };
        let flags = if needs_flags {
            collapse_demographics(self.store.fetch_demographics(&student_ids).await?)
        } else {
            HashMap::new()
        };

        let records: Vec<ScanRecord> = rows
            .into_iter()
            .map(|row| {
                let mut record = row.record;
                for def in &fields {
                    apply_field(&mut record, def, row.student_id, &attributes, &flags);
                }
                record
            })
            .collect();

        tracing::info!(
            scan_type = %profile.scan_type,
            records = records.len(),
            students = student_ids.len(),
            "Fetched scans"
        );
        Ok(records)
    }
}

type AttributeMap = HashMap<(i64, String), String>;
type FlagMap = HashMap<i64, HashSet<(DemographicKind, i32)>>;

/// Keeps the first non-null value per `(student, key)`
fn collapse_attributes(rows: Vec<AttributeRow>) -> AttributeMap {
    let mut map = AttributeMap::new();
    for row in rows {
        if let Some(value) = row.value {
            map.entry((row.student_id, row.key)).or_insert(value);
        }
    }
    map
}

fn collapse_demographics(rows: Vec<DemographicRow>) -> FlagMap {
    let mut map = FlagMap::new();
    for row in rows {
        map.entry(row.student_id)
            .or_default()
            .insert((row.kind, row.code));
    }
    map
}

fn apply_field(
    record: &mut ScanRecord,
    def: &FieldDef,
    student_id: i64,
    attributes: &AttributeMap,
    flags: &FlagMap,
) {
    let attribute = |key: &str| attributes.get(&(student_id, key.to_string())).cloned();

    match def.source {
        FieldSource::Column(_) => {}
        FieldSource::Attribute(key) => {
            record.set_opt(def.name, attribute(key));
        }
        FieldSource::ColumnOrAttribute { attribute: key, .. } => {
            if !record.is_set(def.name) {
                record.set_opt(def.name, attribute(key));
            }
        }
        FieldSource::Demographic(kind, code) => {
            let linked = flags
                .get(&student_id)
                .map(|set| set.contains(&(kind, code)))
                .unwrap_or(false);
            record.set(def.name, FieldValue::Boolean(linked));
        }
    }
}
