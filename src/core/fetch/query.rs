//! Scan query builder
//!
//! Builds the parameterized base query for one profile. Parameters:
//!
//! | # | Type | Value |
//! |---|------|-------|
//! | `$1` | int | `student_type_id` |
//! | `$2` | text | reference time zone name |
//! | `$3` | timestamp | window start |
//! | `$4` | timestamp | window end |
//! | `$5` | bigint | team id (only when filtered) |

use super::catalog::FieldDef;
use super::window::TimeWindow;
use crate::core::profile::ScanTypeProfile;
use crate::domain::TeamId;
use chrono::NaiveDateTime;

const BASE_FROM: &str = "FROM user_fair_students ufs
JOIN students s ON ufs.student_id = s.id
JOIN fairs f ON ufs.fair_id = f.id
JOIN teams t ON ufs.current_team_id = t.id
LEFT JOIN addresses a ON s.address_id = a.id
LEFT JOIN phone_numbers pn ON s.phone_number_id = pn.id
LEFT JOIN users u ON u.id = ufs.user_id";

/// Number of identity columns selected ahead of the field columns
pub const KEY_COLUMNS: usize = 4;

/// A built scan query with its bind values
#[derive(Debug, Clone)]
pub struct ScanQuery {
    pub sql: String,

    /// Field columns in select order, following the key columns
    pub columns: Vec<&'static FieldDef>,

    pub student_type: i32,
    pub timezone: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub team: Option<TeamId>,

    /// Whether already delivered scans are selected
    pub include_delivered: bool,
}

impl ScanQuery {
    /// Builds the query for `profile` over `window`
    ///
    /// With `include_delivered` the `sftp_update_id IS NULL` gate is omitted.
    pub fn build(
        profile: &ScanTypeProfile,
        window: &TimeWindow,
        team: Option<TeamId>,
        include_delivered: bool,
    ) -> Self {
        let columns: Vec<&'static FieldDef> = profile
            .fields()
            .into_iter()
            .filter(|f| f.column().is_some())
            .collect();

        let mut sql = String::from(
            "SELECT ufs.id::bigint AS scan_id, t.id::bigint AS team_id, \
             f.id::bigint AS fair_id, s.id::bigint AS student_id",
        );
        for def in &columns {
            if let Some(expr) = def.column() {
                sql.push_str(",\n    ");
                sql.push_str(expr);
                sql.push_str(" AS ");
                sql.push_str(def.name);
            }
        }

        sql.push('\n');
        sql.push_str(BASE_FROM);
        sql.push_str(
            "\nWHERE s.student_type_id = $1::int\n  \
             AND ((f.ends_at AT TIME ZONE f.ends_at_timezone) AT TIME ZONE $2::text) \
             BETWEEN $3::timestamp AND $4::timestamp",
        );
        if !include_delivered {
            sql.push_str("\n  AND ufs.sftp_update_id IS NULL");
        }
        if team.is_some() {
            sql.push_str("\n  AND t.id = $5::bigint");
        }
        sql.push_str("\nORDER BY t.id, ufs.id");

        Self {
            sql,
            columns,
            student_type: profile.code,
            timezone: window.timezone_name().to_string(),
            start: window.start,
            end: window.end,
            team,
            include_delivered,
        }
    }
}

/// Attribute values for a set of students, restricted to the requested keys
///
/// `$1` bigint[] student ids, `$2` text[] attribute names. Rows are ordered
/// by attribute value id so that the first non-null value per key wins.
pub const ATTRIBUTE_SQL: &str = "SELECT sav.student_id::bigint, sa.name, sav.value
FROM student_attribute_values sav
JOIN student_attributes sa ON sav.student_attribute_id = sa.id
WHERE sav.student_id::bigint = ANY($1::bigint[])
  AND sa.name = ANY($2::text[])
ORDER BY sav.student_id, sav.id";

/// Ethnicity and race links for a set of students (`$1` bigint[])
pub const DEMOGRAPHIC_SQL: &str = "SELECT es.student_id::bigint, 'ethnicity'::text AS kind, es.ethnicity_id::int AS code
FROM ethnicity_student es
WHERE es.student_id::bigint = ANY($1::bigint[])
UNION ALL
SELECT rs.student_id::bigint, 'race'::text AS kind, rs.race_id::int AS code
FROM race_student rs
WHERE rs.student_id::bigint = ANY($1::bigint[])";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::profile::{PROFESSIONAL, STUDENT};
    use chrono::{TimeZone, Utc};

    fn window() -> TimeWindow {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 18, 0, 0).unwrap();
        TimeWindow::ending_at(now, 3, chrono_tz::America::Chicago)
    }

    #[test]
    fn test_default_query_gates_delivered_scans() {
        let query = ScanQuery::build(&STUDENT, &window(), None, false);
        assert!(query.sql.contains("ufs.sftp_update_id IS NULL"));
        assert!(!query.sql.contains("$5"));
        assert!(query.sql.ends_with("ORDER BY t.id, ufs.id"));
        assert_eq!(query.student_type, 1);
        assert_eq!(query.timezone, "America/Chicago");
    }

    #[test]
    fn test_forced_query_skips_gate() {
        let query = ScanQuery::build(&STUDENT, &window(), None, true);
        assert!(!query.sql.contains("sftp_update_id"));
        assert!(query.include_delivered);
    }

    #[test]
    fn test_team_filter_binds_fifth_parameter() {
        let query = ScanQuery::build(&PROFESSIONAL, &window(), Some(TeamId::new(42)), false);
        assert!(query.sql.contains("t.id = $5::bigint"));
        assert_eq!(query.team, Some(TeamId::new(42)));
        assert_eq!(query.student_type, 6);
    }

    #[test]
    fn test_only_column_fields_are_selected() {
        let query = ScanQuery::build(&STUDENT, &window(), None, false);
        assert!(query.columns.iter().all(|f| f.column().is_some()));
        assert!(query.sql.contains("s.gpa::text AS gpa"));
        // Pure attributes and demographic flags are loaded separately
        assert!(!query.sql.contains("AS birthdate"));
        assert!(!query.sql.contains("AS race_white"));
    }
}
