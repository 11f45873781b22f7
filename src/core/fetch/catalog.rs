//! Field catalog
//!
//! Every field a profile can render, with its semantic kind and where the
//! fetcher reads it from. Base columns are SQL expressions over the scan
//! query's joins; attributes are rows of `student_attribute_values` keyed by
//! `student_attributes.name`; demographic flags come from the ethnicity and
//! race link tables.

use crate::domain::FieldKind;

/// Which demographic link table a flag is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DemographicKind {
    Ethnicity,
    Race,
}

impl DemographicKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemographicKind::Ethnicity => "ethnicity",
            DemographicKind::Race => "race",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ethnicity" => Some(DemographicKind::Ethnicity),
            "race" => Some(DemographicKind::Race),
            _ => None,
        }
    }
}

/// Where a field's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// SQL expression selected by the scan query
    Column(&'static str),
    /// Free-form attribute key
    Attribute(&'static str),
    /// Column value, falling back to the attribute when the column is null
    ColumnOrAttribute {
        column: &'static str,
        attribute: &'static str,
    },
    /// True when the student is linked to the given demographic code
    Demographic(DemographicKind, i32),
}

/// One catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub source: FieldSource,
}

impl FieldDef {
    /// SQL expression when the field is (partly) a base column
    pub fn column(&self) -> Option<&'static str> {
        match self.source {
            FieldSource::Column(expr) => Some(expr),
            FieldSource::ColumnOrAttribute { column, .. } => Some(column),
            _ => None,
        }
    }

    /// Attribute key when the field is (partly) an attribute
    pub fn attribute(&self) -> Option<&'static str> {
        match self.source {
            FieldSource::Attribute(key) => Some(key),
            FieldSource::ColumnOrAttribute { attribute, .. } => Some(attribute),
            _ => None,
        }
    }
}

const fn column(name: &'static str, kind: FieldKind, expr: &'static str) -> FieldDef {
    FieldDef {
        name,
        kind,
        source: FieldSource::Column(expr),
    }
}

const fn text(name: &'static str, expr: &'static str) -> FieldDef {
    column(name, FieldKind::Text, expr)
}

const fn attribute(name: &'static str, key: &'static str) -> FieldDef {
    FieldDef {
        name,
        kind: FieldKind::Text,
        source: FieldSource::Attribute(key),
    }
}

const fn column_or_attribute(name: &'static str, expr: &'static str) -> FieldDef {
    FieldDef {
        name,
        kind: FieldKind::Text,
        source: FieldSource::ColumnOrAttribute {
            column: expr,
            attribute: name,
        },
    }
}

const fn flag(name: &'static str, kind: DemographicKind, code: i32) -> FieldDef {
    FieldDef {
        name,
        kind: FieldKind::Boolean,
        source: FieldSource::Demographic(kind, code),
    }
}

const EVENT_GUIDE_FAVORITE: &str = "EXISTS (
        SELECT 1
        FROM fair_participant_student fps
        JOIN fair_participants fp ON fp.id = fps.fair_participant_id
         AND fp.deleted_at IS NULL
        WHERE fps.student_id = s.id
          AND fp.fair_id = f.id
          AND fp.team_id = t.id
          AND fps.is_favorite::int = 1
    )";

const INTERNAL_EVENT_ID: &str =
    "(SELECT ft.guid_id::text FROM fair_team ft WHERE ft.fair_id = f.id ORDER BY ft.id LIMIT 1)";

/// All known fields
pub static FIELDS: &[FieldDef] = &[
    // Event
    text("fair_name", "f.name"),
    text("internal_event_id", INTERNAL_EVENT_ID),
    // Contact
    text("first_name", "s.first_name"),
    text("last_name", "s.last_name"),
    text("email", "s.email"),
    text("phone", "pn.number"),
    text("formatted_phone", "pn.formatted_number"),
    text("student_phone", "s.phone"),
    text("locale", "s.locale"),
    // Address
    text("address_line1", "a.line1"),
    text("address_line2", "a.line2"),
    text("address_municipality", "a.municipality"),
    text("address_region", "a.region"),
    text("address_postal_code", "a.postal_code"),
    text("address_country_code", "a.country_code"),
    // Scan
    text("notes", "ufs.notes"),
    column("rating", FieldKind::Integer, "ufs.rating::bigint"),
    column("follow_up", FieldKind::Boolean, "ufs.follow_up::boolean"),
    column(
        "parent_encountered",
        FieldKind::Boolean,
        "ufs.parent_encountered::boolean",
    ),
    column("scan_time", FieldKind::Timestamp, "ufs.created_at::timestamp"),
    column("updated_time", FieldKind::Timestamp, "ufs.updated_at::timestamp"),
    text("scan_rep", "u.first_name || ' ' || u.last_name"),
    column(
        "event_guide_favorite",
        FieldKind::Boolean,
        EVENT_GUIDE_FAVORITE,
    ),
    // Columns with an attribute fallback
    column_or_attribute("high_school", "s.high_school"),
    column_or_attribute("graduation_year", "s.graduation_year::text"),
    column_or_attribute("gpa", "s.gpa::text"),
    column_or_attribute("area_of_interest_1", "s.area_of_interest_1"),
    column_or_attribute("area_of_interest_2", "s.area_of_interest_2"),
    column_or_attribute("area_of_interest_3", "s.area_of_interest_3"),
    // Academic attributes
    attribute("birthdate", "birthdate"),
    attribute("sat_score", "sat_score"),
    attribute("act_score", "act_score"),
    attribute("ssat_score", "ssat_score"),
    attribute("toefl_score", "toefl_score"),
    attribute("ielts_score", "ielts_score"),
    attribute("text_permission", "text_permission"),
    attribute("high_school_city", "high_school_city"),
    attribute("high_school_region", "high_school_region"),
    attribute("high_school_country", "high_school_country"),
    attribute("college_start_semester", "college_start_semester"),
    attribute("gpa_max", "gpa_max"),
    attribute("grad_type", "grad_type"),
    attribute("ceeb", "CEEB"),
    attribute("current_year_class", "current_year_class"),
    attribute(
        "has_hispanic_latino_origin",
        "has_hispanic_latino_or_spanish_origin",
    ),
    attribute("gender", "gender"),
    attribute("authorize_cis", "authorize_cis"),
    attribute("country_of_citizenship_1", "country_of_citizenship_1"),
    attribute("country_of_citizenship_2", "country_of_citizenship_2"),
    attribute("country_of_citizenship_3", "country_of_citizenship_3"),
    attribute("country_of_interest_1", "country_of_interest_1"),
    attribute("country_of_interest_2", "country_of_interest_2"),
    attribute("country_of_interest_3", "country_of_interest_3"),
    attribute("guidance_counselor_first_name", "guidance_counselor_first_name"),
    attribute("guidance_counselor_last_name", "guidance_counselor_last_name"),
    attribute("guidance_counselor_email", "guidance_counselor_email"),
    // Professional attributes
    attribute("organization", "organization"),
    attribute("professional_type", "professional_type"),
    attribute("preferred_name", "preferred_name"),
    attribute("pronouns", "pronouns"),
    attribute("job_title", "job_title"),
    attribute("work_phone", "work_phone"),
    attribute("work_phone_ext", "work_phone_ext"),
    attribute("work_phone_country_code", "work_phone_country_code"),
    attribute("additional_data_1", "additional_data_1"),
    attribute("additional_data_2", "additional_data_2"),
    attribute("additional_data_3", "additional_data_3"),
    attribute("additional_data_4", "additional_data_4"),
    attribute("additional_data_5", "additional_data_5"),
    attribute("additional_data_6", "additional_data_6"),
    attribute("additional_data_7", "additional_data_7"),
    attribute("additional_data_8", "additional_data_8"),
    attribute("additional_data_9", "additional_data_9"),
    attribute("additional_data_10", "additional_data_10"),
    // Parent attributes
    attribute("parent_first_name", "parent_first_name"),
    attribute("parent_last_name", "parent_last_name"),
    attribute("parent_email", "parent_email"),
    attribute("parent_phone", "parent_phone"),
    attribute("parent_phone_country_code", "parent_phone_country_code"),
    attribute("parent_relationship", "parent_relationship"),
    // Demographic flags
    flag("ethnicity_cuban", DemographicKind::Ethnicity, 1),
    flag("ethnicity_other_hispanic", DemographicKind::Ethnicity, 2),
    flag("ethnicity_puerto_rican", DemographicKind::Ethnicity, 3),
    flag("ethnicity_mexican", DemographicKind::Ethnicity, 4),
    flag("ethnicity_non_hispanic", DemographicKind::Ethnicity, 5),
    flag("race_black", DemographicKind::Race, 1),
    flag("race_white", DemographicKind::Race, 2),
    flag("race_asian", DemographicKind::Race, 3),
    flag("race_american_indian", DemographicKind::Race, 4),
    flag("race_native_hawaiian", DemographicKind::Race, 5),
];

/// Looks up a field by name
pub fn field(name: &str) -> Option<&'static FieldDef> {
    FIELDS.iter().find(|f| f.name == name)
}
