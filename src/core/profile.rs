//! Scan type profiles
//!
//! A [`ScanTypeProfile`] describes one export: the `student_type_id` it
//! selects, the file name stem it writes, and an ordered list of columns.
//! Each column names its CSV header, the catalog field it reads and the rule
//! used to render that field, so the header and every rendered row are built
//! from the same list.

use crate::core::fetch::catalog::{self, FieldDef};
use crate::domain::{FieldKind, FieldValue, ScanRecord, ScanfeedError};
use crate::domain::result::Result;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Timestamp format used in every CSV cell
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Run timestamp format used in file names
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Supported scan types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScanType {
    Student,
    Cis,
    Global,
    Parent,
    OntarioStudent,
    OntarioParent,
    Professional,
    OntarioCounsellor,
}

impl ScanType {
    /// Every scan type, in export order
    pub const ALL: [ScanType; 8] = [
        ScanType::Student,
        ScanType::Cis,
        ScanType::Global,
        ScanType::Parent,
        ScanType::OntarioStudent,
        ScanType::OntarioParent,
        ScanType::Professional,
        ScanType::OntarioCounsellor,
    ];

    /// CLI and config name
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::Student => "student",
            ScanType::Cis => "cis",
            ScanType::Global => "global",
            ScanType::Parent => "parent",
            ScanType::OntarioStudent => "ontario-student",
            ScanType::OntarioParent => "ontario-parent",
            ScanType::Professional => "professional",
            ScanType::OntarioCounsellor => "ontario-counsellor",
        }
    }

    /// Scan types selected by `all`
    ///
    /// `Cis` is left out since it reads the same student type as `Global`.
    pub const ALL_SELECTION: [ScanType; 7] = [
        ScanType::Student,
        ScanType::Global,
        ScanType::Parent,
        ScanType::OntarioStudent,
        ScanType::OntarioParent,
        ScanType::Professional,
        ScanType::OntarioCounsellor,
    ];

    /// The registered profile for this scan type
    pub fn profile(&self) -> &'static ScanTypeProfile {
        match self {
            ScanType::Student => &STUDENT,
            ScanType::Cis => &CIS,
            ScanType::Global => &GLOBAL,
            ScanType::Parent => &PARENT,
            ScanType::OntarioStudent => &ONTARIO_STUDENT,
            ScanType::OntarioParent => &ONTARIO_PARENT,
            ScanType::Professional => &PROFESSIONAL,
            ScanType::OntarioCounsellor => &ONTARIO_COUNSELLOR,
        }
    }

    /// Parses a list of names, expanding `all` and dropping duplicates
    ///
    /// No two selected types read the same student type code. `all` skips
    /// a type whose code is already taken; naming two such types is an
    /// error.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<ScanType>> {
        let mut selected: Vec<ScanType> = Vec::new();
        let sharing_code = |selected: &[ScanType], scan_type: ScanType| {
            selected
                .iter()
                .copied()
                .find(|t| *t != scan_type && t.profile().code == scan_type.profile().code)
        };

        for name in names {
            let name = name.as_ref().trim();
            if name.eq_ignore_ascii_case("all") {
                for scan_type in ScanType::ALL_SELECTION {
                    if !selected.contains(&scan_type)
                        && sharing_code(&selected, scan_type).is_none()
                    {
                        selected.push(scan_type);
                    }
                }
                continue;
            }

            let scan_type: ScanType = name.parse()?;
            if selected.contains(&scan_type) {
                continue;
            }
            if let Some(other) = sharing_code(&selected, scan_type) {
                return Err(ScanfeedError::Validation(format!(
                    "Scan types '{other}' and '{scan_type}' both select student type {}; export one of them",
                    scan_type.profile().code
                )));
            }
            selected.push(scan_type);
        }
        Ok(selected)
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScanType {
    type Err = ScanfeedError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        ScanType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| {
                ScanfeedError::Validation(format!(
                    "Unknown scan type '{s}'. Must be one of: {}, all",
                    ScanType::ALL
                        .iter()
                        .map(ScanType::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

/// How a column turns its field into a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Render {
    /// Value as-is according to its kind; null is empty
    Plain,
    /// `Yes` when the text is `1`, otherwise `No`
    YesNo,
    /// `Parent` when true, otherwise `Student`
    ParentOrStudent,
    /// `Y` when true, otherwise `N`
    Flag,
    /// `Event Guide Favorite` when true, otherwise empty
    EventGuide,
    /// Raw locale, `en` when null
    LocaleOrDefault,
}

impl Render {
    /// Kind a field must carry to be rendered by this rule
    fn expects(&self, def: &FieldDef) -> FieldKind {
        match self {
            Render::Plain => def.kind,
            Render::YesNo | Render::LocaleOrDefault => FieldKind::Text,
            Render::ParentOrStudent | Render::Flag | Render::EventGuide => FieldKind::Boolean,
        }
    }
}

/// One CSV column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub header: &'static str,
    pub field: &'static str,
    pub render: Render,
}

impl Column {
    fn render(&self, record: &ScanRecord) -> Result<String> {
        let def = catalog::field(self.field).ok_or_else(|| {
            ScanfeedError::Transform(format!("field '{}' is not in the catalog", self.field))
        })?;
        let value = record.get(self.field);

        if let Some(value) = value {
            let expected = self.render.expects(def);
            if value.kind() != expected {
                return Err(ScanfeedError::Transform(format!(
                    "field '{}' of scan {} is {}, expected {}",
                    self.field,
                    record.scan_id,
                    value.kind(),
                    expected
                )));
            }
        }

        let cell = match (self.render, value) {
            (Render::Plain, None) => String::new(),
            (Render::Plain, Some(value)) => plain(value),
            (Render::YesNo, Some(FieldValue::Text(text))) if text == "1" => "Yes".to_string(),
            (Render::YesNo, _) => "No".to_string(),
            (Render::ParentOrStudent, Some(FieldValue::Boolean(true))) => "Parent".to_string(),
            (Render::ParentOrStudent, _) => "Student".to_string(),
            (Render::Flag, Some(FieldValue::Boolean(true))) => "Y".to_string(),
            (Render::Flag, _) => "N".to_string(),
            (Render::EventGuide, Some(FieldValue::Boolean(true))) => {
                "Event Guide Favorite".to_string()
            }
            (Render::EventGuide, _) => String::new(),
            (Render::LocaleOrDefault, None) => "en".to_string(),
            (Render::LocaleOrDefault, Some(value)) => plain(value),
        };
        Ok(cell)
    }
}

fn plain(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(text) => text.clone(),
        FieldValue::Integer(n) => n.to_string(),
        FieldValue::Boolean(b) => b.to_string(),
        FieldValue::Timestamp(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
    }
}

/// Static description of one export
#[derive(Debug, PartialEq, Eq)]
pub struct ScanTypeProfile {
    pub scan_type: ScanType,

    /// `students.student_type_id` selected by this profile
    pub code: i32,

    /// File name stem, e.g. `scans_students`
    pub file_stem: &'static str,

    pub columns: &'static [Column],
}

impl ScanTypeProfile {
    /// CSV header row
    pub fn header(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header.to_string()).collect()
    }

    /// Renders one record, one cell per column
    pub fn render_row(&self, record: &ScanRecord) -> Result<Vec<String>> {
        self.columns.iter().map(|c| c.render(record)).collect()
    }

    /// Catalog fields read by this profile, in first-use order
    pub fn fields(&self) -> Vec<&'static FieldDef> {
        let mut seen = HashSet::new();
        self.columns
            .iter()
            .filter(|c| seen.insert(c.field))
            .filter_map(|c| catalog::field(c.field))
            .collect()
    }

    /// Ordered `(field, kind)` pairs the fetcher must populate
    pub fn select_columns(&self) -> Vec<(&'static str, FieldKind)> {
        self.fields().into_iter().map(|f| (f.name, f.kind)).collect()
    }

    /// `<stem>_<YYYYMMDD_HHMMSS>.csv`
    pub fn file_name(&self, run_timestamp: NaiveDateTime) -> String {
        format!(
            "{}_{}.csv",
            self.file_stem,
            run_timestamp.format(FILE_TIMESTAMP_FORMAT)
        )
    }
}

const fn col(header: &'static str, field: &'static str) -> Column {
    Column {
        header,
        field,
        render: Render::Plain,
    }
}

const fn with(header: &'static str, field: &'static str, render: Render) -> Column {
    Column {
        header,
        field,
        render,
    }
}

const STUDENT_COLUMNS: &[Column] = &[
    col("Fair Name", "fair_name"),
    col("Internal Event ID", "internal_event_id"),
    col("First Name", "first_name"),
    col("Last Name", "last_name"),
    col("Email", "email"),
    col("Phone", "phone"),
    with("Text Permission", "text_permission", Render::YesNo),
    col("Address 1", "address_line1"),
    col("Address 2", "address_line2"),
    col("Address City", "address_municipality"),
    col("Address State", "address_region"),
    col("Address ZIP", "address_postal_code"),
    col("Birthdate", "birthdate"),
    col("High School", "high_school"),
    col("High School City", "high_school_city"),
    col("High School State", "high_school_region"),
    col("CEEB Code", "ceeb"),
    col("Graduation Year", "graduation_year"),
    col("College Start", "college_start_semester"),
    col("GPA", "gpa"),
    col("GPA Max", "gpa_max"),
    col("SAT", "sat_score"),
    col("ACT", "act_score"),
    col("Area of Interest 1", "area_of_interest_1"),
    col("Area of Interest 2", "area_of_interest_2"),
    col("Area of Interest 3", "area_of_interest_3"),
    with("Ethnicity Cuban", "ethnicity_cuban", Render::Flag),
    with("Ethnicity Mexican", "ethnicity_mexican", Render::Flag),
    with("Ethnicity Puerto Rican", "ethnicity_puerto_rican", Render::Flag),
    with(
        "Ethnicity Other Hispanic, Latino, or Spanish",
        "ethnicity_other_hispanic",
        Render::Flag,
    ),
    with(
        "Ethnicity Non-Hispanic, Latino, or Spanish",
        "ethnicity_non_hispanic",
        Render::Flag,
    ),
    with(
        "Race American Indian or Alaskan Native",
        "race_american_indian",
        Render::Flag,
    ),
    with("Race Asian", "race_asian", Render::Flag),
    with("Race Black or African American", "race_black", Render::Flag),
    with(
        "Race Native Hawaiian or Other Pacific Islander",
        "race_native_hawaiian",
        Render::Flag,
    ),
    with("Race White", "race_white", Render::Flag),
    col("Rating", "rating"),
    col("Notes", "notes"),
    col("Follow Up", "follow_up"),
    with("Parent or Student", "parent_encountered", Render::ParentOrStudent),
    col("Scan Time", "scan_time"),
    col("Scan Rep", "scan_rep"),
    with("Registration Language", "locale", Render::LocaleOrDefault),
    with("Event Guide", "event_guide_favorite", Render::EventGuide),
    col("Updated Time", "updated_time"),
];

const GLOBAL_COLUMNS: &[Column] = &[
    col("Event", "fair_name"),
    col("Internal Event ID", "internal_event_id"),
    col("First Name", "first_name"),
    col("Last Name", "last_name"),
    col("Email", "email"),
    col("Phone", "phone"),
    col("Formatted Phone", "formatted_phone"),
    with("Text Permission", "text_permission", Render::YesNo),
    col("Address 1", "address_line1"),
    col("Address 2", "address_line2"),
    col("Address Municipality", "address_municipality"),
    col("Address Locality", "address_region"),
    col("Address Region", "address_region"),
    col("Address Postal Code", "address_postal_code"),
    col("Address Country", "address_country_code"),
    col("Birthdate", "birthdate"),
    col("High School", "high_school"),
    col("High School City", "high_school_city"),
    col("High School Region", "high_school_region"),
    col("High School Country", "high_school_country"),
    col("CEEB Code", "ceeb"),
    col("Graduation Year", "graduation_year"),
    col("University Start", "college_start_semester"),
    col("GPA", "gpa"),
    col("GPA Max", "gpa_max"),
    col("SAT", "sat_score"),
    col("ACT", "act_score"),
    col("TOEFL", "toefl_score"),
    col("IELTS", "ielts_score"),
    col("Area of Interest 1", "area_of_interest_1"),
    col("Area of Interest 2", "area_of_interest_2"),
    col("Area of Interest 3", "area_of_interest_3"),
    col("Rating", "rating"),
    col("Notes", "notes"),
    col("Follow Up", "follow_up"),
    with("Parent or Student", "parent_encountered", Render::ParentOrStudent),
    col("Registration Language", "locale"),
    col("Scan Time", "scan_time"),
    col("Scan Rep", "scan_rep"),
    with("Event Guide", "event_guide_favorite", Render::EventGuide),
    col("Updated Time", "updated_time"),
];

const PARENT_COLUMNS: &[Column] = &[
    col("Fair Name", "fair_name"),
    col("Internal Event ID", "internal_event_id"),
    col("Relationship to Student", "parent_relationship"),
    col("Parent First Name", "parent_first_name"),
    col("Parent Last Name", "parent_last_name"),
    col("Parent Email Address", "parent_email"),
    col("Phone", "student_phone"),
    with("Text Permission", "text_permission", Render::YesNo),
    col("Student First Name", "first_name"),
    col("Student Last Name", "last_name"),
    col("Student Email Address", "email"),
    col("Birthdate", "birthdate"),
    col("High School", "high_school"),
    col("High School City", "high_school_city"),
    col("High School State", "high_school_region"),
    col("CEEB Code", "ceeb"),
    col("Graduation Year", "graduation_year"),
    col("College Start", "college_start_semester"),
    col("Rating", "rating"),
    col("Notes", "notes"),
    col("Follow Up", "follow_up"),
    with("Registration Language", "locale", Render::LocaleOrDefault),
    col("Scan Time", "scan_time"),
    col("Scan Rep", "scan_rep"),
    with("Event Guide", "event_guide_favorite", Render::EventGuide),
    col("Updated Time", "updated_time"),
];

const ONTARIO_PARENT_COLUMNS: &[Column] = &[
    col("Event Name", "fair_name"),
    col("Internal Event ID", "internal_event_id"),
    col("Relationship to Student", "parent_relationship"),
    col("Parent First Name", "parent_first_name"),
    col("Parent Last Name", "parent_last_name"),
    col("Parent Email Address", "parent_email"),
    col("Phone", "student_phone"),
    with("Text Permission", "text_permission", Render::YesNo),
    col("Student First Name", "first_name"),
    col("Student Last Name", "last_name"),
    col("Student Email Address", "email"),
    col("Birthdate", "birthdate"),
    col("School", "high_school"),
    col("School City", "high_school_city"),
    col("School Province", "high_school_region"),
    col("University Start", "college_start_semester"),
    col("Rating", "rating"),
    col("Notes", "notes"),
    col("Follow Up", "follow_up"),
    col("Registration Language", "locale"),
    col("Scan Time", "scan_time"),
    col("Scan Rep", "scan_rep"),
    with("Event Guide", "event_guide_favorite", Render::EventGuide),
    col("Updated Time", "updated_time"),
];

const ONTARIO_STUDENT_COLUMNS: &[Column] = &[
    col("Event Name", "fair_name"),
    col("Internal Event ID", "internal_event_id"),
    col("First Name", "first_name"),
    col("Last Name", "last_name"),
    col("Email", "email"),
    col("Address City", "address_municipality"),
    col("Address Province", "address_region"),
    col("Address Postal Code", "address_postal_code"),
    col("Address Country", "address_country_code"),
    col("Birthdate", "birthdate"),
    col("University Start", "college_start_semester"),
    col("Rating", "rating"),
    col("Notes", "notes"),
    col("Follow Up", "follow_up"),
    with("Parent or Student", "parent_encountered", Render::ParentOrStudent),
    col("Registration Language", "locale"),
    col("Scan Time", "scan_time"),
    col("Scan Rep", "scan_rep"),
    with("Event Guide", "event_guide_favorite", Render::EventGuide),
    col("Updated Time", "updated_time"),
];

const PROFESSIONAL_COLUMNS: &[Column] = &[
    col("Fair Name", "fair_name"),
    col("Internal Event ID", "internal_event_id"),
    col("First Name", "first_name"),
    col("Last Name", "last_name"),
    col("Email", "email"),
    col("Phone", "phone"),
    with("Text Permission", "text_permission", Render::YesNo),
    col("Address 1", "address_line1"),
    col("Address 2", "address_line2"),
    col("Address City", "address_municipality"),
    col("Address State", "address_region"),
    col("Address ZIP", "address_postal_code"),
    col("High School", "high_school"),
    col("High School City", "high_school_city"),
    col("High School State", "high_school_region"),
    col("CEEB Code", "ceeb"),
    col("Organization", "organization"),
    col("Professional Type", "professional_type"),
    col("Preferred Name", "preferred_name"),
    col("Pronouns", "pronouns"),
    col("Job Title", "job_title"),
    col("Work Phone", "work_phone"),
    col("Rating", "rating"),
    col("Notes", "notes"),
    col("Follow Up", "follow_up"),
    col("Scan Time", "scan_time"),
    col("Scan Rep", "scan_rep"),
    col("Additional Data 1", "additional_data_1"),
    col("Additional Data 2", "additional_data_2"),
    col("Additional Data 3", "additional_data_3"),
    col("Additional Data 4", "additional_data_4"),
    col("Additional Data 5", "additional_data_5"),
    col("Additional Data 6", "additional_data_6"),
    col("Additional Data 7", "additional_data_7"),
    col("Additional Data 8", "additional_data_8"),
    col("Additional Data 9", "additional_data_9"),
    col("Additional Data 10", "additional_data_10"),
    with("Registration Language", "locale", Render::LocaleOrDefault),
    with("Event Guide", "event_guide_favorite", Render::EventGuide),
    col("Updated Time", "updated_time"),
];

const ONTARIO_COUNSELLOR_COLUMNS: &[Column] = &[
    col("Event Name", "fair_name"),
    col("Internal Event ID", "internal_event_id"),
    col("First Name", "first_name"),
    col("Last Name", "last_name"),
    col("Email", "email"),
    col("Address City", "address_municipality"),
    col("Address Province", "address_region"),
    col("Address Postal Code", "address_postal_code"),
    col("Address Country", "address_country_code"),
    col("School", "high_school"),
    col("School City", "high_school_city"),
    col("School Province", "high_school_region"),
    col("CEEB Code", "ceeb"),
    col("Organization", "organization"),
    col("Professional Type", "professional_type"),
    col("Job Title", "job_title"),
    col("Rating", "rating"),
    col("Notes", "notes"),
    col("Follow Up", "follow_up"),
    col("Registration Language", "locale"),
    col("Scan Time", "scan_time"),
    col("Scan Rep", "scan_rep"),
    with("Event Guide", "event_guide_favorite", Render::EventGuide),
    col("Updated Time", "updated_time"),
];

pub static STUDENT: ScanTypeProfile = ScanTypeProfile {
    scan_type: ScanType::Student,
    code: 1,
    file_stem: "scans_students",
    columns: STUDENT_COLUMNS,
};

/// The CIS export has no column set of its own and reuses the student columns
pub static CIS: ScanTypeProfile = ScanTypeProfile {
    scan_type: ScanType::Cis,
    code: 2,
    file_stem: "scans_cis",
    columns: STUDENT_COLUMNS,
};

pub static GLOBAL: ScanTypeProfile = ScanTypeProfile {
    scan_type: ScanType::Global,
    code: 2,
    file_stem: "scans_global",
    columns: GLOBAL_COLUMNS,
};

pub static PARENT: ScanTypeProfile = ScanTypeProfile {
    scan_type: ScanType::Parent,
    code: 3,
    file_stem: "scans_parents",
    columns: PARENT_COLUMNS,
};

pub static ONTARIO_STUDENT: ScanTypeProfile = ScanTypeProfile {
    scan_type: ScanType::OntarioStudent,
    code: 4,
    file_stem: "scans_ontario_students",
    columns: ONTARIO_STUDENT_COLUMNS,
};

/// Ontario parent export; its column set is new to scanfeed
pub static ONTARIO_PARENT: ScanTypeProfile = ScanTypeProfile {
    scan_type: ScanType::OntarioParent,
    code: 5,
    file_stem: "scans_ontario_parents",
    columns: ONTARIO_PARENT_COLUMNS,
};

pub static PROFESSIONAL: ScanTypeProfile = ScanTypeProfile {
    scan_type: ScanType::Professional,
    code: 6,
    file_stem: "scans_professionals",
    columns: PROFESSIONAL_COLUMNS,
};

pub static ONTARIO_COUNSELLOR: ScanTypeProfile = ScanTypeProfile {
    scan_type: ScanType::OntarioCounsellor,
    code: 10,
    file_stem: "scans_ontario_counsellors",
    columns: ONTARIO_COUNSELLOR_COLUMNS,
};
