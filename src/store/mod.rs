mod json_store;
mod memory;

pub use json_store::JsonFileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::template::Template;
use serde::{Deserialize, Serialize};

/// Public columns of a student record. The template column is never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub year_of_study: Option<u32>,
    #[serde(default)]
    pub enrollment_date: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    "active".to_string()
}

impl StudentProfile {
    pub fn new(
        student_id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: None,
            phone: None,
            department: None,
            year_of_study: None,
            enrollment_date: None,
            status: default_status(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}

/// One row of the students table: profile plus the nullable template column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    #[serde(flatten)]
    pub profile: StudentProfile,
    #[serde(default)]
    pub fingerprint_template: Option<String>,
}

impl StudentRecord {
    pub fn new(profile: StudentProfile) -> Self {
        Self {
            profile,
            fingerprint_template: None,
        }
    }

    fn active_template(&self) -> Option<(String, Template)> {
        match &self.fingerprint_template {
            Some(text) if self.profile.is_active() => {
                Some((self.profile.student_id.clone(), Template::from(text.as_str())))
            }
            _ => None,
        }
    }
}

/// Persistence collaborator holding students and their templates.
///
/// Implementations acquire whatever connection they need per call and release
/// it before returning.
pub trait RecordStore {
    /// `(student_id, template)` for every active student that has a template,
    /// in store order.
    fn fetch_active_templates(&self) -> Result<Vec<(String, Template)>>;

    /// Replace the student's template wholesale.
    fn upsert_template(&mut self, student_id: &str, template: &Template) -> Result<()>;

    fn fetch_student_profile(&self, student_id: &str) -> Result<Option<StudentProfile>>;
}

fn active_templates(records: &[StudentRecord]) -> Vec<(String, Template)> {
    records.iter().filter_map(StudentRecord::active_template).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_students_with_templates_are_listed() {
        let mut inactive = StudentProfile::new("S2", "Bo", "Chen");
        inactive.status = "Graduated".to_string();
        let records = vec![
            StudentRecord {
                profile: StudentProfile::new("S1", "Ada", "Okafor"),
                fingerprint_template: Some("AAA".to_string()),
            },
            StudentRecord {
                profile: inactive,
                fingerprint_template: Some("BBB".to_string()),
            },
            StudentRecord::new(StudentProfile::new("S3", "Cy", "Diaz")),
        ];
        let listed = active_templates(&records);
        assert_eq!(listed, vec![("S1".to_string(), Template::from("AAA"))]);
    }

    #[test]
    fn record_row_is_flat_json() {
        let row = r#"{"student_id":"S9","first_name":"Ima","last_name":"Ro","year_of_study":2,"status":"ACTIVE","fingerprint_template":null}"#;
        let record: StudentRecord = serde_json::from_str(row).unwrap();
        assert_eq!(record.profile.year_of_study, Some(2));
        assert!(record.profile.is_active());
        assert!(record.fingerprint_template.is_none());
    }
}
