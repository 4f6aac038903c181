use super::{active_templates, RecordStore, StudentProfile, StudentRecord};
use crate::error::{PipelineError, Result};
use crate::template::Template;

/// In-process record store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<StudentRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_students<I>(profiles: I) -> Self
    where
        I: IntoIterator<Item = StudentProfile>,
    {
        Self {
            records: profiles.into_iter().map(StudentRecord::new).collect(),
        }
    }

    pub fn add_student(&mut self, profile: StudentProfile) {
        self.records.push(StudentRecord::new(profile));
    }

    /// Store raw template text as-is, bypassing the codec.
    pub fn set_raw_template(&mut self, student_id: &str, text: impl Into<String>) -> Result<()> {
        let record = self.record_mut(student_id)?;
        record.fingerprint_template = Some(text.into());
        Ok(())
    }

    pub fn template_of(&self, student_id: &str) -> Option<&str> {
        self.records
            .iter()
            .find(|r| r.profile.student_id == student_id)
            .and_then(|r| r.fingerprint_template.as_deref())
    }

    pub fn records(&self) -> &[StudentRecord] {
        &self.records
    }

    fn record_mut(&mut self, student_id: &str) -> Result<&mut StudentRecord> {
        self.records
            .iter_mut()
            .find(|r| r.profile.student_id == student_id)
            .ok_or_else(|| PipelineError::UnknownStudent(student_id.to_string()))
    }
}

impl RecordStore for MemoryStore {
    fn fetch_active_templates(&self) -> Result<Vec<(String, Template)>> {
        Ok(active_templates(&self.records))
    }

    fn upsert_template(&mut self, student_id: &str, template: &Template) -> Result<()> {
        self.set_raw_template(student_id, template.as_str())
    }

    fn fetch_student_profile(&self, student_id: &str) -> Result<Option<StudentProfile>> {
        Ok(self
            .records
            .iter()
            .find(|r| r.profile.student_id == student_id)
            .map(|r| r.profile.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_replaces_existing_template() {
        let mut store = MemoryStore::with_students([StudentProfile::new("S1", "Ada", "Okafor")]);
        store.upsert_template("S1", &Template::from("first")).unwrap();
        store.upsert_template("S1", &Template::from("second")).unwrap();
        assert_eq!(store.template_of("S1"), Some("second"));
        assert_eq!(store.fetch_active_templates().unwrap().len(), 1);
    }

    #[test]
    fn upsert_for_unknown_student_fails() {
        let mut store = MemoryStore::new();
        let err = store.upsert_template("NOPE", &Template::from("x")).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownStudent(_)));
    }

    #[test]
    fn profile_lookup() {
        let store = MemoryStore::with_students([StudentProfile::new("S1", "Ada", "Okafor")]);
        assert_eq!(store.fetch_student_profile("S1").unwrap().unwrap().first_name, "Ada");
        assert!(store.fetch_student_profile("S2").unwrap().is_none());
    }
}
