use super::{active_templates, RecordStore, StudentProfile, StudentRecord};
use crate::error::{PipelineError, Result};
use crate::template::Template;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StudentTable {
    students: Vec<StudentRecord>,
}

/// Students table kept in a JSON document.
///
/// Every call opens the file, does its work and closes it again; nothing is
/// held between calls.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Write a fresh table holding the given students, replacing any file.
    pub fn create<P, I>(path: P, profiles: I) -> Result<Self>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = StudentProfile>,
    {
        let store = Self::new(path);
        let table = StudentTable {
            students: profiles.into_iter().map(StudentRecord::new).collect(),
        };
        store.write_table(&table)?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(&self) -> Result<StudentTable> {
        let file = File::open(&self.path).map_err(|e| {
            PipelineError::Store(format!("cannot open {}: {e}", self.path.display()))
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            PipelineError::Store(format!("cannot parse {}: {e}", self.path.display()))
        })
    }

    /// Write to a sibling temp file, then rename it over the table. On failure
    /// the temp file is removed and the existing table is left as it was.
    fn write_table(&self, table: &StudentTable) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, table)?;
            writer.flush()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Could not remove {}: {}", tmp.display(), cleanup);
                }
            }
            PipelineError::Store(format!("cannot write {}: {e}", self.path.display()))
        })
    }
}

impl RecordStore for JsonFileStore {
    fn fetch_active_templates(&self) -> Result<Vec<(String, Template)>> {
        let table = self.read_table()?;
        Ok(active_templates(&table.students))
    }

    fn upsert_template(&mut self, student_id: &str, template: &Template) -> Result<()> {
        let mut table = self.read_table()?;
        let record = table
            .students
            .iter_mut()
            .find(|r| r.profile.student_id == student_id)
            .ok_or_else(|| PipelineError::UnknownStudent(student_id.to_string()))?;
        record.fingerprint_template = Some(template.as_str().to_string());
        self.write_table(&table)?;
        tracing::debug!("Stored template for {} in {}", student_id, self.path.display());
        Ok(())
    }

    fn fetch_student_profile(&self, student_id: &str) -> Result<Option<StudentProfile>> {
        let table = self.read_table()?;
        Ok(table
            .students
            .into_iter()
            .find(|r| r.profile.student_id == student_id)
            .map(|r| r.profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "fingerprint-reader-{}-{name}.json",
            std::process::id()
        ))
    }

    #[test]
    fn upsert_then_fetch_round_trips_through_file() {
        let path = temp_path("upsert");
        let mut store = JsonFileStore::create(
            &path,
            [
                StudentProfile::new("STU001", "Ada", "Okafor"),
                StudentProfile::new("STU002", "Bo", "Chen"),
            ],
        )
        .unwrap();

        assert!(store.fetch_active_templates().unwrap().is_empty());
        store.upsert_template("STU002", &Template::from("dGVzdA==")).unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(
            reopened.fetch_active_templates().unwrap(),
            vec![("STU002".to_string(), Template::from("dGVzdA=="))]
        );
        let profile = reopened.fetch_student_profile("STU001").unwrap().unwrap();
        assert_eq!(profile.last_name, "Okafor");
        assert!(reopened.fetch_student_profile("STU404").unwrap().is_none());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn unknown_student_upsert_leaves_file_untouched() {
        let path = temp_path("unknown");
        let mut store =
            JsonFileStore::create(&path, [StudentProfile::new("STU001", "Ada", "Okafor")]).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let err = store.upsert_template("STU999", &Template::from("x")).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownStudent(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), before);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_or_corrupt_file_is_store_error() {
        let missing = JsonFileStore::new(temp_path("missing"));
        assert!(matches!(
            missing.fetch_active_templates(),
            Err(PipelineError::Store(_))
        ));

        let path = temp_path("corrupt");
        fs::write(&path, "{ not json").unwrap();
        let corrupt = JsonFileStore::new(&path);
        assert!(matches!(
            corrupt.fetch_student_profile("STU001"),
            Err(PipelineError::Store(_))
        ));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn failed_write_leaves_no_temp_file() {
        let path = temp_path("dir-target");
        let _ = fs::remove_dir_all(&path);
        fs::create_dir(&path).unwrap();
        let tmp = path.with_extension("json.tmp");

        let store = JsonFileStore::new(&path);
        let err = store.write_table(&StudentTable::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Store(_)));
        assert!(!tmp.exists());
        assert!(path.is_dir());

        let _ = fs::remove_dir_all(&path);
        let _ = fs::remove_file(&tmp);
    }
}
