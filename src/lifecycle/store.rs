use atomic_write_file::AtomicWriteFile;
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

use super::types::RiskAssessment;

const STORE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("assessment {id} was modified concurrently (expected version {expected:?}, found {found:?})")]
    VersionConflict {
        id: Uuid,
        expected: Option<u64>,
        found: Option<u64>,
    },

    #[error("unsupported assessment store version: {0}")]
    UnsupportedVersion(u32),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// An assessment record together with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAssessment {
    pub version: u64,
    pub assessment: RiskAssessment,
}

/// Persistence for assessment records.
pub trait AssessmentStore {
    fn load(&self, id: &Uuid) -> Result<Option<StoredAssessment>, StoreError>;

    /// Save a record. `expected_version` must equal the stored version,
    /// or be `None` when the record is new. Returns the new version.
    fn save(
        &self,
        assessment: &RiskAssessment,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError>;

    fn list(&self) -> Result<Vec<StoredAssessment>, StoreError>;
}

fn check_version(
    id: Uuid,
    current: Option<&StoredAssessment>,
    expected: Option<u64>,
) -> Result<u64, StoreError> {
    let found = current.map(|s| s.version);
    if found != expected {
        return Err(StoreError::VersionConflict {
            id,
            expected,
            found,
        });
    }
    Ok(found.map_or(1, |v| v + 1))
}

/// In-process store, mostly useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<Uuid, StoredAssessment>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AssessmentStore for MemoryStore {
    fn load(&self, id: &Uuid) -> Result<Option<StoredAssessment>, StoreError> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(id).cloned())
    }

    fn save(
        &self,
        assessment: &RiskAssessment,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let version = check_version(assessment.id, records.get(&assessment.id), expected_version)?;
        records.insert(
            assessment.id,
            StoredAssessment {
                version,
                assessment: assessment.clone(),
            },
        );
        Ok(version)
    }

    fn list(&self) -> Result<Vec<StoredAssessment>, StoreError> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<_> = records.values().cloned().collect();
        all.sort_by_key(|s| s.assessment.created_at);
        Ok(all)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    #[serde(default)]
    records: BTreeMap<Uuid, StoredAssessment>,
}

impl StoreDocument {
    fn new() -> Self {
        Self {
            version: STORE_FORMAT_VERSION,
            records: BTreeMap::new(),
        }
    }
}

/// Store backed by a single JSON document, rewritten atomically on every save.
///
/// Saves hold an exclusive lock on `<path>.lock` from read to rename, so
/// writers in other threads or processes queue up instead of overwriting
/// each other. Readers need no lock; they see one complete document or the next.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<StoreDocument, StoreError> {
        if !self.path.exists() {
            return Ok(StoreDocument::new());
        }
        let file = File::open(&self.path)?;
        let doc: StoreDocument = serde_json::from_reader(file)?;
        if doc.version != STORE_FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion(doc.version));
        }
        Ok(doc)
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn ensure_parent(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Blocks until this handle is the only writer. Released when dropped.
    fn lock_exclusive(&self) -> Result<File, StoreError> {
        self.ensure_parent()?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        FileExt::lock_exclusive(&file)?;
        Ok(file)
    }

    fn write_document(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        let mut file = AtomicWriteFile::open(&self.path)?;
        serde_json::to_writer_pretty(&mut file, doc)?;
        file.commit()?;
        Ok(())
    }
}

impl AssessmentStore for JsonFileStore {
    fn load(&self, id: &Uuid) -> Result<Option<StoredAssessment>, StoreError> {
        Ok(self.read_document()?.records.remove(id))
    }

    fn save(
        &self,
        assessment: &RiskAssessment,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        let _lock = self.lock_exclusive()?;
        let mut doc = self.read_document()?;
        let current = doc.records.get(&assessment.id);
        let version = check_version(assessment.id, current, expected_version)?;
        doc.records.insert(
            assessment.id,
            StoredAssessment {
                version,
                assessment: assessment.clone(),
            },
        );
        self.write_document(&doc)?;
        Ok(version)
    }

    fn list(&self) -> Result<Vec<StoredAssessment>, StoreError> {
        let mut all: Vec<_> = self.read_document()?.records.into_values().collect();
        all.sort_by_key(|s| s.assessment.created_at);
        Ok(all)
    }
}
