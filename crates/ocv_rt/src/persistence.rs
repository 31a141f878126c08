use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use ocv_storage::study::{StudyDoc, StudyError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("study io error: {0}")]
    Io(#[from] io::Error),
    #[error("study is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Codec(#[from] StudyError),
}

/// Persistence for study documents, keyed by the PDF content hash.
/// `load` returns Ok(None) when no study exists yet; a brand-new PDF is
/// not an error.
pub trait StudyStore {
    fn save(&mut self, doc: &StudyDoc) -> Result<(), StoreError>;
    fn load(&mut self, pdf_hash: &str) -> Result<Option<StudyDoc>, StoreError>;
}

#[derive(Default)]
pub struct MemoryStudyStore {
    docs: HashMap<String, serde_json::Value>,
    save_count: usize,
}

impl MemoryStudyStore {
    pub fn save_count(&self) -> usize {
        self.save_count
    }
}

impl StudyStore for MemoryStudyStore {
    fn save(&mut self, doc: &StudyDoc) -> Result<(), StoreError> {
        self.docs.insert(doc.pdf_hash.clone(), doc.to_json());
        self.save_count += 1;
        Ok(())
    }

    fn load(&mut self, pdf_hash: &str) -> Result<Option<StudyDoc>, StoreError> {
        match self.docs.get(pdf_hash) {
            Some(value) => Ok(Some(StudyDoc::from_json(value)?)),
            None => Ok(None),
        }
    }
}

/// One JSON file per PDF under a studies directory.
pub struct FileStudyStore {
    dir: PathBuf,
}

impl FileStudyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, pdf_hash: &str) -> PathBuf {
        self.dir.join(format!("{pdf_hash}.study.json"))
    }
}

impl StudyStore for FileStudyStore {
    fn save(&mut self, doc: &StudyDoc) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&doc.pdf_hash);
        let text = serde_json::to_string_pretty(&doc.to_json())?;
        fs::write(&path, text)?;
        debug!(path = %path.display(), games = doc.games.len(), "study saved");
        Ok(())
    }

    fn load(&mut self, pdf_hash: &str) -> Result<Option<StudyDoc>, StoreError> {
        let path = self.path_for(pdf_hash);
        if !Path::new(&path).exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        let value: serde_json::Value = serde_json::from_str(&text)?;
        let doc = StudyDoc::from_json(&value)?;
        debug!(path = %path.display(), games = doc.games.len(), "study loaded");
        Ok(Some(doc))
    }
}
