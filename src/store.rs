//! Durable state: atomic load/save of the quiz-definitions and
//! quiz-progress documents.
//!
//! Writers serialize the full collection in memory, write it to a `.tmp`
//! sibling, then `rename` over the target path, so a reader only ever sees
//! the prior complete document or the new complete document. A missing
//! document loads as empty (first run); a structurally invalid one is a
//! `StoreError::Corrupt` that the caller surfaces to an admin.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::domain::{Quiz, QuizProgress};
use crate::error::StoreError;

const QUIZZES_FILE: &str = "quizzes.json";
const PROGRESS_FILE: &str = "quiz_progress.json";

pub struct StateStore {
    quizzes_path: PathBuf,
    progress_path: PathBuf,
}

impl StateStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            quizzes_path: data_dir.join(QUIZZES_FILE),
            progress_path: data_dir.join(PROGRESS_FILE),
        }
    }

    #[instrument(level = "debug", skip(self))]
    pub fn load_quizzes(&self) -> Result<Vec<Quiz>, StoreError> {
        load_doc(&self.quizzes_path)
    }

    #[instrument(level = "debug", skip_all, fields(count = quizzes.len()))]
    pub fn save_quizzes(&self, quizzes: &[Quiz]) -> Result<(), StoreError> {
        save_doc(&self.quizzes_path, quizzes)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn load_progress(&self) -> Result<Vec<QuizProgress>, StoreError> {
        load_doc(&self.progress_path)
    }

    #[instrument(level = "debug", skip_all, fields(count = records.len()))]
    pub fn save_progress(&self, records: &[QuizProgress]) -> Result<(), StoreError> {
        save_doc(&self.progress_path, records)
    }
}

fn load_doc<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(target: "store", ?path, "Document missing; starting empty");
            return Ok(Vec::new());
        }
        Err(e) => return Err(StoreError::Io { path: path.to_path_buf(), source: e }),
    };
    serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt { path: path.to_path_buf(), source: e })
}

fn save_doc<T: Serialize>(path: &Path, items: &[T]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::Io { path: path.to_path_buf(), source: e })?;
    }
    let mut raw = serde_json::to_vec_pretty(items)
        .map_err(|e| StoreError::Corrupt { path: path.to_path_buf(), source: e })?;
    raw.push(b'\n');

    // The tmp sibling lives in the same directory so the final rename stays
    // on one filesystem.
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &raw).map_err(|e| StoreError::Io { path: tmp.clone(), source: e })?;
    fs::rename(&tmp, path).map_err(|e| StoreError::Io { path: path.to_path_buf(), source: e })?;
    debug!(target: "store", ?path, bytes = raw.len(), "Document replaced");
    Ok(())
}
