//! Persona profile files: one JSON list of personas per file.

use std::path::PathBuf;

use serde_json::Value;

use super::{checked_path, json_file_names};
use crate::persona::Persona;
use crate::utilities::errors::StorageError;

#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Profile file names, sorted.
    pub fn list(&self) -> Result<Vec<String>, StorageError> {
        if !self.dir.is_dir() {
            return Err(StorageError::NotFound {
                name: self.dir.display().to_string(),
            });
        }
        json_file_names(&self.dir)
    }

    /// The file's JSON as stored.
    pub fn load_raw(&self, name: &str) -> Result<Value, StorageError> {
        let path = checked_path(&self.dir, name)?;
        if !path.is_file() {
            return Err(StorageError::NotFound {
                name: name.to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// The personas listed in a profile file.
    pub fn load(&self, name: &str) -> Result<Vec<Persona>, StorageError> {
        let personas = serde_json::from_value(self.load_raw(name)?)?;
        Ok(personas)
    }
}
