use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use rustc_hash::FxHashMap;
use serde::Deserialize;

use super::{ColumnSource, Matrix};
use crate::error::PolyphonyError;

/// Column source held entirely in memory.
///
/// Built programmatically or read from a JSON export:
///
/// ```json
/// {
///   "obs_index": ["c0", "c1"],
///   "var_index": ["CD3E", "MS4A1"],
///   "strings": {"obs/cell_type": ["T", "B"]},
///   "matrices": {"obsm/X_umap": [[0.0, 1.0], [2.0, 3.0]]}
/// }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryColumns {
    obs_index: Vec<String>,
    var_index: Vec<String>,
    strings: FxHashMap<String, Vec<String>>,
    matrices: FxHashMap<String, Matrix>,
    loads: AtomicUsize,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct ColumnsFile {
    obs_index: Vec<String>,
    var_index: Vec<String>,
    strings: FxHashMap<String, Vec<String>>,
    matrices: FxHashMap<String, Vec<Vec<f32>>>,
}

impl InMemoryColumns {
    /// Source with the given cell ids and nothing else.
    #[must_use]
    pub fn new(obs_index: Vec<String>) -> Self {
        Self {
            obs_index,
            ..Self::default()
        }
    }

    /// Parse a JSON export.
    ///
    /// # Errors
    ///
    /// Returns [`PolyphonyError::Column`] on malformed JSON or ragged
    /// matrices.
    pub fn from_json(text: &str) -> Result<Self, PolyphonyError> {
        let file: ColumnsFile = serde_json::from_str(text)
            .map_err(|e| PolyphonyError::Column(e.to_string()))?;
        let mut matrices = FxHashMap::default();
        for (path, rows) in file.matrices {
            let matrix = Matrix::from_rows(&rows).map_err(|e| {
                PolyphonyError::Column(format!("{path}: {e}"))
            })?;
            let _ = matrices.insert(path, matrix);
        }
        Ok(Self {
            obs_index: file.obs_index,
            var_index: file.var_index,
            strings: file.strings,
            matrices,
            loads: AtomicUsize::new(0),
        })
    }

    /// Read a JSON export from disk.
    ///
    /// # Errors
    ///
    /// Returns [`PolyphonyError::Io`] if the file cannot be read, otherwise
    /// as [`from_json`](Self::from_json).
    pub fn load(path: &Path) -> Result<Self, PolyphonyError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Set the gene ids.
    #[must_use]
    pub fn with_genes(mut self, genes: &[&str]) -> Self {
        self.var_index = genes.iter().map(|g| (*g).to_owned()).collect();
        self
    }

    /// Add a string column.
    #[must_use]
    pub fn with_strings(mut self, path: &str, values: &[&str]) -> Self {
        let _ = self.strings.insert(
            path.to_owned(),
            values.iter().map(|v| (*v).to_owned()).collect(),
        );
        self
    }

    /// Add a matrix.
    #[must_use]
    pub fn with_matrix(mut self, path: &str, matrix: Matrix) -> Self {
        let _ = self.matrices.insert(path.to_owned(), matrix);
        self
    }

    /// Number of column/matrix loads served so far.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    fn lookup<'a, T>(
        &self,
        table: &'a FxHashMap<String, T>,
        path: &str,
    ) -> Result<&'a T, PolyphonyError> {
        let _ = self.loads.fetch_add(1, Ordering::Relaxed);
        table
            .get(path)
            .ok_or_else(|| PolyphonyError::Column(format!("no column at {path}")))
    }
}

impl ColumnSource for InMemoryColumns {
    fn obs_index(&self) -> Result<Vec<String>, PolyphonyError> {
        Ok(self.obs_index.clone())
    }

    fn var_index(&self) -> Result<Vec<String>, PolyphonyError> {
        Ok(self.var_index.clone())
    }

    fn string_column(&self, path: &str) -> Result<Vec<String>, PolyphonyError> {
        self.lookup(&self.strings, path).cloned()
    }

    fn numeric_matrix(&self, path: &str) -> Result<Matrix, PolyphonyError> {
        self.lookup(&self.matrices, path).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_export() {
        let json = r#"{
            "obs_index": ["c0", "c1"],
            "var_index": ["CD3E"],
            "strings": {"obs/cell_type": ["T", "B"]},
            "matrices": {"obsm/X_umap": [[0.0, 1.0], [2.0, 3.0]]}
        }"#;
        let columns = InMemoryColumns::from_json(json).unwrap();
        assert_eq!(columns.obs_index().unwrap(), ["c0", "c1"]);
        assert_eq!(columns.string_column("obs/cell_type").unwrap(), ["T", "B"]);
        let umap = columns.numeric_matrix("obsm/X_umap").unwrap();
        assert_eq!(umap.rows(), 2);
        assert_eq!(umap.cols(), 2);
        assert!(columns.string_column("obs/prediction").is_err());
        assert_eq!(columns.load_count(), 3);
    }

    #[test]
    fn ragged_matrix_is_rejected() {
        let json = r#"{"matrices": {"m": [[0.0], [1.0, 2.0]]}}"#;
        let err = InMemoryColumns::from_json(json).unwrap_err();
        assert!(err.to_string().contains('m'));
    }
}
