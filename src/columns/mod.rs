//! Opaque per-dataset column access.
//!
//! The on-disk format of a dataset is not this crate's concern: a
//! [`ColumnSource`] hands out string columns and row-major numeric matrices
//! by path. [`ColumnCache`] memoizes every load, static
//! columns by path and model-dependent columns by `(path, iteration)`, with
//! the same insert-before-load ordering as the anchor store.

mod memory;

use std::sync::Arc;

use glam::Vec2;
pub use memory::InMemoryColumns;
use rustc_hash::FxHashMap;

use crate::anchor::DatasetRole;
use crate::error::PolyphonyError;
use crate::store::{Dispatch, FetchCache, Pending};

/// Source of per-cell and per-cluster columns for one dataset.
pub trait ColumnSource: Send + Sync {
    /// Cell (obs) identifiers in row order.
    fn obs_index(&self) -> Result<Vec<String>, PolyphonyError>;

    /// Gene (var) identifiers in column order.
    fn var_index(&self) -> Result<Vec<String>, PolyphonyError>;

    /// String column at `path`.
    fn string_column(&self, path: &str) -> Result<Vec<String>, PolyphonyError>;

    /// Row-major numeric matrix at `path`.
    fn numeric_matrix(&self, path: &str) -> Result<Matrix, PolyphonyError>;
}

// ---------------------------------------------------------------------------
// Column values
// ---------------------------------------------------------------------------

/// Dense row-major `f32` matrix.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Wrap `data` as a `rows x cols` matrix.
    ///
    /// # Errors
    ///
    /// Returns [`PolyphonyError::Column`] if `data.len() != rows * cols`.
    pub fn new(
        rows: usize,
        cols: usize,
        data: Vec<f32>,
    ) -> Result<Self, PolyphonyError> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(PolyphonyError::Column(format!(
                "matrix of {rows}x{cols} given {} values",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from equally sized rows.
    ///
    /// # Errors
    ///
    /// Returns [`PolyphonyError::Column`] on ragged rows.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self, PolyphonyError> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != cols) {
            return Err(PolyphonyError::Column(format!(
                "row {bad} has {} values, expected {cols}",
                rows[bad].len()
            )));
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data: rows.concat(),
        })
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Row `i`, if in range.
    #[must_use]
    pub fn row(&self, i: usize) -> Option<&[f32]> {
        if i >= self.rows {
            return None;
        }
        self.data.get(i * self.cols..(i + 1) * self.cols)
    }

    /// Copy of column `j`.
    #[must_use]
    pub fn column(&self, j: usize) -> Option<Vec<f32>> {
        (j < self.cols).then(|| {
            self.data.iter().skip(j).step_by(self.cols).copied().collect()
        })
    }
}

/// 2D per-cell embedding, stored as separate x and y columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Embedding {
    x: Vec<f32>,
    y: Vec<f32>,
}

impl Embedding {
    /// Embedding from parallel coordinate columns.
    ///
    /// # Errors
    ///
    /// Returns [`PolyphonyError::Column`] if the columns differ in length.
    pub fn new(x: Vec<f32>, y: Vec<f32>) -> Result<Self, PolyphonyError> {
        if x.len() != y.len() {
            return Err(PolyphonyError::Column(format!(
                "embedding x has {} cells, y has {}",
                x.len(),
                y.len()
            )));
        }
        Ok(Self { x, y })
    }

    /// Take the first two columns of a `cells x dims` matrix.
    ///
    /// # Errors
    ///
    /// Returns [`PolyphonyError::Column`] if the matrix has fewer than two
    /// columns.
    pub fn from_matrix(matrix: &Matrix) -> Result<Self, PolyphonyError> {
        match (matrix.column(0), matrix.column(1)) {
            (Some(x), Some(y)) => Self::new(x, y),
            _ => Err(PolyphonyError::Column(format!(
                "embedding needs 2 dimensions, matrix has {}",
                matrix.cols()
            ))),
        }
    }

    /// Position of cell `i`.
    #[must_use]
    pub fn point(&self, i: usize) -> Option<Vec2> {
        Some(Vec2::new(*self.x.get(i)?, *self.y.get(i)?))
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Whether the embedding holds no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Identifier list with constant-time reverse lookup.
#[derive(Debug, Clone, Default)]
pub struct CellIndex {
    ids: Vec<String>,
    positions: FxHashMap<String, usize>,
}

impl CellIndex {
    /// Index `ids`. On duplicates the first occurrence wins.
    #[must_use]
    pub fn new(ids: Vec<String>) -> Self {
        let mut positions =
            FxHashMap::with_capacity_and_hasher(ids.len(), Default::default());
        for (i, id) in ids.iter().enumerate() {
            let _ = positions.entry(id.clone()).or_insert(i);
        }
        Self { ids, positions }
    }

    /// Row of `id`, if present.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Identifier at row `i`.
    #[must_use]
    pub fn id(&self, i: usize) -> Option<&str> {
        self.ids.get(i).map(String::as_str)
    }

    /// All identifiers in row order.
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Number of identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Cache key: a column path, plus the model iteration for columns that
/// change when the model retrains.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnKey {
    /// Path inside the column source.
    pub path: String,
    /// `None` for static columns.
    pub iteration: Option<u64>,
}

impl ColumnKey {
    /// Static column, loaded once.
    pub fn fixed(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            iteration: None,
        }
    }

    /// Column reloaded per model iteration.
    pub fn at(path: impl Into<String>, iteration: u64) -> Self {
        Self {
            path: path.into(),
            iteration: Some(iteration),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum IndexKind {
    Obs,
    Var,
}

/// Memoizing loader over one dataset's [`ColumnSource`].
pub struct ColumnCache {
    role: DatasetRole,
    source: Arc<dyn ColumnSource>,
    indices: FetchCache<IndexKind, CellIndex>,
    strings: FetchCache<ColumnKey, Vec<String>>,
    matrices: FetchCache<ColumnKey, Matrix>,
    embeddings: FetchCache<ColumnKey, Embedding>,
}

impl ColumnCache {
    /// Cache over `source` for the dataset in `role`.
    pub fn new(
        role: DatasetRole,
        source: Arc<dyn ColumnSource>,
        dispatch: Dispatch,
    ) -> Self {
        Self {
            role,
            source,
            indices: FetchCache::new("index", dispatch),
            strings: FetchCache::new("column", dispatch),
            matrices: FetchCache::new("matrix", dispatch),
            embeddings: FetchCache::new("embedding", dispatch),
        }
    }

    /// Dataset role served by this cache.
    #[must_use]
    pub fn role(&self) -> DatasetRole {
        self.role
    }

    /// Cell index.
    pub fn cells(&self) -> Pending<CellIndex> {
        let source = Arc::clone(&self.source);
        self.indices.get_or_fetch(IndexKind::Obs, move || {
            source.obs_index().map(CellIndex::new)
        })
    }

    /// Gene index.
    pub fn genes(&self) -> Pending<CellIndex> {
        let source = Arc::clone(&self.source);
        self.indices.get_or_fetch(IndexKind::Var, move || {
            source.var_index().map(CellIndex::new)
        })
    }

    /// String column for `key`.
    pub fn strings(&self, key: ColumnKey) -> Pending<Vec<String>> {
        if let Some(missing) = self.unconfigured(&key, "string column") {
            return missing;
        }
        let source = Arc::clone(&self.source);
        let path = key.path.clone();
        self.strings
            .get_or_fetch(key, move || source.string_column(&path))
    }

    /// Numeric matrix for `key`.
    pub fn matrix(&self, key: ColumnKey) -> Pending<Matrix> {
        if let Some(missing) = self.unconfigured(&key, "matrix") {
            return missing;
        }
        let source = Arc::clone(&self.source);
        let path = key.path.clone();
        self.matrices
            .get_or_fetch(key, move || source.numeric_matrix(&path))
    }

    /// 2D embedding built from the matrix at `key`.
    pub fn embedding(&self, key: ColumnKey) -> Pending<Embedding> {
        if let Some(missing) = self.unconfigured(&key, "embedding") {
            return missing;
        }
        let source = Arc::clone(&self.source);
        let path = key.path.clone();
        self.embeddings.get_or_fetch(key, move || {
            Embedding::from_matrix(&source.numeric_matrix(&path)?)
        })
    }

    /// Drop model-dependent entries older than `iteration`.
    pub fn evict_before(&self, iteration: u64) {
        let keep = |k: &ColumnKey| k.iteration.is_none_or(|it| it >= iteration);
        self.strings.retain(keep);
        self.matrices.retain(keep);
        self.embeddings.retain(keep);
    }

    /// Resolved `LoaderNotFound` when `key` names no path.
    fn unconfigured<T>(
        &self,
        key: &ColumnKey,
        data_type: &str,
    ) -> Option<Pending<T>> {
        if !key.path.is_empty() {
            return None;
        }
        let missing = Pending::new();
        missing.complete(Err(PolyphonyError::LoaderNotFound {
            dataset: self.role,
            data_type: data_type.to_owned(),
            path: None,
        }));
        Some(missing)
    }
}

/// Column caches for both dataset roles; either may be unconfigured.
#[derive(Default)]
pub struct DatasetLoaders {
    reference: Option<ColumnCache>,
    query: Option<ColumnCache>,
}

impl DatasetLoaders {
    /// Loaders with both roles configured.
    #[must_use]
    pub fn new(reference: ColumnCache, query: ColumnCache) -> Self {
        Self {
            reference: Some(reference),
            query: Some(query),
        }
    }

    /// Install (or replace) the cache for its role.
    pub fn insert(&mut self, cache: ColumnCache) {
        match cache.role() {
            DatasetRole::Reference => self.reference = Some(cache),
            DatasetRole::Query => self.query = Some(cache),
        }
    }

    /// Cache for `role`.
    ///
    /// # Errors
    ///
    /// Returns [`PolyphonyError::LoaderNotFound`] if `role` is unconfigured.
    pub fn get(
        &self,
        role: DatasetRole,
        data_type: &str,
    ) -> Result<&ColumnCache, PolyphonyError> {
        let cache = match role {
            DatasetRole::Reference => self.reference.as_ref(),
            DatasetRole::Query => self.query.as_ref(),
        };
        cache.ok_or_else(|| PolyphonyError::LoaderNotFound {
            dataset: role,
            data_type: data_type.to_owned(),
            path: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> Arc<InMemoryColumns> {
        Arc::new(
            InMemoryColumns::new(vec!["a".into(), "b".into(), "c".into()])
                .with_strings("obs/cell_type", &["T", "B", "T"])
                .with_matrix(
                    "obsm/X_umap",
                    Matrix::new(3, 2, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])
                        .unwrap(),
                ),
        )
    }

    #[test]
    fn matrix_rows_and_columns() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.row(1), Some(&[3.0, 4.0][..]));
        assert_eq!(m.row(2), None);
        assert_eq!(m.column(0), Some(vec![1.0, 3.0]));
        assert!(Matrix::new(2, 2, vec![1.0]).is_err());
        assert!(Matrix::from_rows(&[vec![1.0], vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn cell_index_lookup() {
        let index = CellIndex::new(vec!["x".into(), "y".into(), "x".into()]);
        assert_eq!(index.position("x"), Some(0));
        assert_eq!(index.position("y"), Some(1));
        assert_eq!(index.position("z"), None);
        assert_eq!(index.id(1), Some("y"));
    }

    #[test]
    fn embedding_from_matrix() {
        let cache =
            ColumnCache::new(DatasetRole::Query, source(), Dispatch::Inline);
        let embedding = cache
            .embedding(ColumnKey::fixed("obsm/X_umap"))
            .wait()
            .unwrap();
        assert_eq!(embedding.len(), 3);
        assert_eq!(embedding.point(1), Some(Vec2::new(2.0, 3.0)));
        assert_eq!(embedding.point(3), None);
    }

    #[test]
    fn dynamic_columns_are_keyed_by_iteration() {
        let src = source();
        let cache =
            ColumnCache::new(DatasetRole::Query, src.clone(), Dispatch::Inline);
        let _ = cache.strings(ColumnKey::at("obs/cell_type", 0)).wait();
        let _ = cache.strings(ColumnKey::at("obs/cell_type", 0)).wait();
        let _ = cache.strings(ColumnKey::at("obs/cell_type", 1)).wait();
        let _ = cache.strings(ColumnKey::fixed("obs/cell_type")).wait();
        assert_eq!(src.load_count(), 3);

        cache.evict_before(1);
        let _ = cache.strings(ColumnKey::at("obs/cell_type", 1)).wait();
        let _ = cache.strings(ColumnKey::fixed("obs/cell_type")).wait();
        assert_eq!(src.load_count(), 3);
        let _ = cache.strings(ColumnKey::at("obs/cell_type", 0)).wait();
        assert_eq!(src.load_count(), 4);
    }

    #[test]
    fn missing_path_is_loader_not_found() {
        let cache =
            ColumnCache::new(DatasetRole::Reference, source(), Dispatch::Inline);
        let err = cache.strings(ColumnKey::fixed("")).wait().unwrap_err();
        assert!(matches!(
            err,
            PolyphonyError::LoaderNotFound {
                dataset: DatasetRole::Reference,
                ..
            }
        ));
    }

    #[test]
    fn unconfigured_role_is_loader_not_found() {
        let mut loaders = DatasetLoaders::default();
        loaders.insert(ColumnCache::new(
            DatasetRole::Query,
            source(),
            Dispatch::Inline,
        ));
        assert!(loaders.get(DatasetRole::Query, "cells").is_ok());
        assert!(matches!(
            loaders.get(DatasetRole::Reference, "cells"),
            Err(PolyphonyError::LoaderNotFound { .. })
        ));
    }
}
