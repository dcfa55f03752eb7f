//! Derived, memoized views over the session state and the dataset columns.
//!
//! Every view is keyed by the anchor iteration, the model iteration and
//! whatever coordination values it reads, so a view is computed once per
//! generation of inputs and never mixes inputs from two generations. Columns
//! the model rewrites when it retrains (embeddings, anchor clusters,
//! differential genes and predictions) are loaded per model iteration on
//! both datasets; only cell types and the cell/gene indices are static.
//! Views whose columns are still loading return `Ok(None)`; a failed column
//! load is returned as an error and retried on the next call.

use std::sync::Arc;

use crate::anchor::{ApiStatus, DatasetRole};
use crate::columns::{CellIndex, ColumnCache, ColumnKey, DatasetLoaders, Embedding};
use crate::coordination::{CellSetColor, Coordination};
use crate::error::PolyphonyError;
use crate::links::{AnchorLinks, LinkGeometryBuilder, LinkInputs};
use crate::options::Options;
use crate::resolver::{
    contour_groups, AnchorSetOfInterest, AnchorSetOfInterestResolver, Canvas,
    ContourGroup, Interest, ResolverInputs,
};
use crate::scoring::{
    CellPartition, GeneOverlapScorer, ReferenceRankings, ScoringInputs,
    SeparatedGenes, SnapshotScores,
};
use crate::session::AnchorSession;
use crate::store::Pending;
use crate::util::memo::Memo;

/// Name of the reference cell-type tree.
pub const REFERENCE_PARTITION: &str = "Cell Type";

/// Outcome of a view: `Ok(None)` while inputs are loading.
pub type ViewResult<T> = Result<Option<T>, PolyphonyError>;

/// Non-blocking read of a pending load.
fn ready<T>(pending: &Pending<T>) -> ViewResult<Arc<T>> {
    pending.try_get().transpose()
}

// ---------------------------------------------------------------------------
// Loaded columns
// ---------------------------------------------------------------------------

struct QueryColumns {
    cells: Arc<CellIndex>,
    genes: Arc<CellIndex>,
    embedding: Arc<Embedding>,
    predictions: Arc<Vec<String>>,
}

struct ReferenceColumns {
    embedding: Arc<Embedding>,
    clusters: Arc<Vec<String>>,
    cell_types: Arc<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
struct InterestKey {
    anchor_iteration: u64,
    model_iteration: u64,
    anchor_id: Option<String>,
    canvas: Canvas,
}

type ScoresKey = (u64, u64, Vec<CellSetColor>);

// ---------------------------------------------------------------------------
// DerivedViews
// ---------------------------------------------------------------------------

/// Memoized scorer, resolver and link outputs for one session.
pub struct DerivedViews {
    loaders: DatasetLoaders,
    options: Options,
    scorer: GeneOverlapScorer,
    resolver: AnchorSetOfInterestResolver,
    rankings: Memo<u64, ReferenceRankings>,
    query_partition: Memo<(u64, Vec<CellSetColor>), CellPartition>,
    reference_partition: Memo<Vec<CellSetColor>, CellPartition>,
    scores: Memo<ScoresKey, SnapshotScores>,
    focus: Memo<InterestKey, Option<Arc<AnchorSetOfInterest>>>,
    highlight: Memo<InterestKey, Option<Arc<AnchorSetOfInterest>>>,
    links: Memo<(u64, u64), AnchorLinks>,
    evicted_before: u64,
}

impl DerivedViews {
    /// Views reading columns through `loaders`.
    #[must_use]
    pub fn new(loaders: DatasetLoaders, options: &Options) -> Self {
        Self {
            loaders,
            scorer: GeneOverlapScorer::from_options(&options.scoring),
            resolver: AnchorSetOfInterestResolver::new(&options.viewport),
            options: options.clone(),
            rankings: Memo::new(),
            query_partition: Memo::new(),
            reference_partition: Memo::new(),
            scores: Memo::new(),
            focus: Memo::new(),
            highlight: Memo::new(),
            links: Memo::new(),
            evicted_before: 0,
        }
    }

    /// Column loaders.
    #[must_use]
    pub fn loaders(&self) -> &DatasetLoaders {
        &self.loaders
    }

    /// Whether both services are idle and the current snapshot has landed.
    #[must_use]
    pub fn is_ready(&self, session: &AnchorSession) -> bool {
        let state = session.coordination();
        state.anchor_api().status == ApiStatus::Success
            && state.model_api().status == ApiStatus::Success
            && session.snapshot().is_some()
    }

    // -- Column loading --

    fn cache(&self, role: DatasetRole) -> Result<&ColumnCache, PolyphonyError> {
        self.loaders.get(role, "columns")
    }

    /// Drop column entries of older model iterations on both datasets.
    fn evict_before(&mut self, model_iteration: u64) {
        if model_iteration <= self.evicted_before {
            return;
        }
        for role in [DatasetRole::Reference, DatasetRole::Query] {
            if let Ok(cache) = self.cache(role) {
                cache.evict_before(model_iteration);
            }
        }
        log::debug!("evicted columns before model iteration {model_iteration}");
        self.evicted_before = model_iteration;
    }

    fn query_columns(&mut self, model_iteration: u64) -> ViewResult<QueryColumns> {
        self.evict_before(model_iteration);
        let cache = self.cache(DatasetRole::Query)?;
        let paths = &self.options.query;
        let cells = cache.cells();
        let genes = cache.genes();
        let embedding = cache.embedding(ColumnKey::at(paths.embedding.as_str(), model_iteration));
        let predictions =
            cache.strings(ColumnKey::at(paths.prediction.as_str(), model_iteration));

        let (Some(cells), Some(genes), Some(embedding), Some(predictions)) = (
            ready(&cells)?,
            ready(&genes)?,
            ready(&embedding)?,
            ready(&predictions)?,
        ) else {
            return Ok(None);
        };
        Ok(Some(QueryColumns {
            cells,
            genes,
            embedding,
            predictions,
        }))
    }

    fn reference_columns(&mut self, model_iteration: u64) -> ViewResult<ReferenceColumns> {
        self.evict_before(model_iteration);
        let cache = self.cache(DatasetRole::Reference)?;
        let paths = &self.options.reference;
        let embedding =
            cache.embedding(ColumnKey::at(paths.embedding.as_str(), model_iteration));
        let clusters =
            cache.strings(ColumnKey::at(paths.anchor_cluster.as_str(), model_iteration));
        let cell_types = cache.strings(ColumnKey::fixed(paths.cell_type.as_str()));

        let (Some(embedding), Some(clusters), Some(cell_types)) =
            (ready(&embedding)?, ready(&clusters)?, ready(&cell_types)?)
        else {
            return Ok(None);
        };
        Ok(Some(ReferenceColumns {
            embedding,
            clusters,
            cell_types,
        }))
    }

    fn rankings(&mut self, model_iteration: u64) -> ViewResult<Arc<ReferenceRankings>> {
        self.evict_before(model_iteration);
        let cache = self.cache(DatasetRole::Reference)?;
        let paths = &self.options.reference;
        let at = |path: &str| ColumnKey::at(path, model_iteration);
        let genes = cache.genes();
        let clusters = cache.strings(at(&paths.diff_gene_clusters));
        let names = cache.matrix(at(&paths.diff_gene_names));
        let scores = cache.matrix(at(&paths.diff_gene_scores));

        let (Some(genes), Some(clusters), Some(names), Some(scores)) = (
            ready(&genes)?,
            ready(&clusters)?,
            ready(&names)?,
            ready(&scores)?,
        ) else {
            return Ok(None);
        };
        let rankings = self.rankings.try_get_or_compute(model_iteration, || {
            let rankings = ReferenceRankings::from_columns(&clusters, &names, &scores, &genes)?;
            log::debug!(
                "ranked genes for {} reference clusters at model iteration {model_iteration}",
                rankings.len()
            );
            Ok::<_, PolyphonyError>(rankings)
        })?;
        Ok(Some(rankings))
    }

    fn query_partition(
        &mut self,
        state: &Coordination,
        query: &QueryColumns,
    ) -> Arc<CellPartition> {
        let colors = state.role(DatasetRole::Query).cell_set_color().to_vec();
        let key = (state.model_api().iteration, colors.clone());
        let parent = &self.options.scoring.partition_key;
        let fallback = self.options.scoring.fallback_color;
        self.query_partition.get_or_compute(key, || {
            CellPartition::new(parent.as_str(), query.predictions.to_vec(), &colors, fallback)
        })
    }

    fn reference_partition(
        &mut self,
        state: &Coordination,
        reference: &ReferenceColumns,
    ) -> Arc<CellPartition> {
        let colors = state.role(DatasetRole::Reference).cell_set_color().to_vec();
        let fallback = self.options.scoring.fallback_color;
        self.reference_partition.get_or_compute(colors.clone(), || {
            CellPartition::new(
                REFERENCE_PARTITION,
                reference.cell_types.to_vec(),
                &colors,
                fallback,
            )
        })
    }

    // -- Views --

    /// Seed the session's cell-set colors from the reference cell types and
    /// the query predictions. Returns `false` while columns are loading.
    ///
    /// # Errors
    ///
    /// Returns the first column load failure.
    pub fn seed_cell_sets(
        &mut self,
        session: &mut AnchorSession,
    ) -> Result<bool, PolyphonyError> {
        let model_iteration = session.coordination().model_api().iteration;
        let (Some(query), Some(reference)) = (
            self.query_columns(model_iteration)?,
            self.reference_columns(model_iteration)?,
        ) else {
            return Ok(false);
        };
        let reference_sizes =
            CellPartition::new(REFERENCE_PARTITION, reference.cell_types.to_vec(), &[], [0; 3])
                .class_sizes();
        let query_classes = crate::scoring::class_names(&query.predictions);
        session.seed_cell_sets(
            REFERENCE_PARTITION,
            &reference_sizes,
            &self.options.scoring.partition_key,
            query_classes,
        );
        Ok(true)
    }

    /// Gene overlap reports for every anchor of the current snapshot.
    pub fn scores(&mut self, session: &AnchorSession) -> ViewResult<Arc<SnapshotScores>> {
        let Some(snapshot) = session.snapshot() else {
            return Ok(None);
        };
        let state = session.coordination();
        let model_iteration = state.model_api().iteration;
        let (Some(query), Some(rankings)) =
            (self.query_columns(model_iteration)?, self.rankings(model_iteration)?)
        else {
            return Ok(None);
        };
        let partition = self.query_partition(state, &query);

        let key = (
            state.anchor_api().iteration,
            model_iteration,
            state.role(DatasetRole::Query).cell_set_color().to_vec(),
        );
        let scorer = self.scorer;
        Ok(Some(self.scores.get_or_compute(key, || {
            log::debug!("scoring {} anchors", snapshot.len());
            scorer.score_snapshot(
                &snapshot,
                &ScoringInputs {
                    query_genes: query.genes.ids(),
                    reference: &rankings,
                    query_cells: &query.cells,
                    partition: &partition,
                },
            )
        })))
    }

    /// Display genes of one anchor split by side.
    pub fn separated_genes(
        &mut self,
        session: &AnchorSession,
        anchor_id: &str,
    ) -> ViewResult<SeparatedGenes> {
        Ok(self
            .scores(session)?
            .and_then(|scores| scores.get(anchor_id).map(SeparatedGenes::from_report)))
    }

    fn interest(
        &mut self,
        session: &AnchorSession,
        interest: Interest,
        canvas: Canvas,
    ) -> ViewResult<Arc<AnchorSetOfInterest>> {
        let state = session.coordination();
        let query_role = state.role(DatasetRole::Query);
        let anchor_id = match interest {
            Interest::Focus => query_role.anchor_set_focus(),
            Interest::Highlight => query_role.anchor_set_highlight(),
        };
        if anchor_id.is_none() {
            return Ok(None);
        }
        let Some(snapshot) = session.snapshot() else {
            return Ok(None);
        };
        let model_iteration = state.model_api().iteration;
        let (Some(query), Some(reference)) = (
            self.query_columns(model_iteration)?,
            self.reference_columns(model_iteration)?,
        ) else {
            return Ok(None);
        };

        let key = InterestKey {
            anchor_iteration: state.anchor_api().iteration,
            model_iteration,
            anchor_id: anchor_id.map(str::to_owned),
            canvas,
        };
        let resolver = self.resolver;
        let memo = match interest {
            Interest::Focus => &mut self.focus,
            Interest::Highlight => &mut self.highlight,
        };
        let resolved = memo.get_or_compute(key, || {
            resolver
                .resolve(
                    anchor_id,
                    interest,
                    &ResolverInputs {
                        snapshot: &snapshot,
                        query_cells: &query.cells,
                        query_embedding: &query.embedding,
                        reference_clusters: &reference.clusters,
                    },
                    canvas,
                )
                .map(Arc::new)
        });
        Ok((*resolved).clone())
    }

    /// Cells and suggested view of the focused query anchor.
    pub fn focus(
        &mut self,
        session: &AnchorSession,
        canvas: Canvas,
    ) -> ViewResult<Arc<AnchorSetOfInterest>> {
        self.interest(session, Interest::Focus, canvas)
    }

    /// Cells of the highlighted query anchor.
    pub fn highlight(&mut self, session: &AnchorSession) -> ViewResult<Arc<AnchorSetOfInterest>> {
        self.interest(session, Interest::Highlight, Canvas::new(0.0, 0.0))
    }

    /// Per-class contours of the focused anchor on `role`. With nothing
    /// focused every class is listed hidden.
    pub fn contours(
        &mut self,
        session: &AnchorSession,
        role: DatasetRole,
        canvas: Canvas,
    ) -> ViewResult<Vec<ContourGroup>> {
        let focus = self.focus(session, canvas)?;
        let state = session.coordination();
        let model_iteration = state.model_api().iteration;
        let partition = match role {
            DatasetRole::Query => {
                let Some(query) = self.query_columns(model_iteration)? else {
                    return Ok(None);
                };
                self.query_partition(state, &query)
            }
            DatasetRole::Reference => {
                let Some(reference) = self.reference_columns(model_iteration)? else {
                    return Ok(None);
                };
                self.reference_partition(state, &reference)
            }
        };
        let members = focus.as_deref().map(|soi| match role {
            DatasetRole::Query => soi.query_indices.as_slice(),
            DatasetRole::Reference => soi.reference_indices.as_slice(),
        });
        Ok(Some(contour_groups(members, &partition)))
    }

    /// Query/reference centroid links of every anchor.
    pub fn links(&mut self, session: &AnchorSession) -> ViewResult<Arc<AnchorLinks>> {
        let Some(snapshot) = session.snapshot() else {
            return Ok(None);
        };
        let scores = self.scores(session)?;
        let state = session.coordination();
        let model_iteration = state.model_api().iteration;
        let (Some(query), Some(reference)) = (
            self.query_columns(model_iteration)?,
            self.reference_columns(model_iteration)?,
        ) else {
            return Ok(None);
        };
        let key = (state.anchor_api().iteration, model_iteration);
        Ok(Some(self.links.get_or_compute(key, || {
            LinkGeometryBuilder.build(&LinkInputs {
                snapshot: &snapshot,
                query_cells: &query.cells,
                query_embedding: &query.embedding,
                reference_embedding: &reference.embedding,
                reference_clusters: &reference.clusters,
                scores: scores.as_deref(),
            })
        })))
    }
}
