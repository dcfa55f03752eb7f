//! Command-line client: inspect anchors and apply one edit against a running
//! anchor service.

use std::path::PathBuf;
use std::sync::Arc;

use polyphony::anchor::{AnchorBucket, DatasetRole};
use polyphony::columns::{ColumnCache, DatasetLoaders, InMemoryColumns};
use polyphony::coordination::CellSelection;
use polyphony::error::{PolyphonyError, WarningLog};
use polyphony::gateway::http::HttpGateway;
use polyphony::options::Options;
use polyphony::session::{AnchorCommand, AnchorSession};
use polyphony::store::{AnchorStore, Dispatch};
use polyphony::views::DerivedViews;
use web_time::Instant;

const USAGE: &str = "Usage: polyphony [--config FILE] [--reference-columns FILE] \
[--query-columns FILE] <status | confirm ID | delete ID | add CELL... | refine ID CELL... | update-model>";

enum Action {
    Status,
    Confirm(String),
    Delete(String),
    Add(Vec<String>),
    Refine(String, Vec<String>),
    UpdateModel,
}

struct Cli {
    config: Option<PathBuf>,
    reference_columns: Option<PathBuf>,
    query_columns: Option<PathBuf>,
    action: Action,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Cli, String> {
    let mut config = None;
    let mut reference_columns = None;
    let mut query_columns = None;
    let mut rest = Vec::new();

    while let Some(arg) = args.next() {
        let slot = match arg.as_str() {
            "--config" => Some(&mut config),
            "--reference-columns" => Some(&mut reference_columns),
            "--query-columns" => Some(&mut query_columns),
            _ => None,
        };
        match slot {
            Some(slot) => {
                let value = args.next().ok_or_else(|| format!("{arg} needs a value"))?;
                *slot = Some(PathBuf::from(value));
            }
            None => rest.push(arg),
        }
    }

    let mut rest = rest.into_iter();
    let action = match rest.next().as_deref() {
        Some("status") => Action::Status,
        Some("confirm") => Action::Confirm(rest.next().ok_or("confirm needs an anchor id")?),
        Some("delete") => Action::Delete(rest.next().ok_or("delete needs an anchor id")?),
        Some("add") => Action::Add(rest.collect()),
        Some("refine") => {
            let id = rest.next().ok_or("refine needs an anchor id")?;
            Action::Refine(id, rest.collect())
        }
        Some("update-model") => Action::UpdateModel,
        Some(other) => return Err(format!("unknown command {other}")),
        None => return Err(USAGE.to_owned()),
    };
    Ok(Cli {
        config,
        reference_columns,
        query_columns,
        action,
    })
}

fn load_loaders(cli: &Cli) -> Result<DatasetLoaders, PolyphonyError> {
    let mut loaders = DatasetLoaders::default();
    for (role, path) in [
        (DatasetRole::Reference, &cli.reference_columns),
        (DatasetRole::Query, &cli.query_columns),
    ] {
        if let Some(path) = path {
            let source = Arc::new(InMemoryColumns::load(path)?);
            loaders.insert(ColumnCache::new(role, source, Dispatch::Inline));
        }
    }
    Ok(loaders)
}

/// Log every collected warning and exit with status 1.
fn exit_with_warnings(warnings: &WarningLog) -> ! {
    for warning in warnings.drain() {
        log::error!("{warning}");
    }
    std::process::exit(1);
}

fn report(session: &AnchorSession, views: &mut DerivedViews) -> Result<(), PolyphonyError> {
    let Some(snapshot) = session.snapshot() else {
        log::warn!("anchors for iteration {} are not loaded", session.iteration());
        return Ok(());
    };
    for bucket in AnchorBucket::ALL {
        log::info!("{bucket}: {} anchors", snapshot.bucket(bucket).len());
    }

    let total_cells = views
        .loaders()
        .get(DatasetRole::Query, "cells")
        .ok()
        .and_then(|cache| cache.cells().wait().ok())
        .map_or(0, |cells| cells.len());
    if let Some(summary) = session.status_summary(total_cells) {
        log::info!(
            "confirmed {}/{} sets, {}/{} cells",
            summary.confirmed_sets,
            summary.total_sets,
            summary.confirmed_cells,
            summary.total_cells
        );
    }

    match views.scores(session) {
        Ok(Some(scores)) => {
            for r in scores.reports() {
                log::info!(
                    "{} -> {}: top gene score {:.1}, {} cells",
                    r.id,
                    r.reference_cluster_id,
                    r.top_gene_score,
                    r.num_cells
                );
            }
        }
        Ok(None) => {}
        Err(PolyphonyError::LoaderNotFound { .. }) => {
            log::debug!("no columns given, skipping scores");
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), PolyphonyError> {
    let options = match &cli.config {
        Some(path) => Options::load(path)?,
        None => Options::default(),
    };
    let mut views = DerivedViews::new(load_loaders(&cli)?, &options);

    let gateway = Arc::new(HttpGateway::new(&options.api));
    let warnings = Arc::new(WarningLog::new());
    let store = AnchorStore::new(gateway, Dispatch::Inline);
    let mut session = AnchorSession::new(store, &options, Dispatch::Inline)
        .with_warnings(warnings.clone());
    let _ = session.poll(Instant::now());
    if session.snapshot().is_none() {
        exit_with_warnings(&warnings);
    }

    let selection = |cells: Vec<String>| AnchorCommand::SetSelection {
        selection: Some(CellSelection::single("cli", cells)),
    };
    let commands = match cli.action {
        Action::Status => Vec::new(),
        Action::Confirm(anchor_id) => vec![AnchorCommand::Confirm { anchor_id }],
        Action::Delete(anchor_id) => vec![AnchorCommand::Delete { anchor_id }],
        Action::Add(cells) => vec![AnchorCommand::BeginAdd, selection(cells)],
        Action::Refine(anchor_id, cells) => {
            vec![AnchorCommand::BeginEdit { anchor_id }, selection(cells)]
        }
        Action::UpdateModel => vec![AnchorCommand::UpdateModel],
    };
    let mut accepted = true;
    for command in commands {
        log::debug!("{command:?}");
        let selects = matches!(command, AnchorCommand::SetSelection { .. });
        if !command.execute(&mut session) {
            accepted = false;
            if selects {
                log::error!(
                    "selection is not a valid anchor: expected one group of at least {} \
                     cells; the editor is back in explore mode",
                    options.edit.min_selection_cells
                );
            }
        }
    }
    let _ = session.poll(Instant::now());

    if !accepted || !warnings.is_empty() {
        exit_with_warnings(&warnings);
    }
    if session.iteration() > 0 {
        log::info!("now at iteration {}", session.iteration());
    }
    match views.seed_cell_sets(&mut session) {
        Ok(_) | Err(PolyphonyError::LoaderNotFound { .. }) => {}
        Err(e) => return Err(e),
    }
    report(&session, &mut views)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let cli = match parse_args(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(e) => {
            log::error!("{e}");
            log::error!("{USAGE}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
