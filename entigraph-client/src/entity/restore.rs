use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::info;

use entigraph_shared::{
    record::{DefinitionRecord, EntityRecord, RelationRecord},
    reference::default_plural,
};

use super::layout::{DEFINITIONS_DIR, ENTITIES_DIR, RELATIONS_DIR, list_record_files, read_record};
use super::normalize::{definition_create_request, entity_create_request, relation_create_request};
use super::pool::run_pool;
use super::report::Reporter;
use crate::server::EntityApi;

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub input_dir: PathBuf,
    pub dry_run: bool,
    pub workers: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Result of one create call inside a phase.
#[derive(Debug)]
pub enum ItemOutcome {
    Succeeded,
    Failed(anyhow::Error),
}

impl PhaseSummary {
    fn from_outcomes(outcomes: &[ItemOutcome]) -> Self {
        let succeeded = outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Succeeded))
            .count();
        Self {
            succeeded,
            failed: outcomes.len() - succeeded,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub definitions: PhaseSummary,
    pub entities: PhaseSummary,
    pub relations: PhaseSummary,
}

impl RestoreSummary {
    pub fn has_failures(&self) -> bool {
        self.definitions.failed + self.entities.failed + self.relations.failed > 0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RestoreError {
    /// Per-item causes were already reported while the phases ran.
    #[error(
        "restore finished with failures: {definitions} definitions, {entities} entities, {relations} relations failed"
    )]
    Failures {
        definitions: usize,
        entities: usize,
        relations: usize,
    },
}

/// Everything read back from a backup directory.
#[derive(Debug, Clone, Default)]
pub struct BackupSet {
    pub definitions: Vec<DefinitionRecord>,
    pub entities: Vec<EntityRecord>,
    pub relations: Vec<RelationRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RelationsFile {
    Many(Vec<RelationRecord>),
    One(RelationRecord),
}

pub fn load_backup(input_dir: &Path, reporter: &dyn Reporter) -> Result<BackupSet> {
    if !input_dir.is_dir() {
        bail!("backup directory {} does not exist", input_dir.display());
    }

    let definition_files = list_record_files(&input_dir.join(DEFINITIONS_DIR))?.unwrap_or_default();
    let entity_files = match list_record_files(&input_dir.join(ENTITIES_DIR))? {
        Some(files) => files,
        None => {
            info!(
                "no {}/ directory, reading entities from {}",
                ENTITIES_DIR,
                input_dir.display()
            );
            list_record_files(input_dir)?.unwrap_or_default()
        }
    };
    let relation_files = list_record_files(&input_dir.join(RELATIONS_DIR))?.unwrap_or_default();

    let relations = read_records::<RelationsFile>(&relation_files, reporter, "relations")
        .into_iter()
        .flat_map(|file| match file {
            RelationsFile::Many(records) => records,
            RelationsFile::One(record) => vec![record],
        })
        .collect();

    Ok(BackupSet {
        definitions: read_records(&definition_files, reporter, "definition"),
        entities: read_records(&entity_files, reporter, "entity"),
        relations,
    })
}

fn read_records<T: DeserializeOwned>(files: &[PathBuf], reporter: &dyn Reporter, what: &str) -> Vec<T> {
    files
        .iter()
        .filter_map(|path| match read_record(path) {
            Ok(record) => Some(record),
            Err(e) => {
                reporter.warn(&format!(
                    "skipping unreadable {what} file {}: {e:#}",
                    path.display()
                ));
                None
            }
        })
        .collect()
}

fn definition_label(d: &DefinitionRecord) -> String {
    d.lookup_key()
}

fn entity_label(e: &EntityRecord) -> String {
    let name = if e.metadata.name.is_empty() {
        "<unnamed>"
    } else {
        &e.metadata.name
    };
    format!("{} {}/{}", e.kind, e.metadata.namespace, name)
}

fn relation_label(r: &RelationRecord) -> String {
    format!("{} -[{}]-> {}", r.source, r.relation, r.target)
}

/// Prints what a restore of `set` would create, without touching the API.
pub fn report_dry_run(set: &BackupSet, reporter: &dyn Reporter) {
    for d in &set.definitions {
        reporter.info(&format!("would restore definition {}", definition_label(d)));
    }
    for e in &set.entities {
        reporter.info(&format!("would restore entity {}", entity_label(e)));
    }
    for r in &set.relations {
        reporter.info(&format!("would restore relation {}", relation_label(r)));
    }
}

/// `group/kind -> plural` from the restored definitions.
pub fn plural_map(definitions: &[DefinitionRecord]) -> HashMap<String, String> {
    definitions
        .iter()
        .map(|d| (d.lookup_key(), d.resolved_plural()))
        .collect()
}

fn resolve_plural(plurals: &HashMap<String, String>, entity: &EntityRecord) -> String {
    plurals
        .get(&entity.lookup_key())
        .cloned()
        .unwrap_or_else(|| default_plural(&entity.kind))
}

/// Restores definitions, then entities, then relations. Each phase runs on
/// its own worker pool and starts only once the previous pool has drained.
pub async fn restore(
    api: Arc<dyn EntityApi>,
    reporter: Arc<dyn Reporter>,
    opts: &RestoreOptions,
) -> Result<RestoreSummary> {
    let set = load_backup(&opts.input_dir, reporter.as_ref())?;
    reporter.info(&format!(
        "loaded {} definitions, {} entities and {} relations from {}",
        set.definitions.len(),
        set.entities.len(),
        set.relations.len(),
        opts.input_dir.display()
    ));

    if opts.dry_run {
        report_dry_run(&set, reporter.as_ref());
        return Ok(RestoreSummary::default());
    }

    let BackupSet {
        definitions,
        entities,
        relations,
    } = set;

    let definitions_summary =
        restore_definitions(&api, &reporter, definitions.clone(), opts.workers).await;

    // built only after the definition pool has drained
    let plurals = Arc::new(plural_map(&definitions));

    let entities_summary = restore_entities(&api, &reporter, entities, plurals, opts.workers).await;

    let relations_summary = restore_relations(&api, &reporter, relations, opts.workers).await;

    let summary = RestoreSummary {
        definitions: definitions_summary,
        entities: entities_summary,
        relations: relations_summary,
    };
    for (phase, s) in [
        ("definitions", summary.definitions),
        ("entities", summary.entities),
        ("relations", summary.relations),
    ] {
        reporter.info(&format!("{phase}: {} restored, {} failed", s.succeeded, s.failed));
    }

    if summary.has_failures() {
        return Err(RestoreError::Failures {
            definitions: summary.definitions.failed,
            entities: summary.entities.failed,
            relations: summary.relations.failed,
        }
        .into());
    }
    Ok(summary)
}

async fn run_phase<T, F, Fut>(
    items: Vec<T>,
    workers: usize,
    reporter: &Arc<dyn Reporter>,
    what: &'static str,
    label: fn(&T) -> String,
    create: F,
) -> PhaseSummary
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let worker_reporter = Arc::clone(reporter);
    let results = run_pool(items, workers, move |item: T| {
        let reporter = Arc::clone(&worker_reporter);
        let label = label(&item);
        let created = create(item);
        async move {
            match created.await {
                Ok(()) => {
                    reporter.success(&format!("restored {what} {label}"));
                    ItemOutcome::Succeeded
                }
                Err(e) => {
                    reporter.error(&format!("failed to restore {what} {label}: {e:#}"));
                    ItemOutcome::Failed(e)
                }
            }
        }
    })
    .await;

    let outcomes: Vec<ItemOutcome> = results
        .into_iter()
        .map(|result| {
            result.unwrap_or_else(|e| {
                reporter.error(&format!("failed to restore {what}: task aborted: {e}"));
                ItemOutcome::Failed(anyhow::anyhow!("{what} task aborted: {e}"))
            })
        })
        .collect();
    PhaseSummary::from_outcomes(&outcomes)
}

async fn restore_definitions(
    api: &Arc<dyn EntityApi>,
    reporter: &Arc<dyn Reporter>,
    definitions: Vec<DefinitionRecord>,
    workers: usize,
) -> PhaseSummary {
    let api = Arc::clone(api);
    run_phase(definitions, workers, reporter, "definition", definition_label, move |d| {
        let api = Arc::clone(&api);
        async move {
            let body = definition_create_request(&d);
            api.create_definition(&body).await?.into_result()?;
            Ok::<(), anyhow::Error>(())
        }
    })
    .await
}

async fn restore_entities(
    api: &Arc<dyn EntityApi>,
    reporter: &Arc<dyn Reporter>,
    entities: Vec<EntityRecord>,
    plurals: Arc<HashMap<String, String>>,
    workers: usize,
) -> PhaseSummary {
    let api = Arc::clone(api);
    run_phase(entities, workers, reporter, "entity", entity_label, move |e| {
        let api = Arc::clone(&api);
        let plural = resolve_plural(&plurals, &e);
        async move {
            let (route, body) = entity_create_request(&e, &plural)?;
            api.create_entity(&route, &body).await?.into_result()?;
            Ok::<(), anyhow::Error>(())
        }
    })
    .await
}

async fn restore_relations(
    api: &Arc<dyn EntityApi>,
    reporter: &Arc<dyn Reporter>,
    relations: Vec<RelationRecord>,
    workers: usize,
) -> PhaseSummary {
    let api = Arc::clone(api);
    run_phase(relations, workers, reporter, "relation", relation_label, move |r| {
        let api = Arc::clone(&api);
        async move {
            let (namespace, body) = relation_create_request(&r)?;
            api.create_relation(&namespace, &body).await?.into_result()?;
            Ok::<(), anyhow::Error>(())
        }
    })
    .await
}
