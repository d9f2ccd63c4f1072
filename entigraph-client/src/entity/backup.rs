use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};

use entigraph_shared::record::RelationRecord;

use super::layout::{BackupFormat, Layout, RELATIONS_FILE_STEM, write_record};
use super::normalize::{filter_definition, filter_entity, filter_relation};
use super::report::Reporter;
use crate::server::{EntityApi, EntityQuery};

pub const ENTITY_PAGE_SIZE: u32 = 500;
/// Relations are only reachable through an entity listing, so they are
/// fetched with one broad query.
pub const RELATION_QUERY_LIMIT: u32 = 10_000;

#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    pub output_dir: PathBuf,
    pub name: Option<String>,
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
    pub format: BackupFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackupSummary {
    pub definitions: usize,
    pub entities: usize,
    pub relations: usize,
}

impl std::fmt::Display for BackupSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "backed up {} definitions, {} entities, and {} relations",
            self.definitions, self.entities, self.relations
        )
    }
}

pub async fn backup<A: EntityApi + ?Sized>(
    api: &A,
    reporter: &dyn Reporter,
    opts: &BackupOptions,
) -> Result<BackupSummary> {
    let layout = Layout::create(&opts.output_dir)?;
    let mut summary = BackupSummary::default();

    let definitions = api
        .list_definitions()
        .await
        .context("Failed to list entity definitions")?;
    info!("fetched {} definitions", definitions.len());
    for raw in &definitions {
        let written = filter_definition(raw).and_then(|d| {
            write_record(&layout.definitions, &d.file_stem(), &d, opts.format)
        });
        match written {
            Ok(path) => {
                debug!("wrote {}", path.display());
                summary.definitions += 1;
            }
            Err(e) => reporter.warn(&format!("skipping definition: {e:#}")),
        }
    }

    let entities = fetch_entities(api, opts)
        .await
        .context("Failed to list entities")?;
    info!("fetched {} entities", entities.len());
    for raw in &entities {
        let written = filter_entity(raw)
            .and_then(|e| write_record(&layout.entities, &e.file_stem(), &e, opts.format));
        match written {
            Ok(path) => {
                debug!("wrote {}", path.display());
                summary.entities += 1;
            }
            Err(e) => reporter.warn(&format!("skipping entity: {e:#}")),
        }
    }

    let relations = fetch_relations(api, reporter).await;
    match write_record(&layout.relations, RELATIONS_FILE_STEM, &relations, opts.format) {
        Ok(path) => {
            debug!("wrote {}", path.display());
            summary.relations = relations.len();
        }
        Err(e) => reporter.warn(&format!("failed to write relations: {e:#}")),
    }

    Ok(summary)
}

async fn fetch_entities<A: EntityApi + ?Sized>(api: &A, opts: &BackupOptions) -> Result<Vec<Value>> {
    let mut items = Vec::new();
    let mut offset = 0u64;
    loop {
        let query = EntityQuery {
            name: opts.name.clone(),
            label_selector: opts.label_selector.clone(),
            field_selector: opts.field_selector.clone(),
            limit: ENTITY_PAGE_SIZE,
            offset,
            include_relations: false,
        };
        let page = api.list_entities(&query).await?;
        let fetched = page.items.len();
        let more = match &page.pagination {
            Some(p) => p.has_more(fetched),
            None => fetched == ENTITY_PAGE_SIZE as usize,
        };
        items.extend(page.items);
        if fetched == 0 || !more {
            return Ok(items);
        }
        offset += fetched as u64;
    }
}

/// A failed relation fetch only costs the relations, the backup goes on.
async fn fetch_relations<A: EntityApi + ?Sized>(
    api: &A,
    reporter: &dyn Reporter,
) -> Vec<RelationRecord> {
    let query = EntityQuery {
        limit: RELATION_QUERY_LIMIT,
        include_relations: true,
        ..Default::default()
    };
    let raw = match api.list_entities(&query).await {
        Ok(page) => page.relations,
        Err(e) => {
            reporter.warn(&format!("failed to fetch relations, none recorded: {e:#}"));
            return Vec::new();
        }
    };
    info!("fetched {} relations", raw.len());

    raw.iter()
        .filter_map(|r| match filter_relation(r) {
            Ok(record) => Some(record),
            Err(e) => {
                reporter.warn(&format!("skipping relation: {e:#}"));
                None
            }
        })
        .collect()
}
