pub mod backup;
pub mod layout;
pub mod normalize;
pub mod pool;
pub mod report;
pub mod restore;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use entigraph_shared::{
    record::{DefinitionRecord, EntityRecord},
    reference,
};

use crate::config::Config;
use crate::server::{ApiClient, EntityApi, EntityQuery, FetchResponse};
use crate::tui::{self, OutputFormat};
use backup::BackupOptions;
use report::{ConsoleReporter, Reporter};
use restore::{RestoreOptions, load_backup, report_dry_run};

pub async fn backup_command(opts: BackupOptions) -> Result<()> {
    let api = ApiClient::from_config().await?;
    let reporter = ConsoleReporter::default();
    let summary = backup::backup(&api, &reporter, &opts).await?;
    info!("backup written to {}", opts.output_dir.display());
    reporter.success(&summary.to_string());
    Ok(())
}

pub async fn restore_command(input_dir: PathBuf, dry_run: bool, workers: Option<usize>) -> Result<()> {
    let reporter: Arc<dyn Reporter> = Arc::new(ConsoleReporter::default());

    // a dry run never needs credentials
    if dry_run {
        let set = load_backup(&input_dir, reporter.as_ref())?;
        report_dry_run(&set, reporter.as_ref());
        return Ok(());
    }

    let config = Config::load()?;
    let opts = RestoreOptions {
        input_dir,
        dry_run,
        workers: workers.unwrap_or(config.default_workers),
    };
    let api: Arc<dyn EntityApi> = Arc::new(ApiClient::from_config().await?);
    restore::restore(api, reporter, &opts).await?;
    Ok(())
}

fn normalize_all<T>(raw: &[serde_json::Value], what: &str, f: fn(&serde_json::Value) -> Result<T>) -> Vec<T> {
    raw.iter()
        .filter_map(|v| match f(v) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("skipping {what}: {e:#}");
                None
            }
        })
        .collect()
}

pub async fn list(query: EntityQuery, output: OutputFormat) -> Result<()> {
    let api = ApiClient::from_config().await?;
    let page = api
        .list_entities(&query)
        .await
        .context("Failed to list entities")?;
    let entities: Vec<EntityRecord> = normalize_all(&page.items, "entity", normalize::filter_entity);

    if let Some(rendered) = tui::render(&entities, output)? {
        println!("{rendered}");
        return Ok(());
    }
    tui::entities::print_entities_table(&entities);
    if let Some(p) = page.pagination.filter(|p| p.has_more(page.items.len())) {
        println!(
            "  showing {}-{} of {}, use --offset for more",
            p.offset + 1,
            p.offset + page.items.len() as u64,
            p.count
        );
    }
    Ok(())
}

pub async fn get(id: &str, output: OutputFormat) -> Result<()> {
    let id = reference::parse(id)?;
    let api = ApiClient::from_config().await?;
    let raw = match api.get_entity(&id).await? {
        FetchResponse::Found(raw) => raw,
        FetchResponse::NotFound(problem) => anyhow::bail!("entity {id} not found: {problem}"),
    };
    let entity = normalize::filter_entity(&raw)?;

    match tui::render(&entity, output)? {
        Some(rendered) => println!("{rendered}"),
        None => tui::entities::print_entity_detail(&entity),
    }
    Ok(())
}

pub async fn list_definitions(output: OutputFormat) -> Result<()> {
    let api = ApiClient::from_config().await?;
    let raw = api
        .list_definitions()
        .await
        .context("Failed to list entity definitions")?;
    let definitions: Vec<DefinitionRecord> =
        normalize_all(&raw, "definition", normalize::filter_definition);

    match tui::render(&definitions, output)? {
        Some(rendered) => println!("{rendered}"),
        None => tui::entities::print_definitions_table(&definitions),
    }
    Ok(())
}
