//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::Config;
use crate::scan::MergeScanner;
use crate::store::MemoryStore;
use crate::token::{decode_optional, decode_token, encode_token};
use meridian_core::{
    BulkPage, BulkRequest, Direction, FanOutFilter, MeridianError, RankingEngine, Ranked,
    SourceDescriptor, SourceSeries, Triples,
};
use std::path::Path;
use std::sync::Arc;

/// Maximum size of a series input file (100 MB).
const MAX_INPUT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Upper bound on pages fetched by `scan --all`.
const MAX_SCAN_ROUNDS: usize = 10_000;

// =============================================================================
// SCAN COMMAND
// =============================================================================

/// Arguments of `scan` after defaults are applied.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub entities: Vec<String>,
    pub budget: usize,
    pub token: Option<String>,
    pub all: bool,
}

/// Read one page (or every page with `--all`) from a store fixture.
pub async fn cmd_scan(
    config: &Config,
    store_path: &Path,
    json_mode: bool,
    options: ScanOptions,
) -> Result<(), MeridianError> {
    let engine = config.engine();
    let mut store = MemoryStore::load(store_path)?;
    store.sort_partitions(&engine);
    let scanner = MergeScanner::new(Arc::new(store), engine.clone(), &config.scan);

    let mut pagination = decode_optional(options.token.as_deref())?;
    for round in 0..MAX_SCAN_ROUNDS {
        let request = BulkRequest::new(options.entities.iter().cloned())
            .with_page_budget(options.budget)
            .with_pagination(pagination.take());
        let page = scanner.scan(&request).await?;
        let token = page.pagination.as_ref().map(encode_token).transpose()?;
        print_page(&engine, &page, token.as_deref(), round, json_mode);

        let failed = page.entities.iter().any(|p| p.outcome.is_err());
        if !options.all || failed || !page.has_more() {
            if failed && options.all {
                tracing::warn!("Stopping after page {}: an entity failed", round + 1);
            }
            return Ok(());
        }
        pagination = page.pagination;
    }
    Err(MeridianError::Internal(format!(
        "scan did not finish within {} pages",
        MAX_SCAN_ROUNDS
    )))
}

fn series_json(engine: &RankingEngine, series: &SourceSeries) -> serde_json::Value {
    serde_json::json!({
        "score": engine.score(series.descriptor()),
        "series": series,
    })
}

fn print_page(
    engine: &RankingEngine,
    page: &BulkPage<SourceSeries>,
    token: Option<&str>,
    round: usize,
    json_mode: bool,
) {
    if json_mode {
        let entities: Vec<serde_json::Value> = page
            .entities
            .iter()
            .map(|p| match &p.outcome {
                Ok(items) => serde_json::json!({
                    "entity": p.entity,
                    "items": items.iter().map(|s| series_json(engine, s)).collect::<Vec<_>>(),
                }),
                Err(e) => serde_json::json!({
                    "entity": p.entity,
                    "error": { "code": e.code(), "message": e.to_string() },
                }),
            })
            .collect();
        let output = serde_json::json!({
            "page": round + 1,
            "entities": entities,
            "next_token": token,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return;
    }

    println!("Page {}", round + 1);
    println!("======");
    for entity_page in &page.entities {
        match &entity_page.outcome {
            Ok(items) => {
                println!("{}: {} items", entity_page.entity, items.len());
                for series in items {
                    println!("  {}", describe(engine, series));
                }
            }
            Err(e) => println!("{}: FAILED [{}] {}", entity_page.entity, e.code(), e),
        }
    }
    println!();
    match token {
        Some(t) => println!("Next token: {}", t),
        None => println!("No more pages"),
    }
}

fn describe(engine: &RankingEngine, series: &SourceSeries) -> String {
    let d = &series.descriptor;
    format!(
        "[{:>5}] {} / {} / {} ({} obs, latest {})",
        engine.score(d),
        d.import_name,
        or_dash(&d.measurement_method),
        or_dash(&d.observation_period),
        series.len(),
        series.latest_date().unwrap_or("-")
    )
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

// =============================================================================
// RANK COMMAND
// =============================================================================

/// Sort a JSON array of series and print the order.
pub fn cmd_rank(
    config: &Config,
    input: &Path,
    json_mode: bool,
    cohort: bool,
) -> Result<(), MeridianError> {
    let mut series: Vec<SourceSeries> = read_json_file(input)?;
    let engine = config.engine();
    if cohort {
        engine.sort_cohort(&mut series);
    } else {
        engine.sort_series(&mut series);
    }

    if json_mode {
        let output: Vec<serde_json::Value> =
            series.iter().map(|s| series_json(&engine, s)).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!(
        "Ranked {} series ({} order)",
        series.len(),
        if cohort { "cohort" } else { "series" }
    );
    for (position, s) in series.iter().enumerate() {
        println!("{:>4}. {}", position + 1, describe(&engine, s));
    }
    Ok(())
}

// =============================================================================
// SCORE COMMAND
// =============================================================================

/// Resolve and print one score.
pub fn cmd_score(
    config: &Config,
    json_mode: bool,
    import: &str,
    method: &str,
    period: &str,
) -> Result<(), MeridianError> {
    let descriptor = SourceDescriptor::new(import, method, period);
    let score = config.engine().score(&descriptor);

    if json_mode {
        let output = serde_json::json!({ "descriptor": descriptor, "score": score });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
    } else {
        println!("{} / {} / {} -> {}", import, or_dash(method), or_dash(period), score);
    }
    Ok(())
}

// =============================================================================
// TRIPLES COMMAND
// =============================================================================

/// Print an entity's relations after fan-out capping.
pub fn cmd_triples(
    config: &Config,
    store_path: &Path,
    json_mode: bool,
    entity: &str,
    limit: Option<usize>,
) -> Result<(), MeridianError> {
    let store = MemoryStore::load(store_path)?;
    let mut triples = store.triples(entity)?;
    let filter = limit.map(FanOutFilter::new).unwrap_or_else(|| config.filter());
    filter.apply(entity, &mut triples);

    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&triples).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Relations of {} (limit {})", entity, filter.limit());
    print_direction(&triples, Direction::Out, "->");
    print_direction(&triples, Direction::In, "<-");
    if !triples.triples.is_empty() {
        println!("Flat triples: {}", triples.triples.len());
        for t in &triples.triples {
            let object = if t.object_id.is_empty() {
                &t.object_value
            } else {
                &t.object_id
            };
            println!("  {} {} {}", t.subject_id, t.predicate, object);
        }
    }
    Ok(())
}

fn print_direction(triples: &Triples, direction: Direction, arrow: &str) {
    for (predicate, collection) in triples.nodes(direction) {
        println!("{} {} ({})", arrow, predicate, collection.entities.len());
        for e in &collection.entities {
            let label = if e.dcid.is_empty() { &e.value } else { &e.dcid };
            println!("    {} [{}]", label, e.types.join(", "));
        }
    }
}

// =============================================================================
// TOKEN COMMAND
// =============================================================================

/// Decode and print a pagination token.
pub fn cmd_token(json_mode: bool, token: &str) -> Result<(), MeridianError> {
    let info = decode_token(token)?;

    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&info).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Pagination token: {} entities", info.cursor_groups.len());
    for group in &info.cursor_groups {
        if group.is_pending() {
            println!("  {}: partitions not listed yet", group.key);
            continue;
        }
        println!("  {}:", group.key);
        for c in &group.cursors {
            if c.is_terminal() {
                println!("    partition {}: done", c.partition);
            } else {
                println!("    partition {}: page {}, item {}", c.partition, c.page, c.item);
            }
        }
    }
    Ok(())
}

// =============================================================================
// HELPERS
// =============================================================================

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, MeridianError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        MeridianError::IoError(format!("Cannot read '{}': {}", path.display(), e))
    })?;
    if metadata.len() > MAX_INPUT_FILE_SIZE {
        return Err(MeridianError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_INPUT_FILE_SIZE
        )));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| MeridianError::IoError(format!("Cannot read '{}': {}", path.display(), e)))?;
    serde_json::from_str(&text)
        .map_err(|e| MeridianError::SerializationError(format!("Invalid JSON in '{}': {}", path.display(), e)))
}
