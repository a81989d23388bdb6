// 🔄 Load Pipeline
// associado → agencia → transacoes, one row at a time, flushed in batches

use crate::config::{EtlConfig, RowErrorPolicy};
use crate::db::{Batch, LoadEvent, Loader, SqliteLoader};
use crate::entities::{get_transformer, Entity, EntityTransformer};
use crate::error::{EtlError, Result};
use crate::normalizer::RecordNormalizer;
use crate::parser::{CsvSource, ReadOptions};
use crate::rules::RuleTable;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{error, info, warn};

pub const LOADER_ACTOR: &str = "csv_loader";

// ============================================================================
// REPORTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityReport {
    pub entity: Entity,
    pub loaded: usize,
    pub rejected: usize,
    pub batches: usize,
}

impl EntityReport {
    fn new(entity: Entity) -> Self {
        EntityReport {
            entity,
            loaded: 0,
            rejected: 0,
            batches: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub entities: Vec<EntityReport>,
}

impl LoadReport {
    pub fn get(&self, entity: Entity) -> Option<&EntityReport> {
        self.entities.iter().find(|r| r.entity == entity)
    }

    pub fn total_loaded(&self) -> usize {
        self.entities.iter().map(|r| r.loaded).sum()
    }

    pub fn total_rejected(&self) -> usize {
        self.entities.iter().map(|r| r.rejected).sum()
    }
}

// ============================================================================
// RUN
// ============================================================================

/// Load all three extracts in dependency order.
///
/// The first unrecoverable error ends the run. Batches already committed
/// stay committed.
pub fn run<L: Loader>(config: &EtlConfig, rules: &RuleTable, loader: &mut L) -> Result<LoadReport> {
    config.validate()?;
    check_inputs(config)?;

    let options = ReadOptions::from_config(config);
    let mut report = LoadReport::default();

    for entity in Entity::LOAD_ORDER {
        let path = config.input_path(entity);
        info!(entity = %entity, path = %path.display(), "loading");

        let source = CsvSource::open(path, entity, options)?;
        let encoding = source.encoding_name();
        let entity_report = load_entity(source, entity, config, rules, loader)?;

        let event = LoadEvent::new(
            "entity_loaded",
            entity,
            serde_json::json!({
                "loaded": entity_report.loaded,
                "rejected": entity_report.rejected,
                "batches": entity_report.batches,
                "source": path.display().to_string(),
                "sha256": fingerprint_file(path)?,
                "encoding": encoding,
            }),
            LOADER_ACTOR,
        );
        loader.record_event(&event)?;

        info!(
            entity = %entity,
            loaded = entity_report.loaded,
            rejected = entity_report.rejected,
            "entity complete"
        );
        report.entities.push(entity_report);
    }

    Ok(report)
}

/// Check config and inputs, then open the configured SQLite database and run.
///
/// Nothing is created on disk when the config or an extract is bad.
pub fn import(config: &EtlConfig, rules: &RuleTable) -> Result<LoadReport> {
    config.validate()?;
    check_inputs(config)?;

    let mut loader = SqliteLoader::open(&config.database)?;
    run(config, rules, &mut loader)
}

/// Stream one extract through its transformer into the loader
pub fn load_entity<R: Read, L: Loader>(
    source: CsvSource<R>,
    entity: Entity,
    config: &EtlConfig,
    rules: &RuleTable,
    loader: &mut L,
) -> Result<EntityReport> {
    let transformer = get_transformer(entity);
    let normalizer = RecordNormalizer::new(rules);
    let mut report = EntityReport::new(entity);
    let mut batch = Batch::new(entity);
    let mut batch_lines: Vec<u64> = Vec::with_capacity(config.batch_size);

    let missing: Vec<&str> = transformer
        .required_columns()
        .iter()
        .copied()
        .filter(|column| !source.headers().iter().any(|h| h == column))
        .collect();
    if !missing.is_empty() {
        warn!(entity = %entity, ?missing, "header lacks required columns, affected rows will fail");
    }

    for record in source {
        let outcome = record.and_then(|record| {
            transformer
                .transform(&record, &normalizer)
                .map(|row| (record.line, row))
                .map_err(|e| e.in_row(entity, record.line, transformer.row_key(&record)))
        });

        match outcome {
            Ok((line, row)) => {
                batch.rows.push(row);
                batch_lines.push(line);
            }
            Err(e) => {
                reject_or_abort(e, config.on_row_error)?;
                report.rejected += 1;
                continue;
            }
        }

        if batch.len() >= config.batch_size {
            flush(&mut batch, &mut batch_lines, &*transformer, loader, &mut report)?;
        }
    }

    flush(&mut batch, &mut batch_lines, &*transformer, loader, &mut report)?;
    Ok(report)
}

fn reject_or_abort(err: EtlError, policy: RowErrorPolicy) -> Result<()> {
    if policy == RowErrorPolicy::Skip && err.is_row_recoverable() {
        warn!(kind = err.kind().as_str(), "skipping row: {}", err);
        return Ok(());
    }
    Err(err)
}

fn flush<L: Loader>(
    batch: &mut Batch,
    lines: &mut Vec<u64>,
    transformer: &dyn EntityTransformer,
    loader: &mut L,
    report: &mut EntityReport,
) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }

    match loader.persist(batch) {
        Ok(count) => {
            report.loaded += count;
            report.batches += 1;
            batch.rows.clear();
            lines.clear();
            Ok(())
        }
        Err(e) => {
            let first = lines.first().copied().unwrap_or(0);
            let last = lines.last().copied().unwrap_or(0);
            error!(
                entity = %transformer.entity(),
                first_line = first,
                last_line = last,
                "batch failed: {}",
                e
            );
            if batch.len() == 1 {
                let key = batch.rows[0].key().map(str::to_string);
                return Err(e.in_row(transformer.entity(), first, key));
            }
            Err(e.in_batch(transformer.entity(), first, last))
        }
    }
}

// ============================================================================
// INPUTS
// ============================================================================

/// Fail before loading anything if an extract is missing
pub fn check_inputs(config: &EtlConfig) -> Result<()> {
    for entity in Entity::LOAD_ORDER {
        let path = config.input_path(entity);
        if !path.is_file() {
            return Err(EtlError::Io {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "input file not found"),
            });
        }
    }
    Ok(())
}

/// SHA-256 of a file, hex encoded
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let io_err = |source: io::Error| EtlError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(io_err)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(io_err)?;
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// TESTS
// ============================================================================
