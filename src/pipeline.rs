// Stage entry points. Each one reads its whole input, transforms it and
// writes its whole output before returning.
use crate::aggregator::curate;
use crate::artifacts;
use crate::config::{AppConfig, SourceConfig, StageConfig};
use crate::model::{DropReport, PipelineError, RawPriceRecord, ScrapeRequest};
use crate::normalizer::{normalize_all, normalize_with_dimension, Normalized};
use crate::parser::{CepeaParser, Parser};
use crate::presenter::{self, AnalysisType, Filter};
use crate::scraper::{Scraper, ScraperImpl};
use crate::storage::{SinkSummary, SqliteStorage};
use crate::synthetic;
use chrono::Local;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Fetches and parses every source in order. A failing source is logged and
/// contributes nothing; the remaining sources are still collected.
pub async fn collect_all(
    scraper: &dyn Scraper,
    parser: &impl Parser,
    sources: &[SourceConfig],
    delay: Duration,
) -> Vec<RawPriceRecord> {
    let mut records = Vec::new();

    for (i, source) in sources.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            sleep(delay).await;
        }
        info!("Collecting {}", source.commodity);
        let request = ScrapeRequest {
            commodity: source.commodity.clone(),
            url: source.url.clone(),
        };

        let html = match scraper.fetch(&request).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Failed to fetch {} ({}): {}", source.commodity, source.url, e);
                continue;
            }
        };

        match parser.parse(&html, &request) {
            Ok(rows) => {
                info!("{}: {} rows collected", source.commodity, rows.len());
                records.extend(rows);
            }
            Err(e) => warn!("Failed to parse {}: {}", source.commodity, e),
        }
    }

    records
}

pub async fn run_collect(config: &AppConfig, stage: &StageConfig) -> Result<usize, PipelineError> {
    let scraper = ScraperImpl::new(&config.user_agent, Duration::from_secs(stage.timeout_secs))?;
    let parser = CepeaParser::new();
    let records = collect_all(
        &scraper,
        &parser,
        &config.sources,
        Duration::from_millis(config.request_delay_ms),
    )
    .await;

    if records.is_empty() {
        warn!("No data collected; {} left untouched", stage.destination_path.display());
        return Ok(0);
    }

    artifacts::write_raw(&stage.destination_path, &records)?;
    info!(
        "Wrote {} raw rows to {}",
        records.len(),
        stage.destination_path.display()
    );
    Ok(records.len())
}

/// Appends synthetic rows to the raw rows found at `source_path` (if any).
pub fn run_synthesize(config: &AppConfig, stage: &StageConfig) -> Result<usize, PipelineError> {
    let mut records = if stage.source_path.as_os_str().is_empty() {
        Vec::new()
    } else {
        artifacts::read_raw(&stage.source_path)?
    };
    let existing = records.len();

    let now = Local::now().naive_local();
    let mut rng = match config.synthetic.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    records.extend(synthetic::generate(&config.synthetic, now.date(), now, &mut rng)?);

    artifacts::write_raw(&stage.destination_path, &records)?;
    info!(
        "Wrote {} raw rows ({} existing, {} synthetic) to {}",
        records.len(),
        existing,
        records.len() - existing,
        stage.destination_path.display()
    );
    Ok(records.len())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeSummary {
    pub read: usize,
    pub written: usize,
    pub commodities: usize,
    pub dropped: DropReport,
    pub sink: Option<SinkSummary>,
}

/// Normalizes the raw rows at `source_path`.
///
/// With a sink configured, ids continue the sink's commodity table so facts
/// already stored keep their ids. Otherwise `stable_ids` continues the
/// previous dimension file, and without it ids restart in first-seen order.
pub fn run_normalize(stage: &StageConfig, stable_ids: bool) -> Result<NormalizeSummary, PipelineError> {
    let raw = artifacts::read_raw(&stage.source_path)?;
    let dimension_path = artifacts::dimension_path(&stage.destination_path);
    let mut sink = stage
        .sink_connection
        .as_deref()
        .map(SqliteStorage::new)
        .transpose()?;

    let known = match &sink {
        Some(storage) => Some(storage.load_dimension()?),
        None if stable_ids && dimension_path.exists() => {
            Some(artifacts::read_dimension(&dimension_path)?)
        }
        None => None,
    };

    let Normalized {
        records,
        commodities,
        dropped,
    } = match known {
        Some(dimension) => {
            if !dimension.is_empty() {
                info!("Extending {} known commodities", dimension.len());
            }
            normalize_with_dimension(&raw, dimension)
        }
        None => normalize_all(&raw),
    };

    if dropped.total() > 0 {
        warn!(
            "Dropped {} rows: {} bad date, {} bad price, {} bad quantity, {} duplicates",
            dropped.total(),
            dropped.invalid_date,
            dropped.invalid_price,
            dropped.invalid_quantity,
            dropped.duplicates
        );
    }

    artifacts::write_normalized(&stage.destination_path, &records)?;
    artifacts::write_dimension(&dimension_path, &commodities)?;
    info!(
        "Wrote {} normalized rows to {} and {} commodities to {}",
        records.len(),
        stage.destination_path.display(),
        commodities.len(),
        dimension_path.display()
    );

    let sink = match sink.as_mut() {
        Some(storage) => {
            let summary = storage.write_normalized(&commodities, &records)?;
            info!(
                "Sink {}: {} facts inserted, {} already present, {} total",
                stage.sink_connection.as_deref().unwrap_or_default(),
                summary.inserted,
                summary.skipped,
                storage.count_records()?
            );
            Some(summary)
        }
        None => None,
    };

    Ok(NormalizeSummary {
        read: raw.len(),
        written: records.len(),
        commodities: commodities.len(),
        dropped,
        sink,
    })
}

pub fn run_aggregate(stage: &StageConfig) -> Result<usize, PipelineError> {
    let records = artifacts::read_normalized(&stage.source_path)?;
    let curated = curate(&records);
    artifacts::write_curated(&stage.destination_path, &curated)?;
    info!(
        "Aggregated {} normalized rows into {} curated rows at {}",
        records.len(),
        curated.len(),
        stage.destination_path.display()
    );
    Ok(curated.len())
}

/// Renders the filtered curated dataset and optionally exports the filtered rows.
pub fn run_report(
    source: &Path,
    filter: &Filter,
    analysis: AnalysisType,
    export: Option<&Path>,
) -> Result<String, PipelineError> {
    let rows = artifacts::read_curated(source)?;
    let filtered = filter.apply(&rows);
    info!("Report over {} of {} curated rows", filtered.len(), rows.len());

    if let Some(path) = export {
        artifacts::write_curated(path, &filtered)?;
        info!("Exported filtered view to {}", path.display());
    }

    Ok(presenter::render(&filtered, analysis))
}
