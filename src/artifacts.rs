// CSV artifacts exchanged between stages
use crate::model::{
    Commodity, CommodityDimension, CuratedRecord, NormalizedRecord, PipelineError, RawPriceRecord,
    CURATED_HEADER, DIMENSION_HEADER, NORMALIZED_HEADER, RAW_HEADER,
};
use csv::{ReaderBuilder, WriterBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Reads every row of a CSV artifact into memory.
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PipelineError> {
    let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path.display().to_string(), e))?;
    // collector files are written as utf-8-sig
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Writes a full-replace artifact. The header is always written, so an empty
/// result still produces a readable file.
pub fn write_rows<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<(), PipelineError> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|e| PipelineError::io(path.display().to_string(), e))?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .flush()
        .map_err(|e| PipelineError::io(path.display().to_string(), e))?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent.display().to_string(), e))?;
        }
    }
    Ok(())
}

pub fn read_raw(path: &Path) -> Result<Vec<RawPriceRecord>, PipelineError> {
    read_rows(path)
}

pub fn write_raw(path: &Path, rows: &[RawPriceRecord]) -> Result<(), PipelineError> {
    write_rows(path, &RAW_HEADER, rows)
}

pub fn read_normalized(path: &Path) -> Result<Vec<NormalizedRecord>, PipelineError> {
    read_rows(path)
}

pub fn write_normalized(path: &Path, rows: &[NormalizedRecord]) -> Result<(), PipelineError> {
    write_rows(path, &NORMALIZED_HEADER, rows)
}

pub fn read_curated(path: &Path) -> Result<Vec<CuratedRecord>, PipelineError> {
    read_rows(path)
}

pub fn write_curated(path: &Path, rows: &[CuratedRecord]) -> Result<(), PipelineError> {
    write_rows(path, &CURATED_HEADER, rows)
}

/// The dimension table lives next to the normalized rows: `<stem>_commodities.csv`.
pub fn dimension_path(normalized: &Path) -> PathBuf {
    let stem = normalized
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "normalized".to_string());
    normalized.with_file_name(format!("{}_commodities.csv", stem))
}

pub fn read_dimension(path: &Path) -> Result<CommodityDimension, PipelineError> {
    let entries: Vec<Commodity> = read_rows(path)?;
    Ok(CommodityDimension::from_entries(entries))
}

pub fn write_dimension(path: &Path, dimension: &CommodityDimension) -> Result<(), PipelineError> {
    write_rows(path, &DIMENSION_HEADER, dimension.entries())
}
