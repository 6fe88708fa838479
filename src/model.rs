// Core structs: raw/normalized/curated records, commodity dimension, stage errors
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One scraped observation, kept as text exactly as it came out of the collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPriceRecord {
    #[serde(default)]
    pub commodity: String,
    #[serde(rename = "data", alias = "date", default)]
    pub date: String,
    #[serde(rename = "preco", alias = "price", default)]
    pub price: String,
    #[serde(rename = "regiao", alias = "region", default)]
    pub region: String,
    #[serde(rename = "quantidade", alias = "quantity", default)]
    pub quantity: String,
    #[serde(rename = "fonte", alias = "source", default)]
    pub source: String,
    #[serde(rename = "data_coleta", alias = "collected_at", default)]
    pub collected_at: String,
    #[serde(rename = "tabela", alias = "table_id", default)]
    pub table_id: String,
}

pub const RAW_HEADER: [&str; 8] = [
    "commodity",
    "data",
    "preco",
    "regiao",
    "quantidade",
    "fonte",
    "data_coleta",
    "tabela",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub commodity_id: u32,
    pub commodity: String,
    #[serde(rename = "data")]
    pub date: NaiveDate,
    #[serde(rename = "preco")]
    pub price: f64,
    #[serde(rename = "regiao")]
    pub region: String,
    #[serde(rename = "quantidade")]
    pub quantity: f64,
    #[serde(rename = "cidade")]
    pub city: String,
    #[serde(rename = "estado")]
    pub state: Option<String>,
    #[serde(rename = "dia")]
    pub day: u32,
    #[serde(rename = "mes")]
    pub month: u32,
    #[serde(rename = "ano")]
    pub year: i32,
}

pub const NORMALIZED_HEADER: [&str; 11] = [
    "commodity_id",
    "commodity",
    "data",
    "preco",
    "regiao",
    "quantidade",
    "cidade",
    "estado",
    "dia",
    "mes",
    "ano",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commodity {
    pub id: u32,
    #[serde(rename = "nome")]
    pub name: String,
}

pub const DIMENSION_HEADER: [&str; 2] = ["id", "nome"];

/// Commodity name -> surrogate id, in assignment order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommodityDimension {
    entries: Vec<Commodity>,
}

impl CommodityDimension {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the dimension from a previously persisted mapping.
    /// Entries with a repeated id or name are ignored after the first one.
    pub fn from_entries(entries: Vec<Commodity>) -> Self {
        let mut dimension = Self::new();
        for entry in entries {
            let taken = dimension
                .entries
                .iter()
                .any(|c| c.id == entry.id || c.name == entry.name);
            if !taken {
                dimension.entries.push(entry);
            }
        }
        dimension
    }

    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.entries.iter().find(|c| c.name == name).map(|c| c.id)
    }

    /// Returns the id for `name`, assigning the next free one if unseen.
    pub fn assign(&mut self, name: &str) -> u32 {
        if let Some(id) = self.id_of(name) {
            return id;
        }
        let id = self.entries.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        self.entries.push(Commodity {
            id,
            name: name.to_string(),
        });
        id
    }

    pub fn entries(&self) -> &[Commodity] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One (commodity, state, month, year) summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedRecord {
    pub commodity: String,
    #[serde(rename = "estado")]
    pub state: Option<String>,
    #[serde(rename = "mes")]
    pub month: u32,
    #[serde(rename = "ano")]
    pub year: i32,
    #[serde(rename = "preco_medio")]
    pub average_price: f64,
    #[serde(rename = "quantidade_total")]
    pub total_quantity: f64,
    #[serde(rename = "variacao_preco")]
    pub price_change_ratio: Option<f64>,
}

pub const CURATED_HEADER: [&str; 7] = [
    "commodity",
    "estado",
    "mes",
    "ano",
    "preco_medio",
    "quantidade_total",
    "variacao_preco",
];

/// How many raw rows each normalization rule threw away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropReport {
    pub invalid_date: usize,
    pub invalid_price: usize,
    pub invalid_quantity: usize,
    pub duplicates: usize,
}

impl DropReport {
    pub fn total(&self) -> usize {
        self.invalid_date + self.invalid_price + self.invalid_quantity + self.duplicates
    }
}

/// One indicator page to scrape.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub commodity: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("unexpected status {0}")]
    InvalidResponse(u16),
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("HTML parse error: {0}")]
    HtmlParseError(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Scraper(#[from] ScraperError),
    #[error(transparent)]
    Parser(#[from] ParserError),
}

impl PipelineError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_starts_at_one_and_reuses_ids() {
        let mut dim = CommodityDimension::new();
        assert_eq!(dim.assign("SOJA"), 1);
        assert_eq!(dim.assign("MILHO"), 2);
        assert_eq!(dim.assign("SOJA"), 1);
        assert_eq!(dim.len(), 2);
    }

    #[test]
    fn seeded_dimension_extends_after_max_id() {
        let mut dim = CommodityDimension::from_entries(vec![
            Commodity { id: 1, name: "SOJA".into() },
            Commodity { id: 4, name: "CAFÉ".into() },
            Commodity { id: 9, name: "SOJA".into() },
        ]);
        assert_eq!(dim.len(), 2);
        assert_eq!(dim.assign("CAFÉ"), 4);
        assert_eq!(dim.assign("TRIGO"), 5);
    }

    #[test]
    fn drop_report_total_sums_every_rule() {
        let report = DropReport {
            invalid_date: 1,
            invalid_price: 2,
            invalid_quantity: 3,
            duplicates: 4,
        };
        assert_eq!(report.total(), 10);
    }
}
