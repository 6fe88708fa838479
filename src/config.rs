use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::model::PipelineError;

/// Paths and limits handed to a single stage invocation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    /// SQLite database file for the relational sink; `None` skips the sink.
    pub sink_connection: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::new(),
            destination_path: PathBuf::new(),
            sink_connection: None,
            timeout_secs: 15,
        }
    }
}

impl StageConfig {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source.into(),
            destination_path: destination.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub commodity: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyntheticCommodity {
    pub name: String,
    pub price_range: (f64, f64),
    pub quantity_range: (i64, i64),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub days: i64,
    pub anomalies_per_commodity: usize,
    pub seed: Option<u64>,
    pub regions: Vec<String>,
    pub commodities: Vec<SyntheticCommodity>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        let commodity = |name: &str, price: (f64, f64), quantity: (i64, i64)| SyntheticCommodity {
            name: name.to_string(),
            price_range: price,
            quantity_range: quantity,
        };
        Self {
            days: 2 * 365,
            anomalies_per_commodity: 5,
            seed: None,
            regions: vec![
                "Paranaguá/PR".into(),
                "campinas/sp".into(),
                "Santos/SP".into(),
                "ribeirão preto/SP".into(),
                "Cuiabá/mt".into(),
            ],
            commodities: vec![
                commodity("ALGODÃO", (300.0, 400.0), (500, 2000)),
                commodity("ARROZ", (50.0, 80.0), (1000, 5000)),
                commodity("CAFÉ", (2000.0, 3000.0), (100, 1000)),
                commodity("MILHO", (60.0, 90.0), (2000, 10000)),
                commodity("TRIGO", (900.0, 1500.0), (1000, 6000)),
                commodity("SOJA", (120.0, 180.0), (3000, 12000)),
                commodity("CANA-DE-AÇÚCAR", (0.5, 1.2), (10000, 50000)),
                commodity("MILHO SILO", (55.0, 85.0), (1500, 9000)),
                commodity("FEIJÃO", (300.0, 500.0), (200, 1500)),
                commodity("LARANJA", (70.0, 120.0), (800, 5000)),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub collect: StageConfig,
    pub synthesize: StageConfig,
    pub normalize: StageConfig,
    pub aggregate: StageConfig,
    pub sources: Vec<SourceConfig>,
    pub request_delay_ms: u64,
    pub user_agent: String,
    /// Keep commodity ids from the previous dimension artifact and only append new names.
    pub stable_ids: bool,
    pub synthetic: SyntheticConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let cepea = |commodity: &str, url: &str| SourceConfig {
            commodity: commodity.to_string(),
            url: url.to_string(),
        };
        Self {
            collect: StageConfig::new("", "RAW/cepea_dados_1.csv"),
            synthesize: StageConfig::new("RAW/cepea_dados_1.csv", "RAW/cepea_dados_2.csv"),
            normalize: StageConfig::new("RAW/cepea_dados_2.csv", "PROCESSED/cepea_dados_3.csv"),
            aggregate: StageConfig::new("PROCESSED/cepea_dados_3.csv", "CURATED/cepea_dados_4.csv"),
            sources: vec![
                cepea("ALGODÃO", "https://www.cepea.esalq.usp.br/br/indicador/algodao.aspx"),
                cepea("ARROZ", "https://www.cepea.esalq.usp.br/br/indicador/arroz.aspx"),
                cepea("CAFÉ", "https://www.cepea.esalq.usp.br/br/indicador/cafe.aspx"),
                cepea("MILHO", "https://www.cepea.esalq.usp.br/br/indicador/milho.aspx"),
                cepea("TRIGO", "https://www.cepea.esalq.usp.br/br/indicador/trigo.aspx"),
                cepea("SOJA", "https://www.cepea.esalq.usp.br/br/indicador/soja.aspx"),
                cepea("AÇUCAR", "https://www.cepea.org.br/br/indicador/acucar.aspx"),
            ],
            request_delay_ms: 2000,
            user_agent: "Mozilla/5.0".to_string(),
            stable_ids: false,
            synthetic: SyntheticConfig::default(),
        }
    }
}

pub fn load_config(path: &str) -> Result<AppConfig, PipelineError> {
    let content = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    let config: AppConfig = serde_json::from_str(&content)
        .map_err(|e| PipelineError::Config(format!("{}: {}", path, e)))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "normalize": {{ "source_path": "in.csv", "destination_path": "out.csv", "sink_connection": "agro.db" }},
                "stable_ids": true
            }}"#
        )
        .unwrap();

        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.normalize.source_path, PathBuf::from("in.csv"));
        assert_eq!(config.normalize.sink_connection.as_deref(), Some("agro.db"));
        assert_eq!(config.normalize.timeout_secs, 15);
        assert!(config.stable_ids);
        assert_eq!(config.sources.len(), 7);
        assert_eq!(config.synthetic.commodities.len(), 10);
    }

    #[test]
    fn malformed_config_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = load_config(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn missing_config_is_an_io_error() {
        let err = load_config("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}
