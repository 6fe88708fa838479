// Synthetic price series used to pad thin scraped data
use crate::config::{SyntheticCommodity, SyntheticConfig};
use crate::model::{PipelineError, RawPriceRecord};
use crate::parser::cepea_parser::SOURCE_NAME;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::seq::IndexedRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};

const SYNTHETIC_TABLE: &str = "imagenet-indicador1";

/// Generates one row per day per commodity over `days` days ending at `end`.
pub fn generate<R: Rng>(
    config: &SyntheticConfig,
    end: NaiveDate,
    collected_at: NaiveDateTime,
    rng: &mut R,
) -> Result<Vec<RawPriceRecord>, PipelineError> {
    if config.days < 0 {
        return Err(PipelineError::Config("synthetic.days must be >= 0".into()));
    }
    if config.regions.is_empty() {
        return Err(PipelineError::Config("synthetic.regions is empty".into()));
    }
    let noise = Normal::new(0.0, 0.01)
        .map_err(|e| PipelineError::Config(format!("noise distribution: {}", e)))?;

    let start = end - Duration::days(config.days);
    let dates: Vec<NaiveDate> = (0..=config.days).map(|i| start + Duration::days(i)).collect();
    let collected_at = collected_at.format("%Y-%m-%d %H:%M:%S").to_string();

    let mut records = Vec::with_capacity(dates.len() * config.commodities.len());
    for commodity in &config.commodities {
        validate_ranges(commodity)?;

        let (price_min, price_max) = commodity.price_range;
        let (qty_min, qty_max) = commodity.quantity_range;

        let mut price = rng.random_range(price_min..=price_max);
        let first = records.len();
        for date in &dates {
            price *= 1.0 + noise.sample(rng);
            let region = config.regions.choose(rng).cloned().unwrap_or_default();
            records.push(RawPriceRecord {
                commodity: commodity.name.clone(),
                date: date.format("%Y-%m-%d").to_string(),
                price: round2(price).to_string(),
                region,
                quantity: rng.random_range(qty_min..=qty_max).to_string(),
                source: SOURCE_NAME.to_string(),
                collected_at: collected_at.clone(),
                table_id: SYNTHETIC_TABLE.to_string(),
            });
        }

        let generated = records.len() - first;
        if generated == 0 {
            continue;
        }
        for _ in 0..config.anomalies_per_commodity {
            let idx = first + rng.random_range(0..generated);
            let (price, quantity) = anomaly(commodity, rng);
            records[idx].price = price.to_string();
            records[idx].quantity = quantity.to_string();
        }
    }

    Ok(records)
}

fn validate_ranges(commodity: &SyntheticCommodity) -> Result<(), PipelineError> {
    let (price_min, price_max) = commodity.price_range;
    let (qty_min, qty_max) = commodity.quantity_range;
    if !(price_min.is_finite() && price_max.is_finite() && price_min <= price_max && price_max > 0.0) {
        return Err(PipelineError::Config(format!(
            "invalid price range for {}",
            commodity.name
        )));
    }
    if qty_min > qty_max {
        return Err(PipelineError::Config(format!(
            "invalid quantity range for {}",
            commodity.name
        )));
    }
    Ok(())
}

/// Either a negative reading or a 3-5x spike above the configured maximum.
fn anomaly<R: Rng>(commodity: &SyntheticCommodity, rng: &mut R) -> (f64, i64) {
    let (_, price_max) = commodity.price_range;
    let (_, qty_max) = commodity.quantity_range;

    let price = if rng.random_bool(0.5) {
        round2(rng.random_range(-100.0..=-1.0))
    } else {
        round2(rng.random_range(price_max * 3.0..=price_max * 5.0))
    };
    let quantity = if rng.random_bool(0.5) {
        rng.random_range(-1000..=-1)
    } else {
        let (low, high) = (qty_max.saturating_mul(3), qty_max.saturating_mul(5));
        rng.random_range(low.min(high)..=low.max(high))
    };
    (price, quantity)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize_all;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_config() -> SyntheticConfig {
        SyntheticConfig {
            days: 9,
            anomalies_per_commodity: 2,
            seed: Some(7),
            commodities: vec![
                SyntheticCommodity {
                    name: "SOJA".into(),
                    price_range: (120.0, 180.0),
                    quantity_range: (3000, 12000),
                },
                SyntheticCommodity {
                    name: "ARROZ".into(),
                    price_range: (50.0, 80.0),
                    quantity_range: (1000, 5000),
                },
            ],
            ..SyntheticConfig::default()
        }
    }

    fn run(seed: u64) -> Vec<RawPriceRecord> {
        let end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let at = end.and_hms_opt(12, 0, 0).unwrap();
        generate(&small_config(), end, at, &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn one_row_per_day_per_commodity() {
        let rows = run(1);
        assert_eq!(rows.len(), 20);
        assert_eq!(rows[0].date, "2024-06-21");
        assert_eq!(rows[9].date, "2024-06-30");
        assert!(rows[..10].iter().all(|r| r.commodity == "SOJA"));
        assert!(rows[10..].iter().all(|r| r.commodity == "ARROZ"));
    }

    #[test]
    fn same_seed_same_series() {
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn every_synthetic_row_survives_normalization() {
        let rows = run(3);
        let config = small_config();
        let out = normalize_all(&rows);
        assert_eq!(out.dropped.invalid_date + out.dropped.invalid_price + out.dropped.invalid_quantity, 0);
        for row in &out.records {
            assert!(row.state.is_some());
            assert!(config.regions.iter().any(|r| r.to_uppercase() == row.region));
        }
    }

    #[test]
    fn anomalies_stay_inside_their_commodity() {
        let rows = run(5);
        let arroz_outliers = rows[10..]
            .iter()
            .filter(|r| {
                let price: f64 = r.price.parse().unwrap();
                price < 0.0 || price > 80.0 * 2.0
            })
            .count();
        assert!(arroz_outliers >= 1);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let mut config = small_config();
        config.commodities[0].price_range = (10.0, 1.0);
        let end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let at = end.and_hms_opt(0, 0, 0).unwrap();
        let err = generate(&config, end, at, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn non_positive_price_ceiling_is_rejected() {
        let mut config = small_config();
        config.commodities[1].price_range = (-5.0, 0.0);
        let end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let at = end.and_hms_opt(0, 0, 0).unwrap();
        for seed in 0..8 {
            let err = generate(&config, end, at, &mut StdRng::seed_from_u64(seed)).unwrap_err();
            assert!(matches!(err, PipelineError::Config(_)));
        }
    }
}
