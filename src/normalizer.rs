use crate::model::{CommodityDimension, DropReport, NormalizedRecord, RawPriceRecord};
use crate::utils::{normalize_label, parse_date, parse_decimal};
use chrono::Datelike;
use std::collections::HashSet;
use tracing::debug;

/// Result of a normalization run.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub records: Vec<NormalizedRecord>,
    pub commodities: CommodityDimension,
    pub dropped: DropReport,
}

/// Normalizes raw rows, assigning ids in first-seen order starting at 1.
pub fn normalize_all(raw: &[RawPriceRecord]) -> Normalized {
    normalize_with_dimension(raw, CommodityDimension::new())
}

/// Same as [`normalize_all`] but keeps the ids already present in `dimension`;
/// names it has not seen are appended after its highest id.
pub fn normalize_with_dimension(raw: &[RawPriceRecord], dimension: CommodityDimension) -> Normalized {
    let mut dropped = DropReport::default();
    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(raw.len());

    for row in raw {
        let Some(record) = normalize_record(row, &mut dropped) else {
            continue;
        };
        if seen.insert(RowKey::of(&record)) {
            records.push(record);
        } else {
            dropped.duplicates += 1;
        }
    }

    let mut commodities = dimension;
    for record in records.iter_mut() {
        record.commodity_id = commodities.assign(&record.commodity);
    }

    debug!(
        kept = records.len(),
        dropped = dropped.total(),
        "normalization finished"
    );

    Normalized {
        records,
        commodities,
        dropped,
    }
}

/// Cleans one raw row. `commodity_id` is left at 0 until the dimension is built.
fn normalize_record(raw: &RawPriceRecord, dropped: &mut DropReport) -> Option<NormalizedRecord> {
    let Some(date) = parse_date(&raw.date) else {
        dropped.invalid_date += 1;
        return None;
    };
    let Some(price) = parse_decimal(&raw.price) else {
        dropped.invalid_price += 1;
        return None;
    };
    let Some(quantity) = parse_decimal(&raw.quantity) else {
        dropped.invalid_quantity += 1;
        return None;
    };

    let region = normalize_label(&raw.region);
    let (city, state) = split_region(&region);

    Some(NormalizedRecord {
        commodity_id: 0,
        commodity: normalize_label(&raw.commodity),
        date,
        price,
        region,
        quantity,
        city,
        state,
        day: date.day(),
        month: date.month(),
        year: date.year(),
    })
}

/// Splits `"<city>/<state>"` on the first `/`. No separator means no state.
pub fn split_region(region: &str) -> (String, Option<String>) {
    match region.split_once('/') {
        Some((city, state)) => (normalize_label(city), Some(normalize_label(state))),
        None => (normalize_label(region), None),
    }
}

/// Equality key over every retained field.
#[derive(PartialEq, Eq, Hash)]
struct RowKey {
    commodity: String,
    date: chrono::NaiveDate,
    price: u64,
    region: String,
    quantity: u64,
}

impl RowKey {
    // city, state, day, month and year are functions of region and date.
    fn of(record: &NormalizedRecord) -> Self {
        Self {
            commodity: record.commodity.clone(),
            date: record.date,
            price: float_bits(record.price),
            region: record.region.clone(),
            quantity: float_bits(record.quantity),
        }
    }
}

fn float_bits(value: f64) -> u64 {
    // -0.0 and 0.0 compare equal
    if value == 0.0 { 0.0f64.to_bits() } else { value.to_bits() }
}
