use crate::aggregator::price_change::fill_price_change;
use crate::model::{CuratedRecord, NormalizedRecord};
use std::collections::BTreeMap;

/// Grouping key in output order: commodity, state, then chronological.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PeriodKey {
    pub commodity: String,
    pub state: Option<String>,
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    price_sum: f64,
    quantity_sum: f64,
    count: usize,
}

/// Groups rows by (commodity, state, month, year) and sums prices and quantities.
pub fn group_by_period(records: &[NormalizedRecord]) -> BTreeMap<PeriodKey, (f64, f64)> {
    let mut groups: BTreeMap<PeriodKey, Accumulator> = BTreeMap::new();

    for record in records {
        let key = PeriodKey {
            commodity: record.commodity.clone(),
            state: record.state.clone(),
            year: record.year,
            month: record.month,
        };
        let acc = groups.entry(key).or_default();
        acc.price_sum += record.price;
        acc.quantity_sum += record.quantity;
        acc.count += 1;
    }

    groups
        .into_iter()
        .map(|(key, acc)| (key, (acc.price_sum / acc.count as f64, acc.quantity_sum)))
        .collect()
}

/// Builds the curated dataset: one row per period with mean price, total
/// quantity and the change of the mean against the previous period.
pub fn curate(records: &[NormalizedRecord]) -> Vec<CuratedRecord> {
    let mut curated: Vec<CuratedRecord> = group_by_period(records)
        .into_iter()
        .map(|(key, (average_price, total_quantity))| CuratedRecord {
            commodity: key.commodity,
            state: key.state,
            month: key.month,
            year: key.year,
            average_price,
            total_quantity,
            price_change_ratio: None,
        })
        .collect();

    fill_price_change(&mut curated);
    curated
}
