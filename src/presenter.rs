// Read-only views over the curated dataset
use crate::model::CuratedRecord;
use crate::utils::normalize_label;
use std::collections::{BTreeMap, BTreeSet};

/// Which curated column rankings and series are computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AnalysisType {
    #[default]
    Price,
    Volume,
    Variation,
}

impl AnalysisType {
    fn value(self, row: &CuratedRecord) -> Option<f64> {
        match self {
            AnalysisType::Price => Some(row.average_price),
            AnalysisType::Volume => Some(row.total_quantity),
            AnalysisType::Variation => row.price_change_ratio,
        }
    }

    fn label(self) -> &'static str {
        match self {
            AnalysisType::Price => "average price",
            AnalysisType::Volume => "total volume",
            AnalysisType::Variation => "price change",
        }
    }
}

/// Empty selections mean "everything".
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub commodities: Vec<String>,
    pub states: Vec<String>,
    pub years: Option<(i32, i32)>,
}

impl Filter {
    pub fn matches(&self, row: &CuratedRecord) -> bool {
        let commodity_ok = self.commodities.is_empty()
            || self.commodities.iter().any(|c| normalize_label(c) == row.commodity);
        let state_ok = self.states.is_empty()
            || self
                .states
                .iter()
                .any(|s| row.state.as_deref() == Some(normalize_label(s).as_str()));
        let year_ok = self
            .years
            .is_none_or(|(from, to)| row.year >= from && row.year <= to);
        commodity_ok && state_ok && year_ok
    }

    pub fn apply(&self, rows: &[CuratedRecord]) -> Vec<CuratedRecord> {
        rows.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub mean_price: Option<f64>,
    pub commodity_count: usize,
    pub total_volume: f64,
    pub region_count: usize,
}

pub fn summarize(rows: &[CuratedRecord]) -> Summary {
    let mean_price = if rows.is_empty() {
        None
    } else {
        Some(rows.iter().map(|r| r.average_price).sum::<f64>() / rows.len() as f64)
    };
    Summary {
        mean_price,
        commodity_count: rows.iter().map(|r| &r.commodity).collect::<BTreeSet<_>>().len(),
        total_volume: rows.iter().map(|r| r.total_quantity).sum(),
        region_count: rows
            .iter()
            .filter_map(|r| r.state.as_ref())
            .collect::<BTreeSet<_>>()
            .len(),
    }
}

/// Per commodity, chronological (year, month, value) points averaged over states.
pub fn series(rows: &[CuratedRecord], analysis: AnalysisType) -> BTreeMap<String, Vec<(i32, u32, f64)>> {
    let mut buckets: BTreeMap<String, BTreeMap<(i32, u32), Vec<f64>>> = BTreeMap::new();
    for row in rows {
        if let Some(value) = analysis.value(row) {
            buckets
                .entry(row.commodity.clone())
                .or_default()
                .entry((row.year, row.month))
                .or_default()
                .push(value);
        }
    }
    buckets
        .into_iter()
        .map(|(commodity, periods)| {
            let points = periods
                .into_iter()
                .map(|((year, month), values)| (year, month, mean(&values)))
                .collect();
            (commodity, points)
        })
        .collect()
}

/// Min / median / max of the average price per commodity.
pub fn price_distribution(rows: &[CuratedRecord]) -> BTreeMap<String, (f64, f64, f64)> {
    let mut prices: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for row in rows {
        prices.entry(row.commodity.clone()).or_default().push(row.average_price);
    }
    prices
        .into_iter()
        .map(|(commodity, mut values)| {
            values.sort_by(|a, b| a.total_cmp(b));
            let mid = values.len() / 2;
            let median = if values.len() % 2 == 0 {
                (values[mid - 1] + values[mid]) / 2.0
            } else {
                values[mid]
            };
            let min = values[0];
            let max = values[values.len() - 1];
            (commodity, (min, median, max))
        })
        .collect()
}

/// States ranked by the mean of the selected metric, highest first.
pub fn rank_states(rows: &[CuratedRecord], analysis: AnalysisType) -> Vec<(String, f64)> {
    let mut by_state: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for row in rows {
        if let Some(value) = analysis.value(row) {
            let state = row.state.clone().unwrap_or_else(|| "-".to_string());
            by_state.entry(state).or_default().push(value);
        }
    }
    let mut ranking: Vec<(String, f64)> = by_state
        .into_iter()
        .map(|(state, values)| (state, mean(&values)))
        .collect();
    ranking.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranking
}

/// (total volume, average price) pairs.
pub fn scatter(rows: &[CuratedRecord]) -> Vec<(f64, f64)> {
    rows.iter().map(|r| (r.total_quantity, r.average_price)).collect()
}

/// Pearson correlation between volume and price; `None` when undefined.
pub fn volume_price_correlation(rows: &[CuratedRecord]) -> Option<f64> {
    let points = scatter(rows);
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let numerator: f64 = points.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
    let denominator_x: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    let denominator_y: f64 = points.iter().map(|(_, y)| (y - mean_y).powi(2)).sum();
    let denominator = (denominator_x * denominator_y).sqrt();
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Plain-text dashboard for the filtered rows.
pub fn render(rows: &[CuratedRecord], analysis: AnalysisType) -> String {
    let summary = summarize(rows);
    let mut out = String::from("== Summary ==\n");

    match summary.mean_price {
        Some(price) => out.push_str(&format!("Mean price:   R$ {:.2}\n", price)),
        None => out.push_str("Mean price:   -\n"),
    }
    out.push_str(&format!("Commodities:  {}\n", summary.commodity_count));
    out.push_str(&format!("Total volume: {:.0}\n", summary.total_volume));
    out.push_str(&format!("Regions:      {}\n", summary.region_count));

    out.push_str(&format!("\n== {} by commodity ==\n", analysis.label()));
    for (commodity, points) in series(rows, analysis) {
        out.push_str(&format!("{}\n", commodity));
        for (year, month, value) in points {
            out.push_str(&format!("  {}-{:02}  {:>12.4}\n", year, month, value));
        }
    }

    out.push_str("\n== Price distribution ==\n");
    for (commodity, (min, median, max)) in price_distribution(rows) {
        out.push_str(&format!(
            "{:<16} min {:>10.2}  median {:>10.2}  max {:>10.2}\n",
            commodity, min, median, max
        ));
    }

    out.push_str(&format!("\n== {} by state ==\n", analysis.label()));
    for (rank, (state, value)) in rank_states(rows, analysis).iter().enumerate() {
        out.push_str(&format!("{:>3}. {:<4} {:>12.4}\n", rank + 1, state, value));
    }

    if let Some(r) = volume_price_correlation(rows) {
        out.push_str(&format!("\nVolume/price correlation: {:.3}\n", r));
    }

    out
}
