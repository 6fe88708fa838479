use crate::model::CuratedRecord;

/// Fractional change from `previous` to `current`; undefined for a zero base.
pub fn change_ratio(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 {
        return None;
    }
    Some((current - previous) / previous)
}

/// Sets `price_change_ratio` on rows already sorted by (commodity, state, year, month).
/// The first period of every (commodity, state) partition stays undefined.
pub fn fill_price_change(rows: &mut [CuratedRecord]) {
    let mut previous: Option<(String, Option<String>, f64)> = None;

    for row in rows.iter_mut() {
        row.price_change_ratio = match &previous {
            Some((commodity, state, prev_avg)) if *commodity == row.commodity && *state == row.state => {
                change_ratio(*prev_avg, row.average_price)
            }
            _ => None,
        };
        previous = Some((row.commodity.clone(), row.state.clone(), row.average_price));
    }
}
