//! Partitions a source table's integer primary-key space into contiguous
//! ranges for the range loader pool, and filters out ranges already marked
//! done in the progress table.

use model::{ColumnMeta, PkRange};
use mysql::MySqlAdapter;

/// Result of `detect_single_int_pk`: the eligible PK column, or a reason the
/// table isn't eligible for range partitioning (falls back to cursor mode).
pub enum PkDetection {
    Eligible { column: String },
    Ineligible,
}

pub fn detect_single_int_pk(meta: &ColumnMeta) -> PkDetection {
    match meta.single_integer_pk() {
        Some(column) => PkDetection::Eligible {
            column: column.to_string(),
        },
        None => PkDetection::Ineligible,
    }
}

/// Returns `(min, max)` for the given column, `(0, 0)` when the table is
/// empty (spec §4.2).
pub async fn get_min_max(adapter: &MySqlAdapter, table: &str, column: &str) -> Result<(i64, i64), mysql::DbError> {
    let mut conn = adapter.conn().await?;
    use mysql_async::prelude::Queryable;
    let row: Option<(Option<i64>, Option<i64>)> = conn
        .query_first(format!(
            "SELECT MIN(`{column}`), MAX(`{column}`) FROM `{table}`"
        ))
        .await?;

    Ok(match row {
        Some((Some(min), Some(max))) => (min, max),
        _ => (0, 0),
    })
}

/// Partitions `[min, max]` into `workers` contiguous, non-overlapping ranges.
/// Step is `floor((max - min + 1) / workers)`, minimum 1; the last range
/// always extends to `max` so remainder rows aren't dropped (spec §4.2).
pub fn build_ranges(min: i64, max: i64, workers: usize) -> Vec<PkRange> {
    if workers == 0 || min > max {
        return Vec::new();
    }
    if min == max {
        return vec![PkRange::new(min, max)];
    }

    let span = (max - min + 1) as u128;
    let step = (span / workers as u128).max(1) as i64;

    let mut ranges = Vec::new();
    let mut start = min;
    while start <= max {
        let mut end = start.saturating_add(step - 1);
        if end > max || ranges.len() + 1 == workers {
            end = max;
        }
        ranges.push(PkRange::new(start, end));
        if end >= max {
            break;
        }
        start = end + 1;
    }
    ranges
}

/// Drops planned ranges that are already fully covered by a single done
/// range. Partial overlaps are re-run in full; the applier tolerates
/// duplicate inserts (spec §4.2, §4.3).
pub fn filter_ranges(planned: &[PkRange], done: &[PkRange]) -> Vec<PkRange> {
    planned
        .iter()
        .filter(|range| !done.iter().any(|d| d.contains(range)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_value_range_yields_one_range() {
        assert_eq!(build_ranges(5, 5, 4), vec![PkRange::new(5, 5)]);
    }

    #[test]
    fn partitions_contiguously_with_remainder_on_last_range() {
        let ranges = build_ranges(1, 10, 3);
        assert_eq!(
            ranges,
            vec![PkRange::new(1, 3), PkRange::new(4, 6), PkRange::new(7, 10)]
        );
    }

    #[test]
    fn step_floors_to_minimum_one_when_workers_exceed_span() {
        let ranges = build_ranges(1, 2, 10);
        assert_eq!(ranges, vec![PkRange::new(1, 1), PkRange::new(2, 2)]);
    }

    #[test]
    fn filter_skips_fully_covered_ranges_only() {
        let planned = vec![PkRange::new(1, 10), PkRange::new(11, 20), PkRange::new(15, 25)];
        let done = vec![PkRange::new(1, 10), PkRange::new(11, 20)];

        let remaining = filter_ranges(&planned, &done);
        assert_eq!(remaining, vec![PkRange::new(15, 25)]);
    }

    #[test]
    fn filter_reruns_partially_covered_ranges_in_full() {
        let planned = vec![PkRange::new(5, 15)];
        let done = vec![PkRange::new(1, 10)];

        let remaining = filter_ranges(&planned, &done);
        assert_eq!(remaining, vec![PkRange::new(5, 15)]);
    }
}
