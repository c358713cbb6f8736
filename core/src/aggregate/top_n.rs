use serde::Serialize;

pub const OTHER_LABEL: &str = "Other";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareRow {
    pub label:      String,
    pub value:      f64,
    /// Share of `TopNBreakdown::total`, 2 decimals.
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopNBreakdown {
    pub rows:  Vec<ShareRow>,
    pub total: f64,
}

/// Keep the `top_n` largest categories and fold the rest into one "Other"
/// row. Percentages are recomputed against the combined total.
///
/// Ordering is by value descending, then label. Percentages are rounded with
/// the largest-remainder method so that they always sum to exactly 100.00
/// when the total is positive.
pub fn top_n_with_other(items: &[(String, f64)], top_n: usize) -> TopNBreakdown {
    let mut sorted: Vec<&(String, f64)> = items.iter().collect();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut rows: Vec<(String, f64)> = sorted
        .iter()
        .take(top_n)
        .map(|(label, value)| (label.clone(), *value))
        .collect();

    if sorted.len() > top_n {
        let rest: f64 = sorted[top_n..].iter().map(|(_, v)| v).sum();
        rows.push((OTHER_LABEL.to_string(), rest));
    }

    let total: f64 = rows.iter().map(|(_, v)| v).sum();
    let percentages = hundredths_shares(&rows, total);

    TopNBreakdown {
        rows: rows
            .into_iter()
            .zip(percentages)
            .map(|((label, value), percentage)| ShareRow { label, value, percentage })
            .collect(),
        total,
    }
}

fn hundredths_shares(rows: &[(String, f64)], total: f64) -> Vec<f64> {
    if total <= 0.0 {
        return vec![0.0; rows.len()];
    }

    let raw: Vec<f64> = rows.iter().map(|(_, v)| v / total * 10_000.0).collect();
    let mut units: Vec<i64> = raw.iter().map(|r| r.floor() as i64).collect();
    let leftover = (10_000 - units.iter().sum::<i64>()).max(0) as usize;

    let mut by_remainder: Vec<usize> = (0..raw.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        let ra = raw[a] - raw[a].floor();
        let rb = raw[b] - raw[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });
    for &i in by_remainder.iter().take(leftover) {
        units[i] += 1;
    }

    units.into_iter().map(|u| u as f64 / 100.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(values: &[(&str, f64)]) -> Vec<(String, f64)> {
        values.iter().map(|(l, v)| (l.to_string(), *v)).collect()
    }

    #[test]
    fn no_other_row_when_under_limit() {
        let out = top_n_with_other(&items(&[("a", 1.0), ("b", 3.0)]), 8);
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.rows[0].label, "b");
        assert_eq!(out.rows[0].percentage, 75.0);
        assert_eq!(out.rows[1].percentage, 25.0);
    }

    #[test]
    fn thirds_still_sum_to_one_hundred() {
        let out = top_n_with_other(&items(&[("a", 1.0), ("b", 1.0), ("c", 1.0)]), 8);
        let sum: f64 = out.rows.iter().map(|r| r.percentage).sum();
        assert!((sum - 100.0).abs() < 1e-9, "sum was {sum}");
        assert_eq!(out.rows[0].percentage, 33.34);
    }

    #[test]
    fn zero_total_yields_zero_percentages() {
        let out = top_n_with_other(&items(&[("a", 0.0)]), 1);
        assert_eq!(out.rows[0].percentage, 0.0);
    }
}
