//! Momentum ranking: top-N equity selection and ranked solver starting points.

use nalgebra::DVector;

use crate::stats::AssetStatistics;

const MOMENTUM_RANK_WEIGHT: f64 = 0.6;
const SHARPE_RANK_WEIGHT: f64 = 0.4;

/// Ascending ranks starting at 1; ties share their average rank
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end hold ranks start+1..=end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    ranks
}

/// Momentum ranks normalized to sum to one
pub fn momentum_initial_guess(momentum: &[f64]) -> DVector<f64> {
    let n = momentum.len();
    let ranks = average_ranks(momentum);
    let total: f64 = ranks.iter().sum();
    if total <= 0.0 {
        return DVector::from_element(n, 1.0 / n.max(1) as f64);
    }
    DVector::from_iterator(n, ranks.into_iter().map(|r| r / total))
}

/// Keep the best `keep` of the given universe positions by the combined
/// score `0.6 × rank(momentum) + 0.4 × rank(Sharpe)`. Order is preserved.
pub fn select_top(
    indices: &[usize],
    stats: &AssetStatistics,
    risk_free_rate: f64,
    keep: usize,
) -> Vec<usize> {
    if indices.len() <= keep {
        return indices.to_vec();
    }

    let momentum: Vec<f64> = indices.iter().map(|&i| stats.momentum[i]).collect();
    let sharpe: Vec<f64> = indices.iter().map(|&i| stats.sharpe(i, risk_free_rate)).collect();
    let momentum_ranks = average_ranks(&momentum);
    let sharpe_ranks = average_ranks(&sharpe);

    let mut scored: Vec<(usize, f64)> = indices
        .iter()
        .enumerate()
        .map(|(k, &i)| {
            (i, MOMENTUM_RANK_WEIGHT * momentum_ranks[k] + SHARPE_RANK_WEIGHT * sharpe_ranks[k])
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut chosen: Vec<usize> = scored.into_iter().take(keep).map(|(i, _)| i).collect();
    chosen.sort_unstable();
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    fn stats(returns: &[f64], vols: &[f64], momentum: &[f64]) -> AssetStatistics {
        let n = returns.len();
        AssetStatistics {
            asset_ids: (0..n).map(|i| format!("S{}", i)).collect(),
            annual_returns: DVector::from_column_slice(returns),
            annual_volatility: DVector::from_column_slice(vols),
            covariance: DMatrix::from_fn(n, n, |i, j| if i == j { vols[i] * vols[i] } else { 0.0 }),
            momentum: DVector::from_column_slice(momentum),
            last_close: vec![Some(100.0); n],
            has_data: vec![true; n],
        }
    }

    #[test]
    fn test_average_ranks_with_ties() {
        assert_eq!(average_ranks(&[0.3, 0.1, 0.3, 0.2]), vec![3.5, 1.0, 3.5, 2.0]);
        assert!(average_ranks(&[]).is_empty());
    }

    #[test]
    fn test_momentum_guess_sums_to_one() {
        let guess = momentum_initial_guess(&[0.05, -0.02, 0.10]);
        assert!((guess.sum() - 1.0).abs() < 1e-12);
        assert!(guess[2] > guess[0] && guess[0] > guess[1]);
    }

    #[test]
    fn test_select_top_keeps_best_in_order() {
        let s = stats(
            &[0.10, 0.30, 0.05, 0.25],
            &[0.2, 0.2, 0.2, 0.2],
            &[0.01, 0.20, -0.05, 0.15],
        );
        assert_eq!(select_top(&[0, 1, 2, 3], &s, 0.07, 2), vec![1, 3]);
        assert_eq!(select_top(&[0, 1], &s, 0.07, 5), vec![0, 1]);
    }
}
