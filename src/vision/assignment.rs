//! Optimal min-cost bipartite matching, used by the registry's Phase F to
//! break ties when more than one candidate/disposed pair is simultaneously
//! eligible for reconnection in the same frame.
//!
//! Grounded on `yellowhama-footballgame`'s positioning engine, which wraps
//! `pathfinding::kuhn_munkres::kuhn_munkres_min` over a `pathfinding::matrix::Matrix`
//! the same way this module does.

use pathfinding::kuhn_munkres::kuhn_munkres_min;
use pathfinding::matrix::Matrix;

/// Scale factor applied before truncating `f64` distances to the integer
/// costs `kuhn_munkres_min` requires (it needs `Ord`, which floats lack).
const COST_SCALE: f64 = 1000.0;

/// Solves the square assignment problem for `costs[row][col]`, returning the
/// column assigned to each row in row order and the total (unscaled) cost.
/// `costs` must be square; callers pad with a large sentinel cost for
/// unmatched candidates/disposed objects when the sets are of unequal size.
pub fn solve(costs: &[Vec<f64>]) -> (Vec<usize>, f64) {
    let n = costs.len();
    if n == 0 {
        return (Vec::new(), 0.0);
    }
    let matrix = Matrix::from_fn(n, n, |(i, j)| (costs[i][j] * COST_SCALE).round() as i64);
    let (total, assignment) = kuhn_munkres_min(&matrix);
    (assignment, total as f64 / COST_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_the_obviously_cheaper_matching() {
        let costs = vec![vec![1.0, 10.0], vec![10.0, 1.0]];
        let (assignment, total) = solve(&costs);
        assert_eq!(assignment, vec![0, 1]);
        assert!((total - 2.0).abs() < 1e-6);
    }

    #[test]
    fn empty_matrix_is_a_no_op() {
        let (assignment, total) = solve(&[]);
        assert!(assignment.is_empty());
        assert_eq!(total, 0.0);
    }
}
