//! 4-connectivity connected-component extraction over a foreground mask,
//! restricted to a bounding rectangle.
//!
//! Grounded on the same union-find connected-component pattern as
//! [`crate::vision::field_color::extract_green_mask`] (itself grounded on
//! `GetBackgroundMask2` in the original prototype), generalized here to
//! emit every component rather than just the single largest one, plus a
//! sentinel border node so callers can cheaply exclude components that
//! touch the rectangle's edge.

use std::collections::HashMap;

use crate::vision::types::{Mask, Position};
use crate::vision::union_find::UnionFind;

/// One connected group of foreground pixels.
#[derive(Debug, Clone)]
pub struct Component {
    pub positions: Vec<Position>,
    pub touches_border: bool,
}

/// Runs 4-connectivity union-find over `mask` restricted to
/// `(min_row..=max_row, min_col..=max_col)`. A sentinel node unions with
/// every foreground pixel that lies on the rectangle's border, so a
/// component's `touches_border` flag falls out of whether its root matches
/// the sentinel's root.
pub fn extract_components(mask: &Mask, min_row: i32, max_row: i32, min_col: i32, max_col: i32) -> Vec<Component> {
    let rows = mask.rows;
    let cols = mask.cols;
    let lo_row = min_row.max(0);
    let hi_row = max_row.min(rows - 1);
    let lo_col = min_col.max(0);
    let hi_col = max_col.min(cols - 1);

    let total = (rows as usize) * (cols as usize);
    let border = total;
    let mut uf = UnionFind::new(total + 1);
    uf.add(border, 0.0);

    let index = |r: i32, c: i32| (r as usize) * (cols as usize) + (c as usize);

    for i in lo_row..=hi_row {
        for j in lo_col..=hi_col {
            if !mask.get(i, j) {
                continue;
            }
            let idx = index(i, j);
            uf.add(idx, 0.0);
            if i == lo_row || i == hi_row || j == lo_col || j == hi_col {
                uf.union(idx, border, false);
            }
            if i > lo_row && mask.get(i - 1, j) {
                uf.union(idx, index(i - 1, j), false);
            }
            if j > lo_col && mask.get(i, j - 1) {
                uf.union(idx, index(i, j - 1), false);
            }
        }
    }

    let border_root = uf.find(border);
    let mut groups: HashMap<usize, Vec<Position>> = HashMap::new();
    for i in lo_row..=hi_row {
        for j in lo_col..=hi_col {
            if !mask.get(i, j) {
                continue;
            }
            let idx = index(i, j);
            let root = uf.find(idx);
            groups.entry(root).or_default().push(Position::new(i, j));
        }
    }

    groups
        .into_iter()
        .map(|(root, positions)| Component {
            positions,
            touches_border: root == border_root,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_disjoint_blobs() {
        let mut mask = Mask::new(10, 10);
        mask.set(1, 1, true);
        mask.set(1, 2, true);
        mask.set(8, 8, true);
        let components = extract_components(&mask, 0, 9, 0, 9);
        assert_eq!(components.len(), 2);
        let sizes: Vec<usize> = components.iter().map(|c| c.positions.len()).collect();
        assert!(sizes.contains(&2));
        assert!(sizes.contains(&1));
    }

    #[test]
    fn flags_components_touching_the_rectangle_border() {
        let mut mask = Mask::new(5, 5);
        mask.set(0, 0, true);
        mask.set(2, 2, true);
        let components = extract_components(&mask, 0, 4, 0, 4);
        let border_hit = components.iter().any(|c| c.positions.len() == 1 && c.touches_border && c.positions[0] == Position::new(0, 0));
        let interior = components.iter().any(|c| !c.touches_border && c.positions[0] == Position::new(2, 2));
        assert!(border_hit);
        assert!(interior);
    }
}
