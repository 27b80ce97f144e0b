//! Recursive TreeSHAP (Lundberg et al., "From local explanations to
//! global understanding with explainable AI for trees", 2020).
//!
//! Walks every root-to-leaf path once, maintaining the subset-weight
//! polynomial over the unique features on the path. `extend` folds a new
//! split into the polynomial, `unwind` removes one, and at each leaf the
//! unwound weight of every path feature yields its contribution.
//!
//! The splitting weights are passed in per node, so the same walk serves
//! both the interventional distribution (background-derived weights) and
//! the path-dependent one (training covers).

use crate::forest::Tree;

/// One unique feature on the current decision path.
#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// Feature index; -1 for the root placeholder.
    feature: i32,
    /// Fraction of weight that flows through when the feature is absent
    /// from the coalition.
    zero_fraction: f64,
    /// 1.0 when the sample follows this split, 0.0 on cold branches.
    one_fraction: f64,
    /// Permutation weight of subsets of this size.
    pweight: f64,
}

/// Accumulate one tree's Shapley contributions for `row` into `phi`.
pub(crate) fn tree_shap(tree: &Tree, weights: &[f64], row: &[f64], phi: &mut [f64]) {
    let path = Vec::new();
    recurse(tree, weights, row, phi, 0, &path, 1.0, 1.0, -1);
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &Tree,
    weights: &[f64],
    row: &[f64],
    phi: &mut [f64],
    node: usize,
    parent_path: &[PathElement],
    parent_zero_fraction: f64,
    parent_one_fraction: f64,
    parent_feature: i32,
) {
    let mut path = parent_path.to_vec();
    extend(
        &mut path,
        parent_zero_fraction,
        parent_one_fraction,
        parent_feature,
    );

    if tree.is_leaf(node) {
        let leaf_value = tree.value[node];
        for i in 1..path.len() {
            let w = unwound_sum(&path, i);
            let el = &path[i];
            phi[el.feature as usize] += w * (el.one_fraction - el.zero_fraction) * leaf_value;
        }
        return;
    }

    let split = tree.split_feature[node] as usize;
    let value = row.get(split).copied().unwrap_or(f64::NAN);
    let go_left = if value.is_nan() {
        tree.default_left[node]
    } else {
        value <= tree.threshold[node]
    };
    let (hot, cold) = if go_left {
        (tree.left[node] as usize, tree.right[node] as usize)
    } else {
        (tree.right[node] as usize, tree.left[node] as usize)
    };

    let node_weight = weights[node];
    let hot_zero_fraction = weights[hot] / node_weight;
    let cold_zero_fraction = weights[cold] / node_weight;
    let mut incoming_zero_fraction = 1.0;
    let mut incoming_one_fraction = 1.0;

    // A repeated split on the same feature is undone here and redone
    // below, keeping each feature unique on the path.
    if let Some(k) = path.iter().position(|e| e.feature == split as i32) {
        incoming_zero_fraction = path[k].zero_fraction;
        incoming_one_fraction = path[k].one_fraction;
        unwind(&mut path, k);
    }

    recurse(
        tree,
        weights,
        row,
        phi,
        hot,
        &path,
        hot_zero_fraction * incoming_zero_fraction,
        incoming_one_fraction,
        split as i32,
    );
    recurse(
        tree,
        weights,
        row,
        phi,
        cold,
        &path,
        cold_zero_fraction * incoming_zero_fraction,
        0.0,
        split as i32,
    );
}

/// Fold a new split into the path polynomial.
fn extend(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: i32) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });
    for i in (0..depth).rev() {
        let pw = path[i].pweight;
        path[i + 1].pweight += one_fraction * pw * (i as f64 + 1.0) / (depth as f64 + 1.0);
        path[i].pweight = zero_fraction * pw * (depth as f64 - i as f64) / (depth as f64 + 1.0);
    }
}

/// Remove the element at `index` from the path polynomial, reversing the
/// `extend` that introduced it.
fn unwind(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight =
                next_one_portion * (depth as f64 + 1.0) / ((i as f64 + 1.0) * one_fraction);
            next_one_portion = tmp
                - path[i].pweight * zero_fraction * (depth as f64 - i as f64)
                    / (depth as f64 + 1.0);
        } else {
            path[i].pweight = path[i].pweight * (depth as f64 + 1.0)
                / (zero_fraction * (depth as f64 - i as f64));
        }
    }
    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total unwound permutation weight for the path element at `index`,
/// without mutating the path.
fn unwound_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    if one_fraction != 0.0 {
        for i in (0..depth).rev() {
            let tmp = next_one_portion / ((i as f64 + 1.0) * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * (depth as f64 - i as f64);
        }
    } else {
        for i in (0..depth).rev() {
            total += path[i].pweight / (zero_fraction * (depth as f64 - i as f64));
        }
    }
    total * (depth as f64 + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::NO_CHILD;

    /// Symmetric two-level tree: f0 and f1 both split 50/50, leaves are
    /// the sum of indicator signs. Both features must get equal credit.
    fn symmetric_tree() -> Tree {
        Tree {
            split_feature: vec![0, 1, 1, 0, 0, 0, 0],
            threshold: vec![0.5, 0.5, 0.5, 0.0, 0.0, 0.0, 0.0],
            default_left: vec![true; 7],
            left: vec![1, 3, 5, NO_CHILD, NO_CHILD, NO_CHILD, NO_CHILD],
            right: vec![2, 4, 6, NO_CHILD, NO_CHILD, NO_CHILD, NO_CHILD],
            value: vec![0.0, 0.0, 0.0, -2.0, 0.0, 0.0, 2.0],
            cover: vec![100.0, 50.0, 50.0, 25.0, 25.0, 25.0, 25.0],
        }
    }

    #[test]
    fn test_symmetric_features_share_credit_equally() {
        let tree = symmetric_tree();
        let mut phi = vec![0.0; 2];
        tree_shap(&tree, &tree.cover, &[0.9, 0.9], &mut phi);
        // prediction 2.0, expectation 0.0; symmetric game -> 1.0 each
        assert!((phi[0] - 1.0).abs() < 1e-12, "phi = {phi:?}");
        assert!((phi[1] - 1.0).abs() < 1e-12, "phi = {phi:?}");
    }

    #[test]
    fn test_repeated_split_feature_is_consolidated() {
        // f0 twice on one path: f0 <= 10 -> (f0 <= 5 -> 1 else 2) else 4
        let tree = Tree {
            split_feature: vec![0, 0, 0, 0, 0],
            threshold: vec![10.0, 5.0, 0.0, 0.0, 0.0],
            default_left: vec![true; 5],
            left: vec![1, 3, NO_CHILD, NO_CHILD, NO_CHILD],
            right: vec![2, 4, NO_CHILD, NO_CHILD, NO_CHILD],
            value: vec![0.0, 0.0, 4.0, 1.0, 2.0],
            cover: vec![100.0, 80.0, 20.0, 40.0, 40.0],
        };
        let mut phi = vec![0.0; 1];
        tree_shap(&tree, &tree.cover, &[3.0], &mut phi);
        // single-feature game: phi_0 = f(x) - E
        let expected = (40.0 * 1.0 + 40.0 * 2.0 + 20.0 * 4.0) / 100.0;
        assert!((phi[0] - (1.0 - expected)).abs() < 1e-12);
    }

    #[test]
    fn test_leaf_only_tree_contributes_nothing() {
        let tree = Tree {
            split_feature: vec![0],
            threshold: vec![0.0],
            default_left: vec![true],
            left: vec![NO_CHILD],
            right: vec![NO_CHILD],
            value: vec![3.5],
            cover: vec![10.0],
        };
        let mut phi = vec![0.0; 2];
        tree_shap(&tree, &tree.cover, &[1.0, 2.0], &mut phi);
        assert_eq!(phi, vec![0.0, 0.0]);
    }
}
