//! Exact TreeSHAP for a single decision tree
//!
//! Polynomial-time Shapley values with path-dependent (cover weighted)
//! expectations, following Lundberg et al., "Consistent Individualized
//! Feature Attribution for Tree Ensembles".

use super::inference::{Node, SplitRule, Tree};

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

impl PathElement {
    fn new(feature: Option<usize>, zero_fraction: f64, one_fraction: f64) -> Self {
        Self {
            feature,
            zero_fraction,
            one_fraction,
            pweight: 0.0,
        }
    }
}

/// Add the SHAP values of `tree` at `x` into `phi`
pub(crate) fn tree_shap(tree: &Tree, x: &[f64], rule: SplitRule, phi: &mut [f64]) {
    let mut walker = Walker { tree, x, rule, phi };
    walker.recurse(0, Vec::new(), 0, PathElement::new(None, 1.0, 1.0));
}

struct Walker<'a> {
    tree: &'a Tree,
    x: &'a [f64],
    rule: SplitRule,
    phi: &'a mut [f64],
}

impl Walker<'_> {
    fn recurse(
        &mut self,
        index: usize,
        mut path: Vec<PathElement>,
        mut unique_depth: usize,
        incoming: PathElement,
    ) {
        extend_path(&mut path, unique_depth, incoming);

        let tree = self.tree;
        match tree.node(index) {
            Node::Leaf { value, .. } => {
                for i in 1..=unique_depth {
                    let weight = unwound_path_sum(&path, unique_depth, i);
                    let element = path[i];
                    if let Some(feature) = element.feature {
                        self.phi[feature] +=
                            weight * (element.one_fraction - element.zero_fraction) * value;
                    }
                }
            }
            Node::Split {
                feature,
                threshold,
                left,
                right,
                default_left,
                cover,
            } => {
                let (hot, cold) = if self
                    .rule
                    .goes_left(self.x[*feature], *threshold, *default_left)
                {
                    (*left, *right)
                } else {
                    (*right, *left)
                };
                let hot_zero_fraction = tree.node(hot).cover() / cover;
                let cold_zero_fraction = tree.node(cold).cover() / cover;
                let mut incoming_zero_fraction = 1.0;
                let mut incoming_one_fraction = 1.0;

                // a feature seen earlier on the path is merged, not duplicated
                if let Some(k) = (1..=unique_depth).find(|&k| path[k].feature == Some(*feature)) {
                    incoming_zero_fraction = path[k].zero_fraction;
                    incoming_one_fraction = path[k].one_fraction;
                    unwind_path(&mut path, unique_depth, k);
                    unique_depth -= 1;
                }

                self.recurse(
                    hot,
                    path.clone(),
                    unique_depth + 1,
                    PathElement::new(
                        Some(*feature),
                        hot_zero_fraction * incoming_zero_fraction,
                        incoming_one_fraction,
                    ),
                );
                self.recurse(
                    cold,
                    path,
                    unique_depth + 1,
                    PathElement::new(
                        Some(*feature),
                        cold_zero_fraction * incoming_zero_fraction,
                        0.0,
                    ),
                );
            }
        }
    }
}

fn extend_path(path: &mut Vec<PathElement>, unique_depth: usize, mut element: PathElement) {
    element.pweight = if unique_depth == 0 { 1.0 } else { 0.0 };
    path.truncate(unique_depth);
    path.push(element);

    let depth = unique_depth as f64;
    for i in (0..unique_depth).rev() {
        let fi = i as f64;
        path[i + 1].pweight += element.one_fraction * path[i].pweight * (fi + 1.0) / (depth + 1.0);
        path[i].pweight = element.zero_fraction * path[i].pweight * (depth - fi) / (depth + 1.0);
    }
}

fn unwind_path(path: &mut [PathElement], unique_depth: usize, path_index: usize) {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let depth = unique_depth as f64;
    let mut next_one_portion = path[unique_depth].pweight;

    for i in (0..unique_depth).rev() {
        let fi = i as f64;
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * (depth + 1.0) / ((fi + 1.0) * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (depth - fi) / (depth + 1.0);
        } else {
            path[i].pweight = path[i].pweight * (depth + 1.0) / (zero_fraction * (depth - fi));
        }
    }

    for i in path_index..unique_depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
}

fn unwound_path_sum(path: &[PathElement], unique_depth: usize, path_index: usize) -> f64 {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let depth = unique_depth as f64;
    let mut next_one_portion = path[unique_depth].pweight;
    let mut total = 0.0;

    for i in (0..unique_depth).rev() {
        let fi = i as f64;
        if one_fraction != 0.0 {
            let tmp = next_one_portion * (depth + 1.0) / ((fi + 1.0) * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * ((depth - fi) / (depth + 1.0));
        } else if zero_fraction != 0.0 {
            total += (path[i].pweight / zero_fraction) / ((depth - fi) / (depth + 1.0));
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(value: f64, cover: f64) -> Node {
        Node::Leaf { value, cover }
    }

    fn split(feature: usize, threshold: f64, left: usize, right: usize, cover: f64) -> Node {
        Node::Split {
            feature,
            threshold,
            left,
            right,
            default_left: false,
            cover,
        }
    }

    /// Depth-3 tree over three features that splits on feature 0 twice
    fn tree() -> Tree {
        Tree::new(vec![
            split(0, 0.5, 1, 2, 100.0),
            split(1, 0.5, 3, 4, 60.0),
            split(0, 1.5, 5, 6, 40.0),
            leaf(1.0, 25.0),
            split(2, 0.5, 7, 8, 35.0),
            leaf(-0.5, 30.0),
            leaf(2.0, 10.0),
            leaf(0.3, 20.0),
            leaf(-1.2, 15.0),
        ])
    }

    /// E[f(x) | x_S] with cover-weighted marginalisation of absent features
    fn conditional_expectation(tree: &Tree, x: &[f64], present: &[bool], index: usize) -> f64 {
        match tree.node(index) {
            Node::Leaf { value, .. } => *value,
            Node::Split {
                feature,
                threshold,
                left,
                right,
                default_left,
                cover,
            } => {
                if present[*feature] {
                    let next = if SplitRule::LessThan.goes_left(x[*feature], *threshold, *default_left) {
                        *left
                    } else {
                        *right
                    };
                    conditional_expectation(tree, x, present, next)
                } else {
                    let l = tree.node(*left).cover() / cover;
                    let r = tree.node(*right).cover() / cover;
                    l * conditional_expectation(tree, x, present, *left)
                        + r * conditional_expectation(tree, x, present, *right)
                }
            }
        }
    }

    fn factorial(n: usize) -> f64 {
        (1..=n).map(|k| k as f64).product()
    }

    fn brute_force_shap(tree: &Tree, x: &[f64]) -> Vec<f64> {
        let m = x.len();
        let mut phi = vec![0.0; m];
        for (i, slot) in phi.iter_mut().enumerate() {
            for mask in 0..(1usize << m) {
                if mask & (1 << i) != 0 {
                    continue;
                }
                let mut present: Vec<bool> = (0..m).map(|j| mask & (1 << j) != 0).collect();
                let size = present.iter().filter(|p| **p).count();
                let weight = factorial(size) * factorial(m - size - 1) / factorial(m);
                let without = conditional_expectation(tree, x, &present, 0);
                present[i] = true;
                let with = conditional_expectation(tree, x, &present, 0);
                *slot += weight * (with - without);
            }
        }
        phi
    }

    #[test]
    fn test_stump_matches_closed_form() {
        let tree = Tree::new(vec![split(0, 0.5, 1, 2, 10.0), leaf(-1.0, 6.0), leaf(1.0, 4.0)]);
        let mut phi = vec![0.0];
        tree_shap(&tree, &[0.0], SplitRule::LessThan, &mut phi);
        // f(x) - E[f] = -1.0 - (-0.6 + 0.4)
        assert!((phi[0] - (-0.8)).abs() < 1e-12);
    }

    #[test]
    fn test_matches_brute_force_shapley() {
        let tree = tree();
        let inputs = [
            [0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 1.0, 1.0],
            [1.0, 0.0, 1.0],
            [2.0, 1.0, 0.0],
        ];
        for x in inputs {
            let mut phi = vec![0.0; 3];
            tree_shap(&tree, &x, SplitRule::LessThan, &mut phi);
            let expected = brute_force_shap(&tree, &x);
            for (got, want) in phi.iter().zip(&expected) {
                assert!((got - want).abs() < 1e-9, "x={:?}: {:?} vs {:?}", x, phi, expected);
            }
        }
    }

    #[test]
    fn test_local_accuracy() {
        let tree = tree();
        for x in [[0.0, 1.0, 1.0], [2.0, 0.0, 0.0], [1.0, 1.0, 0.0]] {
            let mut phi = vec![0.0; 3];
            tree_shap(&tree, &x, SplitRule::LessThan, &mut phi);
            let total = tree.expected_value() + phi.iter().sum::<f64>();
            assert!((total - tree.predict(&x, SplitRule::LessThan)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unused_feature_gets_zero() {
        let tree = Tree::new(vec![split(1, 0.5, 1, 2, 10.0), leaf(-1.0, 5.0), leaf(1.0, 5.0)]);
        let mut phi = vec![0.0; 3];
        tree_shap(&tree, &[9.0, 1.0, 9.0], SplitRule::LessThan, &mut phi);
        assert_eq!(phi[0], 0.0);
        assert_eq!(phi[2], 0.0);
        assert!((phi[1] - 1.0).abs() < 1e-12);
    }
}
