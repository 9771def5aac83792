//! Majority-vote consolidation of per-fold gene sets

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Consolidated gene set plus the fold tallies behind it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consolidation {
    /// Genes present in a strict majority of folds
    pub genes: BTreeSet<String>,
    /// Number of folds each gene appeared in
    pub tallies: BTreeMap<String, usize>,
    /// Folds that voted
    pub n_folds: usize,
}

/// Minimum fold count a gene needs: strictly more than half of `n_folds`
pub fn majority_threshold(n_folds: usize) -> usize {
    n_folds / 2 + 1
}

/// Keep genes occurring in more than `n_folds / 2` of `fold_sets`
pub fn consolidate<'a, I>(fold_sets: I) -> Consolidation
where
    I: IntoIterator<Item = &'a BTreeSet<String>>,
{
    let mut tallies: BTreeMap<String, usize> = BTreeMap::new();
    let mut n_folds = 0;
    for set in fold_sets {
        n_folds += 1;
        for gene in set {
            *tallies.entry(gene.clone()).or_insert(0) += 1;
        }
    }

    let needed = majority_threshold(n_folds);
    let genes = tallies
        .iter()
        .filter(|(_, &count)| count >= needed)
        .map(|(gene, _)| gene.clone())
        .collect();

    Consolidation {
        genes,
        tallies,
        n_folds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_strict_majority_of_five() {
        let folds = vec![
            set(&["X", "Y"]),
            set(&["X", "Y"]),
            set(&["X"]),
            set(&[]),
            set(&["Z"]),
        ];
        let result = consolidate(&folds);
        assert_eq!(result.genes, set(&["X"]));
        assert_eq!(result.tallies["X"], 3);
        assert_eq!(result.tallies["Y"], 2);
        assert_eq!(result.n_folds, 5);
    }

    #[test]
    fn test_majority_threshold() {
        assert_eq!(majority_threshold(5), 3);
        assert_eq!(majority_threshold(4), 3);
        assert_eq!(majority_threshold(3), 2);
        assert_eq!(majority_threshold(2), 2);
    }

    #[test]
    fn test_even_split_not_kept() {
        let folds = vec![set(&["A"]), set(&["A"]), set(&[]), set(&[])];
        assert!(consolidate(&folds).genes.is_empty());
    }

    #[test]
    fn test_no_folds() {
        let folds: Vec<BTreeSet<String>> = Vec::new();
        let result = consolidate(&folds);
        assert!(result.genes.is_empty());
        assert_eq!(result.n_folds, 0);
    }
}
