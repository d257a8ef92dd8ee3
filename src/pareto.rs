use serde::{Deserialize, Serialize};

/// Which individuals the returned front is drawn from
#[allow(non_camel_case_types)]
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParetoStrategy {
    /// Front of the last completed generation only
    generation,
    /// Front of every individual scored during the run
    cumulative,
}

/// Anything carrying a vector of objectives to minimise
pub trait MultiObjective {
    fn objectives(&self) -> Vec<f64>;
}

/// `a` dominates `b` when it is no worse on every objective and strictly better on at least one.
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    let mut strictly_better = false;
    for (x, y) in a.iter().zip(b) {
        if x > y {
            return false;
        }
        if x < y {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Items dominated by no other item, in their original order.
/// Items with equal objectives do not dominate each other and both survive.
pub fn non_dominated<T: MultiObjective + Clone>(items: &[T]) -> Vec<T> {
    let objectives: Vec<Vec<f64>> = items.iter().map(|i| i.objectives()).collect();
    items
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            !objectives
                .iter()
                .enumerate()
                .any(|(j, other)| j != *i && dominates(other, &objectives[*i]))
        })
        .map(|(_, item)| item.clone())
        .collect()
}

/// Non-dominated archive, fed incrementally.
///
/// Entries are keyed by `K`: an entry whose key is already archived is ignored, so a
/// champion carried over several generations is counted once.
#[derive(Clone, Debug)]
pub struct Archive<K: PartialEq, T: MultiObjective + Clone> {
    entries: Vec<(K, T)>,
}

impl<K: PartialEq, T: MultiObjective + Clone> Archive<K, T> {
    pub fn new() -> Archive<K, T> {
        Archive { entries: vec![] }
    }

    /// Offer one entry; returns true when it entered the archive.
    pub fn insert(&mut self, key: K, item: T) -> bool {
        if self.entries.iter().any(|(k, _)| *k == key) {
            return false;
        }
        let candidate = item.objectives();
        if self
            .entries
            .iter()
            .any(|(_, kept)| dominates(&kept.objectives(), &candidate))
        {
            return false;
        }
        self.entries
            .retain(|(_, kept)| !dominates(&candidate, &kept.objectives()));
        self.entries.push((key, item));
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn items(&self) -> Vec<T> {
        self.entries.iter().map(|(_, item)| item.clone()).collect()
    }
}

impl<K: PartialEq, T: MultiObjective + Clone> Default for Archive<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Point(f64, f64);

    impl MultiObjective for Point {
        fn objectives(&self) -> Vec<f64> {
            vec![self.0, self.1]
        }
    }

    #[test]
    fn test_dominance() {
        assert!(dominates(&[1.0, 2.0], &[2.0, 2.0]));
        assert!(dominates(&[1.0, 1.0], &[2.0, 2.0]));
        assert!(!dominates(&[1.0, 3.0], &[2.0, 2.0]));
        assert!(!dominates(&[1.0, 1.0], &[1.0, 1.0]));
    }

    #[test]
    fn test_dominance_is_antisymmetric() {
        let points = [
            [1.0, 2.0],
            [2.0, 1.0],
            [1.0, 1.0],
            [3.0, 3.0],
            [1.0, 2.0],
        ];
        for a in &points {
            for b in &points {
                assert!(!(dominates(a, b) && dominates(b, a)), "{:?} and {:?} dominate each other", a, b);
            }
        }
    }

    #[test]
    fn test_non_dominated_filter() {
        let items = vec![
            Point(1.0, 4.0),
            Point(2.0, 2.0),
            Point(3.0, 3.0),
            Point(4.0, 1.0),
            Point(5.0, 5.0),
        ];
        let front = non_dominated(&items);
        assert_eq!(front, vec![Point(1.0, 4.0), Point(2.0, 2.0), Point(4.0, 1.0)]);
    }

    #[test]
    fn test_non_dominated_is_idempotent() {
        let items = vec![
            Point(0.3, 0.9),
            Point(0.5, 0.5),
            Point(0.9, 0.2),
            Point(0.6, 0.6),
            Point(1.0, 1.0),
        ];
        let once = non_dominated(&items);
        let twice = non_dominated(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_equal_objectives_both_survive() {
        let items = vec![Point(1.0, 1.0), Point(1.0, 1.0), Point(2.0, 2.0)];
        let front = non_dominated(&items);
        assert_eq!(front.len(), 2);
    }

    #[test]
    fn test_archive_matches_batch_filter() {
        let items = vec![
            Point(5.0, 5.0),
            Point(2.0, 3.0),
            Point(3.0, 2.0),
            Point(1.0, 6.0),
            Point(2.5, 2.5),
            Point(2.0, 2.0),
        ];
        let mut archive: Archive<usize, Point> = Archive::new();
        for (i, p) in items.iter().enumerate() {
            archive.insert(i, p.clone());
        }
        let mut incremental = archive.items();
        let mut batch = non_dominated(&items);
        incremental.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        batch.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        assert_eq!(incremental, batch);
    }

    #[test]
    fn test_archive_ignores_known_keys() {
        let mut archive: Archive<Vec<usize>, Point> = Archive::new();
        assert!(archive.insert(vec![8], Point(1.0, 1.0)));
        assert!(!archive.insert(vec![8], Point(1.0, 1.0)));
        assert!(archive.insert(vec![16], Point(1.0, 1.0)));
        assert_eq!(archive.len(), 2);
    }
}
