//! Multiset with duplicate counting.
//!
//! Distinct elements keep their first-insertion order, and iteration yields
//! each one `count` times. Removing an element that is not present leaves
//! the bag untouched, so [`Bag::len`] always equals the number of elements
//! an iteration would yield.

use std::fmt;
use std::hash::Hash;

use indexmap::IndexMap;

/// Unordered collection that counts duplicates.
#[derive(Clone, PartialEq, Eq)]
pub struct Bag<T: Hash + Eq> {
    counts: IndexMap<T, usize>,
    len: usize,
}

impl<T: Hash + Eq> Bag<T> {
    /// Empty bag.
    pub fn new() -> Self {
        Self {
            counts: IndexMap::new(),
            len: 0,
        }
    }

    /// Add one occurrence of `elem`.
    pub fn insert(&mut self, elem: T) {
        *self.counts.entry(elem).or_insert(0) += 1;
        self.len += 1;
    }

    /// Whether at least one occurrence of `elem` is present.
    pub fn contains(&self, elem: &T) -> bool {
        self.counts.contains_key(elem)
    }

    /// Occurrences of `elem`.
    pub fn count(&self, elem: &T) -> usize {
        self.counts.get(elem).copied().unwrap_or(0)
    }

    /// Remove one occurrence of `elem`.
    ///
    /// Returns `false`, and changes nothing, when `elem` is absent.
    pub fn remove(&mut self, elem: &T) -> bool {
        let Some(count) = self.counts.get_mut(elem) else {
            return false;
        };
        if *count > 1 {
            *count -= 1;
        } else {
            let _ = self.counts.shift_remove(elem);
        }
        self.len -= 1;
        true
    }

    /// Total occurrences, duplicates included.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the bag holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct elements.
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// Each element repeated `count` times, distinct elements in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.counts
            .iter()
            .flat_map(|(elem, &count)| std::iter::repeat_n(elem, count))
    }
}

impl<T: Hash + Eq> Default for Bag<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq> FromIterator<T> for Bag<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut bag = Self::new();
        bag.extend(iter);
        bag
    }
}

impl<T: Hash + Eq> Extend<T> for Bag<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for elem in iter {
            self.insert(elem);
        }
    }
}

impl<T: Hash + Eq + fmt::Debug> fmt::Debug for Bag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_duplicates() {
        let bag: Bag<&str> = ["a", "b", "a", "c", "a"].into_iter().collect();
        assert_eq!(bag.len(), 5);
        assert_eq!(bag.distinct(), 3);
        assert_eq!(bag.count(&"a"), 3);
        assert_eq!(bag.count(&"b"), 1);
        assert_eq!(bag.count(&"z"), 0);
    }

    #[test]
    fn empty_bag() {
        let bag: Bag<u32> = std::iter::empty().collect();
        assert!(bag.is_empty());
        assert_eq!(bag.len(), 0);
        assert_eq!(bag.iter().count(), 0);
    }

    #[test]
    fn contains_tracks_presence() {
        let mut bag: Bag<u32> = [7].into_iter().collect();
        assert!(bag.contains(&7));
        assert!(bag.remove(&7));
        assert!(!bag.contains(&7));
    }

    #[test]
    fn remove_decrements_then_drops_key() {
        let mut bag: Bag<&str> = ["x", "x"].into_iter().collect();
        assert!(bag.remove(&"x"));
        assert_eq!(bag.count(&"x"), 1);
        assert_eq!(bag.distinct(), 1);
        assert!(bag.remove(&"x"));
        assert_eq!(bag.distinct(), 0);
        assert!(bag.is_empty());
    }

    #[test]
    fn remove_absent_keeps_len_consistent() {
        let mut bag: Bag<&str> = ["x"].into_iter().collect();
        assert!(!bag.remove(&"y"));
        assert_eq!(bag.len(), 1);
        assert!(bag.remove(&"x"));
        assert!(!bag.remove(&"x"));
        assert_eq!(bag.len(), 0);
        assert_eq!(bag.iter().count(), bag.len());
    }

    #[test]
    fn iteration_follows_first_insertion_order() {
        let bag: Bag<&str> = ["b", "a", "b", "c", "a"].into_iter().collect();
        let items: Vec<_> = bag.iter().copied().collect();
        assert_eq!(items, vec!["b", "b", "a", "a", "c"]);
    }

    #[test]
    fn removing_a_key_preserves_order_of_the_rest() {
        let mut bag: Bag<&str> = ["a", "b", "c"].into_iter().collect();
        assert!(bag.remove(&"b"));
        let items: Vec<_> = bag.iter().copied().collect();
        assert_eq!(items, vec!["a", "c"]);
    }

    #[test]
    fn debug_lists_every_occurrence() {
        let bag: Bag<u8> = [1, 1, 2].into_iter().collect();
        assert_eq!(format!("{bag:?}"), "[1, 1, 2]");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn sorted(mut v: Vec<u8>) -> Vec<u8> {
            v.sort_unstable();
            v
        }

        proptest! {
            #[test]
            fn iteration_round_trips_as_multiset(input in proptest::collection::vec(0u8..8, 0..64)) {
                let bag: Bag<u8> = input.iter().copied().collect();
                let out: Vec<u8> = bag.iter().copied().collect();
                prop_assert_eq!(bag.len(), input.len());
                prop_assert_eq!(sorted(out), sorted(input));
            }

            #[test]
            fn len_matches_iteration_after_removals(
                input in proptest::collection::vec(0u8..8, 0..32),
                removals in proptest::collection::vec(0u8..12, 0..32),
            ) {
                let mut bag: Bag<u8> = input.into_iter().collect();
                for r in &removals {
                    let _ = bag.remove(r);
                }
                prop_assert_eq!(bag.iter().count(), bag.len());
            }
        }
    }
}
