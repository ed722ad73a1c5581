//! Bound enforcement on accumulated maps.
//!
//! Once a map holds `join_cap` contributions, the oldest ones (lowest
//! context ID) are evicted until it is below the cap again. Newer contexts
//! are closer to the failure being observed, so they are the ones kept.

use crate::node::ContributionMap;

/// Evicts the oldest contributions from accumulated maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundEnforcer {
    join_cap: usize,
}

impl BoundEnforcer {
    /// Create an enforcer for the given cap.
    pub fn new(join_cap: usize) -> Self {
        Self { join_cap }
    }

    /// The configured cap.
    pub fn join_cap(&self) -> usize {
        self.join_cap
    }

    /// Remove lowest-ID entries while `map.len() >= join_cap`.
    ///
    /// Returns the number of evicted entries.
    pub fn trim(&self, map: &mut ContributionMap) -> usize {
        let mut evicted = 0;
        while map.len() >= self.join_cap && map.pop_first().is_some() {
            evicted += 1;
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tether_core::{ContextId, FrameDescriptor, Frames};

    fn map_of(ids: impl IntoIterator<Item = u64>) -> ContributionMap {
        ids.into_iter()
            .map(|n| {
                let frames: Frames = Arc::from(vec![FrameDescriptor::native(format!("f{n}"))]);
                (ContextId::new(n).unwrap(), frames)
            })
            .collect()
    }

    fn ids(map: &ContributionMap) -> Vec<u64> {
        map.keys().map(|id| id.get()).collect()
    }

    #[test]
    fn below_cap_is_untouched() {
        let mut map = map_of(1..=3);
        assert_eq!(BoundEnforcer::new(4).trim(&mut map), 0);
        assert_eq!(ids(&map), vec![1, 2, 3]);
    }

    #[test]
    fn at_cap_evicts_lowest_until_below() {
        let mut map = map_of([9, 2, 5, 7]);
        assert_eq!(BoundEnforcer::new(4).trim(&mut map), 1);
        assert_eq!(ids(&map), vec![5, 7, 9]);
    }

    #[test]
    fn far_above_cap_keeps_newest() {
        let mut map = map_of(1..=100);
        let evicted = BoundEnforcer::new(50).trim(&mut map);
        assert_eq!(evicted, 51);
        assert_eq!(map.len(), 49);
        assert_eq!(ids(&map).first(), Some(&52));
        assert_eq!(ids(&map).last(), Some(&100));
    }

    #[test]
    fn zero_cap_terminates_on_empty_map() {
        let mut map = map_of([1, 2]);
        assert_eq!(BoundEnforcer::new(0).trim(&mut map), 2);
        assert!(map.is_empty());
    }
}
