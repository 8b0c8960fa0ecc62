//! # Hierarchy Manager
//!
//! Structural edits and traversal of the album forest.
//!
//! Albums form a forest through `parent_id` back-references held in the
//! [`CollectionStore`]. This module never stores parent or child pointers of
//! its own; it keeps a reverse (parent → children) index derived from the
//! store and rebuilds it whenever the store's structural revision moves.
//!
//! ## Reparenting
//!
//! [`HierarchyManager::reparent`] moves a set of source albums under one
//! target. Every source is validated before any parent pointer changes:
//!
//! 1. the target must exist (`TargetNotFound`)
//! 2. the target must not be one of the sources (`SelfParenting`)
//! 3. walking up from the target must never reach a source
//!    (`CyclicDependency`)
//! 4. every source must exist (`SourceNotFound`)
//!
//! Parent walks carry a visited set and a step bound equal to the album
//! count. A revisit is reported as a cycle, so corrupted data fails closed.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::MergeError;
use crate::models::{Album, AlbumId};
use crate::store::CollectionStore;

/// Outcome of walking up a parent chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Walk {
    /// The sought ancestor is on the chain.
    Found,
    /// Reached a root (or a missing album) without finding it.
    Exhausted,
    /// The chain revisits an album or exceeds the step bound.
    Cycle,
}

/// Walk the parent chain above `start`, looking for `ancestor`.
///
/// `start` itself is never compared against `ancestor`. With no ancestor the
/// walk only checks that the chain terminates.
pub(crate) fn walk_parents(
    store: &CollectionStore,
    start: AlbumId,
    ancestor: Option<AlbumId>,
) -> Walk {
    let bound = store.num_albums() + 1;
    let mut visited = HashSet::with_capacity(bound.min(64));
    let mut current = start;

    for _ in 0..bound {
        if !visited.insert(current) {
            return Walk::Cycle;
        }
        let Some(album) = store.album(current) else {
            return Walk::Exhausted;
        };
        match album.parent_id {
            None => return Walk::Exhausted,
            Some(parent) if Some(parent) == ancestor => return Walk::Found,
            Some(parent) => current = parent,
        }
    }

    Walk::Cycle
}

#[derive(Debug, Default)]
struct ChildIndex {
    store: u64,
    revision: u64,
    roots: Vec<AlbumId>,
    children: HashMap<AlbumId, Vec<AlbumId>>,
}

impl ChildIndex {
    fn build(store: &CollectionStore) -> Self {
        let mut index = ChildIndex {
            store: store.instance_id(),
            revision: store.revision(),
            ..ChildIndex::default()
        };
        for album in store.albums() {
            match album.parent_id {
                Some(parent) if store.contains_album(parent) => {
                    index.children.entry(parent).or_default().push(album.id)
                }
                _ => index.roots.push(album.id),
            }
        }
        index
    }

    fn is_current(&self, store: &CollectionStore) -> bool {
        self.store == store.instance_id() && self.revision == store.revision()
    }
}

/// Validates and applies structural edits to the album forest.
#[derive(Debug, Default)]
pub struct HierarchyManager {
    index: Mutex<Option<ChildIndex>>,
}

impl HierarchyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every album in `sources` a child of `target`.
    ///
    /// Duplicate source ids are ignored. Either every source is reparented
    /// or, on error, none is.
    pub fn reparent(
        &self,
        store: &mut CollectionStore,
        sources: &[AlbumId],
        target: AlbumId,
    ) -> Result<(), MergeError> {
        let mut unique = Vec::with_capacity(sources.len());
        for source in sources {
            if !unique.contains(source) {
                unique.push(*source);
            }
        }

        if let Err(err) = self.validate_reparent(store, &unique, target) {
            warn!(target_id = %target, error = %err, "Reparent rejected");
            return Err(err);
        }
        if unique.is_empty() {
            return Ok(());
        }

        store.set_parents(&unique, target);
        debug!(target_id = %target, sources = unique.len(), "Albums reparented");
        Ok(())
    }

    /// Run every reparent check without mutating anything.
    pub fn validate_reparent(
        &self,
        store: &CollectionStore,
        sources: &[AlbumId],
        target: AlbumId,
    ) -> Result<(), MergeError> {
        let Some(target_album) = store.album(target) else {
            return Err(MergeError::TargetNotFound { target_id: target });
        };

        if sources.contains(&target) {
            return Err(MergeError::SelfParenting { target_id: target });
        }

        for source in sources {
            if self.is_descendant(store, target, *source) {
                let source_name = store
                    .album(*source)
                    .map(|album| album.name.clone())
                    .unwrap_or_default();
                return Err(MergeError::CyclicDependency {
                    source_id: *source,
                    target_id: target,
                    source_name,
                    target_name: target_album.name.clone(),
                });
            }
        }

        if let Some(missing) = sources.iter().find(|id| !store.contains_album(**id)) {
            return Err(MergeError::SourceNotFound {
                source_id: *missing,
            });
        }

        Ok(())
    }

    /// Whether `ancestor` is reachable by walking up from `candidate`.
    ///
    /// An album is not its own descendant. A corrupted (cyclic) chain
    /// answers `true`.
    pub fn is_descendant(
        &self,
        store: &CollectionStore,
        candidate: AlbumId,
        ancestor: AlbumId,
    ) -> bool {
        if candidate == ancestor {
            return false;
        }
        matches!(
            walk_parents(store, candidate, Some(ancestor)),
            Walk::Found | Walk::Cycle
        )
    }

    /// Parents of `id`, nearest first, stopping at the root or at a revisit.
    pub fn ancestors<'a>(&self, store: &'a CollectionStore, id: AlbumId) -> Vec<&'a Album> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = store.album(id).and_then(|album| album.parent_id);

        while let Some(parent_id) = current {
            if !seen.insert(parent_id) {
                break;
            }
            let Some(parent) = store.album(parent_id) else {
                break;
            };
            chain.push(parent);
            current = parent.parent_id;
        }
        chain
    }

    /// Direct children of `id` in insertion order.
    pub fn children(&self, store: &CollectionStore, id: AlbumId) -> Vec<AlbumId> {
        self.with_index(store, |index| {
            index.children.get(&id).cloned().unwrap_or_default()
        })
    }

    /// Albums without a parent, in insertion order.
    pub fn roots(&self, store: &CollectionStore) -> Vec<AlbumId> {
        self.with_index(store, |index| index.roots.clone())
    }

    /// Albums that `sources` could legally be moved under.
    pub fn reparent_candidates(
        &self,
        store: &CollectionStore,
        sources: &[AlbumId],
    ) -> Vec<AlbumId> {
        store
            .albums()
            .map(|album| album.id)
            .filter(|candidate| !sources.contains(candidate))
            .filter(|candidate| {
                sources
                    .iter()
                    .all(|source| !self.is_descendant(store, *candidate, *source))
            })
            .collect()
    }

    fn with_index<T>(&self, store: &CollectionStore, read: impl FnOnce(&ChildIndex) -> T) -> T {
        let mut guard = self.index.lock();
        let stale = guard
            .as_ref()
            .map_or(true, |index| !index.is_current(store));
        if stale {
            *guard = Some(ChildIndex::build(store));
        }
        match guard.as_ref() {
            Some(index) => read(index),
            None => read(&ChildIndex::build(store)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LibraryError;
    use crate::models::TrackDraft;
    use bridge_traits::{NoopReleaser, ReleaseLedger, SequentialIdGenerator};
    use std::sync::Arc;

    fn store() -> CollectionStore {
        CollectionStore::new(
            Arc::new(SequentialIdGenerator::new()),
            ReleaseLedger::new(Arc::new(NoopReleaser)),
        )
    }

    /// A → B → C (C is a child of B, B is a child of A).
    fn chain(store: &mut CollectionStore, hierarchy: &HierarchyManager) -> [AlbumId; 3] {
        let a = store.add_album("A").unwrap();
        let b = store.add_album("B").unwrap();
        let c = store.add_album("C").unwrap();
        hierarchy.reparent(store, &[b], a).unwrap();
        hierarchy.reparent(store, &[c], b).unwrap();
        [a, b, c]
    }

    #[test]
    fn test_child_index_is_not_shared_between_stores() {
        let hierarchy = HierarchyManager::new();
        let mut first = store();
        let mut second = store();
        // Tracks consume ids without touching the album revision.
        second.add_track(TrackDraft::new("Filler", "Band"));
        let [a, b, _] = chain(&mut first, &hierarchy);
        let [x, y, _] = chain(&mut second, &hierarchy);
        assert_eq!(first.revision(), second.revision());
        assert_ne!(a, x);

        assert_eq!(hierarchy.children(&first, a), vec![b]);
        assert_eq!(hierarchy.roots(&second), vec![x]);
        assert_eq!(hierarchy.children(&second, x), vec![y]);
        assert_eq!(hierarchy.roots(&first), vec![a]);
    }

    #[test]
    fn test_reparent_under_target() {
        let mut store = store();
        let hierarchy = HierarchyManager::new();
        let rock = store.add_album("Rock").unwrap();
        let live = store.add_album("Live").unwrap();
        let demos = store.add_album("Demos").unwrap();

        hierarchy.reparent(&mut store, &[live, demos], rock).unwrap();

        assert_eq!(store.album(live).unwrap().parent_id, Some(rock));
        assert_eq!(store.album(demos).unwrap().parent_id, Some(rock));
        assert_eq!(hierarchy.children(&store, rock), vec![live, demos]);
        assert_eq!(hierarchy.roots(&store), vec![rock]);
        store.check_invariants();
    }

    #[test]
    fn test_missing_target_checked_first() {
        let mut store = store();
        let hierarchy = HierarchyManager::new();
        let a = store.add_album("A").unwrap();
        let gone = store.add_album("Gone").unwrap();
        store.remove_album(gone).unwrap();

        // Self-parenting would also apply; target existence wins.
        let err = hierarchy.reparent(&mut store, &[a, gone], gone).unwrap_err();
        assert_eq!(err, MergeError::TargetNotFound { target_id: gone });
    }

    #[test]
    fn test_self_parenting_rejected() {
        let mut store = store();
        let hierarchy = HierarchyManager::new();
        let a = store.add_album("A").unwrap();
        let b = store.add_album("B").unwrap();

        let err = hierarchy.reparent(&mut store, &[a, b], b).unwrap_err();
        assert_eq!(err, MergeError::SelfParenting { target_id: b });
        assert_eq!(store.album(a).unwrap().parent_id, None);
    }

    #[test]
    fn test_parenting_under_own_descendant_is_cyclic() {
        let mut store = store();
        let hierarchy = HierarchyManager::new();
        let [a, _b, c] = chain(&mut store, &hierarchy);

        let err = hierarchy.reparent(&mut store, &[a], c).unwrap_err();
        match &err {
            MergeError::CyclicDependency {
                source_id,
                target_id,
                source_name,
                target_name,
            } => {
                assert_eq!(*source_id, a);
                assert_eq!(*target_id, c);
                assert_eq!(source_name, "A");
                assert_eq!(target_name, "C");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("\"C\" is already a descendant of \"A\""));
        assert_eq!(store.album(a).unwrap().parent_id, None);
    }

    #[test]
    fn test_reparent_is_all_or_nothing() {
        let mut store = store();
        let hierarchy = HierarchyManager::new();
        let [a, b, c] = chain(&mut store, &hierarchy);
        let free = store.add_album("Free").unwrap();
        let revision = store.revision();

        // `free` alone would be fine under `b`, but `a` is b's ancestor.
        let err = hierarchy.reparent(&mut store, &[free, a], b).unwrap_err();
        assert!(matches!(err, MergeError::CyclicDependency { .. }));
        assert_eq!(store.album(free).unwrap().parent_id, None);
        assert_eq!(store.album(c).unwrap().parent_id, Some(b));
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_missing_source_rejected_without_partial_apply() {
        let mut store = store();
        let hierarchy = HierarchyManager::new();
        let target = store.add_album("Target").unwrap();
        let keep = store.add_album("Keep").unwrap();
        let gone = store.add_album("Gone").unwrap();
        store.remove_album(gone).unwrap();

        let err = hierarchy
            .reparent(&mut store, &[keep, gone], target)
            .unwrap_err();
        assert_eq!(err, MergeError::SourceNotFound { source_id: gone });
        assert_eq!(store.album(keep).unwrap().parent_id, None);
        assert!(LibraryError::from(err).is_not_found());
    }

    #[test]
    fn test_moving_a_subtree_sideways_is_allowed() {
        let mut store = store();
        let hierarchy = HierarchyManager::new();
        let [a, b, c] = chain(&mut store, &hierarchy);
        let other = store.add_album("Other").unwrap();

        hierarchy.reparent(&mut store, &[b], other).unwrap();
        assert_eq!(hierarchy.children(&store, a), Vec::<AlbumId>::new());
        assert_eq!(hierarchy.children(&store, other), vec![b]);
        assert_eq!(hierarchy.children(&store, b), vec![c]);
        store.check_invariants();
    }

    #[test]
    fn test_is_descendant_and_ancestors() {
        let mut store = store();
        let hierarchy = HierarchyManager::new();
        let [a, b, c] = chain(&mut store, &hierarchy);

        assert!(hierarchy.is_descendant(&store, c, a));
        assert!(hierarchy.is_descendant(&store, b, a));
        assert!(!hierarchy.is_descendant(&store, a, c));
        assert!(!hierarchy.is_descendant(&store, a, a));

        let names: Vec<_> = hierarchy
            .ancestors(&store, c)
            .iter()
            .map(|album| album.name.as_str())
            .collect();
        assert_eq!(names, vec!["B", "A"]);
        assert!(hierarchy.ancestors(&store, a).is_empty());
    }

    #[test]
    fn test_corrupted_cycle_fails_closed() {
        let mut store = store();
        let hierarchy = HierarchyManager::new();
        let x = store.add_album("X").unwrap();
        let y = store.add_album("Y").unwrap();
        let target = store.add_album("T").unwrap();
        // Bypass validation to simulate corrupted data: X ⇄ Y, T under X.
        store.set_parents(&[x], y);
        store.set_parents(&[y], x);
        store.set_parents(&[target], x);
        let outsider = store.add_album("Outsider").unwrap();

        assert!(hierarchy.is_descendant(&store, target, outsider));
        let err = hierarchy
            .reparent(&mut store, &[outsider], target)
            .unwrap_err();
        assert!(matches!(err, MergeError::CyclicDependency { .. }));
        assert_eq!(hierarchy.ancestors(&store, target).len(), 2);
    }

    #[test]
    fn test_walks_terminate_within_album_count() {
        let mut store = store();
        let hierarchy = HierarchyManager::new();
        let mut ids = Vec::new();
        for i in 0..20 {
            ids.push(store.add_album(&format!("Album {i}")).unwrap());
        }
        for pair in ids.windows(2) {
            hierarchy.reparent(&mut store, &[pair[1]], pair[0]).unwrap();
        }

        assert_eq!(
            walk_parents(&store, ids[19], None),
            Walk::Exhausted
        );
        assert_eq!(hierarchy.ancestors(&store, ids[19]).len(), 19);
        let err = hierarchy.reparent(&mut store, &[ids[0]], ids[19]).unwrap_err();
        assert!(matches!(err, MergeError::CyclicDependency { .. }));
    }

    #[test]
    fn test_reparent_candidates_exclude_sources_and_descendants() {
        let mut store = store();
        let hierarchy = HierarchyManager::new();
        let [a, b, c] = chain(&mut store, &hierarchy);
        let other = store.add_album("Other").unwrap();

        assert_eq!(hierarchy.reparent_candidates(&store, &[b]), vec![a, other]);
        assert_eq!(hierarchy.reparent_candidates(&store, &[a]), vec![other]);
        assert_eq!(
            hierarchy.reparent_candidates(&store, &[c]),
            vec![a, b, other]
        );
    }

    #[test]
    fn test_index_rebuilt_after_album_removal() {
        let mut store = store();
        let hierarchy = HierarchyManager::new();
        let [a, b, c] = chain(&mut store, &hierarchy);
        assert_eq!(hierarchy.roots(&store), vec![a]);

        store.remove_album(b).unwrap();
        assert_eq!(hierarchy.roots(&store), vec![a, c]);
        assert!(hierarchy.children(&store, a).is_empty());
    }
}
