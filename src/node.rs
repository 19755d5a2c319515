use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_epoch::{Atomic, Guard, Owned, Shared};

use crate::mapping::Edges;
use crate::partial::Prefix;

/// Tag bit on a sealed edge cell. Sealing precedes a structural removal:
/// while the bit is set every publish on the node fails and its writer goes
/// back through the locator, so nothing can be inserted into (or replaced
/// under) a node that is about to be bypassed. Readers ignore the tag.
pub(crate) const SEALED: usize = 1;

/// The single atomic word through which a node's current child set is
/// published. Cells are shared: a node built to replace another (value
/// update, split trim, value clear, merge) holds the same cell, so a child
/// published through the displaced node stays visible through its successor.
pub(crate) struct EdgeCell<V> {
    current: Atomic<Edges<V>>,
}

impl<V> EdgeCell<V> {
    fn new(edges: Edges<V>) -> Self {
        Self {
            current: Atomic::new(edges),
        }
    }
}

impl<V> Drop for EdgeCell<V> {
    fn drop(&mut self) {
        // Last handle: nothing links here anymore and no reader can still be
        // pinned on the snapshot. Frees the set itself; child nodes are owned
        // by the tree teardown, not the set.
        let snapshot = std::mem::replace(&mut self.current, Atomic::null());
        unsafe {
            let shared = snapshot.load(Ordering::Relaxed, crossbeam_epoch::unprotected());
            if !shared.is_null() {
                drop(shared.into_owned());
            }
        }
    }
}

pub(crate) struct Node<V> {
    pub(crate) prefix: Prefix,
    pub(crate) value: Option<V>,
    edges: Arc<EdgeCell<V>>,
}

impl<V> Node<V> {
    /// The one capacity-256 node with an empty prefix and no value; created
    /// at tree construction and never replaced.
    pub(crate) fn new_root() -> Self {
        Self {
            prefix: Prefix::empty(),
            value: None,
            edges: Arc::new(EdgeCell::new(Edges::empty256())),
        }
    }

    pub(crate) fn new_leaf(prefix: Prefix, value: V) -> Self {
        Self {
            prefix,
            value: Some(value),
            edges: Arc::new(EdgeCell::new(Edges::empty4())),
        }
    }

    /// Fresh node over a privately built child set (split intermediates).
    pub(crate) fn new_inner(prefix: Prefix, value: Option<V>, edges: Edges<V>) -> Self {
        Self {
            prefix,
            value,
            edges: Arc::new(EdgeCell::new(edges)),
        }
    }

    /// Replacement node adopting an existing cell. Publishes racing through
    /// the displaced node land in the shared cell and stay visible here.
    pub(crate) fn sharing_edges(prefix: Prefix, value: Option<V>, edges: Arc<EdgeCell<V>>) -> Self {
        Self {
            prefix,
            value,
            edges,
        }
    }

    pub(crate) fn edges_handle(&self) -> Arc<EdgeCell<V>> {
        Arc::clone(&self.edges)
    }

    #[inline]
    pub(crate) fn load_edges<'g>(&self, guard: &'g Guard) -> Shared<'g, Edges<V>> {
        self.edges.current.load(Ordering::SeqCst, guard)
    }

    #[inline]
    pub(crate) fn seek_child<'g>(&self, key: u8, guard: &'g Guard) -> Shared<'g, Node<V>> {
        let snapshot = self.load_edges(guard);
        unsafe { snapshot.deref() }.seek_child(key, guard)
    }

    /// The linearization point for every structural edit.
    ///
    /// Succeeds only if the cell is unsealed, the slot for `key` holds
    /// exactly `expected` (pointer identity; null means "expect absent"),
    /// and the cell still holds the snapshot the check was made against.
    /// A null `new_child` removes the slot; a full set grows one class when
    /// `key` is new. The displaced snapshot is retired through the epoch
    /// collector, never freed in place.
    pub(crate) fn publish_child<'g>(
        &self,
        key: u8,
        expected: Shared<'g, Node<V>>,
        new_child: Shared<'g, Node<V>>,
        guard: &'g Guard,
    ) -> bool {
        let snapshot = self.load_edges(guard);
        if snapshot.tag() == SEALED {
            return false;
        }
        let edges = unsafe { snapshot.deref() };
        let existing = edges.seek_child(key, guard);
        if existing != expected {
            return false;
        }
        let next = if new_child.is_null() {
            edges.without_child(key, guard)
        } else if edges.is_full() && existing.is_null() {
            let mut grown = edges.grow(guard);
            grown.set_child(key, new_child);
            grown
        } else {
            let mut copy = edges.clone();
            copy.set_child(key, new_child);
            copy
        };
        match self.edges.current.compare_exchange(
            snapshot,
            Owned::new(next),
            Ordering::SeqCst,
            Ordering::SeqCst,
            guard,
        ) {
            Ok(_) => {
                unsafe { guard.defer_destroy(snapshot) };
                true
            }
            Err(_) => false,
        }
    }

    /// Seal the cell ahead of a structural removal. Fails if the snapshot
    /// moved (or another deleter sealed first); the caller re-runs the
    /// locator.
    pub(crate) fn mark<'g>(&self, snapshot: Shared<'g, Edges<V>>, guard: &'g Guard) -> bool {
        debug_assert_eq!(snapshot.tag(), 0);
        self.edges
            .current
            .compare_exchange(
                snapshot,
                snapshot.with_tag(SEALED),
                Ordering::SeqCst,
                Ordering::SeqCst,
                guard,
            )
            .is_ok()
    }

    /// Reopen a sealed cell after a failed removal. Only the sealer can
    /// change a sealed cell, so this cannot lose.
    pub(crate) fn unmark<'g>(&self, snapshot: Shared<'g, Edges<V>>, guard: &'g Guard) {
        let restored = self.edges.current.compare_exchange(
            snapshot.with_tag(SEALED),
            snapshot,
            Ordering::SeqCst,
            Ordering::SeqCst,
            guard,
        );
        debug_assert!(restored.is_ok());
        let _ = restored;
    }

    /// Frees every node reachable below this one. Tree teardown only: the
    /// caller must have exclusive access, with no guards pinned on the tree.
    pub(crate) unsafe fn drop_subtree(&self) {
        let guard = crossbeam_epoch::unprotected();
        let snapshot = self.edges.current.load(Ordering::Relaxed, guard);
        if snapshot.is_null() {
            return;
        }
        for (_, child) in snapshot.deref().iter(guard) {
            if child.is_null() {
                continue;
            }
            let child = child.into_owned();
            child.drop_subtree();
            drop(child);
        }
    }
}
