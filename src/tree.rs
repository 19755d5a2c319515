use crossbeam_epoch::{self as epoch, Guard, Owned, Shared};
use parking_lot_core::SpinWait;

use crate::iter::Iter;
use crate::mapping::Edges;
use crate::node::{Node, SEALED};
use crate::partial::Prefix;

/// A concurrent Adaptive Radix Tree over non-empty byte-string keys.
///
/// Readers never block and never retry; writers publish privately built
/// replacements through single-word CAS and retry on contention. Values are
/// opaque except for `Clone` (replacement nodes copy the value carried by a
/// node that readers may still hold) and `PartialEq` on [`Cart::swap`].
/// Displaced structure is reclaimed through epoch-based garbage collection,
/// so nothing is freed while a concurrent reader can still dereference it.
///
/// Keys are ordered bytewise; iteration is ascending. Clone values out of the
/// tree; wrap large values in `Arc`.
pub struct Cart<V> {
    root: Node<V>,
}

/// Where the locator stopped: the deepest node on the key's path, the node
/// holding the edge to it, the number of consumed key bytes, and the
/// divergence length into `current`'s prefix.
pub(crate) struct FindResult<'g, V> {
    pub(crate) parent: &'g Node<V>,
    pub(crate) current: Shared<'g, Node<V>>,
    pub(crate) pos: usize,
    pub(crate) dv: usize,
}

/// The mutually exclusive mutation cases, in precedence order.
enum Decision {
    Insert,
    Update,
    SplitTwoWay,
    SplitThreeWay,
}

/// One node on the seek path. `resume_after` limits traversal to child
/// edges strictly greater than the byte taken during the seek; `None`
/// means every child. `base_len` is the key-path length at the node.
pub(crate) struct SeekFrame<'g, V> {
    pub(crate) node: &'g Node<V>,
    pub(crate) resume_after: Option<u8>,
    pub(crate) base_len: usize,
}

/// A depth-first traversal positioned at a start key: the path stack
/// (deepest node last), the deepest node's full key, and that node's
/// value when its key is at or after the start key.
pub(crate) struct Seek<'g, V> {
    pub(crate) stack: Vec<SeekFrame<'g, V>>,
    pub(crate) key_buf: Vec<u8>,
    pub(crate) start_value: Option<&'g V>,
}

impl<'g, V> FindResult<'g, V> {
    pub(crate) fn current_node(&self) -> Option<&'g Node<V>> {
        if self.current.is_null() {
            None
        } else {
            Some(unsafe { self.current.deref() })
        }
    }

    /// True when the key ends exactly at `current`'s boundary. The divergence
    /// length is stale when the prefix is empty, hence the second arm.
    pub(crate) fn is_exact(&self, key: &[u8]) -> bool {
        match self.current_node() {
            Some(node) => {
                self.pos == key.len() && (self.dv == node.prefix.len() || node.prefix.is_empty())
            }
            None => false,
        }
    }

    fn decision(&self, key: &[u8]) -> Decision {
        if self.current.is_null() {
            debug_assert!(self.pos < key.len());
            return Decision::Insert;
        }
        if self.is_exact(key) {
            return Decision::Update;
        }
        // Non-exact match on an existing node means the locator stopped
        // inside its prefix: the key either ends at the divergence point or
        // continues past it.
        if key.len() - (self.pos + self.dv) == 0 {
            Decision::SplitTwoWay
        } else {
            Decision::SplitThreeWay
        }
    }
}

impl<V> Cart<V> {
    pub fn new() -> Self {
        Self {
            root: Node::new_root(),
        }
    }

    pub fn is_empty(&self) -> bool {
        let guard = epoch::pin();
        let snapshot = self.root.load_edges(&guard);
        unsafe { snapshot.deref() }.num_children() == 0
    }

    /// Descends from the root, consuming one edge byte per hop plus each
    /// node's prefix. Stops at a missing edge, at a prefix divergence, or
    /// when the key is exhausted.
    fn find<'g>(&'g self, key: &[u8], guard: &'g Guard) -> FindResult<'g, V> {
        debug_assert!(!key.is_empty());
        let mut parent: &'g Node<V> = &self.root;
        let mut pos = 0usize;
        let mut dv = 0usize;
        loop {
            let current = parent.seek_child(key[pos], guard);
            if current.is_null() {
                return FindResult {
                    parent,
                    current,
                    pos,
                    dv,
                };
            }
            let node = unsafe { current.deref() };
            pos += 1;
            if !node.prefix.is_empty() {
                dv = node.prefix.common_prefix_len(&key[pos..]);
                if node.prefix.len() > dv {
                    return FindResult {
                        parent,
                        current,
                        pos,
                        dv,
                    };
                }
                pos += dv;
            }
            if pos == key.len() {
                return FindResult {
                    parent,
                    current,
                    pos,
                    dv,
                };
            }
            parent = node;
        }
    }

    /// Positions a depth-first traversal so it emits every stored key at
    /// or after `from`, in ascending order. Walks `from`'s path recording
    /// each node with the edge byte it took, so traversal can resume
    /// through every ancestor's later siblings once the deepest matched
    /// subtree is exhausted. A subtree that diverges from `from` inside a
    /// prefix sorts entirely on one side of it, so a single byte
    /// comparison keeps or prunes it whole.
    pub(crate) fn seek<'g>(&'g self, from: Option<&[u8]>, guard: &'g Guard) -> Seek<'g, V> {
        let mut stack = Vec::new();
        let mut key_buf = Vec::new();
        let from = from.unwrap_or(&[]);
        if from.is_empty() {
            stack.push(SeekFrame {
                node: &self.root,
                resume_after: None,
                base_len: 0,
            });
            return Seek {
                stack,
                key_buf,
                start_value: None,
            };
        }
        let mut node: &'g Node<V> = &self.root;
        let mut pos = 0usize;
        loop {
            let current = node.seek_child(from[pos], guard);
            stack.push(SeekFrame {
                node,
                resume_after: Some(from[pos]),
                base_len: key_buf.len(),
            });
            if current.is_null() {
                return Seek {
                    stack,
                    key_buf,
                    start_value: None,
                };
            }
            let child = unsafe { current.deref() };
            key_buf.push(from[pos]);
            key_buf.extend_from_slice(child.prefix.to_slice());
            pos += 1;
            let dv = child.prefix.common_prefix_len(&from[pos..]);
            if dv == child.prefix.len() {
                pos += dv;
                if pos == from.len() {
                    // `from` ends exactly at this node's boundary; its
                    // value and whole subtree are in range.
                    stack.push(SeekFrame {
                        node: child,
                        resume_after: None,
                        base_len: key_buf.len(),
                    });
                    return Seek {
                        stack,
                        key_buf,
                        start_value: child.value.as_ref(),
                    };
                }
                node = child;
                continue;
            }
            // `from` diverges from (or ends inside) the prefix.
            if key_buf.as_slice() >= from {
                stack.push(SeekFrame {
                    node: child,
                    resume_after: None,
                    base_len: key_buf.len(),
                });
                return Seek {
                    stack,
                    key_buf,
                    start_value: child.value.as_ref(),
                };
            }
            return Seek {
                stack,
                key_buf,
                start_value: None,
            };
        }
    }
}

impl<V> Default for Cart<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> Cart<V> {
    /// Inserts or overwrites `key`. Returns `true` when this call's value
    /// was established. `false` only when the call started out creating new
    /// structure and a retry found the key exactly stored meanwhile: a
    /// concurrent writer claimed that slot, and overwriting a value this
    /// call never observed from a stale path would silently lose it. A call
    /// that began as an overwrite keeps retrying and wins some round.
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty; the empty key cannot be stored.
    pub fn insert(&self, key: &[u8], value: V) -> bool {
        assert!(!key.is_empty(), "empty keys cannot be stored");
        let guard = epoch::pin();
        let f = self.find(key, &guard);
        self.publish_with_retries(key, value, f, &guard)
    }

    /// Compare-and-swap on the value stored at `key`. `expected_old` of
    /// `None` means "expect no stored value"; otherwise the current value
    /// must compare equal. Among racing swaps naming the same expected prior
    /// value, at most one succeeds.
    ///
    /// Values change only by node replacement, so checking the expectation
    /// on the node a publish is then CASed against makes check and write
    /// atomic. A lost CAS means the state may have moved; re-finding and
    /// re-checking keeps the failure honest rather than spurious.
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty.
    pub fn swap(&self, key: &[u8], expected_old: Option<&V>, new: V) -> bool
    where
        V: PartialEq,
    {
        assert!(!key.is_empty(), "empty keys cannot be stored");
        let guard = epoch::pin();
        let mut spin = SpinWait::new();
        loop {
            let f = self.find(key, &guard);
            let current_value = if f.is_exact(key) {
                f.current_node().and_then(|node| node.value.as_ref())
            } else {
                None
            };
            match (current_value, expected_old) {
                (Some(_), None) => return false,
                (None, Some(_)) => return false,
                (Some(current), Some(expected)) if current != expected => return false,
                _ => {}
            }
            let published = match f.decision(key) {
                Decision::Insert => self.attempt_insert(key, new.clone(), &f, &guard),
                Decision::Update => self.attempt_update(key, new.clone(), &f, &guard),
                Decision::SplitTwoWay => {
                    self.attempt_split_two_way(key, new.clone(), &f, &guard)
                }
                Decision::SplitThreeWay => {
                    self.attempt_split_three_way(key, new.clone(), &f, &guard)
                }
            };
            if published {
                return true;
            }
            spin.spin();
        }
    }

    /// Pure read; never retries. Absent unless `key` ends exactly at a node
    /// holding a value (a valueless split intermediate is not a match).
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty.
    pub fn get(&self, key: &[u8]) -> Option<V> {
        assert!(!key.is_empty(), "empty keys cannot be stored");
        let guard = epoch::pin();
        let f = self.find(key, &guard);
        if f.is_exact(key) {
            f.current_node().and_then(|node| node.value.clone())
        } else {
            None
        }
    }

    /// Removes `key`'s value. Leaves are unlinked, a node left with one
    /// child is merged back into its edge (restoring the compressed path),
    /// and branch nodes only have their value cleared. Contention is retried
    /// internally; `true` means the key is absent afterward.
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty.
    pub fn remove(&self, key: &[u8]) -> bool {
        assert!(!key.is_empty(), "empty keys cannot be stored");
        let guard = epoch::pin();
        let mut spin = SpinWait::new();
        loop {
            let f = self.find(key, &guard);
            if !f.is_exact(key) {
                return true;
            }
            let current = unsafe { f.current.deref() };
            if current.value.is_none() {
                return true;
            }
            let edge = key[f.pos - (current.prefix.len() + 1)];
            let snapshot = current.load_edges(&guard);
            if snapshot.tag() == SEALED {
                // Another structural removal owns this node; wait it out.
                spin.spin();
                continue;
            }
            let removed = match unsafe { snapshot.deref() }.num_children() {
                0 => self.unlink_leaf(edge, &f, snapshot, &guard),
                1 => self.merge_lone_child(edge, &f, snapshot, &guard),
                _ => self.clear_value(edge, &f, &guard),
            };
            if removed {
                return true;
            }
            spin.spin();
        }
    }

    /// Calls `visit` for every stored key at or after `from` (the whole
    /// tree when `None`), in ascending byte order. Keys and values are
    /// borrowed for the duration of each call; no snapshot isolation is
    /// implied under concurrent mutation.
    pub fn iterate<F>(&self, from: Option<&[u8]>, mut visit: F)
    where
        F: FnMut(&[u8], &V),
    {
        let guard = epoch::pin();
        let Seek {
            mut stack,
            mut key_buf,
            start_value,
        } = self.seek(from, &guard);
        if let Some(value) = start_value {
            visit(&key_buf, value);
        }
        // Deepest node first, then each ancestor's later siblings.
        while let Some(frame) = stack.pop() {
            key_buf.truncate(frame.base_len);
            self.walk(frame.node, frame.resume_after, &mut key_buf, &mut visit, &guard);
        }
    }

    /// Lazy equivalent of [`Cart::iterate`] over the whole tree. The
    /// iterator pins an epoch guard for its lifetime, which holds up
    /// reclamation; drop it when done.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter::new(self, None)
    }

    /// Lazy iteration over keys at or after `from`.
    pub fn iter_from(&self, from: &[u8]) -> Iter<'_, V> {
        Iter::new(self, Some(from))
    }

    /// Depth-first emit-before-descend walk. `after` skips child edges at
    /// or below the given byte; it applies to `node`'s own children only,
    /// deeper levels always take everything.
    fn walk<F>(
        &self,
        node: &Node<V>,
        after: Option<u8>,
        key_buf: &mut Vec<u8>,
        visit: &mut F,
        guard: &Guard,
    ) where
        F: FnMut(&[u8], &V),
    {
        let snapshot = node.load_edges(guard);
        for (edge, child) in unsafe { snapshot.deref() }.iter(guard) {
            if let Some(after) = after {
                if edge <= after {
                    continue;
                }
            }
            let child = unsafe { child.deref() };
            let len_before = key_buf.len();
            key_buf.push(edge);
            key_buf.extend_from_slice(child.prefix.to_slice());
            if let Some(value) = child.value.as_ref() {
                visit(key_buf, value);
            }
            self.walk(child, None, key_buf, visit, guard);
            key_buf.truncate(len_before);
        }
    }

    /// The dispatch-and-retry loop behind `insert`. The first locate is the
    /// caller's; each failed publish re-locates. A call that began on a
    /// structural path (no exact match yet) and then finds one on a retry
    /// stops with failure instead of overwriting the concurrent winner; a
    /// call that began as an exact overwrite keeps contending until it wins
    /// a round.
    fn publish_with_retries<'g>(
        &'g self,
        key: &[u8],
        value: V,
        mut f: FindResult<'g, V>,
        guard: &'g Guard,
    ) -> bool {
        let mut spin = SpinWait::new();
        let initially_exact = f.is_exact(key);
        loop {
            if !initially_exact && f.is_exact(key) {
                return false;
            }
            let published = match f.decision(key) {
                Decision::Insert => self.attempt_insert(key, value.clone(), &f, guard),
                Decision::Update => self.attempt_update(key, value.clone(), &f, guard),
                Decision::SplitTwoWay => self.attempt_split_two_way(key, value.clone(), &f, guard),
                Decision::SplitThreeWay => {
                    self.attempt_split_three_way(key, value.clone(), &f, guard)
                }
            };
            if published {
                return true;
            }
            spin.spin();
            f = self.find(key, guard);
        }
    }

    /// Fresh leaf under `parent` at the next key byte; the leaf's prefix is
    /// the remainder after that byte.
    fn attempt_insert<'g>(
        &self,
        key: &[u8],
        value: V,
        f: &FindResult<'g, V>,
        guard: &'g Guard,
    ) -> bool {
        let leaf = Owned::new(Node::new_leaf(Prefix::from_slice(&key[f.pos + 1..]), value))
            .into_shared(guard);
        if f.parent.publish_child(key[f.pos], Shared::null(), leaf, guard) {
            return true;
        }
        // Never became visible; free it in place.
        unsafe { drop(leaf.into_owned()) };
        false
    }

    /// Same prefix, new value, same edge cell: publishes racing through the
    /// displaced node stay visible through the replacement.
    fn attempt_update<'g>(
        &self,
        key: &[u8],
        value: V,
        f: &FindResult<'g, V>,
        guard: &'g Guard,
    ) -> bool {
        let current = unsafe { f.current.deref() };
        let edge = key[f.pos - (current.prefix.len() + 1)];
        let replacement = Owned::new(Node::sharing_edges(
            current.prefix.clone(),
            Some(value),
            current.edges_handle(),
        ))
        .into_shared(guard);
        if f.parent.publish_child(edge, f.current, replacement, guard) {
            unsafe { guard.defer_destroy(f.current) };
            return true;
        }
        unsafe { drop(replacement.into_owned()) };
        false
    }

    /// The key exhausts inside `current`'s prefix: an intermediate carrying
    /// the new value takes the matched span, and the trimmed old node keeps
    /// the tail past the divergence byte (sharing the old edge cell).
    fn attempt_split_two_way<'g>(
        &self,
        key: &[u8],
        value: V,
        f: &FindResult<'g, V>,
        guard: &'g Guard,
    ) -> bool {
        let current = unsafe { f.current.deref() };
        let trimmed = Owned::new(Node::sharing_edges(
            current.prefix.after(f.dv + 1),
            current.value.clone(),
            current.edges_handle(),
        ))
        .into_shared(guard);
        let mut edges = Edges::empty4();
        edges.set_child(current.prefix.at(f.dv), trimmed);
        let intermediate = Owned::new(Node::new_inner(
            Prefix::from_slice(&key[f.pos..f.pos + f.dv]),
            Some(value),
            edges,
        ))
        .into_shared(guard);
        if f.parent.publish_child(key[f.pos - 1], f.current, intermediate, guard) {
            unsafe { guard.defer_destroy(f.current) };
            return true;
        }
        unsafe {
            drop(intermediate.into_owned());
            drop(trimmed.into_owned());
        }
        false
    }

    /// Key and prefix both continue past the divergence: a valueless
    /// intermediate takes the shared span, with the trimmed old node and a
    /// fresh leaf as its two children.
    fn attempt_split_three_way<'g>(
        &self,
        key: &[u8],
        value: V,
        f: &FindResult<'g, V>,
        guard: &'g Guard,
    ) -> bool {
        let current = unsafe { f.current.deref() };
        let trimmed = Owned::new(Node::sharing_edges(
            current.prefix.after(f.dv + 1),
            current.value.clone(),
            current.edges_handle(),
        ))
        .into_shared(guard);
        let leaf = Owned::new(Node::new_leaf(
            Prefix::from_slice(&key[f.pos + f.dv + 1..]),
            value,
        ))
        .into_shared(guard);
        let mut edges = Edges::empty4();
        edges.set_child(current.prefix.at(f.dv), trimmed);
        edges.set_child(key[f.pos + f.dv], leaf);
        let intermediate =
            Owned::new(Node::new_inner(current.prefix.before(f.dv), None, edges)).into_shared(guard);
        if f.parent.publish_child(key[f.pos - 1], f.current, intermediate, guard) {
            unsafe { guard.defer_destroy(f.current) };
            return true;
        }
        unsafe {
            drop(intermediate.into_owned());
            drop(leaf.into_owned());
            drop(trimmed.into_owned());
        }
        false
    }

    /// Childless node: seal, then remove the parent's edge slot.
    fn unlink_leaf<'g>(
        &self,
        edge: u8,
        f: &FindResult<'g, V>,
        snapshot: Shared<'g, Edges<V>>,
        guard: &'g Guard,
    ) -> bool {
        let current = unsafe { f.current.deref() };
        if !current.mark(snapshot, guard) {
            return false;
        }
        if f.parent.publish_child(edge, f.current, Shared::null(), guard) {
            unsafe { guard.defer_destroy(f.current) };
            return true;
        }
        current.unmark(snapshot, guard);
        false
    }

    /// One child left: replace the node with a merge of itself and the
    /// child, restoring the compressed path. The seal freezes the child set,
    /// so the lone entry cannot change or have its value replaced between
    /// the snapshot and the publish.
    fn merge_lone_child<'g>(
        &self,
        edge: u8,
        f: &FindResult<'g, V>,
        snapshot: Shared<'g, Edges<V>>,
        guard: &'g Guard,
    ) -> bool {
        let current = unsafe { f.current.deref() };
        if !current.mark(snapshot, guard) {
            return false;
        }
        let (child_edge, child_ptr) = unsafe { snapshot.deref() }.lone_child(guard);
        let child = unsafe { child_ptr.deref() };
        let merged = Owned::new(Node::sharing_edges(
            current.prefix.join(child_edge, &child.prefix),
            child.value.clone(),
            child.edges_handle(),
        ))
        .into_shared(guard);
        if f.parent.publish_child(edge, f.current, merged, guard) {
            unsafe {
                guard.defer_destroy(f.current);
                guard.defer_destroy(child_ptr);
            }
            return true;
        }
        unsafe { drop(merged.into_owned()) };
        current.unmark(snapshot, guard);
        false
    }

    /// Branch point: clear the value, keep the children. Linearizes on the
    /// parent cell exactly like a value update, so no seal is needed.
    fn clear_value<'g>(&self, edge: u8, f: &FindResult<'g, V>, guard: &'g Guard) -> bool {
        let current = unsafe { f.current.deref() };
        let cleared = Owned::new(Node::sharing_edges(
            current.prefix.clone(),
            None,
            current.edges_handle(),
        ))
        .into_shared(guard);
        if f.parent.publish_child(edge, f.current, cleared, guard) {
            unsafe { guard.defer_destroy(f.current) };
            return true;
        }
        unsafe { drop(cleared.into_owned()) };
        false
    }
}

impl<V> Drop for Cart<V> {
    fn drop(&mut self) {
        // Exclusive access: free everything still linked. Nodes already
        // retired to the collector are separate allocations and are not
        // reachable from here.
        unsafe { self.root.drop_subtree() };
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rand::{thread_rng, Rng};

    use super::Cart;

    fn collect(tree: &Cart<u32>, from: Option<&[u8]>) -> Vec<(Vec<u8>, u32)> {
        let mut out = Vec::new();
        tree.iterate(from, |k, v| out.push((k.to_vec(), *v)));
        out
    }

    #[test]
    fn test_insert_get_simple() {
        let tree = Cart::new();
        assert!(tree.is_empty());
        assert!(tree.insert(b"test", 1));
        assert!(!tree.is_empty());
        assert_eq!(tree.get(b"test"), Some(1));
        assert_eq!(tree.get(b"tes"), None);
        assert_eq!(tree.get(b"testx"), None);
        assert_eq!(tree.get(b"x"), None);
    }

    #[test]
    fn test_prefix_independence() {
        let tree = Cart::new();
        assert!(tree.insert(b"test", 1));
        assert!(tree.insert(b"test1234", 2));
        assert_eq!(tree.get(b"test"), Some(1));
        assert_eq!(tree.get(b"test1234"), Some(2));

        // And in the other insertion order, which goes through a two-way
        // split instead of a child insert.
        let tree = Cart::new();
        assert!(tree.insert(b"test1234", 2));
        assert!(tree.insert(b"test", 1));
        assert_eq!(tree.get(b"test"), Some(1));
        assert_eq!(tree.get(b"test1234"), Some(2));
    }

    #[test]
    fn test_three_way_split() {
        let tree = Cart::new();
        assert!(tree.insert(b"tomato", 1));
        assert!(tree.insert(b"tamale", 2));
        assert_eq!(tree.get(b"tomato"), Some(1));
        assert_eq!(tree.get(b"tamale"), Some(2));
        // The shared-prefix intermediate exists but holds no value.
        assert_eq!(tree.get(b"t"), None);
        assert_eq!(tree.get(b"to"), None);
    }

    #[test]
    fn test_update_is_idempotent_overwrite() {
        let tree = Cart::new();
        assert!(tree.insert(b"key", 1));
        assert!(tree.insert(b"key", 2));
        assert_eq!(tree.get(b"key"), Some(2));
        assert_eq!(collect(&tree, None).len(), 1);
    }

    #[test]
    #[should_panic(expected = "empty keys cannot be stored")]
    fn test_empty_key_panics() {
        let tree = Cart::new();
        tree.insert(b"", 1);
    }

    #[test]
    fn test_ordered_iteration() {
        let tree = Cart::new();
        assert!(tree.insert(b"bad", 1));
        assert!(tree.insert(b"too", 2));
        assert!(tree.insert(b"rad", 3));
        let keys: Vec<Vec<u8>> = collect(&tree, None).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"bad".to_vec(), b"rad".to_vec(), b"too".to_vec()]);
    }

    #[test]
    fn test_adaptive_growth_transparent() {
        let tree = Cart::new();
        // All keys share the first byte, so the fan-out sits on one inner
        // node and climbs through every capacity class.
        for byte in 0..=255u8 {
            assert!(tree.insert(&[b'k', byte], byte as u32));
        }
        for byte in 0..=255u8 {
            assert_eq!(tree.get(&[b'k', byte]), Some(byte as u32));
        }
        let pairs = collect(&tree, None);
        assert_eq!(pairs.len(), 256);
        assert!(pairs.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_word_family() {
        let words: &[&[u8]] = &[
            b"unsophisticated",
            b"unsophistication",
            b"unsophisticate",
            b"unsophisticatedly",
            b"unsound",
            b"unsounded",
            b"unsoundly",
            b"unsoundness",
        ];
        let tree = Cart::new();
        for (i, word) in words.iter().enumerate() {
            assert!(tree.insert(word, i as u32));
        }
        for (i, word) in words.iter().enumerate() {
            assert_eq!(tree.get(word), Some(i as u32), "word {i} lost");
        }
        let keys: Vec<Vec<u8>> = collect(&tree, None).into_iter().map(|(k, _)| k).collect();
        let mut sorted: Vec<Vec<u8>> = words.iter().map(|w| w.to_vec()).collect();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_remove_leaf_and_absent() {
        let tree = Cart::new();
        assert!(tree.remove(b"nothing"));
        assert!(tree.insert(b"bad", 1));
        assert!(tree.insert(b"bat", 2));
        assert!(tree.remove(b"bad"));
        assert_eq!(tree.get(b"bad"), None);
        assert_eq!(tree.get(b"bat"), Some(2));
        assert!(tree.remove(b"bad"));
        assert!(tree.remove(b"bat"));
        assert_eq!(tree.get(b"bat"), None);
        assert_eq!(collect(&tree, None), vec![]);
    }

    #[test]
    fn test_remove_merges_lone_child() {
        let tree = Cart::new();
        assert!(tree.insert(b"test", 1));
        assert!(tree.insert(b"test1234", 2));
        assert!(tree.remove(b"test"));
        assert_eq!(tree.get(b"test"), None);
        assert_eq!(tree.get(b"test1234"), Some(2));
        // The compressed path is restored: a fresh sibling splits it again.
        assert!(tree.insert(b"test12xy", 3));
        assert_eq!(tree.get(b"test1234"), Some(2));
        assert_eq!(tree.get(b"test12xy"), Some(3));
    }

    #[test]
    fn test_remove_branch_clears_value_only() {
        let tree = Cart::new();
        assert!(tree.insert(b"te", 1));
        assert!(tree.insert(b"test", 2));
        assert!(tree.insert(b"team", 3));
        assert!(tree.remove(b"te"));
        assert_eq!(tree.get(b"te"), None);
        assert_eq!(tree.get(b"test"), Some(2));
        assert_eq!(tree.get(b"team"), Some(3));
        assert_eq!(collect(&tree, None).len(), 2);
    }

    #[test]
    fn test_swap_preconditions() {
        let tree = Cart::new();
        assert!(!tree.swap(b"k", Some(&1), 2));
        assert!(tree.swap(b"k", None, 1));
        assert_eq!(tree.get(b"k"), Some(1));
        assert!(!tree.swap(b"k", None, 2));
        assert!(!tree.swap(b"k", Some(&9), 2));
        assert!(tree.swap(b"k", Some(&1), 2));
        assert_eq!(tree.get(b"k"), Some(2));
    }

    #[test]
    fn test_swap_fills_valueless_intermediate() {
        let tree = Cart::new();
        assert!(tree.insert(b"tomato", 1));
        assert!(tree.insert(b"tamale", 2));
        // The split intermediate at "t" exists but stores nothing, so an
        // expect-absent swap may claim it.
        assert!(tree.swap(b"t", None, 9));
        assert_eq!(tree.get(b"t"), Some(9));
        assert_eq!(tree.get(b"tomato"), Some(1));
        assert_eq!(tree.get(b"tamale"), Some(2));
    }

    #[test]
    fn test_iterate_from() {
        let tree = Cart::new();
        for (i, key) in [&b"water"[..], b"waterfall", b"waterfront", b"wax"]
            .iter()
            .enumerate()
        {
            assert!(tree.insert(key, i as u32));
        }
        let all = vec![
            b"water".to_vec(),
            b"waterfall".to_vec(),
            b"waterfront".to_vec(),
            b"wax".to_vec(),
        ];

        let keys = |from: &[u8]| -> Vec<Vec<u8>> {
            collect(&tree, Some(from)).into_iter().map(|(k, _)| k).collect()
        };

        // From an exact key: that key and every later one.
        assert_eq!(keys(b"water"), all);
        // From a bare prefix of the stored keys.
        assert_eq!(keys(b"wat"), all);
        // From a leaf deep in one branch: later siblings at every
        // ancestor still follow.
        assert_eq!(
            keys(b"waterfall"),
            vec![
                b"waterfall".to_vec(),
                b"waterfront".to_vec(),
                b"wax".to_vec()
            ]
        );
        // Tails that sort past a whole branch resume at the next sibling.
        assert_eq!(keys(b"watz"), vec![b"wax".to_vec()]);
        assert_eq!(keys(b"waterg"), vec![b"wax".to_vec()]);
        // A tail that sorts before the matched branch keeps everything.
        assert_eq!(keys(b"wata"), all);
        // Past every stored key.
        assert_eq!(keys(b"wx"), Vec::<Vec<u8>>::new());
        assert_eq!(keys(b"z"), Vec::<Vec<u8>>::new());
    }

    #[test]
    fn test_random_against_btree_model() {
        let mut rng = thread_rng();
        let tree = Cart::new();
        let mut model = BTreeMap::new();

        for _ in 0..4000 {
            let len = rng.gen_range(1..=8);
            let key: Vec<u8> = (0..len).map(|_| rng.gen_range(b'a'..=b'f')).collect();
            match rng.gen_range(0..3) {
                0 | 1 => {
                    let value: u32 = rng.gen();
                    assert!(tree.insert(&key, value));
                    model.insert(key, value);
                }
                _ => {
                    assert!(tree.remove(&key));
                    model.remove(&key);
                }
            }
        }

        for (key, value) in &model {
            assert_eq!(tree.get(key), Some(*value), "mismatch at {key:?}");
        }
        let pairs = collect(&tree, None);
        let expected: Vec<(Vec<u8>, u32)> =
            model.iter().map(|(k, v)| (k.clone(), *v)).collect();
        assert_eq!(pairs, expected);
    }

    #[test]
    fn test_deep_random_removal_converges_empty() {
        let mut rng = thread_rng();
        let tree = Cart::new();
        let mut keys = Vec::new();
        for _ in 0..500 {
            let len = rng.gen_range(1..=12);
            let key: Vec<u8> = (0..len).map(|_| rng.gen_range(0..=255u8)).collect();
            tree.insert(&key, 1);
            keys.push(key);
        }
        for key in &keys {
            assert!(tree.remove(key));
            assert_eq!(tree.get(key), None);
        }
        assert_eq!(collect(&tree, None), vec![]);
    }
}
