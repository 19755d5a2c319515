pub(crate) mod direct_mapping;
pub(crate) mod indexed_mapping;
pub(crate) mod keyed_mapping;

use crossbeam_epoch::{Guard, Shared};

use crate::node::Node;
use direct_mapping::DirectMapping;
use indexed_mapping::IndexedMapping;
use keyed_mapping::KeyedMapping;

/// A node's child set in one of the four capacity classes.
///
/// Published sets are immutable: every edit builds a replacement that the
/// owning edge cell swaps in with a single CAS, so a reader either sees the
/// whole old set or the whole new one. Slot loads are Relaxed throughout;
/// ordering is carried by the cell load.
pub(crate) enum Edges<V> {
    Edges4(KeyedMapping<V, 4>),
    Edges16(KeyedMapping<V, 16>),
    Edges48(IndexedMapping<V>),
    Edges256(DirectMapping<V>),
}

impl<V> Edges<V> {
    pub(crate) fn empty4() -> Self {
        Edges::Edges4(KeyedMapping::new())
    }

    pub(crate) fn empty256() -> Self {
        Edges::Edges256(DirectMapping::new())
    }

    #[inline]
    pub(crate) fn seek_child<'g>(&self, key: u8, guard: &'g Guard) -> Shared<'g, Node<V>> {
        match self {
            Edges::Edges4(m) => m.seek_child(key, guard),
            Edges::Edges16(m) => m.seek_child(key, guard),
            Edges::Edges48(m) => m.seek_child(key, guard),
            Edges::Edges256(m) => m.seek_child(key, guard),
        }
    }

    pub(crate) fn num_children(&self) -> usize {
        match self {
            Edges::Edges4(m) => m.num_children(),
            Edges::Edges16(m) => m.num_children(),
            Edges::Edges48(m) => m.num_children(),
            Edges::Edges256(m) => m.num_children(),
        }
    }

    pub(crate) fn is_full(&self) -> bool {
        match self {
            Edges::Edges4(m) => m.num_children() == 4,
            Edges::Edges16(m) => m.num_children() == 16,
            Edges::Edges48(m) => m.num_children() == indexed_mapping::SLOTS,
            Edges::Edges256(_) => false,
        }
    }

    /// Insert-or-overwrite on a private (unpublished) set.
    pub(crate) fn set_child(&mut self, key: u8, child: Shared<'_, Node<V>>) {
        match self {
            Edges::Edges4(m) => m.set_child(key, child),
            Edges::Edges16(m) => m.set_child(key, child),
            Edges::Edges48(m) => m.set_child(key, child),
            Edges::Edges256(m) => m.set_child(key, child),
        }
    }

    /// Same-class copy without `key`.
    pub(crate) fn without_child(&self, key: u8, guard: &Guard) -> Self {
        match self {
            Edges::Edges4(m) => Edges::Edges4(m.without_child(key)),
            Edges::Edges16(m) => Edges::Edges16(m.without_child(key)),
            Edges::Edges48(m) => Edges::Edges48(m.without_child(key, guard)),
            Edges::Edges256(m) => Edges::Edges256(m.without_child(key)),
        }
    }

    /// Copy into the next capacity class, entries preserved in byte order.
    pub(crate) fn grow(&self, guard: &Guard) -> Self {
        match self {
            Edges::Edges4(m) => Edges::Edges16(KeyedMapping::from_smaller(m)),
            Edges::Edges16(m) => Edges::Edges48(IndexedMapping::from_keyed(m, guard)),
            Edges::Edges48(m) => Edges::Edges256(DirectMapping::from_indexed(m, guard)),
            Edges::Edges256(_) => unreachable!("should never grow a 256-way edge set"),
        }
    }

    /// Children in ascending byte order.
    pub(crate) fn iter<'g>(
        &'g self,
        guard: &'g Guard,
    ) -> Box<dyn Iterator<Item = (u8, Shared<'g, Node<V>>)> + 'g> {
        match self {
            Edges::Edges4(m) => Box::new(m.iter(guard)),
            Edges::Edges16(m) => Box::new(m.iter(guard)),
            Edges::Edges48(m) => Box::new(m.iter(guard)),
            Edges::Edges256(m) => Box::new(m.iter(guard)),
        }
    }

    /// The single entry of a one-child set.
    pub(crate) fn lone_child<'g>(&'g self, guard: &'g Guard) -> (u8, Shared<'g, Node<V>>) {
        debug_assert_eq!(self.num_children(), 1);
        self.iter(guard)
            .next()
            .expect("lone_child on an empty edge set")
    }
}

impl<V> Clone for Edges<V> {
    fn clone(&self) -> Self {
        match self {
            Edges::Edges4(m) => Edges::Edges4(m.clone()),
            Edges::Edges16(m) => Edges::Edges16(m.clone()),
            Edges::Edges48(m) => Edges::Edges48(m.clone()),
            Edges::Edges256(m) => Edges::Edges256(m.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_epoch::{self as epoch, Owned};

    use super::Edges;
    use crate::node::Node;
    use crate::partial::Prefix;

    #[test]
    fn test_growth_ladder_keeps_children() {
        let guard = epoch::pin();
        let mut edges = Edges::<u32>::empty4();
        let mut leaves = Vec::new();
        for byte in 0..=255u8 {
            if edges.is_full() {
                edges = edges.grow(&guard);
            }
            let leaf =
                Owned::new(Node::new_leaf(Prefix::empty(), byte as u32)).into_shared(&guard);
            leaves.push(leaf);
            edges.set_child(byte, leaf);

            match edges.num_children() {
                n if n <= 4 => assert!(matches!(edges, Edges::Edges4(_))),
                n if n <= 16 => assert!(matches!(edges, Edges::Edges16(_))),
                n if n <= 48 => assert!(matches!(edges, Edges::Edges48(_))),
                _ => assert!(matches!(edges, Edges::Edges256(_))),
            }
        }
        assert_eq!(edges.num_children(), 256);
        assert!(!edges.is_full());
        for byte in 0..=255u8 {
            assert_eq!(edges.seek_child(byte, &guard), leaves[byte as usize]);
        }
        let order: Vec<u8> = edges.iter(&guard).map(|(b, _)| b).collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));

        for leaf in leaves {
            unsafe { drop(leaf.into_owned()) };
        }
    }

    #[test]
    fn test_lone_child() {
        let guard = epoch::pin();
        let mut edges = Edges::<u32>::empty4();
        let leaf = Owned::new(Node::new_leaf(Prefix::from_slice(b"xyz"), 7)).into_shared(&guard);
        edges.set_child(b'q', leaf);
        let (byte, child) = edges.lone_child(&guard);
        assert_eq!(byte, b'q');
        assert_eq!(child, leaf);
        unsafe { drop(leaf.into_owned()) };
    }
}
