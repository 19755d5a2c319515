use std::sync::atomic::Ordering;

use crossbeam_epoch::{Atomic, Guard, Shared};

use crate::mapping::keyed_mapping::KeyedMapping;
use crate::node::Node;

pub(crate) const SLOTS: usize = 48;

const NO_SLOT: u8 = u8::MAX;

/// 256-entry byte-to-slot index over a compact child array. Inserts append,
/// seeks are two loads, and iteration walks the index table so it comes out
/// in ascending byte order.
pub(crate) struct IndexedMapping<V> {
    index: Box<[u8; 256]>,
    children: Box<[Atomic<Node<V>>; SLOTS]>,
    num_children: u8,
}

impl<V> IndexedMapping<V> {
    pub(crate) fn new() -> Self {
        Self {
            index: Box::new([NO_SLOT; 256]),
            children: Box::new(std::array::from_fn(|_| Atomic::null())),
            num_children: 0,
        }
    }

    pub(crate) fn from_keyed(source: &KeyedMapping<V, 16>, guard: &Guard) -> Self {
        let mut mapping = Self::new();
        for (key, child) in source.iter(guard) {
            mapping.set_child(key, child);
        }
        mapping
    }

    #[inline]
    pub(crate) fn seek_child<'g>(&self, key: u8, guard: &'g Guard) -> Shared<'g, Node<V>> {
        match self.index[key as usize] {
            NO_SLOT => Shared::null(),
            slot => self.children[slot as usize].load(Ordering::Relaxed, guard),
        }
    }

    /// Insert-or-overwrite on a private (unpublished) mapping.
    pub(crate) fn set_child(&mut self, key: u8, child: Shared<'_, Node<V>>) {
        match self.index[key as usize] {
            NO_SLOT => {
                let slot = self.num_children as usize;
                assert!(slot < SLOTS, "indexed mapping over capacity");
                self.index[key as usize] = slot as u8;
                self.children[slot] = Atomic::from(child);
                self.num_children += 1;
            }
            slot => self.children[slot as usize].store(child, Ordering::Relaxed),
        }
    }

    /// Same-class copy without `key`, compacting the surviving slots.
    pub(crate) fn without_child(&self, key: u8, guard: &Guard) -> Self {
        let mut mapping = Self::new();
        for (byte, child) in self.iter(guard) {
            if byte != key {
                mapping.set_child(byte, child);
            }
        }
        mapping
    }

    #[inline(always)]
    pub(crate) fn num_children(&self) -> usize {
        self.num_children as usize
    }

    pub(crate) fn iter<'g>(
        &'g self,
        guard: &'g Guard,
    ) -> impl Iterator<Item = (u8, Shared<'g, Node<V>>)> + 'g {
        (0usize..256).filter_map(move |byte| match self.index[byte] {
            NO_SLOT => None,
            slot => Some((
                byte as u8,
                self.children[slot as usize].load(Ordering::Relaxed, guard),
            )),
        })
    }
}

impl<V> Clone for IndexedMapping<V> {
    fn clone(&self) -> Self {
        Self {
            index: self.index.clone(),
            children: Box::new(std::array::from_fn(|i| self.children[i].clone())),
            num_children: self.num_children,
        }
    }
}
