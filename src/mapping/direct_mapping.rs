use std::sync::atomic::Ordering;

use crossbeam_epoch::{Atomic, Guard, Shared};

use crate::mapping::indexed_mapping::IndexedMapping;
use crate::node::Node;

/// Direct-indexed child array for the widest capacity class. Never grows and
/// never reports full.
pub(crate) struct DirectMapping<V> {
    children: Box<[Atomic<Node<V>>; 256]>,
    num_children: u16,
}

impl<V> DirectMapping<V> {
    pub(crate) fn new() -> Self {
        Self {
            children: Box::new(std::array::from_fn(|_| Atomic::null())),
            num_children: 0,
        }
    }

    pub(crate) fn from_indexed(source: &IndexedMapping<V>, guard: &Guard) -> Self {
        let mut mapping = Self::new();
        for (key, child) in source.iter(guard) {
            mapping.set_child(key, child);
        }
        mapping
    }

    #[inline]
    pub(crate) fn seek_child<'g>(&self, key: u8, guard: &'g Guard) -> Shared<'g, Node<V>> {
        self.children[key as usize].load(Ordering::Relaxed, guard)
    }

    /// Insert-or-overwrite on a private (unpublished) mapping.
    pub(crate) fn set_child(&mut self, key: u8, child: Shared<'_, Node<V>>) {
        // Private copy, no concurrent access.
        let occupied = unsafe {
            !self.children[key as usize]
                .load(Ordering::Relaxed, crossbeam_epoch::unprotected())
                .is_null()
        };
        if !occupied {
            self.num_children += 1;
        }
        self.children[key as usize].store(child, Ordering::Relaxed);
    }

    /// Same-class copy without `key`.
    pub(crate) fn without_child(&self, key: u8) -> Self {
        let mut mapping = self.clone();
        mapping.children[key as usize].store(Shared::null(), Ordering::Relaxed);
        mapping.num_children -= 1;
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
        (0usize..256).filter_map(move |byte| {
            let child = self.children[byte].load(Ordering::Relaxed, guard);
            (!child.is_null()).then_some((byte as u8, child))
        })
    }
}

impl<V> Clone for DirectMapping<V> {
    fn clone(&self) -> Self {
        Self {
            children: Box::new(std::array::from_fn(|i| self.children[i].clone())),
            num_children: self.num_children,
        }
    }
}
