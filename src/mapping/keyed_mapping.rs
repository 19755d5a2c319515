use std::sync::atomic::Ordering;

use crossbeam_epoch::{Atomic, Guard, Shared};

use crate::node::Node;

/// Sorted parallel key/child arrays for the two smallest capacity classes.
/// WIDTH 4 seeks by linear scan, WIDTH 16 by binary search; inserts shift the
/// tail right so the arrays stay sorted and iteration is a straight walk.
pub(crate) struct KeyedMapping<V, const WIDTH: usize> {
    keys: [u8; WIDTH],
    children: Box<[Atomic<Node<V>>; WIDTH]>,
    num_children: u8,
}

impl<V, const WIDTH: usize> KeyedMapping<V, WIDTH> {
    pub(crate) fn new() -> Self {
        Self {
            keys: [0; WIDTH],
            children: Box::new(std::array::from_fn(|_| Atomic::null())),
            num_children: 0,
        }
    }

    /// Copies the entries of a narrower mapping, preserving sort order.
    pub(crate) fn from_smaller<const N: usize>(source: &KeyedMapping<V, N>) -> Self {
        assert!(N <= WIDTH);
        let mut mapping = Self::new();
        for i in 0..source.num_children as usize {
            mapping.keys[i] = source.keys[i];
            mapping.children[i] = source.children[i].clone();
        }
        mapping.num_children = source.num_children;
        mapping
    }

    fn search(&self, key: u8) -> Result<usize, usize> {
        let n = self.num_children as usize;
        if WIDTH <= 4 {
            for (i, k) in self.keys[..n].iter().enumerate() {
                match k.cmp(&key) {
                    std::cmp::Ordering::Equal => return Ok(i),
                    std::cmp::Ordering::Greater => return Err(i),
                    std::cmp::Ordering::Less => {}
                }
            }
            Err(n)
        } else {
            self.keys[..n].binary_search(&key)
        }
    }

    #[inline]
    pub(crate) fn seek_child<'g>(&self, key: u8, guard: &'g Guard) -> Shared<'g, Node<V>> {
        match self.search(key) {
            Ok(i) => self.children[i].load(Ordering::Relaxed, guard),
            Err(_) => Shared::null(),
        }
    }

    /// Insert-or-overwrite on a private (unpublished) mapping.
    pub(crate) fn set_child(&mut self, key: u8, child: Shared<'_, Node<V>>) {
        match self.search(key) {
            Ok(i) => self.children[i].store(child, Ordering::Relaxed),
            Err(i) => {
                let n = self.num_children as usize;
                assert!(n < WIDTH, "keyed mapping over capacity");
                for j in (i..n).rev() {
                    self.keys[j + 1] = self.keys[j];
                    self.children[j + 1] = self.children[j].clone();
                }
                self.keys[i] = key;
                self.children[i] = Atomic::from(child);
                self.num_children += 1;
            }
        }
    }

    /// Same-class copy without `key`, compacting the surviving entries.
    pub(crate) fn without_child(&self, key: u8) -> Self {
        let mut mapping = Self::new();
        for i in 0..self.num_children as usize {
            if self.keys[i] == key {
                continue;
            }
            let n = mapping.num_children as usize;
            mapping.keys[n] = self.keys[i];
            mapping.children[n] = self.children[i].clone();
            mapping.num_children += 1;
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
        (0..self.num_children as usize)
            .map(move |i| (self.keys[i], self.children[i].load(Ordering::Relaxed, guard)))
    }
}

impl<V, const WIDTH: usize> Clone for KeyedMapping<V, WIDTH> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys,
            children: Box::new(std::array::from_fn(|i| self.children[i].clone())),
            num_children: self.num_children,
        }
    }
}
