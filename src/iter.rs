use std::marker::PhantomData;

use crossbeam_epoch::{self as epoch, Guard};

use crate::node::Node;
use crate::tree::Cart;

/// One visited node: its materialized child list, the cursor into it, and
/// the key-path length at the node (everything past it belongs to siblings).
struct Frame<V> {
    children: Vec<(u8, *const Node<V>)>,
    next: usize,
    base_len: usize,
}

/// Lazy ascending iterator over a [`Cart`], yielding owned keys and cloned
/// values.
///
/// The iterator pins an epoch guard for its whole lifetime, so every node it
/// can still step onto stays allocated even when concurrent writers displace
/// it. A long-lived iterator therefore delays reclamation of everything
/// retired since it was created; drop it when done rather than parking it.
pub struct Iter<'t, V> {
    guard: Guard,
    frames: Vec<Frame<V>>,
    key_buf: Vec<u8>,
    pending: Option<*const V>,
    _tree: PhantomData<&'t Cart<V>>,
}

fn children_of<V>(guard: &Guard, node: &Node<V>) -> Vec<(u8, *const Node<V>)> {
    let snapshot = node.load_edges(guard);
    unsafe { snapshot.deref() }
        .iter(guard)
        .map(|(edge, child)| (edge, child.as_raw()))
        .collect()
}

impl<'t, V> Iter<'t, V> {
    pub(crate) fn new(tree: &'t Cart<V>, from: Option<&[u8]>) -> Self {
        let guard = epoch::pin();
        let (frames, key_buf, pending) = {
            let seek = tree.seek(from, &guard);
            // One frame per node on the seek path, deepest last, each
            // cursor positioned past the edge the seek took.
            let frames: Vec<Frame<V>> = seek
                .stack
                .iter()
                .map(|frame| {
                    let children = children_of(&guard, frame.node);
                    let next = match frame.resume_after {
                        None => 0,
                        Some(after) => children.partition_point(|(edge, _)| *edge <= after),
                    };
                    Frame {
                        children,
                        next,
                        base_len: frame.base_len,
                    }
                })
                .collect();
            let pending = seek.start_value.map(|value| value as *const V);
            (frames, seek.key_buf, pending)
        };
        Self {
            guard,
            frames,
            key_buf,
            pending,
            _tree: PhantomData,
        }
    }
}

impl<'t, V: Clone> Iterator for Iter<'t, V> {
    type Item = (Vec<u8>, V);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(value) = self.pending.take() {
            // Still valid: the owned guard has pinned the epoch since
            // before the pointer was taken.
            return Some((self.key_buf.clone(), unsafe { &*value }.clone()));
        }
        loop {
            let frame = self.frames.last_mut()?;
            if frame.next == frame.children.len() {
                self.frames.pop();
                continue;
            }
            let (edge, ptr) = frame.children[frame.next];
            frame.next += 1;
            let base_len = frame.base_len;

            self.key_buf.truncate(base_len);
            self.key_buf.push(edge);
            let child = unsafe { &*ptr };
            self.key_buf.extend_from_slice(child.prefix.to_slice());
            let children = children_of(&self.guard, child);
            self.frames.push(Frame {
                children,
                next: 0,
                base_len: self.key_buf.len(),
            });
            if let Some(value) = child.value.as_ref() {
                return Some((self.key_buf.clone(), value.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::tree::Cart;

    #[test]
    fn test_lazy_matches_eager() {
        let tree = Cart::new();
        for (i, key) in [&b"bad"[..], b"too", b"rad", b"t", b"toon"]
            .iter()
            .enumerate()
        {
            assert!(tree.insert(key, i as u32));
        }
        let mut eager = Vec::new();
        tree.iterate(None, |k, v| eager.push((k.to_vec(), *v)));
        let lazy: Vec<(Vec<u8>, u32)> = tree.iter().collect();
        assert_eq!(lazy, eager);

        for from in [&b"r"[..], b"t", b"toa", b"tz"] {
            let mut eager = Vec::new();
            tree.iterate(Some(from), |k, v| eager.push((k.to_vec(), *v)));
            let lazy: Vec<(Vec<u8>, u32)> = tree.iter_from(from).collect();
            assert_eq!(lazy, eager, "bound {from:?}");
        }
    }

    #[test]
    fn test_lazy_from_bound() {
        let tree = Cart::new();
        for key in [&b"water"[..], b"waterfall", b"waterfront", b"wax"] {
            assert!(tree.insert(key, 0u32));
        }
        // Keys at or after the bound, including siblings of the bound's
        // ancestors.
        let keys: Vec<Vec<u8>> = tree.iter_from(b"waterfall").map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                b"waterfall".to_vec(),
                b"waterfront".to_vec(),
                b"wax".to_vec()
            ]
        );
        assert_eq!(tree.iter_from(b"wombat").count(), 0);
    }

    #[test]
    fn test_partial_consumption() {
        let tree = Cart::new();
        for byte in 0..64u8 {
            assert!(tree.insert(&[b'p', byte], byte as u32));
        }
        let first: Vec<(Vec<u8>, u32)> = tree.iter().take(3).collect();
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].0, vec![b'p', 0]);
        // Dropping a half-consumed iterator releases its guard and leaves
        // the tree fully usable.
        assert!(tree.insert(b"q", 99));
        assert_eq!(tree.get(b"q"), Some(99));
    }
}
