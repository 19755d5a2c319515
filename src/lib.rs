//! A concurrent, ordered, byte-keyed Adaptive Radix Tree.
//!
//! Nodes adapt their fan-out through four capacity classes (4, 16, 48, 256)
//! and compress single-descendant chains into per-node prefixes. Readers are
//! wait-free pointer chases; writers build replacement nodes privately and
//! publish them with a single compare-and-swap, retrying on contention.
//! Memory displaced by writers is reclaimed through epoch-based garbage
//! collection ([`crossbeam_epoch`]), so readers never observe a freed node.
//!
//! ```
//! use cart::Cart;
//!
//! let tree = Cart::new();
//! tree.insert(b"tomato", 1);
//! tree.insert(b"tamale", 2);
//! assert_eq!(tree.get(b"tamale"), Some(2));
//!
//! let keys: Vec<Vec<u8>> = tree.iter().map(|(k, _)| k).collect();
//! assert_eq!(keys, vec![b"tamale".to_vec(), b"tomato".to_vec()]);
//! ```

mod iter;
mod mapping;
mod node;
mod partial;
mod tree;

pub use iter::Iter;
pub use tree::Cart;
