use std::cmp::min;

/// A node's compressed key prefix: the span of key bytes the node covers,
/// excluding the edge byte that led to it from the parent.
#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) struct Prefix {
    data: Box<[u8]>,
}

impl Prefix {
    pub(crate) fn empty() -> Self {
        Self {
            data: Box::from(&[][..]),
        }
    }

    pub(crate) fn from_slice(src: &[u8]) -> Self {
        Self {
            data: Box::from(src),
        }
    }

    pub(crate) fn to_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline(always)]
    pub(crate) fn at(&self, pos: usize) -> u8 {
        assert!(pos < self.data.len());
        self.data[pos]
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    #[inline(always)]
    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of leading bytes shared with `tail`: the divergence length.
    pub(crate) fn common_prefix_len(&self, tail: &[u8]) -> usize {
        let len = min(self.data.len(), tail.len());
        let mut idx = 0;
        while idx < len {
            if self.data[idx] != tail[idx] {
                break;
            }
            idx += 1;
        }
        idx
    }

    pub(crate) fn before(&self, length: usize) -> Self {
        assert!(length <= self.data.len());
        Self::from_slice(&self.data[..length])
    }

    pub(crate) fn after(&self, start: usize) -> Self {
        assert!(start <= self.data.len());
        Self::from_slice(&self.data[start..])
    }

    /// `self` + `edge` + `suffix`, used when a removed node's lone child is
    /// folded back into the parent edge.
    pub(crate) fn join(&self, edge: u8, suffix: &Prefix) -> Self {
        let mut data = Vec::with_capacity(self.data.len() + 1 + suffix.len());
        data.extend_from_slice(&self.data);
        data.push(edge);
        data.extend_from_slice(suffix.to_slice());
        Self {
            data: data.into_boxed_slice(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Prefix;

    #[test]
    fn test_common_prefix_lengths() {
        let p = Prefix::from_slice(b"omato");
        assert_eq!(p.common_prefix_len(b"omato"), 5);
        assert_eq!(p.common_prefix_len(b"amale"), 0);
        assert_eq!(p.common_prefix_len(b"omelette"), 2);
        assert_eq!(p.common_prefix_len(b"om"), 2);
        assert_eq!(p.common_prefix_len(b""), 0);
        assert_eq!(Prefix::empty().common_prefix_len(b"anything"), 0);
    }

    #[test]
    fn test_slicing() {
        let p = Prefix::from_slice(b"estivate");
        assert_eq!(p.before(3).to_slice(), b"est");
        assert_eq!(p.after(3).to_slice(), b"ivate");
        assert_eq!(p.after(8).to_slice(), b"");
        assert_eq!(p.at(0), b'e');
    }

    #[test]
    fn test_join_rebuilds_compressed_path() {
        let parent = Prefix::from_slice(b"te");
        let child = Prefix::from_slice(b"t1234");
        let merged = parent.join(b's', &child);
        assert_eq!(merged.to_slice(), b"test1234");

        let merged = Prefix::empty().join(b'x', &Prefix::empty());
        assert_eq!(merged.to_slice(), b"x");
    }
}
