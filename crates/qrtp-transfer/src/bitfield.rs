//! Received-chunk tracking for the indexed variant.
//!
//! Totals are only known once the first frame of a transfer arrives, so the
//! word vector is sized on construction and on `reset`. Callers bound the
//! total before sizing from wire input.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkBitfield {
    words: Vec<u64>,
    total: usize,
    received: usize,
}

impl ChunkBitfield {
    /// Create a bitfield tracking `total` chunks.
    pub fn new(total: usize) -> Self {
        Self {
            words: vec![0u64; total.div_ceil(64)],
            total,
            received: 0,
        }
    }

    /// Mark a chunk as received. Returns true if it was newly received.
    /// Indices at or past `total` are ignored.
    #[inline]
    pub fn set(&mut self, index: usize) -> bool {
        if index >= self.total {
            return false;
        }
        let mask = 1u64 << (index % 64);
        let word = &mut self.words[index / 64];
        if *word & mask != 0 {
            return false;
        }
        *word |= mask;
        self.received += 1;
        true
    }

    #[inline]
    pub fn get(&self, index: usize) -> bool {
        if index >= self.total {
            return false;
        }
        self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// True once every chunk is in. An empty bitfield is never complete.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.received >= self.total
    }

    #[inline]
    pub fn received(&self) -> usize {
        self.received
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Indices not yet received, ascending.
    pub fn missing(&self) -> Vec<usize> {
        (0..self.total).filter(|&i| !self.get(i)).collect()
    }

    /// Indices received so far, ascending.
    pub fn received_indices(&self) -> Vec<usize> {
        (0..self.total).filter(|&i| self.get(i)).collect()
    }

    /// Clear and resize for a new transfer.
    pub fn reset(&mut self, total: usize) {
        self.words.clear();
        self.words.resize(total.div_ceil(64), 0);
        self.total = total;
        self.received = 0;
    }
}
