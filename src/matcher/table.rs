// Block index over the old buffer.
//
// The old buffer is cut into non-overlapping `window`-byte blocks and each
// block's buzhash selects a slot in a prime-sized table.  Slots store
// `offset + 1` so that 0 means "empty".  Collisions get one linear probe and
// are otherwise dropped: the index is approximate, never exhaustive.

use log::debug;

use super::rolling::RollingHash;
use crate::error::{DiffError, alloc_zeroed};

/// Table sizes.  The first prime strictly above four slots per block wins.
const PRIMES: [usize; 26] = [
    65537, 98317, 147481, 221227, 331841, 497771, 746659, 1120001, 1680013, 2520031, 3780053,
    5670089, 8505137, 12757739, 19136609, 28704913, 43057369, 64586087, 96879131, 145318741,
    217978121, 326967209, 490450837, 735676303, 1103514463, 1655271719,
];

/// Size used when the old buffer outgrows the prime ladder.
const MAX_SLOTS: usize = 0xFFFF_FFFF;

/// Slot count for an old buffer of `old_len` bytes.
pub fn table_size(old_len: usize, window: usize) -> usize {
    let wanted = old_len.div_ceil(window).saturating_mul(4);
    PRIMES
        .iter()
        .copied()
        .find(|&p| wanted < p)
        .unwrap_or(MAX_SLOTS)
}

#[inline(always)]
fn next_slot(key: usize, size: usize) -> usize {
    if key + 1 == size { 0 } else { key + 1 }
}

/// Hash index of old-buffer blocks.
pub struct HashIndex {
    /// `slots[k] = offset + 1`, or 0 when empty.
    slots: Vec<usize>,
    window: usize,
    entries: usize,
}

impl HashIndex {
    /// Index every complete block of `old`.
    ///
    /// An old buffer shorter than one window yields an empty index that
    /// never reports a candidate.
    pub fn build(old: &[u8], hasher: &RollingHash) -> Result<Self, DiffError> {
        let window = hasher.window();
        if old.len() < window {
            return Ok(Self {
                slots: Vec::new(),
                window,
                entries: 0,
            });
        }

        let size = table_size(old.len(), window);
        let mut slots: Vec<usize> = alloc_zeroed(size, "hash index")?;
        let mut entries = 0usize;

        for (block_no, block) in old.chunks_exact(window).enumerate() {
            let mut key = hasher.checksum(block) as usize % size;
            let head = slots[key];
            if head != 0 {
                let probe = next_slot(key, size);
                if slots[probe] != 0 {
                    continue;
                }
                // Same content already reachable from the primary slot.
                if old[head - 1..head - 1 + window] == *block {
                    continue;
                }
                key = probe;
            }
            slots[key] = block_no * window + 1;
            entries += 1;
        }

        debug_assert!(slots.iter().all(|&slot| slot <= old.len()));

        debug!(
            "hash index: {} bytes, {} blocks of {}, {} slots, {} stored",
            old.len(),
            old.len() / window,
            window,
            size,
            entries
        );

        Ok(Self {
            slots,
            window,
            entries,
        })
    }

    /// Offset of an old block whose bytes equal `needle`, given the hash of
    /// `needle`.  Checks the primary slot, then its probe.
    #[inline]
    pub fn find(&self, old: &[u8], hash: u32, needle: &[u8]) -> Option<usize> {
        debug_assert_eq!(needle.len(), self.window);
        if self.slots.is_empty() {
            return None;
        }
        let size = self.slots.len();
        let key = hash as usize % size;

        let primary = self.slots[key];
        if primary == 0 {
            return None;
        }
        if holds(old, primary - 1, needle) {
            return Some(primary - 1);
        }

        let probe = self.slots[next_slot(key, size)];
        if probe != 0 && holds(old, probe - 1, needle) {
            Some(probe - 1)
        } else {
            None
        }
    }

    /// True when no block was indexed.
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Number of stored blocks.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Number of slots.
    pub fn size(&self) -> usize {
        self.slots.len()
    }
}

#[inline(always)]
fn holds(old: &[u8], pos: usize, needle: &[u8]) -> bool {
    old.get(pos..pos + needle.len()) == Some(needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distinct_blocks(count: usize, window: usize) -> Vec<u8> {
        let mut s = 0x1234_5678u64;
        (0..count * window)
            .map(|_| {
                s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
                (s >> 33) as u8
            })
            .collect()
    }

    #[test]
    fn ladder_selection() {
        assert_eq!(table_size(0, 16), 65537);
        assert_eq!(table_size(16 * 16384, 16), 65537);
        assert_eq!(table_size(16 * 16384 + 1, 16), 98317);
        assert_eq!(table_size(16 * 16385, 16), 98317);
        assert_eq!(table_size(usize::MAX / 2, 16), MAX_SLOTS);
    }

    #[test]
    fn short_old_has_empty_index() {
        let hasher = RollingHash::new(16);
        let idx = HashIndex::build(b"short", &hasher).unwrap();
        assert!(idx.is_empty());
        assert_eq!(idx.size(), 0);
        assert_eq!(idx.find(b"short", 0, &[0u8; 16]), None);
    }

    #[test]
    fn every_distinct_block_is_found() {
        let hasher = RollingHash::new(16);
        let old = distinct_blocks(200, 16);
        let idx = HashIndex::build(&old, &hasher).unwrap();
        assert_eq!(idx.size(), 65537);

        let mut found = 0;
        for (n, block) in old.chunks_exact(16).enumerate() {
            if let Some(pos) = idx.find(&old, hasher.checksum(block), block) {
                assert_eq!(&old[pos..pos + 16], block);
                if pos == n * 16 {
                    found += 1;
                }
            }
        }
        // With 200 blocks in 65537 slots collisions are rare enough that
        // at most a handful may be dropped.
        assert!(found >= 195, "only {found} of 200 blocks indexed");
    }

    #[test]
    fn duplicate_block_keeps_first_offset() {
        let hasher = RollingHash::new(16);
        let mut old = Vec::new();
        old.extend_from_slice(b"0123456789abcdef");
        old.extend_from_slice(b"0123456789abcdef");
        let idx = HashIndex::build(&old, &hasher).unwrap();
        assert_eq!(idx.entries(), 1);
        let block = &old[..16];
        assert_eq!(idx.find(&old, hasher.checksum(block), block), Some(0));
    }

    #[test]
    fn hash_alias_is_rejected() {
        let hasher = RollingHash::new(16);
        let old = distinct_blocks(4, 16);
        let idx = HashIndex::build(&old, &hasher).unwrap();
        let block = &old[16..32];
        let mut other = block.to_vec();
        other[5] ^= 0x80;
        // Correct slot, wrong bytes.
        assert_eq!(idx.find(&old, hasher.checksum(block), &other), None);
    }

    #[test]
    fn stored_offsets_stay_inside_old() {
        let hasher = RollingHash::new(16);
        let old = distinct_blocks(300, 16);
        let idx = HashIndex::build(&old, &hasher).unwrap();
        assert!(idx.slots.iter().all(|&slot| slot <= old.len()));
        assert_eq!(idx.slots.iter().filter(|&&slot| slot != 0).count(), idx.entries());
    }

    #[test]
    fn trailing_partial_block_is_not_indexed() {
        let hasher = RollingHash::new(16);
        let mut old = distinct_blocks(1, 16);
        old.extend_from_slice(b"tail-bytes");
        let idx = HashIndex::build(&old, &hasher).unwrap();
        assert_eq!(idx.entries(), 1);
    }
}
