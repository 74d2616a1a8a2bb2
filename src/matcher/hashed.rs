// Rolling-hash matcher.
//
// Walks the new buffer one byte at a time, keeping the buzhash of the
// window at the scan position current.  Each position is looked up in the
// block index; a validated hit is extended forward and compared with a
// second anchor `3 * window` bytes ahead, which catches matches whose
// first window is not block-aligned in the old buffer.  The best candidate
// is held until it is good enough, then checked against the previous
// alignment so that runs the encoder would copy anyway are skipped.

use super::config::MatcherConfig;
use super::rolling::RollingHash;
use super::table::HashIndex;
use super::{Found, Matcher, match_len};
use crate::error::DiffError;
use crate::extend::ContinuationScore;

/// Best candidate seen since the last acceptance attempt.
#[derive(Debug, Clone, Copy, Default)]
struct Candidate {
    scan: usize,
    pos: usize,
    len: usize,
}

/// Approximate matcher over a block index of the old buffer.
pub struct HashMatcher {
    index: HashIndex,
    hasher: RollingHash,
    config: MatcherConfig,
}

impl HashMatcher {
    /// Index `old`.  Fails only when the table cannot be allocated.
    pub fn build(old: &[u8], config: &MatcherConfig) -> Result<Self, DiffError> {
        config.validate()?;
        let hasher = RollingHash::new(config.window);
        let index = HashIndex::build(old, &hasher)?;
        Ok(Self {
            index,
            hasher,
            config: *config,
        })
    }

    /// Longest validated match at `scan`, if the index knows the window there.
    fn candidate(&self, old: &[u8], new: &[u8], scan: usize, hash: u32) -> Option<Candidate> {
        let w = self.hasher.window();
        let mut pos = self.index.find(old, hash, &new[scan..scan + w])?;
        let mut len = w + match_len(&old[pos + w..], &new[scan + w..]);

        // Second anchor further ahead on the same diagonal.
        if scan + 4 * w <= new.len() {
            let anchor = scan + 3 * w;
            let anchor_hash = self.hasher.checksum(&new[anchor..]);
            if let Some(found) = self.index.find(old, anchor_hash, &new[anchor..anchor + w]) {
                if found > 3 * w {
                    let start = found - 3 * w;
                    if start != pos {
                        let alt = match_len(&old[start..], &new[scan..]);
                        if alt > len {
                            pos = start;
                            len = alt;
                        }
                    }
                }
            }
        }

        Some(Candidate { scan, pos, len })
    }
}

impl Matcher for HashMatcher {
    fn find_next(&self, old: &[u8], new: &[u8], last_offset: isize, scan: usize) -> Found {
        let w = self.hasher.window();
        if self.index.is_empty() || new.len() <= w {
            return Found::exhausted(new.len());
        }
        let limit = new.len() - w;
        let accept_len = self.config.accept_len;

        let mut scan = scan;
        let mut scan_start = scan;
        let mut hash = if scan < limit {
            self.hasher.checksum(&new[scan..])
        } else {
            0
        };
        let mut best = Candidate::default();
        let mut score = ContinuationScore::default();

        loop {
            if scan >= limit {
                if best.len < accept_len {
                    return Found::exhausted(new.len());
                }
            } else {
                if let Some(cand) = self.candidate(old, new, scan, hash) {
                    if cand.len > best.len {
                        best = cand;
                    }
                }
                if best.len < accept_len || scan - best.scan < w {
                    hash = self.hasher.roll(hash, new[scan], new[scan + w]);
                    scan += 1;
                    continue;
                }
            }

            let Candidate {
                scan: mut at,
                mut pos,
                mut len,
            } = best;

            // Already on the previous diagonal: the encoder carries it.
            if at.checked_add_signed(last_offset) == Some(pos) {
                scan = at + len;
                scan_start = scan;
                if scan < limit {
                    hash = self.hasher.checksum(&new[scan..]);
                }
                best.len = 0;
                continue;
            }

            let mut room = at - scan_start;
            while room > 0 && pos > 0 && old[pos - 1] == new[at - 1] {
                pos -= 1;
                at -= 1;
                len += 1;
                room -= 1;
            }

            let agree = score.rescore(old, new, last_offset, at, len);
            if len - agree >= self.config.min_mismatches {
                return Found { scan: at, pos, len };
            }

            // Mostly explained by the previous diagonal.  Skip ahead.
            scan = at;
            let jump = 3 * w + accept_len;
            if len > jump {
                scan += len - jump;
            }
            if scan <= best.scan {
                scan = best.scan + 1;
            }
            scan_start = scan;
            if scan < limit {
                hash = self.hasher.checksum(&new[scan..]);
            }
            best.len = 0;
        }
    }

    fn name(&self) -> &'static str {
        "hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcg_bytes(n: usize, seed: u64) -> Vec<u8> {
        let mut s = seed;
        (0..n)
            .map(|_| {
                s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
                (s >> 33) as u8
            })
            .collect()
    }

    fn matcher(old: &[u8]) -> HashMatcher {
        HashMatcher::build(old, &MatcherConfig::default()).unwrap()
    }

    fn assert_exact(old: &[u8], new: &[u8], f: Found) {
        assert_eq!(&old[f.pos..f.pos + f.len], &new[f.scan..f.scan + f.len]);
    }

    #[test]
    fn empty_old_finds_nothing() {
        let m = matcher(b"");
        assert!(m.find_next(b"", b"anything at all, long enough to scan", 0, 0).is_exhausted(36));
    }

    #[test]
    fn short_new_finds_nothing() {
        let old = lcg_bytes(256, 1);
        let m = matcher(&old);
        assert!(m.find_next(&old, &old[..16], 0, 0).is_exhausted(16));
    }

    #[test]
    fn finds_moved_block() {
        let old = lcg_bytes(4096, 2);
        let mut new = lcg_bytes(100, 3);
        new.extend_from_slice(&old[1024..1024 + 512]);
        new.extend_from_slice(&lcg_bytes(100, 4));

        let m = matcher(&old);
        let f = m.find_next(&old, &new, 0, 0);
        assert_exact(&old, &new, f);
        assert_eq!(f.pos - f.scan, 1024 - 100);
        assert!(f.len >= 512, "match too short: {}", f.len);
    }

    #[test]
    fn unaligned_block_found_through_anchor_or_backward_walk() {
        let old = lcg_bytes(4096, 5);
        // Starts 7 bytes into an indexed block.
        let mut new = lcg_bytes(40, 6);
        new.extend_from_slice(&old[1031..1031 + 300]);
        new.extend_from_slice(&lcg_bytes(40, 7));
        // Make sure the run ends exactly where it was cut.
        new[39] = old[1030] ^ 0xFF;
        new[340] = old[1331] ^ 0xFF;

        let m = matcher(&old);
        let f = m.find_next(&old, &new, 0, 0);
        assert_exact(&old, &new, f);
        assert_eq!(f.scan, 40);
        assert_eq!(f.pos, 1031);
        assert_eq!(f.len, 300);
    }

    #[test]
    fn previous_diagonal_is_skipped() {
        let old = lcg_bytes(2048, 8);
        let new = old.clone();
        let m = matcher(&old);
        // Identity is explained entirely by offset 0.
        assert!(m.find_next(&old, &new, 0, 0).is_exhausted(new.len()));
        // From another diagonal the same data is a match.
        let f = m.find_next(&old, &new, 5, 0);
        assert_exact(&old, &new, f);
        assert_eq!(f.scan, 0);
        assert_eq!(f.pos, 0);
        assert_eq!(f.len, 2048);
    }

    #[test]
    fn short_matches_are_not_accepted() {
        let old = lcg_bytes(1024, 9);
        let mut new = lcg_bytes(200, 10);
        // 20 shared bytes: above the window, below the accept length.
        new[100..120].copy_from_slice(&old[512..532]);
        let m = matcher(&old);
        assert!(m.find_next(&old, &new, 0, 0).is_exhausted(new.len()));
    }
}
