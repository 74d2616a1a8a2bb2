// Suffix-array matcher.
//
// The array is built with Larsson-Sadakane prefix doubling (qsufsort).
// Suffixes are first bucket-sorted by their leading two bytes (three for
// large inputs).  Each pass then refines every unsorted group by the rank
// of the suffix `h` bytes further on and doubles `h`, until every suffix
// sits in a group of its own.
//
// Ranks are "last index of the group in `order`".  Finished runs of
// singleton groups are encoded in `order` as negative lengths so later
// passes can skip them in one step.
//
// Group splitting is driven by an explicit task stack instead of
// recursion, so deep splits on repetitive input cannot exhaust the stack.

use log::debug;

use super::config::MatcherConfig;
use super::{Found, Matcher, agrees, match_len};
use crate::error::{DiffError, alloc_zeroed};

/// Groups below this size are split by repeated minimum selection.
const SELECT_SORT_CUTOFF: usize = 16;

/// Exact matcher over a sorted suffix array of the old buffer.
pub struct SuffixArray {
    /// Suffix start offsets in lexicographic order.  `order[0]` is the
    /// empty suffix `old.len()`.
    order: Vec<usize>,
    /// `buckets[c]..buckets[c + 1]` is the range of `order` holding the
    /// suffixes that start with byte `c`.
    buckets: [usize; 257],
    min_mismatches: usize,
}

impl SuffixArray {
    /// Sort all suffixes of `old`.
    pub fn build(old: &[u8], config: &MatcherConfig) -> Result<Self, DiffError> {
        config.validate()?;
        let buckets = byte_buckets(old);

        let order = match old.len() {
            0 => vec![0],
            1 => vec![1, 0],
            n => {
                let context = if n > config.wide_context_threshold { 3 } else { 2 };
                let sorter = Qsufsort::new(old, context)?;
                let (order, passes) = sorter.sort(context);
                debug!(
                    "suffix array: {n} bytes, {context}-byte initial context, {passes} doubling passes"
                );
                order
            }
        };

        debug_assert!(is_permutation(&order));
        debug_assert_eq!(buckets[256], order.len());

        Ok(Self {
            order,
            buckets,
            min_mismatches: config.min_mismatches,
        })
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn buckets(&self) -> &[usize; 257] {
        &self.buckets
    }

    /// Longest prefix of `query` occurring in `old`, as `(pos, len)`.
    ///
    /// Returns `(0, 0)` when no suffix starts with `query[0]`.
    pub fn longest_match(&self, old: &[u8], query: &[u8]) -> (usize, usize) {
        let Some(&first) = query.first() else {
            return (0, 0);
        };
        let lo = self.buckets[first as usize];
        let hi = self.buckets[first as usize + 1];
        if lo >= hi {
            return (0, 0);
        }

        // Narrow to two neighbours around the insertion point of `query`.
        let (mut start, mut end) = (lo, hi - 1);
        while end - start >= 2 {
            let mid = start + (end - start) / 2;
            if old[self.order[mid]..] < *query {
                start = mid;
            } else {
                end = mid;
            }
        }

        let (a, b) = (self.order[start], self.order[end]);
        let len_a = match_len(&old[a..], query);
        let len_b = match_len(&old[b..], query);
        if len_a > len_b { (a, len_a) } else { (b, len_b) }
    }
}

impl Matcher for SuffixArray {
    fn find_next(&self, old: &[u8], new: &[u8], last_offset: isize, scan: usize) -> Found {
        if old.is_empty() {
            return Found::exhausted(new.len());
        }

        // `agree` counts the positions in `scan..reach` on the previous
        // diagonal.
        let mut scan = scan;
        let mut reach = scan;
        let mut agree = 0usize;

        while scan < new.len() {
            let (pos, len) = self.longest_match(old, &new[scan..]);

            while reach < scan + len {
                if agrees(old, new, last_offset, reach) {
                    agree += 1;
                }
                reach += 1;
            }

            // Nothing here that the previous diagonal does not already give.
            if len > 0 && len == agree {
                scan += len;
                reach = scan;
                agree = 0;
                continue;
            }

            if len > agree + self.min_mismatches {
                return Found { scan, pos, len };
            }

            if reach > scan && agrees(old, new, last_offset, scan) {
                agree -= 1;
            }
            scan += 1;
            reach = reach.max(scan);
        }

        Found::exhausted(new.len())
    }

    fn name(&self) -> &'static str {
        "suffix"
    }
}

/// Every offset `0..=len` appears exactly once.
fn is_permutation(order: &[usize]) -> bool {
    let mut seen = vec![false; order.len()];
    order
        .iter()
        .all(|&s| s < seen.len() && !std::mem::replace(&mut seen[s], true))
}

/// `buckets[c]` = 1 + number of bytes smaller than `c`.  The leading 1 is
/// the empty suffix.
fn byte_buckets(old: &[u8]) -> [usize; 257] {
    let mut counts = [0usize; 256];
    for &b in old {
        counts[b as usize] += 1;
    }
    let mut buckets = [0usize; 257];
    buckets[0] = 1;
    for c in 0..256 {
        buckets[c + 1] = buckets[c] + counts[c];
    }
    buckets
}

/// Work item of one doubling pass.
#[derive(Debug, Clone, Copy)]
enum Task {
    /// Reorder the unsorted group `start..start + len` by rank at `+h`.
    Split { start: usize, len: usize },
    /// Assign the final group rank to `start..start + len`.
    Settle { start: usize, len: usize },
}

/// Working state of the doubling sort.
struct Qsufsort {
    /// Suffix order, or a negative run length over finished singletons.
    order: Vec<isize>,
    /// Group rank of every suffix.
    rank: Vec<usize>,
    tasks: Vec<Task>,
}

impl Qsufsort {
    /// Bucket-sort all `old.len() + 1` suffixes by their first `context`
    /// symbols.  Symbols are `byte + 1`, with 0 past the end, so suffixes
    /// shorter than the context sort before their extensions.
    fn new(old: &[u8], context: usize) -> Result<Self, DiffError> {
        let total = old.len() + 1;
        let mut order: Vec<isize> = alloc_zeroed(total, "suffix order")?;
        let mut rank: Vec<usize> = alloc_zeroed(total, "suffix ranks")?;

        let key_space = 257usize.pow(context as u32);
        let mut heads: Vec<usize> = alloc_zeroed(key_space + 1, "suffix key buckets")?;
        let key = |i: usize| {
            (0..context).fold(0usize, |k, j| {
                k * 257 + old.get(i + j).map_or(0, |&b| b as usize + 1)
            })
        };

        for i in 0..total {
            heads[key(i) + 1] += 1;
        }
        for k in 0..key_space {
            heads[k + 1] += heads[k];
        }
        for i in 0..total {
            let k = key(i);
            order[heads[k]] = i as isize;
            heads[k] += 1;
        }

        // `heads[k]` is now one past the end of bucket `k`.
        let mut start = 0;
        while start < total {
            let end = heads[key(order[start] as usize)];
            for j in start..end {
                rank[order[j] as usize] = end - 1;
            }
            if end - start == 1 {
                order[start] = -1;
            }
            start = end;
        }

        Ok(Self {
            order,
            rank,
            tasks: Vec::new(),
        })
    }

    /// Run doubling passes until all groups are singletons.  Returns the
    /// suffix order and the number of passes.
    fn sort(mut self, context: usize) -> (Vec<usize>, usize) {
        let total = self.order.len();
        let mut h = context;
        let mut passes = 0;
        while self.order[0] != -(total as isize) {
            self.pass(h);
            h = h.saturating_mul(2);
            passes += 1;
        }

        let mut order = self.order;
        for (suffix, &r) in self.rank.iter().enumerate() {
            order[r] = suffix as isize;
        }
        (order.into_iter().map(|s| s as usize).collect(), passes)
    }

    /// One doubling pass: merge finished runs and split every unsorted group.
    fn pass(&mut self, h: usize) {
        let total = self.order.len();
        let mut i = 0;
        let mut run = 0usize;
        while i < total {
            let v = self.order[i];
            if v < 0 {
                run += v.unsigned_abs();
                i += v.unsigned_abs();
            } else {
                if run > 0 {
                    self.order[i - run] = -(run as isize);
                    run = 0;
                }
                let len = self.rank[v as usize] + 1 - i;
                self.split(i, len, h);
                i += len;
            }
        }
        if run > 0 {
            self.order[i - run] = -(run as isize);
        }
    }

    /// Sort key of `order[j]` in this pass.
    ///
    /// Members of an unsorted group share their first `h` symbols, none of
    /// them the end marker, so `order[j] + h` is a valid suffix.
    #[inline(always)]
    fn key(&self, j: usize, h: usize) -> usize {
        self.rank[self.order[j] as usize + h]
    }

    fn split(&mut self, start: usize, len: usize, h: usize) {
        self.tasks.push(Task::Split { start, len });
        while let Some(task) = self.tasks.pop() {
            match task {
                Task::Split { start, len } if len < SELECT_SORT_CUTOFF => {
                    self.select_sort(start, len, h)
                }
                Task::Split { start, len } => self.partition(start, len, h),
                Task::Settle { start, len } => self.settle(start, len),
            }
        }
    }

    /// Repeatedly move the members with the smallest key to the front and
    /// settle them as one group.
    fn select_sort(&mut self, start: usize, len: usize, h: usize) {
        let end = start + len;
        let mut k = start;
        while k < end {
            let mut x = self.key(k, h);
            let mut j = 1;
            for i in k + 1..end {
                let ki = self.key(i, h);
                if ki < x {
                    x = ki;
                    j = 0;
                }
                if ki == x {
                    self.order.swap(k + j, i);
                    j += 1;
                }
            }
            self.settle(k, j);
            k += j;
        }
    }

    /// Three-way partition around the middle member's key.  The lower part
    /// is finished before the equal part is settled, and the equal part
    /// before the upper part is touched.
    fn partition(&mut self, start: usize, len: usize, h: usize) {
        let end = start + len;
        let x = self.key(start + len / 2, h);

        let (mut less, mut equal) = (0, 0);
        for j in start..end {
            let kj = self.key(j, h);
            if kj < x {
                less += 1;
            } else if kj == x {
                equal += 1;
            }
        }
        let lo_end = start + less;
        let eq_end = lo_end + equal;

        let (mut i, mut e, mut g) = (start, 0, 0);
        while i < lo_end {
            let ki = self.key(i, h);
            if ki < x {
                i += 1;
            } else if ki == x {
                self.order.swap(i, lo_end + e);
                e += 1;
            } else {
                self.order.swap(i, eq_end + g);
                g += 1;
            }
        }
        while lo_end + e < eq_end {
            if self.key(lo_end + e, h) == x {
                e += 1;
            } else {
                self.order.swap(lo_end + e, eq_end + g);
                g += 1;
            }
        }

        // Popped in reverse: lower, equal, upper.
        if end > eq_end {
            self.tasks.push(Task::Split {
                start: eq_end,
                len: end - eq_end,
            });
        }
        self.tasks.push(Task::Settle {
            start: lo_end,
            len: eq_end - lo_end,
        });
        if lo_end > start {
            self.tasks.push(Task::Split {
                start,
                len: lo_end - start,
            });
        }
    }

    fn settle(&mut self, start: usize, len: usize) {
        let group_rank = start + len - 1;
        for j in start..start + len {
            self.rank[self.order[j] as usize] = group_rank;
        }
        if len == 1 {
            self.order[start] = -1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permutation_check() {
        assert!(is_permutation(&[2, 0, 1]));
        assert!(is_permutation(&[0]));
        assert!(!is_permutation(&[0, 0, 1]));
        assert!(!is_permutation(&[0, 3, 1]));
    }

    fn naive_order(old: &[u8]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..=old.len()).collect();
        order.sort_by(|&a, &b| old[a..].cmp(&old[b..]));
        order
    }

    fn build(old: &[u8]) -> SuffixArray {
        SuffixArray::build(old, &MatcherConfig::default()).unwrap()
    }

    fn build_wide(old: &[u8]) -> SuffixArray {
        let cfg = MatcherConfig {
            wide_context_threshold: 0,
            ..MatcherConfig::default()
        };
        SuffixArray::build(old, &cfg).unwrap()
    }

    fn lcg_bytes(n: usize, seed: u64, alphabet: u8) -> Vec<u8> {
        let mut s = seed;
        (0..n)
            .map(|_| {
                s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
                ((s >> 33) % alphabet as u64) as u8
            })
            .collect()
    }

    #[test]
    fn base_cases() {
        let sa = build(b"");
        assert_eq!(sa.order(), &[0]);
        assert!(sa.buckets().iter().all(|&f| f == 1));

        let sa = build(b"q");
        assert_eq!(sa.order(), &[1, 0]);
        assert_eq!(sa.buckets()[b'q' as usize], 1);
        assert_eq!(sa.buckets()[b'q' as usize + 1], 2);
        assert_eq!(sa.buckets()[256], 2);
    }

    #[test]
    fn banana() {
        let sa = build(b"banana");
        assert_eq!(sa.order(), &[6, 5, 3, 1, 0, 4, 2]);
        let f = sa.buckets();
        assert_eq!(f[b'a' as usize], 1);
        assert_eq!(f[b'b' as usize], 4);
        assert_eq!(f[b'n' as usize], 5);
        assert_eq!(f[256], 7);
    }

    #[test]
    fn matches_naive_sort() {
        let inputs: Vec<Vec<u8>> = vec![
            b"mississippi".to_vec(),
            b"abracadabra abracadabra".to_vec(),
            vec![0u8; 100],
            vec![0xFFu8; 37],
            b"ab".repeat(60),
            b"abcabcabd".repeat(9),
            lcg_bytes(500, 1, 2),
            lcg_bytes(700, 2, 4),
            lcg_bytes(1000, 3, 255),
            (0..=255u8).rev().collect(),
        ];
        for old in &inputs {
            let expect = naive_order(old);
            assert_eq!(build(old).order(), &expect[..], "input {:?}", &old[..old.len().min(16)]);
            assert_eq!(build_wide(old).order(), &expect[..], "wide context");
        }
    }

    #[test]
    fn build_is_deterministic() {
        let old = lcg_bytes(3000, 9, 3);
        let a = build(&old);
        let b = build(&old);
        assert_eq!(a.order(), b.order());
        assert_eq!(a.buckets(), b.buckets());
    }

    #[test]
    fn order_is_a_permutation() {
        let old = lcg_bytes(2048, 11, 8);
        let sa = build(&old);
        let mut seen = vec![false; old.len() + 1];
        for &s in sa.order() {
            assert!(!seen[s], "suffix {s} repeated");
            seen[s] = true;
        }
        assert!(seen.iter().all(|&x| x));
    }

    #[test]
    fn longest_match_is_exact() {
        let old = lcg_bytes(400, 5, 3);
        let sa = build(&old);
        let queries = [lcg_bytes(30, 6, 3), lcg_bytes(30, 7, 3), old[123..180].to_vec()];
        for q in &queries {
            let (pos, len) = sa.longest_match(&old, q);
            let best = (0..old.len()).map(|p| match_len(&old[p..], q)).max().unwrap_or(0);
            assert_eq!(len, best);
            assert_eq!(&old[pos..pos + len], &q[..len]);
        }
    }

    #[test]
    fn longest_match_picks_full_match() {
        let old = b"abxabc";
        let sa = build(old);
        assert_eq!(sa.longest_match(old, b"abc"), (3, 3));
        assert_eq!(sa.longest_match(old, b"zz"), (0, 0));
    }

    #[test]
    fn find_next_skips_previous_diagonal() {
        let old = b"abcdefgh";
        let new = b"abcXefgh";
        let sa = build(old);
        // Everything lies on diagonal 0.
        assert!(sa.find_next(old, new, 0, 0).is_exhausted(new.len()));
    }

    #[test]
    fn find_next_reports_moved_run() {
        let old = lcg_bytes(2000, 12, 255);
        let mut new = lcg_bytes(50, 13, 255);
        new.extend_from_slice(&old[700..900]);
        let sa = build(&old);
        let f = sa.find_next(&old, &new, 0, 0);
        assert!(f.len >= 200);
        assert_eq!(f.pos as isize - f.scan as isize, 650);
        assert_eq!(&old[f.pos..f.pos + f.len], &new[f.scan..f.scan + f.len]);
    }
}
