use pkgdelta::engine::{DiffOptions, diff_with_options};
use pkgdelta::io::diff_files;
use pkgdelta::matcher::{MatcherConfig, Strategy, SuffixArray};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use tempfile::NamedTempFile;

fn random_bytes(n: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = vec![0u8; n];
    rng.fill(&mut out[..]);
    out
}

#[test]
#[ignore = "20 MiB suffix sort is opt-in due to runtime and memory requirements"]
fn wide_context_file_roundtrip() {
    // Past 0xFFFFFF bytes the suffix sort starts from 3-byte keys.
    let len = 20 * 1024 * 1024;
    let old = random_bytes(len, 1);
    let mut new = old.clone();
    for off in [64 * 1024, 8 * 1024 * 1024, len - 32] {
        new[off..off + 14].copy_from_slice(b"mutated-block!");
    }
    new.extend_from_slice(b"trailing bytes");

    let mut old_file = NamedTempFile::new().unwrap();
    let mut new_file = NamedTempFile::new().unwrap();
    old_file.write_all(&old).unwrap();
    new_file.write_all(&new).unwrap();

    for strategy in [Strategy::Suffix, Strategy::Hash] {
        let (delta, stats) = diff_files(
            old_file.path(),
            new_file.path(),
            &DiffOptions::with_strategy(strategy),
            true,
        )
        .unwrap();
        assert!(stats.verified);
        assert_eq!(stats.new_size, new.len() as u64);
        assert!(delta.extra_bytes() < 4096, "{}: {}", strategy.name(), delta.extra_bytes());
    }
}

#[test]
fn wide_context_with_lowered_threshold() {
    let old = random_bytes(256 * 1024, 2);
    let mut new = old[1000..].to_vec();
    new.extend_from_slice(&old[..1000]);
    new[77_777] ^= 0x55;

    let narrow = MatcherConfig::default();
    let wide = MatcherConfig {
        wide_context_threshold: 1024,
        ..MatcherConfig::default()
    };

    let a = SuffixArray::build(&old, &narrow).unwrap();
    let b = SuffixArray::build(&old, &wide).unwrap();
    assert_eq!(a.order(), b.order());
    assert_eq!(a.buckets(), b.buckets());

    for matcher in [narrow, wide] {
        let options = DiffOptions {
            strategy: Strategy::Suffix,
            matcher,
        };
        let delta = diff_with_options(&old, &new, &options).unwrap();
        assert_eq!(delta.apply(&old).unwrap(), new);
        assert_eq!(delta.extra_bytes(), 1);
    }
}

#[test]
fn edge_case_matrix() {
    let cases: Vec<(&[u8], &[u8])> = vec![
        (b"", b""),
        (b"", b"x"),
        (b"x", b""),
        (b"x", b"x"),
        (b"\0\0\0\0\0", b"\0\0\0\0\0"),
        (b"\0\0\0\0\0", b"\0\0\0\0\x01"),
        (b"ab", b"ba"),
    ];

    for (old, new) in cases {
        for strategy in [Strategy::Suffix, Strategy::Hash] {
            let delta = diff_with_options(old, new, &DiffOptions::with_strategy(strategy)).unwrap();
            assert_eq!(delta.apply(old).unwrap(), new);
        }
    }
}
