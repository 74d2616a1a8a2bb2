#![no_main]
use libfuzzer_sys::fuzz_target;
use pkgdelta::engine::{DiffOptions, diff_with_options};
use pkgdelta::matcher::{MatcherConfig, Strategy};
use pkgdelta::ops::apply_controls;

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    // First byte picks the strategy and a small window, second the split.
    let flags = data[0];
    let payload = &data[2..];
    let split = (data[1] as usize * payload.len()) / 255;
    let (old, new) = payload.split_at(split);

    let strategy = if flags & 1 == 0 {
        Strategy::Suffix
    } else {
        Strategy::Hash
    };
    let window = 1 + (flags as usize >> 1) % 32;
    let options = DiffOptions {
        strategy,
        matcher: MatcherConfig {
            window,
            accept_len: window * 2,
            min_mismatches: 1 + (flags as usize >> 3),
            wide_context_threshold: if flags & 0x80 != 0 { 0 } else { 0xFF_FFFF },
        },
    };

    let delta = diff_with_options(old, new, &options).unwrap();
    assert_eq!(delta.apply(old).unwrap(), new);
    assert_eq!(apply_controls(old, &delta.controls()).unwrap(), new);
});
