#![no_main]
use libfuzzer_sys::fuzz_target;
use pkgdelta::matcher::{MatcherConfig, SuffixArray};

fuzz_target!(|data: &[u8]| {
    let sa = SuffixArray::build(data, &MatcherConfig::default()).unwrap();
    let order = sa.order();
    assert_eq!(order.len(), data.len() + 1);
    for pair in order.windows(2) {
        assert!(data[pair[0]..] < data[pair[1]..]);
    }
});
