use std::collections::BTreeSet;

use phago_core::derive_run_seed;

#[test]
fn run_seeds_repeat_and_stay_positive() {
    let first: Vec<u64> = (0..64).map(|idx| derive_run_seed(42, idx)).collect();
    let second: Vec<u64> = (0..64).map(|idx| derive_run_seed(42, idx)).collect();
    assert_eq!(first, second);
    assert!(first.iter().all(|seed| *seed <= i64::MAX as u64));
    let unique: BTreeSet<_> = first.iter().collect();
    assert_eq!(unique.len(), first.len());
}

#[test]
fn master_seed_changes_stream() {
    assert_ne!(derive_run_seed(1, 0), derive_run_seed(2, 0));
}
