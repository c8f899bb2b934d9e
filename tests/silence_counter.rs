// tests/silence_counter.rs
use promo_watch::silence::{advance, SilenceCounter, DEFAULT_THRESHOLD};

#[test]
fn counter_sequence_matches_run_outcomes() {
    let outcomes = [false, false, true, false, false, false, false, false, false];
    let mut c = SilenceCounter::default();
    let mut seen = Vec::new();
    for had_new in outcomes {
        let (next, fire) = advance(c, had_new, DEFAULT_THRESHOLD);
        assert!(!fire, "threshold must not fire yet");
        seen.push(next.silent_runs);
        c = next;
    }
    assert_eq!(seen, vec![1, 2, 0, 1, 2, 3, 4, 5, 6]);

    // 7th consecutive empty run after the reset.
    let (next, fire) = advance(c, false, DEFAULT_THRESHOLD);
    assert!(fire);
    assert_eq!(next.silent_runs, 0);
}

#[test]
fn fires_once_per_threshold_cycle() {
    let mut c = SilenceCounter::default();
    let mut fired_at = Vec::new();
    for run in 1..=21 {
        let (next, fire) = advance(c, false, 7);
        if fire {
            fired_at.push(run);
        }
        c = next;
    }
    assert_eq!(fired_at, vec![7, 14, 21]);
}
