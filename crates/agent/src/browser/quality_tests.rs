use super::*;

fn feed(q: &mut AdaptiveQuality, latency_ms: f64, times: usize) {
    for _ in 0..times {
        q.sample(latency_ms);
    }
}

#[test]
fn starts_at_seventy() {
    let q = AdaptiveQuality::new();
    assert_eq!(q.quality(), 70);
}

#[test]
fn high_latency_window_degrades_quality_and_flags_restart() {
    let mut q = AdaptiveQuality::new();
    feed(&mut q, 300.0, 5);
    assert_eq!(q.quality(), 60);
    assert!(q.should_restart());
    assert!(!q.should_restart(), "flag must clear after being read once");
}

#[test]
fn low_latency_window_upgrades_quality() {
    let mut q = AdaptiveQuality::new();
    feed(&mut q, 50.0, 5);
    assert_eq!(q.quality(), 75);
}

#[test]
fn mid_latency_window_leaves_quality_unchanged() {
    let mut q = AdaptiveQuality::new();
    feed(&mut q, 120.0, 5);
    assert_eq!(q.quality(), 70);
    assert!(!q.should_restart());
}

#[test]
fn sustained_low_latency_clamps_at_the_ceiling() {
    let mut q = AdaptiveQuality::new();
    feed(&mut q, 10.0, 20);
    assert_eq!(q.quality(), 80);
}

#[test]
fn sustained_high_latency_clamps_at_the_floor() {
    let mut q = AdaptiveQuality::new();
    feed(&mut q, 500.0, 50);
    assert_eq!(q.quality(), 20);
}

#[test]
fn partial_window_does_not_trigger_a_recompute() {
    let mut q = AdaptiveQuality::new();
    feed(&mut q, 300.0, 4);
    assert_eq!(q.quality(), 70);
    assert!(!q.should_restart());
}
