//! Behavioural tests for the time-series aggregator through the public API.
use oemon::history::{Aggregator, Millis, Sample, SeriesKind};
use oemon::key::{EntityId, SeriesKey};
use proptest::prelude::*;

fn feed(agg: &mut Aggregator, key: &SeriesKey, values: &[Option<f64>]) {
    for (i, v) in values.iter().enumerate() {
        let mut s = Sample::new(i as Millis * 1000);
        s.record_reading(key.clone(), *v);
        agg.ingest(&s);
    }
}

fn values(points: &[oemon::history::Point]) -> Vec<f64> {
    points.iter().map(|p| p.value).collect()
}

#[test]
fn oldest_points_are_evicted_first() {
    let key = SeriesKey::scalar("memoryUsed");
    let mut agg = Aggregator::new(3);
    feed(&mut agg, &key, &[Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)]);
    let g = agg.gauge_series(&key);
    assert_eq!(values(&g), vec![3.0, 4.0, 5.0]);
    assert_eq!(g[0].at, 2000);
}

#[test]
fn rate_of_monotonic_counter() {
    let key = SeriesKey::scalar("requests");
    let mut agg = Aggregator::new(10);
    feed(&mut agg, &key, &[Some(10.0), Some(15.0), Some(15.0), Some(22.0)]);
    assert_eq!(values(&agg.rate_series(&key)), vec![0.0, 5.0, 0.0, 7.0]);
}

#[test]
fn counter_reset_clamps_to_zero() {
    let key = SeriesKey::scalar("requests");
    let mut agg = Aggregator::new(10);
    feed(&mut agg, &key, &[Some(100.0), Some(40.0)]);
    assert_eq!(values(&agg.rate_series(&key)), vec![0.0, 0.0]);
}

#[test]
fn reads_do_not_mutate() {
    let key = SeriesKey::scalar("requests");
    let mut agg = Aggregator::new(10);
    feed(&mut agg, &key, &[Some(3.0), Some(9.0), Some(4.0)]);
    assert_eq!(agg.rate_series(&key), agg.rate_series(&key));
    assert_eq!(agg.gauge_series(&key), agg.gauge_series(&key));
}

#[test]
fn unseen_key_reads_empty() {
    let agg = Aggregator::new(10);
    let key = SeriesKey::scalar("never-ingested");
    assert!(agg.gauge_series(&key).is_empty());
    assert!(agg.rate_series(&key).is_empty());
    assert!(agg.series(SeriesKind::Gauge, [&key]).is_empty());
}

#[test]
fn reset_clears_every_key() {
    let a = SeriesKey::scalar("memoryUsed");
    let b = SeriesKey::entity("sessionMemory", EntityId::new("agent1", "7"));
    let mut agg = Aggregator::new(10);
    let mut s = Sample::new(0);
    s.record(a.clone(), 1.0);
    s.record(b.clone(), 2.0);
    agg.ingest(&s);
    assert_eq!(agg.tracked_len(), 2);

    agg.reset("oepas1/agent2");
    assert_eq!(agg.scope(), Some("oepas1/agent2"));
    assert!(agg.gauge_series(&a).is_empty());
    assert!(agg.gauge_series(&b).is_empty());
    assert_eq!(agg.keys_for_metric("sessionMemory").count(), 0);
}

#[test]
fn interval_falls_back_then_averages() {
    let key = SeriesKey::scalar("memoryUsed");
    let mut agg = Aggregator::new(10);
    assert_eq!(agg.inferred_interval_millis(&key, 2000.0), 2000.0);

    for at in [0, 1000, 3000] {
        let mut s = Sample::new(at);
        s.record(key.clone(), 1.0);
        agg.ingest(&s);
        if at == 0 {
            assert_eq!(agg.inferred_interval_millis(&key, 2000.0), 2000.0);
        }
    }
    assert_eq!(agg.inferred_interval_millis(&key, 2000.0), 1500.0);
}

#[test]
fn missing_reading_skips_pair_but_zero_does_not() {
    let missing = SeriesKey::scalar("a");
    let zero = SeriesKey::scalar("b");
    let mut agg = Aggregator::new(10);
    feed(&mut agg, &missing, &[Some(5.0), None]);
    feed(&mut agg, &zero, &[Some(5.0), Some(0.0)]);

    assert_eq!(agg.rate_series(&missing).len(), 1);
    assert_eq!(values(&agg.rate_series(&zero)), vec![0.0, 0.0]);
    // the gap still occupies a slot and reads as zero on the gauge
    assert_eq!(values(&agg.gauge_series(&missing)), vec![5.0, 0.0]);
}

#[test]
fn key_left_out_of_sample_is_untouched() {
    let counter = SeriesKey::scalar("requests");
    let other = SeriesKey::scalar("reads");
    let mut agg = Aggregator::new(10);
    feed(&mut agg, &counter, &[Some(10.0)]);

    // a tick that carries only an unrelated key
    let mut s = Sample::new(1000);
    s.record(other.clone(), 1.0);
    agg.ingest(&s);
    assert_eq!(values(&agg.gauge_series(&counter)), vec![10.0]);

    // the next present reading pairs with the last one
    let mut s = Sample::new(2000);
    s.record(counter.clone(), 16.0);
    agg.ingest(&s);
    let rate = agg.rate_series(&counter);
    assert_eq!(values(&rate), vec![0.0, 6.0]);
    assert_eq!(rate[1].at, 2000);
    assert_eq!(agg.inferred_interval_millis(&counter, 500.0), 2000.0);
}

#[test]
fn per_entity_keys_are_grouped_by_metric() {
    let mut agg = Aggregator::new(10);
    let mut s = Sample::new(0);
    s.record(SeriesKey::entity("sessionMemory", EntityId::new("x-y", "z")), 1.0);
    s.record(SeriesKey::entity("sessionMemory", EntityId::new("x", "y-z")), 2.0);
    s.record(SeriesKey::scalar("sessionMemory"), 3.0);
    agg.ingest(&s);

    let keys: Vec<_> = agg.keys_for_metric("sessionMemory").cloned().collect();
    assert_eq!(keys.len(), 2, "distinct entities must not collide: {keys:?}");
    assert!(keys.iter().all(|k| k.entity_id().is_some()));
}

proptest! {
    #[test]
    fn history_never_exceeds_capacity(
        cap in 1usize..16,
        readings in prop::collection::vec(prop::option::of(-1e6f64..1e6), 0..64),
    ) {
        let key = SeriesKey::scalar("m");
        let mut agg = Aggregator::new(cap);
        feed(&mut agg, &key, &readings);
        prop_assert!(agg.gauge_series(&key).len() <= cap);
    }

    #[test]
    fn rates_are_never_negative(
        readings in prop::collection::vec(prop::option::of(-1e6f64..1e6), 0..64),
    ) {
        let key = SeriesKey::scalar("m");
        let mut agg = Aggregator::new(32);
        feed(&mut agg, &key, &readings);
        for p in agg.rate_series(&key) {
            prop_assert!(p.value >= 0.0);
        }
    }

    #[test]
    fn key_text_round_trips(
        metric in "[a-z:\\\\-]{1,8}",
        agent in "[a-z:\\\\-]{0,8}",
        session in "[0-9:\\\\-]{0,4}",
    ) {
        let key = SeriesKey::entity(metric, EntityId::new(agent, session));
        let parsed: SeriesKey = key.to_string().parse().unwrap();
        prop_assert_eq!(parsed, key);
    }
}
