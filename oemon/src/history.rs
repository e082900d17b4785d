//! Bounded per-key histories for charts, plus the gauge/rate views derived from them.

use std::collections::{BTreeMap, VecDeque};

use crate::key::SeriesKey;

/// Wall-clock milliseconds since the unix epoch.
pub type Millis = i64;

pub fn push_capped<T>(dq: &mut VecDeque<T>, v: T, cap: usize) {
    if cap == 0 {
        return;
    }
    while dq.len() >= cap {
        dq.pop_front();
    }
    dq.push_back(v);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub at: Millis,
    pub value: f64,
}

/// One poll tick. A reading of `None` means the metric was expected but came
/// back missing or non-numeric.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    pub at: Millis,
    readings: BTreeMap<SeriesKey, Option<f64>>,
}

impl Sample {
    pub fn new(at: Millis) -> Self {
        Self {
            at,
            readings: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, key: SeriesKey, value: f64) {
        self.record_reading(key, Some(value));
    }

    pub fn record_reading(&mut self, key: SeriesKey, value: Option<f64>) {
        self.readings.insert(key, value.filter(|v| v.is_finite()));
    }

    pub fn reading(&self, key: &SeriesKey) -> Option<Option<f64>> {
        self.readings.get(key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct Observation {
    at: Millis,
    value: Option<f64>,
}

#[derive(Debug, Clone)]
struct History {
    points: VecDeque<Observation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Gauge,
    Rate,
}

/// Renderer-agnostic description of one chart line.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub key: SeriesKey,
    pub points: Vec<Point>,
}

impl Series {
    pub fn last_value(&self) -> Option<f64> {
        self.points.last().map(|p| p.value)
    }

    pub fn max_value(&self) -> f64 {
        self.points.iter().map(|p| p.value).fold(0.0, f64::max)
    }
}

/// Time-series store for one monitored scope.
///
/// Callers must not ingest concurrently for the same scope, and must drop poll
/// results that belong to a scope which has since been reset.
#[derive(Debug, Clone)]
pub struct Aggregator {
    capacity: usize,
    scope: Option<String>,
    histories: BTreeMap<SeriesKey, History>,
}

impl Aggregator {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            scope: None,
            histories: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Append one point per key carried by the sample.
    ///
    /// Missing readings become gaps, but only on keys that already have a
    /// history; a key is never created from a missing reading.
    pub fn ingest(&mut self, sample: &Sample) {
        for (key, &value) in &sample.readings {
            let obs = Observation {
                at: sample.at,
                value,
            };
            match self.histories.get_mut(key) {
                Some(h) => push_capped(&mut h.points, obs, self.capacity),
                None if value.is_some() => {
                    let mut points = VecDeque::with_capacity(self.capacity);
                    points.push_back(obs);
                    self.histories.insert(key.clone(), History { points });
                }
                None => {}
            }
        }
    }

    /// Raw values, oldest first. Gaps read as zero.
    pub fn gauge_series(&self, key: &SeriesKey) -> Vec<Point> {
        let Some(h) = self.histories.get(key) else {
            return Vec::new();
        };
        h.points
            .iter()
            .map(|o| Point {
                at: o.at,
                value: o.value.unwrap_or(0.0),
            })
            .collect()
    }

    /// Per-tick deltas of a cumulative counter.
    ///
    /// The first point reads zero. A pair with a gap on either side yields no
    /// point. A decrease means the counter was reset upstream and reads zero.
    pub fn rate_series(&self, key: &SeriesKey) -> Vec<Point> {
        let Some(h) = self.histories.get(key) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(h.points.len());
        let mut prev: Option<&Observation> = None;
        for obs in &h.points {
            match prev {
                None => out.push(Point {
                    at: obs.at,
                    value: 0.0,
                }),
                Some(p) => {
                    if let (Some(a), Some(b)) = (p.value, obs.value) {
                        out.push(Point {
                            at: obs.at,
                            value: (b - a).max(0.0),
                        });
                    }
                }
            }
            prev = Some(obs);
        }
        out
    }

    /// Mean spacing between consecutive timestamps, or `default_ms` when fewer
    /// than two points exist.
    pub fn inferred_interval_millis(&self, key: &SeriesKey, default_ms: f64) -> f64 {
        let Some(h) = self.histories.get(key) else {
            return default_ms;
        };
        match (h.points.front(), h.points.back()) {
            (Some(first), Some(last)) if h.points.len() >= 2 => {
                // sum of consecutive differences telescopes to last - first
                (last.at - first.at) as f64 / (h.points.len() - 1) as f64
            }
            _ => default_ms,
        }
    }

    /// Drop every history and start tracking `scope`.
    pub fn reset(&mut self, scope: impl Into<String>) {
        self.histories.clear();
        self.scope = Some(scope.into());
    }

    pub fn series<'a, I>(&self, kind: SeriesKind, keys: I) -> Vec<Series>
    where
        I: IntoIterator<Item = &'a SeriesKey>,
    {
        keys.into_iter()
            .filter(|k| self.histories.contains_key(*k))
            .map(|k| Series {
                key: k.clone(),
                points: match kind {
                    SeriesKind::Gauge => self.gauge_series(k),
                    SeriesKind::Rate => self.rate_series(k),
                },
            })
            .collect()
    }

    /// Tracked per-entity keys for `metric`, in key order.
    pub fn keys_for_metric<'a>(
        &'a self,
        metric: &'a str,
    ) -> impl Iterator<Item = &'a SeriesKey> + 'a {
        self.histories
            .keys()
            .filter(move |k| k.entity_id().is_some() && k.metric() == metric)
    }

    pub fn is_tracked(&self, key: &SeriesKey) -> bool {
        self.histories.contains_key(key)
    }

    pub fn tracked_len(&self) -> usize {
        self.histories.len()
    }
}
