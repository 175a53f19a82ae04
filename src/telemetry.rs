//! ==============================================================================
//! telemetry.rs - snapshot cache and rolling chart window
//! ==============================================================================
//!
//! purpose:
//!     data model for one monitored room. the feed pushes partial field maps;
//!     we merge them onto a cached Snapshot and derive one rounded ChartPoint
//!     per push into a bounded, arrival-ordered window.
//!
//! relationships:
//!     - used by: session.rs (owns the Snapshot + RollingWindow)
//!     - used by: ingest.rs (decodes feed frames into SnapshotPatch)
//!
//! ==============================================================================

use serde::Serialize;
use serde_json::Value;

/// latest merged state of all monitored/controllable fields for one room.
/// defaults are all-zero/false until the first push arrives.
#[derive(Clone, Default, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    /// temperature in celsius
    pub temperature: f64,
    /// relative humidity (0-100%)
    pub humidity: f64,
    /// particulate concentration in ug/m3
    pub dust: f64,
    /// device-computed alarm flag (authoritative on the remote side)
    pub led_status: bool,
    /// manual led override (writable)
    pub manual_led: bool,
    /// manual buzzer override (writable)
    pub manual_buzzer: bool,
    /// actuator simulation toggle (writable)
    pub use_simulation: bool,
}

/// partial update decoded from one push event.
///
/// absent fields keep the prior snapshot value. fields that fail numeric
/// coercion (or decode to non-finite values) are dropped here so NaN can
/// never reach the cache or the chart.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct SnapshotPatch {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub dust: Option<f64>,
    pub led_status: Option<bool>,
    pub manual_led: Option<bool>,
    pub manual_buzzer: Option<bool>,
    pub use_simulation: Option<bool>,
}

/// lenient numeric coercion: JSON numbers or numeric strings, finite only.
/// the feed stores whatever the device wrote, so both shapes show up.
fn coerce_num(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|v| v.is_finite())
}

/// lenient boolean coercion: real bools, or 0/1 from devices that write ints.
fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        _ => None,
    }
}

impl SnapshotPatch {
    /// decode a full or partial field map pushed by the feed.
    ///
    /// returns None for null / non-object / empty payloads: those pushes are
    /// a no-op (no point appended, no state change). an object with only
    /// uncoercible fields still counts as a push - the merged snapshot just
    /// keeps every prior value.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object().filter(|m| !m.is_empty())?;
        let mut patch = Self::default();
        for (key, v) in map {
            patch.set_field(key, v);
        }
        Some(patch)
    }

    /// decode a push addressed at a single child field (the feed sends these
    /// when one value changes under the subscribed entity). returns None for
    /// fields we do not track.
    pub fn from_field(key: &str, value: &Value) -> Option<Self> {
        let mut patch = Self::default();
        if patch.set_field(key, value) {
            Some(patch)
        } else {
            None
        }
    }

    /// true if the key names a tracked field (even when coercion failed).
    fn set_field(&mut self, key: &str, value: &Value) -> bool {
        match key {
            "temperature" => self.temperature = coerce_num(value),
            "humidity" => self.humidity = coerce_num(value),
            "dust" => self.dust = coerce_num(value),
            "led_status" => self.led_status = coerce_bool(value),
            "manual_led" => self.manual_led = coerce_bool(value),
            "manual_buzzer" => self.manual_buzzer = coerce_bool(value),
            "use_simulation" => self.use_simulation = coerce_bool(value),
            _ => return false,
        }
        true
    }
}

impl Snapshot {
    /// shallow merge: present fields overwrite, absent fields keep prior value.
    pub fn merged(&self, patch: &SnapshotPatch) -> Snapshot {
        Snapshot {
            temperature: patch.temperature.unwrap_or(self.temperature),
            humidity: patch.humidity.unwrap_or(self.humidity),
            dust: patch.dust.unwrap_or(self.dust),
            led_status: patch.led_status.unwrap_or(self.led_status),
            manual_led: patch.manual_led.unwrap_or(self.manual_led),
            manual_buzzer: patch.manual_buzzer.unwrap_or(self.manual_buzzer),
            use_simulation: patch.use_simulation.unwrap_or(self.use_simulation),
        }
    }
}

/// one time-stamped, rounded sample derived from a merged snapshot.
/// never mutated after creation; evicted implicitly from the window.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartPoint {
    /// wall-clock label, zero-padded HH:MM, local time of the observing process
    pub time: String,
    /// rounded to 1 decimal
    pub temperature: f64,
    /// rounded to 1 decimal
    pub humidity: f64,
    /// rounded to nearest integer
    pub dust: i64,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

impl ChartPoint {
    pub fn sample(snapshot: &Snapshot, time: String) -> Self {
        Self {
            time,
            temperature: round1(snapshot.temperature),
            humidity: round1(snapshot.humidity),
            dust: snapshot.dust.round() as i64,
        }
    }
}

/// bounded, arrival-ordered buffer of chart points, oldest first.
#[derive(Clone, Debug)]
pub struct RollingWindow {
    points: Vec<ChartPoint>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// append then truncate from the front; consumers only ever observe
    /// len() <= capacity.
    pub fn push(&mut self, point: ChartPoint) {
        self.points.push(point);
        if self.points.len() > self.capacity {
            let excess = self.points.len() - self.capacity;
            self.points.drain(..excess);
        }
    }

    pub fn points(&self) -> &[ChartPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(v: serde_json::Value) -> SnapshotPatch {
        SnapshotPatch::from_value(&v).expect("expected a usable patch")
    }

    #[test]
    fn merge_keeps_absent_fields() {
        let prior = Snapshot {
            temperature: 21.0,
            humidity: 55.0,
            dust: 12.0,
            led_status: true,
            manual_led: false,
            manual_buzzer: true,
            use_simulation: false,
        };
        let merged = prior.merged(&patch(json!({"humidity": 61.5})));
        assert_eq!(merged.humidity, 61.5);
        assert_eq!(merged.temperature, 21.0);
        assert_eq!(merged.dust, 12.0);
        assert!(merged.led_status);
        assert!(merged.manual_buzzer);
    }

    #[test]
    fn merge_overwrites_present_fields() {
        let prior = Snapshot::default();
        let merged = prior.merged(&patch(json!({
            "temperature": 25.05,
            "dust": 45,
            "manual_led": true,
        })));
        assert_eq!(merged.temperature, 25.05);
        assert_eq!(merged.dust, 45.0);
        assert!(merged.manual_led);
        assert_eq!(merged.humidity, 0.0);
    }

    #[test]
    fn empty_or_null_payload_is_no_patch() {
        assert_eq!(SnapshotPatch::from_value(&Value::Null), None);
        assert_eq!(SnapshotPatch::from_value(&json!({})), None);
        assert_eq!(SnapshotPatch::from_value(&json!(42)), None);
    }

    #[test]
    fn uncoercible_numbers_fall_back_to_prior_value() {
        let prior = Snapshot {
            temperature: 19.5,
            ..Snapshot::default()
        };
        // string garbage, NaN-ish payloads, and wrong types all keep the
        // prior value rather than injecting NaN into the chart
        let p = patch(json!({"temperature": "not a number", "humidity": true}));
        let merged = prior.merged(&p);
        assert_eq!(merged.temperature, 19.5);
        assert_eq!(merged.humidity, 0.0);
        assert!(merged.temperature.is_finite());
    }

    #[test]
    fn numeric_strings_coerce() {
        let merged = Snapshot::default().merged(&patch(json!({"dust": "42.6"})));
        assert_eq!(merged.dust, 42.6);
    }

    #[test]
    fn single_field_patch_tracks_known_fields_only() {
        let p = SnapshotPatch::from_field("dust", &json!(30.0)).unwrap();
        assert_eq!(p.dust, Some(30.0));
        assert_eq!(p.temperature, None);
        assert!(SnapshotPatch::from_field("co2", &json!(400)).is_none());
    }

    #[test]
    fn chart_point_rounding() {
        let snap = Snapshot {
            temperature: 23.456,
            humidity: 60.24,
            dust: 42.6,
            ..Snapshot::default()
        };
        let point = ChartPoint::sample(&snap, "10:00".into());
        assert_eq!(point.temperature, 23.5);
        assert_eq!(point.humidity, 60.2);
        assert_eq!(point.dust, 43);
        assert_eq!(point.time, "10:00");
    }

    #[test]
    fn window_capacity_keeps_last_k_in_arrival_order() {
        let mut window = RollingWindow::new(5);
        for i in 0..12 {
            let snap = Snapshot {
                dust: i as f64,
                ..Snapshot::default()
            };
            window.push(ChartPoint::sample(&snap, format!("10:{i:02}")));
        }
        assert_eq!(window.len(), 5);
        let dusts: Vec<i64> = window.points().iter().map(|p| p.dust).collect();
        assert_eq!(dusts, vec![7, 8, 9, 10, 11]);
        assert_eq!(window.points()[0].time, "10:07");
    }

    #[test]
    fn window_never_exceeds_capacity_transiently_for_consumers() {
        let mut window = RollingWindow::new(1);
        for _ in 0..3 {
            window.push(ChartPoint::sample(&Snapshot::default(), "00:00".into()));
            assert_eq!(window.len(), 1);
        }
    }

    #[test]
    fn repeated_identical_pushes_append_distinct_points() {
        let snap = Snapshot {
            temperature: 20.0,
            ..Snapshot::default()
        };
        let mut window = RollingWindow::new(10);
        window.push(ChartPoint::sample(&snap, "10:00".into()));
        window.push(ChartPoint::sample(&snap, "10:01".into()));
        assert_eq!(window.len(), 2);
        assert_eq!(window.points()[0].temperature, window.points()[1].temperature);
        assert_ne!(window.points()[0].time, window.points()[1].time);
    }
}
