//! Result boundary consumed by plotting and export.
//!
//! Each [`Sample`] maps output keys to values at one time point: node names
//! carry voltages, `<id>_I` keys carry device currents, and meters add
//! `<id>_V` / `<id>_P`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use serde::{Deserialize, Serialize};

/// Node voltages and device currents at one time point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: f64,
    pub values: BTreeMap<String, f64>,
}

impl Sample {
    pub fn new(time: f64) -> Self {
        Self {
            time,
            values: BTreeMap::new(),
        }
    }

    /// Look up one output by key.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }
}

/// Ordered sequence of committed samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub samples: Vec<Sample>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// First and last time point, bounding the plot x-axis.
    pub fn time_range(&self) -> Option<(f64, f64)> {
        let first = self.samples.first()?;
        let last = self.samples.last()?;
        Some((first.time, last.time))
    }

    /// Every output key present in any sample, sorted.
    pub fn keys(&self) -> Vec<String> {
        let keys: BTreeSet<&String> = self.samples.iter().flat_map(|s| s.values.keys()).collect();
        keys.into_iter().cloned().collect()
    }

    /// `(time, value)` pairs for one key, skipping samples that lack it.
    pub fn trace(&self, key: &str) -> Vec<(f64, f64)> {
        self.samples
            .iter()
            .filter_map(|s| s.get(key).map(|v| (s.time, v)))
            .collect()
    }

    /// Render as CSV with a `time` column followed by every key.
    /// Missing values are left empty.
    pub fn to_csv(&self) -> String {
        let keys = self.keys();
        let mut out = String::from("time");
        for key in &keys {
            out.push(',');
            out.push_str(key);
        }
        out.push('\n');

        for sample in &self.samples {
            let _ = write!(out, "{:e}", sample.time);
            for key in &keys {
                out.push(',');
                if let Some(v) = sample.get(key) {
                    let _ = write!(out, "{v:e}");
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> TimeSeries {
        let mut ts = TimeSeries::new();
        for k in 0..3 {
            let mut s = Sample::new(k as f64 * 0.5);
            s.values.insert("out".into(), k as f64);
            if k > 0 {
                s.values.insert("L1_I".into(), 0.1 * k as f64);
            }
            ts.push(s);
        }
        ts
    }

    #[test]
    fn test_time_range() {
        assert_eq!(TimeSeries::new().time_range(), None);
        assert_eq!(series().time_range(), Some((0.0, 1.0)));
    }

    #[test]
    fn test_trace_and_keys() {
        let ts = series();
        assert_eq!(ts.keys(), vec!["L1_I".to_string(), "out".to_string()]);
        assert_eq!(ts.trace("L1_I").len(), 2);
        assert_eq!(ts.trace("out")[2], (1.0, 2.0));
    }

    #[test]
    fn test_csv_layout() {
        let csv = series().to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "time,L1_I,out");
        assert_eq!(lines.len(), 4);
        // first sample has no L1_I reading
        assert_eq!(lines[1], "0e0,,0e0");
    }
}
