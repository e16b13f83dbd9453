//! Property validation for component construction.
//!
//! Out-of-range values are rejected when the circuit is built, never in the
//! middle of a run.

use crate::circuit::{ComponentSpec, PropertyMap};
use crate::error::{CircuitError, Result};

/// Reads typed, bounds-checked values out of a component's property map.
pub(crate) struct Props<'a> {
    spec: &'a ComponentSpec,
}

impl<'a> Props<'a> {
    /// Wrap a spec, rejecting any property name not in `allowed` and any
    /// non-finite value.
    pub fn new(spec: &'a ComponentSpec, allowed: &[&str]) -> Result<Self> {
        for (key, value) in &spec.properties {
            if !allowed.contains(&key.as_str()) {
                return Err(CircuitError::UnknownParameter {
                    component: spec.id.clone(),
                    param: key.clone(),
                });
            }
            if !value.is_finite() {
                return Err(CircuitError::invalid_parameter(
                    &spec.id,
                    key,
                    "value must be finite",
                ));
            }
        }
        Ok(Self { spec })
    }

    /// Any finite value.
    pub fn get(&self, key: &str, default: f64) -> f64 {
        self.spec.properties.get(key).copied().unwrap_or(default)
    }

    /// Strictly positive value.
    pub fn positive(&self, key: &str, default: f64) -> Result<f64> {
        let v = self.get(key, default);
        if v > 0.0 {
            Ok(v)
        } else {
            Err(self.error(key, format!("must be > 0 (got {v})")))
        }
    }

    /// Zero or positive value.
    pub fn non_negative(&self, key: &str, default: f64) -> Result<f64> {
        let v = self.get(key, default);
        if v >= 0.0 {
            Ok(v)
        } else {
            Err(self.error(key, format!("must be >= 0 (got {v})")))
        }
    }

    /// Value within `[min, max]`.
    pub fn in_range(&self, key: &str, default: f64, min: f64, max: f64) -> Result<f64> {
        let v = self.get(key, default);
        if (min..=max).contains(&v) {
            Ok(v)
        } else {
            Err(self.error(key, format!("must be within [{min}, {max}] (got {v})")))
        }
    }

    /// Persisted state entry, defaulting when absent or non-finite.
    pub fn state(&self, key: &str) -> f64 {
        state_value(&self.spec.state, key)
    }

    fn error(&self, key: &str, message: String) -> CircuitError {
        CircuitError::invalid_parameter(&self.spec.id, key, message)
    }
}

fn state_value(state: &PropertyMap, key: &str) -> f64 {
    state
        .get(key)
        .copied()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::ComponentKind;

    #[test]
    fn test_bounds_and_unknown_keys() {
        let spec = ComponentSpec::new("R1", ComponentKind::Resistor).with("resistance", -5.0);
        let props = Props::new(&spec, &["resistance"]).unwrap();
        assert!(props.positive("resistance", 1.0).is_err());

        let spec = ComponentSpec::new("R1", ComponentKind::Resistor).with("ohms", 5.0);
        assert!(matches!(
            Props::new(&spec, &["resistance"]),
            Err(CircuitError::UnknownParameter { .. })
        ));

        let spec = ComponentSpec::new("X1", ComponentKind::Load).with("level", 150.0);
        let props = Props::new(&spec, &["level"]).unwrap();
        assert!(props.in_range("level", 100.0, 0.0, 100.0).is_err());
    }

    #[test]
    fn test_nan_rejected() {
        let spec = ComponentSpec::new("C1", ComponentKind::Capacitor).with("capacitance", f64::NAN);
        assert!(Props::new(&spec, &["capacitance"]).is_err());
    }
}
