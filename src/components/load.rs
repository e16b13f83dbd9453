//! Series R-L load.
//!
//! A load is a resistance and an inductance in series, scaled by a
//! percentage `level`: at 50 % the load draws half its rated current, so
//! both R and L double. At 0 % the load is disconnected and stamps a very
//! large resistance instead of a true open circuit.
//!
//! Backward Euler on `v = R·i + L·di/dt` gives
//!   i(n) = G·v(n) + G·(L/dt)·i(n-1),  G = 1/(R + L/dt)
//! so the whole branch folds into one conductance and one current source.

use num_complex::Complex64;

use super::stamp::{AcStamp, Analysis, Stamp, StampContext};
use super::{CompanionModel, Reactive};
use crate::circuit::{ComponentId, NodeId, PropertyMap};

/// A series R-L load.
#[derive(Debug, Clone)]
pub struct Load {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 2],
    /// Rated resistance at 100 %
    pub resistance: f64,
    /// Rated inductance at 100 %
    pub inductance: f64,
    /// Load level in percent (0-100)
    pub level: f64,

    /// Inductor current at the last committed step
    pub i_prev: f64,
}

impl Load {
    pub fn new(
        id: ComponentId,
        name: String,
        nodes: [NodeId; 2],
        resistance: f64,
        inductance: f64,
        level: f64,
        i_prev: f64,
    ) -> Self {
        if level <= 0.0 {
            log::warn!("load '{name}' at 0% - substituting an open-circuit resistance");
        }
        Self {
            id,
            name,
            nodes,
            resistance,
            inductance,
            level,
            i_prev,
        }
    }

    /// True when the load is switched fully off.
    pub fn is_open(&self) -> bool {
        self.level <= 0.0
    }

    /// Resistance at the current level.
    pub fn effective_resistance(&self) -> f64 {
        self.resistance * 100.0 / self.level
    }

    /// Inductance at the current level.
    pub fn effective_inductance(&self) -> f64 {
        self.inductance * 100.0 / self.level
    }

    fn model(&self, ctx: &StampContext) -> CompanionModel {
        if self.is_open() {
            return CompanionModel::open();
        }
        match ctx.analysis {
            // Inductor is a short at DC
            Analysis::Dc => CompanionModel {
                conductance: 1.0 / self.effective_resistance(),
                current_source: 0.0,
            },
            Analysis::Transient { dt, .. } => self.companion(dt),
        }
    }

    pub fn stamp(&self, ctx: &StampContext, stamp: &mut Stamp) {
        let n1 = ctx.node(self.nodes[0]);
        let n2 = ctx.node(self.nodes[1]);
        let model = self.model(ctx);
        stamp.conductance(n1, n2, model.conductance);
        stamp.current_source(n1, n2, model.current_source);
    }

    pub fn ac_stamp(&self, ctx: &StampContext, omega: f64, stamp: &mut AcStamp) {
        let y = if self.is_open() {
            Complex64::from(CompanionModel::open().conductance)
        } else {
            Complex64::new(self.effective_resistance(), omega * self.effective_inductance()).inv()
        };
        stamp.conductance(ctx.node(self.nodes[0]), ctx.node(self.nodes[1]), y);
    }

    /// Voltage from `a` to `b`.
    pub fn voltage(&self, ctx: &StampContext, x: &[f64]) -> f64 {
        ctx.voltage(x, self.nodes[0]) - ctx.voltage(x, self.nodes[1])
    }

    /// Current from `a` to `b`.
    pub fn current(&self, ctx: &StampContext, x: &[f64]) -> f64 {
        self.model(ctx).current(self.voltage(ctx, x))
    }

    pub fn state(&self) -> PropertyMap {
        PropertyMap::from([("current".to_string(), self.i_prev)])
    }
}

impl Reactive for Load {
    fn companion(&self, dt: f64) -> CompanionModel {
        if self.is_open() {
            return CompanionModel::open();
        }
        let l_over_dt = self.effective_inductance() / dt;
        let g = 1.0 / (self.effective_resistance() + l_over_dt);
        CompanionModel {
            conductance: g,
            current_source: g * l_over_dt * self.i_prev,
        }
    }

    fn update_state(&mut self, _voltage: f64, current: f64) {
        self.i_prev = if self.is_open() { 0.0 } else { current };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::OPEN_CIRCUIT_RESISTANCE;
    use approx::assert_relative_eq;

    fn load(level: f64) -> Load {
        Load::new(ComponentId(0), "X1".into(), [NodeId(1), NodeId(0)], 10.0, 0.5, level, 0.0)
    }

    #[test]
    fn test_series_conductance() {
        let x = load(100.0);
        let model = x.companion(1e-3);
        // 1 / (10 + 0.5/1e-3)
        assert_relative_eq!(model.conductance, 1.0 / 510.0);
        assert_relative_eq!(model.current_source, 0.0);
    }

    #[test]
    fn test_history_current_carries_over() {
        let mut x = load(100.0);
        x.update_state(0.0, 2.0);
        let model = x.companion(1e-3);
        // With no applied voltage the inductor keeps pushing (L/dt)/(R + L/dt) of its current
        assert_relative_eq!(model.current(0.0), 2.0 * 500.0 / 510.0);
    }

    #[test]
    fn test_half_level_doubles_impedance() {
        let x = load(50.0);
        assert_relative_eq!(x.effective_resistance(), 20.0);
        assert_relative_eq!(x.effective_inductance(), 1.0);
    }

    #[test]
    fn test_zero_level_is_large_resistance() {
        let mut x = load(0.0);
        let model = x.companion(1e-3);
        assert_relative_eq!(model.conductance, 1.0 / OPEN_CIRCUIT_RESISTANCE);
        assert_eq!(model.current_source, 0.0);
        assert!(model.conductance.is_finite());

        x.update_state(1.0, 5.0);
        assert_eq!(x.i_prev, 0.0);
    }
}
