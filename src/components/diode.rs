//! Diode model.
//!
//! Uses the Shockley diode equation:
//!   I = Is * (exp(V / (n * Vt)) - 1)
//!
//! For Newton-Raphson iteration, we linearize around the current operating point:
//!   I ≈ Gd * V + Ieq
//!
//! where Gd = dI/dV = Is/(n*Vt) * exp(V0/(n*Vt)) and Ieq = I0 - Gd * V0.

use num_complex::Complex64;

use super::stamp::{AcStamp, Stamp, StampContext};
use crate::circuit::{ComponentId, NodeId, PropertyMap};
use crate::THERMAL_VOLTAGE;

/// Largest exponent (in units of n·Vt) evaluated before clamping.
pub const MAX_EXP_ARG: f64 = 40.0;

/// Parameters for a diode model.
#[derive(Debug, Clone, PartialEq)]
pub struct DiodeParams {
    /// Saturation current (Is), typically 1e-14 to 1e-12 A
    pub is: f64,
    /// Ideality factor (n), typically 1.0 to 2.0
    pub n: f64,
}

impl Default for DiodeParams {
    fn default() -> Self {
        Self { is: 1e-14, n: 1.0 }
    }
}

impl DiodeParams {
    /// Thermal voltage times ideality factor.
    pub fn n_vt(&self) -> f64 {
        self.n * THERMAL_VOLTAGE
    }

    /// Voltage above which the exponential dominates and steps get damped:
    /// n·Vt·ln(n·Vt / (√2·Is)).
    pub fn v_crit(&self) -> f64 {
        let n_vt = self.n_vt();
        n_vt * (n_vt / (std::f64::consts::SQRT_2 * self.is)).ln()
    }
}

/// Linearized diode at one operating point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiodeModel {
    /// Diode current
    pub id: f64,
    /// Differential conductance, floored at Is/(n·Vt)
    pub gd: f64,
    /// Companion current source: Id - Gd·Vd
    pub ieq: f64,
}

/// A diode component.
#[derive(Debug, Clone)]
pub struct Diode {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 2], // [anode, cathode]
    pub params: DiodeParams,
    /// Linearization voltage of the last converged solve, seeds the next one
    pub vd: f64,
}

impl Diode {
    /// Create a new diode.
    pub fn new(id: ComponentId, name: String, nodes: [NodeId; 2], params: DiodeParams, vd: f64) -> Self {
        Self {
            id,
            name,
            nodes,
            params,
            vd,
        }
    }

    /// Evaluate current, conductance and companion source at `vd`.
    ///
    /// The exponent is clamped at [`MAX_EXP_ARG`] to keep the arithmetic
    /// finite; converged operating points sit well below the clamp.
    pub fn compute_model(&self, vd: f64) -> DiodeModel {
        let n_vt = self.params.n_vt();
        let g_floor = self.params.is / n_vt;
        let e = (vd / n_vt).min(MAX_EXP_ARG).exp();

        let id = self.params.is * (e - 1.0);
        let gd = (g_floor * e).max(g_floor);
        DiodeModel {
            id,
            gd,
            ieq: id - gd * vd,
        }
    }

    /// Damp the per-iteration change of the linearization voltage.
    ///
    /// Only steps into the exponential region (above `v_crit`) that exceed
    /// 2·n·Vt are limited. Moving forward from a positive `v_old` advances
    /// logarithmically; from `v_old <= 0` the estimate restarts at
    /// n·Vt·ln(v_new / n·Vt). Everything else passes through unchanged.
    pub fn limit_voltage(&self, v_new: f64, v_old: f64) -> f64 {
        let n_vt = self.params.n_vt();

        if v_new <= self.params.v_crit() || (v_new - v_old).abs() <= 2.0 * n_vt {
            return v_new;
        }

        if v_old > 0.0 {
            if v_new > v_old {
                v_old + n_vt * (1.0 + ((v_new - v_old) / n_vt).ln())
            } else {
                v_new
            }
        } else {
            n_vt * (v_new / n_vt).ln()
        }
    }

    /// Voltage across the diode (anode - cathode) in a solution vector.
    pub fn voltage(&self, ctx: &StampContext, x: &[f64]) -> f64 {
        ctx.voltage(x, self.nodes[0]) - ctx.voltage(x, self.nodes[1])
    }

    /// Stamp the companion conductance and current source linearized at `vd`.
    pub fn stamp_linearized(&self, vd: f64, ctx: &StampContext, stamp: &mut Stamp) {
        let n_anode = ctx.node(self.nodes[0]);
        let n_cathode = ctx.node(self.nodes[1]);
        let model = self.compute_model(vd);

        stamp.conductance(n_anode, n_cathode, model.gd);
        stamp.current_source(n_anode, n_cathode, model.ieq);
    }

    /// Small-signal conductance at the stored operating point.
    pub fn ac_stamp(&self, ctx: &StampContext, stamp: &mut AcStamp) {
        let gd = self.compute_model(self.vd).gd;
        stamp.conductance(ctx.node(self.nodes[0]), ctx.node(self.nodes[1]), Complex64::from(gd));
    }

    /// Diode current at the voltage found in a solution vector.
    pub fn current(&self, ctx: &StampContext, x: &[f64]) -> f64 {
        self.compute_model(self.voltage(ctx, x)).id
    }

    pub fn update_state(&mut self, vd: f64) {
        self.vd = vd;
    }

    pub fn state(&self) -> PropertyMap {
        PropertyMap::from([("vd".to_string(), self.vd)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::stamp::Analysis;

    fn diode() -> Diode {
        Diode::new(ComponentId(0), "D1".to_string(), [NodeId(1), NodeId(0)], DiodeParams::default(), 0.0)
    }

    #[test]
    fn test_zero_bias_current_is_exactly_zero() {
        assert_eq!(diode().compute_model(0.0).id, 0.0);
    }

    #[test]
    fn test_conductance_floor() {
        let d = diode();
        let floor = d.params.is / d.params.n_vt();
        for vd in [-50.0, -5.0, -0.1, 0.0, 0.3, 0.7, 2.0, 100.0] {
            assert!(d.compute_model(vd).gd >= floor, "floor violated at {vd}");
        }
    }

    #[test]
    fn test_diode_forward_bias() {
        let d = diode();
        let i_small = d.compute_model(0.3).id;
        let i_large = d.compute_model(0.6).id;
        assert!(i_large > i_small * 100.0);
    }

    #[test]
    fn test_diode_reverse_bias() {
        let d = diode();
        let i_rev = d.compute_model(-1.0).id;
        assert!(i_rev < 0.0);
        assert!(i_rev > -2.0 * d.params.is);
    }

    #[test]
    fn test_exponent_clamp_keeps_values_finite() {
        let m = diode().compute_model(1e3);
        assert!(m.id.is_finite() && m.gd.is_finite() && m.ieq.is_finite());
    }

    #[test]
    fn test_companion_reproduces_current_at_linearization_point() {
        let d = diode();
        let m = d.compute_model(0.65);
        assert!((m.gd * 0.65 + m.ieq - m.id).abs() < 1e-15);
    }

    #[test]
    fn test_limit_voltage_passes_small_signal() {
        let d = diode();
        for v in [-3.0, 0.0, 0.2, 0.5, 0.9] {
            assert_eq!(d.limit_voltage(v, v), v);
        }
        // Reverse bias passes through even for big jumps
        assert_eq!(d.limit_voltage(-10.0, 0.6), -10.0);
    }

    #[test]
    fn test_limit_voltage_damps_forward_steps() {
        let d = diode();
        let n_vt = d.params.n_vt();

        let v_old = 0.6;
        let v_new = 5.0;
        let limited = d.limit_voltage(v_new, v_old);
        let expected = v_old + n_vt * (1.0 + ((v_new - v_old) / n_vt).ln());
        assert_eq!(limited, expected);
        assert!(limited > v_old && limited < v_new);
        assert!((limited - v_old).abs() <= (v_new - v_old).abs());
    }

    #[test]
    fn test_limit_voltage_restarts_from_non_positive() {
        let d = diode();
        let n_vt = d.params.n_vt();

        let limited = d.limit_voltage(5.0, 0.0);
        assert_eq!(limited, n_vt * (5.0 / n_vt).ln());
        assert!(limited.abs() <= 5.0);

        let limited = d.limit_voltage(3.0, -2.0);
        assert!((limited + 2.0).abs() <= 5.0);
    }

    #[test]
    fn test_linearized_stamp_is_passive() {
        let d = Diode::new(ComponentId(0), "D1".into(), [NodeId(1), NodeId(2)], DiodeParams::default(), 0.0);
        let ctx = StampContext::new(3, Analysis::Dc);
        let mut stamp = Stamp::new();
        d.stamp_linearized(0.62, &ctx, &mut stamp);
        crate::components::stamp::tests::assert_passive(&stamp, 2);
    }
}
