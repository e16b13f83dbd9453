//! Voltage and current sources.

use std::f64::consts::PI;

use num_complex::Complex64;

use super::stamp::{AcStamp, Stamp, StampContext};
use crate::circuit::{BranchId, ComponentId, NodeId};

/// Time-dependent source value: `dc + amplitude·sin(2π·f·t + phase)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waveform {
    pub dc: f64,
    pub amplitude: f64,
    /// Frequency in Hz
    pub frequency: f64,
    /// Phase in degrees
    pub phase: f64,
}

impl Waveform {
    /// Constant value.
    pub fn dc(value: f64) -> Self {
        Self {
            dc: value,
            amplitude: 0.0,
            frequency: 0.0,
            phase: 0.0,
        }
    }

    /// Sinusoid with no offset.
    pub fn sine(amplitude: f64, frequency: f64) -> Self {
        Self {
            dc: 0.0,
            amplitude,
            frequency,
            phase: 0.0,
        }
    }

    /// Value at time `t`.
    pub fn value(&self, t: f64) -> f64 {
        if self.amplitude == 0.0 {
            return self.dc;
        }
        self.dc + self.amplitude * (2.0 * PI * self.frequency * t + self.phase.to_radians()).sin()
    }
}

/// Small-signal phasor `magnitude ∠ phase`.
fn phasor(magnitude: f64, phase_deg: f64) -> Complex64 {
    Complex64::from_polar(magnitude, phase_deg.to_radians())
}

/// A voltage source component.
///
/// Voltage sources require an extra row/column in the MNA matrix for the
/// branch current. The source enforces: V+ - V- = V_source
#[derive(Debug, Clone)]
pub struct VoltageSource {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 2], // [positive, negative]
    pub waveform: Waveform,
    /// Small-signal magnitude for AC stamping
    pub ac_magnitude: f64,
    pub branch: BranchId,
}

impl VoltageSource {
    /// Create a new voltage source.
    pub fn new(
        id: ComponentId,
        name: String,
        nodes: [NodeId; 2],
        waveform: Waveform,
        ac_magnitude: f64,
        branch: BranchId,
    ) -> Self {
        Self {
            id,
            name,
            nodes,
            waveform,
            ac_magnitude,
            branch,
        }
    }

    /// Get the source voltage at time `t`.
    pub fn voltage(&self, t: f64) -> f64 {
        self.waveform.value(t)
    }

    pub fn stamp(&self, ctx: &StampContext, stamp: &mut Stamp) {
        stamp.voltage_source(
            ctx.node(self.nodes[0]),
            ctx.node(self.nodes[1]),
            ctx.branch(self.branch),
            self.voltage(ctx.time()),
        );
    }

    pub fn ac_stamp(&self, ctx: &StampContext, stamp: &mut AcStamp) {
        stamp.voltage_source(
            ctx.node(self.nodes[0]),
            ctx.node(self.nodes[1]),
            ctx.branch(self.branch),
            phasor(self.ac_magnitude, self.waveform.phase),
        );
    }

    /// Branch current, entering at `pos` and flowing through the source to `neg`.
    /// Negative while the source delivers power.
    pub fn current(&self, ctx: &StampContext, x: &[f64]) -> f64 {
        ctx.current(x, self.branch)
    }
}

/// A current source component.
///
/// Current sources add directly to the RHS vector of the MNA equations.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 2], // [positive, negative] - current flows from + to -
    pub waveform: Waveform,
    pub ac_magnitude: f64,
}

impl CurrentSource {
    /// Create a new current source.
    pub fn new(id: ComponentId, name: String, nodes: [NodeId; 2], waveform: Waveform, ac_magnitude: f64) -> Self {
        Self {
            id,
            name,
            nodes,
            waveform,
            ac_magnitude,
        }
    }

    /// Get the source current at time `t`.
    pub fn current_at(&self, t: f64) -> f64 {
        self.waveform.value(t)
    }

    pub fn stamp(&self, ctx: &StampContext, stamp: &mut Stamp) {
        stamp.current_source(
            ctx.node(self.nodes[0]),
            ctx.node(self.nodes[1]),
            self.current_at(ctx.time()),
        );
    }

    pub fn ac_stamp(&self, ctx: &StampContext, stamp: &mut AcStamp) {
        stamp.current_source(
            ctx.node(self.nodes[0]),
            ctx.node(self.nodes[1]),
            phasor(self.ac_magnitude, self.waveform.phase),
        );
    }
}
