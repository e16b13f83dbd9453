//! Measurement instruments: Ammeter, Voltmeter, Wattmeter.
//!
//! Meters are ordinary circuit elements: an ammeter is a 0 V source whose
//! branch current is the reading, a voltmeter is a large resistance, and a
//! wattmeter combines both.

use num_complex::Complex64;

use super::stamp::{AcStamp, Stamp, StampContext};
use crate::circuit::{BranchId, ComponentId, NodeId};

/// Ideal series ammeter.
#[derive(Debug, Clone)]
pub struct Ammeter {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 2], // [pos, neg]
    pub branch: BranchId,
}

impl Ammeter {
    pub fn new(id: ComponentId, name: String, nodes: [NodeId; 2], branch: BranchId) -> Self {
        Self {
            id,
            name,
            nodes,
            branch,
        }
    }

    pub fn stamp(&self, ctx: &StampContext, stamp: &mut Stamp) {
        stamp.voltage_source(ctx.node(self.nodes[0]), ctx.node(self.nodes[1]), ctx.branch(self.branch), 0.0);
    }

    pub fn ac_stamp(&self, ctx: &StampContext, stamp: &mut AcStamp) {
        stamp.voltage_source(
            ctx.node(self.nodes[0]),
            ctx.node(self.nodes[1]),
            ctx.branch(self.branch),
            Complex64::from(0.0),
        );
    }

    /// Reading: current flowing in at `pos` and out at `neg`.
    pub fn current(&self, ctx: &StampContext, x: &[f64]) -> f64 {
        ctx.current(x, self.branch)
    }
}

/// Parallel voltmeter with a finite internal resistance.
#[derive(Debug, Clone)]
pub struct Voltmeter {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 2], // [pos, neg]
    pub resistance: f64,
}

impl Voltmeter {
    pub fn new(id: ComponentId, name: String, nodes: [NodeId; 2], resistance: f64) -> Self {
        Self {
            id,
            name,
            nodes,
            resistance,
        }
    }

    pub fn stamp(&self, ctx: &StampContext, stamp: &mut Stamp) {
        stamp.conductance(ctx.node(self.nodes[0]), ctx.node(self.nodes[1]), 1.0 / self.resistance);
    }

    pub fn ac_stamp(&self, ctx: &StampContext, stamp: &mut AcStamp) {
        stamp.conductance(
            ctx.node(self.nodes[0]),
            ctx.node(self.nodes[1]),
            Complex64::from(1.0 / self.resistance),
        );
    }

    /// Reading: V[pos] - V[neg].
    pub fn voltage(&self, ctx: &StampContext, x: &[f64]) -> f64 {
        ctx.voltage(x, self.nodes[0]) - ctx.voltage(x, self.nodes[1])
    }
}

/// Four-terminal wattmeter: a current coil in series (`i_in` → `i_out`) and
/// a voltage coil in parallel (`v_pos`, `v_neg`).
#[derive(Debug, Clone)]
pub struct Wattmeter {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 4], // [i_in, i_out, v_pos, v_neg]
    /// Voltage coil resistance
    pub resistance: f64,
    /// Current coil branch
    pub branch: BranchId,
}

impl Wattmeter {
    pub fn new(id: ComponentId, name: String, nodes: [NodeId; 4], resistance: f64, branch: BranchId) -> Self {
        Self {
            id,
            name,
            nodes,
            resistance,
            branch,
        }
    }

    pub fn stamp(&self, ctx: &StampContext, stamp: &mut Stamp) {
        stamp.voltage_source(ctx.node(self.nodes[0]), ctx.node(self.nodes[1]), ctx.branch(self.branch), 0.0);
        stamp.conductance(ctx.node(self.nodes[2]), ctx.node(self.nodes[3]), 1.0 / self.resistance);
    }

    pub fn ac_stamp(&self, ctx: &StampContext, stamp: &mut AcStamp) {
        stamp.voltage_source(
            ctx.node(self.nodes[0]),
            ctx.node(self.nodes[1]),
            ctx.branch(self.branch),
            Complex64::from(0.0),
        );
        stamp.conductance(
            ctx.node(self.nodes[2]),
            ctx.node(self.nodes[3]),
            Complex64::from(1.0 / self.resistance),
        );
    }

    pub fn current(&self, ctx: &StampContext, x: &[f64]) -> f64 {
        ctx.current(x, self.branch)
    }

    pub fn voltage(&self, ctx: &StampContext, x: &[f64]) -> f64 {
        ctx.voltage(x, self.nodes[2]) - ctx.voltage(x, self.nodes[3])
    }

    /// Instantaneous power V·I.
    pub fn power(&self, ctx: &StampContext, x: &[f64]) -> f64 {
        self.voltage(ctx, x) * self.current(ctx, x)
    }
}
