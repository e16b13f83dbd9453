//! Linear passive components: Resistor, Capacitor, Inductor.

use num_complex::Complex64;

use super::stamp::{AcStamp, Analysis, Stamp, StampContext};
use super::{CompanionModel, Reactive};
use crate::circuit::{BranchId, ComponentId, NodeId, PropertyMap};

/// A resistor component.
#[derive(Debug, Clone)]
pub struct Resistor {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 2],
    pub resistance: f64,
}

impl Resistor {
    /// Create a new resistor.
    pub fn new(id: ComponentId, name: String, nodes: [NodeId; 2], resistance: f64) -> Self {
        Self {
            id,
            name,
            nodes,
            resistance,
        }
    }

    /// Get the conductance (1/R).
    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }

    pub fn stamp(&self, ctx: &StampContext, stamp: &mut Stamp) {
        stamp.conductance(ctx.node(self.nodes[0]), ctx.node(self.nodes[1]), self.conductance());
    }

    pub fn ac_stamp(&self, ctx: &StampContext, stamp: &mut AcStamp) {
        stamp.conductance(
            ctx.node(self.nodes[0]),
            ctx.node(self.nodes[1]),
            Complex64::from(self.conductance()),
        );
    }

    /// Current from `a` to `b`.
    pub fn current(&self, ctx: &StampContext, x: &[f64]) -> f64 {
        (ctx.voltage(x, self.nodes[0]) - ctx.voltage(x, self.nodes[1])) * self.conductance()
    }
}

/// A capacitor component.
///
/// Backward Euler turns `i = C·dv/dt` into
///   i(n) = (C/dt)·v(n) - (C/dt)·v(n-1)
/// i.e. a conductance G_eq = C/dt in parallel with a current source
/// I_eq = -G_eq·v(n-1). At DC the capacitor is open.
#[derive(Debug, Clone)]
pub struct Capacitor {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 2],
    pub capacitance: f64,

    /// Voltage across the capacitor at the last committed step
    pub v_prev: f64,
}

impl Capacitor {
    /// Create a new capacitor.
    pub fn new(id: ComponentId, name: String, nodes: [NodeId; 2], capacitance: f64, v_prev: f64) -> Self {
        Self {
            id,
            name,
            nodes,
            capacitance,
            v_prev,
        }
    }

    fn model(&self, ctx: &StampContext) -> CompanionModel {
        match ctx.analysis {
            Analysis::Dc => CompanionModel::open(),
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
        let y = Complex64::new(0.0, omega * self.capacitance);
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
        PropertyMap::from([("voltage".to_string(), self.v_prev)])
    }
}

impl Reactive for Capacitor {
    fn companion(&self, dt: f64) -> CompanionModel {
        let g = self.capacitance / dt;
        CompanionModel {
            conductance: g,
            current_source: -g * self.v_prev,
        }
    }

    fn update_state(&mut self, voltage: f64, _current: f64) {
        self.v_prev = voltage;
    }
}

/// An inductor component.
///
/// Backward Euler turns `v = L·di/dt` into
///   i(n) = (dt/L)·v(n) + i(n-1)
/// The inductor keeps a branch current unknown so the current is read
/// directly from the solution; its branch row carries the companion
/// relation during transient analysis and `v = 0` (a short) at DC.
#[derive(Debug, Clone)]
pub struct Inductor {
    pub id: ComponentId,
    pub name: String,
    pub nodes: [NodeId; 2],
    pub inductance: f64,
    pub branch: BranchId,

    /// Current through the inductor at the last committed step
    pub i_prev: f64,
}

impl Inductor {
    /// Create a new inductor.
    pub fn new(
        id: ComponentId,
        name: String,
        nodes: [NodeId; 2],
        inductance: f64,
        branch: BranchId,
        i_prev: f64,
    ) -> Self {
        Self {
            id,
            name,
            nodes,
            inductance,
            branch,
            i_prev,
        }
    }

    pub fn stamp(&self, ctx: &StampContext, stamp: &mut Stamp) {
        let n1 = ctx.node(self.nodes[0]);
        let n2 = ctx.node(self.nodes[1]);
        let br = ctx.branch(self.branch);

        stamp.branch_incidence(n1, n2, br);
        match ctx.analysis {
            Analysis::Dc => {
                // V[a] - V[b] = 0
                if let Some(i) = n1 {
                    stamp.add(br, i, 1.0);
                }
                if let Some(j) = n2 {
                    stamp.add(br, j, -1.0);
                }
            }
            Analysis::Transient { dt, .. } => {
                // i - G_eq·(V[a] - V[b]) = I_prev
                let model = self.companion(dt);
                stamp.add(br, br, 1.0);
                if let Some(i) = n1 {
                    stamp.add(br, i, -model.conductance);
                }
                if let Some(j) = n2 {
                    stamp.add(br, j, model.conductance);
                }
                stamp.add_source(br, model.current_source);
            }
        }
    }

    pub fn ac_stamp(&self, ctx: &StampContext, omega: f64, stamp: &mut AcStamp) {
        let n1 = ctx.node(self.nodes[0]);
        let n2 = ctx.node(self.nodes[1]);
        let br = ctx.branch(self.branch);
        let one = Complex64::from(1.0);

        // V[a] - V[b] - jωL·i = 0
        stamp.branch_incidence(n1, n2, br);
        if let Some(i) = n1 {
            stamp.add(br, i, one);
        }
        if let Some(j) = n2 {
            stamp.add(br, j, -one);
        }
        stamp.add(br, br, Complex64::new(0.0, -omega * self.inductance));
    }

    /// Current from `a` to `b`.
    pub fn current(&self, ctx: &StampContext, x: &[f64]) -> f64 {
        ctx.current(x, self.branch)
    }

    pub fn state(&self) -> PropertyMap {
        PropertyMap::from([("current".to_string(), self.i_prev)])
    }
}

impl Reactive for Inductor {
    fn companion(&self, dt: f64) -> CompanionModel {
        CompanionModel {
            conductance: dt / self.inductance,
            current_source: self.i_prev,
        }
    }

    fn update_state(&mut self, _voltage: f64, current: f64) {
        self.i_prev = current;
    }
}
